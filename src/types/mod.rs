pub mod error;
pub mod row;
pub mod value;

// Common type aliases
pub type PrimaryKey = i64;
pub type RowPosition = u64;

// On-disk layout, one set of files per table inside the store root
pub const DATA_FILE_SUFFIX: &str = "-data.csv";
pub const INDEX_FILE_SUFFIX: &str = "-primary-index.csv";
pub const METADATA_FILE_SUFFIX: &str = "-metadata.csv";
pub const CATALOG_FILE_NAME: &str = "tables.csv";
pub const DEFAULT_DATA_FOLDER: &str = "data-folder";
