use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;
use tracing::{error, info, warn};

use crate::{
    executor::{
        create_table::validate_columns,
        insert::{Inserter, TableInserter},
        lookup::PointLookup,
    },
    storage::{
        append_log::{AppendLog, record_reader},
        catalog::TableCatalog,
        config::StoreConfig,
        index::PrimaryKeyIndex,
        schema::{Column, SchemaStore, TableSchema},
        table::TableHandle,
    },
    types::{
        DATA_FILE_SUFFIX, INDEX_FILE_SUFFIX, METADATA_FILE_SUFFIX, PrimaryKey, RowPosition,
        error::{DatabaseError, Result},
        row::Row,
    },
};

/// Embedded store of named tables, each backed by a data log, an index log
/// and a schema file under one root directory.
///
/// All operations take `&self`; share the manager across threads with an
/// `Arc`. Tables are tracked in a sharded map so work on different tables
/// never contends on the same lock.
pub struct StorageManager {
    config: StoreConfig,
    schema_store: SchemaStore,
    catalog: TableCatalog,
    tables: DashMap<String, Arc<TableHandle>>,
}

impl StorageManager {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let root = config.root_dir.clone();
        fs::create_dir_all(&root).map_err(|source| DatabaseError::InitializationFailure {
            path: root.display().to_string(),
            source,
        })?;

        let catalog = TableCatalog::new(&root);
        catalog.ensure_exists()?;

        let storage_manager = Self {
            schema_store: SchemaStore::new(&root),
            catalog,
            tables: DashMap::new(),
            config,
        };
        if storage_manager.config.recover_on_open {
            storage_manager.recover_tables()?;
        }

        info!(
            root = %root.display(),
            tables = storage_manager.tables.len(),
            "opened store"
        );
        Ok(storage_manager)
    }

    /// Open the store rooted at `root` with default settings
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        Self::new(StoreConfig::new(root))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn data_path(&self, table_name: &str) -> PathBuf {
        self.config
            .root_dir
            .join(format!("{}{}", table_name, DATA_FILE_SUFFIX))
    }

    pub fn index_path(&self, table_name: &str) -> PathBuf {
        self.config
            .root_dir
            .join(format!("{}{}", table_name, INDEX_FILE_SUFFIX))
    }

    pub fn metadata_path(&self, table_name: &str) -> PathBuf {
        self.schema_store.metadata_path(table_name)
    }

    fn recover_tables(&self) -> Result<()> {
        let root = &self.config.root_dir;
        let entries = fs::read_dir(root).map_err(|e| DatabaseError::read_failure(root, e))?;

        let mut table_names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DatabaseError::read_failure(root, e))?;
            let file_name = entry.file_name();
            if let Some(table_name) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(METADATA_FILE_SUFFIX))
            {
                table_names.push(table_name.to_string());
            }
        }
        table_names.sort();

        for table_name in &table_names {
            self.recover_table(table_name)?;
        }
        Ok(())
    }

    fn recover_table(&self, table_name: &str) -> Result<()> {
        let schema = self.schema_store.load_schema(table_name)?;
        let data_path = self.data_path(table_name);
        if !data_path.exists() {
            warn!(table = table_name, "schema has no data log, not reopening table");
            return Ok(());
        }
        let data_log = AppendLog::open_existing(&data_path)?;

        let index_path = self.index_path(table_name);
        let (index_log, index) = if index_path.exists() {
            let index_log = AppendLog::open_existing(&index_path)?;
            let (index, skipped) =
                PrimaryKeyIndex::replay(&index_path, table_name, data_log.next_position())?;
            if skipped == 0 {
                (index_log, index)
            } else {
                // Positions past the data log will be handed out again, so
                // the stale entries must not survive into the next replay
                warn!(
                    table = table_name,
                    skipped, "index entries point past the end of the data log, rewriting index log"
                );
                drop(index_log);
                let index_log = AppendLog::create(&index_path, 0)?;
                for (key, position) in index.entries() {
                    index_log.write_line([key.to_string(), position.to_string()])?;
                }
                index_log.flush()?;
                (index_log, index)
            }
        } else {
            warn!(table = table_name, "index log missing, rebuilding it from the data log");
            let index_log = AppendLog::create(&index_path, 0)?;
            let index = rebuild_index(&schema, &data_path, &index_log)?;
            (index_log, index)
        };

        info!(
            table = table_name,
            rows = data_log.next_position(),
            keys = index.len(),
            "recovered table"
        );
        self.tables.insert(
            table_name.to_string(),
            Arc::new(TableHandle::new(schema, data_log, index_log, index)),
        );
        Ok(())
    }

    /// Create a table with `columns` as its ordered schema
    pub fn create_table(&self, table_name: &str, columns: Vec<Column>) -> Result<()> {
        if self.tables.contains_key(table_name) || self.data_path(table_name).exists() {
            return Err(DatabaseError::TableAlreadyExists {
                name: table_name.to_string(),
            });
        }
        if table_name.is_empty() || table_name.contains(['/', '\\']) {
            return Err(DatabaseError::InvalidSchema {
                table: table_name.to_string(),
                reason: "table name must be non-empty and contain no path separators".to_string(),
            });
        }
        validate_columns(table_name, &columns)?;

        self.schema_store.save_schema(table_name, &columns)?;
        let (data_log, index_log) = match self.create_logs(table_name) {
            Ok(logs) => logs,
            Err(e) => {
                self.discard_table_files(table_name);
                return Err(e);
            }
        };

        let handle = TableHandle::new(
            TableSchema::new(table_name, columns),
            data_log,
            index_log,
            PrimaryKeyIndex::new(),
        );
        self.tables.insert(table_name.to_string(), Arc::new(handle));
        self.catalog.record_table(table_name)?;

        info!(table = table_name, "created table");
        Ok(())
    }

    fn create_logs(&self, table_name: &str) -> Result<(AppendLog, AppendLog)> {
        let data_log = AppendLog::create(self.data_path(table_name), 0)?;
        let index_log = AppendLog::create(self.index_path(table_name), 0)?;
        Ok((data_log, index_log))
    }

    /// Remove whatever a failed `create_table` left behind so the name stays usable
    fn discard_table_files(&self, table_name: &str) {
        for path in [self.metadata_path(table_name), self.data_path(table_name)] {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != io::ErrorKind::NotFound {
                    error!(path = %path.display(), error = %e, "failed to remove table file");
                }
            }
        }
    }

    /// Validate and append `rows` to the table. Returns the number of rows written.
    ///
    /// Rows are processed in order and the batch stops at the first invalid
    /// row; rows before it stay written.
    pub fn insert_rows(&self, table_name: &str, rows: &[Row]) -> Result<usize> {
        let handle = self.table_handle(table_name)?;
        TableInserter::new(&handle).insert_batch(rows)
    }

    /// Fetch the latest row stored under `key`, or `None` if the key was never inserted
    pub fn select_by_id(&self, table_name: &str, key: PrimaryKey) -> Result<Option<Row>> {
        let handle = self.table_handle(table_name)?;
        PointLookup::new(&handle).select_by_id(key)
    }

    /// Close every data and index log. All logs are attempted; the first
    /// failure is returned.
    pub fn close_writers(&self) -> Result<()> {
        let mut first_error = None;
        for entry in self.tables.iter() {
            if let Err(e) = entry.value().close() {
                error!(table = entry.key().as_str(), error = %e, "failed to close table logs");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(tables = self.tables.len(), "closed all table logs");
                Ok(())
            }
        }
    }

    fn table_handle(&self, table_name: &str) -> Result<Arc<TableHandle>> {
        self.tables
            .get(table_name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| DatabaseError::TableDoesNotExist {
                name: table_name.to_string(),
            })
    }

    /// Check if a table exists, open in this process or only on disk
    pub fn table_exists(&self, table_name: &str) -> bool {
        self.tables.contains_key(table_name) || self.schema_store.exists(table_name)
    }

    /// Schema of an open table
    pub fn table_schema(&self, table_name: &str) -> Option<TableSchema> {
        self.tables
            .get(table_name)
            .map(|entry| entry.value().schema.clone())
    }

    /// Load a table's schema from its metadata file
    pub fn load_schema(&self, table_name: &str) -> Result<TableSchema> {
        self.schema_store.load_schema(table_name)
    }

    /// Table names from the catalog, in creation order
    pub fn table_names(&self) -> Result<Vec<String>> {
        self.catalog.tables()
    }

    /// Names of tables open in this process
    pub fn open_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}

/// Re-derive the key index from the data log, writing a fresh entry per row
/// to `index_log`
fn rebuild_index(
    schema: &TableSchema,
    data_path: &Path,
    index_log: &AppendLog,
) -> Result<PrimaryKeyIndex> {
    let key_column = schema
        .columns
        .iter()
        .position(|col| col.primary_key)
        .ok_or_else(|| DatabaseError::CorruptMetadata {
            table: schema.table_name.clone(),
            reason: "no primary key column".to_string(),
        })?;

    let index = PrimaryKeyIndex::new();
    let mut reader = record_reader(data_path)?;
    for (position, result) in reader.records().enumerate() {
        let position = position as RowPosition;
        let record = result.map_err(|e| DatabaseError::read_failure(data_path, e))?;
        let key = record
            .get(key_column)
            .and_then(|field| field.parse::<PrimaryKey>().ok())
            .ok_or_else(|| DatabaseError::CorruptRecord {
                table: schema.table_name.clone(),
                position,
                reason: format!("no integer key in column {}", key_column),
            })?;
        index_log.write_line([key.to_string(), position.to_string()])?;
        index.insert(key, position);
    }
    index_log.flush()?;
    Ok(index)
}
