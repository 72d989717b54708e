use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    storage::append_log::{AppendLog, record_reader},
    types::{
        METADATA_FILE_SUFFIX,
        error::{DatabaseError, Result},
        value::DataType,
    },
};

/// Represents a column definition in a table schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub primary_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary_key: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    fn to_record(&self) -> [String; 3] {
        [
            self.name.clone(),
            self.data_type.tag().to_string(),
            self.primary_key.to_string(),
        ]
    }
}

/// One line of a metadata file
#[derive(Debug, Deserialize)]
struct ColumnRecord {
    name: String,
    data_type: String,
    primary_key: bool,
}

/// The ordered column list of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
        }
    }

    /// Get column by name
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    /// The first column flagged as primary key
    pub fn primary_key_column(&self) -> Option<&Column> {
        self.columns.iter().find(|col| col.primary_key)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|col| col.name.as_str()).collect()
    }

    /// Name-keyed view of the columns. Declaration order is only kept by `columns`.
    pub fn columns_by_name(&self) -> HashMap<&str, &Column> {
        self.columns
            .iter()
            .map(|col| (col.name.as_str(), col))
            .collect()
    }
}

/// Persists table schemas as `<table>-metadata.csv` files under the store root
#[derive(Debug, Clone)]
pub struct SchemaStore {
    root: PathBuf,
}

impl SchemaStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn metadata_path(&self, table_name: &str) -> PathBuf {
        self.root
            .join(format!("{}{}", table_name, METADATA_FILE_SUFFIX))
    }

    pub fn exists(&self, table_name: &str) -> bool {
        self.metadata_path(table_name).exists()
    }

    /// Write one record per column, in declaration order
    pub fn save_schema(&self, table_name: &str, columns: &[Column]) -> Result<()> {
        let path = self.metadata_path(table_name);
        let log = match AppendLog::create_new(&path) {
            Ok(log) => log,
            Err(DatabaseError::WriteFailure { source, .. })
                if source.kind() == io::ErrorKind::AlreadyExists =>
            {
                return Err(DatabaseError::TableAlreadyExists {
                    name: table_name.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let written = columns
            .iter()
            .try_for_each(|column| log.write_line(column.to_record()).map(drop));
        // The file handle is released whether or not every column made it out
        let closed = log.close();
        written.and(closed)?;

        debug!(table = table_name, columns = columns.len(), "saved table schema");
        Ok(())
    }

    pub fn load_schema(&self, table_name: &str) -> Result<TableSchema> {
        let path = self.metadata_path(table_name);
        if !path.exists() {
            return Err(DatabaseError::TableDoesNotExist {
                name: table_name.to_string(),
            });
        }

        let mut reader = record_reader(&path)?;
        let mut columns = Vec::new();
        for result in reader.deserialize::<ColumnRecord>() {
            let record = result.map_err(|e| {
                if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                    DatabaseError::read_failure(&path, e)
                } else {
                    DatabaseError::CorruptMetadata {
                        table: table_name.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;
            let data_type = DataType::from_tag(&record.data_type).ok_or_else(|| {
                DatabaseError::CorruptMetadata {
                    table: table_name.to_string(),
                    reason: format!("unknown column type '{}'", record.data_type),
                }
            })?;
            columns.push(Column {
                name: record.name,
                data_type,
                primary_key: record.primary_key,
            });
        }

        Ok(TableSchema::new(table_name, columns))
    }
}
