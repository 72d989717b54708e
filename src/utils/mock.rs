use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::{
    storage::{config::StoreConfig, schema::Column, storage_manager::StorageManager},
    types::{
        error::{DatabaseError, Result},
        row::Row,
        value::{DataType, Value},
    },
};

/// A store rooted in a fresh temporary directory, removed on drop
pub struct TempStore {
    pub storage_manager: StorageManager,
    // Dropped after the manager so open logs never outlive their directory
    dir: TempDir,
}

impl TempStore {
    pub fn new() -> Result<Self> {
        Self::with_prefix("rowlog_test")
    }

    pub fn with_prefix(prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .map_err(|source| DatabaseError::InitializationFailure {
                path: prefix.to_string(),
                source,
            })?;
        let storage_manager = StorageManager::open(dir.path())?;
        Ok(Self {
            storage_manager,
            dir,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.dir.path().join(file_name)
    }

    /// Close the current manager and open a new one over the same directory
    pub fn reopen(&mut self, config: StoreConfig) -> Result<()> {
        self.storage_manager.close_writers()?;
        self.storage_manager = StorageManager::new(config.with_root_dir(self.dir.path()))?;
        Ok(())
    }
}

/// `[id INTEGER PRIMARY KEY, name TEXT]`
pub fn accounts_columns() -> Vec<Column> {
    vec![
        Column::new("id", DataType::Integer).primary_key(),
        Column::new("name", DataType::Text),
    ]
}

pub fn account_row(id: i64, name: &str) -> Row {
    Row::from_pairs([("id", Value::Integer(id)), ("name", Value::from(name))])
}
