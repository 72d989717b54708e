use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    storage::append_log::record_reader,
    types::{
        CATALOG_FILE_NAME,
        error::{DatabaseError, Result},
    },
};

/// The shared `tables.csv` file listing every created table
#[derive(Debug)]
pub struct TableCatalog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TableCatalog {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            path: root.as_ref().join(CATALOG_FILE_NAME),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty catalog file if none exists yet
    pub fn ensure_exists(&self) -> Result<()> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map(drop)
            .map_err(|source| DatabaseError::InitializationFailure {
                path: self.path.display().to_string(),
                source,
            })
    }

    /// Append a `(table_name, "0")` record
    pub fn record_table(&self, table_name: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| DatabaseError::write_failure(&self.path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer
            .write_record([table_name, "0"])
            .map_err(|e| DatabaseError::write_failure(&self.path, e))?;
        writer
            .flush()
            .map_err(|e| DatabaseError::write_failure(&self.path, e))?;

        debug!(table = table_name, "recorded table in catalog");
        Ok(())
    }

    /// Every table name recorded so far, in creation order
    pub fn tables(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock();
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = record_reader(&self.path)?;
        let mut names = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| DatabaseError::read_failure(&self.path, e))?;
            if let Some(name) = record.get(0) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}
