use std::path::{Path, PathBuf};

use crate::types::DEFAULT_DATA_FOLDER;

/// Settings for opening a [`StorageManager`](crate::storage::storage_manager::StorageManager)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding every table file and the catalog
    pub root_dir: PathBuf,
    /// Reload schemas, reopen logs and replay index logs of existing tables on open
    pub recover_on_open: bool,
}

impl StoreConfig {
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_path_buf(),
            recover_on_open: true,
        }
    }

    pub fn with_root_dir<P: AsRef<Path>>(mut self, root_dir: P) -> Self {
        self.root_dir = root_dir.as_ref().to_path_buf();
        self
    }

    pub fn recover_on_open(mut self, recover: bool) -> Self {
        self.recover_on_open = recover;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join(DEFAULT_DATA_FOLDER))
    }
}
