use std::{collections::HashMap, path::Path};

use parking_lot::RwLock;

use crate::{
    storage::append_log::record_reader,
    types::{
        PrimaryKey, RowPosition,
        error::{DatabaseError, Result},
    },
};

/// In-memory map from primary key to the data-log position of its latest row
#[derive(Debug, Default)]
pub struct PrimaryKeyIndex {
    entries: RwLock<HashMap<PrimaryKey, RowPosition>>,
}

impl PrimaryKeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: PrimaryKey) -> Option<RowPosition> {
        self.entries.read().get(&key).copied()
    }

    /// Point `key` at `position` unless it already points at a later record
    pub fn insert(&self, key: PrimaryKey, position: RowPosition) {
        self.entries
            .write()
            .entry(key)
            .and_modify(|current| {
                if position > *current {
                    *current = position;
                }
            })
            .or_insert(position);
    }

    /// Every `(key, position)` pair, ordered by position
    pub fn entries(&self) -> Vec<(PrimaryKey, RowPosition)> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(key, position)| (*key, *position))
            .collect();
        entries.sort_by_key(|(_, position)| *position);
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Rebuild an index from an index log of `(key, position)` records.
    /// Entries at or beyond `row_limit` are dropped and counted in the second
    /// tuple element.
    pub fn replay(path: &Path, table_name: &str, row_limit: RowPosition) -> Result<(Self, usize)> {
        let index = Self::new();
        let mut skipped = 0;
        let mut reader = record_reader(path)?;
        for result in reader.deserialize::<(PrimaryKey, RowPosition)>() {
            let (key, position) = result.map_err(|e| {
                if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                    DatabaseError::read_failure(path, e)
                } else {
                    DatabaseError::CorruptMetadata {
                        table: table_name.to_string(),
                        reason: format!("bad index entry: {}", e),
                    }
                }
            })?;
            if position >= row_limit {
                skipped += 1;
                continue;
            }
            index.insert(key, position);
        }
        Ok((index, skipped))
    }
}
