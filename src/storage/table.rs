use crate::{
    storage::{append_log::AppendLog, index::PrimaryKeyIndex, schema::TableSchema},
    types::error::Result,
};

/// Live state of one created table: its schema, both logs and the key index
pub struct TableHandle {
    pub schema: TableSchema,
    pub data_log: AppendLog,
    pub index_log: AppendLog,
    pub index: PrimaryKeyIndex,
}

impl TableHandle {
    pub fn new(
        schema: TableSchema,
        data_log: AppendLog,
        index_log: AppendLog,
        index: PrimaryKeyIndex,
    ) -> Self {
        Self {
            schema,
            data_log,
            index_log,
            index,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.schema.table_name
    }

    /// Flush the data log, then the index log, so an index entry never
    /// reaches disk ahead of its row. Both are attempted.
    pub fn flush(&self) -> Result<()> {
        let data = self.data_log.flush();
        let index = self.index_log.flush();
        data.and(index)
    }

    /// Close both logs, returning the first failure after attempting both
    pub fn close(&self) -> Result<()> {
        let data = self.data_log.close();
        let index = self.index_log.close();
        data.and(index)
    }
}
