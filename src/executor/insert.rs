use std::collections::HashSet;

use tracing::debug;

use crate::{
    storage::{schema::TableSchema, table::TableHandle},
    types::{
        PrimaryKey,
        error::{DatabaseError, Result},
        row::Row,
    },
};

/// Trait for inserting data into database tables
pub trait Inserter {
    /// Insert a single row into the table
    fn insert(&self, row: &Row) -> Result<()>;

    /// Insert rows in order, stopping at the first invalid one. Returns the
    /// number of rows written.
    fn insert_batch(&self, rows: &[Row]) -> Result<usize>;

    /// Get the table name this inserter operates on
    fn table_name(&self) -> &str;
}

/// Writes validated rows to a table's data log, index log and key index
pub struct TableInserter<'a> {
    handle: &'a TableHandle,
}

impl<'a> TableInserter<'a> {
    pub fn new(handle: &'a TableHandle) -> Self {
        Self { handle }
    }

    fn write_rows(&self, rows: &[Row]) -> Result<usize> {
        let mut written = 0;
        for row in rows {
            let (key, fields) = prepare_row(&self.handle.schema, row)?;
            let position = self.handle.data_log.write_line(&fields)?;
            self.handle
                .index_log
                .write_line([key.to_string(), position.to_string()])?;
            self.handle.index.insert(key, position);
            written += 1;
        }
        Ok(written)
    }
}

impl Inserter for TableInserter<'_> {
    fn insert(&self, row: &Row) -> Result<()> {
        self.insert_batch(std::slice::from_ref(row)).map(drop)
    }

    fn insert_batch(&self, rows: &[Row]) -> Result<usize> {
        // Rows written before a failing row stay in the logs and get flushed too
        let written = self.write_rows(rows);
        let flushed = self.handle.flush();
        let written = written?;
        flushed?;

        debug!(table = self.table_name(), rows = written, "inserted batch");
        Ok(written)
    }

    fn table_name(&self) -> &str {
        self.handle.table_name()
    }
}

/// Type-check `row` against `schema`, extract its primary key and serialize
/// its values in schema declaration order.
pub fn prepare_row(schema: &TableSchema, row: &Row) -> Result<(PrimaryKey, Vec<String>)> {
    let table = &schema.table_name;
    let mut primary_key = None;
    let mut seen = HashSet::new();

    for column_value in &row.values {
        let column = schema.get_column(&column_value.column_name).ok_or_else(|| {
            DatabaseError::ColumnNotFound {
                name: column_value.column_name.clone(),
                table: table.clone(),
            }
        })?;
        if !seen.insert(column.name.as_str()) {
            return Err(DatabaseError::DuplicateColumn {
                table: table.clone(),
                column: column.name.clone(),
            });
        }
        if !column_value.value.is_compatible_with_type(&column.data_type) {
            return Err(DatabaseError::TypeMismatch {
                column: column.name.clone(),
                expected: column.data_type.to_string(),
            });
        }
        if column.primary_key {
            let key = column_value.value.as_integer().ok_or_else(|| {
                DatabaseError::PrimaryKeyUnsupported {
                    table: table.clone(),
                    reason: "only 64-bit integer primary keys are supported".to_string(),
                }
            })?;
            primary_key = Some(key);
        }
    }

    let primary_key = primary_key.ok_or_else(|| DatabaseError::PrimaryKeyUnsupported {
        table: table.clone(),
        reason: "row has no primary key value".to_string(),
    })?;

    let fields = schema
        .columns
        .iter()
        .map(|column| {
            row.get(&column.name)
                .map(|value| value.to_string())
                .ok_or_else(|| DatabaseError::MissingColumn {
                    table: table.clone(),
                    column: column.name.clone(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((primary_key, fields))
}
