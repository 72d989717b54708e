use tracing::debug;

use crate::{
    storage::{schema::TableSchema, table::TableHandle},
    types::{
        PrimaryKey, RowPosition,
        error::{DatabaseError, Result},
        row::{ColumnValue, Row},
    },
};

/// Point lookup of a row by primary key through the in-memory index
pub struct PointLookup<'a> {
    handle: &'a TableHandle,
}

impl<'a> PointLookup<'a> {
    pub fn new(handle: &'a TableHandle) -> Self {
        Self { handle }
    }

    pub fn select_by_id(&self, key: PrimaryKey) -> Result<Option<Row>> {
        let table = self.handle.table_name();
        let Some(position) = self.handle.index.get(key) else {
            debug!(table, key, "primary key not in index");
            return Ok(None);
        };

        let fields = self.handle.data_log.read_record(position)?.ok_or_else(|| {
            DatabaseError::read_failure(
                self.handle.data_log.path(),
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("no record at position {}", position),
                ),
            )
        })?;

        debug!(table, key, position, "read row");
        decode_row(&self.handle.schema, position, fields).map(Some)
    }
}

/// Zip serialized fields with the schema columns, re-typing each one
pub fn decode_row(schema: &TableSchema, position: RowPosition, fields: Vec<String>) -> Result<Row> {
    if fields.len() != schema.columns.len() {
        return Err(DatabaseError::CorruptRecord {
            table: schema.table_name.clone(),
            position,
            reason: format!(
                "expected {} fields, found {}",
                schema.columns.len(),
                fields.len()
            ),
        });
    }

    let values = schema
        .columns
        .iter()
        .zip(fields)
        .map(|(column, raw)| {
            let value = column.data_type.parse_value(&raw).ok_or_else(|| {
                DatabaseError::CorruptRecord {
                    table: schema.table_name.clone(),
                    position,
                    reason: format!("'{}' is not a valid {} for column '{}'", raw, column.data_type, column.name),
                }
            })?;
            Ok(ColumnValue {
                column_name: column.name.clone(),
                value,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Row::new(values))
}
