use std::collections::HashSet;

use crate::{
    storage::schema::{Column, TableSchema},
    types::{
        error::{DatabaseError, Result},
        value::DataType,
    },
};

/// Validate column definitions before any file is created for the table
pub fn validate_columns(table_name: &str, columns: &[Column]) -> Result<()> {
    if columns.is_empty() {
        return Err(DatabaseError::InvalidSchema {
            table: table_name.to_string(),
            reason: "table must have at least one column".to_string(),
        });
    }

    // Check for duplicate column names
    let mut column_names = HashSet::new();
    for column in columns {
        if !column_names.insert(column.name.as_str()) {
            return Err(DatabaseError::InvalidSchema {
                table: table_name.to_string(),
                reason: format!("duplicate column name: {}", column.name),
            });
        }
    }

    let primary_keys: Vec<&Column> = columns.iter().filter(|c| c.primary_key).collect();
    match primary_keys.as_slice() {
        [] => Err(DatabaseError::InvalidSchema {
            table: table_name.to_string(),
            reason: "table must have exactly one primary key column, found none".to_string(),
        }),
        [key] if key.data_type != DataType::Integer => Err(DatabaseError::PrimaryKeyUnsupported {
            table: table_name.to_string(),
            reason: format!(
                "column '{}' is {}, only {} primary keys are supported",
                key.name,
                key.data_type,
                DataType::Integer
            ),
        }),
        [_] => Ok(()),
        _ => Err(DatabaseError::InvalidSchema {
            table: table_name.to_string(),
            reason: format!(
                "table must have exactly one primary key column, found {}",
                primary_keys.len()
            ),
        }),
    }
}

/// Builder for creating table schemas
pub struct TableSchemaBuilder {
    table_name: String,
    columns: Vec<Column>,
}

impl TableSchemaBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
        }
    }

    pub fn add_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type));
        self
    }

    pub fn add_primary_key(mut self, name: impl Into<String>) -> Self {
        self.columns
            .push(Column::new(name, DataType::Integer).primary_key());
        self
    }

    pub fn build(self) -> Result<TableSchema> {
        validate_columns(&self.table_name, &self.columns)?;
        Ok(TableSchema::new(self.table_name, self.columns))
    }
}
