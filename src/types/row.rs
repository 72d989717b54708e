use serde::{Deserialize, Serialize};

use crate::types::value::Value;

/// A value tagged with the column it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnValue {
    pub column_name: String,
    pub value: Value,
}

impl ColumnValue {
    pub fn new(column_name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column_name: column_name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<ColumnValue>,
}

impl Row {
    pub fn new(values: Vec<ColumnValue>) -> Self {
        Self { values }
    }

    /// Build a row from `(column, value)` pairs in declaration order
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<Value>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(name, value)| ColumnValue::new(name, value))
                .collect(),
        }
    }

    pub fn get_value(&self, column_index: usize) -> Option<&ColumnValue> {
        self.values.get(column_index)
    }

    pub fn get(&self, column_name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|cv| cv.column_name == column_name)
            .map(|cv| &cv.value)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.values.iter().map(|cv| cv.column_name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
