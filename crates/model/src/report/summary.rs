use crate::{core::value::Value, records::row::Record};
use serde::Serialize;

/// Output of one aggregation spec: one row per partition, columns in emission
/// order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl SummaryTable {
    pub fn new(name: &str, columns: Vec<String>) -> Self {
        SummaryTable {
            name: name.to_string(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Vec<Value> {
        self.rows
            .iter()
            .map(|r| r.get_value(name).cloned().unwrap_or(Value::Null))
            .collect()
    }
}
