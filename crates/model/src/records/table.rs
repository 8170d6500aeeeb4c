use crate::{core::value::Value, records::row::Record};
use serde::Serialize;
use std::collections::HashSet;

/// An ordered sequence of records plus the union of their column names in
/// first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordTable {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Record>) -> Self {
        let mut table = RecordTable::new();
        for row in rows {
            table.push(row);
        }
        table
    }

    pub fn push(&mut self, row: Record) {
        for name in row.column_names() {
            if !self.columns.iter().any(|c| c == name) {
                self.columns.push(name.to_string());
            }
        }
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Tags every row with the index of the source it came from.
    pub fn with_origin(mut self, origin: usize) -> Self {
        for row in &mut self.rows {
            row.origin = Some(origin);
        }
        self
    }

    /// Concatenates tables in order after reconciling their column sets.
    ///
    /// The result's columns are the union of all input columns in first-seen
    /// order, and every row is conformed to that layout with absent columns
    /// filled with `Null`.
    pub fn concat(tables: Vec<RecordTable>) -> RecordTable {
        let mut columns: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for table in &tables {
            for column in &table.columns {
                if seen.insert(column.clone()) {
                    columns.push(column.clone());
                }
            }
        }

        let rows = tables
            .into_iter()
            .flat_map(|t| t.rows)
            .map(|row| conform(row, &columns))
            .collect();

        RecordTable { columns, rows }
    }

    /// Drops rows in place. The column list is left untouched.
    pub fn retain_rows<F: FnMut(&Record) -> bool>(&mut self, keep: F) {
        self.rows.retain(keep);
    }
}

fn conform(row: Record, columns: &[String]) -> Record {
    let origin = row.origin;
    let mut out = Record::new();
    for column in columns {
        let value = row.get_value(column).cloned().unwrap_or(Value::Null);
        out.set(column, value);
    }
    out.origin = origin;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, i64)]) -> Record {
        Record::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), Value::Int(*v))))
    }

    #[test]
    fn test_concat_unions_columns_and_fills_null() {
        let a = RecordTable::from_rows(vec![row(&[("id", 1), ("a", 10)])]).with_origin(0);
        let b = RecordTable::from_rows(vec![row(&[("b", 20), ("id", 2)])]).with_origin(1);

        let merged = RecordTable::concat(vec![a, b]);

        assert_eq!(merged.columns, vec!["id", "a", "b"]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.rows[0].get_value("b"), Some(&Value::Null));
        assert_eq!(merged.rows[1].get_value("a"), Some(&Value::Null));
        assert_eq!(
            merged.rows[1].column_names().collect::<Vec<_>>(),
            vec!["id", "a", "b"]
        );
        assert_eq!(merged.rows[1].origin, Some(1));
    }

    #[test]
    fn test_concat_of_nothing_is_empty() {
        let merged = RecordTable::concat(vec![]);
        assert!(merged.is_empty());
        assert!(merged.columns.is_empty());
    }
}
