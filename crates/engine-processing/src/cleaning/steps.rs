use crate::cleaning::pipeline::CleaningStep;
use model::{
    core::{data_type::DataType, utils::parse_number, value::Value},
    execution::{
        cleaning::{FillMissing, FillStrategy},
        rule::Rule,
    },
    records::table::RecordTable,
    report::stats::CleaningStats,
};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Trims strings. Whitespace-only strings become null.
pub struct StandardizeStrings;

impl CleaningStep for StandardizeStrings {
    fn name(&self) -> &'static str {
        "standardize_strings"
    }

    fn apply(&self, table: &mut RecordTable, _stats: &mut CleaningStats) {
        for field in table.rows.iter_mut().flat_map(|r| r.fields.iter_mut()) {
            if let Value::String(s) = &field.value {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    field.value = Value::Null;
                } else if trimmed.len() != s.len() {
                    field.value = Value::String(trimmed.to_string());
                }
            }
        }
    }
}

/// Drops rows in which every value is null.
pub struct DropEmptyRows;

impl CleaningStep for DropEmptyRows {
    fn name(&self) -> &'static str {
        "drop_empty_rows"
    }

    fn apply(&self, table: &mut RecordTable, stats: &mut CleaningStats) {
        let before = table.len();
        table.retain_rows(|row| !row.is_empty_row());
        stats.dropped_empty += before - table.len();
    }
}

/// Parses date and numeric columns. A value that fails to parse drops the
/// row when the column is required and becomes null otherwise.
pub struct CoerceColumns {
    pub date_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub date_formats: Vec<String>,
    pub required: HashSet<String>,
}

impl CoerceColumns {
    fn coerce(&self, target: Target, value: &Value) -> Option<Value> {
        match target {
            Target::Date => DataType::Date.coerce(value, &self.date_formats),
            Target::Numeric => coerce_numeric(value),
        }
    }

    fn targets(&self) -> impl Iterator<Item = (&String, Target)> {
        self.date_columns
            .iter()
            .map(|c| (c, Target::Date))
            .chain(self.numeric_columns.iter().map(|c| (c, Target::Numeric)))
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Date,
    Numeric,
}

impl CleaningStep for CoerceColumns {
    fn name(&self) -> &'static str {
        "coerce_columns"
    }

    fn apply(&self, table: &mut RecordTable, stats: &mut CleaningStats) {
        let mut nulled = 0usize;
        let before = table.len();

        let rows = std::mem::take(&mut table.rows);
        for mut row in rows {
            let mut rejected = false;
            for (column, target) in self.targets() {
                let Some(value) = row.get_mut(column) else {
                    continue;
                };
                if value.is_null() {
                    continue;
                }
                match self.coerce(target, value) {
                    Some(coerced) => *value = coerced,
                    None if self.required.contains(column) => {
                        debug!("Rejecting row: `{column}` value `{value}` does not parse");
                        rejected = true;
                        break;
                    }
                    None => {
                        *value = Value::Null;
                        nulled += 1;
                    }
                }
            }
            if !rejected {
                table.rows.push(row);
            }
        }

        stats.dropped_coercion += before - table.len();
        if nulled > 0 {
            warn!("Set {nulled} unparseable optional value(s) to null");
        }
    }
}

/// Numeric view used for coercion: numbers stay as they are, numeric text is
/// parsed, anything else fails.
pub fn coerce_numeric(value: &Value) -> Option<Value> {
    match value {
        Value::Int(_) => Some(value.clone()),
        Value::Float(v) if v.is_finite() => Some(value.clone()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Drops rows that are missing a value in any required column.
pub struct RequireColumns {
    pub columns: Vec<String>,
}

impl CleaningStep for RequireColumns {
    fn name(&self) -> &'static str {
        "require_columns"
    }

    fn apply(&self, table: &mut RecordTable, stats: &mut CleaningStats) {
        let before = table.len();
        table.retain_rows(|row| self.columns.iter().all(|c| !row.is_missing(c)));
        stats.dropped_missing += before - table.len();
    }
}

/// Fills nulls in the listed columns. Never drops rows.
pub struct FillMissingValues {
    pub fill: FillMissing,
}

impl CleaningStep for FillMissingValues {
    fn name(&self) -> &'static str {
        "fill_missing"
    }

    fn apply(&self, table: &mut RecordTable, _stats: &mut CleaningStats) {
        for column in &self.fill.columns {
            if !table.has_column(column) {
                table.columns.push(column.clone());
            }
            match self.fill.strategy {
                FillStrategy::Zero => fill_with(table, column, Value::Int(0)),
                FillStrategy::Forward => fill_forward(table, column),
                FillStrategy::Backward => {
                    table.rows.reverse();
                    fill_forward(table, column);
                    table.rows.reverse();
                }
                FillStrategy::Mean => {
                    let numbers: Vec<f64> = table
                        .rows
                        .iter()
                        .filter_map(|r| r.get_value(column).and_then(Value::as_f64))
                        .collect();
                    if numbers.is_empty() {
                        warn!("Cannot mean-fill `{column}`: no numeric values");
                        continue;
                    }
                    let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
                    fill_with(table, column, Value::Float(mean));
                }
            }
        }
    }
}

fn fill_with(table: &mut RecordTable, column: &str, value: Value) {
    for row in table.rows.iter_mut().filter(|r| r.is_missing(column)) {
        row.set(column, value.clone());
    }
}

fn fill_forward(table: &mut RecordTable, column: &str) {
    let mut last: Option<Value> = None;
    for row in table.rows.iter_mut() {
        if row.is_missing(column) {
            if let Some(value) = &last {
                row.set(column, value.clone());
            }
        } else {
            last = row.get_value(column).cloned();
        }
    }
}

/// Keeps the first occurrence of every key. Without key columns the whole
/// row is the key.
pub struct Deduplicate {
    pub key: Option<Vec<String>>,
}

impl CleaningStep for Deduplicate {
    fn name(&self) -> &'static str {
        "deduplicate"
    }

    fn apply(&self, table: &mut RecordTable, stats: &mut CleaningStats) {
        let key_columns = match &self.key {
            Some(key) => key.clone(),
            None => table.columns.clone(),
        };

        let before = table.len();
        let mut seen: HashSet<Vec<Value>> = HashSet::with_capacity(before);
        table.retain_rows(|row| seen.insert(row.values_for(&key_columns)));
        stats.dropped_duplicate += before - table.len();
    }
}

/// Drops rows that fail any rule.
pub struct ApplyRules {
    pub rules: Vec<Rule>,
}

impl CleaningStep for ApplyRules {
    fn name(&self) -> &'static str {
        "apply_rules"
    }

    fn apply(&self, table: &mut RecordTable, stats: &mut CleaningStats) {
        let before = table.len();
        table.retain_rows(|row| self.rules.iter().all(|rule| rule.evaluate(row)));
        stats.dropped_rule += before - table.len();
    }
}
