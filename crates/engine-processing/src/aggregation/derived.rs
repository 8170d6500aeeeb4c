use chrono::NaiveDate;
use model::{
    core::{utils::round_to, value::Value},
    execution::aggregation::{DerivedKind, DerivedMetric},
    records::row::Record,
};
use std::collections::HashMap;

/// Group values and bucket of one summary row.
pub type PartitionKey = (Vec<Value>, Option<NaiveDate>);

/// Appends derived metric columns. `keys` and `rows` are parallel and sorted
/// by group, then bucket.
pub fn apply_derived(derived: &[DerivedMetric], keys: &[PartitionKey], rows: &mut [Record]) {
    for metric in derived {
        let values: Vec<Value> = match metric.kind {
            DerivedKind::Share => shares(&metric.metric, keys, rows),
            DerivedKind::Change | DerivedKind::PctChange | DerivedKind::Trend => {
                changes(metric.kind, &metric.metric, keys, rows)
            }
        };
        for (row, value) in rows.iter_mut().zip(values) {
            row.set(&metric.name, value);
        }
    }
}

fn shares(metric: &str, keys: &[PartitionKey], rows: &[Record]) -> Vec<Value> {
    let mut totals: HashMap<Option<NaiveDate>, f64> = HashMap::new();
    for ((_, bucket), row) in keys.iter().zip(rows) {
        if let Some(v) = row.get_value(metric).and_then(Value::as_f64) {
            *totals.entry(*bucket).or_default() += v;
        }
    }

    keys.iter()
        .zip(rows)
        .map(|((_, bucket), row)| {
            let value = row.get_value(metric).and_then(Value::as_f64);
            let total = totals.get(bucket).copied().unwrap_or_default();
            match value {
                Some(v) if total != 0.0 => Value::Float(round_to(v / total * 100.0, 2)),
                _ => Value::Null,
            }
        })
        .collect()
}

fn changes(kind: DerivedKind, metric: &str, keys: &[PartitionKey], rows: &[Record]) -> Vec<Value> {
    (0..rows.len())
        .map(|i| {
            if i == 0 || keys[i - 1].0 != keys[i].0 {
                return Value::Null;
            }
            let current = rows[i].get_value(metric).unwrap_or(&Value::Null);
            let previous = rows[i - 1].get_value(metric).unwrap_or(&Value::Null);
            match kind {
                DerivedKind::PctChange => pct_change(current, previous),
                DerivedKind::Trend => direction(&difference(current, previous)),
                _ => difference(current, previous),
            }
        })
        .collect()
}

fn difference(current: &Value, previous: &Value) -> Value {
    if let (Value::Int(c), Value::Int(p)) = (current, previous) {
        if let Some(diff) = c.checked_sub(*p) {
            return Value::Int(diff);
        }
    }
    match (current.as_f64(), previous.as_f64()) {
        (Some(c), Some(p)) => Value::Float(c - p),
        _ => Value::Null,
    }
}

fn pct_change(current: &Value, previous: &Value) -> Value {
    match (current.as_f64(), previous.as_f64()) {
        (Some(c), Some(p)) if p != 0.0 => Value::Float(round_to((c - p) / p * 100.0, 2)),
        _ => Value::Null,
    }
}

fn direction(change: &Value) -> Value {
    match change.as_f64() {
        Some(v) if v > 0.0 => Value::from("up"),
        Some(v) if v < 0.0 => Value::from("down"),
        Some(_) => Value::from("flat"),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, 1, day)
    }

    fn key(group: &str, day: u32) -> PartitionKey {
        (vec![Value::from(group)], d(day))
    }

    fn row(total: Value) -> Record {
        Record::from_pairs([("total".to_string(), total)])
    }

    fn column(rows: &[Record], name: &str) -> Vec<Value> {
        rows.iter()
            .map(|r| r.get_value(name).cloned().unwrap_or(Value::Null))
            .collect()
    }

    #[test]
    fn test_share_per_bucket() {
        let keys = [key("A", 1), key("A", 2), key("B", 1), key("B", 2)];
        let mut rows = [
            row(Value::Int(1)),
            row(Value::Int(0)),
            row(Value::Int(3)),
            row(Value::Int(0)),
        ];
        let derived = [DerivedMetric {
            name: "share".into(),
            kind: DerivedKind::Share,
            metric: "total".into(),
        }];

        apply_derived(&derived, &keys, &mut rows);

        assert_eq!(
            column(&rows, "share"),
            [Value::Float(25.0), Value::Null, Value::Float(75.0), Value::Null]
        );
    }

    #[test]
    fn test_change_within_group_only() {
        let keys = [key("A", 1), key("A", 2), key("B", 1), key("B", 2)];
        let mut rows = [
            row(Value::Int(10)),
            row(Value::Int(15)),
            row(Value::Int(0)),
            row(Value::Float(2.5)),
        ];
        let derived = [
            DerivedMetric {
                name: "change".into(),
                kind: DerivedKind::Change,
                metric: "total".into(),
            },
            DerivedMetric {
                name: "pct".into(),
                kind: DerivedKind::PctChange,
                metric: "total".into(),
            },
        ];

        apply_derived(&derived, &keys, &mut rows);

        assert_eq!(
            column(&rows, "change"),
            [Value::Null, Value::Int(5), Value::Null, Value::Float(2.5)]
        );
        assert_eq!(
            column(&rows, "pct"),
            [Value::Null, Value::Float(50.0), Value::Null, Value::Null]
        );
    }

    #[test]
    fn test_trend_direction() {
        let keys = [key("A", 1), key("A", 2), key("A", 3), key("A", 4), key("B", 1)];
        let mut rows = [
            row(Value::Int(4)),
            row(Value::Int(6)),
            row(Value::Float(6.0)),
            row(Value::Null),
            row(Value::Int(1)),
        ];
        let derived = [DerivedMetric {
            name: "direction".into(),
            kind: DerivedKind::Trend,
            metric: "total".into(),
        }];

        apply_derived(&derived, &keys, &mut rows);

        assert_eq!(
            column(&rows, "direction"),
            [Value::Null, Value::from("up"), Value::from("flat"), Value::Null, Value::Null]
        );

        let mut falling = [row(Value::Int(9)), row(Value::Int(2))];
        apply_derived(&derived, &keys[..2], &mut falling);
        assert_eq!(column(&falling, "direction"), [Value::Null, Value::from("down")]);
    }
}
