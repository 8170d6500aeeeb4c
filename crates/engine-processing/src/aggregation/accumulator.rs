use crate::cleaning::steps::coerce_numeric;
use model::{core::value::Value, execution::aggregation::MetricOp};
use std::cmp::Ordering;

/// Running state of one metric over one partition.
#[derive(Debug, Clone)]
pub enum Accumulator {
    Sum {
        int_total: i64,
        float_total: f64,
        is_float: bool,
    },
    Mean {
        total: f64,
        n: u64,
    },
    Count {
        n: u64,
        rows: bool,
    },
    Min(Option<Value>),
    Max(Option<Value>),
    Median(Vec<f64>),
    /// Welford's running mean and sum of squared deviations.
    Std {
        n: u64,
        mean: f64,
        m2: f64,
    },
}

impl Accumulator {
    pub fn new(op: MetricOp, count_rows: bool) -> Self {
        match op {
            MetricOp::Sum => Accumulator::Sum {
                int_total: 0,
                float_total: 0.0,
                is_float: false,
            },
            MetricOp::Mean => Accumulator::Mean { total: 0.0, n: 0 },
            MetricOp::Count => Accumulator::Count {
                n: 0,
                rows: count_rows,
            },
            MetricOp::Min => Accumulator::Min(None),
            MetricOp::Max => Accumulator::Max(None),
            MetricOp::Median => Accumulator::Median(Vec::new()),
            MetricOp::Std => Accumulator::Std {
                n: 0,
                mean: 0.0,
                m2: 0.0,
            },
        }
    }

    /// Folds one row's value in. `None` means the row has no such column.
    /// Null and, for numeric operations, non-numeric values are ignored.
    pub fn update(&mut self, value: Option<&Value>) {
        if let Accumulator::Count { n, rows: true } = self {
            *n += 1;
            return;
        }

        let Some(value) = value.filter(|v| !v.is_null()) else {
            return;
        };

        match self {
            Accumulator::Sum {
                int_total,
                float_total,
                is_float,
            } => match coerce_numeric(value) {
                Some(Value::Int(v)) => match int_total.checked_add(v) {
                    Some(total) if !*is_float => *int_total = total,
                    _ => {
                        *is_float = true;
                        *float_total += v as f64;
                    }
                },
                Some(Value::Float(v)) => {
                    *is_float = true;
                    *float_total += v;
                }
                _ => {}
            },
            Accumulator::Mean { total, n } => {
                if let Some(v) = value.as_f64() {
                    *total += v;
                    *n += 1;
                }
            }
            Accumulator::Count { n, .. } => *n += 1,
            Accumulator::Min(best) => keep_if(best, value, Ordering::Less),
            Accumulator::Max(best) => keep_if(best, value, Ordering::Greater),
            Accumulator::Median(values) => values.extend(value.as_f64()),
            Accumulator::Std { n, mean, m2 } => {
                if let Some(v) = value.as_f64() {
                    *n += 1;
                    let delta = v - *mean;
                    *mean += delta / *n as f64;
                    *m2 += delta * (v - *mean);
                }
            }
        }
    }

    pub fn finish(&self) -> Value {
        match self {
            Accumulator::Sum {
                int_total,
                float_total,
                is_float,
            } => {
                if *is_float {
                    Value::Float(*int_total as f64 + float_total)
                } else {
                    Value::Int(*int_total)
                }
            }
            Accumulator::Mean { total, n } => {
                if *n == 0 {
                    Value::Null
                } else {
                    Value::Float(total / *n as f64)
                }
            }
            Accumulator::Count { n, .. } => Value::Int(*n as i64),
            Accumulator::Min(best) | Accumulator::Max(best) => best.clone().unwrap_or(Value::Null),
            Accumulator::Median(values) => median(values).map(Value::Float).unwrap_or(Value::Null),
            Accumulator::Std { n, m2, .. } => {
                if *n < 2 {
                    Value::Null
                } else {
                    Value::Float((m2 / (*n - 1) as f64).sqrt())
                }
            }
        }
    }
}

/// Replaces `best` when `candidate` orders `wanted` against it.
///
/// Numbers take precedence: the first numeric value replaces a non-numeric
/// best, and once a number is held non-numeric values are skipped. Values
/// that do not compare with the current best are skipped.
fn keep_if(best: &mut Option<Value>, candidate: &Value, wanted: Ordering) {
    let holds_number = best.as_ref().is_some_and(is_number);
    let candidate = match coerce_numeric(candidate) {
        Some(number) => number,
        None if holds_number => return,
        None => candidate.clone(),
    };

    match best {
        Some(current) if holds_number || !is_number(&candidate) => {
            if candidate.compare(current) == Some(wanted) {
                *best = Some(candidate);
            }
        }
        _ => *best = Some(candidate),
    }
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Float(_))
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
