use crate::core::{
    utils::{parse_bool, parse_date, parse_iso_date, parse_number, parse_timestamp},
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Date,
    Timestamp,
}

impl DataType {
    /// Types tried in order when inferring the type of a text column.
    const INFERENCE_ORDER: [DataType; 6] = [
        DataType::Integer,
        DataType::Float,
        DataType::Boolean,
        DataType::Date,
        DataType::Timestamp,
        DataType::String,
    ];

    /// Parses raw text into a value of this type.
    ///
    /// `date_formats` are tried before the built-in date formats.
    pub fn parse(&self, raw: &str, date_formats: &[String]) -> Option<Value> {
        let raw = raw.trim();
        match self {
            DataType::Null => raw.is_empty().then_some(Value::Null),
            DataType::Boolean => parse_bool(raw).map(Value::Boolean),
            DataType::Integer => match parse_number(raw)? {
                Value::Int(v) => Some(Value::Int(v)),
                _ => None,
            },
            DataType::Float => parse_number(raw)?.as_f64().map(Value::Float),
            DataType::String => Some(Value::String(raw.to_string())),
            DataType::Date => parse_date(raw, date_formats).map(Value::Date),
            DataType::Timestamp => parse_timestamp(raw).map(Value::Timestamp),
        }
    }

    /// Coerces an already typed value into this type.
    ///
    /// Returns `None` when the value cannot be represented, `Some(Value::Null)`
    /// for null input.
    pub fn coerce(&self, value: &Value, date_formats: &[String]) -> Option<Value> {
        match (self, value) {
            (_, Value::Null) => Some(Value::Null),
            (_, Value::String(s)) => self.parse(s, date_formats),
            (DataType::Float, Value::Int(v)) => Some(Value::Float(*v as f64)),
            (DataType::Float, Value::Float(_)) => Some(value.clone()),
            (DataType::Integer, Value::Int(_)) => Some(value.clone()),
            (DataType::Integer, Value::Float(v)) if v.fract() == 0.0 && v.is_finite() => {
                Some(Value::Int(*v as i64))
            }
            (DataType::Date, Value::Date(_)) => Some(value.clone()),
            (DataType::Date, Value::Timestamp(ts)) => Some(Value::Date(ts.date())),
            (DataType::Timestamp, Value::Timestamp(_)) => Some(value.clone()),
            (DataType::Timestamp, Value::Date(d)) => d.and_hms_opt(0, 0, 0).map(Value::Timestamp),
            (DataType::Boolean, Value::Boolean(_)) => Some(value.clone()),
            (DataType::String, other) => Some(Value::String(other.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Null => "null",
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::String => "string",
            DataType::Date => "date",
            DataType::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Narrows the candidate type of a text column as samples are observed.
///
/// Each sample eliminates the candidates that cannot parse it. The inferred
/// type is the first surviving candidate, falling back to `String`.
///
/// Only ISO dates count as dates here. Day-first and month-first text stays
/// a string so the configured date formats decide how it is read.
#[derive(Debug, Clone)]
pub struct TypeInference {
    candidates: Vec<DataType>,
    seen: usize,
}

impl Default for TypeInference {
    fn default() -> Self {
        Self {
            candidates: DataType::INFERENCE_ORDER.to_vec(),
            seen: 0,
        }
    }
}

impl TypeInference {
    pub fn observe(&mut self, raw: &str) {
        if raw.trim().is_empty() {
            return;
        }
        self.seen += 1;
        self.candidates.retain(|ty| match ty {
            DataType::Date => parse_iso_date(raw).is_some(),
            _ => ty.parse(raw, &[]).is_some(),
        });
    }

    pub fn inferred(&self) -> DataType {
        if self.seen == 0 {
            return DataType::String;
        }
        self.candidates.first().copied().unwrap_or(DataType::String)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_numbers_with_separators() {
        assert_eq!(DataType::Float.parse("1,234.5", &[]), Some(Value::Float(1234.5)));
        assert_eq!(DataType::Integer.parse(" 42 ", &[]), Some(Value::Int(42)));
        assert_eq!(DataType::Integer.parse("4.2", &[]), None);
    }

    #[test]
    fn test_parse_date_with_custom_format() {
        let formats = vec!["%d %b %Y".to_string()];
        assert_eq!(
            DataType::Date.parse("03 Feb 2025", &formats),
            Some(Value::Date(NaiveDate::from_ymd_opt(2025, 2, 3).unwrap()))
        );
        assert_eq!(DataType::Date.parse("yesterday", &formats), None);
    }

    #[test]
    fn test_coerce_typed_values() {
        assert_eq!(DataType::Float.coerce(&Value::Int(2), &[]), Some(Value::Float(2.0)));
        assert_eq!(DataType::Integer.coerce(&Value::Float(2.5), &[]), None);
        assert_eq!(DataType::Date.coerce(&Value::Null, &[]), Some(Value::Null));
        assert_eq!(DataType::Date.coerce(&Value::Boolean(true), &[]), None);
    }

    #[test]
    fn test_inference_narrows_candidates() {
        let mut inference = TypeInference::default();
        for sample in ["1", "2", ""] {
            inference.observe(sample);
        }
        assert_eq!(inference.inferred(), DataType::Integer);

        inference.observe("2.5");
        assert_eq!(inference.inferred(), DataType::Float);

        inference.observe("abc");
        assert_eq!(inference.inferred(), DataType::String);
    }

    #[test]
    fn test_inference_of_dates() {
        let mut inference = TypeInference::default();
        inference.observe("2025-01-01");
        inference.observe("2025-01-02");
        assert_eq!(inference.inferred(), DataType::Date);

        let mut timestamps = TypeInference::default();
        timestamps.observe("2025-01-01T08:30:00");
        timestamps.observe("2025-01-02 17:00:00");
        assert_eq!(timestamps.inferred(), DataType::Timestamp);
    }

    #[test]
    fn test_inference_leaves_ambiguous_dates_as_text() {
        for sample in ["01/02/2025", "01.02.2025", "2025/01/02"] {
            let mut inference = TypeInference::default();
            inference.observe(sample);
            assert_eq!(inference.inferred(), DataType::String, "{sample}");
        }

        let mut mixed = TypeInference::default();
        mixed.observe("2025-01-01");
        mixed.observe("02/01/2025");
        assert_eq!(mixed.inferred(), DataType::String);
    }
}
