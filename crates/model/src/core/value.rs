use crate::core::{
    data_type::DataType,
    utils::{parse_date, parse_number},
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

/// An untyped scalar cell as produced by a record source.
///
/// Equality, hashing and `Ord` are structural (an `Int(1)` is not equal to a
/// `Float(1.0)`), which is what deduplication and group keys need. Use
/// [`Value::compare`] for value-level comparisons across numeric and temporal
/// representations.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value. Strings are parsed, booleans and temporal
    /// values are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) if v.is_finite() => Some(*v),
            Value::String(v) => parse_number(v).and_then(|n| n.as_f64()),
            _ => None,
        }
    }

    /// Calendar date of the value, parsing strings with the default formats.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Timestamp(ts) => Some(ts.date()),
            Value::String(s) => parse_date(s, &[]),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Compares two values by meaning rather than by representation.
    ///
    /// Integers and floats compare numerically, dates compare with
    /// timestamps and with date-like strings, and numeric strings compare
    /// with numbers. Returns `None` when the two values are not comparable
    /// (including any comparison involving `Null`).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Int(_) | Float(_), Int(_) | Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (String(a), String(b)) => Some(a.cmp(b)),
            (Date(a), Date(b)) => Some(a.cmp(b)),
            (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
            (Date(a), Timestamp(b)) => Some(a.cmp(&b.date())),
            (Timestamp(a), Date(b)) => Some(a.date().cmp(b)),
            (Date(_) | Timestamp(_), String(_)) => self.as_date()?.partial_cmp(&other.as_date()?),
            (String(_), Date(_) | Timestamp(_)) => self.as_date()?.partial_cmp(&other.as_date()?),
            (Int(_) | Float(_), String(_)) | (String(_), Int(_) | Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            _ => None,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Boolean(_) => DataType::Boolean,
            Value::Int(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::String(_) => DataType::String,
            Value::Date(_) => DataType::Date,
            Value::Timestamp(_) => DataType::Timestamp,
        }
    }

    /// Maps a JSON scalar onto a cell. Nested arrays and objects are kept as
    /// their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Date(_) => 4,
            Value::Timestamp(_) => 5,
            Value::String(_) => 6,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order used for sorting group keys: nulls first, then by kind, then
/// by value. Floats use `f64::total_cmp` so the order agrees with `Hash`.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        use Value::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Boolean(a), Boolean(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use Value::*;
        std::mem::discriminant(self).hash(state);
        match self {
            Null => {}
            Boolean(v) => v.hash(state),
            Int(v) => v.hash(state),
            // Hash the bits of the float to stay consistent with `total_cmp`
            Float(v) => v.to_bits().hash(state),
            String(v) => v.hash(state),
            Date(v) => v.hash(state),
            Timestamp(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn date(s: &str) -> Value {
        Value::Date(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
    }

    #[test]
    fn test_compare_crosses_numeric_representations() {
        assert_eq!(Value::Int(3).compare(&Value::Float(2.5)), Some(Ordering::Greater));
        assert_eq!(
            Value::String("10".into()).compare(&Value::Int(9)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Int(1).compare(&Value::Float(1.0)), Some(Ordering::Equal));
    }

    #[test]
    fn test_compare_dates_with_strings() {
        let d = date("2025-01-02");
        assert_eq!(
            d.compare(&Value::String("2025-01-01".into())),
            Some(Ordering::Greater)
        );
        assert_eq!(d.compare(&Value::String("not a date".into())), None);
    }

    #[test]
    fn test_null_is_never_comparable() {
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert_eq!(Value::Int(1).compare(&Value::Null), None);
    }

    #[test]
    fn test_structural_equality_for_keys() {
        let mut set = HashSet::new();
        set.insert(Value::Int(1));
        set.insert(Value::Float(1.0));
        set.insert(Value::Int(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_total_order_puts_null_first() {
        let mut values = vec![
            Value::String("b".into()),
            Value::Null,
            Value::Int(2),
            Value::String("a".into()),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Int(2),
                Value::String("a".into()),
                Value::String("b".into()),
            ]
        );
    }

    #[test]
    fn test_from_json_keeps_nested_as_text() {
        let json = serde_json::json!({"a": [1, 2]});
        assert_eq!(Value::from_json(&json["a"]), Value::String("[1,2]".into()));
        assert_eq!(Value::from_json(&serde_json::json!(7)), Value::Int(7));
        assert_eq!(Value::from_json(&serde_json::json!(1.5)), Value::Float(1.5));
    }

    #[test]
    fn test_serializes_as_plain_json_scalars() {
        let row = vec![Value::Null, Value::Int(8), date("2025-01-01")];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[null,8,"2025-01-01"]"#);
    }
}
