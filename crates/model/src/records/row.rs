use crate::core::value::Value;
use serde::{Serialize, Serializer, ser::SerializeMap};

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: Value,
}

impl Field {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Field {
            name: name.into(),
            value,
        }
    }
}

/// One row of a record table: an ordered, open mapping from column name to
/// value.
///
/// `origin` is the index of the source the row was ingested from. It is
/// bookkeeping only and does not take part in equality.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub fields: Vec<Field>,
    pub origin: Option<usize>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut record = Record::new();
        for (name, value) in pairs {
            record.set(&name, value);
        }
        record
    }

    pub fn with_origin(mut self, origin: usize) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.get(name).map(|f| &f.value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|f| f.name == name)
            .map(|f| &mut f.value)
    }

    /// Sets a column, replacing an existing value in place or appending a new
    /// column at the end.
    pub fn set(&mut self, name: &str, value: Value) {
        match self.get_mut(name) {
            Some(slot) => *slot = value,
            None => self.fields.push(Field::new(name, value)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// True when the column is absent or null.
    pub fn is_missing(&self, name: &str) -> bool {
        self.get_value(name).is_none_or(Value::is_null)
    }

    pub fn is_empty_row(&self) -> bool {
        self.fields.iter().all(|f| f.value.is_null())
    }

    /// Values of the given columns in the given order, `Null` for absent ones.
    pub fn values_for(&self, columns: &[String]) -> Vec<Value> {
        columns
            .iter()
            .map(|c| self.get_value(c).cloned().unwrap_or(Value::Null))
            .collect()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            map.serialize_entry(&field.name, &field.value)?;
        }
        map.end()
    }
}
