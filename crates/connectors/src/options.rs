use model::execution::errors::ConfigError;
use serde_json::{Map, Value as JsonValue};

/// Type-specific keys of one source entry, with typed accessors that name
/// the offending key on error.
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    context: String,
    values: Map<String, JsonValue>,
}

impl SourceOptions {
    pub fn new(source_id: &str, values: Map<String, JsonValue>) -> Self {
        SourceOptions {
            context: format!("source `{source_id}`"),
            values,
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    pub fn required_str(&self, key: &str) -> Result<String, ConfigError> {
        match self.optional_str(key)? {
            Some(value) if !value.trim().is_empty() => Ok(value),
            Some(_) => Err(self.invalid(key, "must not be empty")),
            None => Err(ConfigError::missing(&self.context, key)),
        }
    }

    pub fn optional_str(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.invalid(key, "expected a string")),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(JsonValue::Bool(b)) => Ok(*b),
            Some(_) => Err(self.invalid(key, "expected true or false")),
        }
    }

    pub fn u64_or(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_u64()
                .ok_or_else(|| self.invalid(key, "expected a non-negative integer")),
        }
    }

    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        self.u64_or(key, default as u64).map(|v| v as usize)
    }

    /// A single-byte delimiter such as `,` or `;`. `\t` is accepted as tab.
    pub fn delimiter_or(&self, key: &str, default: u8) -> Result<u8, ConfigError> {
        match self.optional_str(key)?.as_deref() {
            None => Ok(default),
            Some("\\t") | Some("\t") => Ok(b'\t'),
            Some(s) if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
            Some(_) => Err(self.invalid(key, "expected a single ASCII character")),
        }
    }

    /// A flat mapping of names to scalar values, rendered as strings.
    pub fn string_map(&self, key: &str) -> Result<Vec<(String, String)>, ConfigError> {
        let Some(value) = self.get(key) else {
            return Ok(Vec::new());
        };
        let JsonValue::Object(map) = value else {
            return Err(self.invalid(key, "expected a mapping"));
        };

        map.iter()
            .map(|(name, v)| match v {
                JsonValue::String(s) => Ok((name.clone(), s.clone())),
                JsonValue::Number(n) => Ok((name.clone(), n.to_string())),
                JsonValue::Bool(b) => Ok((name.clone(), b.to_string())),
                _ => Err(self.invalid(&format!("{key}.{name}"), "expected a scalar value")),
            })
            .collect()
    }

    /// Options nested under `key`, sharing this source's context.
    pub fn nested(&self, key: &str) -> Result<Option<SourceOptions>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(JsonValue::Object(map)) => Ok(Some(SourceOptions {
                context: format!("{}.{key}", self.context),
                values: map.clone(),
            })),
            Some(_) => Err(self.invalid(key, "expected a mapping")),
        }
    }

    pub fn invalid(&self, key: &str, reason: &str) -> ConfigError {
        ConfigError::invalid(&self.context, key, reason)
    }
}
