use model::execution::errors::ConfigError;
use std::{collections::HashMap, fs, path::Path};

const SENSITIVE_PATTERNS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "key",
    "api_key",
    "apikey",
    "auth",
    "credential",
    "private",
];

/// Variables available to `${NAME}` placeholders in the configuration.
#[derive(Debug, Clone)]
pub struct EnvContext {
    vars: HashMap<String, String>,
}

impl EnvContext {
    /// Context seeded with the process environment.
    pub fn new() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn empty() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    /// Loads a `.env` file on top of the current variables. File entries win.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::Parse(format!("failed to read env file {}: {e}", path.display()))
        })?;

        let vars = parse_env_content(&content)?;
        self.merge(vars);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn merge(&mut self, vars: HashMap<String, String>) {
        self.vars.extend(vars);
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl Default for EnvContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a variable name looks like it holds a credential.
pub fn is_sensitive(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| name.contains(p))
}

/// Parses `KEY=VALUE` lines. Blank lines and `#` comments are ignored and
/// surrounding quotes are stripped from values.
pub fn parse_env_content(content: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut vars = HashMap::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::Parse(format!(
                "invalid env file: malformed line {} (expected KEY=VALUE)",
                line_num + 1
            )));
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::Parse(format!(
                "invalid env file: empty key at line {}",
                line_num + 1
            )));
        }

        vars.insert(key.to_string(), unquote_value(value));
    }

    Ok(vars)
}

fn unquote_value(value: &str) -> String {
    let value = value.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}
