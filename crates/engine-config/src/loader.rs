use crate::{
    env::{EnvContext, is_sensitive},
    settings::config::PipelineConfig,
};
use model::execution::errors::ConfigError;
use serde_json::Value as JsonValue;
use std::{fs, path::Path};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// `.json` files are JSON, everything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Reads a pipeline configuration and resolves `${NAME}` placeholders
/// against an [`EnvContext`].
pub struct ConfigLoader<'a> {
    env: &'a EnvContext,
}

impl<'a> ConfigLoader<'a> {
    pub fn new(env: &'a EnvContext) -> Self {
        Self { env }
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<PipelineConfig, ConfigError> {
        let path = path.as_ref();
        info!("Loading configuration from {}", path.display());

        let content = fs::read_to_string(path)?;
        self.load_str(&content, ConfigFormat::from_path(path))
            .map_err(|e| match e {
                ConfigError::Parse(reason) => {
                    ConfigError::Parse(format!("{}: {reason}", path.display()))
                }
                other => other,
            })
    }

    pub fn load_str(&self, content: &str, format: ConfigFormat) -> Result<PipelineConfig, ConfigError> {
        let mut tree: JsonValue = match format {
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
            ConfigFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
        };

        if tree.is_null() {
            tree = JsonValue::Object(Default::default());
        }

        resolve_placeholders(&mut tree, self.env)?;
        serde_json::from_value(tree).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Replaces every `${NAME}` inside string values of the tree. Keys are left
/// untouched.
pub fn resolve_placeholders(value: &mut JsonValue, env: &EnvContext) -> Result<(), ConfigError> {
    match value {
        JsonValue::String(text) => {
            if text.contains("${") {
                *text = substitute(text, env)?;
            }
            Ok(())
        }
        JsonValue::Array(items) => items
            .iter_mut()
            .try_for_each(|item| resolve_placeholders(item, env)),
        JsonValue::Object(map) => map
            .values_mut()
            .try_for_each(|item| resolve_placeholders(item, env)),
        _ => Ok(()),
    }
}

fn substitute(text: &str, env: &EnvContext) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };

        let name = &after[..end];
        if !is_placeholder_name(name) {
            out.push_str("${");
            rest = after;
            continue;
        }

        let resolved = env
            .get(name)
            .ok_or_else(|| ConfigError::UnresolvedSecret(name.to_string()))?;
        debug!(name, sensitive = is_sensitive(name), "Resolved configuration placeholder");

        out.push_str(&resolved);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
