use thiserror::Error;

/// Misconfiguration detected before or while a run starts. Always fatal and
/// never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required key `{key}` in {context}")]
    MissingKey { context: String, key: String },

    #[error("invalid value for `{key}` in {context}: {reason}")]
    InvalidKey {
        context: String,
        key: String,
        reason: String,
    },

    #[error("unknown source type `{0}`")]
    UnknownSourceType(String),

    #[error("unknown condition operator `{0}`")]
    UnknownOperator(String),

    #[error("invalid operand for `{column} {condition}`: {reason}")]
    InvalidOperand {
        column: String,
        condition: String,
        reason: String,
    },

    #[error("unresolved secret placeholder `${{{0}}}`")]
    UnresolvedSecret(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Invalid(String),

    #[error("configuration is invalid: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
}

impl ConfigError {
    pub fn missing(context: impl Into<String>, key: impl Into<String>) -> Self {
        ConfigError::MissingKey {
            context: context.into(),
            key: key.into(),
        }
    }

    pub fn invalid(
        context: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidKey {
            context: context.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_key() {
        let err = ConfigError::missing("source `sales`", "path");
        assert_eq!(err.to_string(), "missing required key `path` in source `sales`");

        let err = ConfigError::UnresolvedSecret("API_TOKEN".into());
        assert_eq!(err.to_string(), "unresolved secret placeholder `${API_TOKEN}`");
    }
}
