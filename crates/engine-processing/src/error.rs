use model::execution::errors::ConfigError;
use thiserror::Error;

/// Failures of the cleaning or aggregation stage. Both are fatal to a run.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("invalid cleaning configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("data integrity violation in aggregation `{aggregation}`: {reason}")]
    DataIntegrity { aggregation: String, reason: String },
}

impl ProcessingError {
    pub fn data_integrity(aggregation: &str, reason: impl Into<String>) -> Self {
        ProcessingError::DataIntegrity {
            aggregation: aggregation.to_string(),
            reason: reason.into(),
        }
    }

    /// Taxonomy name reported in manifests and failures.
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessingError::Config(_) => "ConfigError",
            ProcessingError::DataIntegrity { .. } => "DataIntegrityError",
        }
    }
}
