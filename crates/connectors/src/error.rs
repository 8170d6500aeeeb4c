use model::execution::errors::ConfigError;
use thiserror::Error;

/// Failure of a single record source. Recoverable at the run level: the
/// orchestrator excludes the source's rows and carries on.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source not found: {0}")]
    NotFound(String),

    #[error("invalid source format: {0}")]
    Format(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("read cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SourceError {
    /// Taxonomy name reported in the run manifest.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::NotFound(_) => "SourceNotFoundError",
            SourceError::Format(_) => "SourceFormatError",
            SourceError::Auth(_) => "SourceAuthError",
            SourceError::Unavailable(_) => "SourceUnavailableError",
            SourceError::Cancelled => "Cancelled",
            SourceError::Config(_) => "ConfigError",
        }
    }

    /// Only transient endpoint failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }
}

impl From<csv::Error> for SourceError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                SourceError::NotFound(err.to_string())
            }
            _ => SourceError::Format(err.to_string()),
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound(err.to_string()),
            _ => SourceError::Unavailable(err.to_string()),
        }
    }
}
