use crate::error::SourceError;
use async_trait::async_trait;
use model::{execution::errors::ConfigError, records::table::RecordTable};
use serde::Serialize;
use std::{fmt, str::FromStr};

/// The configuration discriminator of a source entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Csv,
    Excel,
    Folder,
    Api,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Csv => "csv",
            SourceKind::Excel => "excel",
            SourceKind::Folder => "folder",
            SourceKind::Api => "api",
        }
    }
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(SourceKind::Csv),
            "excel" | "spreadsheet" => Ok(SourceKind::Excel),
            "folder" | "directory" => Ok(SourceKind::Folder),
            "api" | "endpoint" => Ok(SourceKind::Api),
            _ => Err(ConfigError::UnknownSourceType(s.to_string())),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured origin of raw records.
///
/// Implementations validate their own options when they are built, so a
/// constructed source is always ready to `read`. Reads are independent and
/// side-effect free; each call returns a fresh table.
#[async_trait]
pub trait RecordSource: Send + Sync {
    fn id(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Configuration summary with credentials redacted, safe to log.
    fn describe(&self) -> serde_json::Value;

    async fn read(&self) -> Result<RecordTable, SourceError>;
}

impl fmt::Debug for dyn RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSource")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Runs blocking file I/O off the async executor.
pub(crate) async fn run_blocking<F>(task: F) -> Result<RecordTable, SourceError>
where
    F: FnOnce() -> Result<RecordTable, SourceError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| SourceError::Unavailable(format!("reader task failed: {e}")))?
}
