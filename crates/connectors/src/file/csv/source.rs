use crate::{
    error::SourceError,
    file::csv::{reader::read_csv_file, settings::CsvSettings},
    options::SourceOptions,
    source::{RecordSource, SourceKind, run_blocking},
};
use async_trait::async_trait;
use model::{execution::errors::ConfigError, records::table::RecordTable};
use serde_json::json;
use tracing::info;

pub struct CsvSource {
    id: String,
    settings: CsvSettings,
}

impl CsvSource {
    pub fn new(id: &str, settings: CsvSettings) -> Self {
        CsvSource {
            id: id.to_string(),
            settings,
        }
    }

    pub fn from_options(id: &str, opts: &SourceOptions) -> Result<Self, ConfigError> {
        Ok(Self::new(id, CsvSettings::from_options(opts)?))
    }
}

#[async_trait]
impl RecordSource for CsvSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Csv
    }

    fn describe(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "type": self.kind(),
            "path": self.settings.path.display().to_string(),
            "delimiter": (self.settings.delimiter as char).to_string(),
            "encoding": self.settings.encoding.name(),
            "skip_rows": self.settings.skip_rows,
            "has_headers": self.settings.has_headers,
        })
    }

    async fn read(&self) -> Result<RecordTable, SourceError> {
        info!("Reading CSV file: {}", self.settings.path.display());
        let settings = self.settings.clone();
        run_blocking(move || read_csv_file(&settings)).await
    }
}
