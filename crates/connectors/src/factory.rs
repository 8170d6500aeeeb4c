use crate::{
    file::{csv::source::CsvSource, directory::DirectorySource, spreadsheet::SpreadsheetSource},
    http::source::EndpointSource,
    options::SourceOptions,
    source::{RecordSource, SourceKind},
};
use model::execution::errors::ConfigError;

/// Builds the source implementation selected by the configuration
/// discriminator. Each implementation validates its own options before any
/// I/O happens.
pub fn build_source(
    kind: SourceKind,
    id: &str,
    opts: &SourceOptions,
) -> Result<Box<dyn RecordSource>, ConfigError> {
    let source: Box<dyn RecordSource> = match kind {
        SourceKind::Csv => Box::new(CsvSource::from_options(id, opts)?),
        SourceKind::Excel => Box::new(SpreadsheetSource::from_options(id, opts)?),
        SourceKind::Folder => Box::new(DirectorySource::from_options(id, opts)?),
        SourceKind::Api => Box::new(EndpointSource::from_options(id, opts)?),
    };
    Ok(source)
}
