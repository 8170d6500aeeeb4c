use connectors::{error::SourceError, source::RecordSource};
use engine_config::settings::validated::ConfiguredSource;
use futures::{StreamExt, stream};
use model::{
    records::table::RecordTable,
    report::manifest::{SourceReport, SourceStatus},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Result of reading one configured source.
#[derive(Debug)]
pub struct SourceOutcome {
    /// Position of the source in the configuration.
    pub index: usize,
    pub report: SourceReport,
    pub required: bool,
    /// Rows tagged with `index` as their origin. `None` unless the read
    /// succeeded.
    pub table: Option<RecordTable>,
}

impl SourceOutcome {
    pub fn is_failed(&self) -> bool {
        self.report.status.is_failed()
    }
}

/// Reads every enabled source with at most `limit` reads in flight. Outcomes
/// come back in configuration order, disabled sources included as skipped.
pub async fn ingest(
    sources: &[ConfiguredSource],
    limit: usize,
    cancel: &CancellationToken,
) -> Vec<SourceOutcome> {
    let enabled = sources.iter().filter(|s| s.is_enabled()).count();
    info!("Reading {enabled} source(s), at most {} at a time", limit.max(1));

    stream::iter(sources.iter().enumerate())
        .map(|(index, source)| read_one(index, source, cancel))
        .buffered(limit.max(1))
        .collect()
        .await
}

async fn read_one(
    index: usize,
    source: &ConfiguredSource,
    cancel: &CancellationToken,
) -> SourceOutcome {
    let mut report = SourceReport {
        id: source.id.clone(),
        kind: source.kind.as_str().to_string(),
        status: SourceStatus::Skipped,
        rows_ingested: 0,
        rows_retained: 0,
    };

    let Some(reader) = source.reader.as_deref() else {
        info!(source = %source.id, "Skipping disabled source");
        return SourceOutcome {
            index,
            report,
            required: source.required,
            table: None,
        };
    };

    let table = match read_cancellable(reader, cancel).await {
        Ok(table) => {
            info!(source = %source.id, rows = table.len(), "Source read completed");
            report.status = SourceStatus::Succeeded;
            report.rows_ingested = table.len();
            Some(table.with_origin(index))
        }
        Err(e) => {
            if matches!(e, SourceError::Cancelled) {
                warn!(source = %source.id, "Source read abandoned: run cancelled");
            } else {
                error!(source = %source.id, kind = e.kind(), "Source read failed: {e}");
            }
            report.status = SourceStatus::Failed {
                error_kind: e.kind().to_string(),
                reason: e.to_string(),
            };
            None
        }
    };

    SourceOutcome {
        index,
        report,
        required: source.required,
        table,
    }
}

async fn read_cancellable(
    reader: &dyn RecordSource,
    cancel: &CancellationToken,
) -> Result<RecordTable, SourceError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SourceError::Cancelled),
        result = reader.read() => result,
    }
}
