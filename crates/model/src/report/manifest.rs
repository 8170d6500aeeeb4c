use crate::report::{stats::CleaningStats, summary::SummaryTable};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SourceStatus {
    Succeeded,
    Failed { error_kind: String, reason: String },
    Skipped,
}

impl SourceStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, SourceStatus::Failed { .. })
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, SourceStatus::Succeeded)
    }
}

/// Outcome of one configured source within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub id: String,
    pub kind: String,
    pub status: SourceStatus,
    pub rows_ingested: usize,
    pub rows_retained: usize,
}

/// Bookkeeping for one completed pipeline run, handed to reporting.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    pub cleaning: CleaningStats,
    pub summaries: Vec<SummaryTable>,
}

impl Manifest {
    pub fn summary(&self, name: &str) -> Option<&SummaryTable> {
        self.summaries.iter().find(|s| s.name == name)
    }

    pub fn source(&self, id: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| s.status.is_failed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let failed = SourceStatus::Failed {
            error_kind: "SourceAuthError".into(),
            reason: "401".into(),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({"state": "failed", "error_kind": "SourceAuthError", "reason": "401"})
        );
        assert_eq!(
            serde_json::to_value(SourceStatus::Skipped).unwrap(),
            serde_json::json!({"state": "skipped"})
        );
    }
}
