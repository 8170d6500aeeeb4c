use crate::state::PipelineStage;
use engine_processing::error::ProcessingError;
use model::report::manifest::SourceReport;
use serde::Serialize;
use thiserror::Error;

/// Cause of a failed pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("all {0} enabled source(s) failed")]
    AllSourcesFailed(usize),

    #[error("required source `{id}` failed: {reason}")]
    RequiredSourceFailed { id: String, reason: String },

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("invalid stage transition {from} -> {to}")]
    InvalidTransition {
        from: PipelineStage,
        to: PipelineStage,
    },
}

impl PipelineError {
    /// Taxonomy name of the cause.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::AllSourcesFailed(_) | PipelineError::RequiredSourceFailed { .. } => {
                "IngestionError"
            }
            PipelineError::Processing(e) => e.kind(),
            PipelineError::InvalidTransition { .. } => "InternalError",
        }
    }
}

/// Structured failure returned by a run: the stage it failed in, the cause,
/// and the per-source outcomes known at that point. No summary table is
/// included.
#[derive(Debug, Error)]
#[error("pipeline failed while {stage}: {error}")]
pub struct PipelineFailure {
    pub stage: PipelineStage,
    #[source]
    pub error: PipelineError,
    pub sources: Vec<SourceReport>,
}

impl PipelineFailure {
    pub fn report(&self) -> FailureReport<'_> {
        FailureReport {
            stage: self.stage,
            error_kind: self.error.kind(),
            reason: self.error.to_string(),
            sources: &self.sources,
        }
    }
}

/// Serializable view of a [`PipelineFailure`].
#[derive(Debug, Serialize)]
pub struct FailureReport<'a> {
    pub stage: PipelineStage,
    pub error_kind: &'static str,
    pub reason: String,
    pub sources: &'a [SourceReport],
}
