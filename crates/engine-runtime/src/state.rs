use crate::error::PipelineError;
use serde::Serialize;
use std::fmt;
use tracing::{error, info};
use uuid::Uuid;

/// Lifecycle of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Ingesting,
    Cleaning,
    Aggregating,
    Completed,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Completed | PipelineStage::Failed)
    }

    /// Whether `next` directly follows this stage. `Failed` is reachable
    /// from every non-terminal stage.
    pub fn can_transition_to(&self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        match (self, next) {
            (Idle, Ingesting) | (Ingesting, Cleaning) | (Cleaning, Aggregating) => true,
            (Aggregating, Completed) => true,
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Ingesting => "ingesting",
            PipelineStage::Cleaning => "cleaning",
            PipelineStage::Aggregating => "aggregating",
            PipelineStage::Completed => "completed",
            PipelineStage::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the stage of a single run and rejects out-of-order transitions.
#[derive(Debug)]
pub struct StageMachine {
    run_id: Uuid,
    stage: PipelineStage,
    history: Vec<PipelineStage>,
}

impl StageMachine {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            stage: PipelineStage::Idle,
            history: vec![PipelineStage::Idle],
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn history(&self) -> &[PipelineStage] {
        &self.history
    }

    pub fn advance(&mut self, next: PipelineStage) -> Result<(), PipelineError> {
        if !self.stage.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        info!(run_id = %self.run_id, "Pipeline stage {} -> {}", self.stage, next);
        self.stage = next;
        self.history.push(next);
        Ok(())
    }

    /// Moves to `Failed` and returns the stage the run failed in.
    pub fn fail(&mut self, cause: &PipelineError) -> PipelineStage {
        let failed_in = self.stage;
        error!(run_id = %self.run_id, "Pipeline failed while {failed_in}: {cause}");
        if self.stage.can_transition_to(PipelineStage::Failed) {
            self.stage = PipelineStage::Failed;
            self.history.push(PipelineStage::Failed);
        }
        failed_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PipelineStage::*;

    #[test]
    fn test_happy_path() {
        let mut machine = StageMachine::new(Uuid::new_v4());
        for stage in [Ingesting, Cleaning, Aggregating, Completed] {
            machine.advance(stage).unwrap();
        }
        assert_eq!(machine.history(), [Idle, Ingesting, Cleaning, Aggregating, Completed]);
    }

    #[test]
    fn test_rejects_skipping_stages() {
        let mut machine = StageMachine::new(Uuid::new_v4());
        let err = machine.advance(Cleaning).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidTransition {
                from: Idle,
                to: Cleaning
            }
        ));
        assert_eq!(machine.stage(), Idle);
    }

    #[test]
    fn test_failed_reachable_from_non_terminal_only() {
        for stage in [Idle, Ingesting, Cleaning, Aggregating] {
            assert!(stage.can_transition_to(Failed));
        }
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Idle));

        let mut machine = StageMachine::new(Uuid::new_v4());
        machine.advance(Ingesting).unwrap();
        let failed_in = machine.fail(&PipelineError::AllSourcesFailed(2));
        assert_eq!(failed_in, Ingesting);
        assert_eq!(machine.stage(), Failed);
    }
}
