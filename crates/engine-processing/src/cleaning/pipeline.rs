use model::{records::table::RecordTable, report::stats::CleaningStats};
use std::sync::Arc;
use tracing::{debug, info};

/// One table-level cleaning operation. A step that drops rows records the
/// count in its own `CleaningStats` counter.
pub trait CleaningStep: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, table: &mut RecordTable, stats: &mut CleaningStats);
}

pub trait CleaningPipelineExt {
    fn add_if<T, F>(self, condition: bool, factory: F) -> Self
    where
        T: CleaningStep + 'static,
        F: FnOnce() -> T;
}

/// Steps run in insertion order.
#[derive(Clone)]
pub struct CleaningPipeline {
    steps: Vec<Arc<dyn CleaningStep>>,
}

impl CleaningPipeline {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn add_step<T: CleaningStep + 'static>(mut self, step: T) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, mut table: RecordTable) -> (RecordTable, CleaningStats) {
        let mut stats = CleaningStats {
            input_rows: table.len(),
            ..CleaningStats::default()
        };

        for step in &self.steps {
            let before = table.len();
            step.apply(&mut table, &mut stats);
            let dropped = before - table.len();
            if dropped > 0 {
                info!("Cleaning step `{}` dropped {dropped} row(s)", step.name());
            } else {
                debug!("Cleaning step `{}` kept all {before} row(s)", step.name());
            }
        }

        stats.output_rows = table.len();
        (table, stats)
    }
}

impl CleaningPipelineExt for CleaningPipeline {
    fn add_if<T, F>(mut self, condition: bool, factory: F) -> Self
    where
        T: CleaningStep + 'static,
        F: FnOnce() -> T,
    {
        if condition {
            self = self.add_step(factory());
        }
        self
    }
}

impl Default for CleaningPipeline {
    fn default() -> Self {
        Self::new()
    }
}
