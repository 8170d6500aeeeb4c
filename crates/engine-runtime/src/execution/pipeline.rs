use crate::{
    error::{PipelineError, PipelineFailure},
    execution::ingest::{SourceOutcome, ingest},
    state::{PipelineStage, StageMachine},
};
use chrono::Utc;
use engine_config::settings::validated::ValidatedConfig;
use engine_processing::{
    aggregation::{AggregationEngine, statistics::describe},
    cleaning::Cleaner,
};
use model::{
    records::table::RecordTable,
    report::manifest::{Manifest, SourceReport, SourceStatus},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Sequences ingestion, cleaning and aggregation for one validated
/// configuration. Holds no state between runs.
#[derive(Debug)]
pub struct Pipeline {
    config: ValidatedConfig,
}

impl Pipeline {
    pub fn new(config: ValidatedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    /// Runs the pipeline once. Cancelling `cancel` abandons reads still in
    /// flight; rows from sources that already finished are still processed.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<Manifest, PipelineFailure> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut machine = StageMachine::new(run_id);
        info!(%run_id, "Starting pipeline run");

        let fail = |machine: &mut StageMachine, error: PipelineError, sources: Vec<SourceReport>| {
            let stage = machine.fail(&error);
            PipelineFailure {
                stage,
                error,
                sources,
            }
        };

        // Ingesting
        if let Err(e) = machine.advance(PipelineStage::Ingesting) {
            return Err(fail(&mut machine, e, Vec::new()));
        }
        let outcomes = ingest(
            &self.config.sources,
            self.config.max_concurrent_sources,
            cancel,
        )
        .await;

        let (raw, mut reports) = match Self::merge(outcomes) {
            Ok(merged) => merged,
            Err((e, reports)) => return Err(fail(&mut machine, e, reports)),
        };
        if cancel.is_cancelled() {
            warn!(%run_id, "Run cancelled during ingestion; continuing with completed sources");
        }

        // Cleaning
        if let Err(e) = machine.advance(PipelineStage::Cleaning) {
            return Err(fail(&mut machine, e, reports));
        }
        let cleaner = match Cleaner::new(&self.config.cleaning) {
            Ok(cleaner) => cleaner,
            Err(e) => return Err(fail(&mut machine, e.into(), reports)),
        };
        let (clean, stats) = cleaner.clean(raw);
        Self::count_retained(&clean, &mut reports);

        // Aggregating
        if let Err(e) = machine.advance(PipelineStage::Aggregating) {
            return Err(fail(&mut machine, e, reports));
        }
        let mut summaries = Vec::with_capacity(self.config.aggregations.len());
        for spec in &self.config.aggregations {
            match AggregationEngine::new(spec) {
                Ok(engine) => summaries.push(engine.aggregate(&clean)),
                Err(e) => return Err(fail(&mut machine, e.into(), reports)),
            }
        }
        if let Some(statistics) = &self.config.statistics {
            summaries.push(describe(&clean, statistics));
        }

        if let Err(e) = machine.advance(PipelineStage::Completed) {
            return Err(fail(&mut machine, e, reports));
        }

        let manifest = Manifest {
            run_id,
            started_at,
            finished_at: Utc::now(),
            sources: reports,
            cleaning: stats,
            summaries,
        };
        info!(
            %run_id,
            sources = manifest.sources.len(),
            failed = manifest.failed_sources().count(),
            rows = stats.output_rows,
            summaries = manifest.summaries.len(),
            "Pipeline run completed"
        );
        Ok(manifest)
    }

    /// Concatenates successful reads. Fails when every enabled source failed
    /// or when a required source failed.
    fn merge(
        outcomes: Vec<SourceOutcome>,
    ) -> Result<(RecordTable, Vec<SourceReport>), (PipelineError, Vec<SourceReport>)> {
        let enabled = outcomes
            .iter()
            .filter(|o| !matches!(o.report.status, SourceStatus::Skipped))
            .count();
        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        let required_failure = outcomes
            .iter()
            .find(|o| o.required && o.is_failed())
            .map(|o| (o.report.id.clone(), failure_reason(&o.report)));

        let mut tables = Vec::with_capacity(outcomes.len());
        let mut reports = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            tables.extend(outcome.table);
            reports.push(outcome.report);
        }

        if enabled > 0 && failed == enabled {
            return Err((PipelineError::AllSourcesFailed(enabled), reports));
        }
        if let Some((id, reason)) = required_failure {
            return Err((PipelineError::RequiredSourceFailed { id, reason }, reports));
        }

        if failed > 0 {
            warn!("{failed} of {enabled} source(s) failed; continuing with the rest");
        }
        Ok((RecordTable::concat(tables), reports))
    }

    fn count_retained(clean: &RecordTable, reports: &mut [SourceReport]) {
        let mut retained = vec![0usize; reports.len()];
        for origin in clean.rows.iter().filter_map(|r| r.origin) {
            if let Some(count) = retained.get_mut(origin) {
                *count += 1;
            }
        }
        for (report, count) in reports.iter_mut().zip(retained) {
            report.rows_retained = count;
        }
    }
}

fn failure_reason(report: &SourceReport) -> String {
    match &report.status {
        SourceStatus::Failed { reason, .. } => reason.clone(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use connectors::{
        error::SourceError,
        source::{RecordSource, SourceKind},
    };
    use engine_config::settings::validated::{ConfiguredSource, ValidatedConfigBuilder};
    use model::{
        core::value::Value,
        execution::{
            aggregation::{AggregationSpec, MetricSpec, StatisticsSpec, TimeBucket},
            cleaning::CleaningSpec,
        },
        records::row::Record,
    };
    use chrono::NaiveDate;

    struct CannedSource {
        rows: Vec<Record>,
        fail: bool,
    }

    #[async_trait]
    impl RecordSource for CannedSource {
        fn id(&self) -> &str {
            "canned"
        }

        fn kind(&self) -> SourceKind {
            SourceKind::Csv
        }

        fn describe(&self) -> serde_json::Value {
            serde_json::json!({"type": "canned"})
        }

        async fn read(&self) -> Result<RecordTable, SourceError> {
            if self.fail {
                return Err(SourceError::Unavailable("connection refused".into()));
            }
            Ok(RecordTable::from_rows(self.rows.clone()))
        }
    }

    fn row(date: &str, cat: &str, value: &str) -> Record {
        Record::from_pairs([
            ("date".to_string(), Value::from(date)),
            ("cat".to_string(), Value::from(cat)),
            ("value".to_string(), Value::from(value)),
        ])
    }

    fn ok_source(id: &str, rows: Vec<Record>) -> ConfiguredSource {
        ConfiguredSource {
            id: id.to_string(),
            kind: SourceKind::Csv,
            required: false,
            reader: Some(Box::new(CannedSource { rows, fail: false })),
        }
    }

    fn failing_source(id: &str, required: bool) -> ConfiguredSource {
        ConfiguredSource {
            id: id.to_string(),
            kind: SourceKind::Api,
            required,
            reader: Some(Box::new(CannedSource {
                rows: Vec::new(),
                fail: true,
            })),
        }
    }

    fn daily_totals() -> AggregationSpec {
        AggregationSpec::new("daily")
            .group_by(&["cat"])
            .bucketed("date", TimeBucket::Day)
            .metric(MetricSpec::new("total", "value", "sum"))
    }

    fn cleaning() -> CleaningSpec {
        CleaningSpec {
            required_columns: vec!["date".into(), "value".into()],
            date_columns: vec!["date".into()],
            numeric_columns: vec!["value".into()],
            ..CleaningSpec::default()
        }
    }

    fn pipeline(sources: Vec<ConfiguredSource>) -> Pipeline {
        Pipeline::new(
            ValidatedConfigBuilder {
                sources,
                cleaning: Some(cleaning()),
                aggregations: vec![daily_totals()],
                ..ValidatedConfigBuilder::new()
            }
            .build(),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[tokio::test]
    async fn test_run_produces_daily_totals() {
        let pipeline = pipeline(vec![ok_source(
            "sales",
            vec![
                row("2025-01-01", "A", "5"),
                row("2025-01-01", "A", "3"),
                row("2025-01-02", "B", "10"),
            ],
        )]);

        let manifest = pipeline.run_once(&CancellationToken::new()).await.unwrap();

        let summary = manifest.summary("daily").unwrap();
        assert_eq!(summary.column("total"), vec![Value::Int(8), Value::Int(10)]);
        assert_eq!(summary.column("bucket"), vec![date(2025, 1, 1), date(2025, 1, 2)]);
        assert_eq!(manifest.cleaning.output_rows, 3);
        assert!(manifest.cleaning.is_balanced());
        assert!(manifest.started_at <= manifest.finished_at);
    }

    #[tokio::test]
    async fn test_failed_optional_source_is_reported() {
        let pipeline = pipeline(vec![
            ok_source("a", vec![row("2025-01-01", "A", "5")]),
            failing_source("b", false),
            ok_source("c", vec![row("2025-01-01", "A", "3"), row("", "A", "1")]),
        ]);

        let manifest = pipeline.run_once(&CancellationToken::new()).await.unwrap();

        let failed: Vec<&str> = manifest.failed_sources().map(|s| s.id.as_str()).collect();
        assert_eq!(failed, ["b"]);
        assert_eq!(manifest.summary("daily").unwrap().column("total"), vec![Value::Int(8)]);

        let c = manifest.source("c").unwrap();
        assert_eq!(c.rows_ingested, 2);
        assert_eq!(c.rows_retained, 1);
        assert_eq!(manifest.source("a").unwrap().rows_retained, 1);
    }

    #[tokio::test]
    async fn test_all_sources_failed() {
        let pipeline = pipeline(vec![failing_source("a", false), failing_source("b", false)]);

        let failure = pipeline.run_once(&CancellationToken::new()).await.unwrap_err();

        assert_eq!(failure.stage, PipelineStage::Ingesting);
        assert!(matches!(failure.error, PipelineError::AllSourcesFailed(2)));
        assert_eq!(failure.sources.len(), 2);
        assert_eq!(failure.report().error_kind, "IngestionError");
    }

    #[tokio::test]
    async fn test_required_source_failure_fails_run() {
        let pipeline = pipeline(vec![
            ok_source("a", vec![row("2025-01-01", "A", "5")]),
            failing_source("ledger", true),
        ]);

        let failure = pipeline.run_once(&CancellationToken::new()).await.unwrap_err();

        match failure.error {
            PipelineError::RequiredSourceFailed { ref id, ref reason } => {
                assert_eq!(id, "ledger");
                assert!(reason.contains("connection refused"));
            }
            ref other => panic!("unexpected error: {other}"),
        }
        assert_eq!(failure.stage, PipelineStage::Ingesting);
    }

    #[tokio::test]
    async fn test_bad_aggregation_fails_in_aggregating_stage() {
        let mut config = ValidatedConfigBuilder {
            sources: vec![ok_source("a", vec![row("2025-01-01", "A", "5")])],
            cleaning: Some(cleaning()),
            ..ValidatedConfigBuilder::new()
        };
        config.aggregations = vec![
            AggregationSpec::new("odd").metric(MetricSpec::new("mode", "value", "mode")),
        ];
        let pipeline = Pipeline::new(config.build());

        let failure = pipeline.run_once(&CancellationToken::new()).await.unwrap_err();

        assert_eq!(failure.stage, PipelineStage::Aggregating);
        assert_eq!(failure.report().error_kind, "DataIntegrityError");
        assert!(failure.sources[0].status.is_succeeded());
    }

    #[tokio::test]
    async fn test_statistics_follow_aggregations() {
        let mut config = ValidatedConfigBuilder {
            sources: vec![ok_source(
                "a",
                vec![row("2025-01-01", "A", "5"), row("2025-01-02", "B", "9")],
            )],
            cleaning: Some(cleaning()),
            aggregations: vec![daily_totals()],
            ..ValidatedConfigBuilder::new()
        };
        config.statistics = Some(StatisticsSpec::new("statistics"));

        let manifest = Pipeline::new(config.build())
            .run_once(&CancellationToken::new())
            .await
            .unwrap();

        let names: Vec<&str> = manifest.summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["daily", "statistics"]);
        let statistics = manifest.summary("statistics").unwrap();
        assert_eq!(statistics.column("column"), vec![Value::from("value")]);
        assert_eq!(statistics.column("median"), vec![Value::Float(7.0)]);
    }

    #[tokio::test]
    async fn test_runs_are_independent() {
        let pipeline = pipeline(vec![ok_source("a", vec![row("2025-01-01", "A", "5")])]);
        let cancel = CancellationToken::new();

        let first = pipeline.run_once(&cancel).await.unwrap();
        let second = pipeline.run_once(&cancel).await.unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(first.summaries, second.summaries);
    }
}
