use crate::settings::{
    config::{
        AggregationConfig, CleaningConfig, MetricConfig, PipelineConfig, RawSourceConfig,
        StatisticsConfig,
    },
    validated::{ConfiguredSource, ValidatedConfig, ValidatedConfigBuilder},
};
use connectors::{factory::build_source, options::SourceOptions, source::SourceKind};
use model::execution::{
    aggregation::{
        AggregationSpec, DerivedKind, DerivedMetric, MetricOp, MetricSpec, StatisticsSpec,
        TimeBucket, TopN,
    },
    cleaning::{CleaningSpec, FillMissing},
    errors::ConfigError,
    rule::Rule,
};
use std::collections::HashSet;
use tracing::{error, info, warn};

/// Validates a raw pipeline configuration and compiles it into the form the
/// pipeline consumes. Every problem found is reported, not just the first.
pub struct ConfigValidator<'a> {
    config: &'a PipelineConfig,
}

impl<'a> ConfigValidator<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        info!(
            "Validating configuration: {} source(s), {} aggregation(s), {} rule(s)",
            self.config.sources.len(),
            self.config.aggregations.len(),
            self.config.cleaning.rules.len()
        );

        let mut builder = ValidatedConfigBuilder::new();
        let mut errors: Vec<String> = Vec::new();

        self.validate_ingestion(&mut builder, &mut errors);
        self.validate_sources(&mut builder, &mut errors);
        self.validate_cleaning(&mut builder, &mut errors);
        self.validate_aggregations(&mut builder, &mut errors);
        if let Some(statistics) = &self.config.statistics {
            self.validate_statistics(statistics, &mut builder, &mut errors);
        }

        if !errors.is_empty() {
            for problem in &errors {
                error!("Invalid configuration: {problem}");
            }
            return Err(ConfigError::ValidationFailed(errors));
        }

        let validated = builder.build();
        info!(
            "Configuration validated: {} enabled source(s), {} aggregation(s)",
            validated.enabled_sources().count(),
            validated.aggregations.len()
        );
        Ok(validated)
    }

    fn validate_ingestion(&self, builder: &mut ValidatedConfigBuilder, errors: &mut Vec<String>) {
        let limit = self.config.ingestion.max_concurrent_sources;
        if limit == 0 {
            errors.push("ingestion.max_concurrent_sources must be at least 1".to_string());
            return;
        }
        builder.max_concurrent_sources = Some(limit);
    }

    fn validate_sources(&self, builder: &mut ValidatedConfigBuilder, errors: &mut Vec<String>) {
        if self.config.sources.is_empty() {
            errors.push("no sources configured".to_string());
            return;
        }

        let mut seen = HashSet::new();
        for (index, raw) in self.config.sources.iter().enumerate() {
            let id = raw.id_or_default(index);
            if !seen.insert(id.clone()) {
                errors.push(format!("duplicate source id `{id}`"));
                continue;
            }

            match Self::configure_source(raw, &id) {
                Ok(source) => builder.sources.push(source),
                Err(e) => errors.push(format!("sources[{index}] (`{id}`): {e}")),
            }
        }

        if !builder.sources.is_empty() && builder.sources.iter().all(|s| !s.is_enabled()) {
            errors.push("every configured source is disabled".to_string());
        }
    }

    fn configure_source(raw: &RawSourceConfig, id: &str) -> Result<ConfiguredSource, ConfigError> {
        let kind: SourceKind = raw.kind.parse()?;

        if !raw.enabled {
            info!(source = id, "Source `{id}` is disabled and will be skipped");
            return Ok(ConfiguredSource {
                id: id.to_string(),
                kind,
                required: raw.required,
                reader: None,
            });
        }

        let opts = SourceOptions::new(id, raw.options.clone());
        let reader = build_source(kind, id, &opts)?;

        Ok(ConfiguredSource {
            id: id.to_string(),
            kind,
            required: raw.required,
            reader: Some(reader),
        })
    }

    fn validate_cleaning(&self, builder: &mut ValidatedConfigBuilder, errors: &mut Vec<String>) {
        let cleaning: &CleaningConfig = &self.config.cleaning;

        let mut rules = Vec::with_capacity(cleaning.rules.len());
        for (index, rule) in cleaning.rules.iter().enumerate() {
            match Rule::compile(&rule.column, &rule.condition, &rule.value) {
                Ok(rule) => rules.push(rule),
                Err(e) => errors.push(format!("cleaning.rules[{index}]: {e}")),
            }
        }

        let spec = CleaningSpec {
            required_columns: cleaning.required_columns.clone(),
            date_columns: cleaning.date_columns.clone(),
            numeric_columns: cleaning.numeric_columns.clone(),
            date_formats: cleaning.date_formats.clone(),
            dedup_key: cleaning.dedup_key.clone(),
            drop_duplicates: cleaning.drop_duplicates,
            drop_empty_rows: cleaning.drop_empty_rows,
            standardize_strings: cleaning.standardize_strings,
            fill_missing: cleaning.fill_missing.as_ref().map(|fill| FillMissing {
                strategy: fill.strategy,
                columns: fill.columns.clone(),
            }),
            rules,
        };

        if let Err(e) = spec.check() {
            errors.push(format!("cleaning: {e}"));
            return;
        }

        if spec.dedup_key.is_some() && !spec.drop_duplicates {
            warn!("cleaning.dedup_key is set but drop_duplicates is disabled; the key is ignored");
        }

        builder.cleaning = Some(spec);
    }

    fn validate_aggregations(
        &self,
        builder: &mut ValidatedConfigBuilder,
        errors: &mut Vec<String>,
    ) {
        let mut names = HashSet::new();
        for (index, aggregation) in self.config.aggregations.iter().enumerate() {
            let label = if aggregation.name.trim().is_empty() {
                format!("aggregations[{index}]")
            } else {
                format!("aggregation `{}`", aggregation.name)
            };

            if !aggregation.name.trim().is_empty() && !names.insert(aggregation.name.clone()) {
                errors.push(format!("{label}: duplicate aggregation name"));
                continue;
            }

            match Self::compile_aggregation(aggregation) {
                Ok(spec) => builder.aggregations.push(spec),
                Err(problems) => {
                    errors.extend(problems.into_iter().map(|p| format!("{label}: {p}")));
                }
            }
        }
    }

    fn validate_statistics(
        &self,
        config: &StatisticsConfig,
        builder: &mut ValidatedConfigBuilder,
        errors: &mut Vec<String>,
    ) {
        let name = config.name.trim();
        if name.is_empty() {
            errors.push("statistics: name must not be empty".to_string());
            return;
        }
        if self.config.aggregations.iter().any(|a| a.name == name) {
            errors.push(format!("statistics: name `{name}` is already used by an aggregation"));
            return;
        }
        if config.columns.iter().any(|c| c.trim().is_empty()) {
            errors.push("statistics: column names must not be empty".to_string());
            return;
        }

        builder.statistics = Some(StatisticsSpec {
            name: name.to_string(),
            columns: config.columns.iter().map(|c| c.trim().to_string()).collect(),
        });
    }

    fn compile_aggregation(config: &AggregationConfig) -> Result<AggregationSpec, Vec<String>> {
        let mut problems = Vec::new();

        if config.name.trim().is_empty() {
            problems.push("name is required".to_string());
        }

        let time_bucket = match config.time_bucket.as_deref() {
            None => TimeBucket::None,
            Some(raw) => raw.parse::<TimeBucket>().unwrap_or_else(|e| {
                problems.push(e);
                TimeBucket::None
            }),
        };

        let date_column = config
            .date_column
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        if time_bucket.is_bucketed() && date_column.is_none() {
            problems.push(format!(
                "time_bucket `{}` requires a date_column",
                config.time_bucket.as_deref().unwrap_or_default()
            ));
        }

        if config.bucket_column.trim().is_empty() {
            problems.push("bucket_column must not be empty".to_string());
        }

        let mut metrics = Vec::with_capacity(config.metrics.len());
        for (name, metric) in &config.metrics {
            match Self::compile_metric(name, metric) {
                Ok(spec) => metrics.push(spec),
                Err(problem) => problems.push(problem),
            }
        }

        let mut spec = AggregationSpec {
            name: config.name.clone(),
            group_by: config.group_by.clone(),
            date_column,
            time_bucket,
            bucket_column: config.bucket_column.clone(),
            metrics,
            derived: Vec::new(),
            top: None,
        };

        let metric_names: HashSet<String> =
            spec.effective_metrics().into_iter().map(|m| m.name).collect();
        for derived in &config.derived {
            let kind = match derived.kind.parse::<DerivedKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    problems.push(format!("derived metric `{}`: {e}", derived.name));
                    continue;
                }
            };
            if !metric_names.contains(&derived.metric) {
                problems.push(format!(
                    "derived metric `{}` references unknown metric `{}`",
                    derived.name, derived.metric
                ));
                continue;
            }
            spec.derived.push(DerivedMetric {
                name: derived.name.clone(),
                kind,
                metric: derived.metric.clone(),
            });
        }

        if let Some(top) = &config.top {
            let by = top
                .by
                .as_deref()
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(str::to_string)
                .or_else(|| spec.effective_metrics().first().map(|m| m.name.clone()))
                .unwrap_or_default();
            let ranked = metric_names.contains(&by) || spec.derived.iter().any(|d| d.name == by);
            if top.limit == 0 {
                problems.push("top.limit must be at least 1".to_string());
            } else if !ranked {
                problems.push(format!("top.by references unknown metric `{by}`"));
            } else {
                spec.top = Some(TopN {
                    metric: by,
                    limit: top.limit,
                });
            }
        }

        let mut columns = HashSet::new();
        for column in spec.output_columns() {
            if column.trim().is_empty() {
                problems.push("output column names must not be empty".to_string());
            } else if !columns.insert(column.clone()) {
                problems.push(format!("output column `{column}` is defined more than once"));
            }
        }

        if problems.is_empty() {
            Ok(spec)
        } else {
            Err(problems)
        }
    }

    fn compile_metric(name: &str, metric: &MetricConfig) -> Result<MetricSpec, String> {
        match metric {
            MetricConfig::Operation(operation) => Ok(MetricSpec {
                name: name.to_string(),
                column: Some(name.to_string()),
                operation: operation.clone(),
                count_rows: false,
            }),
            MetricConfig::Detailed(definition) => {
                let counts = matches!(definition.operation.parse::<MetricOp>(), Ok(MetricOp::Count));
                let column = definition
                    .column
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string);

                if column.is_none() && !counts {
                    return Err(format!("metric `{name}` requires a column"));
                }

                Ok(MetricSpec {
                    name: name.to_string(),
                    column: column.clone(),
                    operation: definition.operation.clone(),
                    count_rows: definition.count_rows || (counts && column.is_none()),
                })
            }
        }
    }
}
