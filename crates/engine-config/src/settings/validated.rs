use crate::settings::config::DEFAULT_MAX_CONCURRENT_SOURCES;
use connectors::source::{RecordSource, SourceKind};
use model::execution::{
    aggregation::{AggregationSpec, StatisticsSpec},
    cleaning::CleaningSpec,
};

/// A configured source. Disabled sources keep their identity for reporting
/// but carry no reader.
#[derive(Debug)]
pub struct ConfiguredSource {
    pub id: String,
    pub kind: SourceKind,
    /// A failure of this source fails the whole run.
    pub required: bool,
    pub reader: Option<Box<dyn RecordSource>>,
}

impl ConfiguredSource {
    pub fn is_enabled(&self) -> bool {
        self.reader.is_some()
    }
}

/// Immutable, validated configuration used by a pipeline run.
#[derive(Debug)]
pub struct ValidatedConfig {
    /// Upper bound on concurrently running source reads
    pub max_concurrent_sources: usize,
    /// Sources in configuration order, disabled ones included
    pub sources: Vec<ConfiguredSource>,
    /// Compiled cleaning steps and rules
    pub cleaning: CleaningSpec,
    /// Summary tables to produce, in configuration order
    pub aggregations: Vec<AggregationSpec>,
    /// Descriptive statistics table, emitted after the aggregations
    pub statistics: Option<StatisticsSpec>,
}

impl ValidatedConfig {
    pub fn from_builder(builder: ValidatedConfigBuilder) -> Self {
        Self {
            max_concurrent_sources: builder
                .max_concurrent_sources
                .unwrap_or(DEFAULT_MAX_CONCURRENT_SOURCES),
            sources: builder.sources,
            cleaning: builder.cleaning.unwrap_or_default(),
            aggregations: builder.aggregations,
            statistics: builder.statistics,
        }
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &ConfiguredSource> {
        self.sources.iter().filter(|s| s.is_enabled())
    }

    pub fn source(&self, id: &str) -> Option<&ConfiguredSource> {
        self.sources.iter().find(|s| s.id == id)
    }
}

#[derive(Debug, Default)]
pub struct ValidatedConfigBuilder {
    pub max_concurrent_sources: Option<usize>,
    pub sources: Vec<ConfiguredSource>,
    pub cleaning: Option<CleaningSpec>,
    pub aggregations: Vec<AggregationSpec>,
    pub statistics: Option<StatisticsSpec>,
}

impl ValidatedConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> ValidatedConfig {
        ValidatedConfig::from_builder(self)
    }
}
