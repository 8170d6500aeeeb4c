use model::execution::{
    aggregation::{DEFAULT_BUCKET_COLUMN, DEFAULT_STATISTICS_NAME},
    cleaning::FillStrategy,
};
use serde::{
    Deserialize, Deserializer,
    de::{MapAccess, Visitor},
};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

pub const DEFAULT_MAX_CONCURRENT_SOURCES: usize = 4;
pub const DEFAULT_TOP_LIMIT: usize = 10;

/// Raw pipeline configuration as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub sources: Vec<RawSourceConfig>,
    #[serde(default)]
    pub cleaning: CleaningConfig,
    #[serde(default)]
    pub aggregations: Vec<AggregationConfig>,
    #[serde(default)]
    pub statistics: Option<StatisticsConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_max_concurrent_sources")]
    pub max_concurrent_sources: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sources: DEFAULT_MAX_CONCURRENT_SOURCES,
        }
    }
}

/// A source entry. Everything besides the common keys is handed to the
/// source implementation selected by `type`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSourceConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub options: Map<String, JsonValue>,
}

impl RawSourceConfig {
    /// Configured id, or `<type>-<index>` when none is given.
    pub fn id_or_default(&self, index: usize) -> String {
        match self.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("{}-{index}", self.kind.trim().to_ascii_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleaningConfig {
    #[serde(default, deserialize_with = "one_or_many")]
    pub required_columns: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub date_columns: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub numeric_columns: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub date_formats: Vec<String>,
    #[serde(default, deserialize_with = "optional_one_or_many")]
    pub dedup_key: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub drop_duplicates: bool,
    #[serde(default = "default_true")]
    pub drop_empty_rows: bool,
    #[serde(default = "default_true")]
    pub standardize_strings: bool,
    #[serde(default)]
    pub fill_missing: Option<FillMissingConfig>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            required_columns: Vec::new(),
            date_columns: Vec::new(),
            numeric_columns: Vec::new(),
            date_formats: Vec::new(),
            dedup_key: None,
            drop_duplicates: true,
            drop_empty_rows: true,
            standardize_strings: true,
            fill_missing: None,
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FillMissingConfig {
    pub strategy: FillStrategy,
    #[serde(default, deserialize_with = "one_or_many")]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    pub column: String,
    pub condition: String,
    #[serde(default)]
    pub value: JsonValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub date_column: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub time_bucket: Option<String>,
    #[serde(default = "default_bucket_column")]
    pub bucket_column: String,
    #[serde(default, deserialize_with = "ordered_metrics")]
    pub metrics: Vec<(String, MetricConfig)>,
    #[serde(default)]
    pub derived: Vec<DerivedConfig>,
    #[serde(default)]
    pub top: Option<TopConfig>,
}

/// A metric is either a bare operation applied to the column of the same
/// name (`revenue: sum`) or a full definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MetricConfig {
    Operation(String),
    Detailed(MetricDefinition),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricDefinition {
    #[serde(default)]
    pub column: Option<String>,
    pub operation: String,
    #[serde(default)]
    pub count_rows: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DerivedConfig {
    pub name: String,
    pub kind: String,
    pub metric: String,
}

/// Keeps the highest ranked rows of every bucket. `by` defaults to the first
/// metric.
#[derive(Debug, Clone, Deserialize)]
pub struct TopConfig {
    #[serde(default)]
    pub by: Option<String>,
    #[serde(default = "default_top_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatisticsConfig {
    #[serde(default = "default_statistics_name")]
    pub name: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub columns: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_sources() -> usize {
    DEFAULT_MAX_CONCURRENT_SOURCES
}

fn default_bucket_column() -> String {
    DEFAULT_BUCKET_COLUMN.to_string()
}

fn default_top_limit() -> usize {
    DEFAULT_TOP_LIMIT
}

fn default_statistics_name() -> String {
    DEFAULT_STATISTICS_NAME.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Accepts a single column name where a list is expected. `null` is empty.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<OneOrMany> = Option::deserialize(deserializer)?;
    Ok(value.map(Vec::from).unwrap_or_default())
}

fn optional_one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<OneOrMany> = Option::deserialize(deserializer)?;
    Ok(value.map(Vec::from))
}

/// Reads the `metrics` mapping keeping the order the entries were written in.
fn ordered_metrics<'de, D>(deserializer: D) -> Result<Vec<(String, MetricConfig)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct MetricsVisitor;

    impl<'de> Visitor<'de> for MetricsVisitor {
        type Value = Vec<(String, MetricConfig)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a mapping of metric names to definitions")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut metrics = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, metric)) = map.next_entry::<String, MetricConfig>()? {
                metrics.push((name, metric));
            }
            Ok(metrics)
        }
    }

    deserializer.deserialize_any(MetricsVisitor)
}
