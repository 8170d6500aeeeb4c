use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub const DEFAULT_BUCKET_COLUMN: &str = "bucket";

/// Granularity used to truncate the date column of a row into a bucket key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    Day,
    Week,
    Month,
    #[default]
    None,
}

impl TimeBucket {
    /// Truncates a date to the start of its bucket. Weeks start on the ISO
    /// Monday. Returns `None` for [`TimeBucket::None`].
    pub fn truncate(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            TimeBucket::Day => Some(date),
            TimeBucket::Week => {
                let offset = date.weekday().num_days_from_monday();
                date.checked_sub_days(Days::new(offset as u64))
            }
            TimeBucket::Month => date.with_day(1),
            TimeBucket::None => None,
        }
    }

    pub fn is_bucketed(&self) -> bool {
        !matches!(self, TimeBucket::None)
    }
}

impl FromStr for TimeBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(TimeBucket::Day),
            "week" | "weekly" => Ok(TimeBucket::Week),
            "month" | "monthly" => Ok(TimeBucket::Month),
            "none" => Ok(TimeBucket::None),
            other => Err(format!("unknown time bucket `{other}`")),
        }
    }
}

/// Operation folded over the values of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricOp {
    Sum,
    Mean,
    Count,
    Min,
    Max,
    Median,
    /// Sample standard deviation.
    Std,
}

impl FromStr for MetricOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sum" => Ok(MetricOp::Sum),
            "mean" | "avg" => Ok(MetricOp::Mean),
            "count" => Ok(MetricOp::Count),
            "min" => Ok(MetricOp::Min),
            "max" => Ok(MetricOp::Max),
            "median" => Ok(MetricOp::Median),
            "std" | "stddev" => Ok(MetricOp::Std),
            other => Err(format!("unknown metric operation `{other}`")),
        }
    }
}

impl fmt::Display for MetricOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricOp::Sum => "sum",
            MetricOp::Mean => "mean",
            MetricOp::Count => "count",
            MetricOp::Min => "min",
            MetricOp::Max => "max",
            MetricOp::Median => "median",
            MetricOp::Std => "std",
        };
        f.write_str(name)
    }
}

/// One output metric column. The operation is kept as configured text and
/// resolved by the aggregation engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSpec {
    pub name: String,
    pub column: Option<String>,
    pub operation: String,
    pub count_rows: bool,
}

impl MetricSpec {
    pub fn new(name: &str, column: &str, operation: &str) -> Self {
        MetricSpec {
            name: name.to_string(),
            column: Some(column.to_string()),
            operation: operation.to_string(),
            count_rows: false,
        }
    }

    pub fn row_count(name: &str) -> Self {
        MetricSpec {
            name: name.to_string(),
            column: None,
            operation: MetricOp::Count.to_string(),
            count_rows: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedKind {
    /// Percentage of the bucket total.
    Share,
    /// Difference to the group's previous bucket.
    Change,
    /// Relative difference to the group's previous bucket, in percent.
    PctChange,
    /// Direction of the change: `up`, `down` or `flat`.
    Trend,
}

impl FromStr for DerivedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "share" => Ok(DerivedKind::Share),
            "change" => Ok(DerivedKind::Change),
            "pct_change" => Ok(DerivedKind::PctChange),
            "trend" => Ok(DerivedKind::Trend),
            other => Err(format!(
                "unknown derived metric kind `{other}` (expected share, change, pct_change or trend)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetric {
    pub name: String,
    pub kind: DerivedKind,
    pub metric: String,
}

/// Keeps only the highest ranked rows of every time bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopN {
    /// Metric or derived column to rank by, highest first
    pub metric: String,
    pub limit: usize,
}

/// How to group and summarize a clean record table into one summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationSpec {
    pub name: String,
    pub group_by: Vec<String>,
    pub date_column: Option<String>,
    pub time_bucket: TimeBucket,
    pub bucket_column: String,
    pub metrics: Vec<MetricSpec>,
    pub derived: Vec<DerivedMetric>,
    pub top: Option<TopN>,
}

impl AggregationSpec {
    pub fn new(name: &str) -> Self {
        AggregationSpec {
            name: name.to_string(),
            group_by: Vec::new(),
            date_column: None,
            time_bucket: TimeBucket::None,
            bucket_column: DEFAULT_BUCKET_COLUMN.to_string(),
            metrics: Vec::new(),
            derived: Vec::new(),
            top: None,
        }
    }

    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.group_by = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn bucketed(mut self, date_column: &str, bucket: TimeBucket) -> Self {
        self.date_column = Some(date_column.to_string());
        self.time_bucket = bucket;
        self
    }

    pub fn metric(mut self, metric: MetricSpec) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn derive(mut self, name: &str, kind: DerivedKind, metric: &str) -> Self {
        self.derived.push(DerivedMetric {
            name: name.to_string(),
            kind,
            metric: metric.to_string(),
        });
        self
    }

    pub fn top(mut self, metric: &str, limit: usize) -> Self {
        self.top = Some(TopN {
            metric: metric.to_string(),
            limit,
        });
        self
    }

    /// Metrics to compute. An empty configuration counts rows.
    pub fn effective_metrics(&self) -> Vec<MetricSpec> {
        if self.metrics.is_empty() {
            vec![MetricSpec::row_count("count")]
        } else {
            self.metrics.clone()
        }
    }

    /// Output column names in emission order.
    pub fn output_columns(&self) -> Vec<String> {
        let mut columns = self.group_by.clone();
        if self.time_bucket.is_bucketed() {
            columns.push(self.bucket_column.clone());
        }
        columns.extend(self.effective_metrics().into_iter().map(|m| m.name));
        columns.extend(self.derived.iter().map(|d| d.name.clone()));
        columns
    }
}

pub const DEFAULT_STATISTICS_NAME: &str = "statistics";

/// Per-column descriptive statistics over the clean record table: count,
/// mean, median, std, min and max of every numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSpec {
    pub name: String,
    /// Columns to describe. Empty selects every column holding numbers.
    pub columns: Vec<String>,
}

impl StatisticsSpec {
    pub const OUTPUT_COLUMNS: [&'static str; 7] =
        ["column", "count", "mean", "median", "std", "min", "max"];

    pub fn new(name: &str) -> Self {
        StatisticsSpec {
            name: name.to_string(),
            columns: Vec::new(),
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }
}
