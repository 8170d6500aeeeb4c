use crate::{
    aggregation::{
        accumulator::Accumulator,
        derived::{PartitionKey, apply_derived},
    },
    error::ProcessingError,
};
use chrono::NaiveDate;
use model::{
    core::value::Value,
    execution::aggregation::{AggregationSpec, MetricOp, MetricSpec, TopN},
    records::{row::Record, table::RecordTable},
    report::summary::SummaryTable,
};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
};
use tracing::info;

pub mod accumulator;
pub mod derived;
pub mod statistics;

/// Groups a clean record table into one summary table.
///
/// Rows are partitioned by their group-by values and, when a date column is
/// configured, by the bucket of that date. Partitions come out in ascending
/// order of group values, then bucket.
#[derive(Debug)]
pub struct AggregationEngine {
    spec: AggregationSpec,
    metrics: Vec<(MetricSpec, MetricOp)>,
}

impl AggregationEngine {
    /// Resolves every metric operation and derived-metric reference. An
    /// unknown operation or reference is a data integrity violation.
    pub fn new(spec: &AggregationSpec) -> Result<Self, ProcessingError> {
        let mut metrics = Vec::new();
        for metric in spec.effective_metrics() {
            let op = metric
                .operation
                .parse::<MetricOp>()
                .map_err(|reason| ProcessingError::data_integrity(&spec.name, reason))?;
            if metric.column.is_none() && !(op == MetricOp::Count && metric.count_rows) {
                return Err(ProcessingError::data_integrity(
                    &spec.name,
                    format!("metric `{}` has no source column", metric.name),
                ));
            }
            metrics.push((metric, op));
        }

        let names: HashSet<&str> = metrics.iter().map(|(m, _)| m.name.as_str()).collect();
        if let Some(derived) = spec.derived.iter().find(|d| !names.contains(d.metric.as_str())) {
            return Err(ProcessingError::data_integrity(
                &spec.name,
                format!(
                    "derived metric `{}` references unknown metric `{}`",
                    derived.name, derived.metric
                ),
            ));
        }

        if let Some(top) = &spec.top {
            let known = names.contains(top.metric.as_str())
                || spec.derived.iter().any(|d| d.name == top.metric);
            if !known || top.limit == 0 {
                return Err(ProcessingError::data_integrity(
                    &spec.name,
                    format!("cannot keep the top {} rows by `{}`", top.limit, top.metric),
                ));
            }
        }

        if spec.time_bucket.is_bucketed() && spec.date_column.is_none() {
            return Err(ProcessingError::data_integrity(
                &spec.name,
                "time bucketing requires a date column",
            ));
        }

        Ok(Self {
            spec: spec.clone(),
            metrics,
        })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn aggregate(&self, table: &RecordTable) -> SummaryTable {
        let mut partitions: BTreeMap<PartitionKey, Vec<Accumulator>> = BTreeMap::new();
        let mut excluded = 0usize;

        for row in &table.rows {
            let bucket = match &self.spec.date_column {
                None => None,
                Some(column) => match row.get_value(column).and_then(Value::as_date) {
                    Some(date) => self.spec.time_bucket.truncate(date),
                    None => {
                        excluded += 1;
                        continue;
                    }
                },
            };

            let key = (row.values_for(&self.spec.group_by), bucket);
            let accumulators = partitions.entry(key).or_insert_with(|| {
                self.metrics
                    .iter()
                    .map(|(m, op)| Accumulator::new(*op, m.count_rows))
                    .collect()
            });

            for ((metric, _), acc) in self.metrics.iter().zip(accumulators.iter_mut()) {
                acc.update(metric.column.as_deref().and_then(|c| row.get_value(c)));
            }
        }

        if excluded > 0 {
            info!(
                "Aggregation `{}` excluded {excluded} row(s) without a valid `{}` date",
                self.spec.name,
                self.spec.date_column.as_deref().unwrap_or_default()
            );
        }

        let mut summary = SummaryTable::new(&self.spec.name, self.spec.output_columns());
        let mut keys = Vec::with_capacity(partitions.len());
        for ((group, bucket), accumulators) in partitions {
            let mut record = Record::new();
            for (column, value) in self.spec.group_by.iter().zip(&group) {
                record.set(column, value.clone());
            }
            if self.spec.time_bucket.is_bucketed() {
                let bucket_value = bucket.map(Value::Date).unwrap_or(Value::Null);
                record.set(&self.spec.bucket_column, bucket_value);
            }
            for ((metric, _), acc) in self.metrics.iter().zip(&accumulators) {
                record.set(&metric.name, acc.finish());
            }
            summary.rows.push(record);
            keys.push((group, bucket));
        }

        apply_derived(&self.spec.derived, &keys, &mut summary.rows);
        if let Some(top) = &self.spec.top {
            summary.rows = keep_top(top, &keys, std::mem::take(&mut summary.rows));
        }

        info!(
            "Aggregation `{}` produced {} row(s) from {} input row(s)",
            self.spec.name,
            summary.len(),
            table.len()
        );
        summary
    }
}

/// Keeps the `limit` highest ranked rows of every bucket. Buckets stay in
/// ascending order, rows within a bucket come out highest first and rows
/// without a numeric rank value sort last.
fn keep_top(top: &TopN, keys: &[PartitionKey], rows: Vec<Record>) -> Vec<Record> {
    let scores: Vec<Option<f64>> = rows
        .iter()
        .map(|r| r.get_value(&top.metric).and_then(Value::as_f64))
        .collect();

    let mut buckets: BTreeMap<Option<NaiveDate>, Vec<usize>> = BTreeMap::new();
    for (idx, (_, bucket)) in keys.iter().enumerate() {
        buckets.entry(*bucket).or_default().push(idx);
    }

    let mut slots: Vec<Option<Record>> = rows.into_iter().map(Some).collect();
    let mut kept = Vec::new();
    for mut indices in buckets.into_values() {
        indices.sort_by(|&a, &b| match (scores[a], scores[b]) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        kept.extend(indices.into_iter().take(top.limit).filter_map(|i| slots[i].take()));
    }
    kept
}

/// Builds the engine for `spec` and runs it once.
pub fn aggregate(
    table: &RecordTable,
    spec: &AggregationSpec,
) -> Result<SummaryTable, ProcessingError> {
    Ok(AggregationEngine::new(spec)?.aggregate(table))
}
