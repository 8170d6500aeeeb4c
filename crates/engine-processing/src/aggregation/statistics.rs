use crate::{aggregation::accumulator::Accumulator, cleaning::steps::coerce_numeric};
use model::{
    core::value::Value,
    execution::aggregation::{MetricOp, StatisticsSpec},
    records::{row::Record, table::RecordTable},
    report::summary::SummaryTable,
};
use tracing::info;

const OPERATIONS: [MetricOp; 6] = [
    MetricOp::Count,
    MetricOp::Mean,
    MetricOp::Median,
    MetricOp::Std,
    MetricOp::Min,
    MetricOp::Max,
];

/// Describes the numeric columns of a clean record table, one row per
/// column.
///
/// Without configured columns every column holding at least one integer or
/// float is described. Only numeric values contribute; numeric text is
/// parsed, anything else is ignored.
pub fn describe(table: &RecordTable, spec: &StatisticsSpec) -> SummaryTable {
    let columns: Vec<&String> = if spec.columns.is_empty() {
        table
            .columns
            .iter()
            .filter(|c| holds_numbers(table, c))
            .collect()
    } else {
        spec.columns.iter().collect()
    };

    let mut summary = SummaryTable::new(
        &spec.name,
        StatisticsSpec::OUTPUT_COLUMNS.iter().map(|c| c.to_string()).collect(),
    );

    for column in columns {
        let mut accumulators: Vec<Accumulator> =
            OPERATIONS.iter().map(|op| Accumulator::new(*op, false)).collect();
        for row in &table.rows {
            let value = row.get_value(column).and_then(coerce_numeric);
            for acc in &mut accumulators {
                acc.update(value.as_ref());
            }
        }

        let mut record = Record::new();
        record.set("column", Value::from(column.as_str()));
        for (name, acc) in StatisticsSpec::OUTPUT_COLUMNS[1..].iter().zip(&accumulators) {
            record.set(name, acc.finish());
        }
        summary.rows.push(record);
    }

    info!(
        "Statistics `{}` described {} column(s) over {} row(s)",
        spec.name,
        summary.len(),
        table.len()
    );
    summary
}

fn holds_numbers(table: &RecordTable, column: &str) -> bool {
    table
        .rows
        .iter()
        .any(|r| matches!(r.get_value(column), Some(Value::Int(_) | Value::Float(_))))
}
