use crate::{
    cleaning::{
        pipeline::{CleaningPipeline, CleaningPipelineExt},
        steps::{
            ApplyRules, CoerceColumns, Deduplicate, DropEmptyRows, FillMissingValues,
            RequireColumns, StandardizeStrings,
        },
    },
    error::ProcessingError,
};
use model::{
    execution::cleaning::CleaningSpec, records::table::RecordTable, report::stats::CleaningStats,
};
use tracing::info;

pub mod pipeline;
pub mod steps;

/// Turns a raw record table into a clean one. Steps always run in the same
/// order, whatever order the configuration lists them in.
pub struct Cleaner {
    pipeline: CleaningPipeline,
}

impl Cleaner {
    pub fn new(spec: &CleaningSpec) -> Result<Self, ProcessingError> {
        spec.check()?;

        let coercing = !spec.date_columns.is_empty() || !spec.numeric_columns.is_empty();
        let mut pipeline = CleaningPipeline::new()
            .add_if(spec.standardize_strings, || StandardizeStrings)
            .add_if(spec.drop_empty_rows, || DropEmptyRows)
            .add_if(coercing, || CoerceColumns {
                date_columns: spec.date_columns.clone(),
                numeric_columns: spec.numeric_columns.clone(),
                date_formats: spec.date_formats.clone(),
                required: spec.required_columns.iter().cloned().collect(),
            })
            .add_if(!spec.required_columns.is_empty(), || RequireColumns {
                columns: spec.required_columns.clone(),
            });

        if let Some(fill) = &spec.fill_missing {
            pipeline = pipeline.add_step(FillMissingValues { fill: fill.clone() });
        }

        let pipeline = pipeline
            .add_if(spec.drop_duplicates, || Deduplicate {
                key: spec.dedup_key.clone(),
            })
            .add_if(!spec.rules.is_empty(), || ApplyRules {
                rules: spec.rules.clone(),
            });

        Ok(Self { pipeline })
    }

    pub fn steps(&self) -> Vec<&'static str> {
        self.pipeline.step_names()
    }

    pub fn clean(&self, table: RecordTable) -> (RecordTable, CleaningStats) {
        let (table, stats) = self.pipeline.run(table);
        info!(
            input = stats.input_rows,
            output = stats.output_rows,
            dropped_empty = stats.dropped_empty,
            dropped_coercion = stats.dropped_coercion,
            dropped_missing = stats.dropped_missing,
            dropped_duplicate = stats.dropped_duplicate,
            dropped_rule = stats.dropped_rule,
            "Cleaning finished"
        );
        (table, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{
        core::value::Value,
        execution::{
            cleaning::{FillMissing, FillStrategy},
            errors::ConfigError,
            rule::Rule,
        },
        records::row::Record,
    };
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Record {
        Record::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())))
    }

    fn raw() -> RecordTable {
        RecordTable::from_rows(vec![
            row(&[("date", "2025-01-01".into()), ("cat", " A ".into()), ("value", "5".into())]),
            row(&[("date", "2025-01-01".into()), ("cat", "A".into()), ("value", "5".into())]),
            row(&[("date", "bad".into()), ("cat", "B".into()), ("value", "7".into())]),
            row(&[("date", Value::Null), ("cat", Value::Null), ("value", Value::Null)]),
            row(&[("date", "2025-01-02".into()), ("cat", Value::Null), ("value", "3".into())]),
            row(&[("date", "2025-01-02".into()), ("cat", "B".into()), ("value", "-1".into())]),
            row(&[("date", "2025-01-03".into()), ("cat", "C".into()), ("value", "x".into())]),
        ])
    }

    fn spec() -> CleaningSpec {
        CleaningSpec {
            required_columns: vec!["date".into(), "cat".into()],
            date_columns: vec!["date".into()],
            numeric_columns: vec!["value".into()],
            rules: vec![Rule::compile("value", ">=", &json!(0)).unwrap()],
            ..CleaningSpec::default()
        }
    }

    #[test]
    fn test_fixed_step_order() {
        let cleaner = Cleaner::new(&CleaningSpec {
            fill_missing: Some(FillMissing {
                strategy: FillStrategy::Zero,
                columns: vec!["value".into()],
            }),
            ..spec()
        })
        .unwrap();

        assert_eq!(
            cleaner.steps(),
            [
                "standardize_strings",
                "drop_empty_rows",
                "coerce_columns",
                "require_columns",
                "fill_missing",
                "deduplicate",
                "apply_rules"
            ]
        );
    }

    #[test]
    fn test_counts_balance() {
        let cleaner = Cleaner::new(&spec()).unwrap();
        let (clean, stats) = cleaner.clean(raw());

        assert_eq!(stats.input_rows, 7);
        assert_eq!(stats.dropped_empty, 1);
        assert_eq!(stats.dropped_coercion, 1);
        assert_eq!(stats.dropped_missing, 1);
        assert_eq!(stats.dropped_duplicate, 1);
        // -1 fails the rule, "x" became null and null fails every rule
        assert_eq!(stats.dropped_rule, 2);
        assert_eq!(stats.output_rows, 1);
        assert!(stats.is_balanced());

        assert_eq!(clean.rows[0].get_value("cat"), Some(&Value::from("A")));
        assert_eq!(clean.rows[0].get_value("value"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let cleaner = Cleaner::new(&CleaningSpec {
            rules: Vec::new(),
            ..spec()
        })
        .unwrap();

        let (once, _) = cleaner.clean(raw());
        let (twice, stats) = cleaner.clean(once.clone());

        assert_eq!(once, twice);
        assert_eq!(stats.dropped_total(), 0);
    }

    #[test]
    fn test_clean_rows_satisfy_rules_and_requirements() {
        let spec = spec();
        let (clean, _) = Cleaner::new(&spec).unwrap().clean(raw());
        for row in &clean.rows {
            assert!(spec.rules.iter().all(|r| r.evaluate(row)));
            assert!(spec.required_columns.iter().all(|c| !row.is_missing(c)));
        }
    }

    #[test]
    fn test_invalid_spec_is_a_config_error() {
        let err = Cleaner::new(&CleaningSpec {
            dedup_key: Some(Vec::new()),
            ..CleaningSpec::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, ProcessingError::Config(ConfigError::InvalidKey { .. })));
        assert_eq!(err.kind(), "ConfigError");
    }
}
