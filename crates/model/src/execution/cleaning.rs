use crate::execution::{errors::ConfigError, rule::Rule};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillStrategy {
    Zero,
    Forward,
    Backward,
    Mean,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillMissing {
    pub strategy: FillStrategy,
    pub columns: Vec<String>,
}

/// Compiled cleaning configuration consumed by the cleaning engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningSpec {
    pub required_columns: Vec<String>,
    pub date_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub date_formats: Vec<String>,
    /// Key columns for deduplication. `None` compares whole rows.
    pub dedup_key: Option<Vec<String>>,
    pub drop_duplicates: bool,
    pub drop_empty_rows: bool,
    pub standardize_strings: bool,
    pub fill_missing: Option<FillMissing>,
    pub rules: Vec<Rule>,
}

impl Default for CleaningSpec {
    fn default() -> Self {
        CleaningSpec {
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

impl CleaningSpec {
    /// Rejects settings that contradict each other regardless of the data.
    pub fn check(&self) -> Result<(), ConfigError> {
        let dates: HashSet<&str> = self.date_columns.iter().map(String::as_str).collect();
        if let Some(column) = self.numeric_columns.iter().find(|c| dates.contains(c.as_str())) {
            return Err(ConfigError::Invalid(format!(
                "column `{column}` is declared both as a date and as a numeric column"
            )));
        }

        if let Some(key) = &self.dedup_key {
            if key.is_empty() {
                return Err(ConfigError::invalid(
                    "cleaning",
                    "dedup_key",
                    "must name at least one column",
                ));
            }
        }

        if let Some(fill) = &self.fill_missing {
            if fill.columns.is_empty() {
                return Err(ConfigError::invalid(
                    "cleaning",
                    "fill_missing.columns",
                    "must name at least one column",
                ));
            }
        }

        Ok(())
    }
}
