use engine_config::{
    env::EnvContext,
    loader::{ConfigFormat, ConfigLoader},
    settings::{validated::ValidatedConfig, validator::ConfigValidator},
};
use engine_runtime::{Pipeline, error::PipelineFailure};
use model::{
    core::value::Value, execution::errors::ConfigError, report::manifest::Manifest,
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tokio_util::sync::CancellationToken;

/// Three daily rows for two categories: A totals 8 on the first, B totals 10
/// on the second.
pub const SALES_CSV: &str = "date,cat,value\n2025-01-01,A,5\n2025-01-01,A,3\n2025-01-02,B,10\n";

/// Cleaning and a daily per-category sum, appended to a `sources:` block.
pub const DAILY_TOTALS: &str = r#"
cleaning:
  required_columns: [date, value]
  date_columns: [date]
  numeric_columns: [value]
aggregations:
  - name: daily
    date_column: date
    group_by: [cat]
    time_bucket: day
    metrics:
      total: { column: value, operation: sum }
"#;

pub fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture directory");
    }
    fs::write(&path, content).expect("write fixture");
    path
}

pub fn load_yaml(yaml: &str, env: &EnvContext) -> Result<ValidatedConfig, ConfigError> {
    let config = ConfigLoader::new(env).load_str(yaml, ConfigFormat::Yaml)?;
    ConfigValidator::new(&config).validate()
}

pub async fn run_yaml(yaml: &str, env: &EnvContext) -> Result<Manifest, PipelineFailure> {
    let config = load_yaml(yaml, env).expect("valid configuration");
    Pipeline::new(config)
        .run_once(&CancellationToken::new())
        .await
}

pub fn column(manifest: &Manifest, summary: &str, column: &str) -> Vec<Value> {
    manifest
        .summary(summary)
        .unwrap_or_else(|| panic!("summary `{summary}` missing"))
        .column(column)
}
