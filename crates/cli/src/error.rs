use engine_runtime::error::PipelineFailure;
use model::execution::errors::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to load the configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline run failed: {0}")]
    Pipeline(Box<PipelineFailure>),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Shutdown requested")]
    ShutdownRequested,
}

impl From<PipelineFailure> for CliError {
    fn from(failure: PipelineFailure) -> Self {
        CliError::Pipeline(Box::new(failure))
    }
}
