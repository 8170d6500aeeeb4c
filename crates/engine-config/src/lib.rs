use crate::{
    env::EnvContext,
    loader::ConfigLoader,
    settings::{validated::ValidatedConfig, validator::ConfigValidator},
};
use model::execution::errors::ConfigError;
use std::path::Path;

pub mod env;
pub mod loader;
pub mod settings;

/// Loads, resolves and validates a configuration file in one step.
pub fn load_validated<P: AsRef<Path>>(
    path: P,
    env: &EnvContext,
) -> Result<ValidatedConfig, ConfigError> {
    let config = ConfigLoader::new(env).load(path)?;
    ConfigValidator::new(&config).validate()
}
