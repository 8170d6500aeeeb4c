use crate::error::CliError;
use serde::Serialize;
use std::path::Path;

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Writes `value` as pretty JSON to `path`, or to stdout when no path is given.
pub async fn emit<T: Serialize + ?Sized>(value: &T, path: Option<&Path>) -> Result<(), CliError> {
    let json = to_json(value)?;
    match path {
        Some(path) => tokio::fs::write(path, json).await?,
        None => println!("{json}"),
    }
    Ok(())
}
