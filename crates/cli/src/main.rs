use crate::{
    commands::{Commands, ConfigArgs},
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use engine_config::{env::EnvContext, load_validated, settings::validated::ValidatedConfig};
use engine_runtime::Pipeline;
use serde_json::json;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "reportpilot",
    version = "0.1.0",
    about = "Ingest, clean and summarize activity records"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "info",
        help = "Log level used when RUST_LOG is not set"
    )]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let code = match execute(cli.command, &shutdown).await {
        Ok(()) => ExitCode::Success,
        Err(CliError::ShutdownRequested) => ExitCode::ShutdownRequested,
        Err(e) => {
            error!("{e}");
            if shutdown.is_shutdown_requested() {
                ExitCode::ShutdownRequested
            } else {
                ExitCode::GeneralError
            }
        }
    };
    std::process::exit(code.as_i32());
}

async fn execute(command: Commands, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    match command {
        Commands::Run { config, output } => {
            let validated = load_config(&config)?;
            run_pipeline(validated, output.as_deref(), shutdown).await
        }
        Commands::Validate { config } => {
            let validated = load_config(&config)?;
            print_validation(&config.config, &validated);
            Ok(())
        }
        Commands::Sources { config } => {
            let validated = load_config(&config)?;
            let sources: Vec<_> = validated
                .sources
                .iter()
                .map(|source| match &source.reader {
                    Some(reader) => reader.describe(),
                    None => json!({
                        "id": source.id,
                        "type": source.kind.as_str(),
                        "enabled": false,
                    }),
                })
                .collect();
            output::emit(&sources, None).await
        }
    }
}

fn load_config(args: &ConfigArgs) -> Result<ValidatedConfig, CliError> {
    let mut env = EnvContext::new();
    if let Some(env_file) = &args.env_file {
        env.load_file(env_file)?;
        info!("Loaded environment overrides from {}", env_file.display());
    }

    info!("Loading configuration: {}", args.config.display());
    Ok(load_validated(&args.config, &env)?)
}

async fn run_pipeline(
    config: ValidatedConfig,
    output: Option<&Path>,
    shutdown: &ShutdownCoordinator,
) -> Result<(), CliError> {
    let pipeline = Pipeline::new(config);
    let result = pipeline.run_once(&shutdown.cancel_token()).await;

    match result {
        Ok(manifest) => {
            output::emit(&manifest, output).await?;
            if shutdown.is_shutdown_requested() {
                return Err(CliError::ShutdownRequested);
            }
            info!("Run {} finished", manifest.run_id);
            Ok(())
        }
        Err(failure) => {
            output::emit(&failure.report(), output).await?;
            Err(failure.into())
        }
    }
}

fn print_validation(path: &Path, config: &ValidatedConfig) {
    println!("Configuration '{}' is valid", path.display());
    println!("-----------------------------");
    println!("{:<24} {}", "Max concurrent reads", config.max_concurrent_sources);
    for source in &config.sources {
        let state = match (source.is_enabled(), source.required) {
            (false, _) => "disabled",
            (true, true) => "required",
            (true, false) => "enabled",
        };
        println!("{:<24} {} ({state})", source.id, source.kind);
    }
    for aggregation in &config.aggregations {
        println!(
            "{:<24} {}",
            format!("aggregation {}", aggregation.name),
            aggregation.output_columns().join(", ")
        );
    }
    if let Some(statistics) = &config.statistics {
        let columns = if statistics.columns.is_empty() {
            "all numeric columns".to_string()
        } else {
            statistics.columns.join(", ")
        };
        println!("{:<24} {columns}", format!("statistics {}", statistics.name));
    }
}
