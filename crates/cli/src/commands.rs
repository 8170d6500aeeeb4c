use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline once and emit its manifest
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        #[arg(
            long,
            help = "If specified, writes the manifest JSON to this file instead of stdout"
        )]
        output: Option<PathBuf>,
    },
    /// Check the configuration without reading any source
    Validate {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print every configured source with credentials redacted
    Sources {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args)]
pub struct ConfigArgs {
    #[arg(long, help = "Config file path (.yaml, .yml or .json)")]
    pub config: PathBuf,

    #[arg(
        long,
        help = "Extra .env file whose entries override the process environment"
    )]
    pub env_file: Option<PathBuf>,
}
