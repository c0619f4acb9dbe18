//! awslbc CLI library

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use awslbc_common::telemetry::LogFormat;
use clap::{Parser, Subcommand};

/// awslbc - deploy the AWS Load Balancer Controller with IRSA and webhook TLS
#[derive(Parser, Debug)]
#[command(name = "awslbc")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log output format (text or json)
    #[arg(long, global = true, env = "AWSLBC_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render Kubernetes manifests and IAM documents without touching a cluster
    Render(commands::render::RenderArgs),
    /// Apply the component to a cluster
    Apply(commands::apply::ApplyArgs),
    /// Print the declared resource tree
    Graph(commands::graph::GraphArgs),
    /// Print an embedded asset
    Assets(commands::assets::AssetsArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Render(args) => commands::render::run(args).await,
            Commands::Apply(args) => commands::apply::run(args).await,
            Commands::Graph(args) => commands::graph::run(args),
            Commands::Assets(args) => commands::assets::run(args),
        }
    }
}
