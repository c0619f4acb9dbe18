//! awslbc CLI
//!
//! Renders or applies the AWS Load Balancer Controller component.

use clap::Parser;

use awslbc_cli::{Cli, Result};
use awslbc_common::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        format: cli.log_format,
        ..Default::default()
    })?;

    cli.run().await
}
