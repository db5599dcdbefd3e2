//! Qualys connector binary.

use clap::Parser;
use qualys_connector::{Cli, Commands, ConnectorConfig, StepStatus, collect, verify};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ConnectorConfig::load(cli.config.as_deref(), &cli.overrides())?;
    info!(api_url = %config.api_url, username = %config.username, "Configuration loaded");

    match cli.command {
        Commands::Verify => {
            verify(&config).await?;
            println!("Authenticated to {} as {}", config.api_url, config.username);
        }
        Commands::Collect { output, steps } => {
            let summary = collect(config, &output, &steps).await?;

            for step in summary.steps() {
                match step.error() {
                    Some(error) => println!(
                        "{:<26} {:<8} {:>8.1}s  {}",
                        step.id(),
                        step.status(),
                        step.duration().as_secs_f64(),
                        error
                    ),
                    None => println!(
                        "{:<26} {:<8} {:>8.1}s",
                        step.id(),
                        step.status(),
                        step.duration().as_secs_f64()
                    ),
                }
            }
            println!("Graph written to {}", output.display());

            if !summary.is_success() {
                warn!(
                    failed = summary.count(StepStatus::Failure),
                    skipped = summary.count(StepStatus::Skipped),
                    "Collection incomplete"
                );
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
