use anyhow::Result;
use clap::Parser;
use cloudfiles_sync::app::App;
use cloudfiles_sync::sync::DEFAULT_CONCURRENCY;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "cloudfiles-sync")]
#[command(about = "Sync local files to cloud storage containers")]
struct CliArgs {
    /// Path to the sync configuration file (JSON).
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Maximum concurrent file operations per upload spec.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloudfiles_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    match App::new(&args.config, args.concurrency).await {
        Ok(app) => match app.run().await {
            Ok(reports) => {
                info!("Sync completed for {} upload spec(s)", reports.len());
                Ok(())
            }
            Err(e) => {
                error!("Sync failed: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to initialize: {}", e);
            std::process::exit(1);
        }
    }
}
