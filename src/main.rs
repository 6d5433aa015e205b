mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "code_facts=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Parse { path, json } => {
            cli::parse_directory(&path, config, json).await?;
        }
        Commands::Watch { path } => {
            tokio::task::block_in_place(|| cli::watch_directory(&path, config))?;
        }
        Commands::Stats { path, json } => {
            cli::show_stats(&path, config, json)?;
        }
    }

    Ok(())
}
