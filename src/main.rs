use anyhow::Result;
use clap::Parser;
use pdfcraft::cli::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = cli.to_config()?;
    tracing::info!("Configuration loaded");

    pdfcraft::serve(config).await
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pdfcraft=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
