mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use leaf_disease_predictor::{Config, LeafDiseasePredictor};

use crate::cli::{Cli, Commands, RunArgs};

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,leaf_disease_predictor=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

fn run(args: RunArgs) -> Result<()> {
    let config = Config::load(&args.configuration_file).with_context(|| {
        format!(
            "failed to load configuration from {}",
            args.configuration_file.display()
        )
    })?;
    if config.mappings.is_empty() {
        tracing::warn!("no mappings configured; nothing to do");
    }

    let url = config.server.url.clone();
    let predictor = LeafDiseasePredictor::connect(config)
        .with_context(|| format!("failed to connect to {url}"))?;

    let summary = predictor.run();
    tracing::info!(
        mappings = summary.mappings,
        written = summary.written,
        skipped = summary.skipped,
        failed = summary.failed,
        "run complete"
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    match cli.command {
        Commands::Run(args) => run(args),
    }
}
