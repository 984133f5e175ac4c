//! staved - the stave log agent daemon
//!
//! Loads a pipeline configuration, runs it until interrupted, then
//! shuts down cleanly.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use stave_agent::AgentBuilder;
use stave_config::Config;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "staved", about = "Log processing agent", version)]
struct Args {
    /// Pipeline configuration file (YAML or JSON)
    #[arg(short, long, default_value = "stave.yaml")]
    config: PathBuf,

    /// Offset database file; omitted means offsets are not persisted
    #[arg(long)]
    db: Option<PathBuf>,

    /// Directory of plugin template files
    #[arg(long)]
    plugin_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;

    let mut builder = AgentBuilder::new(config);
    if let Some(db) = args.db {
        builder = builder.with_database_path(db);
    }
    if let Some(dir) = args.plugin_dir {
        builder = builder.with_plugin_dir(dir);
    }

    let agent = builder.build().context("building agent")?;
    agent.start().await.context("starting agent")?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutdown signal received");

    agent.stop().await;
    Ok(())
}
