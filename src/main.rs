use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dxflow::{
    ComponentFactory, JobConfig, RunStatus, TransformEngine,
    config::defaults::DEFAULT_LOG_LEVEL, context::LoggingListener,
};

#[derive(Parser)]
#[command(name = "dxflow")]
#[command(version)]
#[command(about = "Runs a batch transformation job described by a TOML file")]
#[command(long_about = None)]
struct Cli {
    /// Job configuration file path
    #[arg(short, long, default_value = "job.toml")]
    config: String,

    /// Job name (overrides config file)
    #[arg(short = 'n', long, value_name = "NAME")]
    job_name: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("dxflow={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting dxflow v{}", env!("CARGO_PKG_VERSION"));

    let mut config = JobConfig::load_from_file(&cli.config)?;
    if let Some(name) = cli.job_name {
        config.job.name = name;
    }

    let factory = ComponentFactory::default();
    let mut engine = TransformEngine::from_config(&config, &factory)
        .with_context(|| format!("Failed to build job from {}", cli.config))?;
    engine.add_listener(Arc::new(LoggingListener));

    let cancel = engine.cancellation_token();
    let job_name = config.job.name.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Termination signal received, stopping job '{}'", job_name);
            cancel.cancel();
        }
    });

    let outcome = engine.run().await?;
    if outcome.status == RunStatus::Aborted {
        anyhow::bail!(
            "Job '{}' aborted: {}",
            outcome.job,
            outcome.error_message.unwrap_or_default()
        );
    }
    Ok(())
}
