//! Run command - periodic pipeline triggers until Ctrl+C

use anyhow::{bail, Context, Result};
use regime_signals::config::ExecutionMode;
use regime_signals::pipeline::PipelineOrchestrator;
use regime_signals::scheduler::Scheduler;
use regime_signals::Config;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub fn run(config_path: String, grace_secs: u64) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_async(config_path, grace_secs))
}

async fn run_async(config_path: String, grace_secs: u64) -> Result<()> {
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    if config.schedules.is_empty() {
        bail!("No schedules configured in {}", config_path);
    }

    let symbols = config.trading.symbols();
    info!("Symbols: {}", config.trading.symbols.join(", "));
    info!("Execution mode: {:?}", config.trading.execution);
    if config.trading.execution == ExecutionMode::Live {
        warn!("Live execution selected, but order submission is disabled; intents are only logged");
    }

    let pipeline = Arc::new(PipelineOrchestrator::from_config(&config)?);
    let scheduler = Scheduler::new(pipeline, &config.schedules, symbols)
        .with_grace(Duration::from_secs(grace_secs));

    scheduler
        .run(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, initiating shutdown..."),
                Err(e) => {
                    error!("Error setting up signal handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        })
        .await;

    info!("Pipeline session ended.");
    Ok(())
}
