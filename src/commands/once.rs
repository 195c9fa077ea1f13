//! Once command - a single pipeline pass for one interval

use anyhow::{Context, Result};
use regime_signals::pipeline::PipelineOrchestrator;
use regime_signals::{Config, Interval, Symbol};
use std::sync::Arc;
use tracing::info;

pub fn run(config_path: String, interval: Interval, symbols: Vec<String>) -> Result<()> {
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    let symbols: Vec<Symbol> = if symbols.is_empty() {
        config.trading.symbols()
    } else {
        symbols.iter().map(Symbol::new).collect()
    };
    info!(interval = %interval, "Single run over {} symbols", symbols.len());

    let runtime = tokio::runtime::Runtime::new().context("Failed to build tokio runtime")?;
    let pipeline = Arc::new(PipelineOrchestrator::from_config(&config)?);
    let summary = runtime.block_on(pipeline.run_interval(interval, &symbols));

    println!("\n{}", "=".repeat(60));
    println!("RUN SUMMARY ({})", interval);
    println!("{}", "=".repeat(60));
    println!("  Processed: {}", summary.processed);
    println!("  Skipped:   {}", summary.skipped);
    println!("  Failed:    {}", summary.failed);
    println!("  Signals:   {}", summary.signals);
    println!("  Intents:   {}", summary.intents.len());
    for intent in &summary.intents {
        let target = intent
            .target_price
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "    {:<10} {:<4} qty {:<14} stop {:<14} target {:<14} ({})",
            intent.symbol, intent.side, intent.quantity, intent.stop_price, target, intent.reason
        );
    }
    println!("{}\n", "=".repeat(60));

    Ok(())
}
