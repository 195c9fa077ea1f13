//! Classify command - trend, flag and signals from persisted features

use anyhow::{Context, Result};
use regime_signals::signals::SignalEvaluator;
use regime_signals::storage::{CsvFeatureStore, FeatureStore};
use regime_signals::trend::classify;
use regime_signals::{Config, Interval, Symbol};
use tracing::info;

pub fn run(config_path: String, symbol: String, interval: Interval) -> Result<()> {
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;
    let symbol = Symbol::new(symbol);

    let store = CsvFeatureStore::new(&config.storage.data_dir);
    let Some(rows) = store
        .load(&symbol, interval)
        .with_context(|| format!("Failed to read features for {} {}", symbol, interval))?
    else {
        info!(symbol = %symbol, interval = %interval, "No feature history, nothing to classify");
        println!("No features stored for {} {}", symbol, interval);
        return Ok(());
    };

    let state = classify(&rows);
    let evaluator = SignalEvaluator::new(config.signals.clone());
    let signals = evaluator.evaluate(
        &symbol,
        interval,
        &rows,
        &state,
        config.trading.is_base_reference(&symbol),
    );

    let fmt_price = |p: Option<f64>| p.map(|v| format!("{:.8}", v)).unwrap_or_else(|| "-".to_string());

    println!("\n{} {} ({} rows)", symbol, interval, rows.len());
    println!("  Trend:          {}", state.trend);
    println!("  Flag:           {}", state.flag);
    println!("  Last high:      {}", fmt_price(state.last_high));
    println!("  Last low:       {}", fmt_price(state.last_low));
    println!("  Previous close: {}", fmt_price(state.previous_close));

    if signals.is_empty() {
        println!("  Signals:        none");
    } else {
        println!("  Signals:");
        for signal in &signals {
            println!(
                "    {:<4} {:<20} price {:.8} ATR {:.8}",
                signal.side,
                signal.reason.to_string(),
                signal.reference_price,
                signal.atr
            );
        }
    }

    Ok(())
}
