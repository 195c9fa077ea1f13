//! Analyze command - trade log summary for one symbol

use anyhow::{bail, Context, Result};
use regime_signals::storage::{summarize_trades, CsvTradeLog};
use regime_signals::{Config, Symbol};

pub fn run(config_path: String, symbol: String) -> Result<()> {
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;
    let symbol = Symbol::new(symbol);

    let path = CsvTradeLog::new(&config.storage.trade_log_dir).path_for(&symbol);
    if !path.exists() {
        bail!("No trade log for {} at {}", symbol, path.display());
    }

    let summary = summarize_trades(&path)
        .with_context(|| format!("Failed to read trade log {}", path.display()))?;

    let fmt = |p: Option<f64>| p.map(|v| format!("{:.8}", v)).unwrap_or_else(|| "-".to_string());

    println!("\n{}", "=".repeat(50));
    println!("TRADE LOG: {}", symbol);
    println!("{}", "=".repeat(50));
    println!("  Buys / sells:       {} / {}", summary.buy_count, summary.sell_count);
    println!("  Average buy price:  {}", fmt(summary.average_buy_price));
    println!("  Average sell price: {}", fmt(summary.average_sell_price));
    println!("  Latest buy price:   {}", fmt(summary.latest_buy_price));
    println!("  Latest sell price:  {}", fmt(summary.latest_sell_price));
    let verdict = match summary.in_profit {
        Some(true) => "in profit",
        Some(false) => "not in profit",
        None => "undetermined",
    };
    println!("  Status:             {}", verdict);
    println!("{}\n", "=".repeat(50));

    Ok(())
}
