//! Features command - offline feature generation from a candle CSV

use anyhow::{bail, Context, Result};
use regime_signals::data::load_csv;
use regime_signals::features::compute_features;
use regime_signals::storage::write_csv;
use regime_signals::Config;
use std::path::PathBuf;
use tracing::info;

pub fn run(config_path: String, input: PathBuf, output: PathBuf) -> Result<()> {
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    let candles = load_csv(&input)?;
    if candles.is_empty() {
        bail!("No valid candles in {}", input.display());
    }
    info!("Loaded {} candles from {}", candles.len(), input.display());

    let rows = compute_features(&candles, &config.features);
    write_csv(&output, &rows)
        .with_context(|| format!("Failed to write features to {}", output.display()))?;

    let consolidated = rows.iter().filter(|r| r.consolidated).count();
    let bullish = rows.iter().filter(|r| r.bullish_divergence).count();
    let bearish = rows.iter().filter(|r| r.bearish_divergence).count();

    info!("Wrote {} feature rows to {}", rows.len(), output.display());
    println!("Rows:               {}", rows.len());
    println!("Consolidated rows:  {}", consolidated);
    println!("Bullish divergence: {}", bullish);
    println!("Bearish divergence: {}", bearish);

    Ok(())
}
