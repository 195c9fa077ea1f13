//! Candle acquisition and normalization
//!
//! Raw klines from the exchange are converted to validated [`Candle`]s,
//! sorted by open time and de-duplicated before they reach the feature
//! engine. Candle histories can also be loaded from CSV for offline runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::Path;
use tracing::warn;

use crate::binance::BinanceKline;
use crate::error::ExchangeError;
use crate::types::{Candle, CandleValidationError, Interval, Symbol};

// =============================================================================
// Candle Source
// =============================================================================

/// Market data collaborator: the most recent `limit` klines for a symbol
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn fetch_klines(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: u32,
    ) -> Result<Vec<BinanceKline>, ExchangeError>;
}

// =============================================================================
// Candle Conversion
// =============================================================================

/// Convert from Binance kline to internal Candle type with validation
impl TryFrom<&BinanceKline> for Candle {
    type Error = CandleValidationError;

    fn try_from(k: &BinanceKline) -> Result<Self, Self::Error> {
        let open_time = DateTime::from_timestamp_millis(k.open_time).ok_or(
            CandleValidationError::InvalidTimestamp(k.open_time),
        )?;
        Candle::new(open_time, k.open, k.high, k.low, k.close, k.volume)
    }
}

/// Validate, sort and de-duplicate raw klines
///
/// Malformed klines are skipped with a warning. When two klines share an
/// open time the later one in the input wins.
pub fn normalize_klines(symbol: &Symbol, klines: &[BinanceKline]) -> Vec<Candle> {
    let mut candles = Vec::with_capacity(klines.len());
    let mut invalid_count = 0;

    for kline in klines {
        match Candle::try_from(kline) {
            Ok(candle) => candles.push(candle),
            Err(e) => {
                invalid_count += 1;
                warn!(symbol = %symbol, open_time = kline.open_time, "Skipping invalid kline: {}", e);
            }
        }
    }

    if invalid_count > 0 {
        warn!(
            symbol = %symbol,
            "Skipped {} invalid klines out of {}",
            invalid_count,
            klines.len()
        );
    }

    sort_and_dedup(candles)
}

/// Sort by open time; the last occurrence of a duplicated open time is kept
pub fn sort_and_dedup(mut candles: Vec<Candle>) -> Vec<Candle> {
    // Stable sort keeps input order among equal open times
    candles.sort_by_key(|c| c.open_time);
    let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        match out.last_mut() {
            Some(last) if last.open_time == candle.open_time => *last = candle,
            _ => out.push(candle),
        }
    }
    out
}

// =============================================================================
// CSV Data Loading
// =============================================================================

/// Parse an open-time cell: RFC 3339, `%Y-%m-%d %H:%M:%S`, or epoch milliseconds
pub fn parse_open_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = value.parse::<DateTime<Utc>>() {
        return Some(dt);
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(ndt.and_utc());
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

/// Load OHLCV data from CSV file with validation
///
/// Columns are positional: open time, open, high, low, close, volume. Extra
/// columns are ignored. Invalid candles are skipped with a warning.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut candles = Vec::new();
    let mut invalid_count = 0;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let dt_str = record.get(0).context("Missing open time column")?;
        let open_time = parse_open_time(dt_str)
            .with_context(|| format!("Failed to parse open time: {}", dt_str))?;

        let mut prices = [0.0f64; 5];
        for (col, price) in prices.iter_mut().enumerate() {
            *price = record
                .get(col + 1)
                .with_context(|| format!("Missing column {} at row {}", col + 1, row_idx + 1))?
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse column {} at row {}", col + 1, row_idx + 1))?;
        }
        let [open, high, low, close, volume] = prices;

        match Candle::new(open_time, open, high, low, close, volume) {
            Ok(candle) => candles.push(candle),
            Err(e) => {
                invalid_count += 1;
                warn!(
                    "Skipping invalid candle at row {} in {:?}: {}",
                    row_idx + 2, // +2 for 1-indexed and header row
                    path.file_name().unwrap_or_default(),
                    e
                );
            }
        }
    }

    if invalid_count > 0 {
        warn!(
            "Skipped {} invalid candles out of {} in {:?}",
            invalid_count,
            invalid_count + candles.len(),
            path.file_name().unwrap_or_default()
        );
    }

    Ok(sort_and_dedup(candles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn kline(open_time: i64, close: f64) -> BinanceKline {
        BinanceKline {
            open_time,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
            close_time: open_time + 299_999,
        }
    }

    #[test]
    fn test_normalize_drops_invalid_and_sorts() {
        let mut bad = kline(600_000, 100.0);
        bad.high = 50.0;

        let klines = vec![
            kline(300_000, 101.0),
            bad,
            kline(0, 100.0),
            kline(300_000, 102.0),
        ];
        let candles = normalize_klines(&Symbol::new("ETHUSDT"), &klines);

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time.timestamp_millis(), 0);
        assert_eq!(candles[1].open_time.timestamp_millis(), 300_000);
        assert_eq!(candles[1].close, 102.0);
    }

    #[test]
    fn test_parse_open_time_formats() {
        let expected = DateTime::from_timestamp_millis(1_704_067_200_000).unwrap();
        assert_eq!(parse_open_time("2024-01-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_open_time("2024-01-01 00:00:00"), Some(expected));
        assert_eq!(parse_open_time("1704067200000"), Some(expected));
        assert_eq!(parse_open_time("yesterday"), None);
    }

    #[test]
    fn test_load_csv_skips_invalid_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Open Time,Open,High,Low,Close,Volume").unwrap();
        writeln!(file, "2024-01-01 00:05:00,10,11,9,10.5,100").unwrap();
        writeln!(file, "2024-01-01 00:00:00,10,11,9,10.2,100").unwrap();
        writeln!(file, "2024-01-01 00:10:00,10,9,11,10.5,100").unwrap();
        file.flush().unwrap();

        let candles = load_csv(file.path()).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].close, 10.2);
        assert_eq!(candles[1].close, 10.5);
    }
}
