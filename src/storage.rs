//! Persistence: feature sequences, raw candles and the trade audit log
//!
//! Layout under the configured directories:
//!
//! ```text
//! {data_dir}/{SYMBOL}/{SYMBOL}_{interval}_data.csv      raw candles (overwritten)
//! {data_dir}/{SYMBOL}/{SYMBOL}_{interval}_features.csv  features (overwritten)
//! {trade_log_dir}/{SYMBOL}_trades.csv                   audit log (append-only)
//! ```

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::StorageError;
use crate::types::{Candle, FeatureRow, Interval, Side, Symbol, TradeLogEntry};

// =============================================================================
// Feature store
// =============================================================================

/// Per symbol+interval feature and candle persistence
pub trait FeatureStore: Send + Sync {
    /// Last saved feature sequence, `None` if nothing was saved yet
    fn load(&self, symbol: &Symbol, interval: Interval) -> Result<Option<Vec<FeatureRow>>, StorageError>;

    /// Replace the stored feature sequence
    fn save(&self, symbol: &Symbol, interval: Interval, rows: &[FeatureRow]) -> Result<(), StorageError>;

    /// Replace the stored raw candles
    fn save_candles(&self, symbol: &Symbol, interval: Interval, candles: &[Candle]) -> Result<(), StorageError>;
}

/// CSV-backed [`FeatureStore`]
#[derive(Debug, Clone)]
pub struct CsvFeatureStore {
    data_dir: PathBuf,
}

impl CsvFeatureStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn features_path(&self, symbol: &Symbol, interval: Interval) -> PathBuf {
        self.data_dir
            .join(symbol.as_str())
            .join(format!("{}_{}_features.csv", symbol, interval))
    }

    pub fn candles_path(&self, symbol: &Symbol, interval: Interval) -> PathBuf {
        self.data_dir
            .join(symbol.as_str())
            .join(format!("{}_{}_data.csv", symbol, interval))
    }
}

impl FeatureStore for CsvFeatureStore {
    fn load(&self, symbol: &Symbol, interval: Interval) -> Result<Option<Vec<FeatureRow>>, StorageError> {
        let path = self.features_path(symbol, interval);
        if !path.exists() {
            return Ok(None);
        }
        read_csv(&path).map(Some)
    }

    fn save(&self, symbol: &Symbol, interval: Interval, rows: &[FeatureRow]) -> Result<(), StorageError> {
        let path = self.features_path(symbol, interval);
        write_csv(&path, rows)?;
        debug!(symbol = %symbol, interval = %interval, rows = rows.len(), "Saved features to {}", path.display());
        Ok(())
    }

    fn save_candles(&self, symbol: &Symbol, interval: Interval, candles: &[Candle]) -> Result<(), StorageError> {
        write_csv(&self.candles_path(symbol, interval), candles)
    }
}

/// Overwrite `path` with `rows`, creating parent directories
pub fn write_csv<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_csv<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

// =============================================================================
// Trade log
// =============================================================================

/// Append-only audit trail of computed order intents
pub trait TradeLog: Send + Sync {
    fn append(&self, entry: &TradeLogEntry) -> Result<(), StorageError>;
}

/// One CSV file per symbol; the header is written only when the file is created
#[derive(Debug)]
pub struct CsvTradeLog {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvTradeLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path_for(&self, symbol: &Symbol) -> PathBuf {
        self.dir.join(format!("{}_trades.csv", symbol))
    }
}

impl TradeLog for CsvTradeLog {
    fn append(&self, entry: &TradeLogEntry) -> Result<(), StorageError> {
        // A poisoned lock only means another append panicked; the file is still append-only
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&entry.symbol);
        let is_new = !path.exists();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        writer.serialize(entry)?;
        writer.flush()?;
        Ok(())
    }
}

// =============================================================================
// Trade log analysis
// =============================================================================

/// Price summary of one symbol's trade log
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradeSummary {
    pub buy_count: usize,
    pub sell_count: usize,
    pub average_buy_price: Option<f64>,
    pub average_sell_price: Option<f64>,
    pub latest_buy_price: Option<f64>,
    pub latest_sell_price: Option<f64>,
    /// Latest sell above the average buy; `None` when either side is missing
    pub in_profit: Option<bool>,
}

pub fn summarize_entries(entries: &[TradeLogEntry]) -> TradeSummary {
    let prices = |side: Side| -> Vec<f64> {
        entries
            .iter()
            .filter(|e| e.action == side)
            .map(|e| e.price)
            .collect()
    };
    let average = |p: &[f64]| (!p.is_empty()).then(|| p.iter().sum::<f64>() / p.len() as f64);

    let buys = prices(Side::Buy);
    let sells = prices(Side::Sell);

    let average_buy_price = average(&buys);
    let latest_sell_price = sells.last().copied();

    TradeSummary {
        buy_count: buys.len(),
        sell_count: sells.len(),
        average_buy_price,
        average_sell_price: average(&sells),
        latest_buy_price: buys.last().copied(),
        latest_sell_price,
        in_profit: match (latest_sell_price, average_buy_price) {
            (Some(sell), Some(buy)) => Some(sell > buy),
            _ => None,
        },
    }
}

/// Summarize a trade log file
pub fn summarize_trades(path: impl AsRef<Path>) -> Result<TradeSummary, StorageError> {
    let entries: Vec<TradeLogEntry> = read_csv(path.as_ref())?;
    Ok(summarize_entries(&entries))
}
