//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files with environment
//! variable support for API credentials. Every section falls back to its
//! `Default`, so a config file only needs the keys it overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::{Interval, Symbol};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub exchange: ExchangeConfig,
    pub trading: TradingConfig,
    pub features: FeatureConfig,
    pub signals: SignalConfig,
    pub risk: RiskConfig,
    pub schedules: Vec<ScheduleConfig>,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            exchange: ExchangeConfig::default(),
            trading: TradingConfig::default(),
            features: FeatureConfig::default(),
            signals: SignalConfig::default(),
            risk: RiskConfig::default(),
            schedules: default_schedules(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.apply_env();
        Ok(config)
    }

    /// Load from file if it exists, otherwise defaults (still honouring env credentials)
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let mut config = Config::default();
            config.apply_env();
            Ok(config)
        }
    }

    /// Load API credentials from environment if set
    fn apply_env(&mut self) {
        if let Ok(api_key) = std::env::var("BINANCE_API_KEY") {
            self.exchange.api_key = Some(api_key);
        }
        if let Ok(api_secret) = std::env::var("BINANCE_API_SECRET") {
            self.exchange.api_secret = Some(api_secret);
        }
    }

    /// Schedule for an interval class, if configured
    pub fn schedule_for(&self, interval: Interval) -> Option<&ScheduleConfig> {
        self.schedules.iter().find(|s| s.interval == interval)
    }
}

/// Exchange configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
    /// Public market data (klines, exchange info, tickers)
    pub market_data_url: String,
    /// Signed margin account endpoints
    pub account_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub rate_limit: u32,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            api_key: None,
            api_secret: None,
            market_data_url: "https://api.binance.com".to_string(),
            account_url: "https://api.binance.com".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            rate_limit: 10,
        }
    }
}

/// How computed order intents are handed off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Simulate,
    Live,
}

/// Trading universe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub symbols: Vec<String>,
    /// Symbols excluded from the RSI-extreme trigger
    pub base_reference_symbols: Vec<String>,
    /// Symbols priced below a cent, sized with an 8-decimal price
    pub micro_priced_symbols: Vec<String>,
    pub candle_limit: u32,
    pub execution: ExecutionMode,
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            symbols: [
                "BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT", "DOGEUSDT", "ADAUSDT",
                "SHIBUSDT", "AVAXUSDT", "WBTCUSDT", "TRXUSDT", "LINKUSDT",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            base_reference_symbols: vec!["BTCUSDT".to_string(), "WBTCUSDT".to_string()],
            micro_priced_symbols: ["SHIBUSDT", "PEPEUSDT", "BONKUSDT", "FLOKIUSDT"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            candle_limit: 700,
            execution: ExecutionMode::Simulate,
        }
    }
}

impl TradingConfig {
    pub fn symbols(&self) -> Vec<Symbol> {
        self.symbols.iter().map(Symbol::new).collect()
    }

    pub fn is_base_reference(&self, symbol: &Symbol) -> bool {
        self.base_reference_symbols
            .iter()
            .any(|s| Symbol::new(s) == *symbol)
    }

    pub fn is_micro_priced(&self, symbol: &Symbol) -> bool {
        self.micro_priced_symbols
            .iter()
            .any(|s| Symbol::new(s) == *symbol)
    }
}

/// Feature engine windows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub rsi_period: usize,
    pub atr_period: usize,
    pub ma_fast: usize,
    pub ma_slow: usize,
    pub mean_atr_window: usize,
    pub extrema_order: usize,
    pub medium_extrema_order: usize,
    pub big_extrema_order: usize,
    /// Neighborhood used to find the pivots that divergence is tested at
    pub divergence_order: usize,
    pub divergence_windows: Vec<usize>,
    pub consolidation_window: usize,
    pub consolidation_threshold: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            rsi_period: 14,
            atr_period: 14,
            ma_fast: 22,
            ma_slow: 50,
            mean_atr_window: 12,
            extrema_order: 5,
            medium_extrema_order: 30,
            big_extrema_order: 50,
            divergence_order: 9,
            divergence_windows: vec![15, 30],
            consolidation_window: 12,
            consolidation_threshold: 0.003,
        }
    }
}

/// Signal trigger thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// (oversold, overbought) RSI bands for divergence on the 15m interval
    pub divergence_bands_15m: (f64, f64),
    /// (oversold, overbought) RSI bands for divergence on every other interval
    pub divergence_bands: (f64, f64),
    pub rsi_extreme_low: f64,
    pub rsi_extreme_high: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig {
            divergence_bands_15m: (25.0, 75.0),
            divergence_bands: (30.0, 70.0),
            rsi_extreme_low: 15.0,
            rsi_extreme_high: 85.0,
        }
    }
}

/// Risk gate and sizing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub margin_ratio_threshold: f64,
    /// Fraction of available capital committed per intent
    pub risk_fraction: f64,
    pub stop_atr_multiple: f64,
    pub buy_target_atr_multiple: f64,
    pub sell_target_atr_multiple: f64,
    /// Pair used to convert BTC-denominated liability into quote currency
    pub liability_conversion_symbol: String,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            margin_ratio_threshold: 1.7,
            risk_fraction: 0.05,
            stop_atr_multiple: 1.8,
            buy_target_atr_multiple: 2.0,
            sell_target_atr_multiple: 1.5,
            liability_conversion_symbol: "BTCUSDT".to_string(),
        }
    }
}

/// One periodic trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub interval: Interval,
    pub every_secs: u64,
    #[serde(default)]
    pub initial_delay_secs: u64,
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
}

fn default_max_concurrent_runs() -> usize {
    2
}

/// Default triggers: 5m every 5 minutes now, 1h every 31 minutes after 2 minutes
pub fn default_schedules() -> Vec<ScheduleConfig> {
    vec![
        ScheduleConfig {
            interval: Interval::Min5,
            every_secs: 300,
            initial_delay_secs: 0,
            max_concurrent_runs: default_max_concurrent_runs(),
        },
        ScheduleConfig {
            interval: Interval::Hour1,
            every_secs: 31 * 60,
            initial_delay_secs: 120,
            max_concurrent_runs: default_max_concurrent_runs(),
        },
    ]
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    pub trade_log_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: "data".to_string(),
            trade_log_dir: "trade_logs".to_string(),
        }
    }
}
