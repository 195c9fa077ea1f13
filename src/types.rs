//! Core data types used across the signal pipeline

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Validation errors for candle data
#[derive(Debug, Error)]
pub enum CandleValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("prices must be positive and finite: open={open}, high={high}, low={low}, close={close}")]
    InvalidPrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error("open time {0} is not a valid epoch-ms timestamp")]
    InvalidTimestamp(i64),
}

/// OHLCV candlestick data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(rename = "Open Time")]
    pub open_time: DateTime<Utc>,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
}

impl Candle {
    /// Create a new candle with validation
    pub fn new(
        open_time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        };
        candle.validate()?;
        Ok(candle)
    }

    /// Validate candle data integrity: finite positive prices, high >= low,
    /// non-negative volume.
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(CandleValidationError::InvalidPrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        Ok(())
    }
}

/// Trading pair symbol using Arc<str> for cheap cloning
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

/// Custom serde for Arc<str>
mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

/// Quote assets stripped when deriving the traded base asset.
const QUOTE_ASSETS: &[&str] = &["USDT", "FDUSD", "USDC", "BUSD"];

impl Symbol {
    pub fn new(s: impl AsRef<str>) -> Self {
        Symbol(std::sync::Arc::from(s.as_ref().trim().to_uppercase().as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base asset of the pair ("ETHUSDT" -> "ETH")
    pub fn base_asset(&self) -> &str {
        QUOTE_ASSETS
            .iter()
            .find_map(|quote| self.0.strip_suffix(quote))
            .filter(|base| !base.is_empty())
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Candle interval, named the way Binance names them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interval {
    Min1,
    Min3,
    Min5,
    Min15,
    Min30,
    Hour1,
    Hour2,
    Hour4,
    Hour6,
    Hour8,
    Hour12,
    Day1,
    Day3,
    Week1,
    Month1,
}

impl Interval {
    pub const ALL: [Interval; 15] = [
        Interval::Min1,
        Interval::Min3,
        Interval::Min5,
        Interval::Min15,
        Interval::Min30,
        Interval::Hour1,
        Interval::Hour2,
        Interval::Hour4,
        Interval::Hour6,
        Interval::Hour8,
        Interval::Hour12,
        Interval::Day1,
        Interval::Day3,
        Interval::Week1,
        Interval::Month1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Min1 => "1m",
            Interval::Min3 => "3m",
            Interval::Min5 => "5m",
            Interval::Min15 => "15m",
            Interval::Min30 => "30m",
            Interval::Hour1 => "1h",
            Interval::Hour2 => "2h",
            Interval::Hour4 => "4h",
            Interval::Hour6 => "6h",
            Interval::Hour8 => "8h",
            Interval::Hour12 => "12h",
            Interval::Day1 => "1d",
            Interval::Day3 => "3d",
            Interval::Week1 => "1w",
            Interval::Month1 => "1M",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .iter()
            .copied()
            .find(|i| i.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown interval: {}", s))
    }
}

impl TryFrom<String> for Interval {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.as_str().to_string()
    }
}

/// Fine-scale extrema tag (order 5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtremaTag {
    #[default]
    #[serde(rename = "0")]
    None,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "low")]
    Low,
}

/// Medium-scale extrema tag (order 30)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MediumExtremaTag {
    #[default]
    #[serde(rename = "0")]
    None,
    #[serde(rename = "medium_high")]
    MediumHigh,
    #[serde(rename = "medium_low")]
    MediumLow,
}

/// Coarse-scale extrema tag (order 50)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BigExtremaTag {
    #[default]
    #[serde(rename = "0")]
    None,
    #[serde(rename = "big_high")]
    BigHigh,
    #[serde(rename = "big_low")]
    BigLow,
}

/// Serializes `bool` columns as the 0/1 integers used in feature files
mod binary_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(u8::deserialize(deserializer)? != 0)
    }
}

/// A candle augmented with indicators and structural tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    #[serde(rename = "Open Time")]
    pub open_time: DateTime<Utc>,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
    #[serde(rename = "ATR")]
    pub atr: f64,
    #[serde(rename = "RSI")]
    pub rsi: f64,
    #[serde(rename = "MA_22")]
    pub ma_22: Option<f64>,
    #[serde(rename = "MA_50")]
    pub ma_50: Option<f64>,
    #[serde(rename = "Mean ATR")]
    pub mean_atr: Option<f64>,
    #[serde(rename = "bullish_divergence", with = "binary_flag")]
    pub bullish_divergence: bool,
    #[serde(rename = "bearish_divergence", with = "binary_flag")]
    pub bearish_divergence: bool,
    pub extrema: ExtremaTag,
    pub medium_extrema: MediumExtremaTag,
    pub big_extrema: BigExtremaTag,
    #[serde(with = "binary_flag")]
    pub consolidated: bool,
}

impl FeatureRow {
    /// Untagged row carrying the candle's prices; indicators are filled in by the engine.
    pub fn from_candle(candle: &Candle) -> Self {
        Self {
            open_time: candle.open_time,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            atr: 0.0,
            rsi: 50.0,
            ma_22: None,
            ma_50: None,
            mean_atr: None,
            bullish_divergence: false,
            bearish_divergence: false,
            extrema: ExtremaTag::None,
            medium_extrema: MediumExtremaTag::None,
            big_extrema: BigExtremaTag::None,
            consolidated: false,
        }
    }
}

/// Market regime relative to the last tagged swing high/low
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Uptrend,
    Downtrend,
    Equilibrium,
    Unknown,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Uptrend => "uptrend",
            Trend::Downtrend => "downtrend",
            Trend::Equilibrium => "equilibrium",
            Trend::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Breakout direction out of a consolidation range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    BullFlag,
    BearFlag,
    None,
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Flag::BullFlag => "bull_flag",
            Flag::BearFlag => "bear_flag",
            Flag::None => "none",
        };
        f.write_str(s)
    }
}

/// Trend and flag derived from one feature sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendState {
    pub trend: Trend,
    pub flag: Flag,
    /// Close of the last row tagged `high`
    pub last_high: Option<f64>,
    /// Close of the last row tagged `low`
    pub last_low: Option<f64>,
    pub previous_close: Option<f64>,
}

impl TrendState {
    pub fn unknown() -> Self {
        Self {
            trend: Trend::Unknown,
            flag: Flag::None,
            last_high: None,
            last_low: None,
            previous_close: None,
        }
    }
}

/// Why a signal fired
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SignalReason {
    BullFlag,
    BearFlag,
    BullishDivergence,
    BearishDivergence,
    /// Raw RSI reading that crossed an extreme band
    RsiExtreme(f64),
}

impl fmt::Display for SignalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalReason::BullFlag => f.write_str("bull_flag"),
            SignalReason::BearFlag => f.write_str("bear_flag"),
            SignalReason::BullishDivergence => f.write_str("bullish divergence"),
            SignalReason::BearishDivergence => f.write_str("bearish divergence"),
            SignalReason::RsiExtreme(rsi) => write!(f, "{}", rsi),
        }
    }
}

/// Trade intent emitted by the signal evaluator
#[derive(Debug, Clone, PartialEq)]
pub struct TradeSignal {
    pub symbol: Symbol,
    pub side: Side,
    pub reason: SignalReason,
    pub reference_price: f64,
    pub atr: f64,
    pub interval: Interval,
}

/// Sized, exchange-aligned order intent (never a live order)
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub symbol: Symbol,
    pub side: Side,
    pub interval: Interval,
    pub reason: SignalReason,
    pub reference_price: f64,
    /// Step-size aligned
    pub quantity: Decimal,
    /// Tick-size aligned
    pub stop_price: Decimal,
    /// Only set for the 5m interval
    pub target_price: Option<Decimal>,
}

/// Append-only audit record of a computed intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    #[serde(rename = "Time", with = "log_time")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Symbol")]
    pub symbol: Symbol,
    #[serde(rename = "Action")]
    pub action: Side,
    #[serde(rename = "Quantity")]
    pub quantity: Decimal,
    #[serde(rename = "Price")]
    pub price: f64,
    #[serde(rename = "Reason")]
    pub reason: String,
}

impl TradeLogEntry {
    pub fn from_intent(intent: &OrderIntent, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            symbol: intent.symbol.clone(),
            action: intent.side,
            quantity: intent.quantity,
            price: intent.reference_price,
            reason: intent.reason.to_string(),
        }
    }
}

/// Trade log timestamps use `%Y-%m-%d %H:%M:%S`
mod log_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT)
            .map(|ndt| ndt.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
