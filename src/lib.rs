//! Regime Signals
//!
//! Multi-symbol crypto pipeline that turns exchange candles into technical
//! features (RSI, ATR, moving averages, multi-scale extrema, RSI divergence,
//! consolidation ranges), classifies trend and flag breakouts, and converts
//! the resulting signals into risk-gated, exchange-aligned order intents.

pub mod binance;
pub mod common;
pub mod config;
pub mod data;
pub mod error;
pub mod execution;
pub mod features;
pub mod indicators;
pub mod pipeline;
pub mod risk;
pub mod scheduler;
pub mod signals;
pub mod sizing;
pub mod storage;
pub mod trend;
pub mod types;

pub use config::Config;
pub use types::*;
