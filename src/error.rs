//! Error types for the collaborator seams
//!
//! Orchestration and commands use `anyhow`; the typed errors here are what
//! exchange clients and stores return so callers can decide between
//! fail-closed handling and propagation.

use thiserror::Error;

/// Failures talking to the exchange (market data, account, metadata)
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Circuit breaker is open, rejecting request")]
    CircuitOpen,

    #[error("Missing {filter} filter for {symbol}")]
    MissingFilter { symbol: String, filter: String },

    #[error("Missing API credentials")]
    MissingCredentials,

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::Parse(err.to_string())
    }
}

/// Failures reading or writing persisted features, candles and trade logs
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
