//! Binance REST clients
//!
//! [`BinanceClient`] serves public market data and is the production
//! [`CandleSource`](crate::data::CandleSource). [`MarginAccountClient`] signs
//! cross-margin account queries and is the production
//! [`AccountClient`](crate::risk::AccountClient).

mod auth;
mod client;
mod margin;
mod types;

pub use auth::{sign_request, Credentials};
pub use client::{BinanceClient, MAX_KLINES_PER_REQUEST};
pub use margin::MarginAccountClient;
pub use types::*;
