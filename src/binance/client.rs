//! Binance market-data client
//!
//! Public endpoints only (klines, exchange info, ticker price); no API key is
//! needed. Every request goes through the shared [`RequestPolicy`].

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::types::{ApiErrorBody, BinanceKline, ExchangeInfoResponse, TickerPrice};
use crate::common::RequestPolicy;
use crate::config::ExchangeConfig;
use crate::data::CandleSource;
use crate::error::ExchangeError;
use crate::risk::SymbolFilters;
use crate::types::{Interval, Symbol};

/// Maximum klines per request (Binance limit)
pub const MAX_KLINES_PER_REQUEST: u32 = 1000;

/// Build the HTTP client used by both Binance clients
pub(crate) fn http_client(config: &ExchangeConfig) -> Result<Client, ExchangeError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()?)
}

/// Read a response body, mapping non-2xx statuses to [`ExchangeError::Api`]
pub(crate) async fn read_body(response: reqwest::Response) -> Result<String, ExchangeError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|e| format!("{} (code {})", e.msg, e.code))
            .unwrap_or(text);
        return Err(ExchangeError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(text)
}

/// Binance public API client
#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: Client,
    base_url: String,
    policy: RequestPolicy,
}

impl BinanceClient {
    pub fn new(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        Ok(Self {
            http: http_client(config)?,
            base_url: config.market_data_url.trim_end_matches('/').to_string(),
            policy: RequestPolicy::new(config),
        })
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<String, ExchangeError> {
        let url = format!("{}{}", self.base_url, path);
        self.policy
            .execute(|| {
                let request = self.http.get(&url).query(params);
                async move { read_body(request.send().await?).await }
            })
            .await
    }

    /// Fetch the most recent klines for `symbol`
    pub async fn get_klines(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: u32,
    ) -> Result<Vec<BinanceKline>, ExchangeError> {
        let limit = limit.clamp(1, MAX_KLINES_PER_REQUEST);
        debug!(symbol = %symbol, interval = %interval, limit, "Fetching klines");

        let body = self
            .get(
                "/api/v3/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let raw: Vec<Vec<serde_json::Value>> = serde_json::from_str(&body)?;
        let klines: Vec<BinanceKline> = raw
            .iter()
            .filter_map(|row| BinanceKline::from_raw(row))
            .collect();

        if klines.len() < raw.len() {
            debug!(
                symbol = %symbol,
                "Dropped {} unparseable kline rows",
                raw.len() - klines.len()
            );
        }

        Ok(klines)
    }

    /// PRICE_FILTER / LOT_SIZE for `symbol`
    pub async fn get_symbol_filters(&self, symbol: &Symbol) -> Result<SymbolFilters, ExchangeError> {
        let body = self
            .get("/api/v3/exchangeInfo", &[("symbol", symbol.to_string())])
            .await?;
        let info: ExchangeInfoResponse = serde_json::from_str(&body)?;

        info.symbols
            .iter()
            .find(|s| s.symbol == symbol.as_str())
            .ok_or_else(|| ExchangeError::UnknownSymbol(symbol.to_string()))?
            .trading_filters()
    }

    /// Latest traded price
    pub async fn get_price(&self, symbol: &Symbol) -> Result<f64, ExchangeError> {
        let body = self
            .get("/api/v3/ticker/price", &[("symbol", symbol.to_string())])
            .await?;
        let ticker: TickerPrice = serde_json::from_str(&body)?;
        Ok(ticker.price)
    }
}

#[async_trait]
impl CandleSource for BinanceClient {
    async fn fetch_klines(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: u32,
    ) -> Result<Vec<BinanceKline>, ExchangeError> {
        self.get_klines(symbol, interval, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_base_url() {
        let config = ExchangeConfig {
            market_data_url: "https://testnet.binance.vision/".to_string(),
            ..ExchangeConfig::default()
        };
        let client = BinanceClient::new(&config).unwrap();
        assert_eq!(client.base_url, "https://testnet.binance.vision");
    }
}
