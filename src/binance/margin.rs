//! Binance cross-margin account client
//!
//! Signed account queries plus the public symbol metadata the sizer needs.
//! Implements [`AccountClient`]; order placement is intentionally absent.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;

use super::auth::{signed_query, Credentials};
use super::client::{http_client, read_body, BinanceClient};
use super::types::{MarginAccountResponse, OpenOrderResponse};
use crate::common::RequestPolicy;
use crate::config::ExchangeConfig;
use crate::error::ExchangeError;
use crate::risk::{AccountClient, MarginAccount, OpenOrder, SymbolFilters};
use crate::types::Symbol;

const RECV_WINDOW_MS: u32 = 5000;

#[derive(Debug, Clone)]
pub struct MarginAccountClient {
    http: Client,
    account_url: String,
    credentials: Credentials,
    policy: RequestPolicy,
    market: BinanceClient,
}

impl MarginAccountClient {
    pub fn new(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        Ok(Self {
            http: http_client(config)?,
            account_url: config.account_url.trim_end_matches('/').to_string(),
            credentials: Credentials::from_config(config)?,
            policy: RequestPolicy::new(config),
            market: BinanceClient::new(config)?,
        })
    }

    /// GET a SIGNED endpoint; timestamp and signature are regenerated per attempt
    async fn signed_get(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<String, ExchangeError> {
        let mut params = params.to_vec();
        params.push(("recvWindow", RECV_WINDOW_MS.to_string()));

        self.policy
            .execute(|| {
                let query = signed_query(&self.credentials, &params, Utc::now().timestamp_millis());
                let url = format!("{}{}?{}", self.account_url, path, query);
                let request = self
                    .http
                    .get(url)
                    .header("X-MBX-APIKEY", self.credentials.api_key());
                async move { read_body(request.send().await?).await }
            })
            .await
    }
}

#[async_trait]
impl AccountClient for MarginAccountClient {
    async fn margin_account(&self) -> Result<MarginAccount, ExchangeError> {
        let body = self.signed_get("/sapi/v1/margin/account", &[]).await?;
        let response: MarginAccountResponse = serde_json::from_str(&body)?;
        Ok(response.into())
    }

    async fn symbol_filters(&self, symbol: &Symbol) -> Result<SymbolFilters, ExchangeError> {
        self.market.get_symbol_filters(symbol).await
    }

    async fn open_margin_orders(&self, symbol: &Symbol) -> Result<Vec<OpenOrder>, ExchangeError> {
        let body = self
            .signed_get("/sapi/v1/margin/openOrders", &[("symbol", symbol.to_string())])
            .await?;
        let orders: Vec<OpenOrderResponse> = serde_json::from_str(&body)?;
        Ok(orders.into_iter().map(OpenOrder::from).collect())
    }

    async fn current_price(&self, symbol: &Symbol) -> Result<f64, ExchangeError> {
        self.market.get_price(symbol).await
    }
}
