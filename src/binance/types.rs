//! Binance REST payloads
//!
//! Numeric fields arrive as JSON strings; they are parsed here so the rest of
//! the crate only sees `f64`/`Decimal`.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

use crate::error::ExchangeError;
use crate::risk::{MarginAccount, MarginAsset, OpenOrder, SymbolFilters};

/// Binance kline/candlestick data
///
/// API returns an array: [open_time, open, high, low, close, volume,
/// close_time, quote_volume, trades, taker_buy_base, taker_buy_quote, ignore].
/// Only the OHLCV fields and the two timestamps are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct BinanceKline {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
}

impl BinanceKline {
    /// Parse from raw JSON array returned by Binance API
    pub fn from_raw(raw: &[serde_json::Value]) -> Option<Self> {
        if raw.len() < 7 {
            return None;
        }

        let num = |v: &serde_json::Value| -> Option<f64> {
            match v {
                serde_json::Value::String(s) => s.parse().ok(),
                other => other.as_f64(),
            }
        };

        Some(BinanceKline {
            open_time: raw[0].as_i64()?,
            open: num(&raw[1])?,
            high: num(&raw[2])?,
            low: num(&raw[3])?,
            close: num(&raw[4])?,
            volume: num(&raw[5])?,
            close_time: raw[6].as_i64()?,
        })
    }
}

fn de_str_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn de_opt_str_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

// =============================================================================
// Margin account
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginAccountResponse {
    #[serde(deserialize_with = "de_str_f64")]
    pub total_asset_of_btc: f64,
    #[serde(deserialize_with = "de_str_f64")]
    pub total_liability_of_btc: f64,
    #[serde(
        rename = "totalCollateralValueInUSDT",
        default,
        deserialize_with = "de_opt_str_f64"
    )]
    pub total_collateral_value_in_usdt: Option<f64>,
    #[serde(default)]
    pub user_assets: Vec<UserAssetResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserAssetResponse {
    pub asset: String,
    #[serde(deserialize_with = "de_str_f64")]
    pub free: f64,
    #[serde(deserialize_with = "de_str_f64")]
    pub locked: f64,
    #[serde(deserialize_with = "de_str_f64")]
    pub borrowed: f64,
}

impl From<MarginAccountResponse> for MarginAccount {
    fn from(r: MarginAccountResponse) -> Self {
        MarginAccount {
            total_asset_of_btc: r.total_asset_of_btc,
            total_liability_of_btc: r.total_liability_of_btc,
            total_collateral_value_in_usdt: r.total_collateral_value_in_usdt.unwrap_or(0.0),
            user_assets: r
                .user_assets
                .into_iter()
                .map(|a| MarginAsset {
                    asset: a.asset,
                    free: a.free,
                    locked: a.locked,
                    borrowed: a.borrowed,
                })
                .collect(),
        }
    }
}

// =============================================================================
// Exchange info
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfoResponse {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub filters: Vec<serde_json::Value>,
}

impl SymbolInfo {
    fn filter(&self, filter_type: &str) -> Result<&serde_json::Value, ExchangeError> {
        self.filters
            .iter()
            .find(|f| f.get("filterType").and_then(|t| t.as_str()) == Some(filter_type))
            .ok_or_else(|| ExchangeError::MissingFilter {
                symbol: self.symbol.clone(),
                filter: filter_type.to_string(),
            })
    }

    fn decimal_field(
        &self,
        filter: &serde_json::Value,
        field: &str,
    ) -> Result<Decimal, ExchangeError> {
        let raw = filter
            .get(field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ExchangeError::MissingFilter {
                symbol: self.symbol.clone(),
                filter: field.to_string(),
            })?;
        Decimal::from_str(raw)
            .map(|d| d.normalize())
            .map_err(|e| ExchangeError::Parse(format!("{} {}: {}", self.symbol, field, e)))
    }

    /// PRICE_FILTER and LOT_SIZE, looked up by filter type
    pub fn trading_filters(&self) -> Result<SymbolFilters, ExchangeError> {
        let price = self.filter("PRICE_FILTER")?;
        let lot = self.filter("LOT_SIZE")?;

        Ok(SymbolFilters {
            min_price: self.decimal_field(price, "minPrice")?,
            tick_size: self.decimal_field(price, "tickSize")?,
            min_qty: self.decimal_field(lot, "minQty")?,
            step_size: self.decimal_field(lot, "stepSize")?,
        })
    }
}

// =============================================================================
// Orders and tickers
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct OpenOrderResponse {
    pub symbol: String,
    pub side: String,
    pub status: String,
}

impl From<OpenOrderResponse> for OpenOrder {
    fn from(r: OpenOrderResponse) -> Self {
        OpenOrder {
            symbol: r.symbol,
            side: r.side,
            status: r.status,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    #[serde(deserialize_with = "de_str_f64")]
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_kline_from_raw() {
        let raw = json!([
            1704067200000i64, "42000.10", "42100.00", "41900.50", "42050.00", "12.5",
            1704067499999i64, "525000.0", 100, "6.0", "250000.0", "0"
        ]);
        let kline = BinanceKline::from_raw(raw.as_array().unwrap()).unwrap();

        assert_eq!(kline.open_time, 1704067200000);
        assert_eq!(kline.close, 42050.0);
        assert_eq!(kline.volume, 12.5);

        assert!(BinanceKline::from_raw(&[json!(1), json!("x")]).is_none());
    }

    #[test]
    fn test_margin_account_parse() {
        let body = json!({
            "borrowEnabled": true,
            "marginLevel": "11.64405625",
            "totalAssetOfBtc": "6.82728457",
            "totalLiabilityOfBtc": "0.58633215",
            "totalNetAssetOfBtc": "6.24095242",
            "totalCollateralValueInUSDT": "5795.56",
            "userAssets": [
                { "asset": "ETH", "borrowed": "0.5", "free": "1.0", "interest": "0", "locked": "0.25", "netAsset": "0.75" }
            ]
        });
        let account: MarginAccount =
            serde_json::from_value::<MarginAccountResponse>(body).unwrap().into();

        assert_eq!(account.total_collateral_value_in_usdt, 5795.56);
        assert_eq!(account.asset("ETH").unwrap().net_balance(), 0.75);
    }

    #[test]
    fn test_filters_found_by_type() {
        let info: SymbolInfo = serde_json::from_value(json!({
            "symbol": "ETHUSDT",
            "filters": [
                { "filterType": "LOT_SIZE", "minQty": "0.00010000", "maxQty": "9000.0", "stepSize": "0.00010000" },
                { "filterType": "PERCENT_PRICE_BY_SIDE" },
                { "filterType": "PRICE_FILTER", "minPrice": "0.01000000", "maxPrice": "1000000.0", "tickSize": "0.01000000" }
            ]
        }))
        .unwrap();

        let filters = info.trading_filters().unwrap();
        assert_eq!(filters.tick_size, dec!(0.01));
        assert_eq!(filters.step_size, dec!(0.0001));
        assert_eq!(filters.min_qty, dec!(0.0001));
    }

    #[test]
    fn test_missing_filter_is_an_error() {
        let info: SymbolInfo = serde_json::from_value(json!({
            "symbol": "ETHUSDT",
            "filters": [ { "filterType": "PRICE_FILTER", "minPrice": "0.01", "tickSize": "0.01" } ]
        }))
        .unwrap();

        assert!(matches!(
            info.trading_filters(),
            Err(ExchangeError::MissingFilter { .. })
        ));
    }
}
