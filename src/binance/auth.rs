//! Request signing for Binance SIGNED endpoints

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::ExchangeConfig;
use crate::error::ExchangeError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub fn from_config(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        match (&config.api_key, &config.api_secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Ok(Self::new(key, secret))
            }
            _ => Err(ExchangeError::MissingCredentials),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Hex HMAC-SHA256 of the query string
    pub fn sign(&self, query: &str) -> String {
        sign_request(query, &self.api_secret)
    }
}

/// Sign a query string with the API secret
pub fn sign_request(query: &str, api_secret: &str) -> String {
    // HMAC accepts keys of any length, so new_from_slice cannot fail here
    let mut mac = match HmacSha256::new_from_slice(api_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(query.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Append `timestamp` and `signature` to `params`, returning the full query
pub fn signed_query(credentials: &Credentials, params: &[(&str, String)], timestamp_ms: i64) -> String {
    let mut query: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    query.push(format!("timestamp={}", timestamp_ms));
    let query = query.join("&");
    let signature = credentials.sign(&query);
    format!("{}&signature={}", query, signature)
}
