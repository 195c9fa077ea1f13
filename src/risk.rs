//! Risk gate: margin health and open-position checks
//!
//! Every signal passes through [`RiskGate::check`] before it is sized. The
//! gate is fail-closed: when the account cannot be queried the answer is
//! "do not trade", logged, never an error for the caller to propagate.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::RiskConfig;
use crate::error::ExchangeError;
use crate::types::{Side, Symbol};

// =============================================================================
// Account collaborator
// =============================================================================

/// Balance of one asset in the margin account
#[derive(Debug, Clone, PartialEq)]
pub struct MarginAsset {
    pub asset: String,
    pub free: f64,
    pub locked: f64,
    pub borrowed: f64,
}

impl MarginAsset {
    /// free + locked - borrowed
    pub fn net_balance(&self) -> f64 {
        self.free + self.locked - self.borrowed
    }
}

/// Snapshot of the cross-margin account
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarginAccount {
    pub total_asset_of_btc: f64,
    pub total_liability_of_btc: f64,
    pub total_collateral_value_in_usdt: f64,
    pub user_assets: Vec<MarginAsset>,
}

impl MarginAccount {
    /// Total assets over total liability, both BTC-denominated
    ///
    /// Undefined (`None`) for an account without liability.
    pub fn margin_ratio(&self) -> Option<f64> {
        if self.total_liability_of_btc == 0.0 {
            None
        } else {
            Some(self.total_asset_of_btc / self.total_liability_of_btc)
        }
    }

    pub fn asset(&self, asset: &str) -> Option<&MarginAsset> {
        self.user_assets.iter().find(|a| a.asset == asset)
    }
}

/// Exchange trading filters for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolFilters {
    pub min_price: Decimal,
    pub tick_size: Decimal,
    pub min_qty: Decimal,
    pub step_size: Decimal,
}

/// An open margin order as reported by the exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOrder {
    pub symbol: String,
    /// "BUY" or "SELL"
    pub side: String,
    /// e.g. "NEW", "PARTIALLY_FILLED"
    pub status: String,
}

impl OpenOrder {
    pub fn is_pending_sell(&self) -> bool {
        self.side == "SELL" && self.status == "NEW"
    }
}

/// Account and symbol-metadata queries used by the gate and the sizer
///
/// Order submission is deliberately not part of this trait.
#[async_trait]
pub trait AccountClient: Send + Sync {
    async fn margin_account(&self) -> Result<MarginAccount, ExchangeError>;

    async fn symbol_filters(&self, symbol: &Symbol) -> Result<SymbolFilters, ExchangeError>;

    async fn open_margin_orders(&self, symbol: &Symbol) -> Result<Vec<OpenOrder>, ExchangeError>;

    async fn current_price(&self, symbol: &Symbol) -> Result<f64, ExchangeError>;
}

// =============================================================================
// Gate
// =============================================================================

/// Why a signal was suppressed
#[derive(Debug, Clone, PartialEq)]
pub enum BlockReason {
    /// Margin ratio at or below the threshold
    MarginRatio(f64),
    /// Margin ratio undefined because the account has no liability
    NoLiability,
    /// A sell while a short (borrowed base asset) is already open
    ShortOpen,
    /// A buy while a long (net base balance with a pending sell) is already open
    LongOpen,
    /// The account could not be queried
    AccountUnavailable(String),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::MarginRatio(ratio) => write!(f, "margin ratio {:.4} too low", ratio),
            BlockReason::NoLiability => f.write_str("margin ratio undefined without liability"),
            BlockReason::ShortOpen => f.write_str("short position already open"),
            BlockReason::LongOpen => f.write_str("long position already open"),
            BlockReason::AccountUnavailable(e) => write!(f, "account unavailable: {}", e),
        }
    }
}

/// Outcome of a gate check
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Allowed { margin_ratio: f64 },
    Blocked(BlockReason),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed { .. })
    }
}

/// Current position state for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionState {
    pub short_open: bool,
    pub long_open: bool,
}

pub struct RiskGate {
    account: Arc<dyn AccountClient>,
    config: RiskConfig,
}

impl RiskGate {
    pub fn new(account: Arc<dyn AccountClient>, config: RiskConfig) -> Self {
        Self { account, config }
    }

    /// Whether the margin account is healthy enough to trade at all
    pub async fn margin_allows_trading(&self) -> Result<f64, BlockReason> {
        let account = self
            .account
            .margin_account()
            .await
            .map_err(|e| BlockReason::AccountUnavailable(e.to_string()))?;

        let Some(ratio) = account.margin_ratio() else {
            warn!(
                total_asset_of_btc = account.total_asset_of_btc,
                "Margin account has no liability, margin ratio undefined"
            );
            return Err(BlockReason::NoLiability);
        };

        if ratio > self.config.margin_ratio_threshold {
            debug!(margin_ratio = ratio, "Margin level is healthy");
            Ok(ratio)
        } else {
            Err(BlockReason::MarginRatio(ratio))
        }
    }

    /// Short and long state for `symbol`
    pub async fn position_state(&self, symbol: &Symbol) -> Result<PositionState, ExchangeError> {
        let account = self.account.margin_account().await?;
        let base = account.asset(symbol.base_asset());

        let short_open = base.is_some_and(|a| a.borrowed > 0.0);
        let net_balance = base.map(MarginAsset::net_balance).unwrap_or(0.0);

        // Only pay for the open-orders query when a long is possible
        let long_open = if net_balance > 0.0 {
            let orders = self.account.open_margin_orders(symbol).await?;
            orders.iter().any(OpenOrder::is_pending_sell)
        } else {
            false
        };

        Ok(PositionState {
            short_open,
            long_open,
        })
    }

    /// Decide whether a signal on `symbol` in direction `side` may proceed
    pub async fn check(&self, symbol: &Symbol, side: Side) -> GateDecision {
        let decision = self.evaluate(symbol, side).await;

        match &decision {
            GateDecision::Allowed { margin_ratio } => {
                info!(symbol = %symbol, side = %side, margin_ratio, "Risk gate passed");
            }
            GateDecision::Blocked(reason @ BlockReason::AccountUnavailable(_)) => {
                warn!(symbol = %symbol, side = %side, "Risk gate failed closed: {}", reason);
            }
            GateDecision::Blocked(reason) => {
                info!(symbol = %symbol, side = %side, "Signal suppressed: {}", reason);
            }
        }

        decision
    }

    async fn evaluate(&self, symbol: &Symbol, side: Side) -> GateDecision {
        let margin_ratio = match self.margin_allows_trading().await {
            Ok(ratio) => ratio,
            Err(reason) => return GateDecision::Blocked(reason),
        };

        let position = match self.position_state(symbol).await {
            Ok(p) => p,
            Err(e) => return GateDecision::Blocked(BlockReason::AccountUnavailable(e.to_string())),
        };

        match side {
            Side::Sell if position.short_open => GateDecision::Blocked(BlockReason::ShortOpen),
            Side::Buy if position.long_open => GateDecision::Blocked(BlockReason::LongOpen),
            _ => GateDecision::Allowed { margin_ratio },
        }
    }
}
