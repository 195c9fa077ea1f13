//! Order sizing
//!
//! Converts a gated [`TradeSignal`] into an [`OrderIntent`]: a fixed fraction
//! of available margin capital, an ATR-based stop, a target on the 5m interval
//! only, and all three aligned to the symbol's exchange filters.
//!
//! Sizing fails closed. If filters, the account snapshot or the conversion
//! price cannot be fetched, no intent is produced.

use rust_decimal::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{RiskConfig, TradingConfig};
use crate::risk::{AccountClient, SymbolFilters};
use crate::types::{Interval, OrderIntent, Side, Symbol, TradeSignal};

/// Smallest price used when sizing micro-priced symbols
const MICRO_PRICE_FLOOR: f64 = 1e-8;

/// Stop-loss level: below the reference for buys, above it for sells
pub fn stop_price(side: Side, reference_price: f64, atr: f64, atr_multiple: f64) -> f64 {
    match side {
        Side::Buy => reference_price - atr_multiple * atr,
        Side::Sell => reference_price + atr_multiple * atr,
    }
}

/// Target level, only defined on the 5m interval
pub fn target_price(
    side: Side,
    interval: Interval,
    reference_price: f64,
    atr: f64,
    config: &RiskConfig,
) -> Option<f64> {
    if interval != Interval::Min5 {
        return None;
    }
    Some(match side {
        Side::Buy => reference_price + config.buy_target_atr_multiple * atr,
        Side::Sell => reference_price - config.sell_target_atr_multiple * atr,
    })
}

/// Floor `value` to a multiple of `step`, then clamp to `minimum`
///
/// The float is rounded to 10 decimal places first so representation noise
/// (96.39999999999999 for 96.4) does not drop a whole step. A zero step
/// disables flooring.
pub fn align_to_step(value: f64, step: Decimal, minimum: Decimal) -> Option<Decimal> {
    let value = Decimal::from_f64(value)?.round_dp(10);
    let floored = if step > Decimal::ZERO {
        (value / step).floor() * step
    } else {
        value
    };
    Some(floored.max(minimum).normalize())
}

/// Price used as the sizing denominator
///
/// Micro-priced symbols are rounded to 8 decimal places and floored at 1e-8.
pub fn sizing_price(price: f64, micro_priced: bool) -> f64 {
    if micro_priced {
        ((price * 1e8).round() / 1e8).max(MICRO_PRICE_FLOOR)
    } else {
        price
    }
}

/// Collateral value minus liability converted at `conversion_price`
pub fn available_capital(collateral_value: f64, liability_btc: f64, conversion_price: f64) -> f64 {
    collateral_value - conversion_price * liability_btc
}

/// Sizes gated signals against the live account
pub struct OrderSizer {
    account: Arc<dyn AccountClient>,
    risk: RiskConfig,
    trading: TradingConfig,
}

impl OrderSizer {
    pub fn new(account: Arc<dyn AccountClient>, risk: RiskConfig, trading: TradingConfig) -> Self {
        Self {
            account,
            risk,
            trading,
        }
    }

    /// Build the order intent for `signal`, or `None` when sizing is impossible
    pub async fn size(&self, signal: &TradeSignal) -> Option<OrderIntent> {
        let symbol = &signal.symbol;

        let filters = match self.account.symbol_filters(symbol).await {
            Ok(f) => f,
            Err(e) => {
                warn!(symbol = %symbol, "Cannot size order, filter metadata unavailable: {}", e);
                return None;
            }
        };

        let capital = self.capital().await?;
        if capital <= 0.0 {
            info!(symbol = %symbol, capital, "No capital available, skipping order");
            return None;
        }

        let intent = self.build_intent(signal, capital, &filters);
        match &intent {
            Some(intent) => info!(
                symbol = %symbol,
                side = %intent.side,
                quantity = %intent.quantity,
                stop = %intent.stop_price,
                target = ?intent.target_price,
                "Order intent computed"
            ),
            None => warn!(symbol = %symbol, "Order intent could not be aligned to filters"),
        }
        intent
    }

    async fn capital(&self) -> Option<f64> {
        let account = match self.account.margin_account().await {
            Ok(a) => a,
            Err(e) => {
                warn!("Cannot size order, margin account unavailable: {}", e);
                return None;
            }
        };

        let conversion = Symbol::new(&self.risk.liability_conversion_symbol);
        let conversion_price = match self.account.current_price(&conversion).await {
            Ok(p) => p,
            Err(e) => {
                warn!(symbol = %conversion, "Cannot size order, conversion price unavailable: {}", e);
                return None;
            }
        };

        let capital = available_capital(
            account.total_collateral_value_in_usdt,
            account.total_liability_of_btc,
            conversion_price,
        );
        debug!(capital, conversion_price, "Available capital");
        Some(capital)
    }

    /// Pure part of sizing once capital and filters are known
    pub fn build_intent(
        &self,
        signal: &TradeSignal,
        capital: f64,
        filters: &SymbolFilters,
    ) -> Option<OrderIntent> {
        let price = sizing_price(
            signal.reference_price,
            self.trading.is_micro_priced(&signal.symbol),
        );
        let raw_quantity = capital * self.risk.risk_fraction / price;

        let stop = stop_price(
            signal.side,
            signal.reference_price,
            signal.atr,
            self.risk.stop_atr_multiple,
        );
        let target = target_price(
            signal.side,
            signal.interval,
            signal.reference_price,
            signal.atr,
            &self.risk,
        );

        let quantity = align_to_step(raw_quantity, filters.step_size, filters.min_qty)?;
        let stop_price = align_to_step(stop, filters.tick_size, filters.min_price)?;
        let target_price = match target {
            Some(t) => Some(align_to_step(t, filters.tick_size, filters.min_price)?),
            None => None,
        };

        Some(OrderIntent {
            symbol: signal.symbol.clone(),
            side: signal.side,
            interval: signal.interval,
            reason: signal.reason,
            reference_price: signal.reference_price,
            quantity,
            stop_price,
            target_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExchangeError;
    use crate::risk::{MarginAccount, OpenOrder};
    use crate::types::SignalReason;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    fn filters() -> SymbolFilters {
        SymbolFilters {
            min_price: dec!(0.01),
            tick_size: dec!(0.01),
            min_qty: dec!(0.001),
            step_size: dec!(0.001),
        }
    }

    fn signal(side: Side, interval: Interval) -> TradeSignal {
        TradeSignal {
            symbol: Symbol::new("ETHUSDT"),
            side,
            reason: SignalReason::BullFlag,
            reference_price: 100.0,
            atr: 2.0,
            interval,
        }
    }

    struct NoAccount;

    #[async_trait]
    impl AccountClient for NoAccount {
        async fn margin_account(&self) -> Result<MarginAccount, ExchangeError> {
            Err(ExchangeError::CircuitOpen)
        }
        async fn symbol_filters(&self, symbol: &Symbol) -> Result<SymbolFilters, ExchangeError> {
            Err(ExchangeError::MissingFilter {
                symbol: symbol.to_string(),
                filter: "LOT_SIZE".to_string(),
            })
        }
        async fn open_margin_orders(&self, _: &Symbol) -> Result<Vec<OpenOrder>, ExchangeError> {
            Ok(Vec::new())
        }
        async fn current_price(&self, _: &Symbol) -> Result<f64, ExchangeError> {
            Err(ExchangeError::CircuitOpen)
        }
    }

    fn sizer() -> OrderSizer {
        OrderSizer::new(
            Arc::new(NoAccount),
            RiskConfig::default(),
            TradingConfig::default(),
        )
    }

    #[test]
    fn test_buy_stop_and_target() {
        let sizer = sizer();

        let hourly = sizer
            .build_intent(&signal(Side::Buy, Interval::Hour1), 4_000.0, &filters())
            .unwrap();
        assert_eq!(hourly.stop_price, dec!(96.4));
        assert_eq!(hourly.target_price, None);
        // 4000 * 0.05 / 100
        assert_eq!(hourly.quantity, dec!(2));

        let five = sizer
            .build_intent(&signal(Side::Buy, Interval::Min5), 4_000.0, &filters())
            .unwrap();
        assert_eq!(five.target_price, Some(dec!(104)));
    }

    #[test]
    fn test_sell_stop_and_target() {
        let intent = sizer()
            .build_intent(&signal(Side::Sell, Interval::Min5), 4_000.0, &filters())
            .unwrap();
        assert_eq!(intent.stop_price, dec!(103.6));
        assert_eq!(intent.target_price, Some(dec!(97)));
    }

    #[test]
    fn test_align_floors_then_clamps() {
        assert_eq!(align_to_step(1.23456, dec!(0.01), dec!(0.01)), Some(dec!(1.23)));
        assert_eq!(align_to_step(0.0004, dec!(0.001), dec!(0.001)), Some(dec!(0.001)));
        assert_eq!(align_to_step(-3.0, dec!(0.01), dec!(0.01)), Some(dec!(0.01)));
        assert_eq!(align_to_step(7.5, Decimal::ZERO, dec!(1)), Some(dec!(7.5)));
        assert_eq!(align_to_step(f64::NAN, dec!(0.01), dec!(0.01)), None);
    }

    #[test]
    fn test_micro_priced_sizing() {
        assert_eq!(sizing_price(0.0000123456789, true), 0.00001235);
        assert_eq!(sizing_price(0.0000000001, true), 1e-8);
        assert_eq!(sizing_price(0.0000000001, false), 0.0000000001);

        let sizer = sizer();
        let mut shib = signal(Side::Buy, Interval::Hour1);
        shib.symbol = Symbol::new("SHIBUSDT");
        shib.reference_price = 0.00001;
        shib.atr = 0.0000001;
        let micro_filters = SymbolFilters {
            min_price: dec!(0.00000001),
            tick_size: dec!(0.00000001),
            min_qty: dec!(1),
            step_size: dec!(1),
        };

        let intent = sizer.build_intent(&shib, 1_000.0, &micro_filters).unwrap();
        // 1000 * 0.05 / 0.00001
        assert_eq!(intent.quantity, dec!(5000000));
        assert_eq!(intent.stop_price, dec!(0.00000982));
    }

    #[test]
    fn test_available_capital() {
        assert_eq!(available_capital(10_000.0, 0.1, 60_000.0), 4_000.0);
    }

    #[tokio::test]
    async fn test_missing_filters_yield_no_intent() {
        let intent = sizer().size(&signal(Side::Buy, Interval::Min5)).await;
        assert!(intent.is_none());
    }
}
