//! Signal evaluation
//!
//! Three independent triggers run in a fixed order for each symbol/interval:
//! flag breakout, divergence reversal, and RSI extreme. Every trigger that
//! fires yields its own signal; nothing is deduplicated.

use tracing::debug;

use crate::config::SignalConfig;
use crate::types::{FeatureRow, Flag, Interval, Side, SignalReason, Symbol, TradeSignal, TrendState};

/// Evaluates the trigger rules against a feature sequence
#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    config: SignalConfig,
}

impl SignalEvaluator {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    /// Run all triggers
    ///
    /// `skip_rsi_extreme` disables the RSI-extreme trigger for base-reference
    /// symbols. Returns signals in trigger order.
    pub fn evaluate(
        &self,
        symbol: &Symbol,
        interval: Interval,
        rows: &[FeatureRow],
        state: &TrendState,
        skip_rsi_extreme: bool,
    ) -> Vec<TradeSignal> {
        let Some(last) = rows.last() else {
            return Vec::new();
        };

        let signal = |side: Side, reason: SignalReason| TradeSignal {
            symbol: symbol.clone(),
            side,
            reason,
            reference_price: last.close,
            atr: last.atr,
            interval,
        };

        let mut signals = Vec::new();

        // Flag breakout
        match state.flag {
            Flag::BullFlag => signals.push(signal(Side::Buy, SignalReason::BullFlag)),
            Flag::BearFlag => signals.push(signal(Side::Sell, SignalReason::BearFlag)),
            Flag::None => {}
        }

        // Divergence reversal
        if let Some((side, reason)) = self.divergence_trigger(interval, rows) {
            signals.push(signal(side, reason));
        }

        // RSI extreme
        if skip_rsi_extreme {
            debug!(symbol = %symbol, "RSI extreme trigger skipped for base-reference symbol");
        } else if last.rsi > self.config.rsi_extreme_high {
            signals.push(signal(Side::Sell, SignalReason::RsiExtreme(last.rsi)));
        } else if last.rsi < self.config.rsi_extreme_low {
            signals.push(signal(Side::Buy, SignalReason::RsiExtreme(last.rsi)));
        }

        signals
    }

    /// RSI bands (oversold, overbought) used by the divergence trigger
    pub fn divergence_bands(&self, interval: Interval) -> (f64, f64) {
        if interval == Interval::Min15 {
            self.config.divergence_bands_15m
        } else {
            self.config.divergence_bands
        }
    }

    fn divergence_trigger(
        &self,
        interval: Interval,
        rows: &[FeatureRow],
    ) -> Option<(Side, SignalReason)> {
        let [.., previous, last] = rows else {
            return None;
        };

        if !previous.bullish_divergence && !previous.bearish_divergence {
            return None;
        }

        let (low, high) = self.divergence_bands(interval);
        if last.rsi > high {
            Some((Side::Sell, SignalReason::BearishDivergence))
        } else if last.rsi < low {
            Some((Side::Buy, SignalReason::BullishDivergence))
        } else {
            None
        }
    }
}

impl Default for SignalEvaluator {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candle, Trend};
    use chrono::Utc;

    fn rows_with_rsi(previous_rsi: f64, last_rsi: f64) -> Vec<FeatureRow> {
        let candle = Candle::new(Utc::now(), 100.0, 101.0, 99.0, 100.0, 5.0).unwrap();
        let mut previous = FeatureRow::from_candle(&candle);
        previous.rsi = previous_rsi;
        let mut last = FeatureRow::from_candle(&candle);
        last.rsi = last_rsi;
        last.atr = 2.0;
        vec![previous, last]
    }

    fn quiet_state() -> TrendState {
        TrendState {
            trend: Trend::Equilibrium,
            ..TrendState::unknown()
        }
    }

    #[test]
    fn test_rsi_extreme() {
        let evaluator = SignalEvaluator::default();
        let eth = Symbol::new("ETHUSDT");

        let sell = evaluator.evaluate(&eth, Interval::Hour1, &rows_with_rsi(50.0, 90.0), &quiet_state(), false);
        assert_eq!(sell.len(), 1);
        assert_eq!(sell[0].side, Side::Sell);
        assert_eq!(sell[0].reason, SignalReason::RsiExtreme(90.0));
        assert_eq!(sell[0].atr, 2.0);

        let buy = evaluator.evaluate(&eth, Interval::Hour1, &rows_with_rsi(50.0, 10.0), &quiet_state(), false);
        assert_eq!(buy[0].side, Side::Buy);

        let none = evaluator.evaluate(&eth, Interval::Hour1, &rows_with_rsi(50.0, 50.0), &quiet_state(), false);
        assert!(none.is_empty());
    }

    #[test]
    fn test_rsi_extreme_skipped_for_base_reference() {
        let evaluator = SignalEvaluator::default();
        let signals = evaluator.evaluate(
            &Symbol::new("BTCUSDT"),
            Interval::Hour1,
            &rows_with_rsi(50.0, 95.0),
            &quiet_state(),
            true,
        );
        assert!(signals.is_empty());
    }

    #[test]
    fn test_divergence_uses_interval_bands() {
        let evaluator = SignalEvaluator::default();
        let eth = Symbol::new("ETHUSDT");

        let mut rows = rows_with_rsi(50.0, 80.0);
        rows[0].bearish_divergence = true;
        let signals = evaluator.evaluate(&eth, Interval::Min15, &rows, &quiet_state(), false);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, Side::Sell);
        assert_eq!(signals[0].reason, SignalReason::BearishDivergence);

        rows[1].rsi = 50.0;
        assert!(evaluator
            .evaluate(&eth, Interval::Min15, &rows, &quiet_state(), false)
            .is_empty());

        // 27 is oversold on 1h (30) but not on 15m (25)
        rows[1].rsi = 27.0;
        assert!(evaluator
            .evaluate(&eth, Interval::Min15, &rows, &quiet_state(), false)
            .is_empty());
        let signals = evaluator.evaluate(&eth, Interval::Hour1, &rows, &quiet_state(), false);
        assert_eq!(signals[0].reason, SignalReason::BullishDivergence);
        assert_eq!(signals[0].side, Side::Buy);
    }

    #[test]
    fn test_triggers_are_not_deduplicated() {
        let evaluator = SignalEvaluator::default();
        let mut rows = rows_with_rsi(50.0, 90.0);
        rows[0].bullish_divergence = true;
        let state = TrendState {
            flag: Flag::BearFlag,
            ..quiet_state()
        };

        let signals = evaluator.evaluate(&Symbol::new("SOLUSDT"), Interval::Min5, &rows, &state, false);
        let reasons: Vec<_> = signals.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                SignalReason::BearFlag,
                SignalReason::BearishDivergence,
                SignalReason::RsiExtreme(90.0)
            ]
        );
        assert!(signals.iter().all(|s| s.side == Side::Sell));
    }

    #[test]
    fn test_empty_history() {
        let signals = SignalEvaluator::default().evaluate(
            &Symbol::new("ETHUSDT"),
            Interval::Min5,
            &[],
            &quiet_state(),
            false,
        );
        assert!(signals.is_empty());
    }
}
