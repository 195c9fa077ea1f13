//! Order submission seam
//!
//! The pipeline hands every audited [`OrderIntent`] to an [`Executor`]. The
//! simulator logs the orders that would be placed; the live executor is a
//! placeholder that never transmits anything.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ExecutionMode;
use crate::types::{OrderIntent, Side};

/// Exit orders protecting an opened position
#[derive(Debug, Clone, PartialEq)]
pub enum Protection {
    /// Target limit and stop paired, one cancels the other
    Oco {
        side: Side,
        target: Decimal,
        stop: Decimal,
    },
    /// Stop-loss-limit only, when no target was computed
    StopLossLimit { side: Side, stop: Decimal },
}

/// Orders that would be placed for one intent
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlan {
    pub entry_side: Side,
    pub quantity: Decimal,
    pub protection: Protection,
}

impl OrderPlan {
    pub fn for_intent(intent: &OrderIntent) -> Self {
        let exit_side = intent.side.opposite();
        let protection = match intent.target_price {
            Some(target) => Protection::Oco {
                side: exit_side,
                target,
                stop: intent.stop_price,
            },
            None => Protection::StopLossLimit {
                side: exit_side,
                stop: intent.stop_price,
            },
        };

        Self {
            entry_side: intent.side,
            quantity: intent.quantity,
            protection,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionReport {
    Simulated(OrderPlan),
    NotSubmitted,
}

#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, intent: &OrderIntent) -> ExecutionReport;
}

/// Logs the plan without touching the exchange
pub struct SimulatedExecutor;

#[async_trait]
impl Executor for SimulatedExecutor {
    async fn execute(&self, intent: &OrderIntent) -> ExecutionReport {
        let plan = OrderPlan::for_intent(intent);

        match &plan.protection {
            Protection::Oco { side, target, stop } => info!(
                symbol = %intent.symbol,
                "[SIMULATED] {} {} at market, then OCO {} target {} / stop {}",
                plan.entry_side,
                plan.quantity,
                side,
                target,
                stop
            ),
            Protection::StopLossLimit { side, stop } => info!(
                symbol = %intent.symbol,
                "[SIMULATED] {} {} at market, then {} stop-loss-limit at {}",
                plan.entry_side,
                plan.quantity,
                side,
                stop
            ),
        }

        ExecutionReport::Simulated(plan)
    }
}

/// Placeholder for exchange submission; refuses to transmit
pub struct LiveExecutor;

#[async_trait]
impl Executor for LiveExecutor {
    async fn execute(&self, intent: &OrderIntent) -> ExecutionReport {
        warn!(
            symbol = %intent.symbol,
            side = %intent.side,
            "Live order submission is disabled, intent not transmitted"
        );
        ExecutionReport::NotSubmitted
    }
}

pub fn executor_for(mode: ExecutionMode) -> Arc<dyn Executor> {
    match mode {
        ExecutionMode::Simulate => Arc::new(SimulatedExecutor),
        ExecutionMode::Live => Arc::new(LiveExecutor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Interval, SignalReason, Symbol};
    use rust_decimal_macros::dec;

    fn intent(target: Option<Decimal>) -> OrderIntent {
        OrderIntent {
            symbol: Symbol::new("ETHUSDT"),
            side: Side::Buy,
            interval: Interval::Min5,
            reason: SignalReason::BullFlag,
            reference_price: 100.0,
            quantity: dec!(2),
            stop_price: dec!(96.4),
            target_price: target,
        }
    }

    #[tokio::test]
    async fn test_simulated_plan_uses_oco_with_target() {
        let report = SimulatedExecutor.execute(&intent(Some(dec!(104)))).await;
        let ExecutionReport::Simulated(plan) = report else {
            panic!("expected simulated report");
        };
        assert_eq!(plan.entry_side, Side::Buy);
        assert_eq!(
            plan.protection,
            Protection::Oco {
                side: Side::Sell,
                target: dec!(104),
                stop: dec!(96.4)
            }
        );
    }

    #[tokio::test]
    async fn test_stop_only_without_target() {
        let plan = OrderPlan::for_intent(&intent(None));
        assert_eq!(
            plan.protection,
            Protection::StopLossLimit {
                side: Side::Sell,
                stop: dec!(96.4)
            }
        );
    }

    #[tokio::test]
    async fn test_live_never_transmits() {
        let executor = executor_for(ExecutionMode::Live);
        assert_eq!(
            executor.execute(&intent(None)).await,
            ExecutionReport::NotSubmitted
        );
    }
}
