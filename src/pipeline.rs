//! Pipeline orchestration
//!
//! One pass for an interval class: for every symbol fetch candles, rebuild
//! and persist the feature sequence, classify trend/flag, evaluate signals,
//! and push each signal through the risk gate, sizer, audit log and
//! executor. Symbols are processed one after another, each in its own task
//! so that an error or panic stays with that symbol.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::binance::{BinanceClient, MarginAccountClient};
use crate::config::{Config, FeatureConfig, TradingConfig};
use crate::data::{normalize_klines, CandleSource};
use crate::execution::{executor_for, ExecutionReport, Executor};
use crate::features::compute_features;
use crate::risk::{AccountClient, RiskGate};
use crate::signals::SignalEvaluator;
use crate::sizing::OrderSizer;
use crate::storage::{CsvFeatureStore, CsvTradeLog, FeatureStore, TradeLog};
use crate::trend::classify;
use crate::types::{
    FeatureRow, Interval, OrderIntent, Symbol, TradeLogEntry, TradeSignal, Trend, TrendState,
};

/// Per-symbol async locks shared by every run of every trigger
#[derive(Debug, Default)]
pub struct SymbolLocks {
    locks: Mutex<HashMap<Symbol, Arc<tokio::sync::Mutex<()>>>>,
}

impl SymbolLocks {
    pub fn lock_for(&self, symbol: &Symbol) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(symbol.clone()).or_default())
    }
}

/// What happened to one symbol in one run
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    /// No usable candles
    Skipped,
    Processed {
        state: TrendState,
        signals: Vec<TradeSignal>,
        intents: Vec<OrderIntent>,
    },
}

/// Totals for one interval run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub signals: usize,
    pub intents: Vec<OrderIntent>,
}

pub struct PipelineOrchestrator {
    source: Arc<dyn CandleSource>,
    store: Arc<dyn FeatureStore>,
    trade_log: Arc<dyn TradeLog>,
    executor: Arc<dyn Executor>,
    evaluator: SignalEvaluator,
    gate: RiskGate,
    sizer: OrderSizer,
    features: FeatureConfig,
    trading: TradingConfig,
    symbol_locks: SymbolLocks,
}

impl PipelineOrchestrator {
    pub fn new(
        config: &Config,
        source: Arc<dyn CandleSource>,
        account: Arc<dyn AccountClient>,
        store: Arc<dyn FeatureStore>,
        trade_log: Arc<dyn TradeLog>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            source,
            store,
            trade_log,
            executor,
            evaluator: SignalEvaluator::new(config.signals.clone()),
            gate: RiskGate::new(Arc::clone(&account), config.risk.clone()),
            sizer: OrderSizer::new(account, config.risk.clone(), config.trading.clone()),
            features: config.features.clone(),
            trading: config.trading.clone(),
            symbol_locks: SymbolLocks::default(),
        }
    }

    /// Wire the Binance clients, CSV stores and configured executor
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = BinanceClient::new(&config.exchange).context("Failed to build market data client")?;
        let account =
            MarginAccountClient::new(&config.exchange).context("Failed to build margin account client")?;

        Ok(Self::new(
            config,
            Arc::new(source),
            Arc::new(account),
            Arc::new(CsvFeatureStore::new(&config.storage.data_dir)),
            Arc::new(CsvTradeLog::new(&config.storage.trade_log_dir)),
            executor_for(config.trading.execution),
        ))
    }

    /// Run one pass of `interval` over `symbols`
    pub async fn run_interval(self: &Arc<Self>, interval: Interval, symbols: &[Symbol]) -> RunSummary {
        info!(interval = %interval, symbols = symbols.len(), "Starting pipeline run");
        let mut summary = RunSummary::default();

        for symbol in symbols {
            let this = Arc::clone(self);
            let task_symbol = symbol.clone();
            let handle =
                tokio::spawn(async move { this.process_symbol(&task_symbol, interval).await });

            match handle.await {
                Ok(Ok(SymbolOutcome::Skipped)) => summary.skipped += 1,
                Ok(Ok(SymbolOutcome::Processed {
                    signals, intents, ..
                })) => {
                    summary.processed += 1;
                    summary.signals += signals.len();
                    summary.intents.extend(intents);
                }
                Ok(Err(e)) => {
                    summary.failed += 1;
                    error!(symbol = %symbol, interval = %interval, "Symbol failed: {:#}", e);
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(symbol = %symbol, interval = %interval, "Symbol task aborted: {}", e);
                }
            }
        }

        info!(
            interval = %interval,
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            signals = summary.signals,
            intents = summary.intents.len(),
            "Pipeline run finished"
        );
        summary
    }

    /// Fetch, featurize, persist and act on one symbol
    pub async fn process_symbol(&self, symbol: &Symbol, interval: Interval) -> Result<SymbolOutcome> {
        let klines = self
            .source
            .fetch_klines(symbol, interval, self.trading.candle_limit)
            .await
            .with_context(|| format!("Failed to fetch {} {} klines", symbol, interval))?;

        let candles = normalize_klines(symbol, &klines);
        if candles.is_empty() {
            info!(symbol = %symbol, interval = %interval, "No candle data, skipping symbol");
            return Ok(SymbolOutcome::Skipped);
        }

        self.store
            .save_candles(symbol, interval, &candles)
            .context("Failed to persist candles")?;

        let rows = compute_features(&candles, &self.features);
        self.store
            .save(symbol, interval, &rows)
            .context("Failed to persist features")?;
        debug!(symbol = %symbol, interval = %interval, rows = rows.len(), "Features updated");

        let (state, signals) = self.evaluate(symbol, interval, &rows);

        let mut intents = Vec::new();
        for signal in &signals {
            if let Some(intent) = self.act_on(signal).await? {
                intents.push(intent);
            }
        }

        Ok(SymbolOutcome::Processed {
            state,
            signals,
            intents,
        })
    }

    /// Trend/flag classification and signal evaluation, no account access
    pub fn evaluate(
        &self,
        symbol: &Symbol,
        interval: Interval,
        rows: &[FeatureRow],
    ) -> (TrendState, Vec<TradeSignal>) {
        let state = classify(rows);
        if state.trend == Trend::Unknown {
            info!(symbol = %symbol, interval = %interval, "Trend unknown, no tagged swing high/low yet");
        } else {
            info!(
                symbol = %symbol,
                interval = %interval,
                trend = %state.trend,
                flag = %state.flag,
                "Market state"
            );
        }

        let skip_rsi_extreme = self.trading.is_base_reference(symbol);
        let signals = self
            .evaluator
            .evaluate(symbol, interval, rows, &state, skip_rsi_extreme);

        for signal in &signals {
            info!(
                symbol = %symbol,
                interval = %interval,
                side = %signal.side,
                reason = %signal.reason,
                price = signal.reference_price,
                "Signal"
            );
        }
        if signals.is_empty() {
            debug!(symbol = %symbol, interval = %interval, "No signals");
        }

        (state, signals)
    }

    /// Gate, size, audit and hand one signal to the executor
    ///
    /// Holds the symbol's lock throughout so overlapping runs never size
    /// the same symbol against the same account snapshot.
    async fn act_on(&self, signal: &TradeSignal) -> Result<Option<OrderIntent>> {
        let lock = self.symbol_locks.lock_for(&signal.symbol);
        let _guard = lock.lock().await;

        if !self.gate.check(&signal.symbol, signal.side).await.is_allowed() {
            return Ok(None);
        }

        let Some(intent) = self.sizer.size(signal).await else {
            warn!(
                symbol = %signal.symbol,
                side = %signal.side,
                reason = %signal.reason,
                "Signal dropped, no order intent could be sized"
            );
            return Ok(None);
        };

        self.trade_log
            .append(&TradeLogEntry::from_intent(&intent, Utc::now()))
            .context("Failed to append trade log entry")?;

        if let ExecutionReport::NotSubmitted = self.executor.execute(&intent).await {
            debug!(symbol = %intent.symbol, "Intent recorded but not submitted");
        }

        Ok(Some(intent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_symbol_locks_are_shared_per_symbol() {
        let locks = SymbolLocks::default();
        let eth = Symbol::new("ETHUSDT");

        let first = locks.lock_for(&eth);
        let second = locks.lock_for(&eth);
        let other = locks.lock_for(&Symbol::new("SOLUSDT"));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));

        let _guard = first.lock().await;
        assert!(second.try_lock().is_err());
        assert!(other.try_lock().is_ok());
    }
}
