//! Periodic triggers for the pipeline
//!
//! Each configured interval class gets its own ticker and a semaphore sized
//! `max_concurrent_runs`. A firing that finds no free permit is skipped, so
//! a slow run can overlap the next one but runs never pile up.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::ScheduleConfig;
use crate::pipeline::PipelineOrchestrator;
use crate::types::{Interval, Symbol};

/// How long in-flight runs may take to finish after shutdown is requested
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// One interval class with its overlap bound
#[derive(Debug, Clone)]
pub struct IntervalTrigger {
    schedule: ScheduleConfig,
    permits: Arc<Semaphore>,
}

impl IntervalTrigger {
    pub fn new(schedule: ScheduleConfig) -> Self {
        let permits = Arc::new(Semaphore::new(schedule.max_concurrent_runs.max(1)));
        Self { schedule, permits }
    }

    pub fn interval(&self) -> Interval {
        self.schedule.interval
    }

    fn max_runs(&self) -> usize {
        self.schedule.max_concurrent_runs.max(1)
    }

    /// Runs currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.max_runs() - self.permits.available_permits()
    }

    /// Take a run permit, or log and skip when the overlap bound is reached
    pub fn try_fire(&self) -> Option<OwnedSemaphorePermit> {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                warn!(
                    interval = %self.schedule.interval,
                    in_flight = self.in_flight(),
                    "Previous runs still in flight, skipping this firing"
                );
                None
            }
        }
    }

    /// Resolves once every in-flight run has released its permit
    pub async fn drained(&self) {
        // acquire_many only errors on a closed semaphore, which is never closed here
        let _ = self.permits.acquire_many(self.max_runs() as u32).await;
    }

    fn ticker(&self) -> tokio::time::Interval {
        let start = Instant::now() + Duration::from_secs(self.schedule.initial_delay_secs);
        let period = Duration::from_secs(self.schedule.every_secs.max(1));
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }
}

pub struct Scheduler {
    pipeline: Arc<PipelineOrchestrator>,
    triggers: Vec<IntervalTrigger>,
    symbols: Arc<Vec<Symbol>>,
    grace: Duration,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<PipelineOrchestrator>,
        schedules: &[ScheduleConfig],
        symbols: Vec<Symbol>,
    ) -> Self {
        Self {
            pipeline,
            triggers: schedules.iter().cloned().map(IntervalTrigger::new).collect(),
            symbols: Arc::new(symbols),
            grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn triggers(&self) -> &[IntervalTrigger] {
        &self.triggers
    }

    /// Fire triggers until `shutdown` resolves, then wait out in-flight runs
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut loops = Vec::with_capacity(self.triggers.len());
        for trigger in &self.triggers {
            info!(
                interval = %trigger.interval(),
                every_secs = trigger.schedule.every_secs,
                initial_delay_secs = trigger.schedule.initial_delay_secs,
                max_concurrent_runs = trigger.max_runs(),
                "Trigger scheduled"
            );
            loops.push(tokio::spawn(trigger_loop(
                trigger.clone(),
                Arc::clone(&self.pipeline),
                Arc::clone(&self.symbols),
                stop_rx.clone(),
            )));
        }

        shutdown.await;
        info!("Shutdown requested, no new runs will start");
        let _ = stop_tx.send(true);
        for handle in loops {
            let _ = handle.await;
        }

        for trigger in &self.triggers {
            if trigger.in_flight() == 0 {
                continue;
            }
            info!(interval = %trigger.interval(), in_flight = trigger.in_flight(), "Waiting for in-flight runs");
            if timeout(self.grace, trigger.drained()).await.is_err() {
                warn!(
                    interval = %trigger.interval(),
                    grace_secs = self.grace.as_secs(),
                    "In-flight runs did not finish in time, abandoning them"
                );
            }
        }
        info!("Scheduler stopped");
    }
}

async fn trigger_loop(
    trigger: IntervalTrigger,
    pipeline: Arc<PipelineOrchestrator>,
    symbols: Arc<Vec<Symbol>>,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = trigger.ticker();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(permit) = trigger.try_fire() else {
                    continue;
                };
                let pipeline = Arc::clone(&pipeline);
                let symbols = Arc::clone(&symbols);
                let interval = trigger.interval();
                tokio::spawn(async move {
                    pipeline.run_interval(interval, &symbols).await;
                    drop(permit);
                });
            }
            _ = stop.changed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(max_concurrent_runs: usize) -> ScheduleConfig {
        ScheduleConfig {
            interval: Interval::Min5,
            every_secs: 300,
            initial_delay_secs: 0,
            max_concurrent_runs,
        }
    }

    #[test]
    fn test_third_overlapping_firing_is_skipped() {
        let trigger = IntervalTrigger::new(schedule(2));

        let first = trigger.try_fire();
        let second = trigger.try_fire();
        assert!(first.is_some());
        assert!(second.is_some());
        assert_eq!(trigger.in_flight(), 2);

        assert!(trigger.try_fire().is_none());

        drop(first);
        assert_eq!(trigger.in_flight(), 1);
        assert!(trigger.try_fire().is_some());
    }

    #[test]
    fn test_zero_bound_still_allows_one_run() {
        let trigger = IntervalTrigger::new(schedule(0));
        let permit = trigger.try_fire();
        assert!(permit.is_some());
        assert!(trigger.try_fire().is_none());
    }

    #[tokio::test]
    async fn test_drained_waits_for_release() {
        let trigger = IntervalTrigger::new(schedule(2));
        let permit = trigger.try_fire().unwrap();

        assert!(timeout(Duration::from_millis(20), trigger.drained())
            .await
            .is_err());

        drop(permit);
        assert!(timeout(Duration::from_millis(20), trigger.drained())
            .await
            .is_ok());
    }
}
