use std::time::Duration;

use log::{info, warn};
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::collector::runner::CycleRunner;
use crate::logging::Logger;
use crate::metrics::{METRICS, RuntimeMetrics};

/// Ticker that fires once right away and then every `period`.
///
/// If a cycle overruns the period, the missed ticks collapse into one
/// tick that fires as soon as the cycle ends; after that the ticker
/// returns to its original grid.
pub struct ImmediateTicker {
    inner: Interval,
}

impl ImmediateTicker {
    /// PANIC:
    /// - Panics if `period` is zero (rejected by config validation).
    pub fn new(period: Duration) -> Self {
        // tokio's first tick completes immediately
        let mut inner = tokio::time::interval(period);
        inner.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { inner }
    }

    pub async fn tick(&mut self) -> Instant {
        self.inner.tick().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Drives the cycle runner on a fixed interval until cancelled.
///
/// Cycles run inline in the scheduler loop, so two cycles never overlap.
pub struct Scheduler {
    runner: CycleRunner,
    interval: Duration,
    state: watch::Sender<SchedulerState>,
    log: Logger,
}

impl Scheduler {
    pub fn new(runner: CycleRunner, interval: Duration, log: Logger) -> Self {
        Self {
            runner,
            interval,
            state: watch::Sender::new(SchedulerState::Idle),
            log,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    #[cfg(test)]
    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Runs until `cancel` fires. Never returns on its own.
    pub async fn run(&self, cancel: CancellationToken) {
        self.state.send_replace(SchedulerState::Running);
        info!(
            target: self.log.target(),
            "collecting every {}s", self.interval.as_secs()
        );

        let mut ticker = ImmediateTicker::new(self.interval);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    warn!(target: self.log.target(), "stopping by the context: cancelled");
                    break;
                }

                _ = ticker.tick() => {
                    RuntimeMetrics::incr(&METRICS.cycles);
                    let summary = self.runner.run_once(&cancel).await;
                    info!(
                        target: self.log.target(),
                        "cycle done: collected={} written={} failed={}",
                        summary.collected, summary.written, summary.failed
                    );
                }
            }
        }

        self.state.send_replace(SchedulerState::Stopped);
    }
}
