// Refresh scheduler
//
// One timer per binding. Dispatches immediately on start, then once per period
// until stopped or until the callback asks to halt.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Repeats a dispatch callback on a fixed period, with at most one timer alive.
pub struct RefreshScheduler {
    period: Option<Duration>,
    ticker: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Dispatch once right away, then every `period` until stopped.
    ///
    /// With `period == None` only the initial dispatch happens. The callback
    /// must not block: it is expected to spawn the actual work. Returning
    /// `false` disarms the timer.
    pub fn start<F>(period: Option<Duration>, mut dispatch: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        if !dispatch() {
            return Self {
                period,
                ticker: None,
            };
        }

        let ticker = period.map(|period| {
            debug!(target: "scheduler", period_ms = period.as_millis() as u64, "Arming refresh timer");
            tokio::spawn(async move {
                let mut ticks = interval_at(Instant::now() + period, period);
                ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticks.tick().await;
                    if !dispatch() {
                        debug!(target: "scheduler", "Refresh timer halted by dispatch");
                        break;
                    }
                }
            })
        });

        Self { period, ticker }
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Whether a timer is still armed.
    pub fn is_armed(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the timer. Idempotent.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            debug!(target: "scheduler", "Refresh timer cancelled");
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
