use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// The polling fallback's timer. Exists only while polling is active, so
/// stopping it (or dropping the owner) cannot leave a timer behind.
#[derive(Debug)]
pub struct PollTimer {
    period: Duration,
    interval: Option<Interval>,
}

impl PollTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Start ticking one period from now. No-op if already running.
    pub fn start(&mut self) {
        if self.interval.is_none() {
            let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.interval = Some(interval);
        }
    }

    pub fn stop(&mut self) {
        self.interval = None;
    }

    /// Start or stop to match `wanted`. Returns whether anything changed.
    pub fn set_running(&mut self, wanted: bool) -> bool {
        match (wanted, self.is_running()) {
            (true, false) => {
                self.start();
                true
            }
            (false, true) => {
                self.stop();
                true
            }
            _ => false,
        }
    }

    /// Resolves on the next tick; never resolves while stopped.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
