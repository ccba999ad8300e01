use std::{future::Future, ops::ControlFlow, time::Duration};

use tokio::time::{MissedTickBehavior, interval};

/// Fixed-interval driver for periodic fetches.
///
/// Each poll is awaited before the next tick is taken, and ticks missed
/// while a poll was still running are skipped, so polls never overlap and
/// never burst to catch up.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    period: Duration,
}

impl Poller {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Runs `poll` on every tick and hands its output to `on_result` until
    /// that returns `ControlFlow::Break`. Returns the number of polls made.
    pub async fn run<P, Fut, T, C>(&self, mut poll: P, mut on_result: C) -> usize
    where
        P: FnMut() -> Fut,
        Fut: Future<Output = T>,
        C: FnMut(T) -> ControlFlow<()>,
    {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut polls = 0;
        loop {
            ticker.tick().await;
            let result = poll().await;
            polls += 1;
            if on_result(result).is_break() {
                return polls;
            }
        }
    }
}
