//! Cancellable recurring tasks
//!
//! Timers run as tokio tasks that stop as soon as their
//! [`CancellationToken`] is cancelled. The caller owns the token and must
//! cancel it on every exit path.

use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Shortest period a repeating task runs at
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Run `action` every `period`, starting one period from now, until the
/// returned token is cancelled. Periods below [`MIN_PERIOD`] are raised to it.
pub fn schedule_repeating<F>(period: Duration, mut action: F) -> CancellationToken
where
    F: FnMut() + Send + 'static,
{
    let period = period.max(MIN_PERIOD);
    let token = CancellationToken::new();
    let child = token.clone();

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = child.cancelled() => break,
                _ = ticker.tick() => {
                    if child.is_cancelled() {
                        break;
                    }
                    action();
                }
            }
        }
        log::trace!("Repeating task stopped");
    });

    token
}

/// Cancels its token when dropped
#[derive(Debug, Default)]
pub struct ScheduledTask {
    token: Option<CancellationToken>,
}

impl ScheduledTask {
    pub fn new(token: CancellationToken) -> Self {
        ScheduledTask { token: Some(token) }
    }

    /// Cancel the task; calling it again is a no-op
    pub fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.token.as_ref().is_some_and(|t| !t.is_cancelled())
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
