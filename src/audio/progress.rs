use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// One tick of elapsed playback time, never running past the track's end.
pub fn advance(current_second: u32, duration: u32) -> u32 {
    current_second.saturating_add(1).min(duration)
}

/// Periodic timer that drives elapsed-time updates for one playback session.
pub struct ProgressTracker {
    tick: Duration,
}

impl ProgressTracker {
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }

    /// Calls `on_tick` once per tick until `cancel` fires. The first call happens one full
    /// tick after spawning.
    ///
    /// Cancellation is only observed between ticks, so `on_tick` must re-check the token
    /// under whatever lock guards the state it writes.
    pub fn spawn<F, Fut>(&self, cancel: CancellationToken, mut on_tick: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let tick = self.tick;
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + tick, tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                if cancel.is_cancelled() {
                    return;
                }
                on_tick().await;
            }
        })
    }
}
