//! Reference-counted periodic refresh timers.
//!
//! One tokio task per key, shared by every subscriber of that key. The
//! timer only repeats: it first fires one full interval after it is
//! started, so the initial fetch is the subscriber's job.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::SyncError;

/// Callback invoked on every tick.
pub type PollCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<(), SyncError>> + Send + Sync>;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

struct Timer {
    id: u64,
    subscribers: usize,
    interval: Duration,
    stop: oneshot::Sender<()>,
}

#[derive(Default)]
struct Timers {
    next_id: u64,
    by_key: HashMap<String, Timer>,
}

fn lock(timers: &Mutex<Timers>) -> MutexGuard<'_, Timers> {
    timers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps at most one timer per key alive across any number of subscribers.
#[derive(Clone, Default)]
pub struct PollingManager {
    timers: Arc<Mutex<Timers>>,
}

impl fmt::Debug for PollingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingManager")
            .field("active_timers", &self.active_timers())
            .finish()
    }
}

impl PollingManager {
    /// Creates a manager with no timers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to periodic `callback` invocations for `key`.
    ///
    /// The first subscriber starts the timer with `interval`; later ones
    /// only bump the reference count and share the existing timer. Must be
    /// called from within a tokio runtime.
    pub fn subscribe(
        &self,
        key: impl Into<String>,
        callback: PollCallback,
        interval: Duration,
    ) -> PollSubscription {
        let key = key.into();
        let mut timers = lock(&self.timers);

        if let Some(timer) = timers.by_key.get_mut(&key) {
            timer.subscribers = timer.subscribers.saturating_add(1);
            if timer.interval != interval {
                tracing::debug!(%key, ?interval, existing = ?timer.interval, "sharing timer with different interval");
            }
            let id = timer.id;
            return PollSubscription::new(Arc::clone(&self.timers), key, id);
        }

        timers.next_id = timers.next_id.wrapping_add(1);
        let id = timers.next_id;
        let (stop, stopped) = oneshot::channel();
        tokio::spawn(run_timer(key.clone(), callback, interval, stopped));
        timers.by_key.insert(
            key.clone(),
            Timer {
                id,
                subscribers: 1,
                interval,
                stop,
            },
        );
        tracing::debug!(%key, ?interval, "polling started");
        PollSubscription::new(Arc::clone(&self.timers), key, id)
    }

    /// Number of running timers.
    #[must_use]
    pub fn active_timers(&self) -> usize {
        lock(&self.timers).by_key.len()
    }

    /// Number of subscribers sharing the timer for `key`.
    #[must_use]
    pub fn subscriber_count(&self, key: &str) -> usize {
        lock(&self.timers)
            .by_key
            .get(key)
            .map_or(0, |timer| timer.subscribers)
    }

    /// Stops every timer. Outstanding subscriptions become no-ops.
    pub fn shutdown(&self) {
        let drained: Vec<(String, Timer)> = lock(&self.timers).by_key.drain().collect();
        for (key, timer) in drained {
            let _ = timer.stop.send(());
            tracing::debug!(%key, "polling stopped on shutdown");
        }
    }
}

async fn run_timer(
    key: String,
    callback: PollCallback,
    interval: Duration,
    mut stopped: oneshot::Receiver<()>,
) {
    let period = interval.max(MIN_INTERVAL);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut stopped => break,
            _ = ticker.tick() => {}
        }
        // Runs to completion even if a stop arrives meanwhile.
        if let Err(e) = callback().await {
            tracing::warn!(%key, error = %e, "poll refresh failed");
        }
    }
}

/// Handle for one polling subscriber. Dropping it unsubscribes.
#[must_use = "dropping the subscription stops polling for this subscriber"]
pub struct PollSubscription {
    timers: Arc<Mutex<Timers>>,
    key: String,
    timer_id: u64,
    active: bool,
}

impl fmt::Debug for PollSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollSubscription")
            .field("key", &self.key)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl PollSubscription {
    const fn new(timers: Arc<Mutex<Timers>>, key: String, timer_id: u64) -> Self {
        Self {
            timers,
            key,
            timer_id,
            active: true,
        }
    }

    /// Key this subscription polls.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Releases this subscriber. Idempotent.
    pub fn unsubscribe(&mut self) {
        if !std::mem::replace(&mut self.active, false) {
            return;
        }
        let mut timers = lock(&self.timers);
        let Some(timer) = timers.by_key.get_mut(&self.key) else {
            return;
        };
        if timer.id != self.timer_id {
            return;
        }
        timer.subscribers = timer.subscribers.saturating_sub(1);
        if timer.subscribers == 0
            && let Some(timer) = timers.by_key.remove(&self.key)
        {
            let _ = timer.stop.send(());
            tracing::debug!(key = %self.key, "polling stopped");
        }
    }
}

impl Drop for PollSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
