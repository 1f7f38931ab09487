//! Collapses concurrent identical requests into one shared future.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};

use crate::error::SyncError;

type SharedResult<T> = Shared<BoxFuture<'static, Result<T, SyncError>>>;

struct InFlight<T> {
    generation: u64,
    future: SharedResult<T>,
}

type InFlightMap<T> = Arc<Mutex<HashMap<String, InFlight<T>>>>;

fn lock<T>(map: &Mutex<HashMap<String, InFlight<T>>>) -> MutexGuard<'_, HashMap<String, InFlight<T>>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Forgets `key` unless a newer operation has taken its slot.
fn release<T>(map: &Mutex<HashMap<String, InFlight<T>>>, key: &str, generation: u64) {
    let mut in_flight = lock(map);
    if in_flight
        .get(key)
        .is_some_and(|entry| entry.generation == generation)
    {
        in_flight.remove(key);
    }
}

/// Shares one in-flight operation per key among all concurrent callers.
///
/// A key is registered when the first caller arrives and removed as soon
/// as the operation settles, successfully or not, so a later call always
/// runs the operation again. The operation runs on its own task, so it
/// completes even if every caller stops waiting.
pub struct QueryDeduplicator<T> {
    in_flight: InFlightMap<T>,
    next_generation: AtomicU64,
}

impl<T> QueryDeduplicator<T> {
    /// Creates an empty deduplicator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Number of keys with an operation currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Returns `true` if an operation for `key` is in flight.
    #[must_use]
    pub fn is_in_flight(&self, key: &str) -> bool {
        lock(&self.in_flight).contains_key(key)
    }
}

impl<T> Default for QueryDeduplicator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for QueryDeduplicator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryDeduplicator")
            .field("in_flight", &self.in_flight_count())
            .finish_non_exhaustive()
    }
}

impl<T> QueryDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Runs `operation` unless one is already in flight for `key`, in which
    /// case the pending result is awaited instead.
    ///
    /// # Errors
    ///
    /// Returns the operation's error; every concurrent caller receives the
    /// same one.
    pub async fn deduplicate<F, Fut>(&self, key: &str, operation: F) -> Result<T, SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        let shared = {
            let mut in_flight = lock(&self.in_flight);
            if let Some(existing) = in_flight.get(key) {
                tracing::debug!(key, "joining in-flight request");
                existing.future.clone()
            } else {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let map = Arc::clone(&self.in_flight);
                let owned_key = key.to_string();
                let operation = operation();

                let task = tokio::spawn({
                    let map = Arc::clone(&map);
                    let owned_key = owned_key.clone();
                    async move {
                        let result = operation.await;
                        release(&map, &owned_key, generation);
                        result
                    }
                });
                let future = async move {
                    task.await.unwrap_or_else(|e| {
                        release(&map, &owned_key, generation);
                        Err(SyncError::Internal(format!("request task failed: {e}")))
                    })
                }
                .boxed()
                .shared();

                in_flight.insert(
                    key.to_string(),
                    InFlight {
                        generation,
                        future: future.clone(),
                    },
                );
                future
            }
        };
        shared.await
    }
}
