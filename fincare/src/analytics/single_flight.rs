//! Per-key deduplication of concurrent async computations.
//!
//! [`SingleFlight::run`] starts at most one computation per key at a time. Callers that arrive
//! while a computation for their key is running await the same result instead of starting
//! another one. Once the computation finishes its entry is removed, so the next call starts
//! fresh; results are never cached here.
//!
//! Computations run as spawned tasks, so they complete (and their side effects land) even if
//! every caller waiting on them goes away.

use std::{
    any::Any,
    future::Future,
    hash::Hash,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use tracing::error;

type Flight<V> = Shared<BoxFuture<'static, V>>;

/// A computation that ended without producing a value (it panicked, or its task was cancelled)
#[derive(Debug, Clone)]
pub struct Aborted<K> {
    pub key: K,
    pub reason: String,
}

/// What a caller of [`SingleFlight::run`] got back
#[derive(Debug, Clone)]
pub struct FlightResult<V> {
    pub value: V,
    /// True when the caller awaited a computation another caller started
    pub joined: bool,
}

pub struct SingleFlight<K, V> {
    // Each entry carries the generation it was registered with, so a finished computation only
    // ever removes its own entry.
    flights: Arc<DashMap<K, (u64, Flight<V>)>>,
    next_generation: AtomicU64,
    on_abort: Arc<dyn Fn(Aborted<K>) -> V + Send + Sync>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// `on_abort` turns a computation that produced no value into the value every waiter gets.
    pub fn new(on_abort: impl Fn(Aborted<K>) -> V + Send + Sync + 'static) -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
            on_abort: Arc::new(on_abort),
        }
    }

    /// Run `make()` for `key`, or join the computation already running for it.
    ///
    /// `make` is only called when no computation for `key` is in flight.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> FlightResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        // The shard lock is released at the end of this statement, before anything is awaited.
        let (flight, joined) = match self.flights.entry(key.clone()) {
            Entry::Occupied(entry) => (entry.get().1.clone(), true),
            Entry::Vacant(entry) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let flight = self.spawn(key, generation, make());
                entry.insert((generation, flight.clone()));
                (flight, false)
            }
        };

        FlightResult {
            value: flight.await,
            joined,
        }
    }

    /// Number of computations currently running
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    fn spawn<Fut>(&self, key: K, generation: u64, work: Fut) -> Flight<V>
    where
        Fut: Future<Output = V> + Send + 'static,
    {
        let flights = Arc::clone(&self.flights);
        let on_abort = Arc::clone(&self.on_abort);
        let task_key = key.clone();

        let task = tokio::spawn(async move {
            let value = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(value) => value,
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!(reason = %reason, "Single-flight computation panicked");
                    on_abort(Aborted {
                        key: task_key.clone(),
                        reason,
                    })
                }
            };
            // Blocks briefly if the registering caller still holds the shard lock.
            flights.remove_if(&task_key, |_, (registered, _)| *registered == generation);
            value
        });

        let on_abort = Arc::clone(&self.on_abort);
        async move {
            match task.await {
                Ok(value) => value,
                Err(join_error) => on_abort(Aborted {
                    key,
                    reason: join_error.to_string(),
                }),
            }
        }
        .boxed()
        .shared()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
