//! The load coordinator.
//!
//! A [`Loader`] answers requests for the payload behind a [`Url`]:
//!
//! 1. The [`CacheStore`] is consulted first. A hit is returned right away, without being
//!    deduplicated or admitted.
//! 2. If a load for the same key is already in flight, the caller attaches to it and
//!    receives the very same [`Outcome`].
//! 3. Otherwise a new load is started. It occupies a slot of the [`AdmissionGate`], or
//!    waits in FIFO order until one is released, and then invokes the [`Fetcher`].
//!
//! Every load runs on its own spawned task and settles exactly once, either by its task
//! completing or by an explicit [`Loader::cancel`]. A caller that stops waiting does not
//! affect the load, other callers may still be attached to it.
//!
//! All bookkeeping (the table of in-flight loads and the admission gate) lives behind a
//! single lock that is never held across an `.await`.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use url::Url;

use crate::caching::{CacheStore, InMemoryCache};
use crate::config::Config;
use crate::fetch::{FetchedPayload, Fetcher, HttpFetcher};
use crate::types::{LoadError, Outcome};
use crate::utils::defer::defer;
use crate::utils::futures::{m, measure};

mod distribution;
mod gate;

pub use self::distribution::{Completer, Promise, promise};
pub use self::gate::{Acquired, Admission, AdmissionGate};

/// Whether an in-flight load waits for admission or occupies a fetch slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Queued,
    Fetching,
}

/// The table entry of a load that has not settled yet.
#[derive(Debug)]
struct InFlightLoad {
    /// Distinguishes this load from earlier, cancelled loads of the same key.
    generation: u64,
    phase: Phase,
    completer: Completer<Outcome>,
    outcome: Promise<Outcome>,
    task: AbortHandle,
}

#[derive(Debug)]
struct LoaderState {
    loads: HashMap<Url, InFlightLoad>,
    gate: AdmissionGate,
    next_generation: u64,
}

impl LoaderState {
    /// Frees the slot of a fetching load and marks the load of the admitted waiter, if any,
    /// as fetching.
    fn release_slot(&mut self) {
        if let Some((key, generation)) = self.gate.release_slot() {
            match self.loads.get_mut(&key) {
                Some(load) if load.generation == generation => load.phase = Phase::Fetching,
                _ => tracing::error!("Admitted a waiter for `{}` without a queued load", key),
            }
        }
        metric!(gauge("loader.active") = self.gate.active() as u64);
    }
}

/// A snapshot of the loader bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Loads that currently occupy a fetch slot.
    pub active: usize,
    /// Loads that wait for a fetch slot.
    pub queued: usize,
    /// All loads that have not settled yet, both active and queued.
    pub in_flight: usize,
    /// The maximum number of concurrently active loads.
    pub ceiling: usize,
}

struct LoaderInner {
    cache: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    state: Mutex<LoaderState>,
}

/// Deduplicating, cache-first loader with bounded fetch concurrency.
///
/// Cloning is cheap, all clones share the same cache, table of in-flight loads, and
/// admission gate.
#[derive(Clone)]
pub struct Loader {
    inner: Arc<LoaderInner>,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Loader {
    /// Creates a loader that runs at most `ceiling` fetches at once.
    ///
    /// A `ceiling` of `0` is treated as `1`.
    pub fn new(ceiling: usize, cache: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        let state = LoaderState {
            loads: HashMap::new(),
            gate: AdmissionGate::new(ceiling),
            next_generation: 0,
        };
        Self {
            inner: Arc::new(LoaderInner {
                cache,
                fetcher,
                state: Mutex::new(state),
            }),
        }
    }

    /// Creates a loader backed by an [`InMemoryCache`] and an [`HttpFetcher`].
    pub fn from_config(config: &Config) -> Self {
        let cache = Arc::new(InMemoryCache::new(&config.caches));
        let fetcher = Arc::new(HttpFetcher::from_config(config));
        Self::new(config.concurrency_ceiling(), cache, fetcher)
    }

    /// Returns the payload for `key`.
    ///
    /// Concurrent requests for the same key share a single fetch and all observe the same
    /// [`Outcome`]. Dropping the returned future detaches this caller only, use
    /// [`cancel`](Self::cancel) to abort the load itself.
    pub async fn request(&self, key: &Url) -> Outcome {
        metric!(counter("loader.access") += 1);

        if let Some(payload) = self.inner.cache.lookup(key).await {
            metric!(counter("loader.cache.hit") += 1);
            tracing::trace!("Cache hit for `{}`", key);
            return Outcome::Payload(payload);
        }

        let outcome = self.inner.attach_or_start(key);
        match outcome.wait().await {
            Some(outcome) => outcome,
            None => {
                tracing::error!("Load for `{}` went away without an outcome", key);
                Outcome::Failed(LoadError::Internal)
            }
        }
    }

    /// Cancels the in-flight load for `key`.
    ///
    /// All callers attached to the load observe [`LoadError::Cancelled`]. A running fetch
    /// is aborted and frees its slot, a queued load is removed from the queue without ever
    /// invoking the fetcher. Cancelling a key without an in-flight load does nothing.
    pub fn cancel(&self, key: &Url) {
        let load = {
            let mut state = self.inner.state();
            let Some(load) = state.loads.remove(key) else {
                return;
            };

            match load.phase {
                Phase::Fetching => state.release_slot(),
                Phase::Queued => {
                    state.gate.cancel_waiting(key);
                }
            }
            load
        };

        metric!(counter("loader.cancel") += 1);
        tracing::debug!("Cancelled load for `{}`", key);

        load.task.abort();
        load.completer.complete(Outcome::Failed(LoadError::Cancelled));
    }

    /// Removes all payloads from the cache.
    ///
    /// Loads that are in flight are not affected and will still populate the cache.
    pub async fn clear_cache(&self) {
        self.inner.cache.clear().await
    }

    /// Returns a snapshot of the current bookkeeping.
    pub fn stats(&self) -> LoaderStats {
        let state = self.inner.state();
        LoaderStats {
            active: state.gate.active(),
            queued: state.gate.queued(),
            in_flight: state.loads.len(),
            ceiling: state.gate.ceiling(),
        }
    }
}

impl LoaderInner {
    fn state(&self) -> MutexGuard<'_, LoaderState> {
        // The state is consistent after every critical section, none of which can panic
        // halfway through.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches to the in-flight load for `key`, or starts a new one.
    fn attach_or_start(self: &Arc<Self>, key: &Url) -> Promise<Outcome> {
        let mut state = self.state();

        if let Some(load) = state.loads.get(key) {
            metric!(counter("loader.dedup") += 1);
            tracing::trace!("Attaching to in-flight load for `{}`", key);
            return load.outcome.clone();
        }

        let generation = state.next_generation;
        state.next_generation += 1;

        let (phase, admission) = match state.gate.acquire(key, generation) {
            Acquired::Admitted => (Phase::Fetching, None),
            Acquired::Queued(admission) => {
                metric!(counter("loader.queued") += 1);
                tracing::trace!("Queueing load for `{}`", key);
                (Phase::Queued, Some(admission))
            }
        };

        let (completer, outcome) = promise();
        let task = tokio::spawn(Arc::clone(self).run_load(key.clone(), generation, admission));

        state.loads.insert(
            key.clone(),
            InFlightLoad {
                generation,
                phase,
                completer,
                outcome: outcome.clone(),
                task: task.abort_handle(),
            },
        );
        metric!(gauge("loader.active") = state.gate.active() as u64);

        outcome
    }

    /// Whether the load of `key` with `generation` is still the current one.
    fn is_current(&self, key: &Url, generation: u64) -> bool {
        self.state()
            .loads
            .get(key)
            .is_some_and(|load| load.generation == generation)
    }

    /// Drives a single load: waits for admission, fetches, caches, and settles.
    async fn run_load(
        self: Arc<Self>,
        key: Url,
        generation: u64,
        admission: Option<oneshot::Receiver<Admission>>,
    ) {
        // Settles the load if this task goes away without doing so itself, which is the
        // case when the fetcher panics. After a cancellation this is a no-op.
        let guard = defer({
            let inner = Arc::clone(&self);
            let key = key.clone();
            move || inner.settle(&key, generation, Outcome::Failed(LoadError::Internal))
        });

        if let Some(admission) = admission {
            match admission.await {
                Ok(Admission::Proceed) => {}
                Ok(Admission::Cancelled) => return,
                Err(_) => {
                    tracing::error!("Admission for `{}` was dropped", key);
                    return;
                }
            }
        }

        tracing::trace!("Fetching `{}`", key);
        let result = measure("loader.fetch", m::fetch, self.fetcher.fetch(&key)).await;

        let outcome = match result {
            Ok(Some(FetchedPayload { bytes, metadata })) => {
                // A cancel aborts a store at its next yield point. A store that completes
                // without yielding can still write the payload of a just-cancelled load.
                if self.is_current(&key, generation) {
                    self.cache.store(&key, bytes.clone(), metadata).await;
                }
                Outcome::Payload(bytes)
            }
            Ok(None) => Outcome::Empty,
            Err(err) => {
                tracing::debug!("Fetching `{}` failed: {}", key, err);
                Outcome::Failed(err)
            }
        };

        guard.disarm();
        self.settle(&key, generation, outcome);
    }

    /// Removes the load from the table and delivers `outcome` to everyone attached to it.
    ///
    /// Outcomes of a load that was cancelled, or replaced by a newer load of the same key,
    /// are discarded.
    fn settle(&self, key: &Url, generation: u64, outcome: Outcome) {
        let load = {
            let mut state = self.state();
            let load = match state.loads.entry(key.clone()) {
                Entry::Occupied(entry) if entry.get().generation == generation => entry.remove(),
                _ => {
                    tracing::trace!("Discarding stale outcome for `{}`", key);
                    return;
                }
            };

            match load.phase {
                Phase::Fetching => state.release_slot(),
                Phase::Queued => {
                    state.gate.cancel_waiting(key);
                }
            }
            load
        };

        tracing::trace!("Settled load for `{}`: {}", key, outcome.status());
        load.completer.complete(outcome);
    }
}
