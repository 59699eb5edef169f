//! Test doubles for the cache and fetch ports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use url::Url;

use crate::caching::CacheStore;
use crate::fetch::{FetchResult, FetchedPayload, Fetcher};
use crate::types::{ResponseMetadata, TransportError};
use crate::utils::defer::defer;

pub(crate) use roxy_test::setup;

/// Creates a test URL on a fake host.
pub(crate) fn url(path: &str) -> Url {
    format!("https://roxy.invalid/{path}").parse().unwrap()
}

/// The payload the [`ScriptedFetcher`] returns for `key` by default.
pub(crate) fn payload_for(key: &Url) -> Bytes {
    Bytes::from(key.as_str().to_owned())
}

/// What a [`ScriptedFetcher`] responds with after its delay.
#[derive(Debug, Clone)]
pub(crate) enum Response {
    /// The [`payload_for`] the key.
    Default,
    Empty,
    Fail(TransportError),
    Panic,
}

#[derive(Debug, Clone)]
struct Script {
    delay: Duration,
    response: Response,
}

/// A [`Fetcher`] that sleeps and then responds as scripted per key.
///
/// It records the order in which fetches start and finish, which fetches were dropped
/// before finishing, and the peak number of concurrently running fetches.
#[derive(Debug)]
pub(crate) struct ScriptedFetcher {
    default: Script,
    scripts: Mutex<HashMap<Url, Script>>,
    started: Mutex<Vec<Url>>,
    finished: Mutex<Vec<Url>>,
    dropped: Mutex<Vec<Url>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedFetcher {
    /// Responds with [`Response::Default`] after `delay` for every unscripted key.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            default: Script {
                delay,
                response: Response::Default,
            },
            scripts: Default::default(),
            started: Default::default(),
            finished: Default::default(),
            dropped: Default::default(),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn script(&self, key: &Url, delay: Duration, response: Response) {
        let script = Script { delay, response };
        self.scripts.lock().unwrap().insert(key.clone(), script);
    }

    pub fn calls(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> Vec<Url> {
        self.started.lock().unwrap().clone()
    }

    pub fn finished(&self) -> Vec<Url> {
        self.finished.lock().unwrap().clone()
    }

    pub fn dropped(&self) -> Vec<Url> {
        self.dropped.lock().unwrap().clone()
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch<'a>(&'a self, key: &'a Url) -> BoxFuture<'a, FetchResult> {
        Box::pin(async move {
            let script = self
                .scripts
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .unwrap_or_else(|| self.default.clone());

            self.started.lock().unwrap().push(key.clone());
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);

            let _active = defer(|| {
                self.active.fetch_sub(1, Ordering::SeqCst);
            });
            let dropped = defer(|| self.dropped.lock().unwrap().push(key.clone()));

            tokio::time::sleep(script.delay).await;

            let result = match script.response {
                Response::Default => Ok(Some(FetchedPayload::new(payload_for(key)))),
                Response::Empty => Ok(None),
                Response::Fail(err) => Err(err.into()),
                Response::Panic => panic!("fetcher panicked for `{key}`"),
            };

            dropped.disarm();
            self.finished.lock().unwrap().push(key.clone());
            result
        })
    }
}

/// A [`CacheStore`] on a plain map that records every store.
#[derive(Debug, Default)]
pub(crate) struct RecordingCache {
    entries: Mutex<HashMap<Url, Bytes>>,
    stores: Mutex<Vec<Url>>,
    store_delay: Duration,
}

impl RecordingCache {
    /// Sleeps for `delay` before completing each store.
    pub fn with_store_delay(delay: Duration) -> Self {
        Self {
            store_delay: delay,
            ..Default::default()
        }
    }

    /// Puts a payload into the cache without recording it as a store.
    pub fn preload(&self, key: &Url, payload: Bytes) {
        self.entries.lock().unwrap().insert(key.clone(), payload);
    }

    pub fn stores(&self) -> Vec<Url> {
        self.stores.lock().unwrap().clone()
    }
}

impl CacheStore for RecordingCache {
    fn lookup<'a>(&'a self, key: &'a Url) -> BoxFuture<'a, Option<Bytes>> {
        Box::pin(async move { self.entries.lock().unwrap().get(key).cloned() })
    }

    fn store<'a>(
        &'a self,
        key: &'a Url,
        payload: Bytes,
        _metadata: ResponseMetadata,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if !self.store_delay.is_zero() {
                tokio::time::sleep(self.store_delay).await;
            }
            self.stores.lock().unwrap().push(key.clone());
            self.entries.lock().unwrap().insert(key.clone(), payload);
        })
    }

    fn clear(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.entries.lock().unwrap().clear() })
    }
}
