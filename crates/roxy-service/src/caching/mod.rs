//! # Payload caching
//!
//! The [`Loader`](crate::Loader) is cache-first: before a request is admitted or deduplicated,
//! the [`CacheStore`] is asked whether it already holds the payload for the key. A hit is
//! terminal and is returned straight to the caller.
//!
//! Successful fetches are written to the store together with their [`ResponseMetadata`].
//! Neither empty nor failed outcomes are ever stored, so a failure does not poison future
//! requests for the same key.
//!
//! The store owns its capacity and eviction policy. The loader only ever looks up, stores,
//! and clears everything at once; there is no per-entry invalidation.
//!
//! [`InMemoryCache`] is the default store, a size-bounded `moka` cache that evicts by
//! payload size and, optionally, by idle time.

use bytes::Bytes;
use futures::future::BoxFuture;
use url::Url;

use crate::types::ResponseMetadata;

mod memory;

pub use memory::InMemoryCache;

/// A key to payload store consulted before any fetch.
///
/// Lookups never fail: a store that cannot read an entry reports a miss.
pub trait CacheStore: Send + Sync + 'static {
    /// Returns the cached payload for `key`, if any.
    fn lookup<'a>(&'a self, key: &'a Url) -> BoxFuture<'a, Option<Bytes>>;

    /// Stores `payload` for `key`.
    fn store<'a>(
        &'a self,
        key: &'a Url,
        payload: Bytes,
        metadata: ResponseMetadata,
    ) -> BoxFuture<'a, ()>;

    /// Removes all entries.
    fn clear(&self) -> BoxFuture<'_, ()>;
}
