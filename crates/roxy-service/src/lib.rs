//! Deduplicating, bounded-concurrency loader for remote payloads.
//!
//! The central type is the [`Loader`](loader::Loader), which hands out the bytes behind a URL.
//! It consults a [`CacheStore`](caching::CacheStore) first, coalesces concurrent requests for
//! the same URL into a single fetch, and never runs more than the configured number of
//! [`Fetcher`](fetch::Fetcher) invocations at once.

#[macro_use]
pub mod metrics;

pub mod binding;
pub mod caching;
pub mod config;
pub mod fetch;
pub mod loader;
pub mod logging;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test;

pub use binding::{LoadBinding, LoadState};
pub use caching::{CacheStore, InMemoryCache};
pub use fetch::{FetchResult, FetchedPayload, Fetcher, HttpFetcher};
pub use loader::{Loader, LoaderStats};
pub use types::{LoadError, Outcome, ResponseMetadata, TransportError};
