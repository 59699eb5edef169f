//! The fetch port, which performs the actual network fetch for one URL.
//!
//! A [`Fetcher`] is invoked by the [`Loader`](crate::Loader) once a load has been admitted.
//! Cancellation is expressed by dropping the returned future: the loader runs every fetch
//! on its own task and aborts that task when the load is cancelled. Implementations must
//! therefore hold their transport resources (connections, buffers) in values that are
//! released on drop, so that every exit path, including cancellation, frees them.

use bytes::Bytes;
use futures::future::BoxFuture;
use url::Url;

use crate::types::{LoadError, ResponseMetadata};

mod http;

pub use self::http::HttpFetcher;

/// A payload returned by a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPayload {
    /// The raw payload bytes.
    pub bytes: Bytes,
    /// Metadata of the response, stored alongside the payload in the cache.
    pub metadata: ResponseMetadata,
}

impl FetchedPayload {
    /// Creates a payload with metadata derived from the bytes alone.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let metadata = ResponseMetadata::for_payload(&bytes);
        Self { bytes, metadata }
    }
}

/// The result of a fetch.
///
/// `Ok(None)` signals that the transport succeeded but yielded no usable payload.
pub type FetchResult = Result<Option<FetchedPayload>, LoadError>;

/// Performs the network fetch for a key.
///
/// Implementations must be safe to call concurrently; the loader guarantees that at most
/// one fetch per key is running at any time.
pub trait Fetcher: Send + Sync + 'static {
    /// Fetches the payload behind `key`.
    ///
    /// Retries, if any, are the responsibility of the implementation.
    fn fetch<'a>(&'a self, key: &'a Url) -> BoxFuture<'a, FetchResult>;
}
