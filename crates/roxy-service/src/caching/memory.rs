use bytes::Bytes;
use futures::future::BoxFuture;
use url::Url;

use super::CacheStore;
use crate::config::CacheConfig;
use crate::types::ResponseMetadata;

/// An item saved in the in-memory moka cache.
#[derive(Clone, Debug)]
struct CachedPayload {
    payload: Bytes,
    metadata: ResponseMetadata,
}

/// A size-bounded in-memory [`CacheStore`].
#[derive(Clone)]
pub struct InMemoryCache {
    cache: moka::future::Cache<Url, CachedPayload>,
}

impl std::fmt::Debug for InMemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCache")
            .field("entries", &self.cache.entry_count())
            .field("weighted_size", &self.cache.weighted_size())
            .finish()
    }
}

impl InMemoryCache {
    pub fn new(config: &CacheConfig) -> Self {
        let mut builder = moka::future::Cache::builder()
            .max_capacity(config.in_memory_capacity)
            .name("payloads")
            // NOTE: we count the key and bookkeeping structures to the weight as well
            .weigher(|k: &Url, v: &CachedPayload| {
                let size = k.as_str().len()
                    + std::mem::size_of::<CachedPayload>()
                    + v.payload.len()
                    + v.metadata.content_type.as_ref().map_or(0, String::len);
                size.try_into().unwrap_or(u32::MAX)
            });

        if let Some(time_to_idle) = config.time_to_idle {
            builder = builder.time_to_idle(time_to_idle);
        }

        Self {
            cache: builder.build(),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl CacheStore for InMemoryCache {
    fn lookup<'a>(&'a self, key: &'a Url) -> BoxFuture<'a, Option<Bytes>> {
        Box::pin(async move { self.cache.get(key).await.map(|item| item.payload) })
    }

    fn store<'a>(
        &'a self,
        key: &'a Url,
        payload: Bytes,
        metadata: ResponseMetadata,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            metric!(counter("cache.store") += 1);
            metric!(time_raw("cache.store.size") = payload.len() as u64);
            tracing::trace!("Caching {} bytes for `{}`", payload.len(), key);
            self.cache
                .insert(key.clone(), CachedPayload { payload, metadata })
                .await;
        })
    }

    fn clear(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            metric!(counter("cache.clear") += 1);
            self.cache.invalidate_all();
            self.cache.run_pending_tasks().await;
        })
    }
}
