//! Support to fetch payloads from HTTP servers.

use std::time::SystemTime;

use bytes::BytesMut;
use futures::TryStreamExt;
use futures::future::BoxFuture;
use reqwest::{Client, header};
use url::Url;

use super::{FetchResult, FetchedPayload, Fetcher};
use crate::config::Config;
use crate::types::{ResponseMetadata, TransportError};
use crate::utils::http::{FetchTimeouts, create_client};

/// Fetcher implementation that downloads payloads with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeouts: FetchTimeouts,
}

impl HttpFetcher {
    pub fn new(client: Client, timeouts: FetchTimeouts) -> Self {
        Self { client, timeouts }
    }

    /// Creates a fetcher with a client configured from `config`.
    pub fn from_config(config: &Config) -> Self {
        let timeouts = FetchTimeouts::from_config(config);
        let client = create_client(&timeouts, &config.user_agent);
        Self::new(client, timeouts)
    }

    /// Converts a client error, attributing timeouts of the client to the configured limit.
    fn transport_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            let timeout = if error.is_connect() {
                self.timeouts.connect
            } else {
                self.timeouts.max_download
            };
            return TransportError::Timeout(timeout);
        }
        error.into()
    }

    async fn fetch_url(&self, url: &Url) -> FetchResult {
        tracing::debug!("Fetching payload from `{}`", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Unexpected status code from `{url}`: {status}");
            return Err(TransportError::Status(status.as_u16()).into());
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let mut body = BytesMut::new();
        let mut stream = response
            .bytes_stream()
            .map_err(|err| self.transport_error(err));
        while let Some(chunk) = stream.try_next().await? {
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            tracing::debug!("Success hitting `{url}`, but the response has no payload");
            return Ok(None);
        }

        tracing::trace!("Success hitting `{url}`, {} bytes", body.len());
        let bytes = body.freeze();
        let metadata = ResponseMetadata {
            status: status.as_u16(),
            content_type,
            content_length: bytes.len() as u64,
            fetched_at: SystemTime::now(),
        };
        Ok(Some(FetchedPayload { bytes, metadata }))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, key: &'a Url) -> BoxFuture<'a, FetchResult> {
        Box::pin(async move {
            let timeout = self.timeouts.max_download;
            match tokio::time::timeout(timeout, self.fetch_url(key)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(timeout).into()),
            }
        })
    }
}
