use std::time::Duration;

use reqwest::redirect;

use crate::config::Config;

/// Timeouts applied to every fetch.
#[derive(Copy, Clone, Debug)]
pub struct FetchTimeouts {
    /// The timeout for establishing a connection.
    pub connect: Duration,
    /// Global timeout for one fetch, including the body.
    pub max_download: Duration,
}

impl FetchTimeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            connect: config.connect_timeout,
            max_download: config.max_download_timeout,
        }
    }
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            max_download: Duration::from_secs(10),
        }
    }
}

/// Creates a [`reqwest::Client`] with the provided timeouts.
///
/// Connections are pooled and kept idle for a short while, so consecutive fetches from
/// the same host reuse them. Every fetch still releases its connection back to the pool,
/// or closes it, when the fetch settles or is dropped.
pub fn create_client(timeouts: &FetchTimeouts, user_agent: &str) -> reqwest::Client {
    reqwest::ClientBuilder::new()
        .gzip(true)
        .user_agent(user_agent)
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.max_download)
        .pool_idle_timeout(Duration::from_secs(30))
        .redirect(redirect::Policy::limited(10))
        .build()
        .unwrap_or_else(|err| {
            // Building only fails if the TLS backend cannot be initialized.
            tracing::error!(
                error = &err as &dyn std::error::Error,
                "Failed to build configured HTTP client, using defaults"
            );
            reqwest::Client::new()
        })
}
