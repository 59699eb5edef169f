use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::future::join_all;
use serde::Serialize;
use url::Url;

use roxy_service::{Loader, Outcome};

/// The result of loading a single URL.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub url: Url,
    /// One of `payload`, `empty`, `cancelled` or `failed`.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Report {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(duration.as_millis() as u64)
}

/// Derives the name of the output file for the `index`-th URL.
///
/// The index prefix keeps files apart whose URLs end in the same segment.
fn file_name(index: usize, url: &Url) -> String {
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .or_else(|| url.host_str())
        .unwrap_or("payload");

    let name: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();

    format!("{index:03}-{name}")
}

/// Requests all `urls` concurrently and optionally writes the payloads to `output`.
pub async fn load_all(loader: &Loader, urls: &[Url], output: Option<&Path>) -> Result<Vec<Report>> {
    if let Some(dir) = output {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create `{}`", dir.display()))?;
    }

    let loads = urls.iter().map(|url| async move {
        let start = Instant::now();
        let outcome = loader.request(url).await;
        (outcome, start.elapsed())
    });
    let outcomes = join_all(loads).await;

    let mut reports = Vec::with_capacity(urls.len());
    for (index, (url, (outcome, elapsed))) in urls.iter().zip(outcomes).enumerate() {
        let mut report = Report {
            url: url.clone(),
            status: outcome.status(),
            size: None,
            error: None,
            elapsed,
            path: None,
        };

        match outcome {
            Outcome::Payload(payload) => {
                report.size = Some(payload.len());
                if let Some(dir) = output {
                    let path = dir.join(file_name(index, url));
                    tokio::fs::write(&path, &payload)
                        .await
                        .with_context(|| format!("failed to write `{}`", path.display()))?;
                    report.path = Some(path);
                }
            }
            Outcome::Empty => {}
            Outcome::Failed(err) => {
                if err.is_cancelled() {
                    tracing::debug!("Load of `{}` was cancelled", url);
                } else {
                    tracing::warn!("Failed to load `{}`: {}", url, err);
                }
                report.error = Some(err.to_string());
            }
        }

        reports.push(report);
    }

    Ok(reports)
}
