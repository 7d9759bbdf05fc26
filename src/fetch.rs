use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::dom::{self, Document};

const RETRY_BACKOFF_MS: u64 = 2000;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to forecast service failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("forecast service returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("feed is not well-formed XML: {0:#}")]
    Xml(anyhow::Error),
}

impl FetchError {
    /// Transport and HTTP-status failures may clear up on a second attempt;
    /// a body that does not parse will not.
    fn is_transient(&self) -> bool {
        matches!(self, FetchError::Http(_) | FetchError::Status(_))
    }
}

/// Fetch the dwml feed for the configured point and parse it into a tree.
///
/// Single attempt by default. With `retry_once` set, one bounded retry
/// after a transient failure; parse failures are never retried.
pub async fn fetch_forecast(cfg: &Config) -> Result<Document, FetchError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()?;

    match fetch_once(&client, cfg).await {
        Err(e) if cfg.retry_once && e.is_transient() => {
            warn!("fetch failed ({e}), retrying once");
            tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS)).await;
            fetch_once(&client, cfg).await
        }
        other => other,
    }
}

async fn fetch_once(client: &reqwest::Client, cfg: &Config) -> Result<Document, FetchError> {
    let response = client
        .get(&cfg.feed_url)
        .query(&query_params(cfg))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    let body = response.text().await?;
    info!("retrieved {} bytes of feed data", body.len());
    dom::parse(&body).map_err(FetchError::Xml)
}

fn query_params(cfg: &Config) -> [(&'static str, String); 5] {
    [
        ("lat", cfg.lat.to_string()),
        ("lon", cfg.lon.to_string()),
        ("unit", "0".to_string()),
        ("lg", "english".to_string()),
        ("FcstType", "dwml".to_string()),
    ]
}

// ── Tests ──
