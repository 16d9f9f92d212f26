// src/ingest/providers/mod.rs
pub mod apify;
pub mod google_rss;

use anyhow::{anyhow, Context, Result};
use std::time::Duration;

use crate::config::provider::{ProviderKind, ProviderSettings};
use crate::ingest::types::NewsProvider;

/// Build the configured provider. `cfg.token` must already be resolved.
pub fn build_provider(cfg: &ProviderSettings) -> Result<Box<dyn NewsProvider>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .user_agent(concat!("news-digest/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")?;

    Ok(match cfg.kind {
        ProviderKind::Apify => Box::new(apify::ApifyProvider::from_settings(cfg, client)?),
        ProviderKind::GoogleRss => Box::new(google_rss::GoogleRssProvider::from_settings(cfg, client)),
    })
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

fn backoff(attempt: u8) -> Duration {
    Duration::from_millis(500u64 << (attempt.saturating_sub(1)).min(6))
}

/// Send a request, retrying 429/5xx responses and timeouts/connect errors up to
/// `max_retries` attempts with exponential backoff. Any other non-2xx is an error.
pub(crate) async fn send_with_retry<F>(
    build: F,
    max_retries: u8,
    what: &str,
) -> Result<reqwest::Response>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max = max_retries.max(1);
    let mut attempt: u8 = 0;
    loop {
        attempt += 1;
        match build().send().await {
            Ok(rsp) if rsp.status().is_success() => return Ok(rsp),
            Ok(rsp) => {
                let status = rsp.status();
                if is_retryable_status(status) && attempt < max {
                    tracing::debug!(%status, attempt, what, "retrying");
                    tokio::time::sleep(backoff(attempt)).await;
                    continue;
                }
                return Err(anyhow!("{what}: HTTP {status}"));
            }
            Err(e) => {
                if (e.is_timeout() || e.is_connect()) && attempt < max {
                    tracing::debug!(error = %e, attempt, what, "retrying");
                    tokio::time::sleep(backoff(attempt)).await;
                    continue;
                }
                return Err(e).context(what.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(2), Duration::from_millis(1000));
        assert_eq!(backoff(3), Duration::from_millis(2000));
        assert_eq!(backoff(50), Duration::from_millis(500 << 6));
    }

    #[test]
    fn only_throttling_and_server_errors_retry() {
        assert!(is_retryable_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(reqwest::StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(reqwest::StatusCode::NOT_FOUND));
    }
}
