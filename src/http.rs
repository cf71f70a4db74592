//! HTTP client adapter.
//!
//! A single bounded-timeout GET that yields decoded JSON or a [`FetchError`].
//! There are no retries at this layer: a caller that hits a transient failure
//! simply asks again on its next poll.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;

/// Boxed future returned by [`HttpFetcher::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, FetchError>> + Send + 'a>>;

/// Transport contract used by the fetch services.
pub trait HttpFetcher: Send + Sync {
    /// Issue one GET to `url`, giving up after `timeout`.
    fn fetch<'a>(&'a self, url: &'a str, timeout: Duration) -> FetchFuture<'a>;
}

/// Production transport backed by `reqwest`.
#[derive(Clone, Default)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Wrap an existing client (shared connection pool, custom TLS, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(transport_error)?;
        debug!(url, bytes = body.len(), "Upstream response received");

        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

impl HttpFetcher for ReqwestFetcher {
    fn fetch<'a>(&'a self, url: &'a str, timeout: Duration) -> FetchFuture<'a> {
        Box::pin(self.get_json(url, timeout))
    }
}

fn transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_decode() {
        FetchError::Decode(err.to_string())
    } else {
        FetchError::NetworkFailure(err.to_string())
    }
}

/// Canned transport for offline runs and tests.
///
/// Each route pairs a URL fragment with the result returned for any URL
/// containing it; the first matching route wins. Unmatched URLs fail with
/// [`FetchError::NetworkFailure`].
#[derive(Debug, Default)]
pub struct StaticFetcher {
    routes: Vec<(String, Result<Value, FetchError>)>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, fragment: &str, response: Result<Value, FetchError>) -> Self {
        self.routes.push((fragment.to_string(), response));
        self
    }

    /// Sleep before answering, to simulate a slow upstream.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of fetches issued so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HttpFetcher for StaticFetcher {
    fn fetch<'a>(&'a self, url: &'a str, timeout: Duration) -> FetchFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                if delay >= timeout {
                    tokio::time::sleep(timeout).await;
                    return Err(FetchError::Timeout);
                }
                tokio::time::sleep(delay).await;
            }

            self.routes
                .iter()
                .find(|(fragment, _)| url.contains(fragment.as_str()))
                .map(|(_, response)| response.clone())
                .unwrap_or_else(|| Err(FetchError::NetworkFailure(format!("no route for {url}"))))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_static_fetcher_routes_by_fragment() {
        let fetcher = StaticFetcher::new()
            .with_route("/measures/", Ok(json!({"items": {}})))
            .with_route("/forecast", Err(FetchError::HttpStatus(502)));

        let river = fetcher.fetch("http://x/measures/abc", TIMEOUT).await;
        assert_eq!(river, Ok(json!({"items": {}})));

        let weather = fetcher.fetch("http://x/forecast?latitude=1", TIMEOUT).await;
        assert_eq!(weather, Err(FetchError::HttpStatus(502)));

        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn test_static_fetcher_unknown_route() {
        let fetcher = StaticFetcher::new();
        let result = fetcher.fetch("http://nowhere", TIMEOUT).await;
        assert!(matches!(result, Err(FetchError::NetworkFailure(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_static_fetcher_delay_past_timeout() {
        let fetcher = StaticFetcher::new()
            .with_route("", Ok(json!(1)))
            .with_delay(Duration::from_secs(30));

        let result = fetcher.fetch("http://slow", TIMEOUT).await;
        assert_eq!(result, Err(FetchError::Timeout));
    }
}
