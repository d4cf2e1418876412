//! Page fetching with bounded exponential backoff.
//!
//! This module provides the HTTP layer used to download watch pages and the
//! bias-rating listing pages. It includes automatic retry logic with
//! exponential backoff and jitter so that transient network failures do not
//! abort a crawl, while a permanently unreachable URL ends in an error
//! instead of an endless loop.
//!
//! # Architecture
//!
//! - [`PageFetcher`]: Core trait defining an async `GET url -> html`
//! - [`HttpFetcher`]: `reqwest`-backed implementation
//! - [`RetryFetch`]: Decorator that adds retry logic to any `PageFetcher`
//!
//! # Retry Strategy
//!
//! - Maximum 5 retry attempts by default
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added between attempts

use rand::{Rng, rng};
use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::form_urlencoded;

/// Browser-like user agent; the watch page serves a stripped layout to unknown clients.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const WATCH_BASE: &str = "https://www.youtube.com/watch";

/// Errors produced while fetching a page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: usize, last: String },
}

/// Trait for async page retrieval.
///
/// The crawler and the bias scraper only depend on this trait, so tests can
/// swap in canned HTML without touching the network.
pub trait PageFetcher {
    /// Download `url` and return its body as text.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Build the watch-page URL for `video_id`, with `gl=<loc>` when a locale is set.
pub fn watch_url(video_id: &str, loc: Option<&str>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("v", video_id);
    if let Some(loc) = loc {
        query.append_pair("gl", loc);
    }
    format!("{}?{}", WATCH_BASE, query.finish())
}

/// `Accept-Language` value for `lang`, falling back to `en` when it is not a valid header.
fn accept_language(lang: &str) -> HeaderValue {
    HeaderValue::from_str(lang).unwrap_or_else(|e| {
        warn!(lang, error = %e, "Invalid language for Accept-Language; using \"en\"");
        HeaderValue::from_static("en")
    })
}

/// Plain `reqwest` fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher sending `Accept-Language: <lang>` with every request.
    pub fn new(lang: &str, timeout: Duration) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let language = accept_language(lang);
        headers.insert(ACCEPT_LANGUAGE, language);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`PageFetcher`].
///
/// The delay between retries follows:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=max_jitter)
/// ```
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    max_jitter: Duration,
}

impl<T> RetryFetch<T>
where
    T: PageFetcher,
{
    /// Wrap `inner` with `max_retries` retries starting at `base_delay`.
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
        }
    }

    /// Backoff before retry number `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(31) as u32;
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> PageFetcher for RetryFetch<T>
where
    T: PageFetcher,
{
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(FetchError::Exhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }

                    let mut delay = self.backoff(attempt);
                    let jitter_ms = self.max_jitter.as_millis() as u64;
                    if jitter_ms > 0 {
                        delay += Duration::from_millis(rng().random_range(0..=jitter_ms));
                    }

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
