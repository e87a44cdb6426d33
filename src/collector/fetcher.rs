//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the collector, including:
//! - Building the HTTP client (redirects, compression, connect timeout)
//! - Per-domain pacing through the rate limiter before every attempt
//! - Retry logic with Retry-After support and exponential backoff
//! - Error classification into transient and terminal failures

use crate::collector::rate_limiter::DomainRateLimiter;
use crate::collector::result::FailureKind;
use crate::FeedlineError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER, USER_AGENT};
use reqwest::{redirect::Policy, Client, Response};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Upper bound on the exponential part of the backoff
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Upper bound (exclusive) on the jitter added to computed backoffs
const MAX_JITTER: Duration = Duration::from_millis(250);

/// Maximum redirect hops followed per request
const MAX_REDIRECTS: usize = 10;

/// Errors from a (possibly retried) fetch
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("request for {url} could not be made: {message}")]
    Request { url: String, message: String },
}

impl FetchError {
    /// Returns true if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Status { status, .. } => is_retryable_status(*status),
            Self::Request { .. } => false,
        }
    }

    /// Classification used for source bookkeeping and alerting
    pub fn failure_kind(&self) -> FailureKind {
        if self.is_retryable() {
            FailureKind::Transient
        } else {
            FailureKind::Terminal
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Network { url, .. }
            | Self::Status { url, .. }
            | Self::Request { url, .. } => url,
        }
    }

    /// HTTP status, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_builder() || err.is_redirect() {
            Self::Request {
                url,
                message: err.to_string(),
            }
        } else {
            Self::Network {
                url,
                message: err.to_string(),
            }
        }
    }
}

/// 429 and every 5xx are worth retrying
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// A successful response
///
/// `T` is the body as read by the fetch call: raw bytes for feed documents,
/// charset-decoded text for article pages.
#[derive(Debug, Clone)]
pub struct Fetched<T = Vec<u8>> {
    pub body: T,

    /// URL after redirects
    pub final_url: String,

    pub status: u16,

    /// HTTP attempts made, including the successful one
    pub attempts: u32,
}

/// Suspends the fetcher between retry attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Builds the HTTP client shared by every request
///
/// The user agent and request timeout are set per request so they follow
/// configuration reloads.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Rate-limited HTTP GET with retries
pub struct Fetcher {
    client: Client,
    limiter: DomainRateLimiter,
    max_retries: u32,
    sleeper: Arc<dyn Sleeper>,

    /// Reference point for jitter
    epoch: Instant,
}

impl Fetcher {
    /// Creates a fetcher
    ///
    /// # Arguments
    ///
    /// * `limiter` - Per-domain pacing applied before every attempt
    /// * `max_retries` - Additional attempts after the first one
    pub fn new(limiter: DomainRateLimiter, max_retries: u32) -> Result<Self, FeedlineError> {
        Ok(Self {
            client: build_http_client()?,
            limiter,
            max_retries,
            sleeper: Arc::new(TokioSleeper),
            epoch: Instant::now(),
        })
    }

    /// Replaces the backoff sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn limiter(&self) -> &DomainRateLimiter {
        &self.limiter
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Fetches `url` as raw bytes, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Return body |
    /// | HTTP 429 / 5xx | Retry after `Retry-After`, else backoff |
    /// | Other HTTP status | Return error immediately |
    /// | Timeout / connection error | Retry after backoff |
    ///
    /// Backoff is `min(2^attempt, 30)` seconds plus up to 250 ms of jitter.
    /// When attempts run out the last error is returned.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `timeout` - Timeout for each single attempt
    /// * `user_agent` - User-Agent header value
    pub async fn fetch(
        &self,
        url: &str,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Fetched, FetchError> {
        self.fetch_with(url, timeout, user_agent, |response: Response| async move {
            response.bytes().await.map(|body| body.to_vec())
        })
        .await
    }

    /// Fetches `url` as text, decoded with the charset from `Content-Type`
    ///
    /// Same retry behaviour as [`Fetcher::fetch`].
    pub async fn fetch_text(
        &self,
        url: &str,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Fetched<String>, FetchError> {
        self.fetch_with(url, timeout, user_agent, Response::text).await
    }

    async fn fetch_with<T, F, Fut>(
        &self,
        url: &str,
        timeout: Duration,
        user_agent: &str,
        read: F,
    ) -> Result<Fetched<T>, FetchError>
    where
        F: Fn(Response) -> Fut,
        Fut: Future<Output = reqwest::Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            self.limiter.wait(url).await;

            let (error, retry_after) = match self.send_once(url, timeout, user_agent, &read).await {
                Ok((body, final_url, status)) => {
                    return Ok(Fetched {
                        body,
                        final_url,
                        status,
                        attempts: attempt + 1,
                    });
                }
                Err(failed) => failed,
            };

            if !error.is_retryable() || attempt >= self.max_retries {
                return Err(error);
            }

            let delay = retry_after.unwrap_or_else(|| backoff_delay(attempt, self.jitter()));
            tracing::warn!(
                "Attempt {}/{} for {} failed ({}), retrying in {:.2}s",
                attempt + 1,
                self.max_retries + 1,
                url,
                error,
                delay.as_secs_f64()
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }

    /// Performs one HTTP attempt
    ///
    /// Errors carry the server's Retry-After delay when one was sent.
    async fn send_once<T, F, Fut>(
        &self,
        url: &str,
        timeout: Duration,
        user_agent: &str,
        read: &F,
    ) -> Result<(T, String, u16), (FetchError, Option<Duration>)>
    where
        F: Fn(Response) -> Fut,
        Fut: Future<Output = reqwest::Result<T>>,
    {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| (FetchError::from_reqwest(url, e), None))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = parse_retry_after(response.headers());
            return Err((
                FetchError::Status {
                    url: url.to_string(),
                    status,
                },
                retry_after,
            ));
        }

        let final_url = response.url().to_string();
        let body = read(response)
            .await
            .map_err(|e| (FetchError::from_reqwest(url, e), None))?;

        Ok((body, final_url, status))
    }

    /// Sub-250ms jitter taken from the monotonic clock
    fn jitter(&self) -> Duration {
        let nanos = self.epoch.elapsed().subsec_nanos() % MAX_JITTER.as_nanos() as u32;
        Duration::from_nanos(u64::from(nanos))
    }
}

/// Backoff before retry number `attempt + 1`
pub fn backoff_delay(attempt: u32, jitter: Duration) -> Duration {
    let exponential = 2f64.powi(attempt.min(16) as i32);
    Duration::from_secs_f64(exponential).min(MAX_BACKOFF) + jitter.min(MAX_JITTER)
}

/// Reads `Retry-After` as non-negative seconds
///
/// HTTP-date values and anything else unparseable are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let seconds: f64 = value.trim().parse().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Duration::try_from_secs_f64(seconds).ok()
    } else {
        None
    }
}
