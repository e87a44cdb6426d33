//! Per-domain request pacing
//!
//! Every outgoing request first waits on the limiter slot for its domain.
//! Requests to different domains never wait on each other; requests to the
//! same domain are spaced at least `1 / requests_per_second` apart.

use crate::url::domain_key;
use crate::FeedlineError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Time of the most recent request to one domain
type DomainSlot = Arc<Mutex<Option<Instant>>>;

/// Rate limiter keyed by the host part of each URL
#[derive(Debug)]
pub struct DomainRateLimiter {
    /// Minimum spacing between two requests to the same domain
    interval: Duration,

    /// Per-domain slots; the outer lock is held only to look a slot up
    slots: Mutex<HashMap<String, DomainSlot>>,
}

impl DomainRateLimiter {
    /// Creates a limiter allowing `requests_per_second` per domain
    ///
    /// # Returns
    ///
    /// * `Ok(DomainRateLimiter)` - The limiter
    /// * `Err(FeedlineError::InvalidArgument)` - The rate is not a positive,
    ///   finite number
    pub fn new(requests_per_second: f64) -> Result<Self, FeedlineError> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Err(FeedlineError::InvalidArgument(format!(
                "requests per second must be positive, got {}",
                requests_per_second
            )));
        }

        let interval = Duration::try_from_secs_f64(1.0 / requests_per_second).map_err(|e| {
            FeedlineError::InvalidArgument(format!(
                "requests per second {} gives an unusable interval: {}",
                requests_per_second, e
            ))
        })?;

        Ok(Self {
            interval,
            slots: Mutex::new(HashMap::new()),
        })
    }

    /// Minimum spacing between requests to one domain
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until a request to `url` may be sent
    ///
    /// Concurrent callers for the same domain queue on the domain's slot and
    /// are released one interval apart.
    pub async fn wait(&self, url: &str) {
        let domain = domain_key(url);
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(domain).or_default())
        };

        let mut last = slot.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Number of domains seen so far
    pub async fn tracked_domains(&self) -> usize {
        self.slots.lock().await.len()
    }
}
