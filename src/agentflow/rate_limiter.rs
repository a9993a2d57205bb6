//! Sliding-window request rate limiting.
//!
//! A [`RateLimiter`] keeps a window of recent request timestamps and makes
//! callers wait until a slot frees up.  Two instances are composed in series
//! by the [`LlmAdapter`](crate::agentflow::adapter::LlmAdapter): one per-minute
//! window and one per-day window, so a burst-friendly short ceiling and a
//! budget-style long ceiling apply to every backend call.
//!
//! [`RateLimiter::execute`] additionally retries closures whose failure is
//! classified as a provider-side rate limit, with exponential backoff.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentflow::rate_limiter::{RateLimiter, RateLimiterConfig};
//! use std::time::Duration;
//!
//! # async {
//! let limiter = RateLimiter::new(RateLimiterConfig {
//!     max_requests: 2,
//!     window: Duration::from_secs(1),
//!     ..Default::default()
//! });
//!
//! limiter.check_and_register().await; // immediate
//! limiter.check_and_register().await; // immediate
//! limiter.check_and_register().await; // waits ~1s for the first slot to expire
//! # };
//! ```

use std::collections::VecDeque;
use std::error::Error;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Configuration for a single sliding window.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of requests admitted within any `window`-sized interval.
    pub max_requests: usize,
    /// Width of the sliding window.
    pub window: Duration,
    /// Total attempts [`RateLimiter::execute`] makes before giving up on a
    /// rate-limited closure.
    pub max_retries: u32,
    /// Base delay for the exponential backoff between retries
    /// (`retry_delay * 2^attempt`).
    pub retry_delay: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_millis(60_000),
            max_retries: 3,
            retry_delay: Duration::from_millis(1_000),
        }
    }
}

impl RateLimiterConfig {
    /// The per-minute window composed into the adapter: 60 requests / 60 s.
    pub fn per_minute() -> Self {
        Self::default()
    }

    /// The per-day window composed into the adapter: 1 000 requests / 24 h.
    pub fn per_day() -> Self {
        Self {
            max_requests: 1_000,
            window: Duration::from_millis(86_400_000),
            ..Self::default()
        }
    }
}

/// Observable snapshot of one window, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Number of timestamps currently inside the window.
    pub current: usize,
    /// Configured ceiling for the window.
    pub limit: usize,
}

/// Diagnostic classification of a transport error message.
///
/// Classification is by substring heuristics over the error text, the only
/// signal uniformly available across providers.  Only [`RateLimit`](ErrorClass::RateLimit)
/// triggers retries; the others exist for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Provider-side throttling; retryable with backoff.
    RateLimit,
    /// Connectivity-level failure.
    Network,
    /// Credential rejection.
    Auth,
    /// Anything else.
    Other,
}

/// Classify an error message by substring heuristics.
///
/// # Example
///
/// ```rust
/// use agentflow::rate_limiter::{classify_error, ErrorClass};
///
/// assert_eq!(classify_error("HTTP 429 Too Many Requests"), ErrorClass::RateLimit);
/// assert_eq!(classify_error("connection reset by peer"), ErrorClass::Network);
/// assert_eq!(classify_error("boom"), ErrorClass::Other);
/// ```
pub fn classify_error(message: &str) -> ErrorClass {
    let lowered = message.to_lowercase();
    let any = |needles: &[&str]| needles.iter().any(|n| lowered.contains(n));

    if any(&["rate limit", "quota exceeded", "429", "too many requests"]) {
        ErrorClass::RateLimit
    } else if any(&["unauthorized", "401", "403", "invalid api key", "forbidden"]) {
        ErrorClass::Auth
    } else if any(&["connection", "timed out", "timeout", "dns", "network"]) {
        ErrorClass::Network
    } else {
        ErrorClass::Other
    }
}

/// True iff the message reads as provider-side throttling.
pub fn is_rate_limit_error(message: &str) -> bool {
    classify_error(message) == ErrorClass::RateLimit
}

/// A sliding-window counter over request timestamps.
///
/// The window buffer is append-and-prune: stale timestamps are purged on
/// every check, so memory use is bounded by `max_requests`.
pub struct RateLimiter {
    config: RateLimiterConfig,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter for the given window configuration.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            timestamps: Mutex::new(VecDeque::with_capacity(config.max_requests)),
            config,
        }
    }

    /// Wait until a request slot is available, then claim it.
    ///
    /// Purges timestamps older than `now - window`; if the remaining count has
    /// reached the ceiling, suspends until the oldest timestamp leaves the
    /// window and re-checks.  Otherwise registers `now` and returns.  The wait
    /// is bounded by the window size.
    pub async fn check_and_register(&self) {
        loop {
            let wake_at = {
                let mut window = self.timestamps.lock().await;
                let now = Instant::now();
                Self::purge(&mut window, now, self.config.window);

                if window.len() < self.config.max_requests {
                    window.push_back(now);
                    return;
                }

                // Front is the oldest survivor; its slot opens when it ages out.
                *window.front().expect("window is non-empty") + self.config.window
            };

            tokio::time::sleep_until(wake_at).await;
        }
    }

    /// Run `f` behind the limiter, retrying rate-limited failures.
    ///
    /// Each attempt claims a window slot via
    /// [`check_and_register`](RateLimiter::check_and_register).  Failures
    /// classified as rate limits ([`is_rate_limit_error`]) are retried after
    /// `retry_delay * 2^attempt`, up to `max_retries` total attempts; any
    /// other failure propagates unchanged on first occurrence.
    pub async fn execute<T, F, Fut>(&self, mut f: F) -> Result<T, Box<dyn Error + Send + Sync>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Box<dyn Error + Send + Sync>>> + Send,
    {
        let attempts = self.config.max_retries.max(1);
        for attempt in 0..attempts {
            self.check_and_register().await;

            match f().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let retryable = is_rate_limit_error(&err.to_string());
                    if !retryable || attempt + 1 == attempts {
                        return Err(err);
                    }
                    let backoff = self.config.retry_delay * 2u32.pow(attempt);
                    log::warn!(
                        "rate-limited call failed (attempt {}/{}), backing off {:?}: {}",
                        attempt + 1,
                        attempts,
                        backoff,
                        err
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
        unreachable!("loop always returns before exhausting attempts")
    }

    /// Snapshot of the current window occupancy and ceiling.
    pub async fn status(&self) -> RateLimitStatus {
        let mut window = self.timestamps.lock().await;
        Self::purge(&mut window, Instant::now(), self.config.window);
        RateLimitStatus {
            current: window.len(),
            limit: self.config.max_requests,
        }
    }

    /// The retry policy this limiter was configured with.
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    fn purge(window: &mut VecDeque<Instant>, now: Instant, width: Duration) {
        while let Some(front) = window.front() {
            if now.duration_since(*front) >= width {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}
