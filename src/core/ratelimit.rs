//! Sliding-window request rate limiting for LLM calls.
//!
//! Two instances are composed in series by the adapter: a per-minute window
//! and a per-day window. Timing goes through `tokio::time` so tests can run
//! under a paused clock.

use std::collections::VecDeque;
use std::future::Future;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::core::error::is_rate_limit_failure;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
    /// Total attempts allowed in [RateLimiter::execute], including the first.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RateLimitConfig {
    pub fn per_minute() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_millis(60_000),
            max_retries: 3,
            retry_delay: Duration::from_millis(1_000),
        }
    }

    pub fn per_day() -> Self {
        Self {
            max_requests: 1_000,
            window: Duration::from_millis(86_400_000),
            max_retries: 3,
            retry_delay: Duration::from_millis(1_000),
        }
    }
}

/// Observable window state for status reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct WindowSnapshot {
    pub current: usize,
    pub max_requests: usize,
    pub window_ms: u64,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            window: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until the window has room, then register one request.
    ///
    /// Purges timestamps older than the window; when the remaining count is
    /// at the ceiling, sleeps until the oldest entry expires and re-checks.
    pub async fn check_and_register(&self) {
        loop {
            let wait_until = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                while window
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= self.config.window)
                {
                    window.pop_front();
                }

                if window.len() < self.config.max_requests {
                    window.push_back(now);
                    return;
                }

                match window.front() {
                    Some(oldest) => *oldest + self.config.window,
                    None => return,
                }
            };

            debug!(
                "rate limit window full ({} requests), waiting for a slot",
                self.config.max_requests
            );
            tokio::time::sleep_until(wait_until).await;
        }
    }

    /// Run `f` behind the window. Failures classified as rate limiting are
    /// retried with exponential backoff (`retry_delay * 2^attempt`) up to
    /// `max_retries` total attempts; anything else propagates unchanged.
    pub async fn execute<T, E, F, Fut>(&self, mut f: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;
        loop {
            self.check_and_register().await;
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.config.max_retries || !is_rate_limit_failure(&err.to_string())
                    {
                        return Err(err);
                    }
                    let delay = self.config.retry_delay * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        "rate-limited call failed (attempt {}/{}), retrying in {:?}",
                        attempt, self.config.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    pub async fn status(&self) -> WindowSnapshot {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        while window
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.config.window)
        {
            window.pop_front();
        }
        WindowSnapshot {
            current: window.len(),
            max_requests: self.config.max_requests,
            window_ms: self.config.window.as_millis() as u64,
        }
    }
}
