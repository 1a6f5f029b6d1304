//! Request throttling
//!
//! Handlers talk to a [`RateLimitStore`] so the counter backend can be swapped:
//! [`InProcessRateLimiter`] for a single instance, a shared cache behind the same
//! trait when the service is scaled out.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// Verdict for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_ms: u64 },
}

/// Sliding-window counter keyed by caller
pub trait RateLimitStore: Send + Sync {
    /// Count a request for `key` at `now` and decide whether it may proceed
    fn check(&self, key: &str, now: u64) -> RateDecision;
}

/// Per-process sliding window
#[derive(Debug)]
pub struct InProcessRateLimiter {
    max_requests: u32,
    window_ms: u64,
    max_tracked_keys: usize,
    hits: Mutex<HashMap<String, VecDeque<u64>>>,
}

impl InProcessRateLimiter {
    pub fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
            max_tracked_keys: 10_000,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Bound on distinct keys kept in memory
    pub fn with_max_tracked_keys(mut self, max: usize) -> Self {
        self.max_tracked_keys = max;
        self
    }

    fn cleanup(hits: &mut HashMap<String, VecDeque<u64>>, cutoff: u64) {
        hits.retain(|_, times| {
            while times.front().map_or(false, |&t| t <= cutoff) {
                times.pop_front();
            }
            !times.is_empty()
        });
    }
}

impl RateLimitStore for InProcessRateLimiter {
    fn check(&self, key: &str, now: u64) -> RateDecision {
        let cutoff = now.saturating_sub(self.window_ms);
        let mut hits = self.hits.lock();

        if !hits.contains_key(key) && hits.len() >= self.max_tracked_keys {
            debug!(tracked = hits.len(), "rate limiter at key cap, cleaning up");
            Self::cleanup(&mut hits, cutoff);
            if hits.len() >= self.max_tracked_keys {
                warn!(key, "rate limiter key cap reached");
                return RateDecision::Limited {
                    retry_after_ms: self.window_ms,
                };
            }
        }

        let times = hits.entry(key.to_string()).or_default();
        while times.front().map_or(false, |&t| t <= cutoff) {
            times.pop_front();
        }
        if times.len() >= self.max_requests as usize {
            let oldest = times.front().copied().unwrap_or(now);
            let retry_after_ms = (oldest + self.window_ms).saturating_sub(now);
            warn!(key, requests = times.len(), max = self.max_requests, "rate limit exceeded");
            return RateDecision::Limited { retry_after_ms };
        }
        times.push_back(now);
        RateDecision::Allowed {
            remaining: self.max_requests - times.len() as u32,
        }
    }
}
