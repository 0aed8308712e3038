//! Per-client fixed-window request counter.
//!
//! # Algorithm
//!
//! Each client gets `max_requests` per `window`. The first request after a
//! window has expired opens a new one with `count = 1`; requests inside the
//! window are allowed while `count < max_requests`. Rejected requests are not
//! counted, so `count` never exceeds the ceiling.
//!
//! This is a fixed window, not a sliding one: a client can send
//! `max_requests` at the end of one window and another `max_requests` right
//! after it resets. That burst is accepted behavior.
//!
//! Expired windows are kept until the client returns or [`RateLimiter::cleanup`]
//! runs, which bounds memory for a changing client population.

use std::fmt;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::utils::deadline_after;

/// Error type for rate limiter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// Ceiling cannot be zero.
    ZeroMaxRequests,
    /// Window length cannot be zero.
    ZeroWindow,
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::ZeroMaxRequests => {
                write!(f, "max requests per window must be greater than 0")
            }
            RateLimitError::ZeroWindow => write!(f, "rate limit window must be non-zero"),
        }
    }
}

impl std::error::Error for RateLimitError {}

/// Counter state for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub count: u32,
    pub reset_at: Instant,
}

impl RateWindow {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.reset_at
    }
}

/// Outcome of a single [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time left until the client's window resets.
    pub reset_after: Duration,
}

impl RateDecision {
    /// Seconds a rejected client should wait, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        let millis = self.reset_after.as_millis();
        u64::try_from(millis.div_ceil(1000)).unwrap_or(u64::MAX)
    }
}

pub struct RateLimiter {
    clients: DashMap<String, RateWindow>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window` per client.
    ///
    /// # Errors
    ///
    /// Returns an error if either value is zero.
    pub fn new(window: Duration, max_requests: u32) -> Result<Self, RateLimitError> {
        if max_requests == 0 {
            return Err(RateLimitError::ZeroMaxRequests);
        }
        if window.is_zero() {
            return Err(RateLimitError::ZeroWindow);
        }
        Ok(Self {
            clients: DashMap::new(),
            window,
            max_requests,
        })
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count a request from `client_id` and report whether it may proceed.
    pub fn is_allowed(&self, client_id: &str) -> bool {
        self.check(client_id).allowed
    }

    /// Count a request and return the full decision under one entry lock.
    pub fn check(&self, client_id: &str) -> RateDecision {
        let now = Instant::now();
        let mut window = self
            .clients
            .entry(client_id.to_string())
            .or_insert_with(|| self.fresh_window(now, 0));

        let allowed = if window.is_expired(now) {
            *window = self.fresh_window(now, 1);
            true
        } else if window.count >= self.max_requests {
            false
        } else {
            window.count += 1;
            true
        };

        RateDecision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(window.count),
            reset_after: window.reset_at.saturating_duration_since(now),
        }
    }

    /// Requests left in the client's current window.
    pub fn remaining(&self, client_id: &str) -> u32 {
        match self.current(client_id, Instant::now()) {
            Some(window) => self.max_requests.saturating_sub(window.count),
            None => self.max_requests,
        }
    }

    /// When the client's current window resets, or `now + window` if it has none.
    pub fn reset_at(&self, client_id: &str) -> Instant {
        let now = Instant::now();
        match self.current(client_id, now) {
            Some(window) => window.reset_at,
            None => deadline_after(now, self.window),
        }
    }

    /// Snapshot of the client's window, if it exists and is unexpired.
    pub fn window_for(&self, client_id: &str) -> Option<RateWindow> {
        self.current(client_id, Instant::now())
    }

    /// Drop every expired client window and return how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.clients.len();
        self.clients.retain(|_, window| !window.is_expired(now));
        before.saturating_sub(self.clients.len())
    }

    /// Number of tracked clients, including expired windows not yet purged.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    fn current(&self, client_id: &str, now: Instant) -> Option<RateWindow> {
        self.clients
            .get(client_id)
            .map(|window| *window)
            .filter(|window| !window.is_expired(now))
    }

    fn fresh_window(&self, now: Instant, count: u32) -> RateWindow {
        RateWindow {
            count,
            reset_at: deadline_after(now, self.window),
        }
    }
}
