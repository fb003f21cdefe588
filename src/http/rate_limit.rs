//! Rate limiting
//!
//! Two layers keep the client under the remote quotas:
//!
//! - [`RateLimiter`]: an organization-wide token bucket (governor) applied to
//!   every outbound call.
//! - [`RateLimitStore`]: per-endpoint state learned from the server's
//!   rate-limit headers, used to delay calls pre-emptively instead of
//!   waiting to be rejected with a 429.

use super::headers::{header_str, header_u64, parse_reset, retry_after, HeaderNames};
use super::request::EndpointKey;
use crate::clock::{SharedClock, SystemClock};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

// ============================================================================
// Organization-wide token bucket
// ============================================================================

/// Configuration for the client-side token bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Maximum number of requests per second
    pub requests_per_second: u32,
    /// Burst size (max tokens in bucket)
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst_size: 10,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }
}

/// Token bucket rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rps).allow_burst(burst);

        Self {
            limiter: Arc::new(Governor::direct(quota)),
        }
    }

    /// Wait until a request can be made
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Try to acquire a permit, returning immediately
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}

// ============================================================================
// Per-endpoint state
// ============================================================================

/// Key of one rate-limit partition: organization plus endpoint identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub org_id: String,
    pub endpoint: EndpointKey,
}

impl RateLimitKey {
    pub fn new(org_id: impl Into<String>, endpoint: EndpointKey) -> Self {
        Self {
            org_id: org_id.into(),
            endpoint,
        }
    }
}

/// What the server last told us about one partition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitState {
    /// Quota for the current window
    pub limit: Option<u64>,
    /// Requests left in the current window
    pub remaining: Option<u64>,
    /// When the window resets
    pub reset_at: Option<DateTime<Utc>>,
    /// No calls before this instant (set by a 429)
    pub blocked_until: Option<DateTime<Utc>>,
}

impl RateLimitState {
    /// Update from one response's headers. Absent headers leave fields as-is.
    pub fn observe(
        &mut self,
        headers: &HeaderMap,
        names: &HeaderNames,
        status: u16,
        now: DateTime<Utc>,
    ) {
        if let Some(limit) = header_u64(headers, &names.limit) {
            self.limit = Some(limit);
        }
        if let Some(remaining) = header_u64(headers, &names.remaining) {
            self.remaining = Some(remaining);
        }
        if let Some(reset) = header_str(headers, &names.reset).and_then(|v| parse_reset(v, now)) {
            self.reset_at = Some(reset);
        }
        if status == 429 {
            if let Some(wait) = retry_after(headers, names) {
                // Saturates: an absurd hint blocks "forever" rather than overflowing
                let until = ChronoDuration::from_std(wait)
                    .ok()
                    .and_then(|wait| now.checked_add_signed(wait))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                self.blocked_until = Some(until);
            }
        }
    }

    /// How long a caller should wait before the next call, if at all
    pub fn delay_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        let mut until = self.blocked_until.filter(|b| *b > now);

        if self.remaining == Some(0) {
            if let Some(reset) = self.reset_at.filter(|r| *r > now) {
                until = Some(until.map_or(reset, |u| u.max(reset)));
            }
        }

        until.and_then(|u| (u - now).to_std().ok())
    }
}

/// Synchronized per-endpoint rate-limit state.
///
/// Entries are created lazily on first use and live for the lifetime of the
/// store. Each entry has its own lock, held only while reading or updating
/// counters.
#[derive(Debug)]
pub struct RateLimitStore {
    clock: SharedClock,
    entries: RwLock<HashMap<RateLimitKey, Arc<Mutex<RateLimitState>>>>,
}

impl Default for RateLimitStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl RateLimitStore {
    /// Create a store reading time from `clock`
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn entry(&self, key: &RateLimitKey) -> Arc<Mutex<RateLimitState>> {
        if let Some(entry) = self.entries.read().await.get(key) {
            return Arc::clone(entry);
        }
        let mut entries = self.entries.write().await;
        Arc::clone(entries.entry(key.clone()).or_default())
    }

    /// Record the rate-limit headers of a response
    pub async fn observe(&self, key: &RateLimitKey, headers: &HeaderMap, names: &HeaderNames, status: u16) {
        let entry = self.entry(key).await;
        let mut state = entry.lock().await;
        state.observe(headers, names, status, self.clock.now());
        debug!(
            endpoint = %key.endpoint,
            limit = ?state.limit,
            remaining = ?state.remaining,
            "Rate limit state updated"
        );
    }

    /// Pre-emptive delay before calling `key`, if the last response asked for one
    pub async fn delay_for(&self, key: &RateLimitKey) -> Option<Duration> {
        let entry = self.entries.read().await.get(key).map(Arc::clone)?;
        let state = entry.lock().await;
        state.delay_at(self.clock.now())
    }

    /// Copy of the current state for `key`
    pub async fn snapshot(&self, key: &RateLimitKey) -> Option<RateLimitState> {
        let entry = self.entries.read().await.get(key).map(Arc::clone)?;
        let state = entry.lock().await;
        Some(state.clone())
    }

    /// Number of partitions seen so far
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
