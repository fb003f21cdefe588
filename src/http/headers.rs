//! Header contract of the remote API
//!
//! Names are configurable because deployments behind gateways sometimes
//! rename the rate-limit headers.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Values below this are read as "seconds from now" rather than a Unix epoch
const EPOCH_THRESHOLD: i64 = 1_000_000_000;

/// Names of the pagination and rate-limit headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderNames {
    /// Continuation token, both on responses and follow-up requests
    pub continuation: String,
    /// Request quota for the current window
    pub limit: String,
    /// Requests left in the current window
    pub remaining: String,
    /// When the current window resets
    pub reset: String,
    /// Seconds to wait after a 429
    pub retry_after: String,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            continuation: "Continuation-Token".to_string(),
            limit: "X-RateLimit-Limit".to_string(),
            remaining: "X-RateLimit-Remaining".to_string(),
            reset: "X-RateLimit-Reset".to_string(),
            retry_after: "Retry-After".to_string(),
        }
    }
}

/// Read a header as a trimmed, non-empty string
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Read a header as an unsigned integer
pub fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    header_str(headers, name).and_then(|s| s.parse().ok())
}

/// `Retry-After` in whole seconds
pub fn retry_after(headers: &HeaderMap, names: &HeaderNames) -> Option<Duration> {
    header_u64(headers, &names.retry_after).map(Duration::from_secs)
}

/// Continuation token from a response, if any
pub fn continuation_token(headers: &HeaderMap, names: &HeaderNames) -> Option<String> {
    header_str(headers, &names.continuation).map(ToString::to_string)
}

/// Parse a reset header value.
///
/// Accepts Unix epoch seconds, delta seconds (values below 1e9) and RFC 3339.
pub fn parse_reset(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Ok(n) = value.parse::<i64>() {
        if n < 0 {
            return None;
        }
        if n < EPOCH_THRESHOLD {
            return now.checked_add_signed(ChronoDuration::seconds(n));
        }
        return DateTime::from_timestamp(n, 0);
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
