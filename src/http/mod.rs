//! HTTP client module
//!
//! Provides the API client with retry, rate limiting, and backoff.
//!
//! # Features
//!
//! - **Automatic Retries**: 429, 5xx and network failures, bounded by a ceiling
//! - **Rate Limiting**: org-wide token bucket plus per-endpoint throttling
//!   learned from the server's rate-limit headers
//! - **Backoff**: constant, linear or exponential, with jitter
//! - **Cancellation**: per-call cancellation token and deadline

mod client;
mod context;
mod headers;
mod rate_limit;
mod request;
mod retry;

pub use client::{ApiClient, ApiResponse};
pub use context::CallContext;
pub use headers::{continuation_token, parse_reset, HeaderNames};
pub use rate_limit::{
    RateLimitKey, RateLimitState, RateLimitStore, RateLimiter, RateLimiterConfig,
};
pub use request::{EndpointKey, RequestDescriptor, RequestDescriptorBuilder, ORG_ID_PARAM};
pub use retry::{Decision, RetryConfig, RetryPolicy, RetryState};
