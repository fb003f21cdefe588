//! API client with retry and rate limiting
//!
//! [`ApiClient::execute`] performs one logical call:
//! - waits on the org-wide token bucket and any per-endpoint throttle
//! - sends the request with the bearer token attached
//! - records the server's rate-limit headers
//! - classifies failures and retries transient ones per the [`RetryPolicy`]

use super::context::CallContext;
use super::headers::{self, HeaderNames};
use super::rate_limit::{RateLimitKey, RateLimitStore, RateLimiter};
use super::request::{push_segments, RequestDescriptor};
use super::retry::{Decision, RetryPolicy, RetryState};
use crate::batch::BatchOptions;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::{JsonValue, StringMap};
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Successful response of one logical call
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status (always 2xx)
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Parsed JSON body, `Null` when the body was empty
    pub body: JsonValue,
}

impl ApiResponse {
    /// Read a header as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        headers::header_str(&self.headers, name)
    }

    /// Deserialize the body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// A failed attempt plus the server's retry hint
struct Failure {
    error: Error,
    retry_after: Option<Duration>,
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// Client for an organization-scoped REST API
pub struct ApiClient {
    client: Client,
    base_url: Url,
    org_id: String,
    token: String,
    timeout: Duration,
    default_headers: StringMap,
    header_names: HeaderNames,
    retry: RetryPolicy,
    limiter: Option<RateLimiter>,
    rate_limits: Arc<RateLimitStore>,
    batch: BatchOptions,
}

impl ApiClient {
    /// Create a client with its own rate-limit store
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(RateLimitStore::default()))
    }

    /// Create a client sharing an existing rate-limit store
    pub fn with_store(config: ClientConfig, rate_limits: Arc<RateLimitStore>) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(&config.base_url)?,
            limiter: config.rate_limit.as_ref().map(RateLimiter::new),
            retry: RetryPolicy::from(&config.retry),
            batch: BatchOptions::from(&config.batch),
            timeout: config.timeout(),
            org_id: config.org_id,
            token: config.token,
            default_headers: config.headers,
            header_names: config.header_names,
            rate_limits,
        })
    }

    /// Organization this client is scoped to
    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    pub fn header_names(&self) -> &HeaderNames {
        &self.header_names
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Batch settings taken from the client config
    pub fn batch_defaults(&self) -> &BatchOptions {
        &self.batch
    }

    /// Per-endpoint rate-limit state
    pub fn rate_limits(&self) -> &RateLimitStore {
        &self.rate_limits
    }

    /// Check if client-side rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.limiter.is_some()
    }

    /// Rate-limit partition for a request
    pub fn rate_limit_key(&self, descriptor: &RequestDescriptor) -> RateLimitKey {
        RateLimitKey::new(self.org_id.clone(), descriptor.endpoint())
    }

    /// Perform one logical call, retrying transient failures
    pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<ApiResponse> {
        self.execute_with(descriptor, &CallContext::default()).await
    }

    /// Perform one logical call under a cancellation/deadline context
    pub async fn execute_with(
        &self,
        descriptor: &RequestDescriptor,
        ctx: &CallContext,
    ) -> Result<ApiResponse> {
        let url = self.build_url(descriptor)?;
        let key = self.rate_limit_key(descriptor);
        let mut state = RetryState::new();

        loop {
            self.throttle(&key, ctx).await?;

            let attempt = state.begin_attempt();
            let failure = match ctx.guard(self.attempt(descriptor, &url, &key)).await? {
                Ok(response) => {
                    debug!(
                        endpoint = %key.endpoint,
                        status = response.status,
                        attempt,
                        "Request succeeded"
                    );
                    return Ok(response);
                }
                Err(failure) => failure,
            };

            match state.on_failure(&self.retry, failure.error.kind(), failure.retry_after) {
                Decision::Retry(delay) => {
                    warn!(
                        endpoint = %key.endpoint,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        ?delay,
                        error = %failure.error,
                        "Request failed, retrying"
                    );
                    ctx.sleep(delay).await?;
                }
                Decision::Fail => {
                    debug!(
                        endpoint = %key.endpoint,
                        attempt,
                        error = %failure.error,
                        "Request failed"
                    );
                    return Err(failure.error);
                }
            }
        }
    }

    /// Wait for the token bucket and any server-requested pause
    async fn throttle(&self, key: &RateLimitKey, ctx: &CallContext) -> Result<()> {
        if let Some(ref limiter) = self.limiter {
            ctx.guard(limiter.wait()).await?;
        }

        if let Some(delay) = self.rate_limits.delay_for(key).await {
            let delay = delay.min(self.retry.max_retry_after);
            debug!(endpoint = %key.endpoint, ?delay, "Throttling before request");
            ctx.sleep(delay).await?;
        }
        Ok(())
    }

    /// One HTTP exchange, no retries
    async fn attempt(
        &self,
        descriptor: &RequestDescriptor,
        url: &Url,
        key: &RateLimitKey,
    ) -> std::result::Result<ApiResponse, Failure> {
        let response = self
            .build_request(descriptor, url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        self.rate_limits
            .observe(key, &headers, &self.header_names, status)
            .await;

        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if (200..300).contains(&status) {
            if !descriptor.accepts(status) {
                return Err(Error::Validation {
                    status,
                    code: None,
                    message: format!(
                        "unexpected status {status}, expected one of {:?}",
                        descriptor.expected_status()
                    ),
                }
                .into());
            }

            let body = if text.trim().is_empty() {
                JsonValue::Null
            } else {
                serde_json::from_str(&text)
                    .map_err(|e| Error::decode(format!("invalid JSON body: {e}")))?
            };
            return Ok(ApiResponse {
                status,
                headers,
                body,
            });
        }

        let retry_after = headers::retry_after(&headers, &self.header_names);
        Err(Failure {
            error: Error::from_status(status, &text, retry_after.map(|d| d.as_secs())),
            retry_after,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> Failure {
        let error = if e.is_timeout() {
            Error::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            Error::Transport(e)
        };
        error.into()
    }

    fn build_request(&self, descriptor: &RequestDescriptor, url: &Url) -> RequestBuilder {
        let mut req = self
            .client
            .request(descriptor.method().into(), url.clone())
            .bearer_auth(&self.token)
            .timeout(self.timeout);

        // The configured token is the only credential ever sent
        for (key, value) in self.default_headers.iter().chain(descriptor.headers()) {
            if key.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
                warn!(endpoint = %descriptor.endpoint(), "Ignoring Authorization header override");
                continue;
            }
            req = req.header(key.as_str(), value.as_str());
        }

        if let Some(token) = descriptor.continuation_token() {
            req = req.header(self.header_names.continuation.as_str(), token);
        } else if !descriptor.query().is_empty() {
            req = req.query(descriptor.query());
        }

        if let Some(body) = descriptor.body() {
            req = req.json(body);
        }
        req
    }

    /// Append the rendered path to the base URL, one segment per template segment
    fn build_url(&self, descriptor: &RequestDescriptor) -> Result<Url> {
        let segments = descriptor.render_segments(&self.org_id)?;
        let mut url = self.base_url.clone();
        push_segments(&mut url, &segments)?;
        Ok(url)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("org_id", &self.org_id)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("has_rate_limiter", &self.limiter.is_some())
            .finish_non_exhaustive()
    }
}
