//! Client configuration
//!
//! A [`ClientConfig`] can be built in code with [`ClientConfig::builder`],
//! loaded from a YAML file, and overridden from the environment:
//!
//! ```yaml
//! base_url: https://api.example.com/v1
//! org_id: org-123
//! timeout_secs: 30
//! retry:
//!   max_attempts: 5
//!   base_delay_ms: 500
//! rate_limit:
//!   requests_per_second: 10
//!   burst_size: 10
//! batch:
//!   chunk_size: 1000
//!   inter_chunk_delay_ms: 250
//! ```
//!
//! The bearer token is normally supplied through `ORGPAGER_TOKEN` rather
//! than the file.

use crate::batch::BatchConfig;
use crate::error::{Error, Result, ResultExt};
use crate::http::{HeaderNames, RateLimiterConfig, RetryConfig};
use crate::types::{OptionStringExt, StringMap};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `base_url`
pub const ENV_BASE_URL: &str = "ORGPAGER_BASE_URL";
/// Environment variable overriding `org_id`
pub const ENV_ORG_ID: &str = "ORGPAGER_ORG_ID";
/// Environment variable overriding `token`
pub const ENV_TOKEN: &str = "ORGPAGER_TOKEN";

/// Everything needed to construct an [`crate::ApiClient`]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root, e.g. `https://api.example.com/v1`
    pub base_url: String,
    /// Organization every scoped path is partitioned under
    pub org_id: String,
    /// Bearer token attached to every call
    #[serde(skip_serializing)]
    pub token: String,
    /// Per-attempt timeout
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Headers sent with every request
    pub headers: StringMap,
    pub retry: RetryConfig,
    /// Client-side token bucket; `None` disables it
    pub rate_limit: Option<RateLimiterConfig>,
    pub header_names: HeaderNames,
    pub batch: BatchConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            org_id: String::new(),
            token: String::new(),
            timeout_secs: 30,
            user_agent: format!("orgpager/{}", env!("CARGO_PKG_VERSION")),
            headers: StringMap::new(),
            retry: RetryConfig::default(),
            rate_limit: Some(RateLimiterConfig::default()),
            header_names: HeaderNames::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("org_id", &self.org_id)
            .field("token", &redact(&self.token))
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("retry", &self.retry)
            .field("rate_limit", &self.rate_limit)
            .field("header_names", &self.header_names)
            .field("batch", &self.batch)
            .finish()
    }
}

fn redact(token: &str) -> &'static str {
    if token.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml_str(&contents)
    }

    /// Apply `ORGPAGER_*` environment overrides
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).none_if_empty() {
            self.base_url = url;
        }
        if let Some(org) = lookup(ENV_ORG_ID).none_if_empty() {
            self.org_id = org;
        }
        if let Some(token) = lookup(ENV_TOKEN).none_if_empty() {
            self.token = token;
        }
        self
    }

    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check that the config can drive a client
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::missing_field("base_url"));
        }
        if url::Url::parse(&self.base_url)?.cannot_be_a_base() {
            return Err(Error::invalid_value("base_url", "must be an http(s) URL"));
        }
        if self.org_id.trim().is_empty() {
            return Err(Error::missing_field("org_id"));
        }
        if self.token.trim().is_empty() {
            return Err(Error::missing_field("token"));
        }
        if self.timeout_secs == 0 {
            return Err(Error::invalid_value("timeout_secs", "must be greater than zero"));
        }
        if self
            .headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("authorization"))
        {
            return Err(Error::invalid_value(
                "headers",
                "Authorization is set from token and cannot be a default header",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::invalid_value("retry.max_attempts", "must be at least 1"));
        }
        self.batch.validate()?;
        Ok(())
    }

    /// YAML rendering with the token left out
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Builder for client config
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the organization id
    pub fn org_id(mut self, org_id: impl Into<String>) -> Self {
        self.config.org_id = org_id.into();
        self
    }

    /// Set the bearer token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = token.into();
        self
    }

    /// Set the per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set retry settings
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set max attempts
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(key.into(), value.into());
        self
    }

    /// Override header names
    pub fn header_names(mut self, names: HeaderNames) -> Self {
        self.config.header_names = names;
        self
    }

    /// Set batch defaults
    pub fn batch(mut self, batch: BatchConfig) -> Self {
        self.config.batch = batch;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BackoffType, Jitter};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    const YAML: &str = r"
base_url: https://api.example.com/v1
org_id: org-123
timeout_secs: 10
headers:
  X-Client: tests
retry:
  max_attempts: 3
  base_delay_ms: 50
  backoff: linear
  jitter: none
rate_limit:
  requests_per_second: 5
  burst_size: 2
header_names:
  continuation: X-Next-Page
batch:
  chunk_size: 200
";

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.rate_limit, Some(RateLimiterConfig::default()));
        assert_eq!(config.header_names.continuation, "Continuation-Token");
        assert_eq!(config.batch.chunk_size, 1000);
        assert!(config.user_agent.starts_with("orgpager/"));
    }

    #[test]
    fn test_from_yaml() {
        let config = ClientConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.base_url, "https://api.example.com/v1");
        assert_eq!(config.org_id, "org-123");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.headers.get("X-Client"), Some(&"tests".to_string()));
        assert_eq!(
            config.retry,
            RetryConfig {
                max_attempts: 3,
                base_delay_ms: 50,
                backoff: BackoffType::Linear,
                jitter: Jitter::None,
                ..RetryConfig::default()
            }
        );
        assert_eq!(config.rate_limit, Some(RateLimiterConfig::new(5, 2)));
        assert_eq!(config.header_names.continuation, "X-Next-Page");
        assert_eq!(config.header_names.retry_after, "Retry-After");
        assert_eq!(config.batch.chunk_size, 200);
        assert_eq!(config.batch.items_field, "items");
        assert!(config.token.is_empty());
    }

    #[test]
    fn test_rate_limit_can_be_disabled() {
        let config = ClientConfig::from_yaml_str("rate_limit: null").unwrap();
        assert!(config.rate_limit.is_none());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.org_id, "org-123");

        let missing = ClientConfig::from_file("/definitely/not/here.yaml");
        assert!(matches!(missing, Err(Error::Config { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_TOKEN, "secret"),
            (ENV_ORG_ID, "org-override"),
            (ENV_BASE_URL, ""),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::from_yaml_str(YAML)
            .unwrap()
            .with_overrides(|name| vars.get(name).map(ToString::to_string));

        assert_eq!(config.token, "secret");
        assert_eq!(config.org_id, "org-override");
        // Empty values do not override
        assert_eq!(config.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn test_validate() {
        let valid = ClientConfig::builder()
            .base_url("https://api.example.com")
            .org_id("org-1")
            .token("t")
            .build();
        assert!(valid.validate().is_ok());

        let no_token = ClientConfig::builder()
            .base_url("https://api.example.com")
            .org_id("org-1")
            .build();
        assert!(matches!(
            no_token.validate(),
            Err(Error::MissingConfigField { ref field }) if field == "token"
        ));

        let bad_url = ClientConfig::builder()
            .base_url("not a url")
            .org_id("org-1")
            .token("t")
            .build();
        assert!(matches!(bad_url.validate(), Err(Error::InvalidUrl(_))));

        let zero_attempts = ClientConfig::builder()
            .base_url("https://api.example.com")
            .org_id("org-1")
            .token("t")
            .max_attempts(0)
            .build();
        assert!(matches!(
            zero_attempts.validate(),
            Err(Error::InvalidConfigValue { .. })
        ));
    
        let opaque_url = ClientConfig::builder()
            .base_url("mailto:ops@example.com")
            .org_id("org-1")
            .token("t")
            .build();
        assert!(matches!(
            opaque_url.validate(),
            Err(Error::InvalidConfigValue { ref field, .. }) if field == "base_url"
        ));
    }

    #[test]
    fn test_authorization_default_header_rejected() {
        let config = ClientConfig::builder()
            .base_url("https://api.example.com")
            .org_id("org-1")
            .token("t")
            .header("authorization", "Basic c3RvbGVu")
            .build();
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfigValue { ref field, .. }) if field == "headers"
        ));

        let config = ClientConfig::builder()
            .base_url("https://api.example.com")
            .org_id("org-1")
            .token("t")
            .header("X-Request-Source", "orgpager")
            .build();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_token_never_rendered() {
        let config = ClientConfig::builder()
            .base_url("https://api.example.com")
            .org_id("org-1")
            .token("super-secret")
            .build();

        assert!(!format!("{config:?}").contains("super-secret"));
        assert!(!config.to_yaml().unwrap().contains("super-secret"));
    }
}
