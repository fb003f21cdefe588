//! Error types for orgpager
//!
//! Every public API returns `Result<T, Error>`. Remote failures are mapped to
//! distinguishable variants so callers can branch on the kind of failure
//! rather than on raw status codes.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// The main error type for orgpager
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Missing path parameter '{name}' for '{template}'")]
    MissingPathParam { name: String, template: String },

    #[error("Path parameters render an invalid segment '{segment}' for '{template}'")]
    InvalidPathSegment { segment: String, template: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Remote API Errors
    // ============================================================================
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Not authorized: {message}")]
    Authorization { message: String },

    #[error("HTTP {status}: {message}")]
    Validation {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Rate limit exceeded{}", fmt_retry_after(.retry_after_seconds))]
    RateLimitExceeded { retry_after_seconds: Option<u64> },

    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Continuation token rejected: {message}")]
    ContinuationExpired { message: String },

    // ============================================================================
    // Transport Errors
    // ============================================================================
    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    // ============================================================================
    // Data Errors
    // ============================================================================
    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

fn fmt_retry_after(seconds: &Option<u64>) -> String {
    match seconds {
        Some(s) => format!(", retry after {s}s"),
        None => String::new(),
    }
}

/// Coarse classification of an [`Error`], used by the retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 401: the credential is missing, malformed or expired
    Authentication,
    /// 403: the credential lacks the required scope
    Authorization,
    /// Other 4xx: the request itself is wrong
    Validation,
    /// 429
    RateLimited,
    /// 5xx
    Server,
    /// Network-level failure (connect, reset, timeout)
    Transport,
    /// A continuation token was rejected by the server
    ContinuationExpired,
    /// Caller-triggered abandonment or deadline expiry
    Cancelled,
    /// Local failure: configuration, decoding, I/O
    Local,
}

impl ErrorKind {
    /// Whether the retry policy may retry a failure of this kind
    pub fn is_transient(self) -> bool {
        matches!(self, Self::RateLimited | Self::Server | Self::Transport)
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Build the error for a non-success HTTP response.
    ///
    /// The body is parsed opportunistically; an absent or malformed body
    /// falls back to the canonical reason phrase of the status.
    pub fn from_status(status: u16, body: &str, retry_after_seconds: Option<u64>) -> Self {
        let (code, message) = parse_error_body(body);
        let message = message.unwrap_or_else(|| fallback_message(status));

        match status {
            401 => Self::Authentication { message },
            403 => Self::Authorization { message },
            429 => Self::RateLimitExceeded {
                retry_after_seconds,
            },
            500..=599 => Self::Server { status, message },
            _ => Self::Validation {
                status,
                code,
                message,
            },
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authentication { .. } => ErrorKind::Authentication,
            Error::Authorization { .. } => ErrorKind::Authorization,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::RateLimitExceeded { .. } => ErrorKind::RateLimited,
            Error::Server { .. } => ErrorKind::Server,
            Error::ContinuationExpired { .. } => ErrorKind::ContinuationExpired,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Timeout { .. } => ErrorKind::Transport,
            Error::Transport(e) if e.is_builder() || e.is_redirect() => ErrorKind::Local,
            Error::Transport(_) => ErrorKind::Transport,
            _ => ErrorKind::Local,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        self.kind().is_transient()
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Authentication { .. } => Some(401),
            Error::Authorization { .. } => Some(403),
            Error::RateLimitExceeded { .. } => Some(429),
            Error::Validation { status, .. } | Error::Server { status, .. } => Some(*status),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Extract `(code, message)` from a structured error body.
///
/// Accepted shapes: `{"error": {"code", "message"}}`, `{"code", "message"}`
/// and `{"error": "message"}`.
fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => error_details(&value),
        Err(_) => (None, None),
    }
}

/// Extract `(code, message)` from a parsed error object
pub(crate) fn error_details(value: &Value) -> (Option<String>, Option<String>) {
    let scalar = |v: Option<&Value>| -> Option<String> {
        match v? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };

    match value.get("error") {
        Some(Value::Object(inner)) => (
            scalar(inner.get("code")),
            scalar(inner.get("message")).or_else(|| scalar(inner.get("description"))),
        ),
        Some(Value::String(s)) if !s.is_empty() => {
            (scalar(value.get("code")), Some(s.clone()))
        }
        _ => (scalar(value.get("code")), scalar(value.get("message"))),
    }
}

fn fallback_message(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map_or_else(|| format!("HTTP status {status}"), ToString::to_string)
}

/// Result type alias for orgpager
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
