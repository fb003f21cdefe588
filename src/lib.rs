// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # orgpager
//!
//! A resilient client for organization-scoped REST APIs: device registries,
//! packet retrieval, webhook configuration, metrics and billing endpoints
//! that paginate with continuation tokens and enforce rate limits.
//!
//! ## Features
//!
//! - **Typed errors**: 401, 403, 4xx, 429, 5xx and network failures surface as
//!   distinct [`Error`] variants
//! - **Retry with backoff**: transient failures are retried internally up to a
//!   ceiling, honouring `Retry-After`
//! - **Rate-limit awareness**: per-endpoint state learned from response headers
//!   throttles calls before the server has to reject them
//! - **Lazy pagination**: continuation-token result sets as a single `Stream`
//! - **Batch writes**: chunked writes with per-item results
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use orgpager::{ApiClient, ClientConfig, RequestDescriptor, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ClientConfig::from_file("orgpager.yaml")?.with_env();
//!     let client = ApiClient::new(config)?;
//!
//!     let devices = RequestDescriptor::get("/orgs/{org_id}/devices")
//!         .query("status", "active")
//!         .build();
//!
//!     let mut stream = client.stream(&devices);
//!     while let Some(device) = stream.next().await {
//!         println!("{}", device?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  execute(desc)      stream(desc)        batch_write(items)   │
//! └──────────────┬──────────────┬──────────────────┬─────────────┘
//!                │              │ continuation     │ chunks of ≤1000
//! ┌──────────────┴──────────────┴──────────────────┴─────────────┐
//! │ ApiClient: throttle → send → observe headers → decide retry  │
//! ├──────────────┬───────────────┬───────────────┬───────────────┤
//! │ RetryPolicy  │ RateLimiter   │ RateLimitStore│ CallContext   │
//! │ decide()     │ org bucket    │ per endpoint  │ cancel/deadline│
//! └──────────────┴───────────────┴───────────────┴───────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Injectable wall clock
pub mod clock;

/// HTTP client with retry and rate limiting
pub mod http;

/// Continuation-token pagination
pub mod pagination;

/// Chunked batch writes
pub mod batch;

/// Client configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, ErrorKind, Result};
pub use types::*;

pub use batch::{BatchOptions, BatchReport, ItemOutcome, ItemResult};
pub use config::ClientConfig;
pub use http::{ApiClient, ApiResponse, CallContext, RequestDescriptor};
pub use pagination::{ItemStream, Page};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
