//! Batch write types

use crate::error::{Error, Result};
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Largest chunk the remote service accepts in one request
pub const MAX_CHUNK_SIZE: usize = 1000;

/// Serializable batch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Items per request, at most [`MAX_CHUNK_SIZE`]
    pub chunk_size: usize,
    /// Pause between consecutive chunks
    pub inter_chunk_delay_ms: u64,
    /// Request body field holding the chunk
    pub items_field: String,
    /// Response body field holding per-item results
    pub results_field: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: MAX_CHUNK_SIZE,
            inter_chunk_delay_ms: 250,
            items_field: "items".to_string(),
            results_field: "results".to_string(),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::invalid_value("batch.chunk_size", "must be greater than zero"));
        }
        if self.items_field.is_empty() {
            return Err(Error::invalid_value("batch.items_field", "must not be empty"));
        }
        Ok(())
    }
}

/// Options for one batch write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub chunk_size: usize,
    pub inter_chunk_delay: Duration,
    pub items_field: String,
    pub results_field: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from(&BatchConfig::default())
    }
}

impl From<&BatchConfig> for BatchOptions {
    fn from(config: &BatchConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            inter_chunk_delay: Duration::from_millis(config.inter_chunk_delay_ms),
            items_field: config.items_field.clone(),
            results_field: config.results_field.clone(),
        }
    }
}

impl BatchOptions {
    /// Set the chunk size
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set the pause between chunks
    #[must_use]
    pub fn inter_chunk_delay(mut self, delay: Duration) -> Self {
        self.inter_chunk_delay = delay;
        self
    }

    /// Chunk size clamped to [`MAX_CHUNK_SIZE`]; zero is rejected
    pub fn effective_chunk_size(&self) -> Result<usize> {
        if self.chunk_size == 0 {
            return Err(Error::invalid_value("chunk_size", "must be greater than zero"));
        }
        Ok(self.chunk_size.min(MAX_CHUNK_SIZE))
    }
}

/// What happened to one input item
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    /// Accepted by the server; carries the server's per-item entry (or `Null`)
    Succeeded(JsonValue),
    /// The server processed the chunk but rejected this item
    Rejected {
        code: Option<String>,
        message: String,
    },
    /// The request for the whole chunk failed; shared by every item in it
    ChunkFailed { chunk: usize, error: Arc<Error> },
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Outcome for the input item at `index`
#[derive(Debug, Clone)]
pub struct ItemResult {
    /// Position in the input sequence
    pub index: usize,
    pub outcome: ItemOutcome,
}

/// Aggregate result of a batch write, ordered like the input
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub(crate) results: Vec<ItemResult>,
    pub(crate) chunks: usize,
}

impl BatchReport {
    /// Per-item results in input order
    pub fn results(&self) -> &[ItemResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ItemResult> {
        self.results
    }

    /// Number of chunk requests attempted
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Succeeded(_)))
    }

    pub fn rejected(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Rejected { .. }))
    }

    pub fn chunk_failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::ChunkFailed { .. }))
    }

    /// True when every item succeeded
    pub fn is_complete_success(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_success())
    }

    /// Results that did not succeed
    pub fn failures(&self) -> impl Iterator<Item = &ItemResult> {
        self.results.iter().filter(|r| !r.outcome.is_success())
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}
