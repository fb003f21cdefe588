//! Batch writes
//!
//! [`crate::ApiClient::batch_write`] splits a sequence of write requests into
//! chunks of at most [`MAX_CHUNK_SIZE`], pauses between chunks to stay under
//! the organization-wide quota, and reports an outcome for every input item:
//! accepted, rejected by the server, or lost with a failed chunk.

mod types;
mod writer;

pub use types::{
    BatchConfig, BatchOptions, BatchReport, ItemOutcome, ItemResult, MAX_CHUNK_SIZE,
};
