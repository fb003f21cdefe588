//! Chunked batch writes with per-item results

use super::types::{BatchOptions, BatchReport, ItemOutcome, ItemResult};
use crate::error::{error_details, Error, Result};
use crate::http::{ApiClient, CallContext, RequestDescriptor};
use crate::types::{JsonObject, JsonValue};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl ApiClient {
    /// Write `items` in chunks using the client's batch defaults
    pub async fn batch_write(
        &self,
        descriptor: &RequestDescriptor,
        items: Vec<JsonValue>,
    ) -> Result<BatchReport> {
        let options = self.batch_defaults().clone();
        self.batch_write_with(descriptor, items, &options, &CallContext::default())
            .await
    }

    /// Write `items` in chunks.
    ///
    /// Each chunk is one logical call with body `{ <items_field>: [...] }`.
    /// A chunk that fails after retries marks all of its items
    /// [`ItemOutcome::ChunkFailed`] and the write moves on to the next chunk.
    /// Only cancellation aborts the whole operation.
    pub async fn batch_write_with(
        &self,
        descriptor: &RequestDescriptor,
        items: Vec<JsonValue>,
        options: &BatchOptions,
        ctx: &CallContext,
    ) -> Result<BatchReport> {
        let chunk_size = options.effective_chunk_size()?;
        let total = items.len();
        let mut report = BatchReport {
            results: Vec::with_capacity(total),
            chunks: 0,
        };

        for (chunk_index, chunk) in items.chunks(chunk_size).enumerate() {
            if chunk_index > 0 && !options.inter_chunk_delay.is_zero() {
                ctx.sleep(options.inter_chunk_delay).await?;
            }

            let offset = chunk_index * chunk_size;
            let mut body = JsonObject::new();
            body.insert(options.items_field.clone(), JsonValue::Array(chunk.to_vec()));
            let request = descriptor.with_body(JsonValue::Object(body));

            report.chunks += 1;
            match self.execute_with(&request, ctx).await {
                Ok(response) => {
                    let outcomes = chunk_outcomes(&response.body, chunk.len(), &options.results_field);
                    debug!(
                        chunk = chunk_index,
                        items = chunk.len(),
                        rejected = outcomes.iter().filter(|o| !o.is_success()).count(),
                        "Chunk written"
                    );
                    report.results.extend(
                        outcomes
                            .into_iter()
                            .enumerate()
                            .map(|(i, outcome)| ItemResult {
                                index: offset + i,
                                outcome,
                            }),
                    );
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(chunk = chunk_index, items = chunk.len(), error = %e, "Chunk failed");
                    let error = Arc::new(e);
                    report.results.extend((0..chunk.len()).map(|i| ItemResult {
                        index: offset + i,
                        outcome: ItemOutcome::ChunkFailed {
                            chunk: chunk_index,
                            error: Arc::clone(&error),
                        },
                    }));
                }
            }
        }

        info!(
            items = total,
            chunks = report.chunks,
            succeeded = report.succeeded(),
            rejected = report.rejected(),
            chunk_failed = report.chunk_failed(),
            "Batch write finished"
        );
        Ok(report)
    }
}

/// Map a chunk response to one outcome per item.
///
/// Uses the per-item array (root array or `results_field`) when it has one
/// entry per item; otherwise the whole chunk counts as accepted.
fn chunk_outcomes(body: &JsonValue, len: usize, results_field: &str) -> Vec<ItemOutcome> {
    let entries = match body {
        JsonValue::Array(entries) => Some(entries),
        JsonValue::Object(map) => map.get(results_field).and_then(JsonValue::as_array),
        _ => None,
    };

    match entries {
        Some(entries) if entries.len() == len => entries.iter().map(item_outcome).collect(),
        Some(entries) => {
            warn!(
                expected = len,
                received = entries.len(),
                "Per-item results do not match chunk size, treating chunk as accepted"
            );
            vec![ItemOutcome::Succeeded(JsonValue::Null); len]
        }
        None => vec![ItemOutcome::Succeeded(JsonValue::Null); len],
    }
}

fn item_outcome(entry: &JsonValue) -> ItemOutcome {
    let has_error = entry.get("error").is_some_and(|e| !e.is_null());
    let failed_status = entry
        .get("status")
        .and_then(JsonValue::as_str)
        .is_some_and(|s| matches!(s, "error" | "failed" | "rejected"));
    let failed_flag = entry.get("success").and_then(JsonValue::as_bool) == Some(false);

    if has_error || failed_status || failed_flag {
        let (code, message) = error_details(entry);
        ItemOutcome::Rejected {
            code,
            message: message.unwrap_or_else(|| "rejected by server".to_string()),
        }
    } else {
        ItemOutcome::Succeeded(entry.clone())
    }
}

#[cfg(test)]
mod outcome_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_outcome_shapes() {
        assert!(item_outcome(&json!({"id": "d1"})).is_success());
        assert!(item_outcome(&json!({"id": "d1", "error": null})).is_success());

        match item_outcome(&json!({"id": "d2", "error": {"code": "bad_tag", "message": "Unknown tag"}})) {
            ItemOutcome::Rejected { code, message } => {
                assert_eq!(code.as_deref(), Some("bad_tag"));
                assert_eq!(message, "Unknown tag");
            }
            other => panic!("Expected Rejected, got {other:?}"),
        }

        match item_outcome(&json!({"status": "failed"})) {
            ItemOutcome::Rejected { message, .. } => assert_eq!(message, "rejected by server"),
            other => panic!("Expected Rejected, got {other:?}"),
        }

        assert!(!item_outcome(&json!({"success": false, "message": "nope"})).is_success());
    }

    #[test]
    fn test_chunk_outcomes_fallbacks() {
        let outcomes = chunk_outcomes(&JsonValue::Null, 3, "results");
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(ItemOutcome::is_success));

        // Mismatched length is treated as accepted
        let outcomes = chunk_outcomes(&json!({"results": [{"error": "x"}]}), 2, "results");
        assert!(outcomes.iter().all(ItemOutcome::is_success));

        let outcomes = chunk_outcomes(&json!([{"ok": 1}, {"error": "dup"}]), 2, "results");
        assert!(outcomes[0].is_success());
        assert!(!outcomes[1].is_success());
    }
}
