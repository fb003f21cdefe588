//! Lazy item streams over continuation-token pagination

use super::types::Page;
use crate::error::{Error, Result};
use crate::http::{ApiClient, CallContext, RequestDescriptor};
use crate::types::JsonValue;
use futures::{Stream, TryStreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use tracing::debug;

/// Items of a paginated result set, in server order
pub type ItemStream<'a> = Pin<Box<dyn Stream<Item = Result<JsonValue>> + Send + 'a>>;

/// Producer state: the buffered page and the request for the next one
struct Cursor<'a> {
    client: &'a ApiClient,
    ctx: CallContext,
    next: Option<RequestDescriptor>,
    buffer: VecDeque<JsonValue>,
    pages: u64,
}

impl ApiClient {
    /// Fetch one page.
    ///
    /// When `descriptor` carries a continuation token, a 4xx rejection is
    /// reported as [`Error::ContinuationExpired`] so callers know to restart
    /// from their original filters.
    pub async fn fetch_page(&self, descriptor: &RequestDescriptor, ctx: &CallContext) -> Result<Page> {
        match self.execute_with(descriptor, ctx).await {
            Ok(response) => Page::from_response(response, descriptor.items_path(), self.header_names()),
            Err(Error::Validation {
                status, message, ..
            }) if descriptor.continuation_token().is_some() => Err(Error::ContinuationExpired {
                message: format!("HTTP {status}: {message}"),
            }),
            Err(e) => Err(e),
        }
    }

    /// Stream every item of a paginated result set
    pub fn stream(&self, descriptor: &RequestDescriptor) -> ItemStream<'_> {
        self.stream_with(descriptor, CallContext::default())
    }

    /// Stream every item under a cancellation/deadline context.
    ///
    /// The stream is lazy (pages are fetched as items are consumed), buffers
    /// at most one page, and ends after the first error.
    pub fn stream_with(&self, descriptor: &RequestDescriptor, ctx: CallContext) -> ItemStream<'_> {
        let cursor = Cursor {
            client: self,
            ctx,
            next: Some(descriptor.clone()),
            buffer: VecDeque::new(),
            pages: 0,
        };

        Box::pin(futures::stream::unfold(cursor, |mut cursor| async move {
            loop {
                if let Some(item) = cursor.buffer.pop_front() {
                    return Some((Ok(item), cursor));
                }

                let Some(request) = cursor.next.take() else {
                    return None;
                };
                match cursor.client.fetch_page(&request, &cursor.ctx).await {
                    Ok(page) => {
                        cursor.pages += 1;
                        debug!(
                            endpoint = %request.endpoint(),
                            page = cursor.pages,
                            items = page.items.len(),
                            more = page.continuation.is_some(),
                            "Fetched page"
                        );
                        if page.continuation.is_some() && !request.query().is_empty() {
                            debug!(
                                dropped = ?request.query().keys().collect::<Vec<_>>(),
                                "Dropping query parameters for continuation requests"
                            );
                        }
                        cursor.next = page.continuation.map(|token| request.with_continuation(token));
                        cursor.buffer.extend(page.items);
                    }
                    Err(e) => return Some((Err(e), cursor)),
                }
            }
        }))
    }

    /// Collect every item of a paginated result set
    pub async fn collect_all(&self, descriptor: &RequestDescriptor) -> Result<Vec<JsonValue>> {
        self.stream(descriptor).try_collect().await
    }
}
