//! Pagination module
//!
//! The remote API paginates with an opaque continuation token:
//!
//! - a response carries the token in a header when more pages exist
//! - the next request sends that same header and no other query parameters
//! - a response without the header is the last page
//!
//! [`crate::ApiClient::stream`] hides all of this behind a lazy stream of
//! items; page boundaries are not observable to the consumer.

mod stream;
mod types;

pub use stream::ItemStream;
pub use types::{extract_items, Page, DEFAULT_ITEMS_PATH};
