//! Page types
//!
//! A page is the item array of one response plus the continuation token the
//! server sent with it.

use crate::error::{Error, Result};
use crate::http::{ApiResponse, HeaderNames};
use crate::types::JsonValue;
use reqwest::header::HeaderMap;

/// Field holding the items when the descriptor names none
pub const DEFAULT_ITEMS_PATH: &str = "data";

/// One page of a paginated result set
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Items in server order
    pub items: Vec<JsonValue>,
    /// Opaque token for the next page; `None` on the last page
    pub continuation: Option<String>,
}

impl Page {
    /// Build a page from response parts
    pub fn from_parts(
        body: JsonValue,
        headers: &HeaderMap,
        items_path: Option<&str>,
        names: &HeaderNames,
    ) -> Result<Self> {
        Ok(Self {
            items: extract_items(body, items_path)?,
            continuation: crate::http::continuation_token(headers, names),
        })
    }

    /// Build a page from a response
    pub fn from_response(
        response: ApiResponse,
        items_path: Option<&str>,
        names: &HeaderNames,
    ) -> Result<Self> {
        Self::from_parts(response.body, &response.headers, items_path, names)
    }

    /// Whether this is the final page
    pub fn is_last(&self) -> bool {
        self.continuation.is_none()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Pull the item array out of a response body.
///
/// A root array is used as-is and an empty body is an empty page. Objects
/// are searched at `path` (dotted, default [`DEFAULT_ITEMS_PATH`]); an explicit
/// `null` there is an empty page, anything else that is not an array is an
/// error.
pub fn extract_items(body: JsonValue, path: Option<&str>) -> Result<Vec<JsonValue>> {
    let path = path.unwrap_or(DEFAULT_ITEMS_PATH);

    match body {
        JsonValue::Array(items) => Ok(items),
        JsonValue::Null => Ok(Vec::new()),
        JsonValue::Object(_) => {
            let trimmed = path.strip_prefix("$.").unwrap_or(path);
            let mut current = &body;
            for part in trimmed.split('.').filter(|p| !p.is_empty()) {
                current = current.get(part).ok_or_else(|| {
                    Error::decode(format!("response has no items at '{path}'"))
                })?;
            }
            match current {
                JsonValue::Array(items) => Ok(items.clone()),
                JsonValue::Null => Ok(Vec::new()),
                other => Err(Error::decode(format!(
                    "expected an array at '{path}', found {}",
                    type_name(other)
                ))),
            }
        }
        other => Err(Error::decode(format!(
            "expected an array or object body, found {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
