//! Request descriptors
//!
//! A [`RequestDescriptor`] names everything needed to issue one logical API
//! call. It is immutable once built; pagination and batching derive new
//! descriptors from it instead of mutating it.

use crate::error::{Error, Result};
use crate::types::{JsonValue, Method, StringMap};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use url::Url;

/// Regex for path template parameters: `{name}`
static PATH_PARAM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").unwrap());

/// Path parameter filled from the client's organization id
pub const ORG_ID_PARAM: &str = "org_id";

/// Identity of an endpoint for rate-limit accounting: method plus the
/// unrendered path template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    /// HTTP method
    pub method: Method,
    /// Path template, e.g. `/orgs/{org_id}/devices`
    pub template: String,
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)
    }
}

/// Description of a single API request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    path_template: String,
    path_params: StringMap,
    query: StringMap,
    headers: StringMap,
    body: Option<JsonValue>,
    expected_status: Vec<u16>,
    items_path: Option<String>,
    continuation: Option<String>,
}

impl RequestDescriptor {
    /// Start building a request
    pub fn builder(method: Method, path_template: impl Into<String>) -> RequestDescriptorBuilder {
        RequestDescriptorBuilder {
            descriptor: RequestDescriptor {
                method,
                path_template: path_template.into(),
                path_params: StringMap::new(),
                query: StringMap::new(),
                headers: StringMap::new(),
                body: None,
                expected_status: Vec::new(),
                items_path: None,
                continuation: None,
            },
        }
    }

    /// Start building a GET request
    pub fn get(path_template: impl Into<String>) -> RequestDescriptorBuilder {
        Self::builder(Method::GET, path_template)
    }

    /// Start building a POST request
    pub fn post(path_template: impl Into<String>) -> RequestDescriptorBuilder {
        Self::builder(Method::POST, path_template)
    }

    /// Start building a PUT request
    pub fn put(path_template: impl Into<String>) -> RequestDescriptorBuilder {
        Self::builder(Method::PUT, path_template)
    }

    /// Start building a PATCH request
    pub fn patch(path_template: impl Into<String>) -> RequestDescriptorBuilder {
        Self::builder(Method::PATCH, path_template)
    }

    /// Start building a DELETE request
    pub fn delete(path_template: impl Into<String>) -> RequestDescriptorBuilder {
        Self::builder(Method::DELETE, path_template)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path_template(&self) -> &str {
        &self.path_template
    }

    pub fn query(&self) -> &StringMap {
        &self.query
    }

    pub fn headers(&self) -> &StringMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&JsonValue> {
        self.body.as_ref()
    }

    pub fn expected_status(&self) -> &[u16] {
        &self.expected_status
    }

    /// Dotted path to the item array in a paginated response body
    pub fn items_path(&self) -> Option<&str> {
        self.items_path.as_deref()
    }

    /// Continuation token carried by this request, if it fetches a follow-up page
    pub fn continuation_token(&self) -> Option<&str> {
        self.continuation.as_deref()
    }

    /// Rate-limit identity of this request
    pub fn endpoint(&self) -> EndpointKey {
        EndpointKey {
            method: self.method,
            template: self.path_template.clone(),
        }
    }

    /// Whether a 2xx status satisfies this request
    pub fn accepts(&self, status: u16) -> bool {
        (200..300).contains(&status)
            && (self.expected_status.is_empty() || self.expected_status.contains(&status))
    }

    /// Fill the path template, one decoded string per path segment.
    ///
    /// `{org_id}` comes from `org_id` unless the descriptor overrides it;
    /// every other parameter must be supplied on the descriptor. A value can
    /// never add, remove or escape a segment: separators inside it are encoded
    /// when the URL is built, and segments rendering to `""`, `.` or `..` are
    /// rejected.
    pub fn render_segments(&self, org_id: &str) -> Result<Vec<String>> {
        self.path_template
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| self.render_segment(segment, org_id))
            .collect()
    }

    /// Percent-encoded path, as sent on the wire
    pub fn render_path(&self, org_id: &str) -> Result<String> {
        let mut url = Url::parse("http://localhost/")?;
        push_segments(&mut url, &self.render_segments(org_id)?)?;
        Ok(url.path().to_string())
    }

    fn render_segment(&self, segment: &str, org_id: &str) -> Result<String> {
        let mut missing = None;
        let rendered = PATH_PARAM_REGEX.replace_all(segment, |caps: &regex::Captures| {
            let name = &caps[1];
            match self.path_params.get(name) {
                Some(value) => value.clone(),
                None if name == ORG_ID_PARAM => org_id.to_string(),
                None => {
                    if missing.is_none() {
                        missing = Some(name.to_string());
                    }
                    String::new()
                }
            }
        });

        if let Some(name) = missing {
            return Err(Error::MissingPathParam {
                name,
                template: self.path_template.clone(),
            });
        }
        if matches!(rendered.as_ref(), "" | "." | "..") {
            return Err(Error::InvalidPathSegment {
                segment: rendered.into_owned(),
                template: self.path_template.clone(),
            });
        }
        Ok(rendered.into_owned())
    }

    /// Derive the request for the next page.
    ///
    /// The remote service ignores filter parameters once a continuation
    /// token is in play, so all query parameters are dropped.
    #[must_use]
    pub fn with_continuation(&self, token: impl Into<String>) -> Self {
        Self {
            query: StringMap::new(),
            continuation: Some(token.into()),
            ..self.clone()
        }
    }

    /// Derive a request with a different JSON body
    #[must_use]
    pub fn with_body(&self, body: JsonValue) -> Self {
        Self {
            body: Some(body),
            ..self.clone()
        }
    }
}

/// Append decoded segments to `url`, percent-encoding each one
pub(crate) fn push_segments(url: &mut Url, segments: &[String]) -> Result<()> {
    url.path_segments_mut()
        .map_err(|()| Error::invalid_value("base_url", "must be an http(s) URL"))?
        .pop_if_empty()
        .extend(segments);
    Ok(())
}

/// Builder for [`RequestDescriptor`]
#[derive(Debug, Clone)]
pub struct RequestDescriptorBuilder {
    descriptor: RequestDescriptor,
}

impl RequestDescriptorBuilder {
    /// Set a path template parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptor.path_params.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptor.query.insert(key.into(), value.into());
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptor.headers.insert(key.into(), value.into());
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.descriptor.body = Some(body);
        self
    }

    /// Accept this status as success (may be called repeatedly)
    #[must_use]
    pub fn expect_status(mut self, status: u16) -> Self {
        if !self.descriptor.expected_status.contains(&status) {
            self.descriptor.expected_status.push(status);
        }
        self
    }

    /// Set the dotted path of the item array in paginated responses
    #[must_use]
    pub fn items_path(mut self, path: impl Into<String>) -> Self {
        self.descriptor.items_path = Some(path.into());
        self
    }

    /// Build the descriptor
    pub fn build(self) -> RequestDescriptor {
        self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_path_fills_org_and_params() {
        let desc = RequestDescriptor::get("/orgs/{org_id}/devices/{device_id}/packets")
            .param("device_id", "dev-42")
            .build();

        assert_eq!(
            desc.render_path("org-7").unwrap(),
            "/orgs/org-7/devices/dev-42/packets"
        );
    }

    #[test]
    fn test_render_path_missing_param() {
        let desc = RequestDescriptor::get("/orgs/{org_id}/webhooks/{webhook_id}").build();
        let err = desc.render_path("org-7").unwrap_err();
        assert!(matches!(err, Error::MissingPathParam { ref name, .. } if name == "webhook_id"));
    }

    #[test]
    fn test_param_values_stay_in_their_segment() {
        let desc = RequestDescriptor::get("/orgs/{org_id}/devices/{device_id}")
            .param("device_id", "../webhooks?x=1#frag")
            .build();

        assert_eq!(
            desc.render_segments("org-7").unwrap(),
            vec!["orgs", "org-7", "devices", "../webhooks?x=1#frag"]
        );
        assert_eq!(
            desc.render_path("org-7").unwrap(),
            "/orgs/org-7/devices/..%2Fwebhooks%3Fx=1%23frag"
        );

        let desc = RequestDescriptor::get("/orgs/{org_id}/tags/{tag}")
            .param("tag", "50%/a b")
            .build();
        assert_eq!(desc.render_path("org/7").unwrap(), "/orgs/org%2F7/tags/50%25%2Fa%20b");
    }

    #[test]
    fn test_dot_and_empty_segments_rejected() {
        for value in ["..", ".", ""] {
            let desc = RequestDescriptor::get("/orgs/{org_id}/devices/{device_id}/packets")
                .param("device_id", value)
                .build();
            let err = desc.render_segments("org-7").unwrap_err();
            assert!(
                matches!(err, Error::InvalidPathSegment { ref segment, .. } if segment == value),
                "value {value:?} gave {err:?}"
            );
        }
        assert!(matches!(
            RequestDescriptor::get("/orgs/{org_id}").build().render_path(".."),
            Err(Error::InvalidPathSegment { .. })
        ));

        // Dots inside a longer segment are ordinary characters
        let desc = RequestDescriptor::get("/files/{name}").param("name", "v1..2").build();
        assert_eq!(desc.render_path("o").unwrap(), "/files/v1..2");
    }

    #[test]
    fn test_explicit_org_param_wins() {
        let desc = RequestDescriptor::get("/orgs/{org_id}/billing")
            .param("org_id", "other-org")
            .build();
        assert_eq!(desc.render_path("org-7").unwrap(), "/orgs/other-org/billing");
    }

    #[test]
    fn test_accepts() {
        let any = RequestDescriptor::get("/x").build();
        assert!(any.accepts(200));
        assert!(any.accepts(204));
        assert!(!any.accepts(301));

        let created = RequestDescriptor::post("/x").expect_status(201).build();
        assert!(created.accepts(201));
        assert!(!created.accepts(200));
    }

    #[test]
    fn test_with_continuation_drops_query() {
        let desc = RequestDescriptor::get("/orgs/{org_id}/devices")
            .query("status", "active")
            .query("limit", "100")
            .header("X-Trace", "abc")
            .items_path("data")
            .build();

        let next = desc.with_continuation("tok-1");
        assert!(next.query().is_empty());
        assert_eq!(next.continuation_token(), Some("tok-1"));
        assert_eq!(next.headers().get("X-Trace"), Some(&"abc".to_string()));
        assert_eq!(next.items_path(), Some("data"));
        assert_eq!(next.endpoint(), desc.endpoint());

        // Original is untouched
        assert_eq!(desc.query().len(), 2);
        assert!(desc.continuation_token().is_none());
    }

    #[test]
    fn test_with_body() {
        let desc = RequestDescriptor::patch("/orgs/{org_id}/devices").build();
        let chunk = desc.with_body(json!({"items": [1, 2]}));
        assert!(desc.body().is_none());
        assert_eq!(chunk.body(), Some(&json!({"items": [1, 2]})));
    }

    #[test]
    fn test_endpoint_display() {
        let desc = RequestDescriptor::delete("/orgs/{org_id}/webhooks/{id}").build();
        assert_eq!(desc.endpoint().to_string(), "DELETE /orgs/{org_id}/webhooks/{id}");
    }
}
