//! The buffered request snapshot the protocol operates on.
//!
//! [`IncomingRequest`] is built by the transport layer once the whole body has
//! been read. Headers, parameters and files are ordered multimaps: a name
//! appears once, in the order it was first seen, and keeps its values in
//! arrival order.

use bytes::Bytes;

/// An uploaded file from a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// The client-supplied file name, if any.
    pub file_name: Option<String>,
    /// The part's `Content-Type`, if any.
    pub content_type: Option<String>,
    /// The file content.
    pub data: Bytes,
}

impl UploadedFile {
    /// Create an uploaded file from its content alone.
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            file_name: None,
            content_type: None,
            data: data.into(),
        }
    }
}

/// Immutable snapshot of one inbound request.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    /// HTTP method as sent (e.g. `GET`).
    pub method: String,
    /// Full request URL without the query string (`scheme://host[:port]/path`).
    pub url: String,
    /// Raw (undecoded) query string, without the leading `?`.
    pub query: Option<String>,
    /// Headers in transport order.
    pub headers: Vec<(String, Vec<String>)>,
    /// Decoded query and form parameters.
    pub params: Vec<(String, Vec<String>)>,
    /// The fully buffered request body.
    pub body: Bytes,
    /// Uploaded files keyed by form field name.
    pub files: Vec<(String, Vec<UploadedFile>)>,
}

impl IncomingRequest {
    /// Create a request with the given method and full URL.
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the raw query string. An empty string clears it.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = if query.is_empty() { None } else { Some(query) };
        self
    }

    /// Append a header value.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        push_multi(&mut self.headers, name.into(), value.into());
        self
    }

    /// Append a parameter value.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        push_multi(&mut self.params, name.into(), value.into());
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Append an uploaded file under a form field.
    #[must_use]
    pub fn with_file(mut self, field: impl Into<String>, file: UploadedFile) -> Self {
        push_multi(&mut self.files, field.into(), file);
        self
    }

    /// First value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }

    /// The `Content-Type` header, if present.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// The full URL with the raw query string appended when there is one.
    #[must_use]
    pub fn full_url(&self) -> String {
        match self.query.as_deref() {
            Some(q) if !q.is_empty() => format!("{}?{q}", self.url),
            _ => self.url.clone(),
        }
    }
}

/// Append `value` under `name`, keeping first-seen name order.
pub(crate) fn push_multi<V>(map: &mut Vec<(String, Vec<V>)>, name: String, value: V) {
    if let Some((_, values)) = map.iter_mut().find(|(n, _)| *n == name) {
        values.push(value);
    } else {
        map.push((name, vec![value]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_group_repeated_headers_in_first_seen_order() {
        let req = IncomingRequest::new("GET", "http://localhost/")
            .with_header("x-b", "1")
            .with_header("x-a", "2")
            .with_header("x-b", "3");

        assert_eq!(
            req.headers,
            vec![
                ("x-b".to_owned(), vec!["1".to_owned(), "3".to_owned()]),
                ("x-a".to_owned(), vec!["2".to_owned()]),
            ]
        );
    }

    #[test]
    fn test_should_lookup_header_case_insensitively() {
        let req = IncomingRequest::new("POST", "http://localhost/")
            .with_header("Content-Type", "application/json");
        assert_eq!(req.content_type(), Some("application/json"));
        assert_eq!(req.header("hisv"), None);
    }

    #[test]
    fn test_should_append_query_to_full_url() {
        let req = IncomingRequest::new("GET", "http://localhost/api/widgets").with_query("id=7");
        assert_eq!(req.full_url(), "http://localhost/api/widgets?id=7");

        let bare = IncomingRequest::new("GET", "http://localhost/api/widgets").with_query("");
        assert_eq!(bare.query, None);
        assert_eq!(bare.full_url(), "http://localhost/api/widgets");
    }
}
