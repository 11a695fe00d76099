//! Canonical string construction.
//!
//! The canonical string is a flat sequence of `$`-terminated tokens:
//!
//! ```text
//! METHOD$
//! FULL_URL[?QUERY]$
//! HEADER_NAME$VALUE$VALUE$...
//! PARAM_NAME$VALUE$VALUE$...
//! ```
//!
//! Headers keep the order the transport presented them in; the client has to
//! reproduce that order. Parameters are sorted by name. Values are not
//! escaped: a `$` inside a value is written as-is.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::digest::FileDigestor;
use crate::request::IncomingRequest;
use crate::sink::AbbreviatingSink;

/// Token delimiter.
pub const DELIMITER: &str = "$";

/// Headers that never take part in the canonical string.
pub const FILTERED_HEADERS: &[&str] = &[
    "hisv",
    "accept-encoding",
    "user-agent",
    "host",
    "connection",
    "content-length",
    "content-type",
];

/// Synthetic parameter carrying the raw body of a JSON `POST`.
pub const JSON_PARAM: &str = "_json";

/// Write the canonical tokens of `request` into `sink`.
pub fn write_canonical(
    request: &IncomingRequest,
    digestor: &FileDigestor,
    sink: &mut AbbreviatingSink,
) {
    append_method_and_url(request, sink);
    append_headers(request, sink);
    append_parameters(request, digestor, sink)
}

fn append_method_and_url(request: &IncomingRequest, sink: &mut AbbreviatingSink) {
    sink.append_full(&request.method).append_full(DELIMITER);
    sink.append_full(&request.full_url()).append_full(DELIMITER);
}

fn append_headers(request: &IncomingRequest, sink: &mut AbbreviatingSink) {
    for (name, values) in &request.headers {
        if is_filtered_header(name) {
            continue;
        }
        sink.append_full(name).append_full(DELIMITER);
        for value in values {
            sink.append_full(value).append_full(DELIMITER);
        }
    }
}

fn append_parameters(
    request: &IncomingRequest,
    digestor: &FileDigestor,
    sink: &mut AbbreviatingSink,
) {
    let params = collect_parameters(request, digestor);
    let query = request.query.as_deref();

    for (name, values) in &params {
        if is_query_parameter(query, name) {
            continue;
        }
        sink.append_full(name).append_full(DELIMITER);
        for value in values {
            sink.append_abbreviated(value).append_full(DELIMITER);
        }
    }
}

/// Build the sorted parameter map: query and form values, the `_json` body, and file digests.
#[must_use]
pub fn collect_parameters(
    request: &IncomingRequest,
    digestor: &FileDigestor,
) -> BTreeMap<String, Vec<String>> {
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, values) in &request.params {
        params
            .entry(name.clone())
            .or_default()
            .extend(values.iter().cloned());
    }

    if let Some(json) = json_body(request) {
        params.insert(JSON_PARAM.to_owned(), vec![json.into_owned()]);
    }

    for (field, files) in &request.files {
        params.insert(field.clone(), vec![digestor.digest_files(files)]);
    }

    params
}

/// The body text of a `POST` with an `application/json` content type, if non-empty.
///
/// Invalid UTF-8 sequences become U+FFFD; the signer must decode the same way.
fn json_body(request: &IncomingRequest) -> Option<Cow<'_, str>> {
    if !request.method.eq_ignore_ascii_case("POST") {
        return None;
    }
    let is_json = request
        .content_type()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));
    if !is_json || request.body.is_empty() {
        return None;
    }

    Some(String::from_utf8_lossy(&request.body))
}

/// Whether `name` is a key of the raw query string.
///
/// The query is split on `&`; a segment matches when its key (the text before
/// `=`, or the whole segment) equals `name` exactly.
///
/// # Examples
///
/// ```
/// use restsign_auth::canonical::is_query_parameter;
///
/// assert!(is_query_parameter(Some("id=7&flag"), "id"));
/// assert!(is_query_parameter(Some("id=7&flag"), "flag"));
/// assert!(!is_query_parameter(Some("xid=7"), "id"));
/// assert!(!is_query_parameter(None, "id"));
/// ```
#[must_use]
pub fn is_query_parameter(query: Option<&str>, name: &str) -> bool {
    let Some(query) = query else {
        return false;
    };
    query
        .split('&')
        .map(|segment| segment.split_once('=').map_or(segment, |(key, _)| key))
        .any(|key| key == name)
}

fn is_filtered_header(name: &str) -> bool {
    FILTERED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::UploadedFile;

    fn canonical(request: &IncomingRequest) -> (String, String) {
        let mut sink = AbbreviatingSink::new(10);
        write_canonical(request, &FileDigestor::default(), &mut sink);
        let (signing, log) = sink.finish();
        (signing.into_string(), log.as_str().to_owned())
    }

    #[test]
    fn test_should_emit_method_and_url() {
        let req = IncomingRequest::new("GET", "http://localhost/api/widgets").with_query("id=7");
        let (signing, _) = canonical(&req);
        assert_eq!(signing, "GET$http://localhost/api/widgets?id=7$");
    }

    #[test]
    fn test_should_emit_headers_in_transport_order() {
        let req = IncomingRequest::new("GET", "http://localhost/")
            .with_header("x-z", "1")
            .with_header("x-a", "2")
            .with_header("x-z", "3");
        let (signing, _) = canonical(&req);
        assert_eq!(signing, "GET$http://localhost/$x-z$1$3$x-a$2$");
    }

    #[test]
    fn test_should_skip_filtered_headers() {
        let req = IncomingRequest::new("GET", "http://localhost/")
            .with_header("host", "localhost")
            .with_header("User-Agent", "curl/8.0")
            .with_header("hisv", "sig")
            .with_header("accept-encoding", "gzip")
            .with_header("connection", "keep-alive")
            .with_header("content-length", "0")
            .with_header("content-type", "text/plain")
            .with_header("x-app", "demo");
        let (signing, _) = canonical(&req);
        assert_eq!(signing, "GET$http://localhost/$x-app$demo$");
    }

    #[test]
    fn test_should_sort_parameters_and_skip_query_parameters() {
        let req = IncomingRequest::new("POST", "http://localhost/api")
            .with_query("id=7")
            .with_param("id", "7")
            .with_param("zeta", "z")
            .with_param("alpha", "a1")
            .with_param("alpha", "a2")
            .with_param("id", "8");
        let (signing, _) = canonical(&req);
        assert_eq!(signing, "POST$http://localhost/api?id=7$alpha$a1$a2$zeta$z$");
    }

    #[test]
    fn test_should_include_json_body_for_post() {
        let req = IncomingRequest::new("POST", "http://localhost/api")
            .with_header("content-type", "application/json; charset=UTF-8")
            .with_body(r#"{"a":1}"#);
        let (signing, _) = canonical(&req);
        assert_eq!(signing, r#"POST$http://localhost/api$_json${"a":1}$"#);
    }

    #[test]
    fn test_should_ignore_json_body_for_other_methods() {
        let req = IncomingRequest::new("PUT", "http://localhost/api")
            .with_header("content-type", "application/json")
            .with_body(r#"{"a":1}"#);
        let (signing, _) = canonical(&req);
        assert_eq!(signing, "PUT$http://localhost/api$");
    }

    #[test]
    fn test_should_decode_non_utf8_json_body_lossily() {
        let req = IncomingRequest::new("POST", "http://localhost/api")
            .with_header("content-type", "application/json")
            .with_body(vec![b'{', 0xe9, b'}']);
        let (signing, _) = canonical(&req);
        assert_eq!(signing, "POST$http://localhost/api$_json${\u{fffd}}$");
    }

    #[test]
    fn test_should_replace_files_with_digests() {
        let req = IncomingRequest::new("POST", "http://localhost/upload")
            .with_file("docs", UploadedFile::new("hello"))
            .with_file("docs", UploadedFile::new("world"));
        let (signing, _) = canonical(&req);
        assert_eq!(
            signing,
            "POST$http://localhost/upload$docs$XUFAKrxLKna5cZ2REBfFkg==$fXkwN6B2AYZXSwKC8vQ15w==$"
        );
    }

    #[test]
    fn test_should_abbreviate_only_parameter_values_in_log() {
        let req = IncomingRequest::new("POST", "http://localhost/a-very-long-path")
            .with_header("x-long-header", "0123456789abcdef")
            .with_param("p", "0123456789abcdef");
        let (signing, log) = canonical(&req);
        assert!(signing.ends_with("p$0123456789abcdef$"));
        assert!(log.ends_with("p$0123456...$"));
        assert!(log.contains("x-long-header$0123456789abcdef$"));
    }

    #[test]
    fn test_should_match_query_keys_exactly() {
        assert!(is_query_parameter(Some("a=1&id=7"), "id"));
        assert!(is_query_parameter(Some("id"), "id"));
        assert!(is_query_parameter(Some("id="), "id"));
        assert!(!is_query_parameter(Some("idx=1"), "id"));
        assert!(!is_query_parameter(Some("a=id"), "id"));
        assert!(!is_query_parameter(Some(""), "id"));
    }

    #[test]
    fn test_should_exclude_bare_query_key_followed_by_more_pairs() {
        assert!(is_query_parameter(Some("id&x=1"), "id"));
        assert!(is_query_parameter(Some("x=1&id&y=2"), "id"));

        let req = IncomingRequest::new("POST", "http://localhost/api")
            .with_query("id&x=1")
            .with_param("id", "")
            .with_param("x", "1")
            .with_param("note", "n");
        let (signing, _) = canonical(&req);
        assert_eq!(signing, "POST$http://localhost/api?id&x=1$note$n$");
    }
}
