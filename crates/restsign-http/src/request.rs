//! Conversion of a buffered HTTP request into an [`IncomingRequest`].
//!
//! Parameters are gathered the way a servlet container exposes them: decoded
//! query pairs first, then `application/x-www-form-urlencoded` body pairs or
//! `multipart/form-data` text fields. Multipart parts carrying a filename
//! become uploaded files.

use bytes::Bytes;
use restsign_auth::{AuthError, IncomingRequest};

use crate::multipart::{extract_boundary, is_multipart, parse_multipart};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Build the request snapshot from the request head and its collected body.
///
/// `scheme` is used to rebuild the full URL when the request target is in
/// origin form (`/path?query`).
///
/// # Errors
///
/// Returns [`AuthError::BodyRead`] if a multipart body cannot be parsed.
pub fn build_incoming(
    parts: &http::request::Parts,
    body: Bytes,
    scheme: &str,
) -> Result<IncomingRequest, AuthError> {
    let mut request = IncomingRequest::new(parts.method.as_str(), full_url(parts, scheme));

    if let Some(query) = parts.uri.query() {
        request = request.with_query(query);
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            request = request.with_param(name, value);
        }
    }

    for name in parts.headers.keys() {
        for value in parts.headers.get_all(name) {
            request = request.with_header(
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
    }

    let content_type = request.content_type().map(str::to_owned);
    match content_type.as_deref() {
        Some(ct) if is_form_urlencoded(ct) => {
            for (name, value) in form_urlencoded::parse(&body) {
                request = request.with_param(name, value);
            }
        }
        Some(ct) if is_multipart(ct) => {
            let form = parse_multipart(&body, &extract_boundary(ct)?)?;
            for (name, value) in form.fields {
                request = request.with_param(name, value);
            }
            for (name, file) in form.files {
                request = request.with_file(name, file);
            }
        }
        _ => {}
    }

    Ok(request.with_body(body))
}

/// `scheme://host[:port]/path` of the request, without the query string.
///
/// An absolute-form target is used as is. Otherwise the host comes from the
/// `Host` header; without one the path alone is returned.
#[must_use]
pub fn full_url(parts: &http::request::Parts, scheme: &str) -> String {
    let path = parts.uri.path();
    if let (Some(uri_scheme), Some(authority)) = (parts.uri.scheme_str(), parts.uri.authority()) {
        return format!("{uri_scheme}://{authority}{path}");
    }

    match parts
        .headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
    {
        Some(host) if !host.is_empty() => format!("{scheme}://{host}{path}"),
        _ => path.to_owned(),
    }
}

fn is_form_urlencoded(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(FORM_URLENCODED))
}
