//! Multipart form data parser.
//!
//! Parses `multipart/form-data` bodies into text fields and uploaded files,
//! both kept in body order. Works on the already-collected body bytes.

use bytes::Bytes;
use restsign_auth::{AuthError, UploadedFile};

/// A parsed multipart form-data submission.
#[derive(Debug, Default)]
pub struct MultipartForm {
    /// Text fields (name, value) in body order.
    pub fields: Vec<(String, String)>,
    /// File parts (field name, file) in body order.
    pub files: Vec<(String, UploadedFile)>,
}

/// Returns `true` if the content type announces a multipart form.
#[must_use]
pub fn is_multipart(content_type: &str) -> bool {
    content_type
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
}

/// Extract the boundary string from a `Content-Type: multipart/form-data; boundary=...` header.
///
/// # Errors
///
/// Returns [`AuthError::BodyRead`] if the content type is not
/// multipart/form-data or the boundary parameter is absent.
pub fn extract_boundary(content_type: &str) -> Result<String, AuthError> {
    if !is_multipart(content_type) {
        return Err(AuthError::BodyRead(format!(
            "expected multipart/form-data, got: {content_type}"
        )));
    }

    for part in content_type.split(';') {
        let trimmed = part.trim();
        let Some((key, val)) = trimmed.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("boundary") {
            let boundary = val.trim().trim_matches('"').to_owned();
            if boundary.is_empty() {
                return Err(AuthError::BodyRead("empty multipart boundary".to_owned()));
            }
            return Ok(boundary);
        }
    }

    Err(AuthError::BodyRead("missing multipart boundary".to_owned()))
}

/// Parse a multipart/form-data body into text fields and files.
///
/// A part with a `filename` parameter is a file; every other named part is a
/// text field. Parts without a name are skipped.
///
/// # Errors
///
/// Returns [`AuthError::BodyRead`] if the body does not contain the boundary.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<MultipartForm, AuthError> {
    let delimiter = format!("--{boundary}");
    let end_delimiter = format!("--{boundary}--");

    if find_bytes(body, delimiter.as_bytes()).is_none() {
        return Err(AuthError::BodyRead(
            "multipart body does not contain its boundary".to_owned(),
        ));
    }

    let mut form = MultipartForm::default();
    for part_bytes in split_multipart_parts(body, delimiter.as_bytes(), end_delimiter.as_bytes()) {
        let Some((headers_section, part_body)) = split_headers_body(part_bytes) else {
            continue;
        };

        let disposition = parse_content_disposition(headers_section);
        let Some(field_name) = disposition.name else {
            continue;
        };

        if disposition.filename.is_some() {
            let file = UploadedFile {
                file_name: disposition.filename,
                content_type: parse_part_content_type(headers_section),
                data: Bytes::copy_from_slice(part_body),
            };
            form.files.push((field_name, file));
        } else {
            let value = String::from_utf8_lossy(part_body).into_owned();
            form.fields.push((field_name, value));
        }
    }

    Ok(form)
}

/// Split the multipart body into individual parts by boundary.
fn split_multipart_parts<'a>(
    body: &'a [u8],
    delimiter: &[u8],
    end_delimiter: &[u8],
) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut remaining = body;

    // Skip the preamble.
    if let Some(pos) = find_bytes(remaining, delimiter) {
        remaining = skip_crlf(&remaining[pos + delimiter.len()..]);
    } else {
        return parts;
    }

    loop {
        if remaining.starts_with(end_delimiter)
            || remaining
                .strip_prefix(b"\r\n")
                .is_some_and(|r| r.starts_with(end_delimiter))
        {
            break;
        }

        if let Some(pos) = find_bytes(remaining, delimiter) {
            parts.push(strip_trailing_crlf(&remaining[..pos]));
            remaining = skip_crlf(&remaining[pos + delimiter.len()..]);
        } else {
            let part = strip_trailing_crlf(remaining);
            if !part.is_empty() {
                parts.push(part);
            }
            break;
        }
    }

    parts
}

/// Split a part into headers section and body at the first \r\n\r\n boundary.
fn split_headers_body(part: &[u8]) -> Option<(&[u8], &[u8])> {
    let separator = b"\r\n\r\n";
    find_bytes(part, separator).map(|pos| (&part[..pos], &part[pos + separator.len()..]))
}

struct ContentDisposition {
    name: Option<String>,
    filename: Option<String>,
}

fn parse_content_disposition(headers: &[u8]) -> ContentDisposition {
    let headers_str = String::from_utf8_lossy(headers);
    let mut name = None;
    let mut filename = None;

    for line in headers_str.split("\r\n") {
        if !line
            .to_ascii_lowercase()
            .starts_with("content-disposition:")
        {
            continue;
        }
        for param in split_unquoted(line, ';').skip(1) {
            let Some((key, val)) = param.split_once('=') else {
                continue;
            };
            let val = val.trim().trim_matches('"').to_owned();
            match key.trim().to_ascii_lowercase().as_str() {
                "name" => name = Some(val),
                "filename" => filename = Some(val),
                _ => {}
            }
        }
    }

    ContentDisposition { name, filename }
}

/// Split `line` on `separator` wherever it sits outside a quoted string.
fn split_unquoted(line: &str, separator: char) -> impl Iterator<Item = &str> {
    let mut in_quotes = false;
    let mut escaped = false;
    line.split(move |c: char| {
        if escaped {
            escaped = false;
        } else if in_quotes && c == '\\' {
            escaped = true;
        } else if c == '"' {
            in_quotes = !in_quotes;
        }
        c == separator && !in_quotes
    })
}

fn parse_part_content_type(headers: &[u8]) -> Option<String> {
    let headers_str = String::from_utf8_lossy(headers);
    headers_str.split("\r\n").find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case("content-type")
            .then(|| value.trim().to_owned())
    })
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn skip_crlf(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\r\n").unwrap_or(data)
}

fn strip_trailing_crlf(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n").unwrap_or(data)
}
