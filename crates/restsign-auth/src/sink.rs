//! Dual-stream writer for the canonical string.
//!
//! Every token goes to two buffers: the signing buffer, which always receives
//! the exact text, and the log buffer, which may receive an abbreviated copy.
//! The signature therefore never depends on the log verbosity settings.

use std::borrow::Cow;
use std::fmt;

/// Default maximum number of characters of an abbreviated value in the log.
pub const DEFAULT_MAX_CHARS: usize = 200;

/// Marker ending an abbreviated value. Counted inside the cap.
pub const TRUNCATION_MARKER: &str = "...";

/// Full-fidelity canonical string, consumed by the HMAC computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningBuffer(String);

impl SigningBuffer {
    /// The canonical string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take ownership of the canonical string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

/// Size-bounded copy of the canonical string for observability only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBuffer(String);

impl LogBuffer {
    /// The log text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Writer fanning every append out to a signing and a logging stream.
///
/// # Examples
///
/// ```
/// use restsign_auth::sink::AbbreviatingSink;
///
/// let mut sink = AbbreviatingSink::new(8);
/// sink.append_full("name$").append_abbreviated("0123456789").append_full("$");
/// let (signing, log) = sink.finish();
/// assert_eq!(signing.as_str(), "name$0123456789$");
/// assert_eq!(log.as_str(), "name$01234...$");
/// ```
#[derive(Debug)]
pub struct AbbreviatingSink {
    signing: String,
    log: String,
    max_chars: usize,
}

impl AbbreviatingSink {
    /// Create a sink whose abbreviated values are capped at `max_chars` characters.
    #[must_use]
    pub fn new(max_chars: usize) -> Self {
        Self {
            signing: String::new(),
            log: String::new(),
            max_chars,
        }
    }

    /// Write `value` unchanged to both streams.
    pub fn append_full(&mut self, value: &str) -> &mut Self {
        self.signing.push_str(value);
        self.log.push_str(value);
        self
    }

    /// Write `value` unchanged to the signing stream and capped to the log stream.
    pub fn append_abbreviated(&mut self, value: &str) -> &mut Self {
        self.signing.push_str(value);
        self.log.push_str(&abbreviate(value, self.max_chars));
        self
    }

    /// Close the sink and hand out both buffers.
    #[must_use]
    pub fn finish(self) -> (SigningBuffer, LogBuffer) {
        (SigningBuffer(self.signing), LogBuffer(self.log))
    }
}

impl Default for AbbreviatingSink {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS)
    }
}

/// Cap `value` at `max_chars` characters, ending it with [`TRUNCATION_MARKER`] when cut.
///
/// # Examples
///
/// ```
/// use restsign_auth::sink::abbreviate;
///
/// assert_eq!(abbreviate("short", 10), "short");
/// assert_eq!(abbreviate("abcdefghij", 6), "abc...");
/// ```
#[must_use]
pub fn abbreviate(value: &str, max_chars: usize) -> Cow<'_, str> {
    // Byte length bounds the char count from above.
    if value.len() <= max_chars || value.chars().count() <= max_chars {
        return Cow::Borrowed(value);
    }

    let keep = max_chars.saturating_sub(TRUNCATION_MARKER.len());
    let mut out: String = value.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_write_full_values_to_both_streams() {
        let mut sink = AbbreviatingSink::new(4);
        sink.append_full("GET$").append_full("http://localhost/a-long-url$");
        let (signing, log) = sink.finish();
        assert_eq!(signing.as_str(), log.as_str());
    }

    #[test]
    fn test_should_never_truncate_signing_stream() {
        let long = "x".repeat(1000);
        let mut sink = AbbreviatingSink::default();
        sink.append_abbreviated(&long);
        let (signing, log) = sink.finish();

        assert_eq!(signing.as_str(), long);
        assert_eq!(log.as_str().chars().count(), DEFAULT_MAX_CHARS);
        assert!(log.as_str().ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_should_keep_values_at_the_cap() {
        assert_eq!(abbreviate("abcd", 4), "abcd");
        assert_eq!(abbreviate("abcde", 4), "a...");
    }

    #[test]
    fn test_should_count_characters_not_bytes() {
        let value = "ééééé";
        assert_eq!(abbreviate(value, 5), value);
        assert_eq!(abbreviate(value, 4), "é...");
    }

    #[test]
    fn test_should_emit_marker_only_for_tiny_caps() {
        assert_eq!(abbreviate("abcdef", 2), "...");
    }
}
