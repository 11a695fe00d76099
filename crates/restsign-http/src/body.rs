//! Response body type supporting buffered and empty modes.
//!
//! The buffered variant keeps a handle on its bytes so the completion hook can
//! log the response body after the handler has produced it.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::Body;
use http_body_util::Full;

/// Response body supporting buffered and empty modes.
///
/// Implements [`http_body::Body`] so it can be used directly with hyper responses.
#[derive(Debug, Default)]
pub enum RestResponseBody {
    /// Buffered body: handler payloads, rejection messages, error bodies.
    Buffered {
        /// The complete body.
        data: Bytes,
        /// Frame source handed to hyper.
        full: Full<Bytes>,
    },
    /// Empty body for 204 responses, HEAD responses, etc.
    #[default]
    Empty,
}

impl RestResponseBody {
    /// Create a buffered body from bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self::Buffered {
            full: Full::new(data.clone()),
            data,
        }
    }

    /// Create a buffered body from a UTF-8 string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self::from_bytes(Bytes::from(s.into()))
    }

    /// Create an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// The buffered bytes, or `None` for an empty body.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Buffered { data, .. } => Some(data),
            Self::Empty => None,
        }
    }
}

impl Body for RestResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered { full, .. } => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered { full, .. } => full.is_end_stream(),
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered { full, .. } => full.size_hint(),
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}
