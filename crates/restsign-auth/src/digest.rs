//! Content fingerprints for uploaded files.
//!
//! Uploaded files never contribute raw bytes to the canonical string. Each
//! file is reduced to the standard base64 encoding of a content digest, so the
//! signature does not depend on how the multipart body was framed.
//!
//! The digest only identifies content inside the signed string; it is not an
//! integrity guarantee against a hostile uploader. MD5 is the wire default,
//! SHA-256 is available when both signer and verifier agree on it.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use digest::Digest;

use crate::error::AuthError;
use crate::request::UploadedFile;

/// Supported file digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileDigestAlgorithm {
    /// MD5, the default.
    #[default]
    Md5,
    /// SHA-256.
    Sha256,
}

impl FileDigestAlgorithm {
    /// Return the configuration name of the algorithm.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for FileDigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileDigestAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            _ => Err(AuthError::Digest(format!("unsupported algorithm: {s}"))),
        }
    }
}

/// Reduces uploaded files to `$`-joined content digests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDigestor {
    algorithm: FileDigestAlgorithm,
}

impl FileDigestor {
    /// Create a digestor for the given algorithm.
    #[must_use]
    pub fn new(algorithm: FileDigestAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Create a digestor from a configured algorithm name.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Digest`] if the algorithm is not supported.
    pub fn from_name(name: &str) -> Result<Self, AuthError> {
        name.parse().map(Self::new)
    }

    /// The algorithm in use.
    #[must_use]
    pub fn algorithm(&self) -> FileDigestAlgorithm {
        self.algorithm
    }

    /// Base64-encoded digest of a single payload.
    ///
    /// # Examples
    ///
    /// ```
    /// use restsign_auth::FileDigestor;
    ///
    /// assert_eq!(FileDigestor::default().digest(b"hello"), "XUFAKrxLKna5cZ2REBfFkg==");
    /// ```
    #[must_use]
    pub fn digest(&self, data: &[u8]) -> String {
        match self.algorithm {
            FileDigestAlgorithm::Md5 => encode_digest::<md5::Md5>(data),
            FileDigestAlgorithm::Sha256 => encode_digest::<sha2::Sha256>(data),
        }
    }

    /// Digests of `files` in upload order, joined with `$`. Empty input gives an empty string.
    #[must_use]
    pub fn digest_files(&self, files: &[UploadedFile]) -> String {
        files
            .iter()
            .map(|file| self.digest(&file.data))
            .collect::<Vec<_>>()
            .join("$")
    }
}

fn encode_digest<D: Digest>(data: &[u8]) -> String {
    BASE64.encode(D::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_compute_base64_md5() {
        let digestor = FileDigestor::default();
        assert_eq!(digestor.digest(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
        assert_eq!(digestor.digest(b"hello"), "XUFAKrxLKna5cZ2REBfFkg==");
    }

    #[test]
    fn test_should_compute_base64_sha256() {
        let digestor = FileDigestor::new(FileDigestAlgorithm::Sha256);
        assert_eq!(
            digestor.digest(b"hello"),
            "LPJNul+wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ="
        );
    }

    #[test]
    fn test_should_join_digests_in_upload_order() {
        let digestor = FileDigestor::default();
        let files = [UploadedFile::new("hello"), UploadedFile::new("world")];
        assert_eq!(
            digestor.digest_files(&files),
            "XUFAKrxLKna5cZ2REBfFkg==$fXkwN6B2AYZXSwKC8vQ15w=="
        );
    }

    #[test]
    fn test_should_return_empty_string_for_no_files() {
        assert_eq!(FileDigestor::default().digest_files(&[]), "");
    }

    #[test]
    fn test_should_parse_algorithm_names() {
        assert_eq!(
            FileDigestor::from_name("MD5").expect("md5 supported").algorithm(),
            FileDigestAlgorithm::Md5
        );
        assert_eq!(
            FileDigestor::from_name("sha256").expect("sha256 supported").algorithm(),
            FileDigestAlgorithm::Sha256
        );
        assert!(matches!(
            FileDigestor::from_name("crc32"),
            Err(AuthError::Digest(_))
        ));
    }
}
