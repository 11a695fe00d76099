//! HMAC-SHA256 signing and verification.
//!
//! ```text
//! hisv = Base64(HMAC-SHA256(secret, UTF-8(canonical string)))
//! ```
//!
//! Signatures are recomputed for every request; nothing is cached.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Request header carrying the client's signature.
pub const SIGNATURE_HEADER: &str = "hisv";

type HmacSha256 = Hmac<Sha256>;

/// Compute the standard-base64 HMAC-SHA256 of `data` keyed by `secret`.
///
/// # Examples
///
/// ```
/// use restsign_auth::sign;
///
/// assert_eq!(
///     sign("The quick brown fox jumps over the lazy dog", b"key"),
///     "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg="
/// );
/// ```
#[must_use]
pub fn sign(data: &str, secret: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can accept keys of any length");
    mac.update(data.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Recompute the signature of `data` and compare it with `presented`.
///
/// The comparison runs in constant time; its result is the same as plain
/// string equality.
#[must_use]
pub fn verify(data: &str, secret: &[u8], presented: &str) -> bool {
    let expected = sign(data, secret);
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}
