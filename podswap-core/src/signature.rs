//! Webhook signature verification
//!
//! Deliveries carry `X-Hub-Signature-256: sha256=<hex>`, the HMAC-SHA256 of
//! the raw request body keyed by the shared webhook secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of the signature header value
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Checks `provided` against the HMAC-SHA256 of `body` keyed by `secret`
///
/// The digest comparison is constant-time. Anything that is not exactly
/// `sha256=` followed by 64 lowercase hex digits is rejected.
pub fn verify(secret: &[u8], body: &[u8], provided: &str) -> bool {
    let Some(hex_digest) = provided.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };

    // hex::decode accepts upper case too, which would let two different
    // header values verify against the same digest.
    if !hex_digest
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return false;
    }

    let Ok(digest) = hex::decode(hex_digest) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&digest).is_ok()
}

/// Computes the header value for `body` signed with `secret`
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    // HMAC accepts keys of any length, the error branch is unreachable
    let digest = match HmacSha256::new_from_slice(secret) {
        Ok(mut mac) => {
            mac.update(body);
            mac.finalize().into_bytes().to_vec()
        }
        Err(_) => Vec::new(),
    };
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(digest))
}
