//! Webhook signature verification.
//!
//! Deliveries are signed with HMAC-SHA256 over the raw body, keyed by the
//! secret registered for the receiving path.
//! Reference: https://docs.github.com/en/webhooks/using-webhooks/validating-webhook-deliveries

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of an HMAC-SHA256 digest.
pub const DIGEST_LENGTH: usize = 32;

/// Decoded digest carried in the signature header.
pub type Digest = [u8; DIGEST_LENGTH];

/// Verify `expected` against the HMAC-SHA256 of `content` keyed by `secret`.
///
/// The comparison runs in constant time. `expected` is a fixed-size digest,
/// so there is no length mismatch that could end the comparison early.
pub fn verify_signature(secret: &[u8], content: &[u8], expected: &Digest) -> bool {
    // HMAC accepts keys of any length, including empty ones.
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(content);
    mac.verify_slice(expected).is_ok()
}

/// Compute the HMAC-SHA256 digest of `content` keyed by `secret`.
pub fn compute_signature(secret: &[u8], content: &[u8]) -> Digest {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(m) => m,
        Err(_) => unreachable!("HMAC key can be of any size"),
    };
    mac.update(content);

    let mut digest = [0u8; DIGEST_LENGTH];
    digest.copy_from_slice(&mac.finalize().into_bytes());
    digest
}

/// Format a digest the way it appears in the `X-Hub-Signature-256` header.
pub fn format_signature_header(digest: &Digest) -> String {
    format!("sha256={}", hex::encode(digest))
}

/// Holds the secret for one registered path.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Check `expected` against the digest of `content` under this secret.
    pub fn verify(&self, content: &[u8], expected: &Digest) -> bool {
        verify_signature(&self.secret, content, expected)
    }
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}
