//! Error types shared across the relay.
//!
//! Startup problems are [`ConfigError`] and abort the process. Per-request
//! rejections are [`EnvelopeError`] and only ever end up in the log.
//! Outbound failures are [`ForwardError`].

use axum::http::Method;
use thiserror::Error;

/// Fatal configuration problems detected before serving traffic.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("secret table has an odd number of tokens ({0}), expected path,secret pairs")]
    OddSecretTable(usize),

    #[error("secret table entry {index} has an empty {field}")]
    EmptySecretField { index: usize, field: &'static str },

    #[error("path {0} is registered more than once")]
    DuplicatePath(String),

    #[error("forward url {url} is not valid: {reason}")]
    InvalidForwardUrl { url: String, reason: String },
}

/// Reasons a delivery is refused.
///
/// Everything up to `LengthOutOfRange` is answered with 404. Body errors are
/// answered with 202 and only logged, except a body that does not arrive in
/// time. `SignatureMismatch` is detected after the 202 went out.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("path {0} is not registered")]
    UnknownPath(String),

    #[error("method {0} is not POST")]
    MethodNotAllowed(Method),

    #[error("header block of {0} bytes exceeds the limit")]
    HeadersTooLarge(usize),

    #[error("signature header {0} not compatible (sha256=<64 chars hex>)")]
    MalformedSignature(String),

    #[error("signature header could not be decoded as hex: {0}")]
    SignatureNotHex(#[from] hex::FromHexError),

    #[error("content type {0} is not application/json")]
    UnsupportedContentType(String),

    #[error("content length {0} has size out of range")]
    LengthOutOfRange(i64),

    #[error("body exceeds declared length of {declared} bytes")]
    BodyTooLong { declared: u64 },

    #[error("body ended after {read} of {declared} declared bytes")]
    BodyTooShort { declared: u64, read: u64 },

    #[error("body read failed: {0}")]
    BodyRead(String),

    #[error("body read did not finish in time")]
    BodyTimeout,

    #[error("invalid signature {0}")]
    SignatureMismatch(String),
}

impl EnvelopeError {
    /// Whether this is an authentication failure, as opposed to a protocol error.
    pub fn is_authentication(&self) -> bool {
        matches!(self, EnvelopeError::SignatureMismatch(_))
    }
}

/// Failures talking to the forwarding target.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("forward target {url} could not be reached: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("forward request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("forward target answered with status {0}")]
    Status(reqwest::StatusCode),
}
