//! Inbound delivery validation.
//!
//! A delivery moves through three types, one per validation stage:
//!
//! ```text
//! request parts ─validate_header→ DeliveryEnvelope ─read_body→ ReceivedDelivery ─authenticate→ Delivery
//! ```
//!
//! Every step consumes its input and returns `Err(EnvelopeError)` on the
//! first failure, so a rejected delivery can never reach the processor.

use std::fmt;
use std::net::SocketAddr;

use axum::http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    request::Parts,
    HeaderMap, HeaderValue, Method,
};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

use crate::error::EnvelopeError;
use crate::web::signature::{Digest, SignatureVerifier, DIGEST_LENGTH};

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const EVENT_HEADER: &str = "x-github-event";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Logged in place of the event type when the header is absent.
pub const EVENT_NOT_PRESENT: &str = "Value not present";

/// Provider payload cap.
/// https://docs.github.com/en/webhooks/webhook-events-and-payloads#payload-cap
pub const MAX_BODY_LENGTH: u64 = 25 * 1024 * 1024;

/// Upper bound for the request header block, counted as `name: value\r\n`.
pub const MAX_HEADER_LENGTH: usize = 4096;

const SIGNATURE_PREFIX: &[u8] = b"sha256=";
const SIGNATURE_HEADER_LENGTH: usize = SIGNATURE_PREFIX.len() + 2 * DIGEST_LENGTH;

/// A delivery whose headers passed validation. The body has not been read yet.
#[derive(Debug)]
pub struct DeliveryEnvelope {
    remote: SocketAddr,
    path: String,
    event_type: Option<String>,
    digest: Digest,
    declared_length: u64,
}

impl DeliveryEnvelope {
    /// Validate method, header size, signature, content type and declared length.
    pub fn validate_header(parts: &Parts, remote: SocketAddr) -> Result<Self, EnvelopeError> {
        if parts.method != Method::POST {
            return Err(EnvelopeError::MethodNotAllowed(parts.method.clone()));
        }

        let headers = &parts.headers;

        let header_length = header_block_length(headers);
        if header_length > MAX_HEADER_LENGTH {
            return Err(EnvelopeError::HeadersTooLarge(header_length));
        }

        let signature = single_header(headers, SIGNATURE_HEADER)
            .map(HeaderValue::as_bytes)
            .filter(|raw| raw.len() == SIGNATURE_HEADER_LENGTH && raw.starts_with(SIGNATURE_PREFIX))
            .ok_or_else(|| EnvelopeError::MalformedSignature(describe(headers, SIGNATURE_HEADER)))?;

        let mut digest = [0u8; DIGEST_LENGTH];
        hex::decode_to_slice(&signature[SIGNATURE_PREFIX.len()..], &mut digest)?;

        match single_header(headers, CONTENT_TYPE.as_str()) {
            Some(value) if value == JSON_CONTENT_TYPE => {}
            _ => {
                return Err(EnvelopeError::UnsupportedContentType(describe(
                    headers,
                    CONTENT_TYPE.as_str(),
                )))
            }
        }

        // A missing or unparsable length is treated like an unknown (-1) length.
        let declared = single_header(headers, CONTENT_LENGTH.as_str())
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(-1);
        if declared < 0 || declared as u64 > MAX_BODY_LENGTH {
            return Err(EnvelopeError::LengthOutOfRange(declared));
        }

        let event_type = headers
            .get(EVENT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        Ok(Self {
            remote,
            path: parts.uri.path().to_owned(),
            event_type,
            digest,
            declared_length: declared as u64,
        })
    }

    /// Read the body, which must be exactly the declared length.
    ///
    /// Reading continues after the declared length is reached until the
    /// stream reports its end, so trailing bytes are detected rather than
    /// silently dropped.
    pub async fn read_body<S, E>(self, stream: S) -> Result<ReceivedDelivery, EnvelopeError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: fmt::Display,
    {
        let declared = self.declared_length;
        let mut stream = std::pin::pin!(stream);
        let mut body = BytesMut::with_capacity(declared as usize);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| EnvelopeError::BodyRead(e.to_string()))?;
            if body.len() as u64 + chunk.len() as u64 > declared {
                return Err(EnvelopeError::BodyTooLong { declared });
            }
            body.extend_from_slice(&chunk);
        }

        let read = body.len() as u64;
        if read != declared {
            return Err(EnvelopeError::BodyTooShort { declared, read });
        }

        Ok(ReceivedDelivery {
            envelope: self,
            body: body.freeze(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn event_type(&self) -> &str {
        self.event_type.as_deref().unwrap_or(EVENT_NOT_PRESENT)
    }

    pub fn declared_length(&self) -> u64 {
        self.declared_length
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }
}

/// A delivery with its full body, not yet authenticated.
#[derive(Debug)]
pub struct ReceivedDelivery {
    envelope: DeliveryEnvelope,
    body: Bytes,
}

impl ReceivedDelivery {
    /// Check the body against the digest from the signature header.
    pub fn authenticate(self, verifier: &SignatureVerifier) -> Result<Delivery, EnvelopeError> {
        if !verifier.verify(&self.body, &self.envelope.digest) {
            return Err(EnvelopeError::SignatureMismatch(hex::encode(
                self.envelope.digest,
            )));
        }

        Ok(Delivery {
            envelope: self.envelope,
            body: self.body,
        })
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// An authenticated delivery, ready for processing.
#[derive(Debug)]
pub struct Delivery {
    envelope: DeliveryEnvelope,
    body: Bytes,
}

impl Delivery {
    pub fn remote(&self) -> SocketAddr {
        self.envelope.remote
    }

    pub fn path(&self) -> &str {
        &self.envelope.path
    }

    /// Event type for logging, with a placeholder when the header was absent.
    pub fn event_type(&self) -> &str {
        self.envelope.event_type()
    }

    /// Event type exactly as received, if the header was present.
    pub fn event_header(&self) -> Option<&str> {
        self.envelope.event_type.as_deref()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.envelope.digest)
    }
}

/// Returns the header value only if it occurs exactly once.
fn single_header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a HeaderValue> {
    let mut values = headers.get_all(name).iter();
    match (values.next(), values.next()) {
        (Some(value), None) => Some(value),
        _ => None,
    }
}

fn header_block_length(headers: &HeaderMap) -> usize {
    headers
        .iter()
        .map(|(name, value)| name.as_str().len() + value.len() + 4)
        .sum()
}

fn describe(headers: &HeaderMap, name: &str) -> String {
    let values: Vec<_> = headers.get_all(name).iter().collect();
    format!("{values:?}")
}
