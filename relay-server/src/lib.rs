//! Hookrelay - signed webhook receiver.
//!
//! Accepts webhook deliveries signed with `X-Hub-Signature-256`, checks them
//! against the secret registered for the receiving path, and relays the
//! accepted ones to an optional downstream target.
//!
//! ## Architecture
//!
//! ```text
//! POST /<path>/ → SecretRegistry → DeliveryEnvelope → read body → 202 → verify → DeliveryProcessor
//! ```

pub mod config;
pub mod error;
pub mod forward;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::Config;
pub use error::{ConfigError, EnvelopeError, ForwardError};
pub use forward::{DeliveryProcessor, ForwardOutcome, Forwarder, RetryPolicy};
pub use web::{AppState, SecretRegistry, SignatureVerifier};
