//! Web server module for receiving signed webhook deliveries.
//!
//! This module provides:
//! - Signature verification (HMAC-SHA256, constant time)
//! - Header and body validation of inbound deliveries
//! - The path to secret registry
//! - The axum handler that ties them together
//! - The connection loop that serves the router with per-connection limits
//!
//! The response is sent once the headers check out and the body has been
//! read. Signature verification and forwarding happen in a detached task.

pub mod envelope;
pub mod handlers;
pub mod registry;
pub mod server;
pub mod signature;

pub use envelope::{Delivery, DeliveryEnvelope, ReceivedDelivery};
pub use handlers::{receive_delivery, router, AppState};
pub use registry::{normalize_path, SecretRegistry};
pub use server::{serve, ConnectionLimits};
pub use signature::{verify_signature, SignatureVerifier};
