//! Webhook endpoint handler.
//!
//! The handler validates and reads a delivery before answering:
//! 1. Look up the secret for the exact request path
//! 2. Validate the delivery headers
//! 3. Read the body, bounded by the request timeout
//! 4. Return 202 and hand the body to a detached task
//!
//! The detached task checks the signature and runs the processor. Nothing it
//! does can change the response. Body errors are logged and still get 202.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::warn;

use crate::error::EnvelopeError;
use crate::forward::DeliveryProcessor;
use crate::web::envelope::DeliveryEnvelope;
use crate::web::registry::SecretRegistry;

/// Shared application state. Everything in it is read-only.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SecretRegistry>,
    pub processor: Arc<DeliveryProcessor>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        registry: SecretRegistry,
        processor: DeliveryProcessor,
        request_timeout: Duration,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            processor: Arc::new(processor),
            request_timeout,
        }
    }
}

/// Build the router. Every path goes to [`receive_delivery`], which does its
/// own lookup so unknown paths look the same as rejected deliveries.
///
/// There is no body limit layer: oversized declared lengths are refused by
/// header validation with the same 404 as every other rejection.
pub fn router(state: AppState) -> Router {
    Router::new()
        .fallback(receive_delivery)
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Webhook endpoint for every registered path.
pub async fn receive_delivery(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request,
) -> StatusCode {
    let path = request.uri().path().to_owned();

    let Some(verifier) = state.registry.lookup(&path) else {
        refuse(remote, &path, &EnvelopeError::UnknownPath(path.clone()));
        return StatusCode::NOT_FOUND;
    };

    let (parts, body) = request.into_parts();
    let envelope = match DeliveryEnvelope::validate_header(&parts, remote) {
        Ok(envelope) => envelope,
        Err(e) => {
            refuse(remote, &path, &e);
            return StatusCode::NOT_FOUND;
        }
    };

    let read = envelope.read_body(body.into_data_stream());
    let received = match tokio::time::timeout(state.request_timeout, read).await {
        Ok(Ok(received)) => received,
        Ok(Err(e)) => {
            refuse(remote, &path, &e);
            return StatusCode::ACCEPTED;
        }
        Err(_) => {
            refuse(remote, &path, &EnvelopeError::BodyTimeout);
            return StatusCode::REQUEST_TIMEOUT;
        }
    };

    let processor = Arc::clone(&state.processor);
    tokio::spawn(async move {
        match received.authenticate(&verifier) {
            Ok(delivery) => processor.process(delivery).await,
            Err(e) => refuse(remote, &path, &e),
        }
    });

    StatusCode::ACCEPTED
}

fn refuse(remote: SocketAddr, path: &str, reason: &EnvelopeError) {
    warn!(
        remote = %remote,
        path = %path,
        reason = %reason,
        authentication = reason.is_authentication(),
        "delivery_refused"
    );
}
