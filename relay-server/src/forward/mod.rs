//! Processing of authenticated deliveries.
//!
//! The processor is chosen once at startup:
//! - `LogOnly` records the accepted delivery and does nothing else
//! - `Forward` relays the body to the configured target with bounded retry
//!
//! ```text
//! Delivery → DeliveryProcessor::process() → log | Forwarder::forward()
//! ```

pub mod client;
pub mod retry;

use tracing::info;

use crate::web::envelope::Delivery;

pub use client::{ForwardOutcome, Forwarder};
pub use retry::RetryPolicy;

#[derive(Debug, Clone)]
pub enum DeliveryProcessor {
    LogOnly,
    Forward(Forwarder),
}

impl DeliveryProcessor {
    /// Handle one authenticated delivery. Never fails: forwarding problems are
    /// logged and the delivery is dropped.
    pub async fn process(&self, delivery: Delivery) {
        match self {
            DeliveryProcessor::LogOnly => {
                info!(
                    remote = %delivery.remote(),
                    event_type = %delivery.event_type(),
                    path = %delivery.path(),
                    body_length = delivery.body().len(),
                    "delivery_accepted"
                );
            }
            DeliveryProcessor::Forward(forwarder) => {
                info!(
                    remote = %delivery.remote(),
                    event_type = %delivery.event_type(),
                    path = %delivery.path(),
                    target_url = %forwarder.target(),
                    "delivery_accepted"
                );
                forwarder.forward(&delivery).await;
            }
        }
    }
}
