//! Outbound relay of accepted deliveries.

use std::time::Duration;

use reqwest::{header::CONTENT_TYPE, Client};
use tokio::time::sleep;
use tracing::{error, info, warn};
use url::Url;

use crate::error::ForwardError;
use crate::forward::retry::RetryPolicy;
use crate::web::envelope::{Delivery, EVENT_HEADER, JSON_CONTENT_TYPE};

/// How a forwarding sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    Delivered { attempts: u32 },
    Exhausted { attempts: u32 },
}

/// Posts deliveries to the configured target.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    target: Url,
    retry: RetryPolicy,
}

impl Forwarder {
    pub fn new(target: Url, timeout: Duration, retry: RetryPolicy) -> Result<Self, ForwardError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("hookrelay/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            target,
            retry,
        })
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Send one empty POST to check the target is reachable at all.
    ///
    /// Any HTTP response counts, whatever its status.
    pub async fn probe(&self) -> Result<(), ForwardError> {
        match self.client.post(self.target.clone()).send().await {
            Ok(resp) => {
                info!(
                    target_url = %self.target,
                    status_code = resp.status().as_u16(),
                    "forward_target_reachable"
                );
                Ok(())
            }
            Err(e) => Err(ForwardError::Unreachable {
                url: self.target.to_string(),
                source: e,
            }),
        }
    }

    /// Relay `delivery`, retrying per the policy. The full body is resent on
    /// every attempt.
    pub async fn forward(&self, delivery: &Delivery) -> ForwardOutcome {
        let digest = delivery.digest_hex();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.post(delivery).await {
                Ok(()) => {
                    info!(
                        digest = %digest,
                        target_url = %self.target,
                        attempts = attempts,
                        "delivery_forwarded"
                    );
                    return ForwardOutcome::Delivered { attempts };
                }
                Err(e) => {
                    warn!(
                        digest = %digest,
                        target_url = %self.target,
                        attempt = attempts,
                        error = %e,
                        "forward_attempt_failed"
                    );
                }
            }

            match self.retry.next_delay(attempts) {
                Some(delay) => sleep(delay).await,
                None => {
                    error!(
                        remote = %delivery.remote(),
                        digest = %digest,
                        target_url = %self.target,
                        attempts = attempts,
                        "forward_exhausted"
                    );
                    return ForwardOutcome::Exhausted { attempts };
                }
            }
        }
    }

    async fn post(&self, delivery: &Delivery) -> Result<(), ForwardError> {
        let mut request = self
            .client
            .post(self.target.clone())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(delivery.body().clone());

        if let Some(event) = delivery.event_header() {
            request = request.header(EVENT_HEADER, event);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ForwardError::Status(status));
        }
        Ok(())
    }
}
