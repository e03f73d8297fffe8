//! Payment verification service
//!
//! Thin client over the external payment processor's verification endpoint.
//! The core never processes payments itself; it only asks whether an opaque
//! payment reference has completed. When no endpoint is configured the
//! reference is trusted, which keeps development setups working without a
//! processor.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::settings::Settings;
use crate::utils::errors::{MentorLinkError, Result};

/// Verification endpoint response structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentVerifyResponse {
    pub completed: bool,
    pub reference: Option<String>,
}

/// Payment verification client
#[derive(Debug, Clone)]
pub struct PaymentService {
    client: Client,
    settings: Settings,
}

impl PaymentService {
    /// Create a new PaymentService instance
    pub fn new(settings: Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.payment.timeout_seconds))
            .user_agent("MentorLink/1.0")
            .build()
            .map_err(MentorLinkError::Http)?;

        Ok(Self { client, settings })
    }

    /// Whether an external verification endpoint is configured
    pub fn is_enabled(&self) -> bool {
        self.settings.payment.verify_url.is_some()
    }

    /// Check a payment reference against the processor
    pub async fn verify(&self, payment_ref: &str) -> Result<bool> {
        if payment_ref.trim().is_empty() {
            return Err(MentorLinkError::InvalidInput(
                "payment reference must not be empty".to_string(),
            ));
        }

        let Some(verify_url) = self.settings.payment.verify_url.as_deref() else {
            debug!(payment_ref = %payment_ref, "Payment verification disabled, trusting reference");
            return Ok(true);
        };

        debug!(payment_ref = %payment_ref, "Verifying payment reference");

        let response = self
            .client
            .get(verify_url)
            .query(&[("ref", payment_ref)])
            .send()
            .await?
            .error_for_status()?;

        let body: PaymentVerifyResponse = response.json().await?;

        if body.completed {
            info!(payment_ref = %payment_ref, "Payment reference verified");
        } else {
            warn!(payment_ref = %payment_ref, "Payment reference not completed");
        }

        Ok(body.completed)
    }
}
