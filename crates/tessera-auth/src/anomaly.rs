//! Origin anomaly notification.
//!
//! When a refresh arrives from a network origin different from the one the
//! access token was issued to, the engine emits an [`OriginAnomaly`] to an
//! [`AnomalyNotifier`]. Delivery is best-effort: the engine spawns it and
//! never waits for the result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use time::OffsetDateTime;

use crate::config::AnomalyConfig;
use crate::device::device_label;
use crate::types::{Generation, Identity};

type HmacSha256 = Hmac<Sha256>;

/// Errors raised while delivering a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// A refresh from an unexpected network origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginAnomaly {
    pub identity: Identity,
    pub generation: Generation,
    /// Origin recorded in the access token at issuance.
    pub expected_origin: Option<String>,
    /// Origin of the refresh request.
    pub observed_origin: Option<String>,
    pub device: Option<String>,
    /// Readable form of `device`, e.g. "Firefox on Linux".
    pub device_label: String,
    #[serde(with = "time::serde::rfc3339")]
    pub detected_at: OffsetDateTime,
}

impl OriginAnomaly {
    #[must_use]
    pub fn new(
        identity: Identity,
        generation: Generation,
        expected_origin: Option<String>,
        observed_origin: Option<String>,
        device: Option<String>,
    ) -> Self {
        let device_label = device_label(device.as_deref());
        Self {
            identity,
            generation,
            expected_origin,
            observed_origin,
            device,
            device_label,
            detected_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Receiver of origin anomaly events.
#[async_trait]
pub trait AnomalyNotifier: Send + Sync {
    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails. Callers log and drop it.
    async fn notify(&self, anomaly: &OriginAnomaly) -> Result<(), NotificationError>;
}

/// Writes anomalies to the log at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl AnomalyNotifier for LogNotifier {
    async fn notify(&self, anomaly: &OriginAnomaly) -> Result<(), NotificationError> {
        tracing::warn!(
            identity = %anomaly.identity,
            generation = %anomaly.generation,
            expected_origin = ?anomaly.expected_origin,
            observed_origin = ?anomaly.observed_origin,
            device = %anomaly.device_label,
            "Refresh from unexpected network origin"
        );
        Ok(())
    }
}

/// POSTs anomalies as JSON to a webhook.
///
/// With a secret configured, the body is signed and the signature sent as
/// `X-Signature-256: sha256=<hex>`.
pub struct WebhookNotifier {
    http_client: Client,
    url: String,
    secret: Option<String>,
}

impl WebhookNotifier {
    /// Creates a notifier for `url`.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::InvalidConfig` if the HTTP client cannot be built.
    pub fn new(
        url: impl Into<String>,
        secret: Option<String>,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            http_client,
            url: url.into(),
            secret,
        })
    }

    fn sign_payload(payload: &str, secret: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("url", &self.url)
            .field("signed", &self.secret.is_some())
            .finish()
    }
}

#[async_trait]
impl AnomalyNotifier for WebhookNotifier {
    async fn notify(&self, anomaly: &OriginAnomaly) -> Result<(), NotificationError> {
        let payload = serde_json::to_string(anomaly)
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        let mut request = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json");

        if let Some(secret) = &self.secret {
            let signature = Self::sign_payload(&payload, secret);
            request = request.header("X-Signature-256", format!("sha256={signature}"));
        }

        let response = request
            .body(payload)
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotificationError::SendFailed(format!(
                "webhook responded {}",
                response.status()
            )))
        }
    }
}

/// Builds the notifier described by configuration.
///
/// Returns `None` when notifications are disabled.
///
/// # Errors
///
/// Returns an error if the webhook client cannot be built.
pub fn notifier_from_config(
    config: &AnomalyConfig,
) -> Result<Option<Arc<dyn AnomalyNotifier>>, NotificationError> {
    if !config.enabled {
        return Ok(None);
    }
    match &config.webhook_url {
        Some(url) => Ok(Some(Arc::new(WebhookNotifier::new(
            url.clone(),
            config.webhook_secret.clone(),
            config.timeout,
        )?))),
        None => Ok(Some(Arc::new(LogNotifier))),
    }
}
