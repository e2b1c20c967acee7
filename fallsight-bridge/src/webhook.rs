//! Fire-and-forget fall notification webhook.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use thiserror::Error;

use fallsight_common::Severity;
use fallsight_common::frame::FallAlertFrame;

use crate::config::WebhookConfig;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

/// Body POSTed to the webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallNotification {
    pub event: &'static str,
    pub user_id: String,
    pub timestamp: String,
    pub alert_id: String,
    pub severity: Severity,
    pub fall_count: u64,
}

impl FallNotification {
    pub fn from_frame(frame: &FallAlertFrame) -> Self {
        Self {
            event: "fall",
            user_id: frame.user_id.clone(),
            timestamp: frame.timestamp.clone(),
            alert_id: frame.alert_id.clone(),
            severity: frame.severity,
            fall_count: frame.fall_count,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    min_severity: Severity,
    counters: Arc<Counters>,
}

impl WebhookNotifier {
    /// Build a notifier, or `None` when the webhook is disabled.
    pub fn from_config(config: &WebhookConfig) -> Result<Option<Self>, WebhookError> {
        if !config.is_enabled() {
            return Ok(None);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Some(Self {
            client,
            url: config.url.trim().to_string(),
            min_severity: config.min_severity,
            counters: Arc::default(),
        }))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn accepts(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }

    /// POST one notification and wait for the response.
    pub async fn notify(&self, notification: &FallNotification) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::Status(status));
        }
        Ok(())
    }

    /// Notify in a detached task; the outcome is only logged and counted.
    pub fn spawn_notify(&self, notification: FallNotification) {
        let notifier = self.clone();
        tokio::spawn(async move {
            match notifier.notify(&notification).await {
                Ok(()) => {
                    notifier.counters.sent.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(alert_id = %notification.alert_id, "Webhook delivered");
                }
                Err(e) => {
                    notifier.counters.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        alert_id = %notification.alert_id,
                        error = %e,
                        "Webhook failed"
                    );
                }
            }
        });
    }

    pub fn sent(&self) -> u64 {
        self.counters.sent.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }
}
