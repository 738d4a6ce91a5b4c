//! HTTP webhook delivery channel.
//!
//! Posts the notification instance as a JSON payload to a configured URL.
//! Any transport error or non-2xx status comes back as an undelivered
//! outcome; retry policy stays with the notification lifecycle.

use async_trait::async_trait;
use cadence_core::NotificationInstance;

use crate::delivery::{Delivery, DeliveryOutcome};

pub struct WebhookDelivery {
    url: String,
    /// Shared client, connection pooling included.
    client: reqwest::Client,
}

impl WebhookDelivery {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Delivery for WebhookDelivery {
    async fn deliver(&self, instance: &NotificationInstance) -> DeliveryOutcome {
        let response = match self.client.post(&self.url).json(instance).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "webhook request failed");
                return DeliveryOutcome::failure(format!("webhook request failed: {e}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                url = %self.url,
                %status,
                notification = %instance.id,
                "webhook returned non-2xx status"
            );
            return DeliveryOutcome::failure(format!("webhook returned {status}"));
        }

        tracing::debug!(
            url = %self.url,
            notification = %instance.id,
            %status,
            "webhook notification delivered"
        );
        DeliveryOutcome::success()
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_keeps_configured_url() {
        let delivery = WebhookDelivery::new("https://hooks.example.com/cadence");
        assert_eq!(delivery.url(), "https://hooks.example.com/cadence");
        assert_eq!(delivery.channel_name(), "webhook");
    }

    #[tokio::test]
    async fn malformed_url_reports_undelivered() {
        // The request builder rejects this before any socket is opened.
        let delivery = WebhookDelivery::new("not a url");
        let n = NotificationInstance::new(
            "ntf-1",
            "bill-rent",
            "Rent due",
            "Rent is due tomorrow.",
            chrono::Utc::now(),
            chrono::NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
        );
        let outcome = delivery.deliver(&n).await;
        assert!(!outcome.delivered);
        assert!(outcome.error.is_some());
    }
}
