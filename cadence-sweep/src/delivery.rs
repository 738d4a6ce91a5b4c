//! Delivery boundary: how a notification reaches a human.

use async_trait::async_trait;
use cadence_core::NotificationInstance;

/// Result of one delivery attempt. Transport problems are data here, not
/// errors: the lifecycle turns an undelivered outcome into `fail`
/// bookkeeping on the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub delivered: bool,
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn success() -> Self {
        Self {
            delivered: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            delivered: false,
            error: Some(error.into()),
        }
    }
}

/// Trait for delivery channel implementations.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, instance: &NotificationInstance) -> DeliveryOutcome;

    /// Human-readable channel name ("console", "webhook").
    fn channel_name(&self) -> &str;
}

/// Prints to stdout. The reference channel for CLI runs and demos.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleDelivery;

#[async_trait]
impl Delivery for ConsoleDelivery {
    async fn deliver(&self, instance: &NotificationInstance) -> DeliveryOutcome {
        println!("[{}] {}", instance.priority.label(), instance.title);
        println!("    {}", instance.message);
        DeliveryOutcome::success()
    }

    fn channel_name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::Priority;
    use chrono::{NaiveDate, TimeZone, Utc};

    #[tokio::test]
    async fn console_delivery_always_succeeds() {
        let n = NotificationInstance::new(
            "ntf-1",
            "bill-rent",
            "Rent due",
            "Rent is due tomorrow.",
            Utc.with_ymd_and_hms(2024, 3, 11, 14, 0, 0).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
        )
        .with_priority(Priority::High);

        let outcome = ConsoleDelivery.deliver(&n).await;
        assert!(outcome.delivered);
        assert!(outcome.error.is_none());
        assert_eq!(ConsoleDelivery.channel_name(), "console");
    }
}
