//! Materialization boundary: turning a due occurrence into a transaction.

use std::sync::Mutex;

use async_trait::async_trait;
use cadence_core::MaterializeAction;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::MaterializeError;

/// Handle to a transaction recorded by the host's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRef {
    pub id: String,
    pub subject_id: String,
    pub date: NaiveDate,
    pub status: TransactionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    #[serde(rename = "draft")]
    Draft,
    #[serde(rename = "posted")]
    Posted,
}

/// Trait for the host-side ledger. A `RequestApproval` action reaches this
/// trait only after the approval signal, so it posts like an auto-post;
/// `CreateDraft` records a draft.
#[async_trait]
pub trait Materializer: Send + Sync {
    async fn materialize(
        &self,
        subject_id: &str,
        date: NaiveDate,
        action: MaterializeAction,
    ) -> Result<TransactionRef, MaterializeError>;
}

/// In-memory ledger for tests and embedded hosts.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    recorded: Mutex<Vec<TransactionRef>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transactions(&self) -> Vec<TransactionRef> {
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Materializer for MemoryLedger {
    async fn materialize(
        &self,
        subject_id: &str,
        date: NaiveDate,
        action: MaterializeAction,
    ) -> Result<TransactionRef, MaterializeError> {
        let status = match action {
            MaterializeAction::CreateDraft => TransactionStatus::Draft,
            MaterializeAction::AutoPost | MaterializeAction::RequestApproval => {
                TransactionStatus::Posted
            }
        };
        let txn = TransactionRef {
            id: format!("txn-{subject_id}-{date}"),
            subject_id: subject_id.to_string(),
            date,
            status,
        };
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(txn.clone());
        Ok(txn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn ledger_records_status_by_action() {
        let ledger = MemoryLedger::new();
        let posted = ledger
            .materialize("bill-rent", date(2024, 3, 1), MaterializeAction::AutoPost)
            .await
            .unwrap();
        assert_eq!(posted.status, TransactionStatus::Posted);
        assert_eq!(posted.id, "txn-bill-rent-2024-03-01");

        let draft = ledger
            .materialize("bill-gym", date(2024, 3, 2), MaterializeAction::CreateDraft)
            .await
            .unwrap();
        assert_eq!(draft.status, TransactionStatus::Draft);

        let approved = ledger
            .materialize(
                "bill-tuition",
                date(2024, 3, 3),
                MaterializeAction::RequestApproval,
            )
            .await
            .unwrap();
        assert_eq!(approved.status, TransactionStatus::Posted);

        assert_eq!(ledger.transactions().len(), 3);
    }
}
