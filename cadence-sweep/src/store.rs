//! Persistence boundary and the in-memory reference store.
//!
//! Stores are keyed by stable id and must round-trip every field of the
//! domain records; the engine itself never defines a storage format.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use cadence_core::{NotificationInstance, Obligation};

use crate::error::StoreError;

#[async_trait]
pub trait ObligationStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<Obligation>, StoreError>;
    async fn save(&self, obligation: &Obligation) -> Result<(), StoreError>;
    /// All stored obligations, ordered by id.
    async fn list(&self) -> Result<Vec<Obligation>, StoreError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<NotificationInstance>, StoreError>;
    async fn save(&self, instance: &NotificationInstance) -> Result<(), StoreError>;
    /// All stored instances, ordered by id.
    async fn list(&self) -> Result<Vec<NotificationInstance>, StoreError>;
}

/// In-memory store for tests and embedded hosts. Implements both store
/// traits over one shared value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    obligations: Mutex<BTreeMap<String, Obligation>>,
    notifications: Mutex<BTreeMap<String, NotificationInstance>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_obligations(obligations: impl IntoIterator<Item = Obligation>) -> Self {
        let store = Self::default();
        {
            let mut map = store.obligations.lock().unwrap_or_else(|e| e.into_inner());
            for ob in obligations {
                map.insert(ob.id.clone(), ob);
            }
        }
        store
    }
}

#[async_trait]
impl ObligationStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<Obligation>, StoreError> {
        let map = self.obligations.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(id).cloned())
    }

    async fn save(&self, obligation: &Obligation) -> Result<(), StoreError> {
        let mut map = self.obligations.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(obligation.id.clone(), obligation.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Obligation>, StoreError> {
        let map = self.obligations.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.values().cloned().collect())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<NotificationInstance>, StoreError> {
        let map = self.notifications.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(id).cloned())
    }

    async fn save(&self, instance: &NotificationInstance) -> Result<(), StoreError> {
        let mut map = self.notifications.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(instance.id.clone(), instance.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<NotificationInstance>, StoreError> {
        let map = self.notifications.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{RecurrenceDefinition, RecurrenceKind};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn memory_store_round_trips_obligations() {
        let def = RecurrenceDefinition::new(
            RecurrenceKind::Monthly,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        let ob = Obligation::new("bill-rent", "Rent", -1450.0, "Chase", def).unwrap();

        let store = MemoryStore::new();
        ObligationStore::save(&store, &ob).await.unwrap();
        let loaded = ObligationStore::load(&store, "bill-rent").await.unwrap();
        assert_eq!(loaded, Some(ob));
        assert!(
            ObligationStore::load(&store, "bill-missing")
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(ObligationStore::list(&store).await.unwrap().len(), 1);
    }
}
