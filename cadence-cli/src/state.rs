//! Local state under ~/.cadence: append-only JSONL logs for obligations,
//! notifications, and recorded transactions.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use cadence_core::{MaterializeAction, NotificationInstance, Obligation};
use cadence_sweep::{
    MaterializeError, Materializer, NotificationStore, ObligationStore, StoreError,
    TransactionRef, TransactionStatus,
};
use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub fn cadence_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".cadence"))
}

pub fn ensure_cadence_home() -> Result<PathBuf> {
    let dir = cadence_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Append one record per save; on load, later lines supersede earlier ones,
/// so the file doubles as an edit history. Malformed lines are skipped.
fn replay<T: DeserializeOwned>(
    path: &Path,
    id_of: impl Fn(&T) -> &str,
) -> Result<BTreeMap<String, T>, StoreError> {
    let mut map = BTreeMap::new();
    if !path.exists() {
        return Ok(map);
    }
    let file = fs::File::open(path)?;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<T>(&line) {
            map.insert(id_of(&value).to_string(), value);
        }
    }
    Ok(map)
}

fn append<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let line = serde_json::to_string(value)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// File-backed store over the two JSONL logs.
pub struct JsonlStore {
    obligations_path: PathBuf,
    notifications_path: PathBuf,
}

impl JsonlStore {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        Ok(Self {
            obligations_path: dir.join("obligations.jsonl"),
            notifications_path: dir.join("notifications.jsonl"),
        })
    }
}

#[async_trait]
impl ObligationStore for JsonlStore {
    async fn load(&self, id: &str) -> Result<Option<Obligation>, StoreError> {
        let mut map = replay::<Obligation>(&self.obligations_path, |o| &o.id)?;
        Ok(map.remove(id))
    }

    async fn save(&self, obligation: &Obligation) -> Result<(), StoreError> {
        append(&self.obligations_path, obligation)
    }

    async fn list(&self) -> Result<Vec<Obligation>, StoreError> {
        let map = replay::<Obligation>(&self.obligations_path, |o| &o.id)?;
        Ok(map.into_values().collect())
    }
}

#[async_trait]
impl NotificationStore for JsonlStore {
    async fn load(&self, id: &str) -> Result<Option<NotificationInstance>, StoreError> {
        let mut map = replay::<NotificationInstance>(&self.notifications_path, |n| &n.id)?;
        Ok(map.remove(id))
    }

    async fn save(&self, instance: &NotificationInstance) -> Result<(), StoreError> {
        append(&self.notifications_path, instance)
    }

    async fn list(&self) -> Result<Vec<NotificationInstance>, StoreError> {
        let map = replay::<NotificationInstance>(&self.notifications_path, |n| &n.id)?;
        Ok(map.into_values().collect())
    }
}

/// Materializer that records transactions to transactions.jsonl. The append
/// completes before the schedule advances, which is what makes a crashed
/// sweep safe to re-run.
pub struct JsonlLedger {
    path: PathBuf,
}

impl JsonlLedger {
    pub fn open(dir: &Path) -> Self {
        Self {
            path: dir.join("transactions.jsonl"),
        }
    }
}

#[async_trait]
impl Materializer for JsonlLedger {
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
        let line =
            serde_json::to_string(&txn).map_err(|e| MaterializeError::Backend(e.to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MaterializeError::Backend(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| MaterializeError::Backend(e.to_string()))?;
        Ok(txn)
    }
}

/// All recorded transactions, in write order.
pub fn read_transactions(dir: &Path) -> Result<Vec<TransactionRef>> {
    let path = dir.join("transactions.jsonl");
    let mut out = Vec::new();
    if !path.exists() {
        return Ok(out);
    }
    let file = fs::File::open(&path).with_context(|| format!("read {}", path.display()))?;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(txn) = serde_json::from_str::<TransactionRef>(&line) {
            out.push(txn);
        }
    }
    Ok(out)
}
