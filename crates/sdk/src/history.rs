//! Local transaction log
//!
//! Newest-first, capped list of what this client submitted. Advisory only:
//! it is never reconciled with the chain. Optionally persisted as JSON and
//! rewritten after every mutation.

use std::path::{Path, PathBuf};

use chrono::Utc;
use otter_types::{
    NewTransaction, OtterError, OtterResult, TransactionRecord, TransactionUpdate, MAX_TRANSACTION_RECORDS,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const STORE_VERSION: u32 = 0;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredLog {
    version: u32,
    transactions: Vec<TransactionRecord>,
}

#[derive(Debug, Default)]
struct LogState {
    records: Vec<TransactionRecord>,
    last_timestamp_ms: i64,
}

pub struct TransactionLog {
    path: Option<PathBuf>,
    state: Mutex<LogState>,
}

impl TransactionLog {
    /// Log that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(LogState::default()),
        }
    }

    /// Load the log at `path`; a missing file is an empty log
    ///
    /// A file that does not parse is moved aside to `<path>.corrupt` and the
    /// log starts empty.
    pub async fn open(path: impl AsRef<Path>) -> OtterResult<Self> {
        let path = path.as_ref().to_path_buf();
        let shown = path.display().to_string();

        let records = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str::<StoredLog>(&contents) {
                Ok(stored) => {
                    let mut records = stored.transactions;
                    records.truncate(MAX_TRANSACTION_RECORDS);
                    records
                }
                Err(e) => {
                    let aside = corrupt_path(&path);
                    warn!("Corrupt transaction log {}: {}; starting empty", shown, e);
                    if let Err(e) = tokio::fs::rename(&path, &aside).await {
                        warn!("Could not move {} aside: {}", shown, e);
                    }
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(OtterError::storage(&shown, &e.to_string())),
        };

        info!("Loaded {} transaction records from {}", records.len(), shown);
        let last_timestamp_ms = records.iter().map(|r| r.timestamp_ms).max().unwrap_or(0);

        Ok(Self {
            path: Some(path),
            state: Mutex::new(LogState { records, last_timestamp_ms }),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert at the front and evict beyond the cap
    ///
    /// The id is `<reference>-<timestamp_ms>`; timestamps are strictly
    /// increasing within a log so ids never collide. Mutations are written
    /// to disk first and only kept in memory once the write succeeds.
    pub async fn add(&self, transaction: NewTransaction) -> OtterResult<TransactionRecord> {
        let mut state = self.state.lock().await;

        let timestamp_ms = Utc::now().timestamp_millis().max(state.last_timestamp_ms + 1);

        let record = TransactionRecord {
            id: format!("{}-{}", transaction.reference, timestamp_ms),
            kind: transaction.kind,
            reference: transaction.reference,
            pool_id: transaction.pool_id,
            pool_name: transaction.pool_name,
            tranche: transaction.tranche,
            amount: transaction.amount,
            timestamp_ms,
            status: transaction.status,
        };

        let mut next = Vec::with_capacity(MAX_TRANSACTION_RECORDS);
        next.push(record.clone());
        next.extend(state.records.iter().take(MAX_TRANSACTION_RECORDS - 1).cloned());
        self.persist(&next).await?;

        state.records = next;
        state.last_timestamp_ms = timestamp_ms;
        debug!("Logged {} {} as {}", record.kind, record.amount, record.id);
        Ok(record)
    }

    /// Merge `update` into record `id`; `false` if there is no such record
    pub async fn update(&self, id: &str, update: TransactionUpdate) -> OtterResult<bool> {
        let mut state = self.state.lock().await;
        let Some(index) = state.records.iter().position(|r| r.id == id) else {
            debug!("No transaction record {}, ignoring update", id);
            return Ok(false);
        };

        let mut next = state.records.clone();
        update.apply(&mut next[index]);
        self.persist(&next).await?;

        state.records = next;
        Ok(true)
    }

    pub async fn clear(&self) -> OtterResult<()> {
        let mut state = self.state.lock().await;
        self.persist(&[]).await?;
        state.records.clear();
        Ok(())
    }

    /// Newest first
    pub async fn records(&self) -> Vec<TransactionRecord> {
        self.state.lock().await.records.clone()
    }

    pub async fn get(&self, id: &str) -> Option<TransactionRecord> {
        self.state.lock().await.records.iter().find(|r| r.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.records.is_empty()
    }

    async fn persist(&self, records: &[TransactionRecord]) -> OtterResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let shown = path.display().to_string();

        let stored = StoredLog {
            version: STORE_VERSION,
            transactions: records.to_vec(),
        };
        let json = serde_json::to_string_pretty(&stored)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| OtterError::storage(&shown, &e.to_string()))?;
        }
        tokio::fs::write(path, json)
            .await
            .map_err(|e| OtterError::storage(&shown, &e.to_string()))
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".corrupt");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use otter_types::{RecordStatus, TransactionKind, TxReference};

    fn pending(tag: &str) -> NewTransaction {
        NewTransaction::pending(TransactionKind::Deposit, TxReference::Local(tag.to_string()), "1")
    }

    #[tokio::test]
    async fn test_add_assigns_unique_ids() {
        let log = TransactionLog::in_memory();
        let a = log.add(pending("0x")).await.unwrap();
        let b = log.add(pending("0x")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert!(b.timestamp_ms > a.timestamp_ms);
        assert!(a.id.starts_with("0x-"));
        assert_eq!(log.records().await[0].id, b.id);
    }

    #[tokio::test]
    async fn test_update_merges_or_ignores() {
        let log = TransactionLog::in_memory();
        let record = log.add(pending("local")).await.unwrap();

        assert!(log
            .update(&record.id, TransactionUpdate::status(RecordStatus::Confirmed))
            .await
            .unwrap());
        let updated = log.get(&record.id).await.unwrap();
        assert_eq!(updated.status, RecordStatus::Confirmed);
        assert_eq!(updated.amount, "1");

        assert!(!log
            .update("missing", TransactionUpdate::status(RecordStatus::Failed))
            .await
            .unwrap());
        assert_eq!(log.len().await, 1);
    }
}
