/// Client-local transaction history records
///
/// These records describe what this client *observed itself doing*. They are
/// never reconciled with the chain and must not be used to decide whether a
/// transaction succeeded.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Tranche, TxHash};

/// Call kinds that are written to the local history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Harvest,
    Mint,
    Approve,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::Harvest => "harvest",
            TransactionKind::Mint => "mint",
            TransactionKind::Approve => "approve",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Where a record's hash came from
///
/// `Local` covers placeholders written before the wallet returned a hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxReference {
    Chain(TxHash),
    Local(String),
}

impl TxReference {
    pub fn chain_hash(&self) -> Option<TxHash> {
        match self {
            TxReference::Chain(hash) => Some(*hash),
            TxReference::Local(_) => None,
        }
    }
}

impl fmt::Display for TxReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxReference::Chain(hash) => write!(f, "{}", hash),
            TxReference::Local(tag) => f.write_str(tag),
        }
    }
}

/// One entry of the local transaction log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// `<reference>-<timestamp_ms>`, unique within a log
    pub id: String,
    pub kind: TransactionKind,
    pub reference: TxReference,
    pub pool_id: Option<u64>,
    pub pool_name: Option<String>,
    pub tranche: Option<Tranche>,
    /// Decimal string as entered / displayed
    pub amount: String,
    pub timestamp_ms: i64,
    pub status: RecordStatus,
}

/// Record contents supplied by the caller; the log assigns id and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub reference: TxReference,
    pub pool_id: Option<u64>,
    pub pool_name: Option<String>,
    pub tranche: Option<Tranche>,
    pub amount: String,
    pub status: RecordStatus,
}

impl NewTransaction {
    pub fn pending(kind: TransactionKind, reference: TxReference, amount: impl Into<String>) -> Self {
        Self {
            kind,
            reference,
            pool_id: None,
            pool_name: None,
            tranche: None,
            amount: amount.into(),
            status: RecordStatus::Pending,
        }
    }

    pub fn with_pool(mut self, pool_id: u64, pool_name: impl Into<String>) -> Self {
        self.pool_id = Some(pool_id);
        self.pool_name = Some(pool_name.into());
        self
    }

    pub fn with_tranche(mut self, tranche: Tranche) -> Self {
        self.tranche = Some(tranche);
        self
    }
}

/// Partial update merged into an existing record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionUpdate {
    pub reference: Option<TxReference>,
    pub status: Option<RecordStatus>,
    pub amount: Option<String>,
}

impl TransactionUpdate {
    pub fn status(status: RecordStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_reference(mut self, reference: TxReference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn apply(self, record: &mut TransactionRecord) {
        if let Some(reference) = self.reference {
            record.reference = reference;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(amount) = self.amount {
            record.amount = amount;
        }
    }
}
