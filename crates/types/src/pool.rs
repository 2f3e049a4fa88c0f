/// Pool view model derived from the asset registry

use ethnum::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    Address, OtterError, OtterResult, BPS_DENOMINATOR, MAX_SENIOR_SPLIT_BPS, POOL_NAME_PREFIX,
    POOL_STATUS_ACTIVE, POOL_STATUS_CLOSED, POOL_STATUS_PENDING, POOL_STATUS_REJECTED,
};

// ============================================================================
// Registry Record
// ============================================================================

/// `getPool(id)` return struct exactly as decoded from the registry
///
/// Integer fields keep their full `uint256` width; narrowing and range checks
/// happen in [`Pool::from_record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRecord {
    pub issuer: Address,
    pub metadata_cid: String,
    pub epoch_seconds: U256,
    pub start_time: U256,
    pub senior_split_bps: U256,
    pub status: U256,
    pub senior_vault: Address,
    pub junior_vault: Address,
}

// ============================================================================
// Status
// ============================================================================

/// Human status label derived from the registry's numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    Pending,
    Active,
    Rejected,
    Closed,
}

impl PoolStatus {
    /// Unrecognized codes fall back to `Pending`
    pub fn from_code(code: u8) -> Self {
        match code {
            POOL_STATUS_PENDING => PoolStatus::Pending,
            POOL_STATUS_ACTIVE => PoolStatus::Active,
            POOL_STATUS_REJECTED => PoolStatus::Rejected,
            POOL_STATUS_CLOSED => PoolStatus::Closed,
            _ => PoolStatus::Pending,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PoolStatus::Pending => "pending",
            PoolStatus::Active => "active",
            PoolStatus::Rejected => "rejected",
            PoolStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Tranche
// ============================================================================

/// Risk tranche of a pool; each has its own vault once the pool is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tranche {
    Senior,
    Junior,
}

impl Tranche {
    pub fn label(&self) -> &'static str {
        match self {
            Tranche::Senior => "senior",
            Tranche::Junior => "junior",
        }
    }

    /// Product name shown for the tranche
    pub fn product_name(&self) -> &'static str {
        match self {
            Tranche::Senior => "Otter Safe",
            Tranche::Junior => "Otter Boost",
        }
    }
}

impl fmt::Display for Tranche {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Pool
// ============================================================================

/// Client-side view of one registry pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// 1-based registry id, assigned from the request position
    pub id: u64,
    pub issuer: Address,
    pub metadata_cid: String,
    pub epoch_seconds: u64,
    /// Unix seconds
    pub start_time: u64,
    pub senior_split_bps: u16,
    pub status_code: u8,
    pub status: PoolStatus,
    pub senior_vault: Address,
    pub junior_vault: Address,
    pub name: String,
}

impl Pool {
    /// Build the view for pool `id`, rejecting records that break invariants
    pub fn from_record(id: u64, record: PoolRecord) -> OtterResult<Self> {
        if id == 0 {
            return Err(OtterError::invalid_parameter("pool_id", "0", "1-based pool id"));
        }

        let senior_split_bps = narrow_u16(record.senior_split_bps, "senior_split_bps")?;
        if senior_split_bps > MAX_SENIOR_SPLIT_BPS {
            return Err(OtterError::malformed(
                "pool",
                &format!("senior split {} exceeds {} bps", senior_split_bps, MAX_SENIOR_SPLIT_BPS),
            ));
        }

        let status_code = narrow_u8(record.status, "status")?;

        Ok(Self {
            id,
            issuer: record.issuer,
            metadata_cid: record.metadata_cid,
            epoch_seconds: narrow_u64(record.epoch_seconds, "epoch_seconds")?,
            start_time: narrow_u64(record.start_time, "start_time")?,
            senior_split_bps,
            status_code,
            status: PoolStatus::from_code(status_code),
            senior_vault: record.senior_vault,
            junior_vault: record.junior_vault,
            name: format!("{}{}", POOL_NAME_PREFIX, id),
        })
    }

    /// Junior share is always the complement of the senior split
    pub fn junior_split_bps(&self) -> u16 {
        BPS_DENOMINATOR - self.senior_split_bps
    }

    /// Vault of the given tranche, `None` while it has not been created
    pub fn vault(&self, tranche: Tranche) -> Option<Address> {
        match tranche {
            Tranche::Senior => self.senior_vault.non_zero(),
            Tranche::Junior => self.junior_vault.non_zero(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PoolStatus::Active
    }

    /// Tranche whose vault is `vault`, if any
    pub fn tranche_of(&self, vault: Address) -> Option<Tranche> {
        if vault.is_zero() {
            None
        } else if vault == self.senior_vault {
            Some(Tranche::Senior)
        } else if vault == self.junior_vault {
            Some(Tranche::Junior)
        } else {
            None
        }
    }

    /// Epoch index at unix time `now`, `None` before the pool starts
    pub fn epoch_at(&self, now: u64) -> Option<u64> {
        if now < self.start_time || self.epoch_seconds == 0 {
            return None;
        }
        Some((now - self.start_time) / self.epoch_seconds)
    }
}

fn narrow_u8(value: U256, field: &str) -> OtterResult<u8> {
    if value > U256::new(u8::MAX as u128) {
        return Err(OtterError::malformed("pool", &format!("{} {} out of range", field, value)));
    }
    Ok(value.into_words().1 as u8)
}

fn narrow_u16(value: U256, field: &str) -> OtterResult<u16> {
    if value > U256::new(u16::MAX as u128) {
        return Err(OtterError::malformed("pool", &format!("{} {} out of range", field, value)));
    }
    Ok(value.into_words().1 as u16)
}

fn narrow_u64(value: U256, field: &str) -> OtterResult<u64> {
    if value > U256::new(u64::MAX as u128) {
        return Err(OtterError::malformed("pool", &format!("{} {} out of range", field, value)));
    }
    Ok(value.into_words().1 as u64)
}
