//! Per-account reads: vault positions, token balance and allowance, and the
//! per-epoch revenue pipeline shown to verifiers

use std::fmt;
use std::sync::Arc;

use otter_types::{Address, OtterResult, TokenAmount, VaultPosition, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ChainReader;

/// How far one epoch's revenue has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpochStage {
    Pending,
    Posted,
    Escrowed,
    Distributed,
}

impl fmt::Display for EpochStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EpochStage::Pending => "pending",
            EpochStage::Posted => "posted",
            EpochStage::Escrowed => "escrowed",
            EpochStage::Distributed => "distributed",
        };
        f.write_str(label)
    }
}

/// Oracle, escrow and distributor view of one `(pool, epoch)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochProgress {
    pub pool_id: u64,
    pub epoch: u64,
    pub posted: TokenAmount,
    pub escrowed: TokenAmount,
    pub distributed: bool,
}

impl EpochProgress {
    /// Most advanced stage reached
    pub fn stage(&self) -> EpochStage {
        if self.distributed {
            EpochStage::Distributed
        } else if !self.escrowed.is_zero() {
            EpochStage::Escrowed
        } else if !self.posted.is_zero() {
            EpochStage::Posted
        } else {
            EpochStage::Pending
        }
    }
}

pub struct PositionReader {
    reader: Arc<dyn ChainReader>,
}

impl PositionReader {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    /// Position of `account` in `vault`
    ///
    /// No vault (or the zero sentinel) or no account yields zeros without
    /// touching the chain. Otherwise the three reads are issued together;
    /// any that fails reads as zero.
    pub async fn read(&self, vault: Option<Address>, account: Option<Address>) -> VaultPosition {
        let (Some(vault), Some(account)) = (vault.and_then(Address::non_zero), account) else {
            return VaultPosition::zero();
        };

        let (shares, rewards, total) = tokio::join!(
            self.reader.vault_shares(vault, account),
            self.reader.vault_pending_rewards(vault, account),
            self.reader.vault_total_assets(vault),
        );

        VaultPosition {
            shares: or_zero(shares, "balanceOf", vault),
            pending_rewards: or_zero(rewards, "pendingRewards", vault),
            total_assets: or_zero(total, "totalAssets", vault),
        }
    }

    /// Settlement token balance; zero without an account
    pub async fn token_balance(&self, account: Option<Address>) -> OtterResult<TokenAmount> {
        let Some(account) = account else {
            return Ok(TokenAmount::zero());
        };
        Ok(self.reader.token_balance(account).await?.into())
    }

    /// Allowance granted by `owner` to `spender`; zero without an owner
    pub async fn allowance(&self, owner: Option<Address>, spender: Address) -> OtterResult<TokenAmount> {
        let Some(owner) = owner else {
            return Ok(TokenAmount::zero());
        };
        Ok(self.reader.token_allowance(owner, spender).await?.into())
    }

    pub async fn posted_revenue(&self, pool_id: u64, epoch: u64) -> OtterResult<TokenAmount> {
        Ok(self.reader.posted_revenue(pool_id, epoch).await?.into())
    }

    pub async fn escrowed_amount(&self, pool_id: u64, epoch: u64) -> OtterResult<TokenAmount> {
        Ok(self.reader.escrowed_amount(pool_id, epoch).await?.into())
    }

    pub async fn is_distributed(&self, pool_id: u64, epoch: u64) -> OtterResult<bool> {
        self.reader.is_distributed(pool_id, epoch).await
    }

    pub async fn epoch_progress(&self, pool_id: u64, epoch: u64) -> OtterResult<EpochProgress> {
        let (posted, escrowed, distributed) = tokio::join!(
            self.posted_revenue(pool_id, epoch),
            self.escrowed_amount(pool_id, epoch),
            self.is_distributed(pool_id, epoch),
        );
        Ok(EpochProgress {
            pool_id,
            epoch,
            posted: posted?,
            escrowed: escrowed?,
            distributed: distributed?,
        })
    }
}

fn or_zero(result: OtterResult<U256>, method: &str, vault: Address) -> TokenAmount {
    match result {
        Ok(raw) => TokenAmount::from_raw(raw),
        Err(e) => {
            debug!("{} on {} failed, reading as zero: {}", method, vault, e);
            TokenAmount::zero()
        }
    }
}
