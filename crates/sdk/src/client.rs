//! Chain ports
//!
//! Every component talks to the deployed contracts through these two traits.
//! [`crate::rpc::RpcChainClient`] implements them over JSON-RPC and
//! [`crate::mock::MockChain`] in memory.

use async_trait::async_trait;
use otter_types::{Address, OtterResult, PoolRecord, RoleId, TxHash, U256};

use crate::intent::ContractCall;

/// Read-only view of the protocol contracts
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Registry `poolCount()`
    async fn pool_count(&self) -> OtterResult<u64>;

    /// Registry `getPool(id)`
    async fn get_pool(&self, pool_id: u64) -> OtterResult<PoolRecord>;

    /// Access manager `hasRole(role, account)`
    async fn has_role(&self, role: RoleId, account: Address) -> OtterResult<bool>;

    /// Vault `balanceOf(account)`
    async fn vault_shares(&self, vault: Address, account: Address) -> OtterResult<U256>;

    /// Vault `pendingRewards(account)`
    async fn vault_pending_rewards(&self, vault: Address, account: Address) -> OtterResult<U256>;

    /// Vault `totalAssets()`
    async fn vault_total_assets(&self, vault: Address) -> OtterResult<U256>;

    /// Settlement token `balanceOf(account)`
    async fn token_balance(&self, account: Address) -> OtterResult<U256>;

    /// Settlement token `allowance(owner, spender)`
    async fn token_allowance(&self, owner: Address, spender: Address) -> OtterResult<U256>;

    /// Oracle `getRevenue(poolId, epoch)`
    async fn posted_revenue(&self, pool_id: u64, epoch: u64) -> OtterResult<U256>;

    /// Escrow `getEscrowedAmount(poolId, epoch)`
    async fn escrowed_amount(&self, pool_id: u64, epoch: u64) -> OtterResult<U256>;

    /// Distributor `isDistributed(poolId, epoch)`
    async fn is_distributed(&self, pool_id: u64, epoch: u64) -> OtterResult<bool>;

    async fn block_number(&self) -> OtterResult<u64>;

    /// Raw logs emitted by `filter.addresses` in the inclusive block range
    async fn logs(&self, filter: &LogFilter) -> OtterResult<Vec<LogEntry>>;
}

/// Submission side: the wallet signs and broadcasts, the node reports receipts
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// Hand `call` to the wallet for `from`; returns once the hash is known
    async fn submit(&self, from: Address, call: &ContractCall) -> OtterResult<TxHash>;

    /// `None` while the transaction is not mined yet
    async fn receipt(&self, tx_hash: TxHash) -> OtterResult<Option<Receipt>>;
}

/// Mined transaction outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// `false` when execution reverted
    pub success: bool,
}

/// One event log as returned by the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<[u8; 32]>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub tx_hash: Option<TxHash>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub addresses: Vec<Address>,
    pub from_block: u64,
    pub to_block: u64,
}

impl LogFilter {
    pub fn matches(&self, log: &LogEntry) -> bool {
        self.addresses.contains(&log.address)
            && log.block_number >= self.from_block
            && log.block_number <= self.to_block
    }
}
