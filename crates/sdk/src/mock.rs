//! In-memory chain
//!
//! Implements both chain ports over a small model of the Otter contracts so
//! that every component can be exercised without a node. Writes are applied
//! when submitted and their receipts become visible after a configurable
//! number of polls. Failures can be injected per read or per submission.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use otter_types::{
    Address, OtterError, OtterResult, PoolRecord, RoleId, TxHash, U256, BPS_DENOMINATOR, POOL_STATUS_ACTIVE,
    POOL_STATUS_REJECTED,
};
use tokio::sync::Mutex;

use crate::client::{ChainReader, ChainWriter, LogEntry, LogFilter, Receipt};
use crate::contracts::ContractAddresses;
use crate::events::ProtocolEvent;
use crate::intent::ContractCall;

#[derive(Debug, Default)]
struct MockVault {
    shares: HashMap<Address, U256>,
    rewards: HashMap<Address, U256>,
    total_assets: U256,
}

#[derive(Debug, Default)]
struct MockState {
    block: u64,
    tx_counter: u64,
    pools: Vec<PoolRecord>,
    failing_pools: HashSet<u64>,
    roles: HashSet<(RoleId, Address)>,
    failing_roles: HashSet<RoleId>,
    role_delays: HashMap<Address, Duration>,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    vaults: HashMap<Address, MockVault>,
    revenue: HashMap<(u64, u64), U256>,
    escrow: HashMap<(u64, u64), U256>,
    distributed: HashSet<(u64, u64)>,
    logs: Vec<LogEntry>,
    receipts: HashMap<TxHash, (Receipt, u32)>,
    submissions: Vec<(Address, ContractCall)>,
    reads: HashMap<&'static str, usize>,
    fail_all_reads: bool,
    reject_next: Option<String>,
    revert_next: bool,
    receipt_delay_polls: u32,
}

/// Chain model shared by tests and offline runs
pub struct MockChain {
    contracts: ContractAddresses,
    state: Mutex<MockState>,
}

fn add(map: &mut HashMap<Address, U256>, account: Address, amount: U256) {
    let entry = map.entry(account).or_insert(U256::ZERO);
    *entry = entry.saturating_add(amount);
}

fn sub(map: &mut HashMap<Address, U256>, account: Address, amount: U256) -> bool {
    match map.get_mut(&account) {
        Some(balance) if *balance >= amount => {
            *balance -= amount;
            true
        }
        _ => amount == U256::ZERO,
    }
}

fn get(map: &HashMap<Address, U256>, account: &Address) -> U256 {
    map.get(account).copied().unwrap_or(U256::ZERO)
}

/// Deterministic vault addresses for pool `id`
pub fn vault_addresses(pool_id: u64) -> (Address, Address) {
    let mut senior = [0u8; 20];
    senior[0] = 0x5e;
    senior[12..].copy_from_slice(&pool_id.to_be_bytes());
    let mut junior = senior;
    junior[0] = 0x7a;
    (Address(senior), Address(junior))
}

impl MockChain {
    pub fn new(contracts: ContractAddresses) -> Self {
        Self {
            contracts,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn contracts(&self) -> &ContractAddresses {
        &self.contracts
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    /// Append a pool; returns its id
    pub async fn add_pool(&self, record: PoolRecord) -> u64 {
        let mut state = self.state.lock().await;
        state.pools.push(record);
        state.pools.len() as u64
    }

    /// Append an active pool with fresh vaults; returns its id
    pub async fn add_active_pool(&self, issuer: Address, senior_split_bps: u16) -> u64 {
        let mut state = self.state.lock().await;
        let id = state.pools.len() as u64 + 1;
        let (senior_vault, junior_vault) = vault_addresses(id);
        state.pools.push(PoolRecord {
            issuer,
            metadata_cid: format!("ipfs://pool-{}", id),
            epoch_seconds: U256::new(30 * 24 * 3600),
            start_time: U256::new(1_735_689_600),
            senior_split_bps: U256::from(senior_split_bps),
            status: U256::from(POOL_STATUS_ACTIVE),
            senior_vault,
            junior_vault,
        });
        state.vaults.entry(senior_vault).or_default();
        state.vaults.entry(junior_vault).or_default();
        id
    }

    pub async fn grant_role(&self, role: RoleId, account: Address) {
        self.state.lock().await.roles.insert((role, account));
    }

    pub async fn set_token_balance(&self, account: Address, amount: U256) {
        self.state.lock().await.balances.insert(account, amount);
    }

    pub async fn set_position(&self, vault: Address, account: Address, shares: U256, rewards: U256) {
        let mut state = self.state.lock().await;
        let entry = state.vaults.entry(vault).or_default();
        entry.shares.insert(account, shares);
        entry.rewards.insert(account, rewards);
        entry.total_assets = entry.shares.values().fold(U256::ZERO, |acc, s| acc.saturating_add(*s));
    }

    pub async fn set_escrow(&self, pool_id: u64, epoch: u64, amount: U256) {
        self.state.lock().await.escrow.insert((pool_id, epoch), amount);
    }

    /// Emit `event` from `emitter` in a new block
    pub async fn emit(&self, emitter: Address, event: ProtocolEvent) {
        let mut state = self.state.lock().await;
        state.block += 1;
        let block = state.block;
        state.logs.push(event.to_log(emitter, block, None));
    }

    /// Append a raw log in a new block
    pub async fn push_log(&self, mut log: LogEntry) {
        let mut state = self.state.lock().await;
        state.block += 1;
        log.block_number = state.block;
        state.logs.push(log);
    }

    // ------------------------------------------------------------------
    // Failure injection
    // ------------------------------------------------------------------

    pub async fn fail_pool(&self, pool_id: u64) {
        self.state.lock().await.failing_pools.insert(pool_id);
    }

    pub async fn fail_role(&self, role: RoleId) {
        self.state.lock().await.failing_roles.insert(role);
    }

    pub async fn fail_all_reads(&self, fail: bool) {
        self.state.lock().await.fail_all_reads = fail;
    }

    /// Delay `hasRole` answers for `account`
    pub async fn delay_roles(&self, account: Address, delay: Duration) {
        self.state.lock().await.role_delays.insert(account, delay);
    }

    /// Next submission is refused by the wallet with `reason`
    pub async fn reject_next_submission(&self, reason: &str) {
        self.state.lock().await.reject_next = Some(reason.to_string());
    }

    /// Next submission is mined with a failing status
    pub async fn revert_next_submission(&self) {
        self.state.lock().await.revert_next = true;
    }

    /// Receipts stay unavailable for this many polls
    pub async fn set_receipt_delay(&self, polls: u32) {
        self.state.lock().await.receipt_delay_polls = polls;
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub async fn read_count(&self, method: &str) -> usize {
        self.state.lock().await.reads.get(method).copied().unwrap_or(0)
    }

    pub async fn total_reads(&self) -> usize {
        self.state.lock().await.reads.values().sum()
    }

    pub async fn submissions(&self) -> Vec<(Address, ContractCall)> {
        self.state.lock().await.submissions.clone()
    }

    pub async fn pool_status(&self, pool_id: u64) -> Option<U256> {
        let state = self.state.lock().await;
        let index = usize::try_from(pool_id).ok()?.checked_sub(1)?;
        state.pools.get(index).map(|p| p.status)
    }

    async fn record_read(&self, method: &'static str) -> OtterResult<tokio::sync::MutexGuard<'_, MockState>> {
        let mut state = self.state.lock().await;
        *state.reads.entry(method).or_insert(0) += 1;
        if state.fail_all_reads {
            return Err(OtterError::rpc_error(&format!("{} unavailable", method), Some(-32000)));
        }
        Ok(state)
    }

    // ------------------------------------------------------------------
    // Write model
    // ------------------------------------------------------------------

    /// Apply `call` from `from`; `Err` leaves state untouched and means revert
    fn execute(&self, state: &mut MockState, from: Address, call: &ContractCall) -> Result<Vec<(Address, ProtocolEvent)>, String> {
        let registry = self.contracts.asset_registry;
        match call {
            ContractCall::Mint { to, amount } => {
                add(&mut state.balances, *to, *amount);
                Ok(Vec::new())
            }
            ContractCall::Approve { spender, amount } => {
                state.allowances.insert((from, *spender), *amount);
                Ok(Vec::new())
            }
            ContractCall::Deposit { vault, amount } => {
                if !state.vaults.contains_key(vault) {
                    return Err("unknown vault".to_string());
                }
                let allowance = state.allowances.get(&(from, *vault)).copied().unwrap_or(U256::ZERO);
                if allowance < *amount {
                    return Err("ERC20: insufficient allowance".to_string());
                }
                if !sub(&mut state.balances, from, *amount) {
                    return Err("ERC20: transfer amount exceeds balance".to_string());
                }
                state.allowances.insert((from, *vault), allowance - *amount);
                let entry = state.vaults.entry(*vault).or_default();
                add(&mut entry.shares, from, *amount);
                entry.total_assets = entry.total_assets.saturating_add(*amount);
                Ok(vec![(
                    *vault,
                    ProtocolEvent::Deposit { vault: *vault, caller: from, owner: from, assets: *amount, shares: *amount },
                )])
            }
            ContractCall::Withdraw { vault, shares } => {
                let entry = state.vaults.get_mut(vault).ok_or_else(|| "unknown vault".to_string())?;
                if !sub(&mut entry.shares, from, *shares) {
                    return Err("insufficient shares".to_string());
                }
                entry.total_assets = entry.total_assets.saturating_sub(*shares);
                add(&mut state.balances, from, *shares);
                Ok(vec![(
                    *vault,
                    ProtocolEvent::Withdraw {
                        vault: *vault,
                        caller: from,
                        receiver: from,
                        owner: from,
                        assets: *shares,
                        shares: *shares,
                    },
                )])
            }
            ContractCall::Harvest { vault } => {
                let entry = state.vaults.get_mut(vault).ok_or_else(|| "unknown vault".to_string())?;
                let amount = entry.rewards.remove(&from).unwrap_or(U256::ZERO);
                if amount == U256::ZERO {
                    return Err("nothing to harvest".to_string());
                }
                add(&mut state.balances, from, amount);
                Ok(vec![(*vault, ProtocolEvent::Harvest { vault: *vault, user: from, amount })])
            }
            ContractCall::ProposePool { metadata_cid, epoch_seconds, start_time, senior_split_bps } => {
                state.pools.push(PoolRecord {
                    issuer: from,
                    metadata_cid: metadata_cid.clone(),
                    epoch_seconds: U256::from(*epoch_seconds),
                    start_time: U256::from(*start_time),
                    senior_split_bps: U256::from(*senior_split_bps),
                    status: U256::ZERO,
                    senior_vault: Address::ZERO,
                    junior_vault: Address::ZERO,
                });
                let pool_id = state.pools.len() as u64;
                Ok(vec![(
                    registry,
                    ProtocolEvent::PoolProposed { pool_id, issuer: from, metadata_cid: metadata_cid.clone() },
                )])
            }
            ContractCall::ActivatePool { pool_id } => {
                let pool = pending_pool(state, *pool_id)?;
                let (senior_vault, junior_vault) = vault_addresses(*pool_id);
                pool.status = U256::from(POOL_STATUS_ACTIVE);
                pool.senior_vault = senior_vault;
                pool.junior_vault = junior_vault;
                state.vaults.entry(senior_vault).or_default();
                state.vaults.entry(junior_vault).or_default();
                Ok(vec![(
                    registry,
                    ProtocolEvent::PoolActivated { pool_id: *pool_id, senior_vault, junior_vault },
                )])
            }
            ContractCall::RejectPool { pool_id } => {
                let pool = pending_pool(state, *pool_id)?;
                pool.status = U256::from(POOL_STATUS_REJECTED);
                Ok(vec![(registry, ProtocolEvent::PoolRejected { pool_id: *pool_id })])
            }
            ContractCall::PostRevenue { pool_id, epoch, amount } => {
                state.revenue.insert((*pool_id, *epoch), *amount);
                Ok(Vec::new())
            }
            ContractCall::DepositRevenue { pool_id, epoch, amount } => {
                let escrow = self.contracts.revenue_escrow;
                let allowance = state.allowances.get(&(from, escrow)).copied().unwrap_or(U256::ZERO);
                if allowance < *amount {
                    return Err("ERC20: insufficient allowance".to_string());
                }
                if !sub(&mut state.balances, from, *amount) {
                    return Err("ERC20: transfer amount exceeds balance".to_string());
                }
                state.allowances.insert((from, escrow), allowance - *amount);
                let entry = state.escrow.entry((*pool_id, *epoch)).or_insert(U256::ZERO);
                *entry = entry.saturating_add(*amount);
                Ok(Vec::new())
            }
            ContractCall::Distribute { pool_id, epoch } => self.distribute(state, *pool_id, *epoch),
        }
    }

    fn distribute(&self, state: &mut MockState, pool_id: u64, epoch: u64) -> Result<Vec<(Address, ProtocolEvent)>, String> {
        if state.distributed.contains(&(pool_id, epoch)) {
            return Err("already distributed".to_string());
        }
        let total = state.escrow.get(&(pool_id, epoch)).copied().unwrap_or(U256::ZERO);
        if total == U256::ZERO {
            return Err("nothing escrowed".to_string());
        }
        let index = (pool_id as usize).checked_sub(1).ok_or_else(|| "unknown pool".to_string())?;
        let pool = state.pools.get(index).cloned().ok_or_else(|| "unknown pool".to_string())?;

        let senior_amount = total * pool.senior_split_bps / U256::from(BPS_DENOMINATOR);
        let junior_amount = total - senior_amount;
        let mut events = Vec::new();

        for (vault, amount) in [(pool.senior_vault, senior_amount), (pool.junior_vault, junior_amount)] {
            let Some(entry) = state.vaults.get_mut(&vault) else { continue };
            let supply = entry.shares.values().fold(U256::ZERO, |acc, s| acc.saturating_add(*s));
            if supply == U256::ZERO || amount == U256::ZERO {
                continue;
            }
            let holders: Vec<(Address, U256)> = entry.shares.iter().map(|(a, s)| (*a, *s)).collect();
            for (holder, shares) in holders {
                add(&mut entry.rewards, holder, amount * shares / supply);
            }
            events.push((vault, ProtocolEvent::RewardsAdded { vault, amount }));
        }

        state.escrow.remove(&(pool_id, epoch));
        state.distributed.insert((pool_id, epoch));
        events.push((
            self.contracts.yield_distributor,
            ProtocolEvent::Distributed { pool_id, epoch, total, senior_amount, junior_amount },
        ));
        Ok(events)
    }
}

fn pending_pool(state: &mut MockState, pool_id: u64) -> Result<&mut PoolRecord, String> {
    let index = (pool_id as usize).checked_sub(1).ok_or_else(|| "unknown pool".to_string())?;
    let pool = state.pools.get_mut(index).ok_or_else(|| "unknown pool".to_string())?;
    if pool.status != U256::ZERO {
        return Err("pool is not pending".to_string());
    }
    Ok(pool)
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new(ContractAddresses::local())
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn pool_count(&self) -> OtterResult<u64> {
        let state = self.record_read("poolCount").await?;
        Ok(state.pools.len() as u64)
    }

    async fn get_pool(&self, pool_id: u64) -> OtterResult<PoolRecord> {
        let state = self.record_read("getPool").await?;
        if state.failing_pools.contains(&pool_id) {
            return Err(OtterError::rpc_error("execution reverted", Some(3)));
        }
        let index = (pool_id as usize)
            .checked_sub(1)
            .ok_or_else(|| OtterError::rpc_error("pool does not exist", Some(3)))?;
        state
            .pools
            .get(index)
            .cloned()
            .ok_or_else(|| OtterError::rpc_error("pool does not exist", Some(3)))
    }

    async fn has_role(&self, role: RoleId, account: Address) -> OtterResult<bool> {
        let (result, delay) = {
            let state = self.record_read("hasRole").await?;
            let result = if state.failing_roles.contains(&role) {
                Err(OtterError::rpc_error("hasRole reverted", Some(3)))
            } else {
                Ok(state.roles.contains(&(role, account)))
            };
            (result, state.role_delays.get(&account).copied())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn vault_shares(&self, vault: Address, account: Address) -> OtterResult<U256> {
        let state = self.record_read("balanceOf").await?;
        Ok(state.vaults.get(&vault).map(|v| get(&v.shares, &account)).unwrap_or(U256::ZERO))
    }

    async fn vault_pending_rewards(&self, vault: Address, account: Address) -> OtterResult<U256> {
        let state = self.record_read("pendingRewards").await?;
        Ok(state.vaults.get(&vault).map(|v| get(&v.rewards, &account)).unwrap_or(U256::ZERO))
    }

    async fn vault_total_assets(&self, vault: Address) -> OtterResult<U256> {
        let state = self.record_read("totalAssets").await?;
        Ok(state.vaults.get(&vault).map(|v| v.total_assets).unwrap_or(U256::ZERO))
    }

    async fn token_balance(&self, account: Address) -> OtterResult<U256> {
        let state = self.record_read("tokenBalanceOf").await?;
        Ok(get(&state.balances, &account))
    }

    async fn token_allowance(&self, owner: Address, spender: Address) -> OtterResult<U256> {
        let state = self.record_read("allowance").await?;
        Ok(state.allowances.get(&(owner, spender)).copied().unwrap_or(U256::ZERO))
    }

    async fn posted_revenue(&self, pool_id: u64, epoch: u64) -> OtterResult<U256> {
        let state = self.record_read("getRevenue").await?;
        Ok(state.revenue.get(&(pool_id, epoch)).copied().unwrap_or(U256::ZERO))
    }

    async fn escrowed_amount(&self, pool_id: u64, epoch: u64) -> OtterResult<U256> {
        let state = self.record_read("getEscrowedAmount").await?;
        Ok(state.escrow.get(&(pool_id, epoch)).copied().unwrap_or(U256::ZERO))
    }

    async fn is_distributed(&self, pool_id: u64, epoch: u64) -> OtterResult<bool> {
        let state = self.record_read("isDistributed").await?;
        Ok(state.distributed.contains(&(pool_id, epoch)))
    }

    async fn block_number(&self) -> OtterResult<u64> {
        let state = self.record_read("blockNumber").await?;
        Ok(state.block)
    }

    async fn logs(&self, filter: &LogFilter) -> OtterResult<Vec<LogEntry>> {
        let state = self.record_read("getLogs").await?;
        Ok(state.logs.iter().filter(|log| filter.matches(log)).cloned().collect())
    }
}

#[async_trait]
impl ChainWriter for MockChain {
    async fn submit(&self, from: Address, call: &ContractCall) -> OtterResult<TxHash> {
        let mut state = self.state.lock().await;
        if let Some(reason) = state.reject_next.take() {
            return Err(OtterError::wallet_rejected(call.label(), &reason));
        }

        state.tx_counter += 1;
        let mut hash = [0u8; 32];
        hash[24..].copy_from_slice(&state.tx_counter.to_be_bytes());
        let tx_hash = TxHash(hash);

        state.block += 1;
        let block_number = state.block;
        state.submissions.push((from, call.clone()));

        let success = if std::mem::take(&mut state.revert_next) {
            false
        } else {
            match self.execute(&mut state, from, call) {
                Ok(events) => {
                    for (emitter, event) in events {
                        state.logs.push(event.to_log(emitter, block_number, Some(tx_hash)));
                    }
                    true
                }
                Err(_) => false,
            }
        };

        let delay = state.receipt_delay_polls;
        state
            .receipts
            .insert(tx_hash, (Receipt { tx_hash, block_number, success }, delay));
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: TxHash) -> OtterResult<Option<Receipt>> {
        let mut state = self.state.lock().await;
        match state.receipts.get_mut(&tx_hash) {
            Some((_, remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Ok(None)
            }
            Some((receipt, _)) => Ok(Some(*receipt)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deposit_requires_allowance() {
        let chain = MockChain::default();
        let user = Address([0xab; 20]);
        let pool_id = chain.add_active_pool(Address([1; 20]), 7000).await;
        let (senior, _) = vault_addresses(pool_id);
        chain.set_token_balance(user, U256::new(5_000_000)).await;

        let deposit = ContractCall::deposit(senior, "2").unwrap();
        let hash = chain.submit(user, &deposit).await.unwrap();
        assert!(!chain.receipt(hash).await.unwrap().unwrap().success);

        chain.submit(user, &ContractCall::approve(senior, "2").unwrap()).await.unwrap();
        let hash = chain.submit(user, &deposit).await.unwrap();
        assert!(chain.receipt(hash).await.unwrap().unwrap().success);
        assert_eq!(chain.vault_shares(senior, user).await.unwrap(), U256::new(2_000_000));
        assert_eq!(chain.token_balance(user).await.unwrap(), U256::new(3_000_000));
        assert_eq!(chain.vault_total_assets(senior).await.unwrap(), U256::new(2_000_000));
    }

    #[tokio::test]
    async fn test_receipt_delay_and_rejection() {
        let chain = MockChain::default();
        let user = Address([0xab; 20]);
        chain.set_receipt_delay(2).await;

        let hash = chain.submit(user, &ContractCall::mint(user, "1").unwrap()).await.unwrap();
        assert!(chain.receipt(hash).await.unwrap().is_none());
        assert!(chain.receipt(hash).await.unwrap().is_none());
        assert!(chain.receipt(hash).await.unwrap().is_some());

        chain.reject_next_submission("User rejected the request.").await;
        let err = chain.submit(user, &ContractCall::mint(user, "1").unwrap()).await.unwrap_err();
        assert!(matches!(err, OtterError::WalletRejected { .. }));
        assert_eq!(chain.submissions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_distribution_credits_rewards_pro_rata() {
        let chain = MockChain::default();
        let a = Address([0xa0; 20]);
        let b = Address([0xb0; 20]);
        let pool_id = chain.add_active_pool(Address([1; 20]), 7000).await;
        let (senior, junior) = vault_addresses(pool_id);
        chain.set_position(senior, a, U256::new(300), U256::ZERO).await;
        chain.set_position(senior, b, U256::new(100), U256::ZERO).await;
        chain.set_position(junior, a, U256::new(50), U256::ZERO).await;
        chain.set_escrow(pool_id, 0, U256::new(1000)).await;

        let hash = chain
            .submit(a, &ContractCall::distribute(pool_id, 0).unwrap())
            .await
            .unwrap();
        assert!(chain.receipt(hash).await.unwrap().unwrap().success);
        assert_eq!(chain.vault_pending_rewards(senior, a).await.unwrap(), U256::new(525));
        assert_eq!(chain.vault_pending_rewards(senior, b).await.unwrap(), U256::new(175));
        assert_eq!(chain.vault_pending_rewards(junior, a).await.unwrap(), U256::new(300));
        assert!(chain.is_distributed(pool_id, 0).await.unwrap());

        // second distribution of the same epoch reverts
        let hash = chain
            .submit(a, &ContractCall::distribute(pool_id, 0).unwrap())
            .await
            .unwrap();
        assert!(!chain.receipt(hash).await.unwrap().unwrap().success);
    }
}
