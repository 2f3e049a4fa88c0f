//! Composition root for a connected client session
//!
//! Owns the chain ports, the read cache, the role session and the local
//! transaction log. Reads go through the cache; [`Dashboard::execute`] checks
//! the connection and role gate, logs the intent, dispatches it, settles the
//! log entry and invalidates whatever the call touched.

use std::sync::Arc;

use otter_types::{
    parse_amount, Address, Console, NewTransaction, OtterError, OtterResult, Pool, RecordStatus, RoleCapabilities,
    RoleSnapshot, TokenAmount, Tranche, TransactionUpdate, TxReference, VaultPosition,
};
use tracing::{debug, info, warn};

use crate::cache::{CachedValue, QueryCache, QueryKey, Scope};
use crate::client::{ChainReader, ChainWriter, Receipt};
use crate::dispatcher::{DispatchConfig, TxDispatcher};
use crate::history::TransactionLog;
use crate::intent::ContractCall;
use crate::network::Network;
use crate::notify::Notifier;
use crate::pools::PoolAggregator;
use crate::positions::{EpochProgress, PositionReader};
use crate::roles::RoleSession;

/// Pool/tranche context attached to a logged transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub pool_id: u64,
    pub pool_name: String,
    pub tranche: Option<Tranche>,
}

impl CallContext {
    pub fn pool(pool: &Pool) -> Self {
        Self {
            pool_id: pool.id,
            pool_name: pool.name.clone(),
            tranche: None,
        }
    }

    pub fn tranche(pool: &Pool, tranche: Tranche) -> Self {
        Self {
            tranche: Some(tranche),
            ..Self::pool(pool)
        }
    }
}

/// Non-empty position in one tranche of one pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioEntry {
    pub pool: Pool,
    pub tranche: Tranche,
    pub vault: Address,
    pub position: VaultPosition,
}

pub struct Dashboard {
    reader: Arc<dyn ChainReader>,
    writer: Arc<dyn ChainWriter>,
    notifier: Arc<dyn Notifier>,
    network: Network,
    dispatch_config: DispatchConfig,
    cache: QueryCache,
    session: RoleSession,
    log: TransactionLog,
    pools: PoolAggregator,
    positions: PositionReader,
}

impl Dashboard {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        writer: Arc<dyn ChainWriter>,
        notifier: Arc<dyn Notifier>,
        log: TransactionLog,
        network: Network,
        dispatch_config: DispatchConfig,
    ) -> Self {
        Self {
            pools: PoolAggregator::new(Arc::clone(&reader)),
            positions: PositionReader::new(Arc::clone(&reader)),
            session: RoleSession::new(Arc::clone(&reader)),
            cache: QueryCache::new(),
            reader,
            writer,
            notifier,
            network,
            dispatch_config,
            log,
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    pub fn session(&self) -> &RoleSession {
        &self.session
    }

    pub fn reader(&self) -> Arc<dyn ChainReader> {
        Arc::clone(&self.reader)
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    pub async fn connect(&self, account: Address) -> RoleSnapshot {
        self.session.connect(account).await
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    pub fn account(&self) -> Option<Address> {
        self.session.snapshot().address
    }

    pub fn roles(&self) -> RoleCapabilities {
        self.session.snapshot().capabilities
    }

    /// Connected account that passes `console`'s gate
    pub fn require(&self, console: Console) -> OtterResult<Address> {
        let snapshot = self.session.snapshot();
        let account = snapshot.address.ok_or(OtterError::NotConnected)?;
        if !snapshot.capabilities.admits(console) {
            return Err(OtterError::Unauthorized {
                account: account.to_string(),
                console: console.to_string(),
            });
        }
        Ok(account)
    }

    // ------------------------------------------------------------------
    // Cached reads
    // ------------------------------------------------------------------

    pub async fn pools(&self) -> OtterResult<Vec<Pool>> {
        if let Some(CachedValue::Pools(pools)) = self.cache.get(&QueryKey::Pools).await {
            return Ok(pools);
        }
        let pools = self.pools.fetch_all().await?;
        self.cache.insert(QueryKey::Pools, CachedValue::Pools(pools.clone())).await;
        Ok(pools)
    }

    pub async fn pool(&self, pool_id: u64) -> OtterResult<Pool> {
        let key = QueryKey::Pool(pool_id);
        if let Some(CachedValue::Pool(pool)) = self.cache.get(&key).await {
            return Ok(pool);
        }
        let pool = self.pools.fetch_one(pool_id).await?;
        self.cache.insert(key, CachedValue::Pool(pool.clone())).await;
        Ok(pool)
    }

    /// Position of the connected account; zeros when either side is missing
    pub async fn position(&self, vault: Option<Address>) -> VaultPosition {
        let (Some(vault), Some(account)) = (vault.and_then(Address::non_zero), self.account()) else {
            return VaultPosition::zero();
        };

        let key = QueryKey::Position { vault, account };
        if let Some(CachedValue::Position(position)) = self.cache.get(&key).await {
            return position;
        }
        let position = self.positions.read(Some(vault), Some(account)).await;
        self.cache.insert(key, CachedValue::Position(position.clone())).await;
        position
    }

    /// Drop the cached position and read all three values again
    pub async fn refetch_position(&self, vault: Option<Address>) -> VaultPosition {
        if let Some(vault) = vault.and_then(Address::non_zero) {
            self.cache.invalidate(Scope::Vault(vault)).await;
        }
        self.position(vault).await
    }

    pub async fn token_balance(&self) -> OtterResult<TokenAmount> {
        let Some(account) = self.account() else {
            return Ok(TokenAmount::zero());
        };
        let key = QueryKey::TokenBalance(account);
        if let Some(CachedValue::Amount(amount)) = self.cache.get(&key).await {
            return Ok(amount);
        }
        let amount = self.positions.token_balance(Some(account)).await?;
        self.cache.insert(key, CachedValue::Amount(amount.clone())).await;
        Ok(amount)
    }

    pub async fn allowance(&self, spender: Address) -> OtterResult<TokenAmount> {
        let Some(owner) = self.account() else {
            return Ok(TokenAmount::zero());
        };
        let key = QueryKey::Allowance { owner, spender };
        if let Some(CachedValue::Amount(amount)) = self.cache.get(&key).await {
            return Ok(amount);
        }
        let amount = self.positions.allowance(Some(owner), spender).await?;
        self.cache.insert(key, CachedValue::Amount(amount.clone())).await;
        Ok(amount)
    }

    /// Whether depositing `amount` into `spender` needs an approval first
    pub async fn needs_approval(&self, spender: Address, amount: &str) -> OtterResult<bool> {
        let raw = parse_amount(amount)?;
        Ok(raw > self.allowance(spender).await?.raw)
    }

    pub async fn epoch_progress(&self, pool_id: u64, epoch: u64) -> OtterResult<EpochProgress> {
        let revenue_key = QueryKey::Revenue { pool_id, epoch };
        let escrow_key = QueryKey::Escrow { pool_id, epoch };
        let distributed_key = QueryKey::Distributed { pool_id, epoch };

        if let (
            Some(CachedValue::Amount(posted)),
            Some(CachedValue::Amount(escrowed)),
            Some(CachedValue::Flag(distributed)),
        ) = (
            self.cache.get(&revenue_key).await,
            self.cache.get(&escrow_key).await,
            self.cache.get(&distributed_key).await,
        ) {
            return Ok(EpochProgress { pool_id, epoch, posted, escrowed, distributed });
        }

        let progress = self.positions.epoch_progress(pool_id, epoch).await?;
        self.cache.insert(revenue_key, CachedValue::Amount(progress.posted.clone())).await;
        self.cache.insert(escrow_key, CachedValue::Amount(progress.escrowed.clone())).await;
        self.cache.insert(distributed_key, CachedValue::Flag(progress.distributed)).await;
        Ok(progress)
    }

    /// Every non-empty position of the connected account across active pools
    pub async fn portfolio(&self) -> OtterResult<Vec<PortfolioEntry>> {
        let mut entries = Vec::new();
        if self.account().is_none() {
            return Ok(entries);
        }

        for pool in self.pools().await?.into_iter().filter(Pool::is_active) {
            for tranche in [Tranche::Senior, Tranche::Junior] {
                let Some(vault) = pool.vault(tranche) else { continue };
                let position = self.position(Some(vault)).await;
                if position.has_shares() || position.has_rewards() {
                    entries.push(PortfolioEntry {
                        pool: pool.clone(),
                        tranche,
                        vault,
                        position,
                    });
                }
            }
        }
        Ok(entries)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Fresh dispatcher sharing this dashboard's writer and notifier
    pub fn dispatcher(&self) -> TxDispatcher {
        TxDispatcher::new(
            Arc::clone(&self.writer),
            Arc::clone(&self.notifier),
            self.network.clone(),
            self.dispatch_config,
        )
    }

    pub async fn execute(&self, call: ContractCall, context: Option<CallContext>) -> OtterResult<Receipt> {
        self.execute_on(&self.dispatcher(), call, context, |_| {}).await
    }

    /// Gate, log, dispatch on `dispatcher`, settle the log entry, invalidate
    ///
    /// `on_success` runs after the receipt is observed and before the cache
    /// is invalidated. The result is the dispatcher's; a log that cannot be
    /// written is reported and skipped.
    pub async fn execute_on<F>(
        &self,
        dispatcher: &TxDispatcher,
        call: ContractCall,
        context: Option<CallContext>,
        on_success: F,
    ) -> OtterResult<Receipt>
    where
        F: FnOnce(&Receipt) + Send,
    {
        let from = match call.console() {
            Some(console) => self.require(console)?,
            None => self.account().ok_or(OtterError::NotConnected)?,
        };

        let record_id = match call.record_kind() {
            Some(kind) => {
                let mut entry = NewTransaction::pending(
                    kind,
                    TxReference::Local(format!("{}-pending", call.label())),
                    call.display_amount(),
                );
                if let Some(context) = &context {
                    entry = entry.with_pool(context.pool_id, context.pool_name.clone());
                    if let Some(tranche) = context.tranche {
                        entry = entry.with_tranche(tranche);
                    }
                }
                match self.log.add(entry).await {
                    Ok(record) => Some(record.id),
                    Err(e) => {
                        warn!("Could not log {}: {}", call.label(), e);
                        None
                    }
                }
            }
            None => None,
        };

        let result = dispatcher.dispatch(from, &call, on_success).await;

        if let Some(id) = &record_id {
            let status = if result.is_ok() { RecordStatus::Confirmed } else { RecordStatus::Failed };
            let mut update = TransactionUpdate::status(status);
            if let Some(hash) = dispatcher.state().tx_hash() {
                update = update.with_reference(TxReference::Chain(hash));
            }
            if let Err(e) = self.log.update(id, update).await {
                warn!("Could not settle log entry {}: {}", id, e);
            }
        }

        let receipt = result?;
        let removed = self.cache.invalidate_all(&call.invalidates()).await;
        debug!("{} invalidated {} cached reads", call.label(), removed);
        info!("{} complete", call);
        Ok(receipt)
    }
}
