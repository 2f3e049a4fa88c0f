//! Read cache with scope-based invalidation
//!
//! Reads are served from here until a confirmed write invalidates the scopes
//! it touches. There is no expiry; staleness is bounded by invalidation and
//! explicit refetches. Role capabilities are not cached here; the role
//! session owns them and resets them on every account change.

use std::collections::HashMap;

use otter_types::{Address, Pool, TokenAmount, VaultPosition};
use tokio::sync::RwLock;
use tracing::debug;

/// Identity of one cached read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Pools,
    Pool(u64),
    Position { vault: Address, account: Address },
    TokenBalance(Address),
    Allowance { owner: Address, spender: Address },
    Revenue { pool_id: u64, epoch: u64 },
    Escrow { pool_id: u64, epoch: u64 },
    Distributed { pool_id: u64, epoch: u64 },
}

/// Family of keys dropped together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Pool list and every single-pool entry
    Pools,
    /// Positions held in one vault
    Vault(Address),
    /// Positions in every vault
    AllVaults,
    TokenBalances,
    Allowances,
    Revenue,
    Escrow,
    Distribution,
}

impl Scope {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match (self, key) {
            (Scope::Pools, QueryKey::Pools | QueryKey::Pool(_)) => true,
            (Scope::Vault(vault), QueryKey::Position { vault: v, .. }) => vault == v,
            (Scope::AllVaults, QueryKey::Position { .. }) => true,
            (Scope::TokenBalances, QueryKey::TokenBalance(_)) => true,
            (Scope::Allowances, QueryKey::Allowance { .. }) => true,
            (Scope::Revenue, QueryKey::Revenue { .. }) => true,
            (Scope::Escrow, QueryKey::Escrow { .. }) => true,
            (Scope::Distribution, QueryKey::Distributed { .. }) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Pools(Vec<Pool>),
    Pool(Pool),
    Position(VaultPosition),
    Amount(TokenAmount),
    Flag(bool),
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, CachedValue>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &QueryKey) -> Option<CachedValue> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: QueryKey, value: CachedValue) {
        self.entries.write().await.insert(key, value);
    }

    /// Drop every entry in `scope`; returns how many were removed
    pub async fn invalidate(&self, scope: Scope) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !scope.matches(key));
        let removed = before - entries.len();
        debug!(?scope, removed, "Invalidated cached reads");
        removed
    }

    pub async fn invalidate_all(&self, scopes: &[Scope]) -> usize {
        let mut removed = 0;
        for scope in scopes {
            removed += self.invalidate(*scope).await;
        }
        removed
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_vault_scope_only_drops_that_vault() {
        let cache = QueryCache::new();
        let account = Address([9; 20]);
        let a = Address([1; 20]);
        let b = Address([2; 20]);

        cache
            .insert(QueryKey::Position { vault: a, account }, CachedValue::Position(VaultPosition::zero()))
            .await;
        cache
            .insert(QueryKey::Position { vault: b, account }, CachedValue::Position(VaultPosition::zero()))
            .await;
        cache.insert(QueryKey::TokenBalance(account), CachedValue::Amount(TokenAmount::zero())).await;

        assert_eq!(cache.invalidate(Scope::Vault(a)).await, 1);
        assert!(cache.get(&QueryKey::Position { vault: a, account }).await.is_none());
        assert!(cache.get(&QueryKey::Position { vault: b, account }).await.is_some());
        assert_eq!(cache.len().await, 2);

        assert_eq!(cache.invalidate(Scope::AllVaults).await, 1);
        assert_eq!(cache.invalidate(Scope::TokenBalances).await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_pools_scope_covers_detail_entries() {
        let cache = QueryCache::new();
        cache.insert(QueryKey::Pools, CachedValue::Pools(Vec::new())).await;
        cache.insert(QueryKey::Distributed { pool_id: 1, epoch: 0 }, CachedValue::Flag(true)).await;

        assert_eq!(cache.invalidate_all(&[Scope::Pools, Scope::Revenue]).await, 1);
        assert_eq!(cache.len().await, 1);
    }
}
