//! Pool aggregation over the asset registry

use std::sync::Arc;

use futures::future::join_all;
use otter_types::{OtterError, OtterResult, Pool};
use tracing::debug;

use crate::client::ChainReader;

/// Builds the pool list from `poolCount` and per-id `getPool` reads
pub struct PoolAggregator {
    reader: Arc<dyn ChainReader>,
}

impl PoolAggregator {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    /// Read ids `1..=pool_count` concurrently
    ///
    /// Failed reads and malformed records are left out; the result is ordered
    /// by id and every id comes from its request position.
    pub async fn aggregate(&self, pool_count: u64) -> Vec<Pool> {
        if pool_count == 0 {
            return Vec::new();
        }

        let reads = (1..=pool_count).map(|id| {
            let reader = Arc::clone(&self.reader);
            async move { (id, reader.get_pool(id).await) }
        });

        join_all(reads)
            .await
            .into_iter()
            .filter_map(|(id, result)| match result.and_then(|record| Pool::from_record(id, record)) {
                Ok(pool) => Some(pool),
                Err(e) => {
                    debug!("Omitting pool {}: {}", id, e);
                    None
                }
            })
            .collect()
    }

    /// `poolCount()` followed by [`aggregate`](Self::aggregate)
    pub async fn fetch_all(&self) -> OtterResult<Vec<Pool>> {
        let count = self.reader.pool_count().await?;
        debug!("Registry reports {} pools", count);
        Ok(self.aggregate(count).await)
    }

    /// Single pool detail read
    pub async fn fetch_one(&self, pool_id: u64) -> OtterResult<Pool> {
        if pool_id == 0 {
            return Err(OtterError::invalid_parameter("pool_id", "0", "1-based pool id"));
        }
        let record = self.reader.get_pool(pool_id).await?;
        Pool::from_record(pool_id, record)
    }
}
