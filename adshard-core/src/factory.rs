use crate::cluster::ShardRouter;
use crate::storage::{
    CounterShard, CounterStore, InventoryShard, InventoryStore, MemoryCounterShard,
    RedisCounterShard, SqliteInventoryShard,
};
use crate::{AdError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const MEMORY_COUNTER_URL: &str = "memory://";
pub const MEMORY_INVENTORY_PATH: &str = ":memory:";

/// Builds the two shard clusters from configured endpoints.
#[derive(Debug, Clone, Default)]
pub struct ClusterBuilder {
    counter_urls: Option<Vec<String>>,
    inventory_paths: Option<Vec<PathBuf>>,
    op_timeout: Option<Duration>,
    seed: Option<u64>,
}

impl ClusterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter_urls(mut self, urls: Vec<String>) -> Self {
        self.counter_urls = Some(urls);
        self
    }

    pub fn inventory_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.inventory_paths = Some(paths);
        self
    }

    pub fn op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }

    /// Fixes the randomness of shuffles; unseeded builders draw from entropy.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// A fresh generator per engine; seeded builders derive distinct streams.
    pub fn rng(&self, stream: u64) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
            None => StdRng::from_entropy(),
        }
    }

    pub async fn build_counter_store(&self) -> Result<CounterStore> {
        let urls = self
            .counter_urls
            .clone()
            .ok_or_else(|| AdError::Config("counter shard urls are required".to_string()))?;
        if urls.is_empty() {
            return Err(AdError::Config(
                "counter shard urls cannot be empty".to_string(),
            ));
        }

        let mut shards: Vec<Arc<dyn CounterShard>> = Vec::with_capacity(urls.len());
        for url in urls {
            let url = url.trim();
            if url.is_empty() {
                return Err(AdError::Config("counter shard url cannot be empty".to_string()));
            }

            if url == MEMORY_COUNTER_URL {
                shards.push(Arc::new(MemoryCounterShard::new()));
            } else {
                shards.push(Arc::new(RedisCounterShard::new(url).await?));
            }
        }

        Ok(CounterStore::new(ShardRouter::new(shards)?).with_op_timeout(self.op_timeout))
    }

    pub fn build_inventory_store(&self, rng: StdRng) -> Result<InventoryStore> {
        let paths = self
            .inventory_paths
            .clone()
            .ok_or_else(|| AdError::Config("inventory shard paths are required".to_string()))?;
        if paths.is_empty() {
            return Err(AdError::Config(
                "inventory shard paths cannot be empty".to_string(),
            ));
        }

        let mut shards: Vec<Arc<dyn InventoryShard>> = Vec::with_capacity(paths.len());
        for path in paths {
            if path.as_os_str().is_empty() {
                return Err(AdError::Config(
                    "inventory shard path cannot be empty".to_string(),
                ));
            }

            let shard = if path.as_os_str() == MEMORY_INVENTORY_PATH {
                SqliteInventoryShard::open_in_memory()?
            } else {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                SqliteInventoryShard::open(&path)?
            };
            tracing::info!("Opened inventory shard {:?}", path);
            shards.push(Arc::new(shard));
        }

        Ok(InventoryStore::new(ShardRouter::new(shards)?, rng).with_op_timeout(self.op_timeout))
    }
}
