//! Storage modules for Adshard
//!
//! Provides the sharded serving inventory and the per-banner interaction counters.

pub mod counter_store;
pub mod inventory_store;
pub mod memory_counter;
pub mod redis_counter;
pub mod sqlite_inventory;
pub mod tuple;

pub use counter_store::{CounterShard, CounterStore};
pub use inventory_store::{INVENTORY_PAGE_SIZE, InventoryShard, InventoryStore, ScatterReport};
pub use memory_counter::MemoryCounterShard;
pub use redis_counter::RedisCounterShard;
pub use sqlite_inventory::SqliteInventoryShard;
pub use tuple::{TupleValue, decode_record, encode_record};

use crate::{AdError, Result};
use std::future::Future;
use std::time::Duration;

/// Runs one shard sub-operation under the optional caller deadline.
pub(crate) async fn with_deadline<T>(
    shard: usize,
    deadline: Option<Duration>,
    op: impl Future<Output = Result<T>>,
) -> Result<T> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, op)
            .await
            .map_err(|_| AdError::Timeout { shard })?,
        None => op.await,
    }
}

/// SQLite connection shared between async callers; statements run on the
/// blocking pool.
#[derive(Clone)]
pub(crate) struct SharedConnection {
    conn: std::sync::Arc<std::sync::Mutex<rusqlite::Connection>>,
}

impl SharedConnection {
    pub(crate) fn new(conn: rusqlite::Connection) -> Self {
        Self {
            conn: std::sync::Arc::new(std::sync::Mutex::new(conn)),
        }
    }

    pub(crate) async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| AdError::Internal("sqlite connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await?
    }
}
