use super::counter_store::CounterShard;
use crate::{AdError, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Counter shard on one Redis node.
#[derive(Clone)]
pub struct RedisCounterShard {
    conn: ConnectionManager,
}

impl RedisCounterShard {
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|error| {
            AdError::Config(format!("invalid redis url '{}': {}", url, error))
        })?;

        let conn = ConnectionManager::new(client).await.map_err(|error| AdError::Shard {
            shard: 0,
            message: format!("redis connection to {} failed: {}", url, error),
        })?;

        tracing::info!("Connected counter shard at {}", url);
        Ok(Self { conn })
    }
}

#[async_trait]
impl CounterShard for RedisCounterShard {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(key, delta).await?;
        Ok(value)
    }

    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64> {
        let mut conn = self.conn.clone();
        let value: f64 = redis::cmd("INCRBYFLOAT")
            .arg(key)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }
}
