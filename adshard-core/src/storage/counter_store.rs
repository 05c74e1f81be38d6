use super::with_deadline;
use crate::cluster::ShardRouter;
use crate::model::{BannerLimits, CounterField, CounterValue};
use crate::{AdError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Key/value node with server-side atomic increments (Redis semantics).
#[async_trait]
pub trait CounterShard: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Atomically adds `delta` and returns the new value; a missing key counts as 0.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64>;
}

/// Per-banner limits and interaction counters, partitioned by banner ID.
pub struct CounterStore {
    router: ShardRouter<Arc<dyn CounterShard>>,
    op_timeout: Option<Duration>,
}

impl CounterStore {
    pub fn new(router: ShardRouter<Arc<dyn CounterShard>>) -> Self {
        Self {
            router,
            op_timeout: None,
        }
    }

    pub fn with_op_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn interactions_key(banner_id: u64, field: CounterField) -> String {
        format!("interactions.{}.{}", banner_id, field.key_suffix())
    }

    pub fn info_key(banner_id: u64) -> String {
        format!("info.{}", banner_id)
    }

    pub async fn put_limits(&self, limits: &BannerLimits) -> Result<()> {
        let (shard, node) = self.locate(limits.banner_id);
        let payload = serde_json::to_string(limits)?;

        with_deadline(
            shard,
            self.op_timeout,
            node.set(&Self::info_key(limits.banner_id), &payload),
        )
        .await
    }

    pub async fn limits(&self, banner_id: u64) -> Result<BannerLimits> {
        let (shard, node) = self.locate(banner_id);
        let raw = with_deadline(shard, self.op_timeout, node.get(&Self::info_key(banner_id)))
            .await?
            .ok_or_else(|| AdError::not_found("banner limits", banner_id))?;

        serde_json::from_str(&raw)
            .map_err(|error| AdError::Decode(format!("limits of banner {}: {}", banner_id, error)))
    }

    pub async fn get(&self, banner_id: u64, field: CounterField) -> Result<CounterValue> {
        let (shard, node) = self.locate(banner_id);
        let key = Self::interactions_key(banner_id, field);
        let raw = with_deadline(shard, self.op_timeout, node.get(&key))
            .await?
            .ok_or_else(|| AdError::not_found("counter", &key))?;

        parse_counter(field, &raw)
            .ok_or_else(|| AdError::Decode(format!("counter {} holds {:?}", key, raw)))
    }

    /// Single round trip increment; counters only grow.
    pub async fn increment(
        &self,
        banner_id: u64,
        field: CounterField,
        delta: CounterValue,
    ) -> Result<CounterValue> {
        let (shard, node) = self.locate(banner_id);
        let key = Self::interactions_key(banner_id, field);

        match (field, delta) {
            (CounterField::Clicks | CounterField::Impressions, CounterValue::Count(delta)) => {
                if delta < 0 {
                    return Err(AdError::InvalidRequest(format!(
                        "counter {} cannot decrease by {}",
                        key, delta
                    )));
                }
                let value = with_deadline(shard, self.op_timeout, node.incr_by(&key, delta)).await?;
                Ok(CounterValue::Count(value))
            }
            (CounterField::Spend, delta) => {
                let delta = delta.as_amount();
                if !delta.is_finite() || delta < 0.0 {
                    return Err(AdError::InvalidRequest(format!(
                        "spend {} cannot change by {}",
                        key, delta
                    )));
                }
                let value =
                    with_deadline(shard, self.op_timeout, node.incr_by_float(&key, delta)).await?;
                Ok(CounterValue::Amount(value))
            }
            (field, CounterValue::Amount(delta)) => Err(AdError::InvalidRequest(format!(
                "{} counter takes whole increments, got {}",
                field, delta
            ))),
        }
    }

    fn locate(&self, banner_id: u64) -> (usize, &Arc<dyn CounterShard>) {
        (self.router.shard_for(banner_id), self.router.node(banner_id))
    }
}

fn parse_counter(field: CounterField, raw: &str) -> Option<CounterValue> {
    match field {
        CounterField::Clicks | CounterField::Impressions => {
            raw.trim().parse().ok().map(CounterValue::Count)
        }
        CounterField::Spend => raw.trim().parse().ok().map(CounterValue::Amount),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory_counter::MemoryCounterShard;

    fn store(shards: usize) -> (CounterStore, Vec<Arc<MemoryCounterShard>>) {
        let nodes: Vec<Arc<MemoryCounterShard>> =
            (0..shards).map(|_| Arc::new(MemoryCounterShard::new())).collect();
        let handles = nodes
            .iter()
            .map(|node| node.clone() as Arc<dyn CounterShard>)
            .collect();
        (CounterStore::new(ShardRouter::new(handles).unwrap()), nodes)
    }

    fn limits(banner_id: u64) -> BannerLimits {
        BannerLimits {
            banner_id,
            limit_impressions: 1000,
            limit_clicks: 3,
            limit_budget: 50.0,
        }
    }

    #[tokio::test]
    async fn test_limits_round_trip_on_banner_shard() {
        let (store, nodes) = store(2);
        store.put_limits(&limits(5)).await.unwrap();

        assert_eq!(store.limits(5).await.unwrap(), limits(5));
        assert!(nodes[1].get("info.5").await.unwrap().is_some());
        assert!(nodes[0].get("info.5").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_limits_and_counters_are_not_found() {
        let (store, _) = store(1);

        assert!(store.limits(9).await.unwrap_err().is_not_found());
        assert!(store
            .get(9, CounterField::Clicks)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_increment_fields_independently() {
        let (store, _) = store(3);

        assert_eq!(
            store
                .increment(42, CounterField::Clicks, CounterValue::Count(1))
                .await
                .unwrap(),
            CounterValue::Count(1)
        );
        store
            .increment(42, CounterField::Impressions, CounterValue::Count(5))
            .await
            .unwrap();
        store
            .increment(42, CounterField::Spend, CounterValue::Amount(1.5))
            .await
            .unwrap();
        store
            .increment(42, CounterField::Spend, CounterValue::Count(2))
            .await
            .unwrap();

        assert_eq!(store.get(42, CounterField::Clicks).await.unwrap(), CounterValue::Count(1));
        assert_eq!(
            store.get(42, CounterField::Impressions).await.unwrap(),
            CounterValue::Count(5)
        );
        assert_eq!(store.get(42, CounterField::Spend).await.unwrap(), CounterValue::Amount(3.5));
    }

    #[tokio::test]
    async fn test_increment_rejects_decrements_and_fractional_counts() {
        let (store, _) = store(1);

        assert!(store
            .increment(1, CounterField::Clicks, CounterValue::Count(-1))
            .await
            .is_err());
        assert!(store
            .increment(1, CounterField::Spend, CounterValue::Amount(-0.5))
            .await
            .is_err());
        assert!(store
            .increment(1, CounterField::Impressions, CounterValue::Amount(0.5))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let (store, _) = store(2);
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .increment(7, CounterField::Clicks, CounterValue::Count(1))
                    .await
                    .unwrap()
            }));
        }

        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap().as_count().unwrap());
        }
        seen.sort();

        assert_eq!(seen, (1..=50).collect::<Vec<i64>>());
    }
}
