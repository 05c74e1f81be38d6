use crate::events::BannerStartEvent;
use crate::platform::PlatformDirectory;
use crate::storage::InventoryStore;
use crate::{AdError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::{Arc, Mutex};

/// Places a starting banner on every platform of its category.
pub struct StartBannerOperation {
    inventory: Arc<InventoryStore>,
    platforms: Arc<dyn PlatformDirectory>,
    rng: Mutex<StdRng>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartBannerOperationResult {
    pub banner_id: u64,
    pub eligible: usize,
    pub placed: usize,
    pub failed_platforms: Vec<u64>,
}

impl StartBannerOperation {
    pub fn new(
        inventory: Arc<InventoryStore>,
        platforms: Arc<dyn PlatformDirectory>,
        rng: StdRng,
    ) -> Self {
        Self {
            inventory,
            platforms,
            rng: Mutex::new(rng),
        }
    }

    /// Best effort: a failed platform is logged and skipped, the rest are still placed.
    pub async fn run(&self, event: &BannerStartEvent) -> Result<StartBannerOperationResult> {
        let mut platform_ids: Vec<u64> = self
            .platforms
            .platforms_by_category(event.category_id)
            .await?
            .into_iter()
            .map(|platform| platform.platform_id)
            .collect();

        {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| AdError::Internal("placement rng lock poisoned".to_string()))?;
            platform_ids.shuffle(&mut *rng);
        }

        let mut result = StartBannerOperationResult {
            banner_id: event.banner_id,
            eligible: platform_ids.len(),
            placed: 0,
            failed_platforms: Vec::new(),
        };

        for platform_id in platform_ids {
            match self.inventory.insert(&event.record_for(platform_id)).await {
                Ok(()) => result.placed += 1,
                Err(error) => {
                    tracing::error!(
                        banner_id = event.banner_id,
                        platform_id,
                        "could not insert banner: {}",
                        error
                    );
                    result.failed_platforms.push(platform_id);
                }
            }
        }

        tracing::info!(
            banner_id = event.banner_id,
            category_id = event.category_id,
            placed = result.placed,
            failed = result.failed_platforms.len(),
            "banner started"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ShardRouter;
    use crate::model::{Platform, RecordKey, ServingRecord};
    use crate::platform::SqlitePlatformDirectory;
    use crate::storage::{InventoryShard, SqliteInventoryShard, TupleValue};
    use async_trait::async_trait;
    use bytes::Bytes;
    use rand::SeedableRng;

    struct BrokenShard;

    #[async_trait]
    impl InventoryShard for BrokenShard {
        async fn insert(&self, _record: &ServingRecord) -> Result<()> {
            Err(AdError::Shard {
                shard: 1,
                message: "disk full".to_string(),
            })
        }

        async fn select_by_platform(
            &self,
            _platform_id: u64,
            _device: &str,
            _offset: usize,
            _limit: usize,
        ) -> Result<Vec<Vec<TupleValue>>> {
            Ok(Vec::new())
        }

        async fn select_by_banner(
            &self,
            _banner_id: u64,
            _offset: usize,
            _limit: usize,
        ) -> Result<Vec<Vec<TupleValue>>> {
            Ok(Vec::new())
        }

        async fn delete(&self, _key: &RecordKey) -> Result<bool> {
            Ok(false)
        }
    }

    fn event(banner_id: u64, category_id: u64) -> BannerStartEvent {
        BannerStartEvent {
            banner_id,
            user_id: 2,
            img_data: Bytes::from_static(b"img"),
            banner_text: "text".to_string(),
            banner_url: "http://example.com".to_string(),
            limit_shows: 10,
            limit_clicks: 10,
            limit_budget: 0.0,
            device: "desktop".to_string(),
            category_id,
        }
    }

    async fn directory(platforms: &[(u64, u64)]) -> Arc<dyn PlatformDirectory> {
        let directory = SqlitePlatformDirectory::open_in_memory().unwrap();
        for &(platform_id, category_id) in platforms {
            directory
                .add_platform(Platform {
                    platform_id,
                    category_id,
                })
                .await
                .unwrap();
        }
        Arc::new(directory)
    }

    fn store(handles: Vec<Arc<dyn InventoryShard>>) -> Arc<InventoryStore> {
        Arc::new(InventoryStore::new(
            ShardRouter::new(handles).unwrap(),
            StdRng::seed_from_u64(3),
        ))
    }

    #[tokio::test]
    async fn test_places_only_on_platforms_of_the_category() {
        let handles: Vec<Arc<dyn InventoryShard>> = vec![
            Arc::new(SqliteInventoryShard::open_in_memory().unwrap()),
            Arc::new(SqliteInventoryShard::open_in_memory().unwrap()),
        ];
        let inventory = store(handles);
        let platforms = directory(&[(1, 7), (2, 8), (3, 7), (4, 8), (5, 7)]).await;
        let op = StartBannerOperation::new(inventory.clone(), platforms, StdRng::seed_from_u64(4));

        let result = op.run(&event(30, 7)).await.unwrap();
        assert_eq!(result.eligible, 3);
        assert_eq!(result.placed, 3);
        assert!(result.failed_platforms.is_empty());

        for platform_id in [1, 3, 5] {
            let records = inventory.scan_by_platform(platform_id, "desktop", 10).await.unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].banner_id, 30);
        }
        for platform_id in [2, 4] {
            let records = inventory.scan_by_platform(platform_id, "desktop", 10).await.unwrap();
            assert!(records.is_empty());
        }
    }

    #[tokio::test]
    async fn test_failed_platform_does_not_stop_the_rest() {
        let healthy = SqliteInventoryShard::open_in_memory().unwrap();
        let handles: Vec<Arc<dyn InventoryShard>> =
            vec![Arc::new(healthy.clone()), Arc::new(BrokenShard)];
        let inventory = store(handles);
        let platforms = directory(&[(2, 1), (3, 1), (4, 1), (5, 1)]).await;
        let op = StartBannerOperation::new(inventory.clone(), platforms, StdRng::seed_from_u64(5));

        let mut result = op.run(&event(31, 1)).await.unwrap();
        result.failed_platforms.sort_unstable();

        assert_eq!(result.eligible, 4);
        assert_eq!(result.placed, 2);
        assert_eq!(result.failed_platforms, vec![3, 5]);
        for platform_id in [2, 4] {
            let records = inventory.scan_by_platform(platform_id, "desktop", 10).await.unwrap();
            assert_eq!(records.len(), 1);
        }
        assert_eq!(healthy.select_by_banner(31, 0, 10).await.unwrap().len(), 2);
    }
}
