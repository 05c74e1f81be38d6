use super::tuple::{TupleValue, decode_key, decode_record};
use super::with_deadline;
use crate::cluster::ShardRouter;
use crate::model::{RecordKey, ServingRecord};
use crate::{AdError, Result};
use async_trait::async_trait;
use futures_util::future::join_all;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const INVENTORY_PAGE_SIZE: usize = 1000;

/// One inventory node. Rows come back as raw tuples; decoding is the store's job.
#[async_trait]
pub trait InventoryShard: Send + Sync {
    /// Creates or overwrites the record under its composite key.
    async fn insert(&self, record: &ServingRecord) -> Result<()>;

    async fn select_by_platform(
        &self,
        platform_id: u64,
        device: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Vec<TupleValue>>>;

    async fn select_by_banner(
        &self,
        banner_id: u64,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Vec<TupleValue>>>;

    /// Returns false when nothing matched the key.
    async fn delete(&self, key: &RecordKey) -> Result<bool>;
}

/// Outcome of a delete issued to every shard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScatterReport {
    pub shards: usize,
    pub deleted: usize,
    pub failed_shards: Vec<(usize, String)>,
}

impl ScatterReport {
    pub fn is_complete(&self) -> bool {
        self.failed_shards.is_empty()
    }
}

/// Serving records partitioned by platform ID.
pub struct InventoryStore {
    router: ShardRouter<Arc<dyn InventoryShard>>,
    rng: Mutex<StdRng>,
    page_size: usize,
    op_timeout: Option<Duration>,
}

impl InventoryStore {
    pub fn new(router: ShardRouter<Arc<dyn InventoryShard>>, rng: StdRng) -> Self {
        Self {
            router,
            rng: Mutex::new(rng),
            page_size: INVENTORY_PAGE_SIZE,
            op_timeout: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_op_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn shard_count(&self) -> usize {
        self.router.len()
    }

    pub async fn insert(&self, record: &ServingRecord) -> Result<()> {
        let shard = self.router.shard_for(record.platform_id);
        let node = self.router.node(record.platform_id);

        with_deadline(shard, self.op_timeout, node.insert(record)).await
    }

    /// Reads every record of a platform and device, then returns a random
    /// subset of at most `limit` of them.
    pub async fn scan_by_platform(
        &self,
        platform_id: u64,
        device: &str,
        limit: usize,
    ) -> Result<Vec<ServingRecord>> {
        let shard = self.router.shard_for(platform_id);
        let node = self.router.node(platform_id);

        let mut records = Vec::new();
        let mut offset = 0;
        loop {
            let page = with_deadline(
                shard,
                self.op_timeout,
                node.select_by_platform(platform_id, device, offset, self.page_size),
            )
            .await?;

            if page.is_empty() {
                break;
            }
            offset += page.len();

            for tuple in &page {
                match decode_record(tuple) {
                    Ok(record) if record.platform_id == platform_id && record.device == device => {
                        records.push(record)
                    }
                    Ok(record) => tracing::warn!(
                        shard,
                        platform_id,
                        "skipping record of platform {} device {} returned for another scan",
                        record.platform_id,
                        record.device
                    ),
                    Err(error) => tracing::warn!(
                        shard,
                        platform_id,
                        "skipping undecodable serving record: {}",
                        error
                    ),
                }
            }
        }

        {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| AdError::Internal("inventory rng lock poisoned".to_string()))?;
            records.shuffle(&mut *rng);
        }
        records.truncate(limit);

        Ok(records)
    }

    /// Removes every record of `banner_id` from every shard.
    ///
    /// Shards fail independently: a failed shard is logged and reported while
    /// the others still run to completion. Records removed by a shard before
    /// it failed are still counted.
    pub async fn delete_all_by_banner(&self, banner_id: u64) -> Result<ScatterReport> {
        let results = join_all(self.router.nodes().iter().enumerate().map(
            |(shard, node)| async move {
                let mut deleted = 0;
                let result = self
                    .delete_on_shard(shard, node.as_ref(), banner_id, &mut deleted)
                    .await;
                (deleted, result)
            },
        ))
        .await;

        let mut report = ScatterReport {
            shards: results.len(),
            ..ScatterReport::default()
        };

        for (shard, (deleted, result)) in results.into_iter().enumerate() {
            report.deleted += deleted;
            if let Err(error) = result {
                tracing::error!(shard, banner_id, "could not delete banner: {}", error);
                report.failed_shards.push((shard, error.to_string()));
            }
        }

        tracing::info!(
            banner_id,
            deleted = report.deleted,
            failed = report.failed_shards.len(),
            "banner removed from inventory"
        );

        Ok(report)
    }

    // Re-reads the index from the first row that cannot be deleted: rows
    // removed in the previous round no longer occupy the front of it. A
    // delete that matches nothing means a concurrent stop got there first.
    async fn delete_on_shard(
        &self,
        shard: usize,
        node: &dyn InventoryShard,
        banner_id: u64,
        deleted: &mut usize,
    ) -> Result<()> {
        let mut stuck = 0;
        let mut last_missed: Vec<RecordKey> = Vec::new();
        loop {
            let page = with_deadline(
                shard,
                self.op_timeout,
                node.select_by_banner(banner_id, stuck, self.page_size),
            )
            .await?;

            if page.is_empty() {
                break;
            }

            let mut removed = 0;
            let mut missed = Vec::new();
            for tuple in &page {
                let key = match decode_key(tuple) {
                    Ok(key) if key.banner_id == banner_id => key,
                    Ok(key) => {
                        tracing::warn!(
                            shard,
                            banner_id,
                            "index returned foreign banner {}",
                            key.banner_id
                        );
                        stuck += 1;
                        continue;
                    }
                    Err(error) => {
                        tracing::warn!(shard, banner_id, "could not decode record key: {}", error);
                        stuck += 1;
                        continue;
                    }
                };

                if with_deadline(shard, self.op_timeout, node.delete(&key)).await? {
                    removed += 1;
                } else {
                    missed.push(key);
                }
            }
            *deleted += removed;

            // The same rows listed again after a delete reported them absent.
            if removed == 0 && !missed.is_empty() && missed == last_missed {
                return Err(AdError::Shard {
                    shard,
                    message: format!(
                        "{} records of banner {} are listed but not deletable",
                        missed.len(),
                        banner_id
                    ),
                });
            }
            last_missed = missed;
        }

        if stuck > 0 {
            return Err(AdError::Shard {
                shard,
                message: format!("{} records of banner {} cannot be deleted", stuck, banner_id),
            });
        }
        Ok(())
    }
}
