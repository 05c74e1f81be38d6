use super::interaction_limit::BannerStopper;
use crate::Result;
use crate::storage::{InventoryStore, ScatterReport};
use async_trait::async_trait;
use std::sync::Arc;

/// Withdraws a banner from every inventory shard. Stopping an absent banner is a no-op.
#[derive(Clone)]
pub struct StopBannerOperation {
    inventory: Arc<InventoryStore>,
}

impl StopBannerOperation {
    pub fn new(inventory: Arc<InventoryStore>) -> Self {
        Self { inventory }
    }

    pub async fn run(&self, banner_id: u64) -> Result<ScatterReport> {
        self.inventory.delete_all_by_banner(banner_id).await
    }
}

#[async_trait]
impl BannerStopper for StopBannerOperation {
    async fn stop_banner(&self, banner_id: u64) -> Result<()> {
        self.run(banner_id).await.map(|_| ())
    }
}
