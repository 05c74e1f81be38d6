use crate::events::ViewEvent;
use crate::impressions::ImpressionQueue;
use crate::model::ServingRecord;
use crate::storage::InventoryStore;
use crate::{AdError, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct ShowBannersOperation {
    inventory: Arc<InventoryStore>,
    impressions: Arc<ImpressionQueue>,
}

#[derive(Debug, Clone)]
pub struct ShowBannersOperationRequest {
    pub platform_id: u64,
    pub device: String,
    pub user_agent: String,
    pub limit: usize,
}

impl ShowBannersOperation {
    pub fn new(inventory: Arc<InventoryStore>, impressions: Arc<ImpressionQueue>) -> Self {
        Self {
            inventory,
            impressions,
        }
    }

    /// Returns up to `limit` random records and queues one impression per
    /// record without waiting for it to be counted.
    pub async fn run(&self, request: ShowBannersOperationRequest) -> Result<Vec<ServingRecord>> {
        let ShowBannersOperationRequest {
            platform_id,
            device,
            user_agent,
            limit,
        } = request;

        let records = self
            .inventory
            .scan_by_platform(platform_id, &device, limit)
            .await?;

        let created_at = chrono::Utc::now().timestamp();
        let views = records
            .iter()
            .map(|record| ViewEvent {
                banner_id: record.banner_id,
                platform_id,
                user_agent: user_agent.clone(),
                device: device.clone(),
                created_at,
            })
            .collect();

        match self.impressions.submit(views) {
            Ok(()) => {}
            Err(AdError::QueueFull) => {
                tracing::warn!(
                    platform_id,
                    dropped = records.len(),
                    "impression queue full, views not registered"
                );
            }
            Err(error) => return Err(error),
        }

        Ok(records)
    }
}
