use crate::events::{BannerStartEvent, BannerStopEvent, ClickEvent, ViewEvent, topics};
use crate::operations::{
    InteractionLimitOperation, InteractionOutcome, StartBannerOperation,
    StartBannerOperationResult, StopBannerOperation,
};
use crate::storage::ScatterReport;
use crate::{AdError, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Started(StartBannerOperationResult),
    Stopped(ScatterReport),
    Interaction(InteractionOutcome),
    Ignored,
}

#[derive(Clone)]
pub struct EventDispatcher {
    limits: Arc<InteractionLimitOperation>,
    start: Arc<StartBannerOperation>,
    stop: Arc<StopBannerOperation>,
}

impl EventDispatcher {
    pub fn new(
        limits: Arc<InteractionLimitOperation>,
        start: Arc<StartBannerOperation>,
        stop: Arc<StopBannerOperation>,
    ) -> Self {
        Self {
            limits,
            start,
            stop,
        }
    }

    pub async fn dispatch(&self, topic: &str, payload: &[u8]) -> Result<DispatchOutcome> {
        match topic {
            topics::BANNER_START => {
                let event: BannerStartEvent = decode(topic, payload)?;
                self.limits.run_register(&event.limits()).await?;
                let result = self.start.run(&event).await?;
                Ok(DispatchOutcome::Started(result))
            }
            topics::BANNER_STOP => {
                let event: BannerStopEvent = decode(topic, payload)?;
                let report = self.stop.run(event.banner_id).await?;
                Ok(DispatchOutcome::Stopped(report))
            }
            topics::ACTION_CLICK => {
                let event: ClickEvent = decode(topic, payload)?;
                let outcome = self.limits.run_click(&event).await?;
                Ok(DispatchOutcome::Interaction(outcome))
            }
            topics::ACTION_VIEW => {
                let event: ViewEvent = decode(topic, payload)?;
                let outcome = self.limits.run_view(&event).await?;
                Ok(DispatchOutcome::Interaction(outcome))
            }
            other => {
                tracing::warn!(topic = other, "got unexpected msg");
                Ok(DispatchOutcome::Ignored)
            }
        }
    }
}

fn decode<T: DeserializeOwned>(topic: &str, payload: &[u8]) -> Result<T> {
    serde_json::from_slice(payload)
        .map_err(|error| AdError::Decode(format!("could not parse {} message: {}", topic, error)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ShardRouter;
    use crate::events::BannerReachedLimits;
    use crate::model::Platform;
    use crate::operations::{LimitNotifier, LimitState};
    use crate::platform::SqlitePlatformDirectory;
    use crate::storage::{
        CounterShard, CounterStore, InventoryShard, InventoryStore, MemoryCounterShard,
        SqliteInventoryShard,
    };
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<BannerReachedLimits>>,
    }

    #[async_trait]
    impl LimitNotifier for RecordingNotifier {
        async fn notify_limit_reached(&self, event: BannerReachedLimits) -> Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    async fn dispatcher() -> (EventDispatcher, Arc<InventoryStore>, Arc<RecordingNotifier>) {
        let counter_shards: Vec<Arc<dyn CounterShard>> = vec![Arc::new(MemoryCounterShard::new())];
        let counters = Arc::new(CounterStore::new(ShardRouter::new(counter_shards).unwrap()));

        let inventory_shards: Vec<Arc<dyn InventoryShard>> = vec![
            Arc::new(SqliteInventoryShard::open_in_memory().unwrap()),
            Arc::new(SqliteInventoryShard::open_in_memory().unwrap()),
        ];
        let inventory = Arc::new(InventoryStore::new(
            ShardRouter::new(inventory_shards).unwrap(),
            StdRng::seed_from_u64(1),
        ));

        let platforms = SqlitePlatformDirectory::open_in_memory().unwrap();
        for platform_id in [1, 2] {
            platforms
                .add_platform(Platform {
                    platform_id,
                    category_id: 5,
                })
                .await
                .unwrap();
        }

        let notifier = Arc::new(RecordingNotifier::default());
        let stop = Arc::new(StopBannerOperation::new(inventory.clone()));
        let limits = Arc::new(InteractionLimitOperation::new(
            counters,
            notifier.clone(),
            stop.clone(),
        ));
        let start = Arc::new(StartBannerOperation::new(
            inventory.clone(),
            Arc::new(platforms),
            StdRng::seed_from_u64(2),
        ));

        (EventDispatcher::new(limits, start, stop), inventory, notifier)
    }

    #[tokio::test]
    async fn test_start_click_stop_flow() {
        let (dispatcher, inventory, notifier) = dispatcher().await;

        let start = br#"{"banner_id":7,"user_id":3,"banner_text":"hi","banner_url":"http://ad",
            "limit_shows":10,"limit_clicks":1,"limit_budget":0,"category_id":5}"#;
        let outcome = dispatcher.dispatch(topics::BANNER_START, start).await.unwrap();
        match outcome {
            DispatchOutcome::Started(result) => assert_eq!(result.placed, 2),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(inventory.scan_by_platform(1, "desktop", 10).await.unwrap().len(), 1);

        let click = br#"{"banner_id":7,"platform_id":1,"price":0.5}"#;
        let outcome = dispatcher.dispatch(topics::ACTION_CLICK, click).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Interaction(InteractionOutcome {
                banner_id: 7,
                reason: crate::events::LimitReason::Clicks,
                value: 1,
                limit: 1,
                state: LimitState::Active,
                first_crossing: false,
            })
        );

        let outcome = dispatcher.dispatch(topics::ACTION_CLICK, click).await.unwrap();
        let DispatchOutcome::Interaction(outcome) = outcome else {
            panic!("expected an interaction outcome");
        };
        assert_eq!(outcome.state, LimitState::Stopped);
        assert!(outcome.first_crossing);
        assert_eq!(notifier.events.lock().unwrap().len(), 1);
        assert!(inventory.scan_by_platform(1, "desktop", 10).await.unwrap().is_empty());

        let outcome = dispatcher
            .dispatch(topics::BANNER_STOP, br#"{"banner_id":7}"#)
            .await
            .unwrap();
        match outcome {
            DispatchOutcome::Stopped(report) => {
                assert!(report.is_complete());
                assert_eq!(report.deleted, 0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_view_for_unknown_banner_is_not_found() {
        let (dispatcher, _, _) = dispatcher().await;
        let error = dispatcher
            .dispatch(topics::ACTION_VIEW, br#"{"banner_id":404,"platform_id":1}"#)
            .await
            .unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_bad_payload_and_unknown_topic() {
        let (dispatcher, _, notifier) = dispatcher().await;

        let error = dispatcher
            .dispatch(topics::ACTION_CLICK, b"not json")
            .await
            .unwrap_err();
        assert!(matches!(error, AdError::Decode(_)));

        let outcome = dispatcher.dispatch("adeliver.unknown", b"{}").await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert!(notifier.events.lock().unwrap().is_empty());
    }
}
