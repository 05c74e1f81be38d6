//! Adshard Core - sharded banner inventory with interaction limits
//!
//! Places advertising banners onto the platforms of their category and serves
//! them back, while counting clicks and impressions per banner:
//! - modulo routing over a fixed list of shards
//! - SQLite tuple storage for serving records
//! - atomic Redis counters for interactions and spend
//! - a limit engine that withdraws a banner once it crosses its limit

pub mod bus;
pub mod cluster;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod factory;
pub mod impressions;
pub mod model;
pub mod operations;
pub mod platform;
pub mod storage;

pub use bus::{BusMessage, RedisBus};
pub use cluster::ShardRouter;
pub use dispatch::{DispatchOutcome, EventDispatcher};
pub use error::{AdError, Result};
pub use events::{
    BannerReachedLimits, BannerStartEvent, BannerStopEvent, ClickEvent, LimitReason, ViewEvent,
    topics,
};
pub use factory::{ClusterBuilder, MEMORY_COUNTER_URL, MEMORY_INVENTORY_PATH};
pub use impressions::{DEFAULT_QUEUE_CAPACITY, ImpressionQueue, ImpressionSink};
pub use model::{
    BannerLimits, CounterField, CounterValue, DEVICE_DESKTOP, Platform, RecordKey, ServingRecord,
};
pub use operations::{
    BannerStopper, InteractionLimitOperation, InteractionOutcome, LimitNotifier, LimitState,
    ShowBannersOperation, ShowBannersOperationRequest, StartBannerOperation,
    StartBannerOperationResult, StopBannerOperation,
};
pub use platform::{PlatformDirectory, SqlitePlatformDirectory};
pub use storage::{
    CounterShard, CounterStore, InventoryShard, InventoryStore, MemoryCounterShard,
    RedisCounterShard, ScatterReport, SqliteInventoryShard,
};
