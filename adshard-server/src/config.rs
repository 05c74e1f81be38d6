use adshard_core::{AdError, ClusterBuilder, DEFAULT_QUEUE_CAPACITY, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Redis URLs, one per counter shard. `memory://` keeps a shard in process.
    pub counter_shards: Vec<String>,
    /// SQLite files, one per inventory shard. `:memory:` keeps a shard in process.
    pub inventory_shards: Vec<PathBuf>,
    pub platforms: PathBuf,
    pub bus: BusConfig,
    #[serde(default)]
    pub serving: ServingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub url: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl BusConfig {
    pub fn namespace_or_default(&self) -> &str {
        self.namespace
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or("adshard")
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

fn default_poll_timeout_secs() -> u64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_show_limit")]
    pub default_limit: usize,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            default_limit: default_show_limit(),
        }
    }
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_show_limit() -> usize {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub op_timeout_ms: Option<u64>,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(
                ::config::Environment::with_prefix("ADSHARD")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| AdError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| AdError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.counter_shards.is_empty() {
            return Err(AdError::Config("counter_shards cannot be empty".to_string()));
        }
        if self.counter_shards.iter().any(|url| url.trim().is_empty()) {
            return Err(AdError::Config(
                "counter_shards cannot contain an empty url".to_string(),
            ));
        }
        if self.inventory_shards.is_empty() {
            return Err(AdError::Config("inventory_shards cannot be empty".to_string()));
        }
        if self
            .inventory_shards
            .iter()
            .any(|path| path.as_os_str().is_empty())
        {
            return Err(AdError::Config(
                "inventory_shards cannot contain an empty path".to_string(),
            ));
        }
        if self.platforms.as_os_str().is_empty() {
            return Err(AdError::Config("platforms path cannot be empty".to_string()));
        }
        if self.bus.url.trim().is_empty() {
            return Err(AdError::Config("bus.url cannot be empty".to_string()));
        }
        if self.bus.poll_timeout_secs == 0 {
            return Err(AdError::Config(
                "bus.poll_timeout_secs must be positive".to_string(),
            ));
        }
        if self.serving.queue_capacity == 0 {
            return Err(AdError::Config(
                "serving.queue_capacity must be positive".to_string(),
            ));
        }
        if self.storage.op_timeout_ms == Some(0) {
            return Err(AdError::Config(
                "storage.op_timeout_ms must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cluster_builder(&self) -> ClusterBuilder {
        let mut builder = ClusterBuilder::new()
            .counter_urls(self.counter_shards.clone())
            .inventory_paths(self.inventory_shards.clone());
        if let Some(ms) = self.storage.op_timeout_ms {
            builder = builder.op_timeout(Duration::from_millis(ms));
        }
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        builder
    }
}
