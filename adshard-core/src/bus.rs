use crate::events::{BannerReachedLimits, ViewEvent, topics};
use crate::impressions::ImpressionSink;
use crate::operations::LimitNotifier;
use crate::{AdError, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Topics are Redis lists under `{namespace}:{topic}`, written with RPUSH and
/// drained with BLPOP.
#[derive(Clone)]
pub struct RedisBus {
    publisher: ConnectionManager,
    // BLPOP holds its connection, so consumption gets its own.
    consumer: ConnectionManager,
    namespace: String,
}

impl RedisBus {
    pub async fn new(url: &str, namespace: &str) -> Result<Self> {
        let namespace = namespace.trim();
        if namespace.is_empty() {
            return Err(AdError::Config("bus namespace cannot be empty".to_string()));
        }

        let client = redis::Client::open(url)
            .map_err(|error| AdError::Config(format!("invalid bus url '{}': {}", url, error)))?;
        let publisher = ConnectionManager::new(client.clone()).await?;
        let consumer = ConnectionManager::new(client).await?;

        Ok(Self {
            publisher,
            consumer,
            namespace: namespace.to_string(),
        })
    }

    pub fn topic_key(&self, topic: &str) -> String {
        format!("{}:{}", self.namespace, topic)
    }

    pub async fn publish<T: Serialize>(&self, topic: &str, event: &T) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        let mut conn = self.publisher.clone();
        let _: i64 = conn.rpush(self.topic_key(topic), payload).await?;
        Ok(())
    }

    /// Waits up to `timeout` for the next message on any of `topics`.
    pub async fn next_message(
        &self,
        topic_names: &[&str],
        timeout: Duration,
    ) -> Result<Option<BusMessage>> {
        let keys: Vec<String> = topic_names.iter().map(|topic| self.topic_key(topic)).collect();
        let mut conn = self.consumer.clone();

        let popped: Option<(String, Vec<u8>)> = redis::cmd("BLPOP")
            .arg(&keys)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await?;

        Ok(popped.map(|(key, payload)| BusMessage {
            topic: self.topic_of(&key).to_string(),
            payload,
        }))
    }

    fn topic_of<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(&self.namespace)
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(key)
    }
}

#[async_trait]
impl LimitNotifier for RedisBus {
    async fn notify_limit_reached(&self, event: BannerReachedLimits) -> Result<()> {
        self.publish(topics::BANNER_LIMITS, &event).await
    }
}

#[async_trait]
impl ImpressionSink for RedisBus {
    async fn record_view(&self, view: &ViewEvent) -> Result<()> {
        self.publish(topics::ACTION_VIEW, view).await
    }
}
