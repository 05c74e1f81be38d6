use super::counter_store::CounterShard;
use crate::{AdError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-process counter shard with the same increment semantics as Redis
/// `INCRBY` / `INCRBYFLOAT`. Used for embedded runs and tests.
#[derive(Debug, Default)]
pub struct MemoryCounterShard {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryCounterShard {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<T>(
        &self,
        key: &str,
        apply: impl FnOnce(Option<&String>) -> Result<(T, String)>,
    ) -> Result<T> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| AdError::Internal("counter shard lock poisoned".to_string()))?;
        let (result, stored) = apply(values.get(key))?;
        values.insert(key.to_string(), stored);
        Ok(result)
    }
}

#[async_trait]
impl CounterShard for MemoryCounterShard {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| AdError::Internal("counter shard lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(key, |_| Ok(((), value.to_string())))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.update(key, |current| {
            let current: i64 = match current {
                Some(raw) => raw.parse().map_err(|_| {
                    AdError::Decode(format!("value of {} is not an integer", key))
                })?,
                None => 0,
            };
            let next = current
                .checked_add(delta)
                .ok_or_else(|| AdError::InvalidRequest(format!("increment of {} overflows", key)))?;
            Ok((next, next.to_string()))
        })
    }

    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64> {
        self.update(key, |current| {
            let current: f64 = match current {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| AdError::Decode(format!("value of {} is not a float", key)))?,
                None => 0.0,
            };
            let next = current + delta;
            Ok((next, next.to_string()))
        })
    }
}
