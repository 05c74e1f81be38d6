use crate::events::ViewEvent;
use crate::{AdError, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

#[async_trait]
pub trait ImpressionSink: Send + Sync {
    async fn record_view(&self, view: &ViewEvent) -> Result<()>;
}

/// Producers never wait; a single worker drains batches in submission order.
pub struct ImpressionQueue {
    sender: Mutex<Option<mpsc::Sender<Vec<ViewEvent>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ImpressionQueue {
    /// Spawns the worker on the current tokio runtime.
    pub fn start(capacity: usize, sink: Arc<dyn ImpressionSink>) -> Result<Self> {
        if capacity == 0 {
            return Err(AdError::Config(
                "impression queue capacity must be positive".to_string(),
            ));
        }

        let (sender, mut receiver) = mpsc::channel::<Vec<ViewEvent>>(capacity);
        let worker = tokio::spawn(async move {
            while let Some(batch) = receiver.recv().await {
                for view in &batch {
                    if let Err(error) = sink.record_view(view).await {
                        tracing::error!(
                            banner_id = view.banner_id,
                            platform_id = view.platform_id,
                            "could not add view: {}",
                            error
                        );
                    }
                }
            }
            tracing::debug!("impression worker drained");
        });

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn submit(&self, views: Vec<ViewEvent>) -> Result<()> {
        if views.is_empty() {
            return Ok(());
        }

        let sender = self
            .sender
            .lock()
            .map_err(|_| AdError::Internal("impression queue lock poisoned".to_string()))?;
        let Some(sender) = sender.as_ref() else {
            return Err(AdError::QueueClosed);
        };

        sender.try_send(views).map_err(|error| match error {
            TrySendError::Full(_) => AdError::QueueFull,
            TrySendError::Closed(_) => AdError::QueueClosed,
        })
    }

    /// Closes the queue and waits for already accepted batches to drain.
    pub async fn shutdown(&self) -> Result<()> {
        let sender = self
            .sender
            .lock()
            .map_err(|_| AdError::Internal("impression queue lock poisoned".to_string()))?
            .take();
        drop(sender);

        let worker = self
            .worker
            .lock()
            .map_err(|_| AdError::Internal("impression queue lock poisoned".to_string()))?
            .take();
        if let Some(worker) = worker {
            worker.await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct Collecting {
        seen: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl ImpressionSink for Collecting {
        async fn record_view(&self, view: &ViewEvent) -> Result<()> {
            self.seen.lock().unwrap().push(view.banner_id);
            if view.banner_id == 0 {
                return Err(AdError::Internal("rejected".to_string()));
            }
            Ok(())
        }
    }

    struct Blocked {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl ImpressionSink for Blocked {
        async fn record_view(&self, _view: &ViewEvent) -> Result<()> {
            self.release.notified().await;
            Ok(())
        }
    }

    fn view(banner_id: u64) -> ViewEvent {
        ViewEvent {
            banner_id,
            platform_id: 1,
            user_agent: String::new(),
            device: "desktop".to_string(),
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_worker_preserves_order_and_survives_sink_errors() {
        let sink = Arc::new(Collecting::default());
        let queue = ImpressionQueue::start(4, sink.clone()).unwrap();

        queue.submit(vec![view(1), view(0), view(2)]).unwrap();
        queue.submit(vec![view(3)]).unwrap();
        queue.shutdown().await.unwrap();

        assert_eq!(*sink.seen.lock().unwrap(), vec![1, 0, 2, 3]);
    }

    #[tokio::test]
    async fn test_closed_queue_fails_fast() {
        let queue = ImpressionQueue::start(1, Arc::new(Collecting::default())).unwrap();
        queue.shutdown().await.unwrap();

        assert!(matches!(queue.submit(vec![view(1)]), Err(AdError::QueueClosed)));
        assert!(queue.submit(Vec::new()).is_ok());
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let release = Arc::new(Notify::new());
        let queue = ImpressionQueue::start(
            1,
            Arc::new(Blocked {
                release: release.clone(),
            }),
        )
        .unwrap();

        queue.submit(vec![view(1)]).unwrap();
        // Let the worker take the first batch and park inside the sink.
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.submit(vec![view(2)]).unwrap();

        assert!(matches!(queue.submit(vec![view(3)]), Err(AdError::QueueFull)));

        release.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        release.notify_one();
        queue.shutdown().await.unwrap();
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();
        assert!(ImpressionQueue::start(0, Arc::new(Collecting::default())).is_err());
    }
}
