use adshard_core::{AdError, BusMessage, DispatchOutcome, EventDispatcher, RedisBus, Result, topics};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

const RETRY_DELAY: Duration = Duration::from_secs(1);

#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn next_message(&self, topics: &[&str], timeout: Duration) -> Result<Option<BusMessage>>;
}

#[async_trait]
impl MessageSource for RedisBus {
    async fn next_message(&self, topics: &[&str], timeout: Duration) -> Result<Option<BusMessage>> {
        RedisBus::next_message(self, topics, timeout).await
    }
}

/// Runs until `shutdown` resolves. A failed message is logged and dropped;
/// the loop itself only stops on shutdown.
pub async fn run_consumer<S, F>(
    source: &S,
    dispatcher: &EventDispatcher,
    poll_timeout: Duration,
    shutdown: F,
) -> Result<()>
where
    S: MessageSource + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    tracing::info!(topics = ?topics::INBOUND, "consumer started");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("consumer shutting down");
                return Ok(());
            }
            message = source.next_message(&topics::INBOUND, poll_timeout) => match message {
                Ok(Some(message)) => handle_message(dispatcher, message).await,
                Ok(None) => {}
                Err(error) => {
                    tracing::error!("could not read from bus: {}", error);
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            },
        }
    }
}

async fn handle_message(dispatcher: &EventDispatcher, message: BusMessage) {
    match dispatcher.dispatch(&message.topic, &message.payload).await {
        Ok(DispatchOutcome::Started(result)) => {
            tracing::info!(
                banner_id = result.banner_id,
                eligible = result.eligible,
                placed = result.placed,
                "banner started"
            );
        }
        Ok(DispatchOutcome::Stopped(report)) if !report.is_complete() => {
            tracing::warn!(
                deleted = report.deleted,
                failed = report.failed_shards.len(),
                "banner partially stopped"
            );
        }
        Ok(_) => {}
        Err(error) if error.is_not_found() => {
            tracing::warn!(topic = %message.topic, "skipped message: {}", error);
        }
        Err(AdError::Decode(reason)) => {
            tracing::error!(topic = %message.topic, "dropped malformed message: {}", reason);
        }
        Err(error) => {
            tracing::error!(
                topic = %message.topic,
                transient = error.is_transient(),
                "could not handle message: {}",
                error
            );
        }
    }
}
