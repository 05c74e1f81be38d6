use crate::events::{BannerReachedLimits, ClickEvent, LimitReason, ViewEvent};
use crate::impressions::ImpressionSink;
use crate::model::{BannerLimits, CounterField, CounterValue};
use crate::storage::CounterStore;
use crate::{AdError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Receives limit-exceeded notices. Must accept duplicates.
#[async_trait]
pub trait LimitNotifier: Send + Sync {
    async fn notify_limit_reached(&self, event: BannerReachedLimits) -> Result<()>;
}

/// Withdraws a banner from serving. Must be idempotent.
#[async_trait]
pub trait BannerStopper: Send + Sync {
    async fn stop_banner(&self, banner_id: u64) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitState {
    Active,
    LimitExceeded,
    Stopped,
}

impl LimitState {
    pub fn after_increment(value: i64, limit: i64) -> Self {
        if value > limit {
            Self::LimitExceeded
        } else {
            Self::Active
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionOutcome {
    pub banner_id: u64,
    pub reason: LimitReason,
    pub value: i64,
    pub limit: i64,
    pub state: LimitState,
    /// True only for the increment that moved the counter from `limit` to `limit + 1`.
    pub first_crossing: bool,
}

/// The increment is never undone when a later cascade step fails, and every
/// event above the limit runs the cascade again.
pub struct InteractionLimitOperation {
    counters: Arc<CounterStore>,
    notifier: Arc<dyn LimitNotifier>,
    stopper: Arc<dyn BannerStopper>,
}

impl InteractionLimitOperation {
    pub fn new(
        counters: Arc<CounterStore>,
        notifier: Arc<dyn LimitNotifier>,
        stopper: Arc<dyn BannerStopper>,
    ) -> Self {
        Self {
            counters,
            notifier,
            stopper,
        }
    }

    /// Stores (or replaces) the limits of a starting banner.
    pub async fn run_register(&self, limits: &BannerLimits) -> Result<()> {
        if limits.limit_clicks < 0 || limits.limit_impressions < 0 || limits.limit_budget < 0.0 {
            return Err(AdError::InvalidRequest(format!(
                "negative limits for banner {}",
                limits.banner_id
            )));
        }

        self.counters.put_limits(limits).await?;
        tracing::info!(
            banner_id = limits.banner_id,
            limit_clicks = limits.limit_clicks,
            limit_shows = limits.limit_impressions,
            "banner limits registered"
        );
        Ok(())
    }

    pub async fn run_click(&self, click: &ClickEvent) -> Result<InteractionOutcome> {
        if !click.price.is_finite() || click.price < 0.0 {
            return Err(AdError::InvalidRequest(format!(
                "click on banner {} has invalid price {}",
                click.banner_id, click.price
            )));
        }

        let limits = self.counters.limits(click.banner_id).await?;
        let outcome = self
            .count(click.banner_id, LimitReason::Clicks, limits.limit_clicks)
            .await?;

        if click.price > 0.0 {
            self.track_spend(&limits, click.price).await;
        }

        self.settle(outcome).await
    }

    pub async fn run_view(&self, view: &ViewEvent) -> Result<InteractionOutcome> {
        let limits = self.counters.limits(view.banner_id).await?;
        let outcome = self
            .count(view.banner_id, LimitReason::Views, limits.limit_impressions)
            .await?;

        self.settle(outcome).await
    }

    async fn count(
        &self,
        banner_id: u64,
        reason: LimitReason,
        limit: i64,
    ) -> Result<InteractionOutcome> {
        let field = match reason {
            LimitReason::Clicks => CounterField::Clicks,
            LimitReason::Views => CounterField::Impressions,
        };

        let value = self
            .counters
            .increment(banner_id, field, CounterValue::Count(1))
            .await?
            .as_count()
            .ok_or_else(|| AdError::Internal(format!("{} counter is not integral", field)))?;

        Ok(InteractionOutcome {
            banner_id,
            reason,
            value,
            limit,
            state: LimitState::after_increment(value, limit),
            first_crossing: value == limit.saturating_add(1),
        })
    }

    // Budget is accumulated but not enforced.
    async fn track_spend(&self, limits: &BannerLimits, price: f64) {
        match self
            .counters
            .increment(limits.banner_id, CounterField::Spend, CounterValue::Amount(price))
            .await
        {
            Ok(spend) if limits.limit_budget > 0.0 && spend.as_amount() > limits.limit_budget => {
                tracing::debug!(
                    banner_id = limits.banner_id,
                    spend = spend.as_amount(),
                    limit_budget = limits.limit_budget,
                    "banner spend is over budget"
                );
            }
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(banner_id = limits.banner_id, "could not add spend: {}", error);
            }
        }
    }

    /// Runs both cascade steps even when the first one fails; the failures
    /// are reported together afterwards.
    async fn settle(&self, mut outcome: InteractionOutcome) -> Result<InteractionOutcome> {
        if outcome.state != LimitState::LimitExceeded {
            return Ok(outcome);
        }

        tracing::info!(
            banner_id = outcome.banner_id,
            reason = %outcome.reason,
            value = outcome.value,
            limit = outcome.limit,
            first_crossing = outcome.first_crossing,
            "banner limit exceeded"
        );

        let mut failures = Vec::new();

        let notice = BannerReachedLimits {
            banner_id: outcome.banner_id,
            reason: outcome.reason,
        };
        if let Err(error) = self.notifier.notify_limit_reached(notice).await {
            tracing::error!(
                banner_id = outcome.banner_id,
                "could not notify banner to stop: {}",
                error
            );
            failures.push(format!("notify: {}", error));
        }

        match self.stopper.stop_banner(outcome.banner_id).await {
            Ok(()) => outcome.state = LimitState::Stopped,
            Err(error) => {
                tracing::error!(banner_id = outcome.banner_id, "could not stop banner: {}", error);
                failures.push(format!("stop: {}", error));
            }
        }

        if failures.is_empty() {
            Ok(outcome)
        } else {
            Err(AdError::Cascade {
                banner_id: outcome.banner_id,
                failures,
            })
        }
    }
}

#[async_trait]
impl ImpressionSink for InteractionLimitOperation {
    async fn record_view(&self, view: &ViewEvent) -> Result<()> {
        self.run_view(view).await.map(|_| ())
    }
}
