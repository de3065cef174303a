//! Distribution of a published article to its channels.
//!
//! Each enabled channel is attempted independently and concurrently. An attempt is
//! bounded by a timeout and failed attempts are retried with exponential backoff.
//! Nothing here can undo a publication: the outcome is only recorded per channel.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use editorial_common::ArticleId;
use editorial_common::article::{Article, ArticleContent};
use editorial_common::publication::{ChannelResult, PublishEvent, PublishTrigger};
use editorial_common::schedule::{Channel, ChannelSelection};
use futures::future::{BoxFuture, join_all};
use serde::Serialize;

use crate::domain::clock::Clock;

/// What a channel adapter receives for a published article.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPayload {
    pub article_id: ArticleId,
    pub published_at: DateTime<Utc>,
    #[serde(flatten)]
    pub content: ArticleContent,
}

impl ChannelPayload {
    pub fn for_article(article: &Article, fallback_published_at: DateTime<Utc>) -> Self {
        Self {
            article_id: article.id,
            published_at: article.state.published_at().unwrap_or(fallback_published_at),
            content: article.content.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("channel returned HTTP {0}")]
    HttpStatus(u16),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("channel rejected the article: {0}")]
    Rejected(String),
}

/// Outbound integration for one distribution channel.
pub trait ChannelAdapter: Send + Sync + 'static {
    fn channel(&self) -> Channel;

    fn publish<'a>(&'a self, payload: &'a ChannelPayload) -> BoxFuture<'a, Result<(), ChannelError>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound of a single attempt
    pub attempt_timeout: Duration,
    /// Attempts including the first one
    pub max_attempts: u32,
    /// Delay after the first failure, doubled after every further failure
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(10),
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `failed_attempts + 1`.
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }
}

pub struct DistributionDispatcher {
    adapters: BTreeMap<Channel, Arc<dyn ChannelAdapter>>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl DistributionDispatcher {
    pub fn new(
        adapters: impl IntoIterator<Item = Arc<dyn ChannelAdapter>>,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.channel(), adapter))
            .collect();

        Self {
            adapters,
            policy,
            clock,
        }
    }

    /// Send the article to every enabled channel and record how each one went.
    #[tracing::instrument(skip_all, fields(article_id = %article.id))]
    pub async fn dispatch(
        &self,
        article: &Article,
        channels: &ChannelSelection,
        trigger: PublishTrigger,
    ) -> PublishEvent {
        let triggered_at = self.clock.now();
        let payload = ChannelPayload::for_article(article, triggered_at);

        let deliveries = channels.enabled().map(|channel| {
            let payload = &payload;
            async move { (channel, self.deliver(channel, payload).await) }
        });
        let results = join_all(deliveries).await.into_iter().collect();

        PublishEvent {
            article_id: article.id,
            triggered_at,
            trigger,
            results,
        }
    }

    /// Attempt one channel until it succeeds or the retry policy gives up.
    pub async fn deliver(&self, channel: Channel, payload: &ChannelPayload) -> ChannelResult {
        let Some(adapter) = self.adapters.get(&channel) else {
            tracing::debug!(%channel, "no adapter configured, channel skipped");
            return ChannelResult::skipped(self.clock.now());
        };

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match tokio::time::timeout(self.policy.attempt_timeout, adapter.publish(payload)).await {
                Ok(Ok(())) => {
                    tracing::info!(%channel, attempt, "channel delivered");
                    return ChannelResult::delivered(attempt, self.clock.now());
                }
                Ok(Err(error)) => error,
                Err(_) => ChannelError::Timeout(self.policy.attempt_timeout),
            };

            if attempt >= max_attempts {
                tracing::error!(%channel, attempt, error = %error, "channel failed after all retries");
                return ChannelResult::failed(attempt, error.to_string(), self.clock.now());
            }

            let delay = self.policy.backoff(attempt);
            tracing::warn!(%channel, attempt, error = %error, ?delay, "channel attempt failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }
}
