use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ActorId, ArticleId, schedule::Channel};

/// What caused a publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishTrigger {
    /// Someone pressed "publish now"
    Manual { actor: ActorId },
    /// The scheduler promoted the entry due at `publish_at`
    Schedule { publish_at: DateTime<Utc> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    Failed,
    /// No adapter is configured for the channel
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResult {
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl ChannelResult {
    pub fn delivered(attempts: u32, at: DateTime<Utc>) -> Self {
        Self {
            status: DeliveryStatus::Delivered,
            attempts,
            error: None,
            completed_at: at,
        }
    }

    pub fn failed(attempts: u32, error: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: DeliveryStatus::Failed,
            attempts,
            error: Some(error.into()),
            completed_at: at,
        }
    }

    pub fn skipped(at: DateTime<Utc>) -> Self {
        Self {
            status: DeliveryStatus::Skipped,
            attempts: 0,
            error: Some("no adapter configured for channel".to_string()),
            completed_at: at,
        }
    }
}

/// One dispatch of a published article to its channels.
///
/// "Published" is a property of the article; whether each channel received it is tracked here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishEvent {
    pub article_id: ArticleId,
    pub triggered_at: DateTime<Utc>,
    pub trigger: PublishTrigger,
    pub results: BTreeMap<Channel, ChannelResult>,
}

impl PublishEvent {
    /// The article is visible to readers once the site channel delivered.
    pub fn is_live(&self) -> bool {
        self.results
            .get(&Channel::Site)
            .is_some_and(|result| result.status == DeliveryStatus::Delivered)
    }

    /// Channels waiting for a manual retry.
    pub fn failed_channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.results
            .iter()
            .filter(|(_, result)| result.status == DeliveryStatus::Failed)
            .map(|(channel, _)| *channel)
    }
}
