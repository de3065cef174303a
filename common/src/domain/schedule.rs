use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ActorId, ArticleId};

/// A distribution target for a published article.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// The magazine website itself, the only channel that decides whether an article is live
    Site,
    Social,
    Newsletter,
    Push,
}

column_enum!(Channel {
    Site => "site",
    Social => "social",
    Newsletter => "newsletter",
    Push => "push",
});

/// Channels requested for a publication, each with its enable flag.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelSelection(BTreeMap<Channel, bool>);

impl ChannelSelection {
    pub fn new(flags: impl IntoIterator<Item = (Channel, bool)>) -> Self {
        Self(flags.into_iter().collect())
    }

    /// Selection with every given channel enabled.
    pub fn enabled_only(channels: impl IntoIterator<Item = Channel>) -> Self {
        Self::new(channels.into_iter().map(|channel| (channel, true)))
    }

    pub fn is_enabled(&self, channel: Channel) -> bool {
        self.0.get(&channel).copied().unwrap_or(false)
    }

    pub fn enabled(&self) -> impl Iterator<Item = Channel> + '_ {
        self.0
            .iter()
            .filter_map(|(channel, enabled)| enabled.then_some(*channel))
    }

    pub fn flags(&self) -> impl Iterator<Item = (Channel, bool)> + '_ {
        self.0.iter().map(|(channel, enabled)| (*channel, *enabled))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

column_enum!(Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
});

/// A pending, time-bound intent to publish one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub article_id: ArticleId,
    pub publish_at: DateTime<Utc>,
    pub channels: ChannelSelection,
    pub priority: Priority,
    pub notes: Option<String>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
}

/// Time window `(after, until]` used to look up due schedule entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueWindow {
    pub after: Option<DateTime<Utc>>,
    pub until: DateTime<Utc>,
}

impl DueWindow {
    /// Everything due up to and including `until`, however overdue.
    pub fn up_to(until: DateTime<Utc>) -> Self {
        Self { after: None, until }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at <= self.until && self.after.is_none_or(|after| at > after)
    }
}

/// Order in which due entries are promoted: earliest first, then the most urgent.
pub fn promotion_order(left: &ScheduleEntry, right: &ScheduleEntry) -> std::cmp::Ordering {
    left.publish_at
        .cmp(&right.publish_at)
        .then_with(|| right.priority.cmp(&left.priority))
        .then_with(|| left.article_id.cmp(&right.article_id))
}
