//! Helpers shared by the test suites of the workspace crates.
//!
//! Public so that other crates can reuse it for their own tests.

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::ActorId;
use crate::domain::article::ArticleContent;
use crate::domain::schedule::{Channel, ChannelSelection};

/// Builds an actor id, panicking on invalid input.
pub fn actor(id: &str) -> ActorId {
    ActorId::try_new(id).unwrap()
}

/// Content with only a title set.
pub fn content(title: &str) -> ArticleContent {
    ArticleContent {
        title: title.to_string(),
        body_ref: Some(format!("bodies/{}", title.to_lowercase().replace(' ', "-"))),
        metadata: serde_json::json!({ "category": "culture" }),
    }
}

/// Fixed instant used as "now" by clock-driven tests.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap()
}

/// Site plus the given auxiliary channels, all enabled.
pub fn site_and(channels: &[Channel]) -> ChannelSelection {
    ChannelSelection::enabled_only(std::iter::once(Channel::Site).chain(channels.iter().copied()))
}
