use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::NEW_ARTICLE_SNAPSHOT_KEY;
use crate::domain::{ActorId, ArticleId, article::ArticleContent};

/// Which working copy a snapshot backs up: an existing article or a not yet saved one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub owner: ActorId,
    pub article_id: Option<ArticleId>,
}

impl SnapshotKey {
    pub fn new(owner: ActorId, article_id: Option<ArticleId>) -> Self {
        Self { owner, article_id }
    }

    /// Value of the article part of the key as stored in the snapshots table.
    pub fn article_key(&self) -> String {
        self.article_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| NEW_ARTICLE_SNAPSHOT_KEY.to_string())
    }
}

/// Crash-recovery copy of an editor's unsaved fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub owner: ActorId,
    pub article_id: Option<ArticleId>,
    pub fields: ArticleContent,
    pub captured_at: DateTime<Utc>,
}

impl DraftSnapshot {
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey::new(self.owner.clone(), self.article_id)
    }
}
