use chrono::{DateTime, Utc};
use nutype::nutype;
use serde::{Deserialize, Serialize};

use crate::domain::{ActorId, ArticleId};

/// Workflow status of an article, as stored and exposed over the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Draft,
    InReview,
    NeedsRevision,
    Approved,
    Scheduled,
    Published,
    Archived,
}

impl ArticleStatus {
    pub const ALL: [ArticleStatus; 7] = [
        ArticleStatus::Draft,
        ArticleStatus::InReview,
        ArticleStatus::NeedsRevision,
        ArticleStatus::Approved,
        ArticleStatus::Scheduled,
        ArticleStatus::Published,
        ArticleStatus::Archived,
    ];

    /// Content may be committed only while the author owns the article.
    pub fn is_editable(&self) -> bool {
        matches!(self, ArticleStatus::Draft | ArticleStatus::NeedsRevision)
    }

    /// Published and archived articles take no new assignments.
    pub fn accepts_assignments(&self) -> bool {
        !matches!(self, ArticleStatus::Published | ArticleStatus::Archived)
    }
}

column_enum!(ArticleStatus {
    Draft => "draft",
    InReview => "in_review",
    NeedsRevision => "needs_revision",
    Approved => "approved",
    Scheduled => "scheduled",
    Published => "published",
    Archived => "archived",
});

/// Note a reviewer leaves when sending an article back to its author.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 4000),
    derive(
        Clone,
        Debug,
        Display,
        AsRef,
        PartialEq,
        Eq,
        Serialize,
        Deserialize
    )
)]
pub struct RevisionNote(String);

/// Workflow state together with the data that only exists in that state.
///
/// `publish_at` lives inside `Scheduled` and the revision note inside `NeedsRevision`,
/// so an article can never carry a publish time outside of the scheduled state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArticleState {
    Draft,
    InReview,
    NeedsRevision { revision_note: RevisionNote },
    Approved,
    Scheduled { publish_at: DateTime<Utc> },
    Published { published_at: DateTime<Utc> },
    Archived,
}

impl ArticleState {
    pub fn status(&self) -> ArticleStatus {
        match self {
            ArticleState::Draft => ArticleStatus::Draft,
            ArticleState::InReview => ArticleStatus::InReview,
            ArticleState::NeedsRevision { .. } => ArticleStatus::NeedsRevision,
            ArticleState::Approved => ArticleStatus::Approved,
            ArticleState::Scheduled { .. } => ArticleStatus::Scheduled,
            ArticleState::Published { .. } => ArticleStatus::Published,
            ArticleState::Archived => ArticleStatus::Archived,
        }
    }

    pub fn publish_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ArticleState::Scheduled { publish_at } => Some(*publish_at),
            _ => None,
        }
    }

    pub fn revision_note(&self) -> Option<&RevisionNote> {
        match self {
            ArticleState::NeedsRevision { revision_note } => Some(revision_note),
            _ => None,
        }
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ArticleState::Published { published_at } => Some(*published_at),
            _ => None,
        }
    }

    /// Rebuilds the state from its flattened, persisted columns.
    /// Rejects combinations that break the status/publish_at and status/note pairing.
    pub fn from_parts(
        status: ArticleStatus,
        publish_at: Option<DateTime<Utc>>,
        revision_note: Option<String>,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<Self, String> {
        if status != ArticleStatus::Scheduled && publish_at.is_some() {
            return Err(format!("publish_at is set for an article in status {status}"));
        }

        let state = match status {
            ArticleStatus::Draft => ArticleState::Draft,
            ArticleStatus::InReview => ArticleState::InReview,
            ArticleStatus::NeedsRevision => {
                let note = revision_note
                    .ok_or_else(|| "needs_revision article has no revision note".to_string())?;
                let revision_note = RevisionNote::try_new(note).map_err(|e| e.to_string())?;
                ArticleState::NeedsRevision { revision_note }
            }
            ArticleStatus::Approved => ArticleState::Approved,
            ArticleStatus::Scheduled => ArticleState::Scheduled {
                publish_at: publish_at
                    .ok_or_else(|| "scheduled article has no publish_at".to_string())?,
            },
            ArticleStatus::Published => ArticleState::Published {
                published_at: published_at
                    .ok_or_else(|| "published article has no published_at".to_string())?,
            },
            ArticleStatus::Archived => ArticleState::Archived,
        };

        Ok(state)
    }
}

/// Editable fields of an article. The workflow never interprets them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleContent {
    pub title: String,

    /// Reference into the content store holding the body
    #[serde(default)]
    pub body_ref: Option<String>,

    /// Free-form metadata: category, tags, featured/pinned flags, ...
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: ArticleId,
    pub content: ArticleContent,
    #[serde(flatten)]
    pub state: ArticleState,
    pub created_at: DateTime<Utc>,
    /// Set by content commits only, never by status changes
    pub last_edited_at: DateTime<Utc>,
    pub last_edited_by: ActorId,
    pub status_changed_at: DateTime<Utc>,
    /// Incremented on every change, content or status
    pub version: i64,
}

impl Article {
    /// A freshly saved article always starts as a draft.
    pub fn new_draft(content: ArticleContent, author: ActorId, at: DateTime<Utc>) -> Self {
        Self {
            id: ArticleId::generate(),
            content,
            state: ArticleState::Draft,
            created_at: at,
            last_edited_at: at,
            last_edited_by: author,
            status_changed_at: at,
            version: 1,
        }
    }

    pub fn status(&self) -> ArticleStatus {
        self.state.status()
    }

    pub fn publish_at(&self) -> Option<DateTime<Utc>> {
        self.state.publish_at()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn status_round_trips_through_its_column_value() {
        for status in ArticleStatus::ALL {
            assert_eq!(status.as_str().parse::<ArticleStatus>().unwrap(), status);
        }
        assert!("pending_review".parse::<ArticleStatus>().is_err());
    }

    #[test]
    fn only_scheduled_state_exposes_publish_at() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        assert_eq!(ArticleState::Scheduled { publish_at: at }.publish_at(), Some(at));
        assert_eq!(ArticleState::Approved.publish_at(), None);
        assert_eq!(ArticleState::Published { published_at: at }.publish_at(), None);
    }

    #[test]
    fn from_parts_rejects_broken_pairings() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();

        assert!(ArticleState::from_parts(ArticleStatus::Scheduled, None, None, None).is_err());
        assert!(ArticleState::from_parts(ArticleStatus::Approved, Some(at), None, None).is_err());
        assert!(ArticleState::from_parts(ArticleStatus::NeedsRevision, None, None, None).is_err());

        let state = ArticleState::from_parts(
            ArticleStatus::NeedsRevision,
            None,
            Some("fix intro".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(state.revision_note().unwrap().as_ref(), "fix intro");
    }

    #[test]
    fn blank_revision_note_is_rejected() {
        assert!(RevisionNote::try_new("   ").is_err());
    }

    #[test]
    fn editable_statuses() {
        let editable: Vec<_> = ArticleStatus::ALL
            .into_iter()
            .filter(ArticleStatus::is_editable)
            .collect();
        assert_eq!(editable, vec![ArticleStatus::Draft, ArticleStatus::NeedsRevision]);
    }
}
