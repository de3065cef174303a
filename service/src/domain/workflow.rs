use std::fmt;

use editorial_common::article::ArticleStatus;
use serde::{Deserialize, Serialize};

/// Status changing actions of the editorial workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    SubmitForReview,
    Approve,
    RequestRevision,
    Schedule,
    CancelSchedule,
    PublishNow,
    Archive,
}

impl WorkflowAction {
    pub const ALL: [WorkflowAction; 7] = [
        WorkflowAction::SubmitForReview,
        WorkflowAction::Approve,
        WorkflowAction::RequestRevision,
        WorkflowAction::Schedule,
        WorkflowAction::CancelSchedule,
        WorkflowAction::PublishNow,
        WorkflowAction::Archive,
    ];

    /// Statuses the action may start from.
    pub fn allowed_from(&self) -> &'static [ArticleStatus] {
        use ArticleStatus::*;

        match self {
            WorkflowAction::SubmitForReview => &[Draft, NeedsRevision],
            WorkflowAction::Approve | WorkflowAction::RequestRevision => &[InReview],
            WorkflowAction::Schedule => &[Approved],
            WorkflowAction::CancelSchedule => &[Scheduled],
            WorkflowAction::PublishNow => &[Approved, Scheduled],
            WorkflowAction::Archive => &[Draft, InReview, NeedsRevision, Approved, Scheduled],
        }
    }

    pub fn target(&self) -> ArticleStatus {
        match self {
            WorkflowAction::SubmitForReview => ArticleStatus::InReview,
            WorkflowAction::Approve => ArticleStatus::Approved,
            WorkflowAction::RequestRevision => ArticleStatus::NeedsRevision,
            WorkflowAction::Schedule => ArticleStatus::Scheduled,
            WorkflowAction::CancelSchedule => ArticleStatus::Approved,
            WorkflowAction::PublishNow => ArticleStatus::Published,
            WorkflowAction::Archive => ArticleStatus::Archived,
        }
    }

    pub fn is_allowed_from(&self, status: ArticleStatus) -> bool {
        self.allowed_from().contains(&status)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowAction::SubmitForReview => "submit_for_review",
            WorkflowAction::Approve => "approve",
            WorkflowAction::RequestRevision => "request_revision",
            WorkflowAction::Schedule => "schedule",
            WorkflowAction::CancelSchedule => "cancel_schedule",
            WorkflowAction::PublishNow => "publish_now",
            WorkflowAction::Archive => "archive",
        }
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions an editor interface may offer for an article in `status`.
pub fn available_actions(status: ArticleStatus) -> Vec<WorkflowAction> {
    WorkflowAction::ALL
        .into_iter()
        .filter(|action| action.is_allowed_from(status))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_offer_nothing() {
        assert!(available_actions(ArticleStatus::Published).is_empty());
        assert!(available_actions(ArticleStatus::Archived).is_empty());
    }

    #[test]
    fn approved_article_can_be_scheduled_published_or_archived() {
        assert_eq!(
            available_actions(ArticleStatus::Approved),
            vec![WorkflowAction::Schedule, WorkflowAction::PublishNow, WorkflowAction::Archive]
        );
    }

    #[test]
    fn no_action_targets_its_own_start() {
        for action in WorkflowAction::ALL {
            assert!(!action.is_allowed_from(action.target()), "{action}");
        }
    }

    #[test]
    fn draft_cannot_jump_to_published() {
        assert!(!WorkflowAction::PublishNow.is_allowed_from(ArticleStatus::Draft));
        assert!(!WorkflowAction::Schedule.is_allowed_from(ArticleStatus::InReview));
    }
}
