use std::fmt;
use std::str::FromStr;

use editorial_common::{ActorId, ArticleId};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::domain::workflow::WorkflowAction;

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: ActorId,
    pub roles: Vec<String>,
}

impl Actor {
    pub fn new(id: ActorId, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// The platform itself, used by the scheduler.
    pub fn system() -> Self {
        Self {
            id: ActorId::system(),
            roles: vec![],
        }
    }
}

/// Everything a permission policy can be asked about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorialAction {
    CreateArticle,
    CommitContent,
    SubmitForReview,
    Approve,
    RequestRevision,
    Schedule,
    CancelSchedule,
    PublishNow,
    Archive,
    Assign,
    CompleteAssignment,
    WithdrawAssignment,
    RetryChannel,
    RunScheduler,
}

impl EditorialAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditorialAction::CreateArticle => "create_article",
            EditorialAction::CommitContent => "commit_content",
            EditorialAction::SubmitForReview => "submit_for_review",
            EditorialAction::Approve => "approve",
            EditorialAction::RequestRevision => "request_revision",
            EditorialAction::Schedule => "schedule",
            EditorialAction::CancelSchedule => "cancel_schedule",
            EditorialAction::PublishNow => "publish_now",
            EditorialAction::Archive => "archive",
            EditorialAction::Assign => "assign",
            EditorialAction::CompleteAssignment => "complete_assignment",
            EditorialAction::WithdrawAssignment => "withdraw_assignment",
            EditorialAction::RetryChannel => "retry_channel",
            EditorialAction::RunScheduler => "run_scheduler",
        }
    }
}

impl fmt::Display for EditorialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditorialAction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(value.to_string()))
            .map_err(|_| format!("unknown editorial action '{value}'"))
    }
}

impl From<WorkflowAction> for EditorialAction {
    fn from(value: WorkflowAction) -> Self {
        match value {
            WorkflowAction::SubmitForReview => EditorialAction::SubmitForReview,
            WorkflowAction::Approve => EditorialAction::Approve,
            WorkflowAction::RequestRevision => EditorialAction::RequestRevision,
            WorkflowAction::Schedule => EditorialAction::Schedule,
            WorkflowAction::CancelSchedule => EditorialAction::CancelSchedule,
            WorkflowAction::PublishNow => EditorialAction::PublishNow,
            WorkflowAction::Archive => EditorialAction::Archive,
        }
    }
}

/// Permission collaborator consulted before every mutating operation.
///
/// Object safe so that the policy can be swapped at startup without touching the state type.
pub trait Permissions: Send + Sync + 'static {
    fn can_perform<'a>(
        &'a self,
        actor: &'a Actor,
        action: EditorialAction,
        article_id: Option<ArticleId>,
    ) -> BoxFuture<'a, bool>;
}
