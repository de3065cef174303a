use editorial_common::ActorId;
use editorial_common::article::ArticleStatus;
use editorial_common::assignment::AssignmentStatus;
use editorial_common::schedule::Channel;

use crate::domain::identity::EditorialAction;
use crate::domain::repository::RepositoryError;
use crate::domain::workflow::WorkflowAction;

/// Errors surfaced by the editorial operations.
///
/// None of them leaves partial state behind: a failed operation changed nothing.
#[derive(Debug, thiserror::Error)]
pub enum EditorialError {
    /// The requested action is not valid from the article's current status
    #[error("cannot {action} an article that is {from}")]
    InvalidTransition {
        from: ArticleStatus,
        action: WorkflowAction,
    },

    /// The operation is not a transition but still depends on the status, e.g. commit
    #[error("operation is not allowed while the article is {status}")]
    InvalidState { status: ArticleStatus },

    #[error("{actor} is not allowed to {action}")]
    Forbidden {
        actor: ActorId,
        action: EditorialAction,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// A single channel failed after all retries; the publication itself stands
    #[error("channel {channel} failed: {message}")]
    ChannelDispatch { channel: Channel, message: String },

    #[error("{0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl EditorialError {
    pub fn article_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("article {id}"))
    }

    pub fn assignment_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("assignment {id}"))
    }
}

impl From<RepositoryError> for EditorialError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => Self::NotFound("record".to_string()),
            RepositoryError::StatusMismatch(status) => Self::InvalidState { status },
            RepositoryError::NotPending(AssignmentStatus::Pending) => {
                Self::Conflict("assignment is still pending".to_string())
            }
            RepositoryError::NotPending(status) => {
                Self::Conflict(format!("assignment is already {status}"))
            }
            RepositoryError::UniqueViolation(cause) => Self::Conflict(cause),
            RepositoryError::DatabaseError(cause) => Self::Storage(cause),
        }
    }
}
