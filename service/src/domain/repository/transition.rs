use chrono::{DateTime, Utc};
use editorial_common::article::{Article, ArticleState, ArticleStatus};
use editorial_common::assignment::{Assignment, AssignmentOutcome, AssignmentRole, NewAssignment};
use editorial_common::schedule::ScheduleEntry;
use editorial_common::{ActorId, ArticleId};

/// A status change and its side effects, applied by the repository as one unit.
///
/// The repository only checks the preconditions and applies the effects;
/// which effects belong to which action is decided by the workflow engine.
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub article_id: ArticleId,
    /// Compare-and-swap guard on the current status
    pub allowed_from: &'static [ArticleStatus],
    pub next: ArticleState,
    /// Extra guard: a schedule entry with exactly this publish time must exist
    pub required_schedule: Option<DateTime<Utc>>,
    pub schedule: ScheduleEffect,
    pub assignments: AssignmentEffect,
    pub actor: ActorId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum ScheduleEffect {
    Keep,
    Create(ScheduleEntry),
    Remove,
}

#[derive(Debug, Clone)]
pub enum AssignmentEffect {
    Keep,
    /// Assign explicitly, superseding the pending assignment for the same role
    Assign(NewAssignment),
    /// Refresh the due date of the pending assignment for the role, or re-assign the
    /// latest previous assignee of that role. Does nothing without any history.
    RefreshOrReassign {
        role: AssignmentRole,
        due_at: Option<DateTime<Utc>>,
    },
    /// Complete the pending assignment for the role, if any
    CompletePending {
        role: AssignmentRole,
        outcome: AssignmentOutcome,
    },
    /// Withdraw every pending assignment of the article
    WithdrawPending,
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub previous: ArticleStatus,
    pub article: Article,
    /// The entry deleted by [`ScheduleEffect::Remove`]
    pub removed_schedule: Option<ScheduleEntry>,
    /// Assignments created or resolved by the plan
    pub assignments: Vec<Assignment>,
}
