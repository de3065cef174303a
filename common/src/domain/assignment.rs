use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ActorId, ArticleId, AssignmentId};

/// Editorial stage an assignee is responsible for.
///
/// Closed on purpose: the "one pending assignment per article and role" rule
/// only means something if two requests can agree on the role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentRole {
    Reviewer,
    SectionEditor,
    FactChecker,
    CopyEditor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Completed,
    Withdrawn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentOutcome {
    Approved,
    RevisionRequested,
    Done,
}

column_enum!(AssignmentRole {
    Reviewer => "reviewer",
    SectionEditor => "section_editor",
    FactChecker => "fact_checker",
    CopyEditor => "copy_editor",
});

column_enum!(AssignmentStatus {
    Pending => "pending",
    Completed => "completed",
    Withdrawn => "withdrawn",
});

column_enum!(AssignmentOutcome {
    Approved => "approved",
    RevisionRequested => "revision_requested",
    Done => "done",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: AssignmentId,
    pub article_id: ArticleId,
    pub assignee_id: ActorId,
    pub role: AssignmentRole,
    pub due_at: Option<DateTime<Utc>>,
    pub status: AssignmentStatus,
    pub outcome: Option<AssignmentOutcome>,
    pub instructions: Option<String>,
    pub assigned_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn is_pending(&self) -> bool {
        self.status == AssignmentStatus::Pending
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.due_at.is_some_and(|due_at| due_at < now)
    }
}

/// Request to put someone on an article. Becomes an [`Assignment`] once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssignment {
    pub article_id: ArticleId,
    pub assignee_id: ActorId,
    pub role: AssignmentRole,
    pub due_at: Option<DateTime<Utc>>,
    pub instructions: Option<String>,
    pub assigned_by: ActorId,
    pub created_at: DateTime<Utc>,
}

impl NewAssignment {
    pub fn into_pending(self) -> Assignment {
        Assignment {
            id: AssignmentId::generate(),
            article_id: self.article_id,
            assignee_id: self.assignee_id,
            role: self.role,
            due_at: self.due_at,
            status: AssignmentStatus::Pending,
            outcome: None,
            instructions: self.instructions,
            assigned_by: self.assigned_by,
            created_at: self.created_at,
            resolved_at: None,
        }
    }
}

/// Terminal state an assignment is moved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentResolution {
    Completed(AssignmentOutcome),
    Withdrawn,
}

impl AssignmentResolution {
    pub fn apply(self, assignment: &mut Assignment, at: DateTime<Utc>) {
        match self {
            AssignmentResolution::Completed(outcome) => {
                assignment.status = AssignmentStatus::Completed;
                assignment.outcome = Some(outcome);
            }
            AssignmentResolution::Withdrawn => {
                assignment.status = AssignmentStatus::Withdrawn;
            }
        }
        assignment.resolved_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn pending(due_at: Option<DateTime<Utc>>) -> Assignment {
        NewAssignment {
            article_id: ArticleId::generate(),
            assignee_id: ActorId::try_new("reviewer").unwrap(),
            role: AssignmentRole::Reviewer,
            due_at,
            instructions: None,
            assigned_by: ActorId::try_new("editor").unwrap(),
            created_at: Utc::now(),
        }
        .into_pending()
    }

    #[test]
    fn roles_use_snake_case_column_values() {
        assert_eq!(AssignmentRole::CopyEditor.as_str(), "copy_editor");
        assert_eq!("fact_checker".parse::<AssignmentRole>().unwrap(), AssignmentRole::FactChecker);
        assert!("proofreader".parse::<AssignmentRole>().is_err());
    }

    #[test]
    fn overdue_only_while_pending() {
        let now = Utc::now();
        let mut assignment = pending(Some(now - Duration::hours(1)));
        assert!(assignment.is_overdue(now));

        AssignmentResolution::Completed(AssignmentOutcome::Done).apply(&mut assignment, now);
        assert!(!assignment.is_overdue(now));
        assert_eq!(assignment.outcome, Some(AssignmentOutcome::Done));
        assert_eq!(assignment.resolved_at, Some(now));
    }

    #[test]
    fn no_due_date_is_never_overdue() {
        assert!(!pending(None).is_overdue(Utc::now()));
    }
}
