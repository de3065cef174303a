use chrono::{DateTime, Utc};
use editorial_common::article::{Article, ArticleStatus};
use editorial_common::assignment::{Assignment, AssignmentRole, AssignmentStatus};
use editorial_common::{ActorId, ArticleId};

/// Article listing criteria.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    /// Restrict to these statuses; empty means any
    pub statuses: Vec<ArticleStatus>,
    pub limit: Option<usize>,
}

impl ArticleFilter {
    pub fn matches(&self, article: &Article) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&article.status())
    }
}

/// Assignment listing criteria. Every set field must match.
#[derive(Debug, Clone, Default)]
pub struct AssignmentFilter {
    pub article_id: Option<ArticleId>,
    pub assignee_id: Option<ActorId>,
    pub role: Option<AssignmentRole>,
    /// Only assignments due strictly before this instant
    pub due_before: Option<DateTime<Utc>>,
    pub status: Option<AssignmentStatus>,
}

impl AssignmentFilter {
    pub fn pending() -> Self {
        Self {
            status: Some(AssignmentStatus::Pending),
            ..Self::default()
        }
    }

    pub fn matches(&self, assignment: &Assignment) -> bool {
        self.article_id.is_none_or(|id| assignment.article_id == id)
            && self
                .assignee_id
                .as_ref()
                .is_none_or(|assignee| &assignment.assignee_id == assignee)
            && self.role.is_none_or(|role| assignment.role == role)
            && self.status.is_none_or(|status| assignment.status == status)
            && self
                .due_before
                .is_none_or(|limit| assignment.due_at.is_some_and(|due_at| due_at < limit))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use editorial_common::assignment::NewAssignment;
    use editorial_common::test_utils::{actor, epoch};

    use super::*;

    fn assignment(due_at: Option<DateTime<Utc>>) -> Assignment {
        NewAssignment {
            article_id: ArticleId::generate(),
            assignee_id: actor("reviewer"),
            role: AssignmentRole::Reviewer,
            due_at,
            instructions: None,
            assigned_by: actor("editor"),
            created_at: epoch(),
        }
        .into_pending()
    }

    #[test]
    fn due_before_skips_assignments_without_due_date() {
        let filter = AssignmentFilter {
            due_before: Some(epoch()),
            ..AssignmentFilter::pending()
        };

        assert!(filter.matches(&assignment(Some(epoch() - Duration::hours(1)))));
        assert!(!filter.matches(&assignment(Some(epoch()))));
        assert!(!filter.matches(&assignment(None)));
    }

    #[test]
    fn assignee_filter_compares_ids() {
        let filter = AssignmentFilter {
            assignee_id: Some(actor("someone-else")),
            ..AssignmentFilter::default()
        };
        assert!(!filter.matches(&assignment(None)));
    }
}
