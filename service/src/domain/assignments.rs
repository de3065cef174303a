use chrono::{DateTime, Utc};
use editorial_common::assignment::{
    Assignment, AssignmentOutcome, AssignmentResolution, AssignmentRole, NewAssignment,
};
use editorial_common::{ActorId, ArticleId, AssignmentId};

use crate::domain::Collaborators;
use crate::domain::audit::AuditEntry;
use crate::domain::error::EditorialError;
use crate::domain::identity::{Actor, EditorialAction};
use crate::domain::repository::query::AssignmentFilter;
use crate::domain::repository::{EditorialRepository, RepositoryError};

#[derive(Debug, Clone)]
pub struct AssignRequest {
    pub article_id: ArticleId,
    pub assignee_id: ActorId,
    pub role: AssignmentRole,
    pub due_at: Option<DateTime<Utc>>,
    pub instructions: Option<String>,
}

/// Who is responsible for which stage of which article.
#[derive(Clone)]
pub struct AssignmentLedger<R> {
    repository: R,
    collaborators: Collaborators,
}

impl<R: EditorialRepository> AssignmentLedger<R> {
    pub fn new(repository: R, collaborators: Collaborators) -> Self {
        Self {
            repository,
            collaborators,
        }
    }

    /// Put someone on an article, withdrawing whoever held the same role.
    #[tracing::instrument(skip_all, fields(actor = %actor.id, article_id = %request.article_id, role = %request.role))]
    pub async fn assign(&self, actor: &Actor, request: AssignRequest) -> Result<Assignment, EditorialError> {
        let article_id = request.article_id;
        self.collaborators
            .authorize(actor, EditorialAction::Assign, Some(article_id))
            .await?;

        let assignment = NewAssignment {
            article_id,
            assignee_id: request.assignee_id,
            role: request.role,
            due_at: request.due_at,
            instructions: request
                .instructions
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            assigned_by: actor.id.clone(),
            created_at: self.collaborators.clock.now(),
        };

        let change = self
            .repository
            .insert_assignment(assignment)
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => EditorialError::article_not_found(article_id),
                other => other.into(),
            })?;

        if let Some(superseded) = &change.superseded {
            tracing::info!(assignment_id = %superseded.id, "pending assignment superseded");
        }
        self.collaborators.audit(
            actor,
            Some(article_id),
            AuditEntry::AssignmentCreated {
                assignment_id: change.assignment.id,
                assignee: change.assignment.assignee_id.clone(),
                role: change.assignment.role,
                superseded: change.superseded.map(|a| a.id),
            },
        );

        Ok(change.assignment)
    }

    pub async fn complete(
        &self,
        actor: &Actor,
        id: AssignmentId,
        outcome: AssignmentOutcome,
    ) -> Result<Assignment, EditorialError> {
        self.resolve(
            actor,
            id,
            AssignmentResolution::Completed(outcome),
            EditorialAction::CompleteAssignment,
        )
        .await
    }

    pub async fn withdraw(&self, actor: &Actor, id: AssignmentId) -> Result<Assignment, EditorialError> {
        self.resolve(
            actor,
            id,
            AssignmentResolution::Withdrawn,
            EditorialAction::WithdrawAssignment,
        )
        .await
    }

    pub async fn find(&self, id: AssignmentId) -> Result<Assignment, EditorialError> {
        self.repository
            .find_assignment(id)
            .await?
            .ok_or_else(|| EditorialError::assignment_not_found(id))
    }

    /// Pending assignments matching the filter, earliest deadline first.
    pub async fn list_active(&self, filter: AssignmentFilter) -> Result<Vec<Assignment>, EditorialError> {
        self.list(AssignmentFilter {
            status: Some(editorial_common::assignment::AssignmentStatus::Pending),
            ..filter
        })
        .await
    }

    pub async fn list(&self, filter: AssignmentFilter) -> Result<Vec<Assignment>, EditorialError> {
        Ok(self.repository.list_assignments(filter).await?)
    }

    async fn resolve(
        &self,
        actor: &Actor,
        id: AssignmentId,
        resolution: AssignmentResolution,
        action: EditorialAction,
    ) -> Result<Assignment, EditorialError> {
        let assignment = self.find(id).await?;

        // assignees may always complete their own work
        let own_completion = action == EditorialAction::CompleteAssignment && assignment.assignee_id == actor.id;
        if !own_completion {
            self.collaborators
                .authorize(actor, action, Some(assignment.article_id))
                .await?;
        }

        let resolved = self
            .repository
            .resolve_assignment(id, resolution, self.collaborators.clock.now())
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => EditorialError::assignment_not_found(id),
                other => other.into(),
            })?;

        tracing::info!(assignment_id = %id, status = %resolved.status, "assignment resolved");
        self.collaborators.audit(
            actor,
            Some(resolved.article_id),
            AuditEntry::AssignmentResolved {
                assignment_id: id,
                status: resolved.status,
                outcome: resolved.outcome,
            },
        );

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use editorial_common::article::ArticleStatus;
    use editorial_common::assignment::AssignmentStatus;
    use editorial_common::test_utils::actor;

    use super::*;
    use crate::domain::clock::Clock;
    use crate::domain::testing::{Fixture, author, editor, reviewer};

    fn request(article_id: ArticleId, assignee: &str, role: AssignmentRole) -> AssignRequest {
        AssignRequest {
            article_id,
            assignee_id: actor(assignee),
            role,
            due_at: None,
            instructions: Some("check every quote".to_string()),
        }
    }

    #[tokio::test]
    async fn assigning_twice_leaves_one_pending_and_one_withdrawn() {
        let fixture = Fixture::new();
        let draft = fixture.draft("Cold Front").await;

        let first = fixture.ledger.assign(&editor(), request(draft.id, "ana", AssignmentRole::FactChecker)).await.unwrap();
        let second = fixture.ledger.assign(&editor(), request(draft.id, "ben", AssignmentRole::FactChecker)).await.unwrap();

        let active = fixture.pending_for(draft.id).await;
        assert_eq!(active.iter().map(|a| a.id).collect::<Vec<_>>(), vec![second.id]);
        let replaced = fixture.ledger.find(first.id).await.unwrap();
        assert_eq!(replaced.status, AssignmentStatus::Withdrawn);
        assert!(replaced.resolved_at.is_some());
    }

    #[tokio::test]
    async fn different_roles_do_not_supersede_each_other() {
        let fixture = Fixture::new();
        let draft = fixture.draft("Cold Front").await;

        fixture.ledger.assign(&editor(), request(draft.id, "ana", AssignmentRole::FactChecker)).await.unwrap();
        fixture.ledger.assign(&editor(), request(draft.id, "ana", AssignmentRole::CopyEditor)).await.unwrap();

        assert_eq!(fixture.pending_for(draft.id).await.len(), 2);
    }

    #[tokio::test]
    async fn unknown_article_is_not_found() {
        let fixture = Fixture::new();
        let err = fixture
            .ledger
            .assign(&editor(), request(ArticleId::generate(), "ana", AssignmentRole::Reviewer))
            .await
            .unwrap_err();
        assert!(matches!(err, EditorialError::NotFound(_)));
    }

    #[tokio::test]
    async fn archived_article_takes_no_assignments() {
        let fixture = Fixture::new();
        let draft = fixture.draft("Cold Front").await;
        fixture.engine.archive(&editor(), draft.id).await.unwrap();

        let err = fixture
            .ledger
            .assign(&editor(), request(draft.id, "ana", AssignmentRole::CopyEditor))
            .await
            .unwrap_err();
        assert!(matches!(err, EditorialError::InvalidState { status: ArticleStatus::Archived }));
    }

    #[tokio::test]
    async fn resolving_twice_is_a_conflict() {
        let fixture = Fixture::new();
        let draft = fixture.draft("Cold Front").await;
        let assignment = fixture.ledger.assign(&editor(), request(draft.id, "ana", AssignmentRole::CopyEditor)).await.unwrap();

        fixture.ledger.withdraw(&editor(), assignment.id).await.unwrap();
        let err = fixture.ledger.complete(&editor(), assignment.id, AssignmentOutcome::Done).await.unwrap_err();

        assert!(matches!(err, EditorialError::Conflict(_)));
    }

    #[tokio::test]
    async fn assignee_completes_own_assignment_without_role_grant() {
        let fixture = Fixture::new();
        let draft = fixture.draft("Cold Front").await;
        let assignment = fixture.ledger.assign(&editor(), request(draft.id, "author", AssignmentRole::CopyEditor)).await.unwrap();

        let done = fixture.ledger.complete(&author(), assignment.id, AssignmentOutcome::Done).await.unwrap();
        assert_eq!(done.outcome, Some(AssignmentOutcome::Done));
    }

    #[tokio::test]
    async fn others_need_the_grant_to_withdraw() {
        let fixture = Fixture::new();
        let draft = fixture.draft("Cold Front").await;
        let assignment = fixture.ledger.assign(&editor(), request(draft.id, "ana", AssignmentRole::CopyEditor)).await.unwrap();

        let err = fixture.ledger.withdraw(&reviewer(), assignment.id).await.unwrap_err();
        assert!(matches!(err, EditorialError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn list_active_filters_by_due_date() {
        let fixture = Fixture::new();
        let draft = fixture.draft("Cold Front").await;
        let now = fixture.clock.now();

        let mut soon = request(draft.id, "ana", AssignmentRole::FactChecker);
        soon.due_at = Some(now + Duration::hours(1));
        let mut later = request(draft.id, "ben", AssignmentRole::CopyEditor);
        later.due_at = Some(now + Duration::days(3));
        let soon = fixture.ledger.assign(&editor(), soon).await.unwrap();
        fixture.ledger.assign(&editor(), later).await.unwrap();

        let due_today = fixture
            .ledger
            .list_active(AssignmentFilter {
                due_before: Some(now + Duration::hours(12)),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(due_today.iter().map(|a| a.id).collect::<Vec<_>>(), vec![soon.id]);
    }
}
