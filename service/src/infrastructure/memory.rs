//! In-memory implementation of the repository ports.
//!
//! All state sits behind one async mutex, so every method is atomic with respect to
//! every other one. Used for local development and by the test suites.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use editorial_common::article::Article;
use editorial_common::assignment::{
    Assignment, AssignmentResolution, AssignmentRole, NewAssignment,
};
use editorial_common::publication::PublishEvent;
use editorial_common::schedule::{DueWindow, ScheduleEntry, promotion_order};
use editorial_common::snapshot::{DraftSnapshot, SnapshotKey};
use editorial_common::{ActorId, ArticleId, AssignmentId};
use tokio::sync::Mutex;

use crate::domain::repository::query::{ArticleFilter, AssignmentFilter};
use crate::domain::repository::transition::{
    AssignmentEffect, ScheduleEffect, TransitionOutcome, TransitionPlan,
};
use crate::domain::repository::{
    AssignmentChange, ContentUpdate, EditorialRepository, RepositoryError, SnapshotRepository,
};

#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct MemoryState {
    articles: HashMap<ArticleId, Article>,
    /// In insertion order
    assignments: Vec<Assignment>,
    schedule: HashMap<ArticleId, ScheduleEntry>,
    publish_events: HashMap<ArticleId, PublishEvent>,
    snapshots: HashMap<SnapshotKey, DraftSnapshot>,
}

impl MemoryState {
    fn pending_mut(&mut self, article_id: ArticleId, role: AssignmentRole) -> Option<&mut Assignment> {
        self.assignments
            .iter_mut()
            .find(|a| a.article_id == article_id && a.role == role && a.is_pending())
    }

    fn assign(&mut self, new: NewAssignment) -> AssignmentChange {
        let at = new.created_at;
        let superseded = self.pending_mut(new.article_id, new.role).map(|pending| {
            AssignmentResolution::Withdrawn.apply(pending, at);
            pending.clone()
        });

        let assignment = new.into_pending();
        self.assignments.push(assignment.clone());

        AssignmentChange {
            assignment,
            superseded,
        }
    }

    fn apply_assignment_effect(
        &mut self,
        article_id: ArticleId,
        effect: AssignmentEffect,
        actor: &ActorId,
        at: DateTime<Utc>,
    ) -> Vec<Assignment> {
        match effect {
            AssignmentEffect::Keep => vec![],
            AssignmentEffect::Assign(new) => {
                let change = self.assign(new);
                change.superseded.into_iter().chain([change.assignment]).collect()
            }
            AssignmentEffect::RefreshOrReassign { role, due_at } => {
                if let Some(pending) = self.pending_mut(article_id, role) {
                    pending.due_at = due_at;
                    return vec![pending.clone()];
                }

                let latest = self
                    .assignments
                    .iter()
                    .filter(|a| a.article_id == article_id && a.role == role)
                    .max_by_key(|a| a.created_at)
                    .cloned();

                match latest {
                    Some(latest) => {
                        let change = self.assign(NewAssignment {
                            article_id,
                            assignee_id: latest.assignee_id,
                            role,
                            due_at,
                            instructions: latest.instructions,
                            assigned_by: actor.clone(),
                            created_at: at,
                        });
                        vec![change.assignment]
                    }
                    None => vec![],
                }
            }
            AssignmentEffect::CompletePending { role, outcome } => self
                .pending_mut(article_id, role)
                .map(|pending| {
                    AssignmentResolution::Completed(outcome).apply(pending, at);
                    pending.clone()
                })
                .into_iter()
                .collect(),
            AssignmentEffect::WithdrawPending => self
                .assignments
                .iter_mut()
                .filter(|a| a.article_id == article_id && a.is_pending())
                .map(|pending| {
                    AssignmentResolution::Withdrawn.apply(pending, at);
                    pending.clone()
                })
                .collect(),
        }
    }
}

impl EditorialRepository for InMemoryRepository {
    async fn insert_article(&self, article: Article) -> Result<Article, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.articles.contains_key(&article.id) {
            return Err(RepositoryError::UniqueViolation(format!(
                "article {} already exists",
                article.id
            )));
        }
        state.articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn find_article(&self, id: ArticleId) -> Result<Option<Article>, RepositoryError> {
        Ok(self.state.lock().await.articles.get(&id).cloned())
    }

    async fn list_articles(&self, filter: ArticleFilter) -> Result<Vec<Article>, RepositoryError> {
        let state = self.state.lock().await;
        let mut articles: Vec<Article> = state
            .articles
            .values()
            .filter(|article| filter.matches(article))
            .cloned()
            .collect();
        articles.sort_by(|a, b| b.last_edited_at.cmp(&a.last_edited_at).then(a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            articles.truncate(limit);
        }
        Ok(articles)
    }

    async fn update_content(&self, update: ContentUpdate) -> Result<Article, RepositoryError> {
        let mut state = self.state.lock().await;
        let article = state
            .articles
            .get_mut(&update.article_id)
            .ok_or(RepositoryError::NotFound)?;

        if !article.status().is_editable() {
            return Err(RepositoryError::StatusMismatch(article.status()));
        }

        article.content = update.content;
        article.last_edited_at = update.at;
        article.last_edited_by = update.actor;
        article.version += 1;
        Ok(article.clone())
    }

    async fn apply_transition(
        &self,
        plan: TransitionPlan,
    ) -> Result<TransitionOutcome, RepositoryError> {
        let mut state = self.state.lock().await;
        let id = plan.article_id;

        // every check happens before the first write
        let mut article = state
            .articles
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;
        let previous = article.status();

        if !plan.allowed_from.contains(&previous) {
            return Err(RepositoryError::StatusMismatch(previous));
        }
        if let Some(expected) = plan.required_schedule {
            let current = state.schedule.get(&id).map(|entry| entry.publish_at);
            if current != Some(expected) {
                return Err(RepositoryError::StatusMismatch(previous));
            }
        }
        if matches!(plan.schedule, ScheduleEffect::Create(_)) && state.schedule.contains_key(&id) {
            return Err(RepositoryError::UniqueViolation(format!(
                "article {id} already has a schedule entry"
            )));
        }

        let removed_schedule = match plan.schedule {
            ScheduleEffect::Keep => None,
            ScheduleEffect::Create(entry) => {
                state.schedule.insert(id, entry);
                None
            }
            ScheduleEffect::Remove => state.schedule.remove(&id),
        };
        let assignments = state.apply_assignment_effect(id, plan.assignments, &plan.actor, plan.at);

        article.state = plan.next;
        article.status_changed_at = plan.at;
        article.version += 1;
        state.articles.insert(id, article.clone());

        Ok(TransitionOutcome {
            previous,
            article,
            removed_schedule,
            assignments,
        })
    }

    async fn insert_assignment(
        &self,
        assignment: NewAssignment,
    ) -> Result<AssignmentChange, RepositoryError> {
        let mut state = self.state.lock().await;
        let status = state
            .articles
            .get(&assignment.article_id)
            .map(Article::status)
            .ok_or(RepositoryError::NotFound)?;

        if !status.accepts_assignments() {
            return Err(RepositoryError::StatusMismatch(status));
        }
        Ok(state.assign(assignment))
    }

    async fn find_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.assignments.iter().find(|a| a.id == id).cloned())
    }

    async fn resolve_assignment(
        &self,
        id: AssignmentId,
        resolution: AssignmentResolution,
        at: DateTime<Utc>,
    ) -> Result<Assignment, RepositoryError> {
        let mut state = self.state.lock().await;
        let assignment = state
            .assignments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound)?;

        if !assignment.is_pending() {
            return Err(RepositoryError::NotPending(assignment.status));
        }
        resolution.apply(assignment, at);
        Ok(assignment.clone())
    }

    async fn list_assignments(
        &self,
        filter: AssignmentFilter,
    ) -> Result<Vec<Assignment>, RepositoryError> {
        let state = self.state.lock().await;
        let mut assignments: Vec<Assignment> = state
            .assignments
            .iter()
            .filter(|assignment| filter.matches(assignment))
            .cloned()
            .collect();
        // earliest deadline first, assignments without due date last
        assignments.sort_by_key(|a| (a.due_at.is_none(), a.due_at, a.created_at));
        Ok(assignments)
    }

    async fn find_schedule_entry(
        &self,
        article_id: ArticleId,
    ) -> Result<Option<ScheduleEntry>, RepositoryError> {
        Ok(self.state.lock().await.schedule.get(&article_id).cloned())
    }

    async fn due_entries(
        &self,
        window: DueWindow,
        limit: usize,
    ) -> Result<Vec<ScheduleEntry>, RepositoryError> {
        let state = self.state.lock().await;
        let mut entries: Vec<ScheduleEntry> = state
            .schedule
            .values()
            .filter(|entry| window.contains(entry.publish_at))
            .cloned()
            .collect();
        entries.sort_by(promotion_order);
        entries.truncate(limit);
        Ok(entries)
    }

    async fn save_publish_event(&self, event: PublishEvent) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.articles.contains_key(&event.article_id) {
            return Err(RepositoryError::NotFound);
        }
        state.publish_events.insert(event.article_id, event);
        Ok(())
    }

    async fn find_publish_event(
        &self,
        article_id: ArticleId,
    ) -> Result<Option<PublishEvent>, RepositoryError> {
        Ok(self.state.lock().await.publish_events.get(&article_id).cloned())
    }
}

impl SnapshotRepository for InMemoryRepository {
    async fn save_snapshot(&self, snapshot: DraftSnapshot) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.snapshots.insert(snapshot.key(), snapshot);
        Ok(())
    }

    async fn load_snapshot(&self, key: SnapshotKey) -> Result<Option<DraftSnapshot>, RepositoryError> {
        Ok(self.state.lock().await.snapshots.get(&key).cloned())
    }

    async fn clear_snapshot(&self, key: SnapshotKey) -> Result<bool, RepositoryError> {
        Ok(self.state.lock().await.snapshots.remove(&key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use editorial_common::article::{ArticleState, ArticleStatus};
    use editorial_common::assignment::{AssignmentOutcome, AssignmentStatus};
    use editorial_common::schedule::{Channel, ChannelSelection, Priority};
    use editorial_common::test_utils::{actor, content, epoch};

    use super::*;

    async fn stored(repository: &InMemoryRepository, state: ArticleState) -> Article {
        let mut article = Article::new_draft(content("Harbour Lights"), actor("author"), epoch());
        article.state = state;
        repository.insert_article(article).await.unwrap()
    }

    fn plan(article: &Article, allowed_from: &'static [ArticleStatus], next: ArticleState) -> TransitionPlan {
        TransitionPlan {
            article_id: article.id,
            allowed_from,
            next,
            required_schedule: None,
            schedule: ScheduleEffect::Keep,
            assignments: AssignmentEffect::Keep,
            actor: actor("editor"),
            at: epoch(),
        }
    }

    fn entry(article_id: ArticleId, publish_at: DateTime<Utc>, priority: Priority) -> ScheduleEntry {
        ScheduleEntry {
            article_id,
            publish_at,
            channels: ChannelSelection::enabled_only([Channel::Site]),
            priority,
            notes: None,
            created_by: actor("editor"),
            created_at: epoch(),
        }
    }

    fn reviewer_for(article_id: ArticleId, assignee: &str, at: DateTime<Utc>) -> NewAssignment {
        NewAssignment {
            article_id,
            assignee_id: actor(assignee),
            role: AssignmentRole::Reviewer,
            due_at: None,
            instructions: None,
            assigned_by: actor("editor"),
            created_at: at,
        }
    }

    #[tokio::test]
    async fn status_mismatch_leaves_everything_untouched() {
        let repository = InMemoryRepository::new();
        let article = stored(&repository, ArticleState::Draft).await;

        let mut transition = plan(&article, &[ArticleStatus::Approved], ArticleState::Archived);
        transition.schedule = ScheduleEffect::Create(entry(article.id, epoch(), Priority::Medium));

        let err = repository.apply_transition(transition).await.unwrap_err();
        assert!(matches!(err, RepositoryError::StatusMismatch(ArticleStatus::Draft)));

        let unchanged = repository.find_article(article.id).await.unwrap().unwrap();
        assert_eq!(unchanged, article);
        assert!(repository.find_schedule_entry(article.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn required_schedule_must_match_publish_time() {
        let repository = InMemoryRepository::new();
        let at = epoch() + Duration::hours(2);
        let article = stored(&repository, ArticleState::Scheduled { publish_at: at }).await;
        repository.state.lock().await.schedule.insert(article.id, entry(article.id, at, Priority::High));

        let mut stale = plan(&article, &[ArticleStatus::Scheduled], ArticleState::Published { published_at: at });
        stale.required_schedule = Some(at - Duration::hours(1));
        assert!(matches!(
            repository.apply_transition(stale).await,
            Err(RepositoryError::StatusMismatch(ArticleStatus::Scheduled))
        ));

        let mut current = plan(&article, &[ArticleStatus::Scheduled], ArticleState::Published { published_at: at });
        current.required_schedule = Some(at);
        current.schedule = ScheduleEffect::Remove;
        let outcome = repository.apply_transition(current).await.unwrap();

        assert_eq!(outcome.removed_schedule.map(|e| e.publish_at), Some(at));
        assert_eq!(outcome.article.status(), ArticleStatus::Published);
        assert_eq!(outcome.article.version, article.version + 1);
    }

    #[tokio::test]
    async fn second_assignment_supersedes_the_pending_one() {
        let repository = InMemoryRepository::new();
        let article = stored(&repository, ArticleState::InReview).await;

        let first = repository.insert_assignment(reviewer_for(article.id, "ana", epoch())).await.unwrap();
        let second = repository
            .insert_assignment(reviewer_for(article.id, "ben", epoch() + Duration::minutes(5)))
            .await
            .unwrap();

        assert_eq!(second.superseded.as_ref().map(|a| a.id), Some(first.assignment.id));
        let all = repository
            .list_assignments(AssignmentFilter { article_id: Some(article.id), ..Default::default() })
            .await
            .unwrap();
        let pending: Vec<_> = all.iter().filter(|a| a.is_pending()).collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].assignee_id, actor("ben"));
        assert!(all.iter().any(|a| a.status == AssignmentStatus::Withdrawn));
    }

    #[tokio::test]
    async fn assignments_refused_on_archived_article() {
        let repository = InMemoryRepository::new();
        let article = stored(&repository, ArticleState::Archived).await;

        let err = repository.insert_assignment(reviewer_for(article.id, "ana", epoch())).await.unwrap_err();
        assert!(matches!(err, RepositoryError::StatusMismatch(ArticleStatus::Archived)));
    }

    #[tokio::test]
    async fn resolving_twice_reports_current_status() {
        let repository = InMemoryRepository::new();
        let article = stored(&repository, ArticleState::InReview).await;
        let change = repository.insert_assignment(reviewer_for(article.id, "ana", epoch())).await.unwrap();
        let id = change.assignment.id;

        let resolution = AssignmentResolution::Completed(AssignmentOutcome::Approved);
        repository.resolve_assignment(id, resolution, epoch()).await.unwrap();
        let err = repository.resolve_assignment(id, resolution, epoch()).await.unwrap_err();

        assert!(matches!(err, RepositoryError::NotPending(AssignmentStatus::Completed)));
    }

    #[tokio::test]
    async fn reassign_copies_latest_previous_assignee() {
        let repository = InMemoryRepository::new();
        let article = stored(&repository, ArticleState::NeedsRevision {
            revision_note: editorial_common::article::RevisionNote::try_new("tighten the intro").unwrap(),
        })
        .await;
        let change = repository.insert_assignment(reviewer_for(article.id, "ana", epoch())).await.unwrap();
        repository
            .resolve_assignment(
                change.assignment.id,
                AssignmentResolution::Completed(AssignmentOutcome::RevisionRequested),
                epoch(),
            )
            .await
            .unwrap();

        let mut submit = plan(&article, &[ArticleStatus::NeedsRevision], ArticleState::InReview);
        let due_at = Some(epoch() + Duration::days(2));
        submit.assignments = AssignmentEffect::RefreshOrReassign { role: AssignmentRole::Reviewer, due_at };
        let outcome = repository.apply_transition(submit).await.unwrap();

        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.assignments[0].assignee_id, actor("ana"));
        assert_eq!(outcome.assignments[0].due_at, due_at);
        assert!(outcome.assignments[0].is_pending());
    }

    #[tokio::test]
    async fn due_entries_follow_promotion_order_and_limit() {
        let repository = InMemoryRepository::new();
        let at = epoch();
        let mut ids = vec![];
        for (offset, priority) in [(10, Priority::Low), (0, Priority::Low), (0, Priority::High), (90, Priority::High)] {
            let publish_at = at + Duration::minutes(offset);
            let article = stored(&repository, ArticleState::Scheduled { publish_at }).await;
            repository.state.lock().await.schedule.insert(article.id, entry(article.id, publish_at, priority));
            ids.push(article.id);
        }

        let due = repository
            .due_entries(DueWindow::up_to(at + Duration::minutes(30)), 2)
            .await
            .unwrap();

        assert_eq!(due.iter().map(|e| e.article_id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);
    }

    #[tokio::test]
    async fn snapshots_are_keyed_by_owner_and_article() {
        let repository = InMemoryRepository::new();
        let snapshot = DraftSnapshot {
            owner: actor("author"),
            article_id: None,
            fields: content("Untitled"),
            captured_at: epoch(),
        };
        repository.save_snapshot(snapshot.clone()).await.unwrap();

        let other_owner = SnapshotKey::new(actor("someone"), None);
        assert!(repository.load_snapshot(other_owner).await.unwrap().is_none());
        assert_eq!(repository.load_snapshot(snapshot.key()).await.unwrap(), Some(snapshot.clone()));
        assert!(repository.clear_snapshot(snapshot.key()).await.unwrap());
        assert!(!repository.clear_snapshot(snapshot.key()).await.unwrap());
    }
}
