use std::future::Future;

use chrono::{DateTime, Utc};
use editorial_common::article::{Article, ArticleContent, ArticleStatus};
use editorial_common::assignment::{Assignment, AssignmentResolution, AssignmentStatus, NewAssignment};
use editorial_common::publication::PublishEvent;
use editorial_common::schedule::{DueWindow, ScheduleEntry};
use editorial_common::snapshot::{DraftSnapshot, SnapshotKey};
use editorial_common::{ActorId, ArticleId, AssignmentId};

use crate::domain::repository::query::{ArticleFilter, AssignmentFilter};
use crate::domain::repository::transition::{TransitionOutcome, TransitionPlan};

pub mod query;
pub mod transition;

/// The single authoritative store of articles, assignments, schedule entries and publish events.
///
/// Every method is one atomic operation: it either applies completely or not at all.
pub trait EditorialRepository: Clone + Send + Sync + 'static {
    /// Store a freshly created article
    fn insert_article(
        &self,
        article: Article,
    ) -> impl Future<Output = Result<Article, RepositoryError>> + Send;

    /// Find single article by ID
    fn find_article(
        &self,
        id: ArticleId,
    ) -> impl Future<Output = Result<Option<Article>, RepositoryError>> + Send;

    /// Find articles matching filter, most recently edited first
    fn list_articles(
        &self,
        filter: ArticleFilter,
    ) -> impl Future<Output = Result<Vec<Article>, RepositoryError>> + Send;

    /// Replace the content of an editable article.
    /// Fails with [`RepositoryError::StatusMismatch`] when the status does not allow edits.
    fn update_content(
        &self,
        update: ContentUpdate,
    ) -> impl Future<Output = Result<Article, RepositoryError>> + Send;

    /// Compare-and-swap the article status and apply the side effects of the plan.
    fn apply_transition(
        &self,
        plan: TransitionPlan,
    ) -> impl Future<Output = Result<TransitionOutcome, RepositoryError>> + Send;

    /// Store a new pending assignment, withdrawing the pending one it supersedes
    fn insert_assignment(
        &self,
        assignment: NewAssignment,
    ) -> impl Future<Output = Result<AssignmentChange, RepositoryError>> + Send;

    fn find_assignment(
        &self,
        id: AssignmentId,
    ) -> impl Future<Output = Result<Option<Assignment>, RepositoryError>> + Send;

    /// Resolve a pending assignment.
    /// Fails with [`RepositoryError::NotPending`] if it is already resolved.
    fn resolve_assignment(
        &self,
        id: AssignmentId,
        resolution: AssignmentResolution,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Assignment, RepositoryError>> + Send;

    fn list_assignments(
        &self,
        filter: AssignmentFilter,
    ) -> impl Future<Output = Result<Vec<Assignment>, RepositoryError>> + Send;

    fn find_schedule_entry(
        &self,
        article_id: ArticleId,
    ) -> impl Future<Output = Result<Option<ScheduleEntry>, RepositoryError>> + Send;

    /// Schedule entries inside the window in promotion order, at most `limit` of them
    fn due_entries(
        &self,
        window: DueWindow,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ScheduleEntry>, RepositoryError>> + Send;

    /// Store the publish event of an article, replacing a previous one
    fn save_publish_event(
        &self,
        event: PublishEvent,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn find_publish_event(
        &self,
        article_id: ArticleId,
    ) -> impl Future<Output = Result<Option<PublishEvent>, RepositoryError>> + Send;
}

/// Crash-recovery copies of unsaved editor buffers, one per owner and article.
pub trait SnapshotRepository: Clone + Send + Sync + 'static {
    /// Insert or overwrite the snapshot under its key
    fn save_snapshot(
        &self,
        snapshot: DraftSnapshot,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn load_snapshot(
        &self,
        key: SnapshotKey,
    ) -> impl Future<Output = Result<Option<DraftSnapshot>, RepositoryError>> + Send;

    /// Returns whether a snapshot existed
    fn clear_snapshot(
        &self,
        key: SnapshotKey,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

#[derive(Debug, Clone)]
pub struct ContentUpdate {
    pub article_id: ArticleId,
    pub content: ArticleContent,
    pub actor: ActorId,
    pub at: DateTime<Utc>,
}

/// A stored assignment together with the one it replaced.
#[derive(Debug, Clone)]
pub struct AssignmentChange {
    pub assignment: Assignment,
    pub superseded: Option<Assignment>,
}

#[derive(Debug)]
pub enum RepositoryError {
    NotFound,
    /// The article is not in a status the operation expects; carries the current one
    StatusMismatch(ArticleStatus),
    /// The assignment was already resolved; carries its status
    NotPending(AssignmentStatus),
    UniqueViolation(String),
    DatabaseError(String),
}
