//! Committed article content and the crash-recovery snapshots of unsaved edits.
//!
//! A snapshot is only ever handed back to the editor. Nothing here applies it to an
//! article: restoring is always an explicit commit by the author.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use editorial_common::ArticleId;
use editorial_common::article::{Article, ArticleContent};
use editorial_common::snapshot::{DraftSnapshot, SnapshotKey};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::Collaborators;
use crate::domain::audit::AuditEntry;
use crate::domain::error::EditorialError;
use crate::domain::identity::{Actor, EditorialAction};
use crate::domain::repository::{ContentUpdate, EditorialRepository, RepositoryError, SnapshotRepository};

#[derive(Clone)]
pub struct DraftStore<R> {
    repository: R,
    collaborators: Collaborators,
}

impl<R> DraftStore<R>
where
    R: EditorialRepository + SnapshotRepository,
{
    pub fn new(repository: R, collaborators: Collaborators) -> Self {
        Self {
            repository,
            collaborators,
        }
    }

    /// First save of a new article. It always starts as a draft.
    #[tracing::instrument(skip_all, fields(actor = %actor.id))]
    pub async fn create(&self, actor: &Actor, fields: ArticleContent) -> Result<Article, EditorialError> {
        self.collaborators
            .authorize(actor, EditorialAction::CreateArticle, None)
            .await?;
        validate_title(&fields)?;

        let article = Article::new_draft(fields, actor.id.clone(), self.collaborators.clock.now());
        let article = self.repository.insert_article(article).await?;
        self.discard_snapshot(SnapshotKey::new(actor.id.clone(), None)).await;

        tracing::info!(article_id = %article.id, "article created");
        self.collaborators
            .audit(actor, Some(article.id), AuditEntry::ArticleCreated);
        Ok(article)
    }

    /// Replace the content of an article owned by its author.
    #[tracing::instrument(skip_all, fields(actor = %actor.id, article_id = %id))]
    pub async fn commit(
        &self,
        actor: &Actor,
        id: ArticleId,
        fields: ArticleContent,
    ) -> Result<Article, EditorialError> {
        self.collaborators
            .authorize(actor, EditorialAction::CommitContent, Some(id))
            .await?;
        validate_title(&fields)?;

        let update = ContentUpdate {
            article_id: id,
            content: fields,
            actor: actor.id.clone(),
            at: self.collaborators.clock.now(),
        };
        let article = self
            .repository
            .update_content(update)
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => EditorialError::article_not_found(id),
                other => other.into(),
            })?;
        self.discard_snapshot(SnapshotKey::new(actor.id.clone(), Some(id))).await;

        self.collaborators.audit(
            actor,
            Some(id),
            AuditEntry::ContentCommitted {
                version: article.version,
            },
        );
        Ok(article)
    }

    pub async fn save_snapshot(
        &self,
        owner: &Actor,
        article_id: Option<ArticleId>,
        fields: ArticleContent,
    ) -> Result<DraftSnapshot, EditorialError> {
        let snapshot = DraftSnapshot {
            owner: owner.id.clone(),
            article_id,
            fields,
            captured_at: self.collaborators.clock.now(),
        };
        self.repository.save_snapshot(snapshot.clone()).await?;
        tracing::debug!(owner = %owner.id, article_id = ?article_id, "snapshot saved");
        Ok(snapshot)
    }

    pub async fn load_snapshot(
        &self,
        owner: &Actor,
        article_id: Option<ArticleId>,
    ) -> Result<Option<DraftSnapshot>, EditorialError> {
        let key = SnapshotKey::new(owner.id.clone(), article_id);
        Ok(self.repository.load_snapshot(key).await?)
    }

    pub async fn clear_snapshot(
        &self,
        owner: &Actor,
        article_id: Option<ArticleId>,
    ) -> Result<bool, EditorialError> {
        let key = SnapshotKey::new(owner.id.clone(), article_id);
        Ok(self.repository.clear_snapshot(key).await?)
    }

    /// The snapshot worth offering for restore: one that is newer than the committed
    /// article, or any snapshot of an unsaved article.
    pub async fn restore_candidate(
        &self,
        owner: &Actor,
        article_id: Option<ArticleId>,
    ) -> Result<Option<DraftSnapshot>, EditorialError> {
        let Some(snapshot) = self.load_snapshot(owner, article_id).await? else {
            return Ok(None);
        };

        let Some(id) = article_id else {
            return Ok(Some(snapshot));
        };
        let article = self
            .repository
            .find_article(id)
            .await?
            .ok_or_else(|| EditorialError::article_not_found(id))?;

        Ok((snapshot.captured_at > article.last_edited_at).then_some(snapshot))
    }

    /// Editing an existing article needs commit rights on it, a new one needs create rights.
    pub async fn authorize_edit(&self, actor: &Actor, article_id: Option<ArticleId>) -> Result<(), EditorialError> {
        let Some(id) = article_id else {
            return self
                .collaborators
                .authorize(actor, EditorialAction::CreateArticle, None)
                .await;
        };

        self.collaborators
            .authorize(actor, EditorialAction::CommitContent, Some(id))
            .await?;
        self.repository
            .find_article(id)
            .await?
            .map(|_| ())
            .ok_or_else(|| EditorialError::article_not_found(id))
    }

    async fn discard_snapshot(&self, key: SnapshotKey) {
        if let Err(err) = self.repository.clear_snapshot(key).await {
            tracing::warn!(error = ?err, "failed to clear snapshot after save");
        }
    }
}

fn validate_title(fields: &ArticleContent) -> Result<(), EditorialError> {
    if fields.title.trim().is_empty() {
        return Err(EditorialError::Validation("title must not be empty".to_string()));
    }
    Ok(())
}

/// Periodically copy the editor buffer into the owner's snapshot.
///
/// Saves only when the buffer changed since the previous save. Stops when `cancel`
/// fires, the buffer's sender is dropped or the buffer stayed unchanged for `idle_timeout`.
pub fn spawn_autosave<R>(
    drafts: DraftStore<R>,
    owner: Actor,
    article_id: Option<ArticleId>,
    mut buffer: watch::Receiver<ArticleContent>,
    every: Duration,
    idle_timeout: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: EditorialRepository + SnapshotRepository,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_change = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    match buffer.has_changed() {
                        Ok(true) => {}
                        Ok(false) if last_change.elapsed() >= idle_timeout => {
                            tracing::debug!(owner = %owner.id, article_id = ?article_id, "editing session idle");
                            break;
                        }
                        Ok(false) => continue,
                        Err(_) => break,
                    }
                    last_change = Instant::now();
                    let fields = buffer.borrow_and_update().clone();
                    if let Err(err) = drafts.save_snapshot(&owner, article_id, fields).await {
                        tracing::warn!(owner = %owner.id, error = %err, "auto-save failed");
                    }
                }
            }
        }
        tracing::debug!(owner = %owner.id, "auto-save stopped");
    })
}

struct EditingSession {
    buffer: watch::Sender<ArticleContent>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Live editor buffers, each backed up by its own auto-save task.
#[derive(Clone)]
pub struct EditingSessions<R> {
    drafts: DraftStore<R>,
    every: Duration,
    idle_timeout: Duration,
    shutdown: CancellationToken,
    sessions: Arc<Mutex<HashMap<SnapshotKey, EditingSession>>>,
}

impl<R> EditingSessions<R>
where
    R: EditorialRepository + SnapshotRepository,
{
    /// Sessions stop when `shutdown` is cancelled or after `idle_timeout` without an update.
    pub fn new(
        drafts: DraftStore<R>,
        every: Duration,
        idle_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            drafts,
            every,
            idle_timeout,
            shutdown,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Replace the buffer of the owner's session, opening one if needed.
    pub async fn update(
        &self,
        owner: &Actor,
        article_id: Option<ArticleId>,
        fields: ArticleContent,
    ) -> Result<(), EditorialError> {
        self.drafts.authorize_edit(owner, article_id).await?;

        let key = SnapshotKey::new(owner.id.clone(), article_id);
        let mut sessions = self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // sessions that went idle or were shut down
        sessions.retain(|_, session| !session.task.is_finished());

        if let Some(session) = sessions.get(&key) {
            session.buffer.send_replace(fields);
            return Ok(());
        }

        let (buffer, mut receiver) = watch::channel(fields);
        // the first buffer is unsaved as well
        receiver.mark_changed();
        let cancel = self.shutdown.child_token();
        let task = spawn_autosave(
            self.drafts.clone(),
            owner.clone(),
            article_id,
            receiver,
            self.every,
            self.idle_timeout,
            cancel.clone(),
        );
        tracing::debug!(owner = %owner.id, article_id = ?article_id, "editing session opened");
        sessions.insert(key, EditingSession { buffer, cancel, task });
        Ok(())
    }

    /// Stop auto-saving the owner's buffer. The last snapshot stays.
    pub fn close(&self, owner: &Actor, article_id: Option<ArticleId>) -> bool {
        let key = SnapshotKey::new(owner.id.clone(), article_id);
        let mut sessions = self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        match sessions.remove(&key) {
            Some(session) => {
                session.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn open_sessions(&self) -> usize {
        let sessions = self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.values().filter(|session| !session.task.is_finished()).count()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as TimeDelta;
    use editorial_common::article::ArticleStatus;
    use editorial_common::test_utils::content;

    use super::*;
    use crate::domain::clock::Clock;
    use crate::domain::testing::{Fixture, author, editor, intruder, reviewer};

    #[tokio::test]
    async fn create_starts_a_draft_and_clears_the_unsaved_snapshot() {
        let fixture = Fixture::new();
        fixture.drafts.save_snapshot(&author(), None, content("Tide Tables")).await.unwrap();

        let article = fixture.drafts.create(&author(), content("Tide Tables")).await.unwrap();

        assert_eq!(article.status(), ArticleStatus::Draft);
        assert_eq!(article.version, 1);
        assert!(fixture.drafts.load_snapshot(&author(), None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let fixture = Fixture::new();
        let err = fixture.drafts.create(&author(), content("  ")).await.unwrap_err();
        assert!(matches!(err, EditorialError::Validation(_)));
    }

    #[tokio::test]
    async fn commit_outside_editable_statuses_is_invalid_state() {
        let fixture = Fixture::new();
        let article = fixture.in_review("Tide Tables").await;

        let err = fixture.drafts.commit(&author(), article.id, content("Tide Tables v2")).await.unwrap_err();

        assert!(matches!(err, EditorialError::InvalidState { status: ArticleStatus::InReview }));
        let unchanged = fixture.engine.get_article(article.id).await.unwrap();
        assert_eq!(unchanged.content.title, "Tide Tables");
    }

    #[tokio::test]
    async fn commit_bumps_version_and_clears_snapshot() {
        let fixture = Fixture::new();
        let draft = fixture.draft("Tide Tables").await;
        fixture.drafts.save_snapshot(&author(), Some(draft.id), content("Tide Tables v2")).await.unwrap();
        fixture.clock.advance(TimeDelta::minutes(1));

        let committed = fixture.drafts.commit(&author(), draft.id, content("Tide Tables v2")).await.unwrap();

        assert_eq!(committed.version, draft.version + 1);
        assert_eq!(committed.last_edited_at, fixture.clock.now());
        assert!(fixture.drafts.load_snapshot(&author(), Some(draft.id)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_needs_permission() {
        let fixture = Fixture::new();
        let draft = fixture.draft("Tide Tables").await;

        let err = fixture.drafts.commit(&intruder(), draft.id, content("Defaced")).await.unwrap_err();
        assert!(matches!(err, EditorialError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn restore_candidate_only_when_newer_than_article() {
        let fixture = Fixture::new();
        let draft = fixture.draft("Tide Tables").await;

        // captured at the same instant the article was saved
        fixture.drafts.save_snapshot(&author(), Some(draft.id), content("stale")).await.unwrap();
        assert!(fixture.drafts.restore_candidate(&author(), Some(draft.id)).await.unwrap().is_none());

        fixture.clock.advance(TimeDelta::seconds(30));
        fixture.drafts.save_snapshot(&author(), Some(draft.id), content("fresh")).await.unwrap();
        let candidate = fixture.drafts.restore_candidate(&author(), Some(draft.id)).await.unwrap().unwrap();
        assert_eq!(candidate.fields.title, "fresh");
    }

    #[tokio::test]
    async fn restore_never_commits() {
        let fixture = Fixture::new();
        let draft = fixture.draft("Tide Tables").await;
        fixture.clock.advance(TimeDelta::seconds(30));
        fixture.drafts.save_snapshot(&author(), Some(draft.id), content("Crash Recovery")).await.unwrap();

        fixture.drafts.restore_candidate(&author(), Some(draft.id)).await.unwrap();

        let stored = fixture.engine.get_article(draft.id).await.unwrap();
        assert_eq!(stored, draft);
        assert!(fixture.drafts.load_snapshot(&author(), Some(draft.id)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn review_actions_keep_the_authors_snapshot_on_offer() {
        let fixture = Fixture::new();
        let article = fixture.in_review("Tide Tables").await;
        let committed_at = article.last_edited_at;

        fixture.clock.advance(TimeDelta::minutes(1));
        fixture.drafts.save_snapshot(&author(), Some(article.id), content("Tide Tables v2")).await.unwrap();
        fixture.clock.advance(TimeDelta::minutes(1));
        let revised = fixture
            .engine
            .request_revision(&reviewer(), article.id, "tighten the intro")
            .await
            .unwrap();

        assert_eq!(revised.last_edited_at, committed_at);
        assert_eq!(revised.last_edited_by, author().id);
        assert_eq!(revised.status_changed_at, fixture.clock.now());

        let candidate = fixture.drafts.restore_candidate(&author(), Some(article.id)).await.unwrap().unwrap();
        assert_eq!(candidate.fields.title, "Tide Tables v2");
    }

    #[tokio::test]
    async fn snapshots_are_private_to_their_owner() {
        let fixture = Fixture::new();
        fixture.drafts.save_snapshot(&author(), None, content("Mine")).await.unwrap();

        assert!(fixture.drafts.load_snapshot(&editor(), None).await.unwrap().is_none());
        assert!(fixture.drafts.clear_snapshot(&author(), None).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_writes_only_changed_buffers_and_stops_on_cancel() {
        let fixture = Fixture::new();
        let (sender, receiver) = watch::channel(content("Untitled"));
        let cancel = CancellationToken::new();
        let handle = spawn_autosave(
            fixture.drafts.clone(),
            author(),
            None,
            receiver,
            Duration::from_secs(30),
            Duration::from_secs(600),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert!(fixture.drafts.load_snapshot(&author(), None).await.unwrap().is_none());

        sender.send(content("Low Tide")).unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        let snapshot = fixture.drafts.load_snapshot(&author(), None).await.unwrap().unwrap();
        assert_eq!(snapshot.fields.title, "Low Tide");

        cancel.cancel();
        handle.await.unwrap();
        sender.send(content("After Cancel")).unwrap_err();
    }

    #[tokio::test(start_paused = true)]
    async fn editing_session_autosaves_latest_buffer() {
        let fixture = Fixture::new();
        let shutdown = CancellationToken::new();
        let sessions = EditingSessions::new(
            fixture.drafts.clone(),
            Duration::from_secs(30),
            Duration::from_secs(600),
            shutdown.clone(),
        );

        sessions.update(&author(), None, content("First Words")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let first = fixture.drafts.load_snapshot(&author(), None).await.unwrap().unwrap();
        assert_eq!(first.fields.title, "First Words");

        sessions.update(&author(), None, content("Second Thoughts")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;
        let second = fixture.drafts.load_snapshot(&author(), None).await.unwrap().unwrap();
        assert_eq!(second.fields.title, "Second Thoughts");
        assert_eq!(sessions.open_sessions(), 1);

        assert!(sessions.close(&author(), None));
        assert!(!sessions.close(&author(), None));
        shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_editing_sessions_stop_and_are_pruned() {
        let fixture = Fixture::new();
        let shutdown = CancellationToken::new();
        let sessions = EditingSessions::new(
            fixture.drafts.clone(),
            Duration::from_secs(30),
            Duration::from_secs(120),
            shutdown.clone(),
        );

        sessions.update(&author(), None, content("First Words")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sessions.open_sessions(), 1);

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(sessions.open_sessions(), 0);
        assert!(fixture.drafts.load_snapshot(&author(), None).await.unwrap().is_some());

        // a later update opens a fresh session in place of the expired one
        sessions.update(&author(), None, content("Second Wind")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sessions.open_sessions(), 1);
        let snapshot = fixture.drafts.load_snapshot(&author(), None).await.unwrap().unwrap();
        assert_eq!(snapshot.fields.title, "Second Wind");
        shutdown.cancel();
    }

    #[tokio::test]
    async fn editing_sessions_need_edit_rights_on_an_existing_article() {
        let fixture = Fixture::new();
        let shutdown = CancellationToken::new();
        let sessions = EditingSessions::new(
            fixture.drafts.clone(),
            Duration::from_secs(30),
            Duration::from_secs(120),
            shutdown.clone(),
        );
        let draft = fixture.draft("Tide Tables").await;

        let err = sessions
            .update(&intruder(), Some(draft.id), content("Defaced"))
            .await
            .unwrap_err();
        assert!(matches!(err, EditorialError::Forbidden { .. }));

        let err = sessions
            .update(&author(), Some(ArticleId::generate()), content("Nowhere"))
            .await
            .unwrap_err();
        assert!(matches!(err, EditorialError::NotFound(_)));
        assert_eq!(sessions.open_sessions(), 0);
        shutdown.cancel();
    }
}
