//! PostgreSQL implementation of the repository ports.
//!
//! Every mutating method runs in one transaction and locks the article row first,
//! which serializes concurrent writers on the same article.

use chrono::{DateTime, Utc};
use editorial_common::article::{Article, ArticleState, ArticleStatus};
use editorial_common::assignment::{
    Assignment, AssignmentResolution, AssignmentRole, AssignmentStatus, NewAssignment,
};
use editorial_common::database::Database;
use editorial_common::publication::PublishEvent;
use editorial_common::schedule::{DueWindow, ScheduleEntry};
use editorial_common::snapshot::{DraftSnapshot, SnapshotKey};
use editorial_common::{
    ARTICLES_TABLE, ASSIGNMENTS_TABLE, ActorId, ArticleId, AssignmentId, DRAFT_SNAPSHOTS_TABLE,
    PUBLISH_EVENTS_TABLE, SCHEDULE_ENTRIES_TABLE,
};
use sqlx::types::Json;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::domain::repository::query::{ArticleFilter, AssignmentFilter};
use crate::domain::repository::transition::{
    AssignmentEffect, ScheduleEffect, TransitionOutcome, TransitionPlan,
};
use crate::domain::repository::{
    AssignmentChange, ContentUpdate, EditorialRepository, RepositoryError, SnapshotRepository,
};
use crate::infrastructure::persistence::rows::{
    ARTICLE_COLUMNS, ASSIGNMENT_COLUMNS, PUBLISH_EVENT_COLUMNS, SCHEDULE_COLUMNS, SNAPSHOT_COLUMNS,
    article_from_row, assignment_from_row, publish_event_from_row, schedule_entry_from_row,
    snapshot_from_row,
};

mod rows;

#[derive(Clone, Debug)]
pub struct PostgresRepository {
    database: &'static Database,
}

impl PostgresRepository {
    pub fn new(database: &'static Database) -> Self {
        Self { database }
    }
}

fn database_error(e: sqlx::Error) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::UniqueViolation(db.message().to_string())
        }
        _ => RepositoryError::DatabaseError(e.to_string()),
    }
}

/// Lock the article row for the rest of the transaction and return its status.
async fn lock_article(conn: &mut PgConnection, id: ArticleId) -> Result<Article, RepositoryError> {
    let row = sqlx::query(&format!(
        "SELECT {ARTICLE_COLUMNS} FROM {ARTICLES_TABLE} WHERE id = $1 FOR UPDATE"
    ))
    .bind(id.0)
    .fetch_optional(&mut *conn)
    .await
    .map_err(database_error)?
    .ok_or(RepositoryError::NotFound)?;

    article_from_row(&row)
}

async fn insert_schedule_entry(conn: &mut PgConnection, entry: &ScheduleEntry) -> Result<(), RepositoryError> {
    sqlx::query(&format!(
        "INSERT INTO {SCHEDULE_ENTRIES_TABLE} ({SCHEDULE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
    ))
    .bind(entry.article_id.0)
    .bind(entry.publish_at)
    .bind(Json(&entry.channels))
    .bind(entry.priority.as_str())
    .bind(entry.notes.as_deref())
    .bind(entry.created_by.as_ref())
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await
    .map_err(database_error)?;
    Ok(())
}

async fn delete_schedule_entry(
    conn: &mut PgConnection,
    article_id: ArticleId,
) -> Result<Option<ScheduleEntry>, RepositoryError> {
    sqlx::query(&format!(
        "DELETE FROM {SCHEDULE_ENTRIES_TABLE} WHERE article_id = $1 RETURNING {SCHEDULE_COLUMNS}"
    ))
    .bind(article_id.0)
    .fetch_optional(&mut *conn)
    .await
    .map_err(database_error)?
    .as_ref()
    .map(schedule_entry_from_row)
    .transpose()
}

async fn resolve_pending(
    conn: &mut PgConnection,
    article_id: ArticleId,
    role: Option<AssignmentRole>,
    resolution: AssignmentResolution,
    at: DateTime<Utc>,
) -> Result<Vec<Assignment>, RepositoryError> {
    let (status, outcome) = match resolution {
        AssignmentResolution::Completed(outcome) => (AssignmentStatus::Completed, Some(outcome)),
        AssignmentResolution::Withdrawn => (AssignmentStatus::Withdrawn, None),
    };

    let rows = sqlx::query(&format!(
        "UPDATE {ASSIGNMENTS_TABLE} SET status = $3, outcome = $4, resolved_at = $5 \
         WHERE article_id = $1 AND ($2::TEXT IS NULL OR role = $2) AND status = 'pending' \
         RETURNING {ASSIGNMENT_COLUMNS}"
    ))
    .bind(article_id.0)
    .bind(role.map(|role| role.as_str()))
    .bind(status.as_str())
    .bind(outcome.map(|outcome| outcome.as_str()))
    .bind(at)
    .fetch_all(&mut *conn)
    .await
    .map_err(database_error)?;

    rows.iter().map(assignment_from_row).collect()
}

/// Withdraw the pending assignment for the same article and role, then insert the new one.
async fn assign(conn: &mut PgConnection, new: NewAssignment) -> Result<AssignmentChange, RepositoryError> {
    let superseded = resolve_pending(
        conn,
        new.article_id,
        Some(new.role),
        AssignmentResolution::Withdrawn,
        new.created_at,
    )
    .await?
    .into_iter()
    .next();

    let assignment = new.into_pending();
    sqlx::query(&format!(
        "INSERT INTO {ASSIGNMENTS_TABLE} ({ASSIGNMENT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
    ))
    .bind(assignment.id.0)
    .bind(assignment.article_id.0)
    .bind(assignment.assignee_id.as_ref())
    .bind(assignment.role.as_str())
    .bind(assignment.due_at)
    .bind(assignment.status.as_str())
    .bind(assignment.outcome.map(|outcome| outcome.as_str()))
    .bind(assignment.instructions.as_deref())
    .bind(assignment.assigned_by.as_ref())
    .bind(assignment.created_at)
    .bind(assignment.resolved_at)
    .execute(&mut *conn)
    .await
    .map_err(database_error)?;

    Ok(AssignmentChange {
        assignment,
        superseded,
    })
}

async fn apply_assignment_effect(
    conn: &mut PgConnection,
    article_id: ArticleId,
    effect: AssignmentEffect,
    actor: &ActorId,
    at: DateTime<Utc>,
) -> Result<Vec<Assignment>, RepositoryError> {
    match effect {
        AssignmentEffect::Keep => Ok(vec![]),
        AssignmentEffect::Assign(new) => {
            let change = assign(conn, new).await?;
            Ok(change.superseded.into_iter().chain([change.assignment]).collect())
        }
        AssignmentEffect::RefreshOrReassign { role, due_at } => {
            let refreshed = sqlx::query(&format!(
                "UPDATE {ASSIGNMENTS_TABLE} SET due_at = $3 \
                 WHERE article_id = $1 AND role = $2 AND status = 'pending' \
                 RETURNING {ASSIGNMENT_COLUMNS}"
            ))
            .bind(article_id.0)
            .bind(role.as_str())
            .bind(due_at)
            .fetch_optional(&mut *conn)
            .await
            .map_err(database_error)?;
            if let Some(row) = refreshed {
                return Ok(vec![assignment_from_row(&row)?]);
            }

            let latest = sqlx::query(&format!(
                "SELECT {ASSIGNMENT_COLUMNS} FROM {ASSIGNMENTS_TABLE} \
                 WHERE article_id = $1 AND role = $2 ORDER BY created_at DESC LIMIT 1"
            ))
            .bind(article_id.0)
            .bind(role.as_str())
            .fetch_optional(&mut *conn)
            .await
            .map_err(database_error)?;

            match latest {
                Some(row) => {
                    let latest = assignment_from_row(&row)?;
                    let change = assign(
                        conn,
                        NewAssignment {
                            article_id,
                            assignee_id: latest.assignee_id,
                            role,
                            due_at,
                            instructions: latest.instructions,
                            assigned_by: actor.clone(),
                            created_at: at,
                        },
                    )
                    .await?;
                    Ok(vec![change.assignment])
                }
                None => Ok(vec![]),
            }
        }
        AssignmentEffect::CompletePending { role, outcome } => {
            resolve_pending(conn, article_id, Some(role), AssignmentResolution::Completed(outcome), at).await
        }
        AssignmentEffect::WithdrawPending => {
            resolve_pending(conn, article_id, None, AssignmentResolution::Withdrawn, at).await
        }
    }
}

impl EditorialRepository for PostgresRepository {
    async fn insert_article(&self, article: Article) -> Result<Article, RepositoryError> {
        let row = sqlx::query(&format!(
            "INSERT INTO {ARTICLES_TABLE} (title, {ARTICLE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(&article.content.title)
        .bind(article.id.0)
        .bind(Json(&article.content))
        .bind(article.status().as_str())
        .bind(article.publish_at())
        .bind(article.state.revision_note().map(|note| note.to_string()))
        .bind(article.state.published_at())
        .bind(article.created_at)
        .bind(article.last_edited_at)
        .bind(article.last_edited_by.as_ref())
        .bind(article.status_changed_at)
        .bind(article.version)
        .fetch_one(self.database.database_pool())
        .await
        .map_err(database_error)?;

        article_from_row(&row)
    }

    async fn find_article(&self, id: ArticleId) -> Result<Option<Article>, RepositoryError> {
        sqlx::query(&format!("SELECT {ARTICLE_COLUMNS} FROM {ARTICLES_TABLE} WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(self.database.database_pool())
            .await
            .map_err(database_error)?
            .as_ref()
            .map(article_from_row)
            .transpose()
    }

    async fn list_articles(&self, filter: ArticleFilter) -> Result<Vec<Article>, RepositoryError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ARTICLE_COLUMNS} FROM {ARTICLES_TABLE}"));

        if !filter.statuses.is_empty() {
            let statuses: Vec<&str> = filter.statuses.iter().map(ArticleStatus::as_str).collect();
            query.push(" WHERE status = ANY(").push_bind(statuses).push(")");
        }
        query.push(" ORDER BY last_edited_at DESC, id");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = query
            .build()
            .fetch_all(self.database.database_pool())
            .await
            .map_err(database_error)?;

        rows.iter().map(article_from_row).collect()
    }

    async fn update_content(&self, update: ContentUpdate) -> Result<Article, RepositoryError> {
        let mut tx = self.database.begin().await.map_err(database_error)?;

        let current = lock_article(&mut tx, update.article_id).await?;
        if !current.status().is_editable() {
            return Err(RepositoryError::StatusMismatch(current.status()));
        }

        let row = sqlx::query(&format!(
            "UPDATE {ARTICLES_TABLE} SET title = $2, content = $3, last_edited_at = $4, \
             last_edited_by = $5, version = version + 1 WHERE id = $1 RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(update.article_id.0)
        .bind(&update.content.title)
        .bind(Json(&update.content))
        .bind(update.at)
        .bind(update.actor.as_ref())
        .fetch_one(&mut *tx)
        .await
        .map_err(database_error)?;
        let article = article_from_row(&row)?;

        tx.commit().await.map_err(database_error)?;
        Ok(article)
    }

    async fn apply_transition(&self, plan: TransitionPlan) -> Result<TransitionOutcome, RepositoryError> {
        let mut tx = self.database.begin().await.map_err(database_error)?;
        let id = plan.article_id;

        let current = lock_article(&mut tx, id).await?;
        let previous = current.status();
        if !plan.allowed_from.contains(&previous) {
            return Err(RepositoryError::StatusMismatch(previous));
        }

        if let Some(expected) = plan.required_schedule {
            let publish_at: Option<DateTime<Utc>> = sqlx::query_scalar(&format!(
                "SELECT publish_at FROM {SCHEDULE_ENTRIES_TABLE} WHERE article_id = $1"
            ))
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(database_error)?;
            if publish_at != Some(expected) {
                return Err(RepositoryError::StatusMismatch(previous));
            }
        }

        let removed_schedule = match &plan.schedule {
            ScheduleEffect::Keep => None,
            ScheduleEffect::Create(entry) => {
                insert_schedule_entry(&mut tx, entry).await?;
                None
            }
            ScheduleEffect::Remove => delete_schedule_entry(&mut tx, id).await?,
        };
        let assignments = apply_assignment_effect(&mut tx, id, plan.assignments, &plan.actor, plan.at).await?;

        let next: &ArticleState = &plan.next;
        let row = sqlx::query(&format!(
            "UPDATE {ARTICLES_TABLE} SET status = $2, publish_at = $3, revision_note = $4, \
             published_at = $5, status_changed_at = $6, version = version + 1 \
             WHERE id = $1 RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(id.0)
        .bind(next.status().as_str())
        .bind(next.publish_at())
        .bind(next.revision_note().map(|note| note.to_string()))
        .bind(next.published_at())
        .bind(plan.at)
        .fetch_one(&mut *tx)
        .await
        .map_err(database_error)?;
        let article = article_from_row(&row)?;

        tx.commit().await.map_err(database_error)?;

        Ok(TransitionOutcome {
            previous,
            article,
            removed_schedule,
            assignments,
        })
    }

    async fn insert_assignment(&self, assignment: NewAssignment) -> Result<AssignmentChange, RepositoryError> {
        let mut tx = self.database.begin().await.map_err(database_error)?;

        let article = lock_article(&mut tx, assignment.article_id).await?;
        if !article.status().accepts_assignments() {
            return Err(RepositoryError::StatusMismatch(article.status()));
        }
        let change = assign(&mut tx, assignment).await?;

        tx.commit().await.map_err(database_error)?;
        Ok(change)
    }

    async fn find_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, RepositoryError> {
        sqlx::query(&format!("SELECT {ASSIGNMENT_COLUMNS} FROM {ASSIGNMENTS_TABLE} WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(self.database.database_pool())
            .await
            .map_err(database_error)?
            .as_ref()
            .map(assignment_from_row)
            .transpose()
    }

    async fn resolve_assignment(
        &self,
        id: AssignmentId,
        resolution: AssignmentResolution,
        at: DateTime<Utc>,
    ) -> Result<Assignment, RepositoryError> {
        let (status, outcome) = match resolution {
            AssignmentResolution::Completed(outcome) => (AssignmentStatus::Completed, Some(outcome)),
            AssignmentResolution::Withdrawn => (AssignmentStatus::Withdrawn, None),
        };

        let resolved = sqlx::query(&format!(
            "UPDATE {ASSIGNMENTS_TABLE} SET status = $2, outcome = $3, resolved_at = $4 \
             WHERE id = $1 AND status = 'pending' RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(id.0)
        .bind(status.as_str())
        .bind(outcome.map(|outcome| outcome.as_str()))
        .bind(at)
        .fetch_optional(self.database.database_pool())
        .await
        .map_err(database_error)?;

        if let Some(row) = resolved {
            return assignment_from_row(&row);
        }

        // nothing updated: either unknown or already resolved
        match self.find_assignment(id).await? {
            Some(existing) => Err(RepositoryError::NotPending(existing.status)),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn list_assignments(&self, filter: AssignmentFilter) -> Result<Vec<Assignment>, RepositoryError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ASSIGNMENT_COLUMNS} FROM {ASSIGNMENTS_TABLE} WHERE TRUE"));

        if let Some(article_id) = filter.article_id {
            query.push(" AND article_id = ").push_bind(article_id.0);
        }
        if let Some(assignee_id) = &filter.assignee_id {
            query.push(" AND assignee_id = ").push_bind(assignee_id.as_ref().to_string());
        }
        if let Some(role) = filter.role {
            query.push(" AND role = ").push_bind(role.as_str());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(due_before) = filter.due_before {
            query.push(" AND due_at < ").push_bind(due_before);
        }
        query.push(" ORDER BY due_at ASC NULLS LAST, created_at");

        let rows = query
            .build()
            .fetch_all(self.database.database_pool())
            .await
            .map_err(database_error)?;

        rows.iter().map(assignment_from_row).collect()
    }

    async fn find_schedule_entry(&self, article_id: ArticleId) -> Result<Option<ScheduleEntry>, RepositoryError> {
        sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM {SCHEDULE_ENTRIES_TABLE} WHERE article_id = $1"
        ))
        .bind(article_id.0)
        .fetch_optional(self.database.database_pool())
        .await
        .map_err(database_error)?
        .as_ref()
        .map(schedule_entry_from_row)
        .transpose()
    }

    async fn due_entries(&self, window: DueWindow, limit: usize) -> Result<Vec<ScheduleEntry>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM {SCHEDULE_ENTRIES_TABLE} \
             WHERE publish_at <= $1 AND ($2::TIMESTAMPTZ IS NULL OR publish_at > $2) \
             ORDER BY publish_at, \
                 CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END, \
                 article_id \
             LIMIT $3"
        ))
        .bind(window.until)
        .bind(window.after)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(self.database.database_pool())
        .await
        .map_err(database_error)?;

        rows.iter().map(schedule_entry_from_row).collect()
    }

    async fn save_publish_event(&self, event: PublishEvent) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO {PUBLISH_EVENTS_TABLE} ({PUBLISH_EVENT_COLUMNS}) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (article_id) DO UPDATE \
             SET triggered_at = EXCLUDED.triggered_at, trigger = EXCLUDED.trigger, results = EXCLUDED.results"
        ))
        .bind(event.article_id.0)
        .bind(event.triggered_at)
        .bind(Json(&event.trigger))
        .bind(Json(&event.results))
        .execute(self.database.database_pool())
        .await
        .map_err(database_error)?;
        Ok(())
    }

    async fn find_publish_event(&self, article_id: ArticleId) -> Result<Option<PublishEvent>, RepositoryError> {
        sqlx::query(&format!(
            "SELECT {PUBLISH_EVENT_COLUMNS} FROM {PUBLISH_EVENTS_TABLE} WHERE article_id = $1"
        ))
        .bind(article_id.0)
        .fetch_optional(self.database.database_pool())
        .await
        .map_err(database_error)?
        .as_ref()
        .map(publish_event_from_row)
        .transpose()
    }
}

impl SnapshotRepository for PostgresRepository {
    async fn save_snapshot(&self, snapshot: DraftSnapshot) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO {DRAFT_SNAPSHOTS_TABLE} ({SNAPSHOT_COLUMNS}) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (owner_id, article_key) DO UPDATE \
             SET fields = EXCLUDED.fields, captured_at = EXCLUDED.captured_at"
        ))
        .bind(snapshot.owner.as_ref())
        .bind(snapshot.key().article_key())
        .bind(Json(&snapshot.fields))
        .bind(snapshot.captured_at)
        .execute(self.database.database_pool())
        .await
        .map_err(database_error)?;
        Ok(())
    }

    async fn load_snapshot(&self, key: SnapshotKey) -> Result<Option<DraftSnapshot>, RepositoryError> {
        sqlx::query(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM {DRAFT_SNAPSHOTS_TABLE} WHERE owner_id = $1 AND article_key = $2"
        ))
        .bind(key.owner.as_ref())
        .bind(key.article_key())
        .fetch_optional(self.database.database_pool())
        .await
        .map_err(database_error)?
        .as_ref()
        .map(snapshot_from_row)
        .transpose()
    }

    async fn clear_snapshot(&self, key: SnapshotKey) -> Result<bool, RepositoryError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {DRAFT_SNAPSHOTS_TABLE} WHERE owner_id = $1 AND article_key = $2"
        ))
        .bind(key.owner.as_ref())
        .bind(key.article_key())
        .execute(self.database.database_pool())
        .await
        .map_err(database_error)?;
        Ok(result.rows_affected() > 0)
    }
}
