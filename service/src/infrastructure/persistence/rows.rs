use chrono::{DateTime, Utc};
use editorial_common::article::{Article, ArticleContent, ArticleState, ArticleStatus};
use editorial_common::assignment::{Assignment, AssignmentOutcome, AssignmentRole, AssignmentStatus};
use editorial_common::publication::{ChannelResult, PublishEvent, PublishTrigger};
use editorial_common::schedule::{Channel, ChannelSelection, Priority, ScheduleEntry};
use editorial_common::snapshot::DraftSnapshot;
use editorial_common::{ActorId, NEW_ARTICLE_SNAPSHOT_KEY};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Decode, Postgres, Row, Type};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::repository::RepositoryError;

pub(super) const ARTICLE_COLUMNS: &str = "id, content, status, publish_at, revision_note, published_at, \
     created_at, last_edited_at, last_edited_by, status_changed_at, version";

pub(super) const ASSIGNMENT_COLUMNS: &str = "id, article_id, assignee_id, role, due_at, status, outcome, \
     instructions, assigned_by, created_at, resolved_at";

pub(super) const SCHEDULE_COLUMNS: &str = "article_id, publish_at, channels, priority, notes, created_by, created_at";

pub(super) const SNAPSHOT_COLUMNS: &str = "owner_id, article_key, fields, captured_at";

pub(super) const PUBLISH_EVENT_COLUMNS: &str = "article_id, triggered_at, trigger, results";

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, RepositoryError>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| RepositoryError::DatabaseError(format!("Failed to parse {name}: {e}")))
}

fn parsed<T>(row: &PgRow, name: &str) -> Result<T, RepositoryError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value: String = column(row, name)?;
    value
        .parse()
        .map_err(|e| RepositoryError::DatabaseError(format!("Failed to parse {name}: {e}")))
}

fn parsed_optional<T>(row: &PgRow, name: &str) -> Result<Option<T>, RepositoryError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value: Option<String> = column(row, name)?;
    value
        .map(|value| value.parse())
        .transpose()
        .map_err(|e| RepositoryError::DatabaseError(format!("Failed to parse {name}: {e}")))
}

fn actor(row: &PgRow, name: &str) -> Result<ActorId, RepositoryError> {
    let value: String = column(row, name)?;
    ActorId::try_new(value)
        .map_err(|e| RepositoryError::DatabaseError(format!("Failed to parse {name}: {e}")))
}

pub(super) fn article_from_row(row: &PgRow) -> Result<Article, RepositoryError> {
    let id: Uuid = column(row, "id")?;
    let Json(content): Json<ArticleContent> = column(row, "content")?;
    let status: ArticleStatus = parsed(row, "status")?;
    let publish_at: Option<DateTime<Utc>> = column(row, "publish_at")?;
    let revision_note: Option<String> = column(row, "revision_note")?;
    let published_at: Option<DateTime<Utc>> = column(row, "published_at")?;

    let state = ArticleState::from_parts(status, publish_at, revision_note, published_at)
        .map_err(|e| RepositoryError::DatabaseError(format!("Inconsistent article {id}: {e}")))?;

    Ok(Article {
        id: id.into(),
        content,
        state,
        created_at: column(row, "created_at")?,
        last_edited_at: column(row, "last_edited_at")?,
        last_edited_by: actor(row, "last_edited_by")?,
        status_changed_at: column(row, "status_changed_at")?,
        version: column(row, "version")?,
    })
}

pub(super) fn assignment_from_row(row: &PgRow) -> Result<Assignment, RepositoryError> {
    let id: Uuid = column(row, "id")?;
    let article_id: Uuid = column(row, "article_id")?;
    let role: AssignmentRole = parsed(row, "role")?;
    let status: AssignmentStatus = parsed(row, "status")?;
    let outcome: Option<AssignmentOutcome> = parsed_optional(row, "outcome")?;

    Ok(Assignment {
        id: id.into(),
        article_id: article_id.into(),
        assignee_id: actor(row, "assignee_id")?,
        role,
        due_at: column(row, "due_at")?,
        status,
        outcome,
        instructions: column(row, "instructions")?,
        assigned_by: actor(row, "assigned_by")?,
        created_at: column(row, "created_at")?,
        resolved_at: column(row, "resolved_at")?,
    })
}

pub(super) fn schedule_entry_from_row(row: &PgRow) -> Result<ScheduleEntry, RepositoryError> {
    let article_id: Uuid = column(row, "article_id")?;
    let Json(channels): Json<ChannelSelection> = column(row, "channels")?;
    let priority: Priority = parsed(row, "priority")?;

    Ok(ScheduleEntry {
        article_id: article_id.into(),
        publish_at: column(row, "publish_at")?,
        channels,
        priority,
        notes: column(row, "notes")?,
        created_by: actor(row, "created_by")?,
        created_at: column(row, "created_at")?,
    })
}

pub(super) fn snapshot_from_row(row: &PgRow) -> Result<DraftSnapshot, RepositoryError> {
    let article_key: String = column(row, "article_key")?;
    let article_id = if article_key == NEW_ARTICLE_SNAPSHOT_KEY {
        None
    } else {
        let id = Uuid::parse_str(&article_key)
            .map_err(|e| RepositoryError::DatabaseError(format!("Failed to parse article_key: {e}")))?;
        Some(id.into())
    };
    let Json(fields): Json<ArticleContent> = column(row, "fields")?;

    Ok(DraftSnapshot {
        owner: actor(row, "owner_id")?,
        article_id,
        fields,
        captured_at: column(row, "captured_at")?,
    })
}

pub(super) fn publish_event_from_row(row: &PgRow) -> Result<PublishEvent, RepositoryError> {
    let article_id: Uuid = column(row, "article_id")?;
    let Json(trigger): Json<PublishTrigger> = column(row, "trigger")?;
    let Json(results): Json<BTreeMap<Channel, ChannelResult>> = column(row, "results")?;

    Ok(PublishEvent {
        article_id: article_id.into(),
        triggered_at: column(row, "triggered_at")?,
        trigger,
        results,
    })
}
