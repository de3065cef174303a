use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use editorial_common::ArticleId;
use editorial_common::article::ArticleContent;
use editorial_common::snapshot::DraftSnapshot;
use serde::{Deserialize, Serialize};

use crate::domain::AppState;
use crate::infrastructure::http::actor::CurrentActor;
use crate::infrastructure::http::api::{ApiError, ApiSuccess};
use crate::infrastructure::http::querystring::QueryString;

/// Snapshots are keyed by owner and article; no `articleId` means the unsaved new article.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotParams {
    pub article_id: Option<ArticleId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreCandidateResponse {
    snapshot: Option<DraftSnapshot>,
}

pub async fn save_snapshot<S: AppState>(
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
    QueryString(params): QueryString<SnapshotParams>,
    Json(fields): Json<ArticleContent>,
) -> Result<ApiSuccess<DraftSnapshot>, ApiError> {
    let snapshot = state.drafts().save_snapshot(&actor, params.article_id, fields).await?;
    Ok(ApiSuccess::ok(snapshot))
}

pub async fn load_snapshot<S: AppState>(
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
    QueryString(params): QueryString<SnapshotParams>,
) -> Result<ApiSuccess<DraftSnapshot>, ApiError> {
    state
        .drafts()
        .load_snapshot(&actor, params.article_id)
        .await?
        .map(ApiSuccess::ok)
        .ok_or_else(|| ApiError::NotFound("snapshot not found".to_string()))
}

pub async fn clear_snapshot<S: AppState>(
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
    QueryString(params): QueryString<SnapshotParams>,
) -> Result<StatusCode, ApiError> {
    if state.drafts().clear_snapshot(&actor, params.article_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("snapshot not found".to_string()))
    }
}

/// Offers a snapshot for restore. Restoring is the client's call and commits nothing.
pub async fn restore_candidate<S: AppState>(
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
    QueryString(params): QueryString<SnapshotParams>,
) -> Result<ApiSuccess<RestoreCandidateResponse>, ApiError> {
    let snapshot = state.drafts().restore_candidate(&actor, params.article_id).await?;
    Ok(ApiSuccess::ok(RestoreCandidateResponse { snapshot }))
}

/// Pushes the editor buffer into the auto-saved session.
pub async fn update_session<S: AppState>(
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
    QueryString(params): QueryString<SnapshotParams>,
    Json(fields): Json<ArticleContent>,
) -> Result<StatusCode, ApiError> {
    state.sessions().update(&actor, params.article_id, fields).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn close_session<S: AppState>(
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
    QueryString(params): QueryString<SnapshotParams>,
) -> Result<StatusCode, ApiError> {
    if state.sessions().close(&actor, params.article_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("no open editing session".to_string()))
    }
}
