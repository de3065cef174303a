use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use editorial_common::ArticleId;
use editorial_common::article::ArticleContent;
use editorial_common::assignment::Assignment;
use editorial_common::schedule::{Channel, ScheduleEntry};

use crate::domain::AppState;
use crate::domain::repository::query::{ArticleFilter, AssignmentFilter};
use crate::infrastructure::http::actor::CurrentActor;
use crate::infrastructure::http::api::{ApiError, ApiSuccess};
use crate::infrastructure::http::handlers::ManyResponse;
use crate::infrastructure::http::handlers::articles::dto::{
    ArticleResponse, ListArticlesParams, PublicationResponse, PublishEventResponse,
    PublishRequestBody, RevisionRequestBody, ScheduleRequestBody, SubmitRequestBody,
};
use crate::infrastructure::http::querystring::QueryString;

mod dto;

type ArticleResult = Result<ApiSuccess<ArticleResponse>, ApiError>;

pub async fn create_article<S: AppState>(
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
    Json(fields): Json<ArticleContent>,
) -> ArticleResult {
    let article = state.drafts().create(&actor, fields).await?;
    Ok(ApiSuccess::new(StatusCode::CREATED, article.into()))
}

pub async fn list_articles<S: AppState>(
    State(state): State<S>,
    QueryString(params): QueryString<ListArticlesParams>,
) -> Result<ApiSuccess<ManyResponse<ArticleResponse>>, ApiError> {
    let filter = ArticleFilter {
        statuses: params.status.unwrap_or_default(),
        limit: params.limit,
    };
    let articles = state.engine().list_articles(filter).await?;
    Ok(ApiSuccess::ok(articles.into_iter().collect()))
}

pub async fn get_article<S: AppState>(Path(id): Path<ArticleId>, State(state): State<S>) -> ArticleResult {
    let article = state.engine().get_article(id).await?;
    Ok(ApiSuccess::ok(article.into()))
}

pub async fn commit_content<S: AppState>(
    Path(id): Path<ArticleId>,
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
    Json(fields): Json<ArticleContent>,
) -> ArticleResult {
    let article = state.drafts().commit(&actor, id, fields).await?;
    Ok(ApiSuccess::ok(article.into()))
}

pub async fn submit_for_review<S: AppState>(
    Path(id): Path<ArticleId>,
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
    Json(body): Json<SubmitRequestBody>,
) -> ArticleResult {
    let reviewer = body.reviewer.map(Into::into);
    let article = state.engine().submit_for_review(&actor, id, reviewer).await?;
    Ok(ApiSuccess::ok(article.into()))
}

pub async fn approve<S: AppState>(
    Path(id): Path<ArticleId>,
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
) -> ArticleResult {
    let article = state.engine().approve(&actor, id).await?;
    Ok(ApiSuccess::ok(article.into()))
}

pub async fn request_revision<S: AppState>(
    Path(id): Path<ArticleId>,
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
    Json(body): Json<RevisionRequestBody>,
) -> ArticleResult {
    let article = state.engine().request_revision(&actor, id, &body.note).await?;
    Ok(ApiSuccess::ok(article.into()))
}

pub async fn schedule<S: AppState>(
    Path(id): Path<ArticleId>,
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
    Json(body): Json<ScheduleRequestBody>,
) -> ArticleResult {
    let article = state.engine().schedule(&actor, id, body.into()).await?;
    Ok(ApiSuccess::ok(article.into()))
}

pub async fn cancel_schedule<S: AppState>(
    Path(id): Path<ArticleId>,
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
) -> ArticleResult {
    let article = state.engine().cancel_schedule(&actor, id).await?;
    Ok(ApiSuccess::ok(article.into()))
}

pub async fn schedule_entry<S: AppState>(
    Path(id): Path<ArticleId>,
    State(state): State<S>,
) -> Result<ApiSuccess<ScheduleEntry>, ApiError> {
    state
        .engine()
        .schedule_entry(id)
        .await?
        .map(ApiSuccess::ok)
        .ok_or_else(|| ApiError::NotFound(format!("article {id} is not scheduled")))
}

pub async fn publish_now<S: AppState>(
    Path(id): Path<ArticleId>,
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
    Json(body): Json<PublishRequestBody>,
) -> Result<ApiSuccess<PublicationResponse>, ApiError> {
    let publication = state.engine().publish_now(&actor, id, body.channels).await?;
    Ok(ApiSuccess::ok(publication.into()))
}

pub async fn archive<S: AppState>(
    Path(id): Path<ArticleId>,
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
) -> ArticleResult {
    let article = state.engine().archive(&actor, id).await?;
    Ok(ApiSuccess::ok(article.into()))
}

pub async fn publication_status<S: AppState>(
    Path(id): Path<ArticleId>,
    State(state): State<S>,
) -> Result<ApiSuccess<PublishEventResponse>, ApiError> {
    state
        .engine()
        .publication_status(id)
        .await?
        .map(|event| ApiSuccess::ok(event.into()))
        .ok_or_else(|| ApiError::NotFound(format!("article {id} has not been published")))
}

pub async fn retry_channel<S: AppState>(
    Path((id, channel)): Path<(ArticleId, Channel)>,
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
) -> Result<ApiSuccess<PublishEventResponse>, ApiError> {
    let event = state.engine().retry_channel(&actor, id, channel).await?;
    Ok(ApiSuccess::ok(event.into()))
}

/// Full assignment history of one article, resolved ones included.
pub async fn article_assignments<S: AppState>(
    Path(id): Path<ArticleId>,
    State(state): State<S>,
) -> Result<ApiSuccess<ManyResponse<Assignment>>, ApiError> {
    let filter = AssignmentFilter {
        article_id: Some(id),
        ..AssignmentFilter::default()
    };
    let assignments = state.ledger().list(filter).await?;
    Ok(ApiSuccess::ok(ManyResponse::new(assignments)))
}
