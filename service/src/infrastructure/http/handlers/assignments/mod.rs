use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use editorial_common::AssignmentId;
use editorial_common::assignment::Assignment;

use crate::domain::AppState;
use crate::infrastructure::http::actor::CurrentActor;
use crate::infrastructure::http::api::{ApiError, ApiSuccess};
use crate::infrastructure::http::handlers::ManyResponse;
use crate::infrastructure::http::handlers::assignments::dto::{
    ActiveAssignmentsParams, AssignRequestBody, CompleteRequestBody,
};
use crate::infrastructure::http::querystring::QueryString;

mod dto;

type AssignmentResult = Result<ApiSuccess<Assignment>, ApiError>;

pub async fn assign<S: AppState>(
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
    Json(body): Json<AssignRequestBody>,
) -> AssignmentResult {
    let assignment = state.ledger().assign(&actor, body.into()).await?;
    Ok(ApiSuccess::new(StatusCode::CREATED, assignment))
}

pub async fn get_assignment<S: AppState>(
    Path(id): Path<AssignmentId>,
    State(state): State<S>,
) -> AssignmentResult {
    let assignment = state.ledger().find(id).await?;
    Ok(ApiSuccess::ok(assignment))
}

pub async fn complete<S: AppState>(
    Path(id): Path<AssignmentId>,
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
    Json(body): Json<CompleteRequestBody>,
) -> AssignmentResult {
    let assignment = state.ledger().complete(&actor, id, body.outcome).await?;
    Ok(ApiSuccess::ok(assignment))
}

pub async fn withdraw<S: AppState>(
    Path(id): Path<AssignmentId>,
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
) -> AssignmentResult {
    let assignment = state.ledger().withdraw(&actor, id).await?;
    Ok(ApiSuccess::ok(assignment))
}

pub async fn list_active<S: AppState>(
    State(state): State<S>,
    QueryString(params): QueryString<ActiveAssignmentsParams>,
) -> Result<ApiSuccess<ManyResponse<Assignment>>, ApiError> {
    let assignments = state.ledger().list_active(params.into()).await?;
    Ok(ApiSuccess::ok(ManyResponse::new(assignments)))
}
