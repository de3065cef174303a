use axum::extract::State;
use chrono::{DateTime, Utc};
use editorial_common::schedule::{DueWindow, ScheduleEntry};
use serde::Deserialize;

use crate::domain::AppState;
use crate::domain::scheduler::TickReport;
use crate::infrastructure::http::actor::CurrentActor;
use crate::infrastructure::http::api::{ApiError, ApiSuccess};
use crate::infrastructure::http::handlers::ManyResponse;
use crate::infrastructure::http::querystring::QueryString;

/// Window `(after, until]`; without `after` every overdue entry is included.
#[derive(Debug, Deserialize)]
pub struct DueParams {
    pub after: Option<DateTime<Utc>>,
    pub until: DateTime<Utc>,
}

pub async fn list_due<S: AppState>(
    State(state): State<S>,
    QueryString(params): QueryString<DueParams>,
) -> Result<ApiSuccess<ManyResponse<ScheduleEntry>>, ApiError> {
    if params.after.is_some_and(|after| after >= params.until) {
        return Err(ApiError::UnprocessableEntity("after must be before until".to_string()));
    }

    let window = DueWindow {
        after: params.after,
        until: params.until,
    };
    let entries = state.scheduler().list_due(window).await?;
    Ok(ApiSuccess::ok(ManyResponse::new(entries)))
}

/// Runs one scheduler pass right away, e.g. when the background loop is disabled.
pub async fn tick<S: AppState>(
    State(state): State<S>,
    CurrentActor(actor): CurrentActor,
) -> Result<ApiSuccess<TickReport>, ApiError> {
    let report = state.scheduler().tick_on_behalf(&actor).await?;
    Ok(ApiSuccess::ok(report))
}
