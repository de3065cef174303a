use chrono::{DateTime, Utc};
use editorial_common::assignment::{AssignmentOutcome, AssignmentRole};
use editorial_common::{ActorId, ArticleId};
use serde::Deserialize;

use crate::domain::assignments::AssignRequest;
use crate::domain::repository::query::AssignmentFilter;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequestBody {
    pub article_id: ArticleId,
    pub assignee_id: ActorId,
    pub role: AssignmentRole,
    pub due_at: Option<DateTime<Utc>>,
    pub instructions: Option<String>,
}

impl From<AssignRequestBody> for AssignRequest {
    fn from(value: AssignRequestBody) -> Self {
        Self {
            article_id: value.article_id,
            assignee_id: value.assignee_id,
            role: value.role,
            due_at: value.due_at,
            instructions: value.instructions,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequestBody {
    pub outcome: AssignmentOutcome,
}

/// Filters of the active assignments listing. Only pending assignments are ever returned.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAssignmentsParams {
    pub article_id: Option<ArticleId>,
    pub assignee_id: Option<ActorId>,
    pub role: Option<AssignmentRole>,
    pub due_before: Option<DateTime<Utc>>,
}

impl From<ActiveAssignmentsParams> for AssignmentFilter {
    fn from(value: ActiveAssignmentsParams) -> Self {
        Self {
            article_id: value.article_id,
            assignee_id: value.assignee_id,
            role: value.role,
            due_before: value.due_before,
            ..AssignmentFilter::pending()
        }
    }
}
