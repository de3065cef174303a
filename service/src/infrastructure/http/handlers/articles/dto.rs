use chrono::{DateTime, Utc};
use editorial_common::ActorId;
use editorial_common::article::{Article, ArticleStatus};
use editorial_common::publication::PublishEvent;
use editorial_common::schedule::{ChannelSelection, Priority};
use serde::{Deserialize, Serialize};

use crate::domain::workflow::{WorkflowAction, available_actions};
use crate::domain::workflow_engine::{Publication, ReviewerRequest, ScheduleRequest};

/// Article together with what can be done with it next.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    #[serde(flatten)]
    article: Article,
    available_actions: Vec<WorkflowAction>,
}

impl From<Article> for ArticleResponse {
    fn from(article: Article) -> Self {
        let available_actions = available_actions(article.status());
        Self {
            article,
            available_actions,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationResponse {
    article: ArticleResponse,
    live: bool,
    event: PublishEvent,
}

impl From<Publication> for PublicationResponse {
    fn from(value: Publication) -> Self {
        Self {
            article: value.article.into(),
            live: value.event.is_live(),
            event: value.event,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishEventResponse {
    live: bool,
    #[serde(flatten)]
    event: PublishEvent,
}

impl From<PublishEvent> for PublishEventResponse {
    fn from(event: PublishEvent) -> Self {
        Self {
            live: event.is_live(),
            event,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListArticlesParams {
    pub status: Option<Vec<ArticleStatus>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequestBody {
    #[serde(default)]
    pub reviewer: Option<ReviewerBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerBody {
    pub assignee_id: ActorId,
    pub due_at: Option<DateTime<Utc>>,
    pub instructions: Option<String>,
}

impl From<ReviewerBody> for ReviewerRequest {
    fn from(value: ReviewerBody) -> Self {
        Self {
            assignee_id: value.assignee_id,
            due_at: value.due_at,
            instructions: value.instructions,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RevisionRequestBody {
    pub note: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequestBody {
    pub publish_at: DateTime<Utc>,
    pub channels: Option<ChannelSelection>,
    #[serde(default)]
    pub priority: Priority,
    pub notes: Option<String>,
}

impl From<ScheduleRequestBody> for ScheduleRequest {
    fn from(value: ScheduleRequestBody) -> Self {
        Self {
            publish_at: value.publish_at,
            channels: value.channels,
            priority: value.priority,
            notes: value.notes,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PublishRequestBody {
    #[serde(default)]
    pub channels: Option<ChannelSelection>,
}
