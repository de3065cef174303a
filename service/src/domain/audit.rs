use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use editorial_common::article::ArticleStatus;
use editorial_common::assignment::{AssignmentOutcome, AssignmentRole, AssignmentStatus};
use editorial_common::publication::{ChannelResult, PublishTrigger};
use editorial_common::schedule::Channel;
use editorial_common::{ActorId, ArticleId, AssignmentId};
use serde::Serialize;

use crate::domain::workflow::WorkflowAction;

/// One line of the editorial audit trail.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub recorded_at: DateTime<Utc>,
    pub actor: ActorId,
    pub article_id: Option<ArticleId>,
    #[serde(flatten)]
    pub entry: AuditEntry,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEntry {
    ArticleCreated,
    ContentCommitted {
        version: i64,
    },
    Transition {
        action: WorkflowAction,
        from: ArticleStatus,
        to: ArticleStatus,
    },
    AssignmentCreated {
        assignment_id: AssignmentId,
        assignee: ActorId,
        role: AssignmentRole,
        superseded: Option<AssignmentId>,
    },
    AssignmentResolved {
        assignment_id: AssignmentId,
        status: AssignmentStatus,
        outcome: Option<AssignmentOutcome>,
    },
    PublishAttempt {
        trigger: PublishTrigger,
        live: bool,
        results: BTreeMap<Channel, ChannelResult>,
    },
    ChannelRetried {
        channel: Channel,
        result: ChannelResult,
    },
}

impl AuditEntry {
    /// Value stored in the `kind` column of the audit log.
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEntry::ArticleCreated => "article_created",
            AuditEntry::ContentCommitted { .. } => "content_committed",
            AuditEntry::Transition { .. } => "transition",
            AuditEntry::AssignmentCreated { .. } => "assignment_created",
            AuditEntry::AssignmentResolved { .. } => "assignment_resolved",
            AuditEntry::PublishAttempt { .. } => "publish_attempt",
            AuditEntry::ChannelRetried { .. } => "channel_retried",
        }
    }
}

/// Receives every transition, assignment change and publish attempt.
///
/// Recording must not fail the operation that produced the record,
/// so implementations deal with their own errors.
pub trait AuditSink: Send + Sync + 'static {
    fn record(&self, record: AuditRecord);
}
