use std::sync::Arc;

use editorial_common::ArticleId;

use crate::domain::assignments::AssignmentLedger;
use crate::domain::audit::{AuditEntry, AuditRecord, AuditSink};
use crate::domain::clock::Clock;
use crate::domain::drafts::{DraftStore, EditingSessions};
use crate::domain::error::EditorialError;
use crate::domain::identity::{Actor, EditorialAction, Permissions};
use crate::domain::repository::{EditorialRepository, SnapshotRepository};
use crate::domain::scheduler::Scheduler;
use crate::domain::workflow_engine::WorkflowEngine;

pub mod assignments;
pub mod audit;
pub mod clock;
pub mod dispatch;
pub mod drafts;
pub mod error;
pub mod identity;
pub mod repository;
pub mod scheduler;
pub mod workflow;
pub mod workflow_engine;

#[cfg(test)]
pub mod testing;
#[cfg(test)]
mod scenarios;

/// The global application state shared between all request handlers.
pub trait AppState: Clone + Send + Sync + 'static {
    type R: EditorialRepository + SnapshotRepository;
    fn engine(&self) -> &WorkflowEngine<Self::R>;
    fn ledger(&self) -> &AssignmentLedger<Self::R>;
    fn scheduler(&self) -> &Scheduler<Self::R>;
    fn drafts(&self) -> &DraftStore<Self::R>;
    fn sessions(&self) -> &EditingSessions<Self::R>;
}

/// Collaborators every editorial component talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub permissions: Arc<dyn Permissions>,
    pub audit: Arc<dyn AuditSink>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    pub fn new(
        permissions: Arc<dyn Permissions>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            permissions,
            audit,
            clock,
        }
    }

    /// Ask the permission policy, turning a refusal into [`EditorialError::Forbidden`].
    pub async fn authorize(
        &self,
        actor: &Actor,
        action: EditorialAction,
        article_id: Option<ArticleId>,
    ) -> Result<(), EditorialError> {
        if self.permissions.can_perform(actor, action, article_id).await {
            return Ok(());
        }

        tracing::warn!(actor = %actor.id, %action, article_id = ?article_id, "permission denied");
        Err(EditorialError::Forbidden {
            actor: actor.id.clone(),
            action,
        })
    }

    pub fn audit(&self, actor: &Actor, article_id: Option<ArticleId>, entry: AuditEntry) {
        self.audit.record(AuditRecord {
            recorded_at: self.clock.now(),
            actor: actor.id.clone(),
            article_id,
            entry,
        });
    }
}
