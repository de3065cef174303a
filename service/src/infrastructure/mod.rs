use std::sync::Arc;
use std::time::Duration;

use editorial_common::schedule::ChannelSelection;
use tokio_util::sync::CancellationToken;

use crate::domain::assignments::AssignmentLedger;
use crate::domain::dispatch::{ChannelAdapter, DistributionDispatcher, RetryPolicy};
use crate::domain::drafts::{DraftStore, EditingSessions};
use crate::domain::repository::{EditorialRepository, SnapshotRepository};
use crate::domain::scheduler::Scheduler;
use crate::domain::workflow_engine::{WorkflowEngine, WorkflowPolicy};
use crate::domain::{AppState, Collaborators};
use crate::infrastructure::settings::Settings;

pub mod audit;
pub mod channels;
pub mod http;
pub mod identity;
pub mod memory;
pub mod persistence;
pub mod settings;

#[derive(Clone)]
pub struct AppStateImpl<R> {
    engine: WorkflowEngine<R>,
    ledger: AssignmentLedger<R>,
    scheduler: Scheduler<R>,
    drafts: DraftStore<R>,
    sessions: EditingSessions<R>,
}

impl<R> AppStateImpl<R>
where
    R: EditorialRepository + SnapshotRepository,
{
    /// Wires every editorial component on top of one repository.
    pub fn new(
        repository: R,
        collaborators: Collaborators,
        adapters: Vec<Arc<dyn ChannelAdapter>>,
        settings: &Settings,
        shutdown: CancellationToken,
    ) -> Self {
        let retry = RetryPolicy {
            attempt_timeout: Duration::from_secs(settings.dispatch.attempt_timeout_seconds),
            max_attempts: settings.dispatch.max_attempts.max(1),
            initial_backoff: Duration::from_millis(settings.dispatch.initial_backoff_millis),
        };
        let dispatcher = Arc::new(DistributionDispatcher::new(
            adapters,
            retry,
            collaborators.clock.clone(),
        ));

        let policy = WorkflowPolicy {
            review_period: settings.review.default_due_hours.map(chrono::Duration::hours),
            default_channels: ChannelSelection::enabled_only(
                settings.dispatch.default_channels.iter().copied(),
            ),
        };

        let engine = WorkflowEngine::new(repository.clone(), dispatcher, collaborators.clone(), policy);
        let ledger = AssignmentLedger::new(repository.clone(), collaborators.clone());
        let scheduler = Scheduler::new(
            repository.clone(),
            engine.clone(),
            collaborators.clone(),
            settings.scheduler.batch_size,
        );
        let drafts = DraftStore::new(repository, collaborators);
        let sessions = EditingSessions::new(
            drafts.clone(),
            Duration::from_secs(settings.drafts.autosave_interval_seconds.max(1)),
            Duration::from_secs(settings.drafts.session_idle_timeout_seconds.max(1)),
            shutdown,
        );

        Self {
            engine,
            ledger,
            scheduler,
            drafts,
            sessions,
        }
    }
}

impl<R> AppState for AppStateImpl<R>
where
    R: EditorialRepository + SnapshotRepository,
{
    type R = R;

    fn engine(&self) -> &WorkflowEngine<R> {
        &self.engine
    }

    fn ledger(&self) -> &AssignmentLedger<R> {
        &self.ledger
    }

    fn scheduler(&self) -> &Scheduler<R> {
        &self.scheduler
    }

    fn drafts(&self) -> &DraftStore<R> {
        &self.drafts
    }

    fn sessions(&self) -> &EditingSessions<R> {
        &self.sessions
    }
}
