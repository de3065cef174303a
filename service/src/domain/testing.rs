//! Test doubles and a ready wired set of editorial components over the in-memory store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use editorial_common::article::Article;
use editorial_common::assignment::Assignment;
use editorial_common::schedule::{Channel, ChannelSelection};
use editorial_common::test_utils::{actor, content, epoch};
use editorial_common::ArticleId;
use futures::future::BoxFuture;

use crate::domain::Collaborators;
use crate::domain::assignments::AssignmentLedger;
use crate::domain::audit::{AuditRecord, AuditSink};
use crate::domain::clock::Clock;
use crate::domain::dispatch::{
    ChannelAdapter, ChannelError, ChannelPayload, DistributionDispatcher, RetryPolicy,
};
use crate::domain::drafts::DraftStore;
use crate::domain::identity::Actor;
use crate::domain::repository::query::AssignmentFilter;
use crate::domain::scheduler::Scheduler;
use crate::domain::workflow_engine::{ReviewerRequest, WorkflowEngine, WorkflowPolicy};
use crate::infrastructure::identity::RolePermissions;
use crate::infrastructure::memory::InMemoryRepository;

pub fn author() -> Actor {
    Actor::new(actor("author"), ["author"])
}

pub fn editor() -> Actor {
    Actor::new(actor("editor"), ["editor"])
}

pub fn reviewer() -> Actor {
    Actor::new(actor("reviewer"), ["reviewer"])
}

pub fn intruder() -> Actor {
    Actor::new(actor("intruder"), ["reader"])
}

/// Clock that only moves when told to.
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Mutex::new(at))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock().unwrap() = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
pub struct RecordingAudit(Mutex<Vec<AuditRecord>>);

impl RecordingAudit {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.0.lock().unwrap().clone()
    }

    pub fn kinds_for(&self, article_id: ArticleId) -> Vec<&'static str> {
        self.records()
            .iter()
            .filter(|record| record.article_id == Some(article_id))
            .map(|record| record.entry.kind())
            .collect()
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, record: AuditRecord) {
        self.0.lock().unwrap().push(record);
    }
}

/// Channel adapter counting its calls, optionally failing or slow.
pub struct RecordingChannel {
    channel: Channel,
    calls: AtomicU32,
    failures_left: AtomicU32,
    delay: Option<Duration>,
    payloads: Mutex<Vec<ChannelPayload>>,
}

impl RecordingChannel {
    fn build(channel: Channel, failures: u32, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            channel,
            calls: AtomicU32::new(0),
            failures_left: AtomicU32::new(failures),
            delay,
            payloads: Mutex::new(vec![]),
        })
    }

    pub fn new(channel: Channel) -> Arc<Self> {
        Self::build(channel, 0, None)
    }

    pub fn failing(channel: Channel) -> Arc<Self> {
        Self::build(channel, u32::MAX, None)
    }

    pub fn failing_times(channel: Channel, failures: u32) -> Arc<Self> {
        Self::build(channel, failures, None)
    }

    pub fn slow(channel: Channel, delay: Duration) -> Arc<Self> {
        Self::build(channel, 0, Some(delay))
    }

    pub fn recover(&self) {
        self.failures_left.store(0, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn delivered_articles(&self) -> Vec<ArticleId> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .map(|payload| payload.article_id)
            .collect()
    }
}

impl ChannelAdapter for RecordingChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn publish<'a>(&'a self, payload: &'a ChannelPayload) -> BoxFuture<'a, Result<(), ChannelError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failing {
                return Err(ChannelError::Rejected("simulated outage".to_string()));
            }

            self.payloads.lock().unwrap().push(payload.clone());
            Ok(())
        })
    }
}

/// Every editorial component wired over one in-memory store and a manual clock.
pub struct Fixture {
    pub repository: InMemoryRepository,
    pub clock: Arc<ManualClock>,
    pub audit: Arc<RecordingAudit>,
    pub collaborators: Collaborators,
    pub site: Arc<RecordingChannel>,
    pub social: Arc<RecordingChannel>,
    pub engine: WorkflowEngine<InMemoryRepository>,
    pub ledger: AssignmentLedger<InMemoryRepository>,
    pub scheduler: Scheduler<InMemoryRepository>,
    pub drafts: DraftStore<InMemoryRepository>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_channels(
            RecordingChannel::new(Channel::Site),
            RecordingChannel::new(Channel::Social),
        )
    }

    pub fn with_channels(site: Arc<RecordingChannel>, social: Arc<RecordingChannel>) -> Self {
        let repository = InMemoryRepository::new();
        let clock = Arc::new(ManualClock::new(epoch()));
        let audit = Arc::new(RecordingAudit::default());

        let roles = HashMap::from([
            (
                "author".to_string(),
                vec!["create_article".to_string(), "commit_content".to_string(), "submit_for_review".to_string()],
            ),
            (
                "reviewer".to_string(),
                vec!["approve".to_string(), "request_revision".to_string(), "complete_assignment".to_string()],
            ),
            ("editor".to_string(), vec!["*".to_string()]),
        ]);
        let permissions = RolePermissions::from_roles(&roles).unwrap();
        let collaborators = Collaborators::new(Arc::new(permissions), audit.clone(), clock.clone());

        let policy = RetryPolicy {
            attempt_timeout: Duration::from_secs(5),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        };
        let adapters: Vec<Arc<dyn ChannelAdapter>> = vec![site.clone() as Arc<dyn ChannelAdapter>, social.clone()];
        let dispatcher = Arc::new(DistributionDispatcher::new(adapters, policy, clock.clone()));

        let engine = WorkflowEngine::new(
            repository.clone(),
            dispatcher,
            collaborators.clone(),
            WorkflowPolicy {
                review_period: Some(chrono::Duration::days(2)),
                default_channels: ChannelSelection::enabled_only([Channel::Site]),
            },
        );
        let ledger = AssignmentLedger::new(repository.clone(), collaborators.clone());
        let scheduler = Scheduler::new(repository.clone(), engine.clone(), collaborators.clone(), 50);
        let drafts = DraftStore::new(repository.clone(), collaborators.clone());

        Self {
            repository,
            clock,
            audit,
            collaborators,
            site,
            social,
            engine,
            ledger,
            scheduler,
            drafts,
        }
    }

    pub async fn draft(&self, title: &str) -> Article {
        self.drafts.create(&author(), content(title)).await.unwrap()
    }

    /// A draft submitted with an explicit reviewer.
    pub async fn in_review(&self, title: &str) -> Article {
        let draft = self.draft(title).await;
        let request = ReviewerRequest {
            assignee_id: reviewer().id,
            due_at: None,
            instructions: None,
        };
        self.engine
            .submit_for_review(&author(), draft.id, Some(request))
            .await
            .unwrap()
    }

    pub async fn approved(&self, title: &str) -> Article {
        let article = self.in_review(title).await;
        self.engine.approve(&reviewer(), article.id).await.unwrap()
    }

    pub async fn pending_for(&self, article_id: ArticleId) -> Vec<Assignment> {
        self.ledger
            .list_active(AssignmentFilter {
                article_id: Some(article_id),
                ..Default::default()
            })
            .await
            .unwrap()
    }
}
