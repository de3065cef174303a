use std::time::Duration;

use chrono::{DateTime, Utc};
use editorial_common::ArticleId;
use editorial_common::publication::PublishTrigger;
use editorial_common::schedule::{DueWindow, ScheduleEntry};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::domain::Collaborators;
use crate::domain::error::EditorialError;
use crate::domain::identity::{Actor, EditorialAction};
use crate::domain::repository::EditorialRepository;
use crate::domain::workflow_engine::WorkflowEngine;

/// What one scheduler pass did.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub checked_at: Option<DateTime<Utc>>,
    pub due: usize,
    pub published: Vec<ArticleId>,
    /// Entries whose article moved on before the tick reached them
    pub skipped: Vec<ArticleId>,
    pub failed: Vec<TickFailure>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickFailure {
    pub article_id: ArticleId,
    pub error: String,
}

/// Promotes due schedule entries to published.
#[derive(Clone)]
pub struct Scheduler<R> {
    repository: R,
    engine: WorkflowEngine<R>,
    collaborators: Collaborators,
    batch_size: usize,
}

impl<R: EditorialRepository> Scheduler<R> {
    pub fn new(repository: R, engine: WorkflowEngine<R>, collaborators: Collaborators, batch_size: usize) -> Self {
        Self {
            repository,
            engine,
            collaborators,
            batch_size: batch_size.max(1),
        }
    }

    /// Entries due inside the window, earliest first and high priority first on ties.
    pub async fn list_due(&self, window: DueWindow) -> Result<Vec<ScheduleEntry>, EditorialError> {
        Ok(self.repository.due_entries(window, usize::MAX).await?)
    }

    pub async fn tick(&self) -> Result<TickReport, EditorialError> {
        self.tick_at(self.collaborators.clock.now()).await
    }

    /// A pass requested by someone instead of the background loop.
    pub async fn tick_on_behalf(&self, actor: &Actor) -> Result<TickReport, EditorialError> {
        self.collaborators
            .authorize(actor, EditorialAction::RunScheduler, None)
            .await?;
        tracing::info!(actor = %actor.id, "manual scheduler tick");
        self.tick().await
    }

    /// Publish everything due at `now`, however overdue, up to one batch.
    ///
    /// A failing entry is logged and does not stop the others.
    #[tracing::instrument(skip(self))]
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickReport, EditorialError> {
        let entries = self
            .repository
            .due_entries(DueWindow::up_to(now), self.batch_size)
            .await?;

        let mut report = TickReport {
            checked_at: Some(now),
            due: entries.len(),
            ..TickReport::default()
        };

        for entry in entries {
            let trigger = PublishTrigger::Schedule {
                publish_at: entry.publish_at,
            };
            match self.engine.execute_publish(entry.article_id, trigger, None).await {
                Ok(Some(_)) => report.published.push(entry.article_id),
                Ok(None) => report.skipped.push(entry.article_id),
                Err(err) => {
                    tracing::error!(article_id = %entry.article_id, error = %err, "scheduled publication failed");
                    report.failed.push(TickFailure {
                        article_id: entry.article_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        if report.due > 0 {
            tracing::info!(
                due = report.due,
                published = report.published.len(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                "scheduler tick finished"
            );
        }
        Ok(report)
    }

    /// Tick on a fixed interval until `cancel` is triggered.
    pub async fn run(self, every: Duration, cancel: CancellationToken) {
        tracing::info!(interval_secs = every.as_secs(), batch_size = self.batch_size, "scheduler started");

        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("scheduler stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = self.tick().await {
                        tracing::error!(error = %err, "scheduler tick failed");
                    }
                }
            }
        }
    }
}
