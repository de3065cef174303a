use std::sync::Arc;

use chrono::{DateTime, Utc};
use editorial_common::article::{Article, ArticleState, ArticleStatus, RevisionNote};
use editorial_common::assignment::{AssignmentOutcome, AssignmentRole, NewAssignment};
use editorial_common::publication::{DeliveryStatus, PublishEvent, PublishTrigger};
use editorial_common::schedule::{Channel, ChannelSelection, Priority, ScheduleEntry};
use editorial_common::{ActorId, ArticleId};
use serde::Serialize;

use crate::domain::Collaborators;
use crate::domain::audit::AuditEntry;
use crate::domain::dispatch::{ChannelPayload, DistributionDispatcher};
use crate::domain::error::EditorialError;
use crate::domain::identity::{Actor, EditorialAction};
use crate::domain::repository::query::ArticleFilter;
use crate::domain::repository::transition::{
    AssignmentEffect, ScheduleEffect, TransitionOutcome, TransitionPlan,
};
use crate::domain::repository::{EditorialRepository, RepositoryError};
use crate::domain::workflow::WorkflowAction;

/// Scheduler promotion only ever publishes what is still scheduled.
const SCHEDULED_ONLY: &[ArticleStatus] = &[ArticleStatus::Scheduled];

#[derive(Debug, Clone)]
pub struct WorkflowPolicy {
    /// Due date given to reviewer assignments created without an explicit one
    pub review_period: Option<chrono::Duration>,
    /// Channels used when a publication does not name any
    pub default_channels: ChannelSelection,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self {
            review_period: Some(chrono::Duration::days(2)),
            default_channels: ChannelSelection::enabled_only([Channel::Site]),
        }
    }
}

/// Explicit reviewer choice on submit for review.
#[derive(Debug, Clone)]
pub struct ReviewerRequest {
    pub assignee_id: ActorId,
    pub due_at: Option<DateTime<Utc>>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub publish_at: DateTime<Utc>,
    /// Falls back to the configured default channels
    pub channels: Option<ChannelSelection>,
    pub priority: Priority,
    pub notes: Option<String>,
}

/// A published article with the outcome of its distribution.
#[derive(Debug, Clone, Serialize)]
pub struct Publication {
    pub article: Article,
    pub event: PublishEvent,
}

/// Owns the article status machine. Every status change goes through here.
#[derive(Clone)]
pub struct WorkflowEngine<R> {
    repository: R,
    dispatcher: Arc<DistributionDispatcher>,
    collaborators: Collaborators,
    policy: WorkflowPolicy,
}

impl<R: EditorialRepository> WorkflowEngine<R> {
    pub fn new(
        repository: R,
        dispatcher: Arc<DistributionDispatcher>,
        collaborators: Collaborators,
        policy: WorkflowPolicy,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            collaborators,
            policy,
        }
    }

    pub async fn get_article(&self, id: ArticleId) -> Result<Article, EditorialError> {
        self.repository
            .find_article(id)
            .await?
            .ok_or_else(|| EditorialError::article_not_found(id))
    }

    pub async fn list_articles(&self, filter: ArticleFilter) -> Result<Vec<Article>, EditorialError> {
        Ok(self.repository.list_articles(filter).await?)
    }

    pub async fn schedule_entry(&self, id: ArticleId) -> Result<Option<ScheduleEntry>, EditorialError> {
        self.get_article(id).await?;
        Ok(self.repository.find_schedule_entry(id).await?)
    }

    /// Distribution state of a published article; `None` until it has been published.
    pub async fn publication_status(&self, id: ArticleId) -> Result<Option<PublishEvent>, EditorialError> {
        self.get_article(id).await?;
        Ok(self.repository.find_publish_event(id).await?)
    }

    #[tracing::instrument(skip_all, fields(actor = %actor.id, article_id = %id))]
    pub async fn submit_for_review(
        &self,
        actor: &Actor,
        id: ArticleId,
        reviewer: Option<ReviewerRequest>,
    ) -> Result<Article, EditorialError> {
        let action = WorkflowAction::SubmitForReview;
        self.authorize(actor, action, id).await?;

        let at = self.collaborators.clock.now();
        let default_due = self.policy.review_period.map(|period| at + period);
        let assignments = match reviewer {
            Some(request) => AssignmentEffect::Assign(NewAssignment {
                article_id: id,
                assignee_id: request.assignee_id,
                role: AssignmentRole::Reviewer,
                due_at: request.due_at.or(default_due),
                instructions: non_blank(request.instructions),
                assigned_by: actor.id.clone(),
                created_at: at,
            }),
            None => AssignmentEffect::RefreshOrReassign {
                role: AssignmentRole::Reviewer,
                due_at: default_due,
            },
        };

        self.transition(actor, action, id, ArticleState::InReview, ScheduleEffect::Keep, assignments, at)
            .await
    }

    #[tracing::instrument(skip_all, fields(actor = %actor.id, article_id = %id))]
    pub async fn approve(&self, actor: &Actor, id: ArticleId) -> Result<Article, EditorialError> {
        let action = WorkflowAction::Approve;
        self.authorize(actor, action, id).await?;

        let assignments = AssignmentEffect::CompletePending {
            role: AssignmentRole::Reviewer,
            outcome: AssignmentOutcome::Approved,
        };
        let at = self.collaborators.clock.now();
        self.transition(actor, action, id, ArticleState::Approved, ScheduleEffect::Keep, assignments, at)
            .await
    }

    #[tracing::instrument(skip_all, fields(actor = %actor.id, article_id = %id))]
    pub async fn request_revision(
        &self,
        actor: &Actor,
        id: ArticleId,
        note: &str,
    ) -> Result<Article, EditorialError> {
        let action = WorkflowAction::RequestRevision;
        self.authorize(actor, action, id).await?;

        let revision_note = RevisionNote::try_new(note)
            .map_err(|err| EditorialError::Validation(format!("revision note: {err}")))?;
        let assignments = AssignmentEffect::CompletePending {
            role: AssignmentRole::Reviewer,
            outcome: AssignmentOutcome::RevisionRequested,
        };
        let next = ArticleState::NeedsRevision { revision_note };
        let at = self.collaborators.clock.now();
        self.transition(actor, action, id, next, ScheduleEffect::Keep, assignments, at)
            .await
    }

    #[tracing::instrument(skip_all, fields(actor = %actor.id, article_id = %id, publish_at = %request.publish_at))]
    pub async fn schedule(
        &self,
        actor: &Actor,
        id: ArticleId,
        request: ScheduleRequest,
    ) -> Result<Article, EditorialError> {
        let action = WorkflowAction::Schedule;
        self.authorize(actor, action, id).await?;

        let at = self.collaborators.clock.now();
        if request.publish_at <= at {
            return Err(EditorialError::Validation(format!(
                "publish time {} is not in the future",
                request.publish_at
            )));
        }
        let channels = request
            .channels
            .unwrap_or_else(|| self.policy.default_channels.clone());
        validate_channels(&channels)?;

        let entry = ScheduleEntry {
            article_id: id,
            publish_at: request.publish_at,
            channels,
            priority: request.priority,
            notes: non_blank(request.notes),
            created_by: actor.id.clone(),
            created_at: at,
        };
        let next = ArticleState::Scheduled {
            publish_at: request.publish_at,
        };
        self.transition(actor, action, id, next, ScheduleEffect::Create(entry), AssignmentEffect::Keep, at)
            .await
    }

    #[tracing::instrument(skip_all, fields(actor = %actor.id, article_id = %id))]
    pub async fn cancel_schedule(&self, actor: &Actor, id: ArticleId) -> Result<Article, EditorialError> {
        let action = WorkflowAction::CancelSchedule;
        self.authorize(actor, action, id).await?;

        let at = self.collaborators.clock.now();
        self.transition(actor, action, id, ArticleState::Approved, ScheduleEffect::Remove, AssignmentEffect::Keep, at)
            .await
    }

    #[tracing::instrument(skip_all, fields(actor = %actor.id, article_id = %id))]
    pub async fn archive(&self, actor: &Actor, id: ArticleId) -> Result<Article, EditorialError> {
        let action = WorkflowAction::Archive;
        self.authorize(actor, action, id).await?;

        let at = self.collaborators.clock.now();
        self.transition(
            actor,
            action,
            id,
            ArticleState::Archived,
            ScheduleEffect::Remove,
            AssignmentEffect::WithdrawPending,
            at,
        )
        .await
    }

    /// Publish immediately and distribute before returning.
    ///
    /// Losing the race against a concurrent scheduler tick surfaces as an invalid
    /// transition from `published`; the article is published exactly once either way.
    #[tracing::instrument(skip_all, fields(actor = %actor.id, article_id = %id))]
    pub async fn publish_now(
        &self,
        actor: &Actor,
        id: ArticleId,
        channels: Option<ChannelSelection>,
    ) -> Result<Publication, EditorialError> {
        let action = WorkflowAction::PublishNow;
        self.authorize(actor, action, id).await?;

        if let Some(channels) = &channels {
            validate_channels(channels)?;
        }

        let trigger = PublishTrigger::Manual {
            actor: actor.id.clone(),
        };
        match self.execute_publish(id, trigger, channels).await? {
            Some(publication) => Ok(publication),
            None => {
                let article = self.get_article(id).await?;
                Err(EditorialError::InvalidTransition {
                    from: article.status(),
                    action,
                })
            }
        }
    }

    /// The one path to `published`, shared by manual publication and scheduler promotion.
    ///
    /// Flips the status with a compare-and-swap and dispatches only when the swap wins.
    /// Returns `None` when the article is no longer eligible, which is not an error.
    pub async fn execute_publish(
        &self,
        id: ArticleId,
        trigger: PublishTrigger,
        channels: Option<ChannelSelection>,
    ) -> Result<Option<Publication>, EditorialError> {
        let at = self.collaborators.clock.now();
        let (allowed_from, required_schedule, actor) = match &trigger {
            PublishTrigger::Manual { actor } => (
                WorkflowAction::PublishNow.allowed_from(),
                None,
                Actor::new(actor.clone(), Vec::<String>::new()),
            ),
            PublishTrigger::Schedule { publish_at } => (SCHEDULED_ONLY, Some(*publish_at), Actor::system()),
        };

        let plan = TransitionPlan {
            article_id: id,
            allowed_from,
            next: ArticleState::Published { published_at: at },
            required_schedule,
            schedule: ScheduleEffect::Remove,
            assignments: AssignmentEffect::Keep,
            actor: actor.id.clone(),
            at,
        };

        let outcome = match self.repository.apply_transition(plan).await {
            Ok(outcome) => outcome,
            Err(RepositoryError::StatusMismatch(current)) => {
                tracing::info!(article_id = %id, %current, "article is no longer eligible, publish skipped");
                return Ok(None);
            }
            Err(RepositoryError::NotFound) => return Err(EditorialError::article_not_found(id)),
            Err(err) => return Err(err.into()),
        };
        self.record_transition(&actor, WorkflowAction::PublishNow, &outcome);

        let channels = channels
            .or_else(|| outcome.removed_schedule.as_ref().map(|entry| entry.channels.clone()))
            .unwrap_or_else(|| self.policy.default_channels.clone());
        let event = self.dispatcher.dispatch(&outcome.article, &channels, trigger).await;

        // the publication stands even if its record cannot be written
        if let Err(err) = self.repository.save_publish_event(event.clone()).await {
            tracing::error!(article_id = %id, error = ?err, "failed to store publish event");
        }
        self.collaborators.audit(
            &actor,
            Some(id),
            AuditEntry::PublishAttempt {
                trigger: event.trigger.clone(),
                live: event.is_live(),
                results: event.results.clone(),
            },
        );

        if event.is_live() {
            tracing::info!(article_id = %id, "article published");
        } else {
            tracing::warn!(article_id = %id, "article published but the site channel did not deliver");
        }

        Ok(Some(Publication {
            article: outcome.article,
            event,
        }))
    }

    /// Re-attempt one failed channel of the recorded publication.
    #[tracing::instrument(skip_all, fields(actor = %actor.id, article_id = %id, %channel))]
    pub async fn retry_channel(
        &self,
        actor: &Actor,
        id: ArticleId,
        channel: Channel,
    ) -> Result<PublishEvent, EditorialError> {
        self.collaborators
            .authorize(actor, EditorialAction::RetryChannel, Some(id))
            .await?;

        let article = self.get_article(id).await?;
        let mut event = self
            .repository
            .find_publish_event(id)
            .await?
            .ok_or_else(|| EditorialError::NotFound(format!("publication of article {id}")))?;

        match event.results.get(&channel).map(|result| result.status) {
            Some(DeliveryStatus::Failed) => {}
            Some(DeliveryStatus::Delivered) => {
                return Err(EditorialError::Conflict(format!("channel {channel} already delivered")));
            }
            Some(DeliveryStatus::Skipped) => {
                return Err(EditorialError::Conflict(format!(
                    "channel {channel} has no adapter configured"
                )));
            }
            None => {
                return Err(EditorialError::Validation(format!(
                    "channel {channel} was not part of the publication"
                )));
            }
        }

        let payload = ChannelPayload::for_article(&article, event.triggered_at);
        let result = self.dispatcher.deliver(channel, &payload).await;
        event.results.insert(channel, result.clone());
        self.repository.save_publish_event(event.clone()).await?;
        self.collaborators.audit(
            actor,
            Some(id),
            AuditEntry::ChannelRetried {
                channel,
                result: result.clone(),
            },
        );

        if result.status == DeliveryStatus::Failed {
            return Err(EditorialError::ChannelDispatch {
                channel,
                message: result.error.unwrap_or_default(),
            });
        }
        Ok(event)
    }

    async fn authorize(
        &self,
        actor: &Actor,
        action: WorkflowAction,
        id: ArticleId,
    ) -> Result<(), EditorialError> {
        self.collaborators
            .authorize(actor, action.into(), Some(id))
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn transition(
        &self,
        actor: &Actor,
        action: WorkflowAction,
        id: ArticleId,
        next: ArticleState,
        schedule: ScheduleEffect,
        assignments: AssignmentEffect,
        at: DateTime<Utc>,
    ) -> Result<Article, EditorialError> {
        debug_assert_eq!(next.status(), action.target(), "{action} leads to another status");
        let plan = TransitionPlan {
            article_id: id,
            allowed_from: action.allowed_from(),
            next,
            required_schedule: None,
            schedule,
            assignments,
            actor: actor.id.clone(),
            at,
        };

        let outcome = self
            .repository
            .apply_transition(plan)
            .await
            .map_err(|err| match err {
                RepositoryError::StatusMismatch(from) => EditorialError::InvalidTransition { from, action },
                RepositoryError::NotFound => EditorialError::article_not_found(id),
                other => other.into(),
            })?;

        self.record_transition(actor, action, &outcome);
        Ok(outcome.article)
    }

    fn record_transition(&self, actor: &Actor, action: WorkflowAction, outcome: &TransitionOutcome) {
        let article_id = outcome.article.id;
        let to = outcome.article.status();
        tracing::info!(%article_id, %action, from = %outcome.previous, %to, "article transitioned");

        self.collaborators.audit(
            actor,
            Some(article_id),
            AuditEntry::Transition {
                action,
                from: outcome.previous,
                to,
            },
        );

        for assignment in &outcome.assignments {
            let entry = if assignment.is_pending() {
                AuditEntry::AssignmentCreated {
                    assignment_id: assignment.id,
                    assignee: assignment.assignee_id.clone(),
                    role: assignment.role,
                    superseded: None,
                }
            } else {
                AuditEntry::AssignmentResolved {
                    assignment_id: assignment.id,
                    status: assignment.status,
                    outcome: assignment.outcome,
                }
            };
            self.collaborators.audit(actor, Some(article_id), entry);
        }
    }
}

/// The site channel decides whether an article is live, so it cannot be left out.
fn validate_channels(channels: &ChannelSelection) -> Result<(), EditorialError> {
    if channels.is_enabled(Channel::Site) {
        Ok(())
    } else {
        Err(EditorialError::Validation(
            "the site channel must be enabled".to_string(),
        ))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
