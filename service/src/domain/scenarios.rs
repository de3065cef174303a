//! End-to-end editorial flows across the workflow engine, ledger, scheduler and dispatcher.

use chrono::Duration;
use editorial_common::ArticleId;
use editorial_common::article::{Article, ArticleStatus};
use editorial_common::assignment::{AssignmentOutcome, AssignmentRole, AssignmentStatus};
use editorial_common::publication::{DeliveryStatus, PublishTrigger};
use editorial_common::schedule::{Channel, Priority};
use editorial_common::test_utils::site_and;

use crate::domain::clock::Clock;
use crate::domain::error::EditorialError;
use crate::domain::repository::EditorialRepository;
use crate::domain::repository::query::AssignmentFilter;
use crate::domain::testing::{Fixture, RecordingChannel, editor, reviewer};
use crate::domain::workflow::WorkflowAction;
use crate::domain::workflow_engine::ScheduleRequest;

fn in_one_hour(fixture: &Fixture) -> ScheduleRequest {
    ScheduleRequest {
        publish_at: fixture.clock.now() + Duration::hours(1),
        channels: Some(site_and(&[Channel::Social])),
        priority: Priority::High,
        notes: None,
    }
}

fn published_transitions(fixture: &Fixture, id: ArticleId) -> usize {
    fixture
        .audit
        .records()
        .iter()
        .filter(|record| record.article_id == Some(id))
        .filter(|record| {
            matches!(
                record.entry,
                crate::domain::audit::AuditEntry::Transition { to: ArticleStatus::Published, .. }
            )
        })
        .count()
}

#[tokio::test]
async fn scheduled_article_is_published_by_the_tick() {
    let fixture = Fixture::new();
    let article = fixture.approved("Letters From Lisbon").await;
    fixture.engine.schedule(&editor(), article.id, in_one_hour(&fixture)).await.unwrap();

    fixture.clock.advance(Duration::hours(1));
    let report = fixture.scheduler.tick().await.unwrap();

    assert_eq!(report.published, vec![article.id]);
    let published = fixture.engine.get_article(article.id).await.unwrap();
    assert_eq!(published.status(), ArticleStatus::Published);
    assert_eq!(published.publish_at(), None);

    let event = fixture.engine.publication_status(article.id).await.unwrap().unwrap();
    assert_eq!(event.trigger, PublishTrigger::Schedule { publish_at: fixture.clock.now() });
    assert_eq!(event.results[&Channel::Site].status, DeliveryStatus::Delivered);
    assert_eq!(event.results[&Channel::Social].status, DeliveryStatus::Delivered);
}

#[tokio::test(start_paused = true)]
async fn failed_social_channel_is_recorded_without_unpublishing() {
    let fixture = Fixture::with_channels(
        RecordingChannel::new(Channel::Site),
        RecordingChannel::failing(Channel::Social),
    );
    let article = fixture.approved("Letters From Lisbon").await;
    fixture.engine.schedule(&editor(), article.id, in_one_hour(&fixture)).await.unwrap();

    fixture.clock.advance(Duration::hours(1));
    fixture.scheduler.tick().await.unwrap();

    assert_eq!(fixture.engine.get_article(article.id).await.unwrap().status(), ArticleStatus::Published);
    let event = fixture.engine.publication_status(article.id).await.unwrap().unwrap();
    assert!(event.is_live());
    assert_eq!(event.results[&Channel::Social].status, DeliveryStatus::Failed);
}

#[tokio::test]
async fn revision_round_trip_returns_to_review() {
    let fixture = Fixture::new();
    let article = fixture.in_review("Letters From Lisbon").await;

    let revised = fixture.engine.request_revision(&reviewer(), article.id, "fix intro").await.unwrap();
    assert_eq!(revised.status(), ArticleStatus::NeedsRevision);
    assert_eq!(revised.state.revision_note().map(|note| note.to_string()), Some("fix intro".to_string()));

    let history = fixture
        .ledger
        .list(AssignmentFilter { article_id: Some(article.id), role: Some(AssignmentRole::Reviewer), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, AssignmentStatus::Completed);
    assert_eq!(history[0].outcome, Some(AssignmentOutcome::RevisionRequested));

    let resubmitted = fixture.engine.submit_for_review(&editor(), article.id, None).await.unwrap();
    assert_eq!(resubmitted.status(), ArticleStatus::InReview);
    assert!(resubmitted.state.revision_note().is_none());

    // the previous reviewer is put back on the article
    let pending = fixture.pending_for(article.id).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].assignee_id, reviewer().id);
}

#[tokio::test]
async fn scheduling_a_draft_is_an_invalid_transition() {
    let fixture = Fixture::new();
    let draft = fixture.draft("Letters From Lisbon").await;

    let err = fixture.engine.schedule(&editor(), draft.id, in_one_hour(&fixture)).await.unwrap_err();

    assert!(matches!(
        err,
        EditorialError::InvalidTransition { from: ArticleStatus::Draft, action: WorkflowAction::Schedule }
    ));
    assert_eq!(fixture.engine.get_article(draft.id).await.unwrap().status(), ArticleStatus::Draft);
    assert!(fixture.engine.schedule_entry(draft.id).await.unwrap().is_none());
}

#[tokio::test]
async fn late_second_tick_does_not_publish_again() {
    let fixture = Fixture::new();
    let article = fixture.approved("Letters From Lisbon").await;
    fixture.engine.schedule(&editor(), article.id, in_one_hour(&fixture)).await.unwrap();
    fixture.clock.advance(Duration::hours(3));

    let first = fixture.scheduler.tick().await.unwrap();
    let second = fixture.scheduler.tick().await.unwrap();

    assert_eq!(first.published, vec![article.id]);
    assert!(second.published.is_empty());
    assert_eq!(fixture.site.calls(), 1);
    assert_eq!(published_transitions(&fixture, article.id), 1);
}

#[tokio::test]
async fn stale_due_entry_is_skipped() {
    let fixture = Fixture::new();
    let article = fixture.approved("Letters From Lisbon").await;
    let first = in_one_hour(&fixture);
    let stale_publish_at = first.publish_at;
    fixture.engine.schedule(&editor(), article.id, first).await.unwrap();

    // a tick read the entry, then the editor moved the publication to a later time
    fixture.engine.cancel_schedule(&editor(), article.id).await.unwrap();
    let mut later = in_one_hour(&fixture);
    later.publish_at += Duration::hours(5);
    fixture.engine.schedule(&editor(), article.id, later).await.unwrap();

    fixture.clock.advance(Duration::hours(1));
    let trigger = PublishTrigger::Schedule { publish_at: stale_publish_at };
    let outcome = fixture.engine.execute_publish(article.id, trigger, None).await.unwrap();

    assert!(outcome.is_none());
    assert_eq!(fixture.engine.get_article(article.id).await.unwrap().status(), ArticleStatus::Scheduled);
    assert_eq!(fixture.site.calls(), 0);
}

#[tokio::test]
async fn cancelled_schedule_is_never_published() {
    let fixture = Fixture::new();
    let article = fixture.approved("Letters From Lisbon").await;
    fixture.engine.schedule(&editor(), article.id, in_one_hour(&fixture)).await.unwrap();
    fixture.engine.cancel_schedule(&editor(), article.id).await.unwrap();

    fixture.clock.advance(Duration::days(1));
    let report = fixture.scheduler.tick().await.unwrap();

    assert_eq!(report.due, 0);
    assert_eq!(fixture.engine.get_article(article.id).await.unwrap().status(), ArticleStatus::Approved);
    assert_eq!(fixture.site.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_publish_now_and_tick_publish_exactly_once() {
    let fixture = Fixture::new();

    for round in 0..20 {
        let article = fixture.approved(&format!("Race {round}")).await;
        let mut request = in_one_hour(&fixture);
        request.channels = Some(site_and(&[]));
        fixture.engine.schedule(&editor(), article.id, request).await.unwrap();
        fixture.clock.advance(Duration::hours(1));

        let engine = fixture.engine.clone();
        let scheduler = fixture.scheduler.clone();
        let id = article.id;
        let manual = tokio::spawn(async move { engine.publish_now(&editor(), id, None).await });
        let tick = tokio::spawn(async move { scheduler.tick().await });

        let manual = manual.await.unwrap();
        let tick = tick.await.unwrap().unwrap();

        let by_tick = tick.published.contains(&id);
        assert!(manual.is_ok() != by_tick, "round {round}: exactly one path publishes");
        if let Err(err) = manual {
            assert!(matches!(err, EditorialError::InvalidTransition { from: ArticleStatus::Published, .. }));
        }
        assert_eq!(published_transitions(&fixture, id), 1);
    }

    assert_eq!(fixture.site.calls(), 20);
}

/// Applies one workflow action the way an editor with every grant would.
async fn apply(fixture: &Fixture, action: WorkflowAction, id: ArticleId) -> Result<Article, EditorialError> {
    let actor = editor();
    match action {
        WorkflowAction::SubmitForReview => fixture.engine.submit_for_review(&actor, id, None).await,
        WorkflowAction::Approve => fixture.engine.approve(&actor, id).await,
        WorkflowAction::RequestRevision => fixture.engine.request_revision(&actor, id, "fix intro").await,
        WorkflowAction::Schedule => fixture.engine.schedule(&actor, id, in_one_hour(fixture)).await,
        WorkflowAction::CancelSchedule => fixture.engine.cancel_schedule(&actor, id).await,
        WorkflowAction::PublishNow => fixture.engine.publish_now(&actor, id, None).await.map(|p| p.article),
        WorkflowAction::Archive => fixture.engine.archive(&actor, id).await,
    }
}

#[tokio::test]
async fn every_action_sequence_keeps_status_and_schedule_consistent() {
    let fixture = Fixture::new();
    let actions = WorkflowAction::ALL;

    let mut sequences: Vec<Vec<WorkflowAction>> = vec![vec![]];
    for _ in 0..3 {
        sequences = sequences
            .into_iter()
            .flat_map(|prefix| {
                actions.iter().map(move |action| {
                    let mut next = prefix.clone();
                    next.push(*action);
                    next
                })
            })
            .collect();
    }

    for sequence in sequences {
        let article = fixture.draft("Sequence").await;
        let mut status = article.status();

        for action in &sequence {
            let result = apply(&fixture, *action, article.id).await;
            let stored = fixture.engine.get_article(article.id).await.unwrap();

            match result {
                Ok(_) => {
                    assert!(action.is_allowed_from(status), "{sequence:?}");
                    assert_eq!(stored.status(), action.target(), "{sequence:?}");
                }
                Err(EditorialError::InvalidTransition { from, .. }) => {
                    assert!(!action.is_allowed_from(status), "{sequence:?}");
                    assert_eq!(from, status);
                    assert_eq!(stored.status(), status, "{sequence:?}");
                }
                Err(other) => panic!("{sequence:?}: unexpected {other}"),
            }
            status = stored.status();

            let entry = fixture.repository.find_schedule_entry(article.id).await.unwrap();
            let scheduled = status == ArticleStatus::Scheduled;
            assert_eq!(stored.publish_at().is_some(), scheduled, "{sequence:?}");
            assert_eq!(entry.map(|e| e.publish_at), stored.publish_at(), "{sequence:?}");
        }
    }
}
