use dxflow_poller::{PollEvent, StatusSession};
use dxflow_status::{Delivery, DiscardReason, DisplayPhase, Phase, PollTicket};
use dxflow_test_utils::{
    fast_config, ok, session_id, state, transport_error, GatedSource, ScriptedSource,
};
use std::time::Duration;
use tokio_test::assert_ok;

/// Gated fetches wait on the test, so they must not time out in real time
fn patient_config() -> dxflow_status::StatusConfig {
    fast_config(1).with_request_timeout(Duration::from_secs(60))
}

#[tokio::test(start_paused = true)]
async fn session_follows_job_to_completion() {
    let source = ScriptedSource::new([
        ok(Phase::INITIALIZING),
        ok(Phase::TEXTUAL_ANALYSIS),
        ok(Phase::WORKFLOW_COMPLETE),
    ]);
    let (session, handle) = StatusSession::new(source, session_id(), fast_config(3));
    let task = tokio::spawn(session.run());

    let mut views = handle.subscribe();
    let done = DisplayPhase::Phase(Phase::new(Phase::WORKFLOW_COMPLETE));
    assert_ok!(views.wait_for(|v| v.display_phase == done).await);

    assert_ok!(handle.shutdown().await);
    let report = task.await.unwrap();
    assert!(report.final_view.has_state);
    assert!(!report.final_view.is_busy);
    assert_eq!(report.stats.restarts, 0);
    assert_eq!(report.stats.events_discarded, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_fetches_surface_retry_affordance() {
    let source = ScriptedSource::new([transport_error()]);
    let (session, handle) = StatusSession::new(source, session_id(), fast_config(2));
    let task = tokio::spawn(session.run());

    let mut views = handle.subscribe();
    assert_ok!(views.wait_for(|v| v.is_failed()).await);

    let view = handle.current();
    assert!(view.can_retry());
    assert!(!view.has_state);
    assert_eq!(view.failure.map(|f| f.attempts), Some(2));

    assert_ok!(handle.shutdown().await);
    task.await.unwrap();
}

#[tokio::test]
async fn queued_delivery_from_before_start_over_is_discarded() {
    let source = GatedSource::new(ok("running"));
    let (mut session, _handle) = StatusSession::new(source, session_id(), patient_config());

    let stale = PollEvent::State {
        ticket: PollTicket::new(session.controller().generation(), 0),
        state: Some(state("running")),
    };
    session.start_over();

    assert_eq!(
        session.apply(stale),
        Delivery::Discarded(DiscardReason::SupersededGeneration)
    );
    assert!(!session.controller().project().has_state);
    assert_eq!(session.stats().events_discarded, 1);
    assert_eq!(session.stats().restarts, 1);
}

#[tokio::test]
async fn start_over_while_request_in_flight() {
    let source = GatedSource::new(ok(Phase::ANALYZING_IMAGE));
    let (session, handle) = StatusSession::new(source.clone(), session_id(), patient_config());
    let task = tokio::spawn(session.run());

    source.wait_started().await;
    assert_ok!(handle.start_over().await);

    // the replacement poller issues its own request
    source.wait_started().await;
    source.release();

    let mut views = handle.subscribe();
    assert_ok!(views.wait_for(|v| v.has_state).await);
    assert_eq!(
        handle.current().display_phase,
        DisplayPhase::Phase(Phase::new(Phase::ANALYZING_IMAGE))
    );

    assert_ok!(handle.shutdown().await);
    let report = task.await.unwrap();
    assert_eq!(report.stats.restarts, 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_ends_session() {
    let source = ScriptedSource::with_latency([(Duration::from_millis(5), ok("running"))]);
    let (session, handle) = StatusSession::new(source, session_id(), fast_config(1));
    let task = tokio::spawn(session.run());

    drop(handle);
    let report = task.await.unwrap();
    assert_eq!(report.session, session_id());
}
