use dxflow_status::state_machine::{next_state, StatusState, Trigger};
use dxflow_status::{
    ControllerView, Delivery, DiscardReason, DisplayPhase, FailureReason, PollTicket,
    TicketIssuer, WorkflowState, WorkflowStatusController,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn view(has_state: bool, display_phase: DisplayPhase, is_busy: bool) -> ControllerView {
    ControllerView {
        has_state,
        is_busy,
        display_phase,
        progress_detail: None,
        failure: None,
    }
}

#[test]
fn scenario_observe_none() {
    let mut controller = WorkflowStatusController::new();
    controller.observe(None);
    assert_eq!(
        controller.project(),
        view(false, DisplayPhase::Loading, false)
    );
}

#[test]
fn scenario_busy_then_observe_none() {
    let mut controller = WorkflowStatusController::new();
    controller.set_busy(true);
    controller.observe(None);
    assert_eq!(controller.project(), view(false, DisplayPhase::Loading, true));
}

#[test]
fn scenario_observe_running() {
    let mut controller = WorkflowStatusController::new();
    controller.observe(Some(WorkflowState::new("running")));
    assert_eq!(
        controller.project(),
        view(true, DisplayPhase::Phase("running".into()), false)
    );
}

#[test]
fn scenario_completed_then_reset() {
    let mut controller = WorkflowStatusController::new();
    controller.observe(Some(WorkflowState::new("completed")));
    controller.reset();
    assert_eq!(
        controller.project(),
        view(false, DisplayPhase::Loading, false)
    );
}

#[test]
fn scenario_late_delivery_after_reset_is_discarded() {
    let mut controller = WorkflowStatusController::new();
    let mut issuer = TicketIssuer::new(controller.generation());

    let in_flight = issuer.issue();
    controller.set_busy(true);
    controller.reset();

    let outcome = controller.observe_tagged(in_flight, Some(WorkflowState::new("running")));
    assert_eq!(
        outcome,
        Delivery::Discarded(DiscardReason::SupersededGeneration)
    );
    assert!(!controller.project().has_state);
}

#[test]
fn all_four_busy_state_combinations() {
    for (observed, busy) in [(false, false), (false, true), (true, false), (true, true)] {
        let mut controller = WorkflowStatusController::new();
        controller.set_busy(busy);
        if observed {
            controller.observe(Some(WorkflowState::new("pending")));
        }
        let projected = controller.project();
        assert_eq!(projected.has_state, observed);
        assert_eq!(projected.is_busy, busy);
        assert_eq!(projected.display_phase.is_loading(), !observed);
    }
}

#[test]
fn failure_then_reset_clears_error() {
    let mut controller = WorkflowStatusController::new();
    controller.fail(FailureReason::new("backend returned 503", true).with_attempts(5));
    let failed = controller.project();
    assert!(failed.is_failed());
    assert!(failed.display_phase.is_loading());
    assert_eq!(controller.status_state(), StatusState::Failed);

    controller.reset();
    assert!(!controller.project().is_failed());
    assert_eq!(controller.status_state(), StatusState::Unobserved);
}

#[test]
fn newer_generation_delivery_is_applied_after_reset() {
    let mut controller = WorkflowStatusController::new();
    controller.reset();
    let mut issuer = TicketIssuer::new(controller.generation());

    let ticket = issuer.issue();
    assert!(controller
        .observe_tagged(ticket, Some(WorkflowState::new("initializing")))
        .is_applied());
    assert!(controller.project().has_state);
}

#[test]
fn duplicate_delivery_is_accepted() {
    let mut controller = WorkflowStatusController::new();
    let ticket = PollTicket::new(controller.generation(), 4);
    let state = WorkflowState::new("analyzing_image");
    assert!(controller.observe_tagged(ticket, Some(state.clone())).is_applied());
    assert!(controller.observe_tagged(ticket, Some(state)).is_applied());
}

#[derive(Debug, Clone)]
enum Op {
    Observe(Option<String>),
    Fail(FailureReason),
    SetBusy(bool),
    Reset,
}

fn op() -> impl Strategy<Value = Op> {
    let phase = prop_oneof![
        Just("pending".to_string()),
        Just("running".to_string()),
        Just("completed".to_string()),
        Just("failed".to_string()),
        "[a-z_]{1,24}",
    ];
    let failure = ("[a-z ]{1,16}", any::<bool>(), 1u32..6).prop_map(
        |(message, retryable, attempts)| {
            FailureReason::new(message, retryable).with_attempts(attempts)
        },
    );
    prop_oneof![
        proptest::option::of(phase).prop_map(Op::Observe),
        failure.prop_map(Op::Fail),
        any::<bool>().prop_map(Op::SetBusy),
        Just(Op::Reset),
    ]
}

fn apply(controller: &mut WorkflowStatusController, op: &Op) {
    match op {
        Op::Observe(phase) => controller.observe(phase.clone().map(WorkflowState::new)),
        Op::Fail(reason) => controller.fail(reason.clone()),
        Op::SetBusy(busy) => controller.set_busy(*busy),
        Op::Reset => controller.reset(),
    }
}

proptest! {
    #[test]
    fn prop_projection_depends_only_on_last_ops(ops in proptest::collection::vec(op(), 0..40)) {
        let mut controller = WorkflowStatusController::new();
        for op in &ops {
            apply(&mut controller, op);
        }

        let mut replay = WorkflowStatusController::new();
        if let Some(busy) = ops.iter().rev().find(|o| matches!(o, Op::SetBusy(_))) {
            apply(&mut replay, busy);
        }
        if let Some(last) = ops.iter().rev().find(|o| !matches!(o, Op::SetBusy(_))) {
            apply(&mut replay, last);
        }

        prop_assert_eq!(controller.project(), replay.project());
        prop_assert_eq!(controller.status_state(), replay.status_state());
    }

    #[test]
    fn prop_failure_view_reflects_last_op(ops in proptest::collection::vec(op(), 1..40)) {
        let mut controller = WorkflowStatusController::new();
        for op in &ops {
            apply(&mut controller, op);
        }
        let view = controller.project();
        match ops.iter().rev().find(|o| !matches!(o, Op::SetBusy(_))) {
            Some(Op::Fail(reason)) => {
                prop_assert_eq!(view.failure.as_ref(), Some(reason));
                prop_assert!(view.can_retry());
                prop_assert!(!view.has_state);
                prop_assert_eq!(view.display_phase, DisplayPhase::Loading);
            }
            _ => {
                prop_assert!(!view.is_failed());
            }
        }
    }

    #[test]
    fn prop_reset_always_clears(ops in proptest::collection::vec(op(), 0..20)) {
        let mut controller = WorkflowStatusController::new();
        for op in &ops {
            apply(&mut controller, op);
        }
        controller.reset();
        let view = controller.project();
        prop_assert!(!view.has_state);
        prop_assert!(!view.is_failed());
        prop_assert_eq!(view.display_phase, DisplayPhase::Loading);
    }

    #[test]
    fn prop_reset_is_idempotent(ops in proptest::collection::vec(op(), 0..20)) {
        let mut once = WorkflowStatusController::new();
        let mut twice = WorkflowStatusController::new();
        for op in &ops {
            apply(&mut once, op);
            apply(&mut twice, op);
        }
        once.reset();
        twice.reset();
        twice.reset();
        prop_assert_eq!(once.project(), twice.project());
    }

    #[test]
    fn prop_observe_shows_phase(phase in "[a-z_]{1,24}", busy in any::<bool>()) {
        let mut controller = WorkflowStatusController::new();
        controller.set_busy(busy);
        controller.observe(Some(WorkflowState::new(phase.as_str())));
        let view = controller.project();
        prop_assert!(view.has_state);
        prop_assert_eq!(view.display_phase, DisplayPhase::Phase(phase.as_str().into()));
    }

    #[test]
    fn prop_state_machine_tracks_controller(ops in proptest::collection::vec(op(), 0..40)) {
        let mut controller = WorkflowStatusController::new();
        let mut expected = StatusState::Unobserved;
        for op in &ops {
            let trigger = match op {
                Op::Observe(Some(_)) => Trigger::Observe,
                Op::Observe(None) => Trigger::ObserveNone,
                Op::Fail(_) => Trigger::Fail,
                Op::SetBusy(_) => Trigger::SetBusy,
                Op::Reset => Trigger::Reset,
            };
            apply(&mut controller, op);
            expected = next_state(expected, trigger);
            prop_assert_eq!(controller.status_state(), expected);
        }
    }
}
