//! Workflow status controller
//!
//! Holds the latest known observation of one analysis job plus a busy flag,
//! and projects them into a [`ControllerView`].
//!
//! # Freshness
//!
//! Plain [`observe`](WorkflowStatusController::observe) is last-write-wins.
//! Pollers should use the tagged variants instead: every delivery carries a
//! [`PollTicket`], and the controller discards it when
//! - its generation predates the latest [`reset`](WorkflowStatusController::reset), or
//! - its sequence is older than a delivery already applied in this generation.
//!
//! Every mutation that changes the projection is published to subscribers.

use crate::state_machine::{next_state, StatusState, Trigger};
use crate::types::{FailureReason, Generation, Observation, PollTicket, WorkflowState};
use crate::view::ControllerView;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Why a tagged delivery was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscardReason {
    /// Issued before the latest reset
    SupersededGeneration,
    /// Overtaken by a newer poll in the same generation
    StaleSequence,
}

/// Outcome of a tagged delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delivery {
    Applied,
    Discarded(DiscardReason),
}

impl Delivery {
    #[inline]
    #[must_use]
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Status controller for one analysis view
#[derive(Debug)]
pub struct WorkflowStatusController {
    observation: Observation,
    busy: bool,
    generation: Generation,
    /// Highest sequence applied in the current generation
    high_water: Option<u64>,
    publisher: watch::Sender<ControllerView>,
}

impl WorkflowStatusController {
    /// Controller in the `Unobserved` state, generation 0
    #[must_use]
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(ControllerView::default());
        Self {
            observation: Observation::Unobserved,
            busy: false,
            generation: Generation::default(),
            high_water: None,
            publisher,
        }
    }

    /// Replace the held state unconditionally
    pub fn observe(&mut self, state: Option<WorkflowState>) {
        let trigger = if state.is_some() {
            Trigger::Observe
        } else {
            Trigger::ObserveNone
        };
        self.transition(trigger, Observation::from(state));
    }

    /// Replace the held state if `ticket` is still current
    pub fn observe_tagged(&mut self, ticket: PollTicket, state: Option<WorkflowState>) -> Delivery {
        match self.admit(ticket) {
            Delivery::Applied => {
                self.observe(state);
                Delivery::Applied
            }
            discarded => discarded,
        }
    }

    /// Record a fetch failure
    pub fn fail(&mut self, reason: FailureReason) {
        tracing::warn!(generation = %self.generation, %reason, "workflow status unavailable");
        self.transition(Trigger::Fail, Observation::Failed(reason));
    }

    /// Record a fetch failure if `ticket` is still current
    pub fn fail_tagged(&mut self, ticket: PollTicket, reason: FailureReason) -> Delivery {
        match self.admit(ticket) {
            Delivery::Applied => {
                self.fail(reason);
                Delivery::Applied
            }
            discarded => discarded,
        }
    }

    /// Set the in-flight indicator
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
        self.publish();
    }

    /// Set the in-flight indicator if `ticket` belongs to the current generation
    ///
    /// Sequence order is not checked: busy flags from overlapping polls of the
    /// same generation are all valid.
    pub fn set_busy_tagged(&mut self, ticket: PollTicket, busy: bool) -> Delivery {
        if ticket.generation != self.generation {
            tracing::debug!(
                %ticket,
                current = %self.generation,
                "dropping busy flag from superseded poll"
            );
            return Delivery::Discarded(DiscardReason::SupersededGeneration);
        }
        self.set_busy(busy);
        Delivery::Applied
    }

    /// Clear the displayed state and start a new generation
    ///
    /// Does not touch the busy flag and does not cancel outstanding requests;
    /// their deliveries will carry the old generation and be discarded.
    pub fn reset(&mut self) {
        self.generation = self.generation.next();
        self.high_water = None;
        tracing::debug!(generation = %self.generation, "status reset");
        self.transition(Trigger::Reset, Observation::Unobserved);
    }

    /// Current projection
    #[must_use]
    pub fn project(&self) -> ControllerView {
        ControllerView::project(&self.observation, self.busy)
    }

    /// Receive every new projection
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ControllerView> {
        self.publisher.subscribe()
    }

    /// Generation new polls must be tagged with
    #[inline]
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[inline]
    #[must_use]
    pub fn observation(&self) -> &Observation {
        &self.observation
    }

    #[inline]
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// State machine position
    #[must_use]
    pub fn status_state(&self) -> StatusState {
        match self.observation {
            Observation::Unobserved => StatusState::Unobserved,
            Observation::Observed(_) => StatusState::Observed,
            Observation::Failed(_) => StatusState::Failed,
        }
    }

    fn admit(&mut self, ticket: PollTicket) -> Delivery {
        if ticket.generation != self.generation {
            tracing::debug!(
                %ticket,
                current = %self.generation,
                "discarding delivery from superseded generation"
            );
            return Delivery::Discarded(DiscardReason::SupersededGeneration);
        }
        if let Some(high_water) = self.high_water {
            if ticket.sequence < high_water {
                tracing::warn!(%ticket, high_water, "discarding out-of-order delivery");
                return Delivery::Discarded(DiscardReason::StaleSequence);
            }
        }
        self.high_water = Some(ticket.sequence);
        Delivery::Applied
    }

    fn transition(&mut self, trigger: Trigger, observation: Observation) {
        let from = self.status_state();
        let to = next_state(from, trigger);
        self.observation = observation;
        debug_assert_eq!(to, self.status_state());
        if from != to {
            tracing::debug!(?from, ?to, ?trigger, "status transition");
        }
        self.publish();
    }

    fn publish(&self) {
        let view = self.project();
        self.publisher.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}

impl Default for WorkflowStatusController {
    fn default() -> Self {
        Self::new()
    }
}
