//! Controller state machine
//!
//! Three states: nothing held, a snapshot held, or a fetch failure held.
//! There is no terminal state; the controller lives as long as its view.

use serde::{Deserialize, Serialize};

/// Observable controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StatusState {
    #[default]
    Unobserved,
    Observed,
    Failed,
}

/// Event applied to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    /// A snapshot arrived
    Observe,
    /// An explicit "no status" arrived
    ObserveNone,
    /// Fetching status failed
    Fail,
    /// User cleared the view
    Reset,
    /// Busy flag changed
    SetBusy,
}

impl Trigger {
    pub const ALL: [Trigger; 5] = [
        Trigger::Observe,
        Trigger::ObserveNone,
        Trigger::Fail,
        Trigger::Reset,
        Trigger::SetBusy,
    ];
}

/// State after applying `trigger` in `from`
#[must_use]
pub fn next_state(from: StatusState, trigger: Trigger) -> StatusState {
    use StatusState::{Failed, Observed, Unobserved};
    match trigger {
        Trigger::Observe => Observed,
        Trigger::ObserveNone | Trigger::Reset => Unobserved,
        Trigger::Fail => Failed,
        Trigger::SetBusy => from,
    }
}

/// Triggers that move the controller out of `from`
#[must_use]
pub fn allowed_triggers(from: StatusState) -> Vec<Trigger> {
    Trigger::ALL
        .into_iter()
        .filter(|t| next_state(from, *t) != from)
        .collect()
}
