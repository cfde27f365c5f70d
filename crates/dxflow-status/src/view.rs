//! Render-ready projection
//!
//! [`ControllerView`] is the only data a renderer may depend on.

use crate::types::{FailureReason, Observation, Phase, ProgressDetail};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase to display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "phase", rename_all = "snake_case")]
pub enum DisplayPhase {
    /// No snapshot held
    Loading,
    /// Backend phase, unmodified
    Phase(Phase),
}

impl DisplayPhase {
    #[inline]
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

impl fmt::Display for DisplayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => f.write_str("loading"),
            Self::Phase(phase) => write!(f, "{phase}"),
        }
    }
}

/// Render-ready view of one workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerView {
    pub has_state: bool,
    pub is_busy: bool,
    pub display_phase: DisplayPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_detail: Option<ProgressDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl ControllerView {
    /// Project an observation and busy flag
    #[must_use]
    pub fn project(observation: &Observation, is_busy: bool) -> Self {
        match observation {
            Observation::Observed(state) => Self {
                has_state: true,
                is_busy,
                display_phase: DisplayPhase::Phase(state.phase.clone()),
                progress_detail: state.progress_detail.clone(),
                failure: None,
            },
            Observation::Failed(reason) => Self {
                has_state: false,
                is_busy,
                display_phase: DisplayPhase::Loading,
                progress_detail: None,
                failure: Some(reason.clone()),
            },
            Observation::Unobserved => Self::initial(is_busy),
        }
    }

    /// View with nothing held
    #[must_use]
    pub fn initial(is_busy: bool) -> Self {
        Self {
            has_state: false,
            is_busy,
            display_phase: DisplayPhase::Loading,
            progress_detail: None,
            failure: None,
        }
    }

    /// Error affordance should be shown
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Offer a "start over" retry action
    ///
    /// Every failure offers it. [`FailureReason::retryable`] only tells the
    /// renderer whether starting over is expected to help.
    #[inline]
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.is_failed()
    }
}

impl Default for ControllerView {
    fn default() -> Self {
        Self::initial(false)
    }
}

impl fmt::Display for ControllerView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.display_phase)?;
        if self.is_busy {
            f.write_str(" (busy)")?;
        }
        match (&self.failure, &self.progress_detail) {
            (Some(failure), _) => write!(f, " failed: {failure}"),
            (None, Some(ProgressDetail::Text(text))) => write!(f, " {text}"),
            (None, Some(ProgressDetail::Workflow(info))) => match &info.next_step_description {
                Some(next) => write!(f, " next: {next}"),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }
}
