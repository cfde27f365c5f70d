//! dxflow Status - workflow status tracking for diagnosis jobs
//!
//! The client-side view model of a long-running analysis job:
//! - Holds the latest snapshot, a fetch failure, or nothing
//! - Rejects deliveries that a reset or a newer poll has superseded
//! - Projects everything into a render-ready [`ControllerView`]
//! - Decodes the backend's push messages into observations
//!
//! # Example
//!
//! ```rust
//! use dxflow_status::{DisplayPhase, WorkflowState, WorkflowStatusController};
//!
//! let mut controller = WorkflowStatusController::new();
//! controller.set_busy(true);
//! controller.observe(Some(WorkflowState::new("running")));
//!
//! let view = controller.project();
//! assert!(view.has_state && view.is_busy);
//!
//! controller.reset();
//! assert_eq!(controller.project().display_phase, DisplayPhase::Loading);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod controller;
pub mod error;
pub mod message;
pub mod state_machine;
pub mod types;
pub mod view;
pub mod workflow;

pub use config::{RetryPolicy, StatusConfig};
pub use controller::{Delivery, DiscardReason, WorkflowStatusController};
pub use error::{ConfigError, PollError, StatusError};
pub use message::StatusMessage;
pub use state_machine::{StatusState, Trigger};
pub use types::{
    FailureReason, Generation, Observation, Phase, PollTicket, ProgressDetail, SessionId,
    TicketIssuer, WorkflowState,
};
pub use view::{ControllerView, DisplayPhase};
pub use workflow::{UserInput, WorkflowInfo};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with workflow status
    pub use crate::{
        ControllerView, Delivery, DisplayPhase, FailureReason, Observation, Phase, PollTicket,
        StatusConfig, WorkflowState, WorkflowStatusController,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
