//! dxflow Poller - status polling for diagnosis workflows
//!
//! Connects a [`StatusSource`] to a [`WorkflowStatusController`]:
//! - [`Poller`]: generation-bound polling task with retry and backoff
//! - [`StatusSession`]: single-threaded event loop owning the controller
//! - [`SessionHandle`]: what the view holds (projections, "start over")
//!
//! # Example
//!
//! ```rust,ignore
//! use dxflow_poller::StatusSession;
//! use dxflow_status::{SessionId, StatusConfig};
//!
//! let (session, handle) = StatusSession::new(source, SessionId::generate(), StatusConfig::new());
//! let task = tokio::spawn(session.run());
//!
//! let mut views = handle.subscribe();
//! while views.changed().await.is_ok() {
//!     println!("{}", *views.borrow());
//! }
//! ```
//!
//! [`WorkflowStatusController`]: dxflow_status::WorkflowStatusController

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod backoff;
pub mod poller;
pub mod session;
pub mod source;

pub use backoff::Backoff;
pub use poller::{PollEvent, Poller, PollerExit, PollerHandle};
pub use session::{
    SessionCommand, SessionError, SessionHandle, SessionReport, SessionStats, StatusSession,
};
pub use source::StatusSource;
