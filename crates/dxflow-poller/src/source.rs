//! Status source abstraction
//!
//! Implement [`StatusSource`] to connect the poller to a transport (HTTP,
//! websocket relay, in-process simulator).

use dxflow_status::{PollError, SessionId, WorkflowState};
use std::sync::Arc;

/// Fetches the current workflow state of a session
#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    /// Current snapshot, or `None` when the backend has nothing yet
    async fn fetch(&self, session: &SessionId) -> Result<Option<WorkflowState>, PollError>;
}

#[async_trait::async_trait]
impl<T: StatusSource + ?Sized> StatusSource for Arc<T> {
    async fn fetch(&self, session: &SessionId) -> Result<Option<WorkflowState>, PollError> {
        (**self).fetch(session).await
    }
}
