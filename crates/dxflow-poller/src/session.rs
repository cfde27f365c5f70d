//! Session event loop
//!
//! A [`StatusSession`] owns one [`WorkflowStatusController`] for the lifetime
//! of an analysis view. Poll events and user commands are applied strictly
//! one at a time, so the controller needs no locking.
//!
//! "Start over" resets the controller, aborts the current poller and starts a
//! new one bound to the new generation. Events the old poller queued before
//! it was aborted are discarded by the generation check.

use crate::poller::{PollEvent, Poller, PollerHandle};
use crate::source::StatusSource;
use dxflow_status::{ControllerView, Delivery, SessionId, StatusConfig, WorkflowStatusController};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::Instrument;

const EVENT_BUFFER: usize = 64;
const COMMAND_BUFFER: usize = 8;

/// Session errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session loop has stopped
    #[error("status session closed")]
    Closed,
}

/// User-initiated commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Clear the view and poll a fresh job
    StartOver,
    /// Tear the view down
    Shutdown,
}

/// Counters reported when the session ends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub events_applied: u64,
    pub events_discarded: u64,
    pub restarts: u64,
}

/// Final state of a session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session: SessionId,
    pub stats: SessionStats,
    pub final_view: ControllerView,
}

/// Cloneable handle used by the view
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    views: watch::Receiver<ControllerView>,
}

impl SessionHandle {
    /// Clear the displayed state and begin polling a fresh job
    pub async fn start_over(&self) -> Result<(), SessionError> {
        self.commands
            .send(SessionCommand::StartOver)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Stop the session
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.commands
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Receive every new projection
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ControllerView> {
        self.views.clone()
    }

    /// Latest projection
    #[must_use]
    pub fn current(&self) -> ControllerView {
        self.views.borrow().clone()
    }
}

/// Event loop owning one controller
pub struct StatusSession {
    session: SessionId,
    source: Arc<dyn StatusSource>,
    config: StatusConfig,
    controller: WorkflowStatusController,
    poller: Option<PollerHandle>,
    events_tx: mpsc::Sender<PollEvent>,
    events_rx: mpsc::Receiver<PollEvent>,
    commands_rx: mpsc::Receiver<SessionCommand>,
    stats: SessionStats,
}

impl StatusSession {
    /// Create a session and the handle the view keeps
    pub fn new(
        source: Arc<dyn StatusSource>,
        session: SessionId,
        config: StatusConfig,
    ) -> (Self, SessionHandle) {
        let controller = WorkflowStatusController::new();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = SessionHandle {
            commands: commands_tx,
            views: controller.subscribe(),
        };
        let session = Self {
            session,
            source,
            config,
            controller,
            poller: None,
            events_tx,
            events_rx,
            commands_rx,
            stats: SessionStats::default(),
        };
        (session, handle)
    }

    #[must_use]
    pub fn controller(&self) -> &WorkflowStatusController {
        &self.controller
    }

    #[must_use]
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Poll the current job and process events until shutdown
    ///
    /// Also stops when every [`SessionHandle`] has been dropped.
    pub async fn run(self) -> SessionReport {
        let span = tracing::info_span!("status_session", session = %self.session);
        self.event_loop().instrument(span).await
    }

    async fn event_loop(mut self) -> SessionReport {
        tracing::info!("status session started");

        self.spawn_poller();

        loop {
            tokio::select! {
                biased;
                command = self.commands_rx.recv() => match command {
                    Some(SessionCommand::StartOver) => self.start_over(),
                    Some(SessionCommand::Shutdown) | None => break,
                },
                Some(event) = self.events_rx.recv() => {
                    self.apply(event);
                }
            }
        }

        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        tracing::info!(
            applied = self.stats.events_applied,
            discarded = self.stats.events_discarded,
            restarts = self.stats.restarts,
            "status session stopped"
        );

        SessionReport {
            session: self.session,
            stats: self.stats,
            final_view: self.controller.project(),
        }
    }

    /// Reset the controller and poll again under the new generation
    pub fn start_over(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        self.controller.reset();
        self.stats.restarts += 1;
        tracing::info!(generation = %self.controller.generation(), "starting over");
        self.spawn_poller();
    }

    /// Apply one poll event to the controller
    pub fn apply(&mut self, event: PollEvent) -> Delivery {
        let delivery = match event {
            PollEvent::Busy { ticket, busy } => self.controller.set_busy_tagged(ticket, busy),
            PollEvent::State { ticket, state } => self.controller.observe_tagged(ticket, state),
            PollEvent::Failed { ticket, reason } => self.controller.fail_tagged(ticket, reason),
        };
        match delivery {
            Delivery::Applied => self.stats.events_applied += 1,
            Delivery::Discarded(_) => self.stats.events_discarded += 1,
        }
        delivery
    }

    fn spawn_poller(&mut self) {
        let poller = Poller::new(
            Arc::clone(&self.source),
            self.session.clone(),
            self.controller.generation(),
            self.config.clone(),
            self.events_tx.clone(),
        );
        self.poller = Some(poller.spawn());
    }
}
