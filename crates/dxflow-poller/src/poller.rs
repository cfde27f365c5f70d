//! Generation-bound polling task
//!
//! A [`Poller`] belongs to exactly one controller generation. It tags every
//! event with a ticket from that generation, so once the controller has been
//! reset anything the poller still sends is discarded on arrival.
//!
//! Per poll:
//! 1. `Busy(true)` with a fresh ticket
//! 2. fetch, bounded by the request timeout
//! 3. `Busy(false)`, then `State` on success
//!
//! Retryable errors back off and retry. When retries run out, or the error
//! is not retryable, the poller sends `Failed` and exits. It also exits after
//! delivering a terminal phase or when the receiver is gone.

use crate::backoff::Backoff;
use crate::source::StatusSource;
use dxflow_status::{
    FailureReason, Generation, Phase, PollError, PollTicket, SessionId, StatusConfig,
    TicketIssuer, WorkflowState,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Event sent by a poller
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Busy {
        ticket: PollTicket,
        busy: bool,
    },
    State {
        ticket: PollTicket,
        state: Option<WorkflowState>,
    },
    Failed {
        ticket: PollTicket,
        reason: FailureReason,
    },
}

impl PollEvent {
    #[must_use]
    pub fn ticket(&self) -> PollTicket {
        match self {
            Self::Busy { ticket, .. }
            | Self::State { ticket, .. }
            | Self::Failed { ticket, .. } => *ticket,
        }
    }
}

/// Why a poller stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerExit {
    /// Delivered a terminal phase
    Terminal(Phase),
    /// Delivered a failure
    Failed,
    /// Receiver dropped
    ChannelClosed,
}

/// Polls one session on behalf of one controller generation
pub struct Poller<E> {
    source: Arc<dyn StatusSource>,
    session: SessionId,
    config: StatusConfig,
    issuer: TicketIssuer,
    events: mpsc::Sender<E>,
}

impl<E> Poller<E>
where
    E: From<PollEvent> + Send + 'static,
{
    pub fn new(
        source: Arc<dyn StatusSource>,
        session: SessionId,
        generation: Generation,
        config: StatusConfig,
        events: mpsc::Sender<E>,
    ) -> Self {
        Self {
            source,
            session,
            config,
            issuer: TicketIssuer::new(generation),
            events,
        }
    }

    /// Run on a new tokio task
    #[must_use]
    pub fn spawn(self) -> PollerHandle {
        let generation = self.issuer.generation();
        let task = tokio::spawn(self.run());
        PollerHandle { generation, task }
    }

    /// Poll until a terminal phase, a final failure, or a closed channel
    pub async fn run(mut self) -> PollerExit {
        let generation = self.issuer.generation();
        tracing::debug!(session = %self.session, %generation, "poller started");
        let mut backoff = Backoff::new(self.config.retry);

        loop {
            let ticket = self.issuer.issue();

            if !self.send(PollEvent::Busy { ticket, busy: true }).await {
                return PollerExit::ChannelClosed;
            }
            let outcome = self.fetch().await;
            if !self.send(PollEvent::Busy { ticket, busy: false }).await {
                return PollerExit::ChannelClosed;
            }

            match outcome {
                Ok(state) => {
                    backoff.reset();
                    let terminal = state
                        .as_ref()
                        .map(|s| &s.phase)
                        .filter(|phase| phase.is_terminal())
                        .cloned();

                    if !self.send(PollEvent::State { ticket, state }).await {
                        return PollerExit::ChannelClosed;
                    }
                    if let Some(phase) = terminal {
                        tracing::info!(
                            session = %self.session,
                            %phase,
                            "workflow reached terminal phase"
                        );
                        return PollerExit::Terminal(phase);
                    }
                    tokio::time::sleep(self.config.poll_interval()).await;
                }
                Err(err) => {
                    let delay = backoff.next_delay().filter(|_| err.is_retryable());
                    if let Some(delay) = delay {
                        tracing::warn!(
                            session = %self.session,
                            %ticket,
                            attempt = backoff.failures(),
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %err,
                            "status fetch failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    tracing::error!(
                        session = %self.session,
                        %ticket,
                        error = %err,
                        "giving up on status fetch"
                    );
                    let reason = FailureReason::new(err.to_string(), err.is_retryable())
                        .with_attempts(backoff.failures());
                    if !self.send(PollEvent::Failed { ticket, reason }).await {
                        return PollerExit::ChannelClosed;
                    }
                    return PollerExit::Failed;
                }
            }
        }
    }

    async fn fetch(&self) -> Result<Option<WorkflowState>, PollError> {
        let timeout = self.config.request_timeout();
        match tokio::time::timeout(timeout, self.source.fetch(&self.session)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PollError::Timeout {
                after_ms: self.config.request_timeout_ms,
            }),
        }
    }

    async fn send(&self, event: PollEvent) -> bool {
        self.events.send(E::from(event)).await.is_ok()
    }
}

/// Handle to a spawned poller
#[derive(Debug)]
pub struct PollerHandle {
    generation: Generation,
    task: JoinHandle<PollerExit>,
}

impl PollerHandle {
    /// Generation the poller tags its events with
    #[inline]
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop polling; a request already in flight is dropped
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the poller to stop; `None` if it was aborted
    pub async fn join(self) -> Option<PollerExit> {
        self.task.await.ok()
    }
}
