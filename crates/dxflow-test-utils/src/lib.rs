//! Testing utilities for dxflow workspace
//!
//! Shared status sources and fixtures.

#![allow(missing_docs)]

use dxflow_poller::StatusSource;
use dxflow_status::{PollError, RetryPolicy, SessionId, StatusConfig, WorkflowState};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub type FetchResult = Result<Option<WorkflowState>, PollError>;

pub fn state(phase: &str) -> WorkflowState {
    WorkflowState::new(phase)
}

pub fn ok(phase: &str) -> FetchResult {
    Ok(Some(state(phase)))
}

pub fn transport_error() -> FetchResult {
    Err(PollError::Transport("connection reset".to_string()))
}

pub fn session_id() -> SessionId {
    SessionId::new("session_0badc0de")
}

/// Fast, jitter-free config for paused-time tests
pub fn fast_config(max_attempts: u32) -> StatusConfig {
    StatusConfig::new()
        .with_poll_interval(Duration::from_millis(10))
        .with_request_timeout(Duration::from_millis(50))
        .with_retry(
            RetryPolicy {
                initial_backoff_ms: 5,
                max_backoff_ms: 20,
                ..RetryPolicy::default()
            }
            .with_max_attempts(max_attempts)
            .without_jitter(),
        )
}

/// Replays scripted responses in order; the last one repeats forever
#[derive(Debug)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<(Duration, FetchResult)>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(responses: impl IntoIterator<Item = FetchResult>) -> Arc<Self> {
        Self::with_latency(responses.into_iter().map(|r| (Duration::ZERO, r)))
    }

    pub fn with_latency(responses: impl IntoIterator<Item = (Duration, FetchResult)>) -> Arc<Self> {
        let script: VecDeque<_> = responses.into_iter().collect();
        assert!(!script.is_empty(), "script needs at least one response");
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> (Duration, FetchResult) {
        let mut script = self.script.lock();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

#[async_trait::async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch(&self, _session: &SessionId) -> FetchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (latency, response) = self.next();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        response
    }
}

/// Holds every fetch until released, to model a request in flight
#[derive(Debug)]
pub struct GatedSource {
    response: FetchResult,
    gate: Notify,
    started: Notify,
}

impl GatedSource {
    pub fn new(response: FetchResult) -> Arc<Self> {
        Arc::new(Self {
            response,
            gate: Notify::new(),
            started: Notify::new(),
        })
    }

    /// Wait until a fetch is in flight
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Let every pending fetch complete
    pub fn release(&self) {
        self.gate.notify_waiters();
    }
}

#[async_trait::async_trait]
impl StatusSource for GatedSource {
    async fn fetch(&self, _session: &SessionId) -> FetchResult {
        self.started.notify_one();
        self.gate.notified().await;
        self.response.clone()
    }
}
