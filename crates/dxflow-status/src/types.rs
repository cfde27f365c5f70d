//! Core status types
//!
//! Types reported by the diagnosis backend and the tags the client attaches
//! to them:
//! - [`Phase`]: backend-owned stage name, passed through unmodified
//! - [`WorkflowState`]: one snapshot of a running job
//! - [`Observation`]: what the controller currently holds
//! - [`Generation`] / [`PollTicket`]: freshness tags for deliveries

use crate::workflow::WorkflowInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing session id
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id in the backend's `session_<8 hex>` format
    #[must_use]
    pub fn generate() -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("session_{}", &hex[..8]))
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Workflow phase as reported by the backend
///
/// The phase set belongs to the backend. Unknown names are carried as-is;
/// the constants below are the stages the diagnosis pipeline emits today.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phase(String);

impl Phase {
    pub const PENDING: &'static str = "pending";
    pub const RUNNING: &'static str = "running";
    pub const COMPLETED: &'static str = "completed";
    pub const FAILED: &'static str = "failed";

    pub const INITIALIZING: &'static str = "initializing";
    pub const TEXTUAL_ANALYSIS: &'static str = "textual_analysis";
    pub const TEXTUAL_ANALYSIS_COMPLETE: &'static str = "textual_analysis_complete";
    pub const AWAITING_FOLLOWUP_RESPONSES: &'static str = "awaiting_followup_responses";
    pub const FOLLOWUP_ANALYSIS_COMPLETE: &'static str = "followup_analysis_complete";
    pub const AWAITING_IMAGE_UPLOAD: &'static str = "awaiting_image_upload";
    pub const ANALYZING_IMAGE: &'static str = "analyzing_image";
    pub const IMAGE_ANALYSIS_COMPLETE: &'static str = "image_analysis_complete";
    pub const PERFORMING_OVERALL_ANALYSIS: &'static str = "performing_overall_analysis";
    pub const OVERALL_ANALYSIS_COMPLETE: &'static str = "overall_analysis_complete";
    pub const HEALTHCARE_RECOMMENDATION: &'static str = "healthcare_recommendation";
    pub const HEALTHCARE_RECOMMENDATION_COMPLETE: &'static str =
        "healthcare_recommendation_complete";
    pub const GENERATING_MEDICAL_REPORT: &'static str = "generating_medical_report";
    pub const WORKFLOW_COMPLETE: &'static str = "workflow_complete";

    /// Create a phase from any backend-supplied name
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Phase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The job reported a failure (`failed` or any `*_error` stage)
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.0 == Self::FAILED || self.0.ends_with("_error")
    }

    /// No further phases will follow
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.is_error() || self.0 == Self::WORKFLOW_COMPLETE || self.0 == Self::COMPLETED
    }

    /// The job is paused until the user supplies input
    #[must_use]
    pub fn awaits_user(&self) -> bool {
        self.0.starts_with("awaiting_")
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Phase {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Phase {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Description of the current sub-step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressDetail {
    /// Human-readable message, e.g. "Analyzing symptoms with AI..."
    Text(String),
    /// Next-step record produced when a stage completes
    Workflow(WorkflowInfo),
    /// Anything else the backend attached
    Structured(serde_json::Value),
}

/// Backend-reported snapshot of one analysis job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_detail: Option<ProgressDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl WorkflowState {
    /// Snapshot with only a phase
    #[inline]
    pub fn new(phase: impl Into<Phase>) -> Self {
        Self {
            phase: phase.into(),
            progress_detail: None,
            session_id: None,
        }
    }

    /// With progress detail
    #[inline]
    #[must_use]
    pub fn with_detail(mut self, detail: ProgressDetail) -> Self {
        self.progress_detail = Some(detail);
        self
    }

    /// With a text progress message
    #[inline]
    #[must_use]
    pub fn with_message(self, message: impl Into<String>) -> Self {
        self.with_detail(ProgressDetail::Text(message.into()))
    }

    /// With session id
    #[inline]
    #[must_use]
    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// Why fetching status failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub message: String,
    /// Whether starting over is expected to help
    pub retryable: bool,
    /// Fetch attempts made before giving up
    pub attempts: u32,
}

impl FailureReason {
    /// Single-attempt failure
    pub fn new(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            message: message.into(),
            retryable,
            attempts: 1,
        }
    }

    /// With attempt count
    #[inline]
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} attempt(s))", self.message, self.attempts)
    }
}

/// What the controller currently holds
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Observation {
    /// Nothing received yet, or cleared by reset
    #[default]
    Unobserved,
    /// Latest snapshot
    Observed(WorkflowState),
    /// Fetching status failed
    Failed(FailureReason),
}

impl Observation {
    /// Held state, if any
    #[must_use]
    pub fn state(&self) -> Option<&WorkflowState> {
        match self {
            Self::Observed(state) => Some(state),
            _ => None,
        }
    }
}

impl From<Option<WorkflowState>> for Observation {
    fn from(value: Option<WorkflowState>) -> Self {
        value.map_or(Self::Unobserved, Self::Observed)
    }
}

/// Reset counter; deliveries from an older generation are discarded
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Generation(pub u64);

impl Generation {
    /// Following generation
    #[inline]
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Tag carried by every poll delivery
///
/// `sequence` is assigned when the poll starts, so a response that was
/// overtaken by a later poll carries the smaller number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PollTicket {
    pub generation: Generation,
    pub sequence: u64,
}

impl PollTicket {
    #[inline]
    #[must_use]
    pub fn new(generation: Generation, sequence: u64) -> Self {
        Self {
            generation,
            sequence,
        }
    }
}

impl fmt::Display for PollTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/#{}", self.generation, self.sequence)
    }
}

/// Issues monotonically increasing tickets for one generation
#[derive(Debug, Clone)]
pub struct TicketIssuer {
    generation: Generation,
    next_sequence: u64,
}

impl TicketIssuer {
    #[must_use]
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            next_sequence: 0,
        }
    }

    /// Generation every ticket is bound to
    #[inline]
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Next ticket
    pub fn issue(&mut self) -> PollTicket {
        let ticket = PollTicket::new(self.generation, self.next_sequence);
        self.next_sequence += 1;
        ticket
    }
}
