//! Backend push messages
//!
//! The diagnosis backend announces progress with JSON messages tagged by
//! `type`. Only some of them carry status; [`StatusMessage::observation`]
//! maps those to an [`Observation`].

use crate::error::{Result, StatusError};
use crate::types::{FailureReason, Observation, Phase, ProgressDetail, SessionId, WorkflowState};
use crate::workflow::WorkflowInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One push message from the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusMessage {
    ConnectionEstablished {
        session_id: SessionId,
        #[serde(default, deserialize_with = "timestamp::deserialize")]
        timestamp: Option<DateTime<Utc>>,
        #[serde(default)]
        message: Option<String>,
    },
    WorkflowStarted {
        #[serde(default)]
        session_id: Option<SessionId>,
        #[serde(default)]
        initial_symptoms: Option<String>,
        #[serde(default, deserialize_with = "timestamp::deserialize")]
        timestamp: Option<DateTime<Utc>>,
    },
    NodeStarted {
        node: String,
        #[serde(default)]
        message: Option<String>,
        #[serde(default, deserialize_with = "timestamp::deserialize")]
        timestamp: Option<DateTime<Utc>>,
    },
    NodeProgress {
        node: String,
        #[serde(default)]
        message: Option<String>,
        #[serde(default, deserialize_with = "timestamp::deserialize")]
        timestamp: Option<DateTime<Utc>>,
    },
    NodeCompleted {
        node: String,
        /// Full agent state; only `current_workflow_stage` is read
        #[serde(default)]
        result: serde_json::Value,
        #[serde(default)]
        workflow_info: Option<serde_json::Value>,
        #[serde(default, deserialize_with = "timestamp::deserialize")]
        timestamp: Option<DateTime<Utc>>,
    },
    NodeError {
        node: String,
        error: String,
        #[serde(default, deserialize_with = "timestamp::deserialize")]
        timestamp: Option<DateTime<Utc>>,
    },
    WorkflowProgress {
        stage: String,
        #[serde(default)]
        description: Option<String>,
        /// Percent complete, 0 to 100
        #[serde(default)]
        progress: Option<f64>,
        #[serde(default)]
        node_result: serde_json::Value,
        #[serde(default, deserialize_with = "timestamp::deserialize")]
        timestamp: Option<DateTime<Utc>>,
    },
    UserInputRequired {
        #[serde(default)]
        questions: Vec<serde_json::Value>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default, deserialize_with = "timestamp::deserialize")]
        timestamp: Option<DateTime<Utc>>,
    },
    WorkflowCompleted {
        #[serde(default)]
        final_result: serde_json::Value,
        #[serde(default, deserialize_with = "timestamp::deserialize")]
        timestamp: Option<DateTime<Utc>>,
    },
    WorkflowError {
        error: String,
        #[serde(default, deserialize_with = "timestamp::deserialize")]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Snapshot of the backend's per-session record
    WorkflowStatus {
        #[serde(default)]
        data: serde_json::Value,
        #[serde(default, deserialize_with = "timestamp::deserialize")]
        timestamp: Option<DateTime<Utc>>,
    },
    SessionTerminated {
        #[serde(default)]
        message: Option<String>,
        #[serde(default, deserialize_with = "timestamp::deserialize")]
        timestamp: Option<DateTime<Utc>>,
    },
    Pong {
        #[serde(default, deserialize_with = "timestamp::deserialize")]
        timestamp: Option<DateTime<Utc>>,
    },
}

impl StatusMessage {
    /// Decode one message
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Decode newline-delimited messages, skipping blank lines
    pub fn from_json_lines(raw: &str) -> Result<Vec<Self>> {
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Self::from_json)
            .collect()
    }

    /// Observation carried by this message, if any
    ///
    /// A new or terminated job clears whatever was held before.
    pub fn observation(&self) -> Result<Option<Observation>> {
        let observation = match self {
            Self::ConnectionEstablished { .. } | Self::Pong { .. } => return Ok(None),
            Self::WorkflowStarted { .. } | Self::SessionTerminated { .. } => {
                Observation::Unobserved
            }
            Self::NodeStarted { node, message, .. } | Self::NodeProgress { node, message, .. } => {
                let state = WorkflowState::new(node.as_str());
                Observation::Observed(with_text(state, message.clone()))
            }
            Self::NodeCompleted {
                node,
                result,
                workflow_info,
                ..
            } => {
                let detail = workflow_info.as_ref().map(decode_detail);
                let from_info = match &detail {
                    Some(ProgressDetail::Workflow(info)) => info.current_stage.clone(),
                    _ => None,
                };
                let phase = stage_of(result)
                    .or(from_info)
                    .unwrap_or_else(|| Phase::new(node.as_str()));
                let mut state = WorkflowState::new(phase);
                state.progress_detail = detail;
                state.session_id = session_of(result);
                Observation::Observed(state)
            }
            Self::NodeError { node, error, .. } => {
                Observation::Failed(FailureReason::new(format!("{node}: {error}"), true))
            }
            Self::WorkflowProgress {
                stage,
                description,
                progress,
                ..
            } => {
                let text = progress_text(description.as_deref(), *progress);
                Observation::Observed(with_text(WorkflowState::new(stage.as_str()), text))
            }
            Self::UserInputRequired { message, .. } => {
                let state = WorkflowState::new(Phase::AWAITING_FOLLOWUP_RESPONSES);
                Observation::Observed(with_text(state, message.clone()))
            }
            Self::WorkflowCompleted { final_result, .. } => {
                let mut state = WorkflowState::new(Phase::WORKFLOW_COMPLETE);
                state.session_id = session_of(final_result);
                Observation::Observed(state)
            }
            Self::WorkflowError { error, .. } => {
                Observation::Failed(FailureReason::new(error.clone(), true))
            }
            Self::WorkflowStatus { data, .. } => record_observation(data)?,
        };
        Ok(Some(observation))
    }
}

/// Read the backend's session record: `status`, `current_stage`,
/// `stage_description`, `progress` and, after a failure, `error`
fn record_observation(data: &serde_json::Value) -> Result<Observation> {
    if !(data.is_null() || data.is_object()) {
        return Err(StatusError::MissingField("data"));
    }
    let field = |name: &str| data.get(name).and_then(serde_json::Value::as_str);

    match field("status") {
        Some("error") => {
            let message = field("error").unwrap_or("workflow failed");
            return Ok(Observation::Failed(FailureReason::new(message, true)));
        }
        Some(Phase::COMPLETED) => {
            let state = WorkflowState::new(Phase::WORKFLOW_COMPLETE);
            return Ok(Observation::Observed(state));
        }
        _ => {}
    }

    let Some(phase) = field("current_stage").map(Phase::new).or_else(|| stage_of(data)) else {
        return Ok(Observation::Unobserved);
    };
    let progress = data.get("progress").and_then(serde_json::Value::as_f64);
    let mut state = with_text(
        WorkflowState::new(phase),
        progress_text(field("stage_description"), progress),
    );
    state.session_id = session_of(data);
    Ok(Observation::Observed(state))
}

fn with_text(state: WorkflowState, text: Option<String>) -> WorkflowState {
    match text {
        Some(text) => state.with_message(text),
        None => state,
    }
}

/// "Processing medical images (60%)"
fn progress_text(description: Option<&str>, progress: Option<f64>) -> Option<String> {
    match (description, progress) {
        (Some(description), Some(progress)) => Some(format!("{description} ({progress}%)")),
        (Some(description), None) => Some(description.to_string()),
        (None, Some(progress)) => Some(format!("{progress}%")),
        (None, None) => None,
    }
}

mod timestamp {
    //! The backend emits naive local ISO timestamps; RFC 3339 is also accepted.

    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| parse(&s).map_err(serde::de::Error::custom))
            .transpose()
    }

    pub(super) fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc())
            })
    }
}

fn stage_of(value: &serde_json::Value) -> Option<Phase> {
    value
        .get("current_workflow_stage")
        .and_then(serde_json::Value::as_str)
        .map(Phase::new)
}

fn session_of(value: &serde_json::Value) -> Option<SessionId> {
    value
        .get("session_id")
        .and_then(serde_json::Value::as_str)
        .map(SessionId::new)
}

fn decode_detail(value: &serde_json::Value) -> ProgressDetail {
    match serde_json::from_value::<WorkflowInfo>(value.clone()) {
        Ok(info) => ProgressDetail::Workflow(info),
        Err(_) => ProgressDetail::Structured(value.clone()),
    }
}
