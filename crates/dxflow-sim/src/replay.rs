//! Replay recorded backend push messages through a controller

use dxflow_status::{
    ControllerView, Observation, StatusError, StatusMessage, WorkflowStatusController,
};

/// Apply every status-bearing message in order; returns one view per applied message
pub fn replay_messages(
    messages: &[StatusMessage],
    controller: &mut WorkflowStatusController,
) -> Result<Vec<ControllerView>, StatusError> {
    let mut views = Vec::new();
    for message in messages {
        let Some(observation) = message.observation()? else {
            continue;
        };
        match observation {
            Observation::Unobserved => controller.observe(None),
            Observation::Observed(state) => controller.observe(Some(state)),
            Observation::Failed(reason) => controller.fail(reason),
        }
        views.push(controller.project());
    }
    Ok(views)
}

/// Decode newline-delimited JSON messages and replay them on a fresh controller
pub fn replay_json_lines(raw: &str) -> Result<Vec<ControllerView>, StatusError> {
    let messages = StatusMessage::from_json_lines(raw)?;
    let mut controller = WorkflowStatusController::new();
    replay_messages(&messages, &mut controller)
}
