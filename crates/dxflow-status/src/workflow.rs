//! Next-step records
//!
//! When a stage completes the backend attaches a [`WorkflowInfo`] telling the
//! client where the workflow goes next and whether the user must act.

use crate::types::Phase;
use serde::{Deserialize, Serialize};

/// Default confidence below which follow-up questions are required
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;

pub const FOLLOWUP_ENDPOINT: &str = "/patient/followup_questions";
pub const IMAGE_ANALYSIS_ENDPOINT: &str = "/patient/image_analysis";
pub const OVERALL_ANALYSIS_ENDPOINT: &str = "/patient/overall_analysis";

/// Input the workflow is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserInput {
    FollowupQuestions,
    ImageUpload,
}

/// Where the workflow goes after a completed stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_user_input: Option<UserInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_description: Option<String>,
    #[serde(default)]
    pub workflow_complete: bool,
    #[serde(default)]
    pub show_next_button: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_required: Option<bool>,
}

impl WorkflowInfo {
    /// Route the workflow once textual analysis has finished
    ///
    /// Low confidence asks follow-up questions first; otherwise an image is
    /// requested when required, and only then does overall analysis run.
    #[must_use]
    pub fn after_textual_analysis(confidence: f64, image_required: bool, threshold: f64) -> Self {
        let (endpoint, input, description) = if confidence < threshold {
            (
                FOLLOWUP_ENDPOINT,
                Some(UserInput::FollowupQuestions),
                "Follow-up questions needed to improve accuracy",
            )
        } else if image_required {
            (
                IMAGE_ANALYSIS_ENDPOINT,
                Some(UserInput::ImageUpload),
                "Image analysis required",
            )
        } else {
            (
                OVERALL_ANALYSIS_ENDPOINT,
                None,
                "Ready for comprehensive analysis",
            )
        };

        tracing::debug!(confidence, threshold, endpoint, "routed after textual analysis");

        Self {
            current_stage: Some(Phase::new(Phase::TEXTUAL_ANALYSIS_COMPLETE)),
            next_endpoint: Some(endpoint.to_string()),
            needs_user_input: input,
            next_step_description: Some(description.to_string()),
            workflow_complete: false,
            show_next_button: true,
            confidence_score: Some(confidence),
            image_required: Some(image_required),
        }
    }

    /// Record for a stage with no routing decision
    #[must_use]
    pub fn passthrough(stage: Phase) -> Self {
        let workflow_complete = stage.as_str() == Phase::WORKFLOW_COMPLETE;
        Self {
            current_stage: Some(stage),
            workflow_complete,
            ..Self::default()
        }
    }
}

/// Mean diagnosis confidence, 0.0 when there are no diagnoses
#[must_use]
pub fn average_confidence(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = scores.len() as f64;
    scores.iter().sum::<f64>() / count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_confidence_routes_to_followup() {
        let info = WorkflowInfo::after_textual_analysis(0.4, true, DEFAULT_CONFIDENCE_THRESHOLD);
        assert_eq!(info.next_endpoint.as_deref(), Some(FOLLOWUP_ENDPOINT));
        assert_eq!(info.needs_user_input, Some(UserInput::FollowupQuestions));
        assert!(info.show_next_button);
        assert!(!info.workflow_complete);
    }

    #[test]
    fn image_requirement_checked_after_confidence() {
        let info = WorkflowInfo::after_textual_analysis(0.9, true, DEFAULT_CONFIDENCE_THRESHOLD);
        assert_eq!(info.next_endpoint.as_deref(), Some(IMAGE_ANALYSIS_ENDPOINT));
        assert_eq!(info.needs_user_input, Some(UserInput::ImageUpload));
    }

    #[test]
    fn confident_without_image_goes_to_overall() {
        let info = WorkflowInfo::after_textual_analysis(0.6, false, DEFAULT_CONFIDENCE_THRESHOLD);
        assert_eq!(info.next_endpoint.as_deref(), Some(OVERALL_ANALYSIS_ENDPOINT));
        assert_eq!(info.needs_user_input, None);
        assert_eq!(
            info.current_stage,
            Some(Phase::new(Phase::TEXTUAL_ANALYSIS_COMPLETE))
        );
    }

    #[test]
    fn average_of_empty_is_zero() {
        assert!(average_confidence(&[]).abs() < f64::EPSILON);
        assert!((average_confidence(&[0.5, 0.7]) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn decodes_backend_record() {
        let json = r#"{
            "current_stage": "textual_analysis_complete",
            "next_endpoint": "/patient/overall_analysis",
            "needs_user_input": null,
            "next_step_description": "Ready for comprehensive analysis",
            "workflow_complete": false,
            "show_next_button": true,
            "confidence_score": 0.82,
            "image_required": false
        }"#;
        let info: WorkflowInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.confidence_score, Some(0.82));
        assert!(info.show_next_button);
    }
}
