//! End-to-end simulation
//!
//! Runs a [`StatusSession`] against a [`SimulatedBackend`] and records every
//! projection the view would have rendered.

use crate::backend::{BackendConfig, SimulatedBackend};
use dxflow_poller::{SessionStats, StatusSession};
use dxflow_status::{ControllerView, DisplayPhase, FailureReason, Phase, SessionId, StatusConfig};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Simulation settings
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub backend: BackendConfig,
    pub status: StatusConfig,
    /// Press "start over" once after this many projections
    pub restart_after: Option<usize>,
    /// Give up waiting after this long
    pub deadline: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            status: StatusConfig::default(),
            restart_after: None,
            deadline: Duration::from_secs(120),
        }
    }
}

/// How the simulated job ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SimulationOutcome {
    Completed { phase: Phase },
    Failed { reason: FailureReason },
    DeadlineExceeded,
}

/// Result of one simulated session
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub session: SessionId,
    pub route: Vec<Phase>,
    pub views: Vec<ControllerView>,
    pub outcome: SimulationOutcome,
    pub stats: SessionStats,
    pub fetches: u64,
    pub injected_failures: u64,
}

impl SimulationReport {
    /// Job completed
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self.outcome, SimulationOutcome::Completed { .. })
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== dxflow Simulation Report ===\n\n");
        report.push_str(&format!("Session: {}\n", self.session));
        report.push_str(&format!("Projections rendered: {}\n", self.views.len()));
        report.push_str(&format!("Fetches: {}\n", self.fetches));
        report.push_str(&format!("Injected failures: {}\n", self.injected_failures));
        report.push_str(&format!("Events applied: {}\n", self.stats.events_applied));
        report.push_str(&format!("Events discarded: {}\n", self.stats.events_discarded));
        report.push_str(&format!("Restarts: {}\n", self.stats.restarts));
        report.push_str(&format!(
            "Outcome: {}\n",
            match &self.outcome {
                SimulationOutcome::Completed { phase } => format!("COMPLETED ({phase})"),
                SimulationOutcome::Failed { reason } => format!("FAILED ({reason})"),
                SimulationOutcome::DeadlineExceeded => "DEADLINE EXCEEDED".to_string(),
            }
        ));

        report
    }
}

/// Outcome once `view` shows the job has stopped, `None` while it runs
///
/// Error phases reported by the backend count as failures even though no
/// fetch failed.
fn settled_outcome(view: &ControllerView) -> Option<SimulationOutcome> {
    if let Some(reason) = &view.failure {
        return Some(SimulationOutcome::Failed {
            reason: reason.clone(),
        });
    }
    match &view.display_phase {
        DisplayPhase::Phase(phase) if phase.is_error() => Some(SimulationOutcome::Failed {
            reason: FailureReason::new(format!("backend reported {phase}"), true),
        }),
        DisplayPhase::Phase(phase) if phase.is_terminal() => Some(SimulationOutcome::Completed {
            phase: phase.clone(),
        }),
        _ => None,
    }
}

/// Drive one session until the job completes, fails, or the deadline passes
///
/// `on_view` is called with every projection as it is published.
pub async fn run_simulation<F>(config: SimulationConfig, mut on_view: F) -> SimulationReport
where
    F: FnMut(&ControllerView),
{
    let backend = Arc::new(SimulatedBackend::new(config.backend.clone()));
    let route = backend.route();
    let session_id = SessionId::generate();
    let (session, handle) =
        StatusSession::new(backend.clone(), session_id.clone(), config.status.clone());
    let task = tokio::spawn(session.run());

    let mut views_rx = handle.subscribe();
    let mut views = Vec::new();
    let mut restart_pending = config.restart_after;

    let watch = async {
        loop {
            if views_rx.changed().await.is_err() {
                return SimulationOutcome::DeadlineExceeded;
            }
            let view = views_rx.borrow_and_update().clone();
            on_view(&view);
            views.push(view.clone());

            if restart_pending.is_some_and(|after| views.len() >= after) {
                restart_pending = None;
                if handle.start_over().await.is_err() {
                    return SimulationOutcome::DeadlineExceeded;
                }
                continue;
            }

            if let Some(outcome) = settled_outcome(&view) {
                return outcome;
            }
        }
    };

    let outcome = tokio::time::timeout(config.deadline, watch)
        .await
        .unwrap_or(SimulationOutcome::DeadlineExceeded);

    if handle.shutdown().await.is_err() {
        tracing::warn!("session stopped before shutdown was requested");
    }
    let stats = match task.await {
        Ok(report) => report.stats,
        Err(err) => {
            tracing::error!(error = %err, "session task failed");
            SessionStats::default()
        }
    };
    let (fetches, injected_failures) = backend.counters();

    SimulationReport {
        session: session_id,
        route,
        views,
        outcome,
        stats,
        fetches,
        injected_failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxflow_status::{Observation, WorkflowState};
    use pretty_assertions::assert_eq;

    fn observed(phase: &str) -> ControllerView {
        ControllerView::project(&Observation::Observed(WorkflowState::new(phase)), false)
    }

    #[test]
    fn running_phase_is_not_settled() {
        assert_eq!(settled_outcome(&observed(Phase::ANALYZING_IMAGE)), None);
        assert_eq!(settled_outcome(&ControllerView::initial(true)), None);
    }

    #[test]
    fn workflow_complete_is_completed() {
        assert_eq!(
            settled_outcome(&observed(Phase::WORKFLOW_COMPLETE)),
            Some(SimulationOutcome::Completed {
                phase: Phase::new(Phase::WORKFLOW_COMPLETE)
            })
        );
    }

    #[test]
    fn error_phases_fail_the_run() {
        for phase in [Phase::FAILED, "image_analysis_error"] {
            let Some(SimulationOutcome::Failed { reason }) = settled_outcome(&observed(phase))
            else {
                panic!("{phase} should fail the run");
            };
            assert_eq!(reason.message, format!("backend reported {phase}"));
        }
    }

    #[test]
    fn fetch_failure_keeps_its_reason() {
        let reason = FailureReason::new("backend returned 503", true).with_attempts(4);
        let view = ControllerView::project(&Observation::Failed(reason.clone()), false);
        assert_eq!(
            settled_outcome(&view),
            Some(SimulationOutcome::Failed { reason })
        );
    }
}
