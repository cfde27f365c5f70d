//! Simulated diagnosis backend
//!
//! Walks one job through the diagnosis stages, one stage per fetch. The
//! route is drawn from a seeded RNG so runs are reproducible: a textual
//! confidence decides whether follow-up questions are asked, and a coin flip
//! decides whether an image is analysed.

use dxflow_poller::StatusSource;
use dxflow_status::workflow::{average_confidence, WorkflowInfo};
use dxflow_status::{Phase, PollError, ProgressDetail, SessionId, WorkflowState};
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Duration;

/// Simulated backend settings
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub seed: u64,
    /// Probability that a fetch fails with a transient error
    pub failure_rate: f64,
    pub latency: Duration,
    pub confidence_threshold: f64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            failure_rate: 0.0,
            latency: Duration::from_millis(20),
            confidence_threshold: dxflow_status::workflow::DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
struct Stage {
    phase: &'static str,
    detail: Option<ProgressDetail>,
}

impl Stage {
    fn text(phase: &'static str, message: &str) -> Self {
        Self {
            phase,
            detail: Some(ProgressDetail::Text(message.to_string())),
        }
    }
}

#[derive(Debug)]
struct BackendState {
    rng: StdRng,
    plan: Vec<Stage>,
    cursor: usize,
    /// The first fetch finds no job registered yet
    registered: bool,
    fetches: u64,
    failures: u64,
}

/// One diagnosis job served over [`StatusSource`]
#[derive(Debug)]
pub struct SimulatedBackend {
    config: BackendConfig,
    state: Mutex<BackendState>,
}

impl SimulatedBackend {
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let plan = plan_route(&mut rng, config.confidence_threshold);
        tracing::debug!(stages = plan.len(), seed = config.seed, "planned simulated job");
        Self {
            config,
            state: Mutex::new(BackendState {
                rng,
                plan,
                cursor: 0,
                registered: false,
                fetches: 0,
                failures: 0,
            }),
        }
    }

    /// Phases this job will report, in order
    #[must_use]
    pub fn route(&self) -> Vec<Phase> {
        self.state
            .lock()
            .plan
            .iter()
            .map(|s| Phase::new(s.phase))
            .collect()
    }

    /// `(fetches, injected failures)` so far
    #[must_use]
    pub fn counters(&self) -> (u64, u64) {
        let state = self.state.lock();
        (state.fetches, state.failures)
    }

    fn respond(&self, session: &SessionId) -> Result<Option<WorkflowState>, PollError> {
        let mut state = self.state.lock();
        state.fetches += 1;

        if self.config.failure_rate > 0.0 && state.rng.gen_bool(self.config.failure_rate) {
            state.failures += 1;
            return Err(if state.rng.gen_bool(0.5) {
                PollError::Transport("connection reset by peer".to_string())
            } else {
                PollError::Backend {
                    status: 503,
                    message: "model server busy".to_string(),
                }
            });
        }

        if !state.registered {
            state.registered = true;
            return Ok(None);
        }

        let last = state.plan.len() - 1;
        let stage = state.plan[state.cursor.min(last)].clone();
        state.cursor = (state.cursor + 1).min(last);

        let mut snapshot = WorkflowState::new(stage.phase).with_session(session.clone());
        snapshot.progress_detail = stage.detail;
        Ok(Some(snapshot))
    }
}

#[async_trait::async_trait]
impl StatusSource for SimulatedBackend {
    async fn fetch(&self, session: &SessionId) -> Result<Option<WorkflowState>, PollError> {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
        self.respond(session)
    }
}

fn plan_route(rng: &mut StdRng, threshold: f64) -> Vec<Stage> {
    let scores: Vec<f64> = (0..3).map(|_| rng.gen_range(0.3..1.0)).collect();
    let confidence = average_confidence(&scores);
    let image_required = rng.gen_bool(0.3);
    let info = WorkflowInfo::after_textual_analysis(confidence, image_required, threshold);
    let needs_followup = confidence < threshold;

    let mut plan = vec![
        Stage::text(Phase::INITIALIZING, "Preparing session"),
        Stage::text(Phase::TEXTUAL_ANALYSIS, "Analyzing symptoms with AI..."),
        Stage {
            phase: Phase::TEXTUAL_ANALYSIS_COMPLETE,
            detail: Some(ProgressDetail::Workflow(info)),
        },
    ];
    if needs_followup {
        plan.push(Stage::text(
            Phase::AWAITING_FOLLOWUP_RESPONSES,
            "Processing follow-up interaction...",
        ));
        plan.push(Stage::text(
            Phase::FOLLOWUP_ANALYSIS_COMPLETE,
            "Follow-up diagnosis ready",
        ));
    }
    if image_required {
        plan.push(Stage::text(Phase::ANALYZING_IMAGE, "Classifying skin lesion image..."));
        plan.push(Stage::text(Phase::IMAGE_ANALYSIS_COMPLETE, "Image analysis complete"));
    }
    plan.extend([
        Stage::text(Phase::PERFORMING_OVERALL_ANALYSIS, "Combining all findings..."),
        Stage::text(Phase::OVERALL_ANALYSIS_COMPLETE, "Overall analysis complete"),
        Stage::text(Phase::HEALTHCARE_RECOMMENDATION, "Finding recommended care..."),
        Stage::text(
            Phase::HEALTHCARE_RECOMMENDATION_COMPLETE,
            "Recommendations ready",
        ),
        Stage::text(Phase::GENERATING_MEDICAL_REPORT, "Writing medical report..."),
        Stage {
            phase: Phase::WORKFLOW_COMPLETE,
            detail: Some(ProgressDetail::Workflow(WorkflowInfo::passthrough(
                Phase::new(Phase::WORKFLOW_COMPLETE),
            ))),
        },
    ]);
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(seed: u64) -> BackendConfig {
        BackendConfig {
            seed,
            latency: Duration::ZERO,
            ..BackendConfig::default()
        }
    }

    #[test]
    fn route_is_reproducible() {
        let a = SimulatedBackend::new(instant(7)).route();
        let b = SimulatedBackend::new(instant(7)).route();
        assert_eq!(a, b);
        assert_eq!(a.first(), Some(&Phase::new(Phase::INITIALIZING)));
        assert_eq!(a.last(), Some(&Phase::new(Phase::WORKFLOW_COMPLETE)));
    }

    #[tokio::test]
    async fn first_fetch_has_no_job_then_walks_route() {
        let backend = SimulatedBackend::new(instant(1));
        let session = SessionId::new("session_00000001");
        let route = backend.route();

        assert_eq!(backend.fetch(&session).await, Ok(None));
        for expected in &route {
            let state = backend.fetch(&session).await.unwrap().unwrap();
            assert_eq!(&state.phase, expected);
            assert_eq!(state.session_id.as_ref(), Some(&session));
        }
        // stays on the final stage
        let state = backend.fetch(&session).await.unwrap().unwrap();
        assert!(state.phase.is_terminal());
    }

    #[tokio::test]
    async fn failure_rate_one_always_fails() {
        let backend = SimulatedBackend::new(BackendConfig {
            failure_rate: 1.0,
            ..instant(3)
        });
        let session = SessionId::new("session_00000002");
        for _ in 0..5 {
            assert!(backend.fetch(&session).await.unwrap_err().is_retryable());
        }
        assert_eq!(backend.counters(), (5, 5));
    }
}
