//! dxflow Sim - simulated diagnosis backend and CLI support
//!
//! - [`SimulatedBackend`]: seeded, stage-by-stage diagnosis job
//! - [`run_simulation`]: full session against the simulated backend
//! - [`replay_json_lines`]: recorded push messages through a controller

#![allow(missing_docs)]

pub mod backend;
pub mod replay;
pub mod simulation;
pub mod telemetry;

pub use backend::{BackendConfig, SimulatedBackend};
pub use replay::{replay_json_lines, replay_messages};
pub use simulation::{run_simulation, SimulationConfig, SimulationOutcome, SimulationReport};
pub use telemetry::init_tracing;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
