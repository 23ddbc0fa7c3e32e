//! Sokoban SAT Planner
//!
//! Encodes grid-rewrite rules (player moves, crate pushes and user-defined
//! patterns) over a bounded horizon as a SAT problem, solves it with CaDiCaL and
//! decodes the witness back into a replayable plan. The plan length can be fixed
//! or minimised.

pub mod config;
pub mod error;
pub mod game;
pub mod plan;
pub mod sat;
pub mod utils;

pub use config::Settings;
pub use error::{PlanError, PlanResult};
pub use plan::{PlanOutcome, PlanSolution, PlanningProblem};

use anyhow::Result;

/// Main entry point for planning from a configuration
pub fn plan(settings: &Settings) -> Result<PlanOutcome> {
    let problem = PlanningProblem::new(settings)?;
    Ok(problem.solve()?)
}
