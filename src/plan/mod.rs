//! Planning problem definition, result decoding and validation

pub mod decoder;
pub mod problem;
pub mod solution;
pub mod validator;

pub use decoder::{decode_actions, decode_trajectory};
pub use problem::PlanningProblem;
pub use solution::{AppliedAction, PlanOutcome, PlanSolution, Trajectory};
pub use validator::{PlanValidator, ValidationReport, Violation};
