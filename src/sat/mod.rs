//! SAT encoding and solving for grid-rewrite planning

pub mod constraints;
pub mod encoder;
pub mod goal;
pub mod optimizer;
pub mod solver;
pub mod transition;
pub mod variables;

pub use constraints::{Clause, CnfLowering, Constraint, ConstraintSet, Literal};
pub use encoder::{Encoding, EncodingOptions, EncodingStatistics, Horizon, PlanEncoder};
pub use goal::GoalInjector;
pub use optimizer::{OptimizeOutcome, PlanOptimizer};
pub use solver::{
    BackendFactory, SatBackend, SatSolver, SolveOutcome, SolveStatus, SolverAdapter, SolverOptions,
    SolverStatistics, Witness,
};
pub use transition::{
    candidate_applications, CandidateApplication, FrameEncoding, StepActivation, TransitionBuilder,
};
pub use variables::{Atom, VariableManager, VariableStatistics};
