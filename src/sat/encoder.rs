//! SAT encoder for grid-rewrite planning
//!
//! Assembles initial state, per-step transitions and the goal (or the plan
//! length objective) into one [`ConstraintSet`] and lowers it to CNF.

use super::constraints::{Clause, CnfLowering, Constraint, ConstraintSet, Literal};
use super::goal::GoalInjector;
use super::optimizer::PlanOptimizer;
use super::transition::{FrameEncoding, StepActivation, TransitionBuilder};
use super::variables::{Atom, VariableManager, VariableStatistics};
use crate::error::{PlanError, PlanResult};
use crate::game::{GoalCondition, Level, RuleLibrary};
use std::time::{Duration, Instant};
use tracing::info;

/// Which snapshots the goal is asserted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    /// `time_steps` snapshots; the plan is exactly `time_steps - 1` steps long
    Fixed(usize),
    /// Any plan length up to `max`, minimised by the optimizer
    Minimize { max: usize },
}

impl Horizon {
    pub fn time_steps(self) -> usize {
        match self {
            Horizon::Fixed(time_steps) => time_steps,
            Horizon::Minimize { max } => max + 1,
        }
    }
}

/// Encoding knobs that do not change the set of plans
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodingOptions {
    pub frame: FrameEncoding,
    /// Generate timesteps on the rayon pool
    pub parallel: bool,
}

/// A lowered encoding ready for the solver
#[derive(Debug)]
pub struct Encoding {
    pub variables: VariableManager,
    pub clauses: Vec<Clause>,
    pub time_steps: usize,
    pub optimizer: Option<PlanOptimizer>,
    pub statistics: EncodingStatistics,
}

/// Main SAT encoder for planning problems
pub struct PlanEncoder<'a> {
    level: &'a Level,
    rules: &'a RuleLibrary,
    goal: &'a GoalCondition,
    horizon: Horizon,
    options: EncodingOptions,
}

impl<'a> PlanEncoder<'a> {
    pub fn new(
        level: &'a Level,
        rules: &'a RuleLibrary,
        goal: &'a GoalCondition,
        horizon: Horizon,
        options: EncodingOptions,
    ) -> Self {
        Self {
            level,
            rules,
            goal,
            horizon,
            options,
        }
    }

    /// Fail fast on inconsistent inputs, before anything reaches a solver
    pub fn validate(&self) -> PlanResult<()> {
        self.level.validate()?;
        self.rules.validate_for_board(self.level.width, self.level.height)?;
        self.goal.validate(self.level.width, self.level.height)?;
        if let Horizon::Fixed(0) = self.horizon {
            return Err(PlanError::configuration("horizon must include the initial snapshot"));
        }
        Ok(())
    }

    /// Build and lower the whole encoding
    pub fn encode(&self) -> PlanResult<Encoding> {
        self.validate()?;
        let start_time = Instant::now();

        let (width, height) = (self.level.width, self.level.height);
        let time_steps = self.horizon.time_steps();
        let builder = TransitionBuilder::new(self.rules, width, height, self.options.frame);

        let parallel = self.options.parallel;
        let mut set = self.initial_constraints().merge(builder.domain_constraints(0));
        let optimizer = match self.horizon {
            Horizon::Fixed(_) => {
                let terminal = time_steps - 1;
                let steps = builder.all_steps(time_steps, |_| StepActivation::Always, parallel)?;
                let injector = GoalInjector::new(self.goal, width, height);
                set = set
                    .merge(steps)
                    .merge(injector.inject_terminal(terminal, &builder.candidates(terminal)));
                None
            }
            Horizon::Minimize { max } => {
                let optimizer = PlanOptimizer::new(max);
                let steps = builder.all_steps(time_steps, PlanOptimizer::activation, parallel)?;
                set = set
                    .merge(steps)
                    .merge(optimizer.length_constraints())
                    .merge(optimizer.goal_constraints(self.goal, width, height));
                Some(optimizer)
            }
        };

        let mut variables = VariableManager::new(width, height, time_steps);
        let constraint_count = set.len();
        let clauses = CnfLowering::new(&mut variables).lower(&set)?;

        let statistics = EncodingStatistics {
            grid_width: width,
            grid_height: height,
            time_steps,
            rules: self.rules.len(),
            candidates_per_step: builder.candidates(1).len(),
            constraints: constraint_count,
            total_clauses: clauses.len(),
            variables: variables.statistics(),
            frame: self.options.frame,
            optimized: optimizer.is_some(),
            build_time: start_time.elapsed(),
        };
        info!(
            variables = statistics.variables.total_variables,
            clauses = statistics.total_clauses,
            time_steps,
            "encoding built"
        );

        Ok(Encoding {
            variables,
            clauses,
            time_steps,
            optimizer,
            statistics,
        })
    }

    /// `cellVar(x, y, 0) == level[x, y]` for every cell
    fn initial_constraints(&self) -> ConstraintSet {
        self.level
            .initial_state()
            .iter()
            .map(|(cell, kind)| Constraint::unit(Literal::pos(Atom::cell(cell, 0, kind))))
            .collect()
    }
}

/// Statistics about the SAT encoding
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EncodingStatistics {
    pub grid_width: usize,
    pub grid_height: usize,
    pub time_steps: usize,
    pub rules: usize,
    pub candidates_per_step: usize,
    pub constraints: usize,
    pub total_clauses: usize,
    pub variables: VariableStatistics,
    pub frame: FrameEncoding,
    pub optimized: bool,
    pub build_time: Duration,
}

impl std::fmt::Display for EncodingStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SAT Encoding Statistics:")?;
        writeln!(f, "  Grid: {}x{}", self.grid_width, self.grid_height)?;
        writeln!(f, "  Time steps: {}", self.time_steps)?;
        writeln!(f, "  Rules: {}", self.rules)?;
        writeln!(f, "  Candidates per step: {}", self.candidates_per_step)?;
        writeln!(f, "  Constraints: {}", self.constraints)?;
        writeln!(f, "  Total clauses: {}", self.total_clauses)?;
        writeln!(f, "  Total variables: {}", self.variables.total_variables)?;
        writeln!(f, "  Frame encoding: {:?}", self.frame)?;
        writeln!(f, "  Plan length minimised: {}", self.optimized)?;
        writeln!(f, "  Build time: {:.3}s", self.build_time.as_secs_f64())?;
        Ok(())
    }
}
