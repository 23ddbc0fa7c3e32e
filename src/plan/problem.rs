//! Planning problem definition

use super::decoder::{decode_actions, decode_trajectory};
use super::solution::{PlanOutcome, PlanSolution};
use super::validator::PlanValidator;
use crate::config::Settings;
use crate::error::{PlanError, PlanResult};
use crate::game::{load_level_from_file, GoalCondition, Level, RuleLibrary};
use crate::sat::{
    BackendFactory, Encoding, EncodingOptions, EncodingStatistics, Horizon, OptimizeOutcome,
    PlanEncoder, SolveOutcome, SolverAdapter, SolverOptions, Witness,
};
use anyhow::{Context, Result};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A level, the rules that rewrite it, and the goal to reach
pub struct PlanningProblem {
    level: Level,
    rules: RuleLibrary,
    goal: GoalCondition,
    horizon: Horizon,
    encoding_options: EncodingOptions,
    solver_options: SolverOptions,
    backend: Option<BackendFactory>,
}

impl PlanningProblem {
    /// Create a problem from settings, loading the level file
    pub fn new(settings: &Settings) -> Result<Self> {
        let level = load_level_from_file(&settings.board.level_file)
            .context("Failed to load level file")?;
        let rules = settings.rule_library().context("Failed to build rule library")?;

        Ok(Self::with_parts(
            level,
            rules,
            settings.goal_condition(),
            settings.horizon(),
            settings.encoding_options(),
            settings.solver_options(),
        ))
    }

    /// Create a problem from explicit parts (useful for testing)
    pub fn with_parts(
        level: Level,
        rules: RuleLibrary,
        goal: GoalCondition,
        horizon: Horizon,
        encoding_options: EncodingOptions,
        solver_options: SolverOptions,
    ) -> Self {
        Self {
            level,
            rules,
            goal,
            horizon,
            encoding_options,
            solver_options,
            backend: None,
        }
    }

    /// Solve with another backend than CaDiCaL
    pub fn with_backend(mut self, factory: BackendFactory) -> Self {
        self.backend = Some(factory);
        self
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn rules(&self) -> &RuleLibrary {
        &self.rules
    }

    pub fn goal(&self) -> &GoalCondition {
        &self.goal
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    /// Build the CNF without solving it
    pub fn encode(&self) -> PlanResult<Encoding> {
        PlanEncoder::new(&self.level, &self.rules, &self.goal, self.horizon, self.encoding_options)
            .encode()
    }

    pub fn encoding_statistics(&self) -> PlanResult<EncodingStatistics> {
        Ok(self.encode()?.statistics)
    }

    /// Encode, solve and decode.
    ///
    /// UNSAT and solver timeouts are outcomes. Errors are reserved for invalid
    /// inputs, exhausted adapter retries and witnesses that fail replay.
    pub fn solve(&self) -> PlanResult<PlanOutcome> {
        let start_time = Instant::now();
        let encoding = self.encode()?;
        let time_steps = encoding.time_steps;

        info!(
            width = self.level.width,
            height = self.level.height,
            time_steps,
            rules = self.rules.len(),
            goal = %self.goal,
            "solving planning problem"
        );

        let mut adapter = match &self.backend {
            Some(factory) => {
                SolverAdapter::with_factory(self.solver_options.clone(), factory.clone())
            }
            None => SolverAdapter::new(self.solver_options.clone()),
        };
        adapter.submit(encoding.clauses.clone())?;

        let (witness, plan_length, optimal) = match encoding.optimizer {
            None => match adapter.solve(&[])? {
                SolveOutcome::Sat(witness) => (witness, None, false),
                SolveOutcome::Unsat => return Ok(PlanOutcome::Infeasible { time_steps }),
                SolveOutcome::Unknown => return Ok(PlanOutcome::Unknown { time_steps }),
            },
            Some(optimizer) => match optimizer.minimize(&mut adapter, &encoding.variables)? {
                OptimizeOutcome::Found {
                    witness,
                    plan_length,
                    optimal,
                } => (witness, Some(plan_length), optimal),
                OptimizeOutcome::Infeasible => return Ok(PlanOutcome::Infeasible { time_steps }),
                OptimizeOutcome::Unknown => return Ok(PlanOutcome::Unknown { time_steps }),
            },
        };

        let solution =
            self.build_solution(&encoding, &witness, plan_length, optimal, &adapter, start_time)?;
        info!(
            steps = solution.steps(),
            optimal = solution.optimal,
            solve_time = solution.solve_time.as_secs_f64(),
            "plan found"
        );
        Ok(PlanOutcome::Solved(solution))
    }

    fn build_solution(
        &self,
        encoding: &Encoding,
        witness: &Witness,
        plan_length: Option<usize>,
        optimal: bool,
        adapter: &SolverAdapter,
        start_time: Instant,
    ) -> PlanResult<PlanSolution> {
        let trajectory = decode_trajectory(witness, &encoding.variables)?;
        let actions = decode_actions(witness, &encoding.variables, &self.rules)?;

        let initial = self.level.initial_state();
        let report = PlanValidator::new(&self.rules, &self.goal)
            .validate(&initial, &trajectory, plan_length);
        if !report.is_valid() {
            for violation in &report.violations {
                warn!(%violation, "plan failed replay");
            }
            return Err(PlanError::encoding(format!(
                "decoded plan failed replay with {} violation(s)",
                report.violations.len()
            )));
        }
        debug!(explained = report.explanations.len(), "plan replayed");

        Ok(PlanSolution {
            trajectory,
            plan_length,
            optimal,
            actions,
            solve_time: start_time.elapsed(),
            encoding: encoding.statistics.clone(),
            solver: adapter.statistics(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{parse_level_from_string, Cell, ObjectKind, StayPolicy};
    use crate::sat::{Clause, SatBackend, SolveStatus};
    use std::collections::HashMap;
    use std::sync::Arc;

    const WALK: &str = "#####\n#P..#\n#...#\n#...#\n#####\n";
    const PUSH: &str = "#######\n#.....#\n#.PC..#\n#.....#\n#.....#\n#.....#\n#######\n";
    const ENCLOSED: &str = "#######\n#.....#\n#..#..#\n#.#P#.#\n#..#..#\n#.....#\n#######\n";

    fn problem(
        level: &str,
        rules: RuleLibrary,
        goal: GoalCondition,
        horizon: Horizon,
    ) -> PlanningProblem {
        PlanningProblem::with_parts(
            parse_level_from_string(level).unwrap(),
            rules,
            goal,
            horizon,
            EncodingOptions::default(),
            SolverOptions::default(),
        )
    }

    fn standard() -> RuleLibrary {
        RuleLibrary::standard(StayPolicy::Forbidden).unwrap()
    }

    fn push_goal() -> GoalCondition {
        GoalCondition::all(vec![
            GoalCondition::object_at(5, 4, ObjectKind::Crate),
            GoalCondition::count(ObjectKind::Crate, 1),
        ])
    }

    struct ScriptedBackend {
        status: PlanResult<SolveStatus>,
    }

    impl SatBackend for ScriptedBackend {
        fn add(&mut self, _clause: &Clause) -> PlanResult<()> {
            Ok(())
        }

        fn check(&mut self, _assumptions: &[i32]) -> PlanResult<SolveStatus> {
            self.status.clone()
        }

        fn model(&self) -> HashMap<i32, bool> {
            HashMap::new()
        }
    }

    fn scripted(status: PlanResult<SolveStatus>) -> BackendFactory {
        Arc::new(move |_: &SolverOptions| -> PlanResult<Box<dyn SatBackend>> {
            Ok(Box::new(ScriptedBackend { status: status.clone() }))
        })
    }

    #[test]
    fn test_walk_is_minimised() {
        let goal = GoalCondition::object_at(3, 3, ObjectKind::Player);
        let outcome = problem(WALK, standard(), goal, Horizon::Minimize { max: 10 })
            .solve()
            .unwrap();

        let solution = outcome.into_solution().unwrap();
        assert_eq!(solution.plan_length, Some(4));
        assert!(solution.optimal);
        assert_eq!(solution.actions.len(), 4);
        assert_eq!(solution.trajectory.len(), 11);
        assert_eq!(solution.final_state().unwrap().get(Cell::new(3, 3)), Some(ObjectKind::Player));
    }

    #[test]
    fn test_push_reaches_goal_in_six_steps() {
        let outcome = problem(PUSH, standard(), push_goal(), Horizon::Minimize { max: 8 })
            .solve()
            .unwrap();

        let solution = outcome.into_solution().unwrap();
        assert_eq!(solution.plan_length, Some(6));
        assert!(solution.optimal);

        let last = solution.final_state().unwrap();
        assert_eq!(last.cells_with(ObjectKind::Crate), vec![Cell::new(5, 4)]);
        assert!(solution.actions.iter().any(|action| action.rule.starts_with("push")));
        for (step, action) in solution.actions.iter().enumerate() {
            assert_eq!(action.step, step + 1);
        }
    }

    #[test]
    fn test_push_with_fixed_horizon() {
        let outcome = problem(PUSH, standard(), push_goal(), Horizon::Fixed(7)).solve().unwrap();
        let solution = outcome.into_solution().unwrap();
        assert_eq!(solution.plan_length, None);
        assert!(!solution.optimal);
        assert_eq!(solution.steps(), 6);
        assert_eq!(solution.actions.len(), 6);
    }

    #[test]
    fn test_enclosed_level_is_infeasible() {
        let goal = GoalCondition::object_at(1, 1, ObjectKind::Player);

        let outcome = problem(ENCLOSED, standard(), goal.clone(), Horizon::Minimize { max: 6 })
            .solve()
            .unwrap();
        assert!(matches!(outcome, PlanOutcome::Infeasible { time_steps: 7 }));

        for time_steps in 2..=4 {
            let outcome = problem(ENCLOSED, standard(), goal.clone(), Horizon::Fixed(time_steps))
                .solve()
                .unwrap();
            assert!(
                matches!(outcome, PlanOutcome::Infeasible { .. }),
                "time_steps = {}",
                time_steps
            );
        }
    }

    #[test]
    fn test_identity_rule_pads_fixed_horizon() {
        let goal = GoalCondition::object_at(3, 3, ObjectKind::Player);
        let padded = RuleLibrary::moves_only(StayPolicy::IdentityRule).unwrap();

        let outcome = problem(WALK, padded, goal.clone(), Horizon::Fixed(8)).solve().unwrap();
        assert!(outcome.is_solved());

        let strict = RuleLibrary::moves_only(StayPolicy::Forbidden).unwrap();
        let outcome = problem(WALK, strict, goal, Horizon::Fixed(8)).solve().unwrap();
        assert!(matches!(outcome, PlanOutcome::Infeasible { time_steps: 8 }));
    }

    #[test]
    fn test_solver_timeout_is_unknown() {
        let goal = GoalCondition::object_at(3, 3, ObjectKind::Player);
        let outcome = problem(WALK, standard(), goal, Horizon::Minimize { max: 4 })
            .with_backend(scripted(Ok(SolveStatus::Unknown)))
            .solve()
            .unwrap();
        assert!(matches!(outcome, PlanOutcome::Unknown { time_steps: 5 }));
    }

    #[test]
    fn test_adapter_failure_is_an_error() {
        let goal = GoalCondition::object_at(3, 3, ObjectKind::Player);
        let result = problem(WALK, standard(), goal, Horizon::Fixed(5))
            .with_backend(scripted(Err(PlanError::adapter("solver crashed"))))
            .solve();
        assert!(matches!(result, Err(PlanError::AdapterFailure(_))));
    }

    #[test]
    fn test_invalid_goal_is_a_configuration_error() {
        let goal = GoalCondition::object_at(9, 9, ObjectKind::Player);
        let result = problem(WALK, standard(), goal, Horizon::Fixed(3)).solve();
        assert!(matches!(result, Err(PlanError::Configuration(_))));
    }

    #[test]
    fn test_repeated_solves_agree() {
        let goal = GoalCondition::object_at(3, 3, ObjectKind::Player);
        let problem = problem(WALK, standard(), goal, Horizon::Minimize { max: 6 });

        let first = problem.solve().unwrap().into_solution().unwrap();
        let second = problem.solve().unwrap().into_solution().unwrap();
        assert_eq!(first.plan_length, second.plan_length);
        assert_eq!(first.encoding.total_clauses, second.encoding.total_clauses);
    }

    #[test]
    fn test_from_settings() {
        let temp_dir = tempfile::tempdir().unwrap();
        let level_file = temp_dir.path().join("walk.txt");
        std::fs::write(&level_file, WALK).unwrap();

        let mut settings = Settings::default();
        settings.board.level_file = level_file;
        settings.goal = vec![GoalCondition::object_at(2, 1, ObjectKind::Player)];
        settings.planning.max_horizon = 3;

        let problem = PlanningProblem::new(&settings).unwrap();
        assert_eq!(problem.horizon(), Horizon::Minimize { max: 3 });
        assert_eq!(problem.rules().len(), 8);

        let solution = problem.solve().unwrap().into_solution().unwrap();
        assert_eq!(solution.plan_length, Some(1));
    }
}
