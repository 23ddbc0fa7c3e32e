//! Plan outcomes and solutions

use crate::game::{Cell, GridState};
use crate::sat::{EncodingStatistics, SolverStatistics};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Ordered snapshots, `states[0]` being the initial level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trajectory {
    states: Vec<GridState>,
}

impl Trajectory {
    pub fn new(states: Vec<GridState>) -> Self {
        Self { states }
    }

    pub fn states(&self) -> &[GridState] {
        &self.states
    }

    pub fn get(&self, t: usize) -> Option<&GridState> {
        self.states.get(t)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GridState> {
        self.states.iter()
    }
}

/// One rule firing recovered from the witness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedAction {
    /// The step from `step - 1` to `step`
    pub step: usize,
    pub rule: String,
    pub anchor: Cell,
}

impl fmt::Display for AppliedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {}: {} at {}", self.step, self.rule, self.anchor)
    }
}

/// A plan found by the solver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSolution {
    /// Every encoded snapshot; after `plan_length` the grid is frozen
    pub trajectory: Trajectory,
    /// Set when the plan length was minimised
    pub plan_length: Option<usize>,
    /// False when minimisation was cut short by the timeout
    pub optimal: bool,
    pub actions: Vec<AppliedAction>,
    pub solve_time: Duration,
    pub encoding: EncodingStatistics,
    pub solver: SolverStatistics,
}

impl PlanSolution {
    /// Number of rule firings in the plan
    pub fn steps(&self) -> usize {
        self.plan_length
            .unwrap_or_else(|| self.trajectory.len().saturating_sub(1))
    }

    /// Snapshots from the initial state up to the goal state
    pub fn plan_states(&self) -> &[GridState] {
        let states = self.trajectory.states();
        &states[..(self.steps() + 1).min(states.len())]
    }

    pub fn initial_state(&self) -> Option<&GridState> {
        self.trajectory.get(0)
    }

    /// The snapshot the goal holds on
    pub fn final_state(&self) -> Option<&GridState> {
        self.plan_states().last()
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Create from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Save to file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }

    /// Per-step text rendering of the plan
    pub fn format_trajectory(&self) -> String {
        let mut result = String::new();
        result.push_str(&format!("Plan of {} steps", self.steps()));
        if self.plan_length.is_some() {
            result.push_str(if self.optimal { " (minimal)" } else { " (not proven minimal)" });
        }
        result.push_str(&format!(", solve time {:.3}s\n\n", self.solve_time.as_secs_f64()));

        for (t, state) in self.plan_states().iter().enumerate() {
            match t.checked_sub(1).and_then(|i| self.actions.get(i)) {
                Some(action) => {
                    result.push_str(&format!("t={} ({} at {})\n", t, action.rule, action.anchor))
                }
                None => result.push_str(&format!("t={}\n", t)),
            }
            result.push_str(&state.to_string());
            result.push('\n');
        }
        result
    }
}

/// Terminal result of a planning run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanOutcome {
    Solved(PlanSolution),
    /// UNSAT: no plan exists within the horizon
    Infeasible { time_steps: usize },
    /// The solver gave up before an answer
    Unknown { time_steps: usize },
}

impl PlanOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, PlanOutcome::Solved(_))
    }

    pub fn solution(&self) -> Option<&PlanSolution> {
        match self {
            PlanOutcome::Solved(solution) => Some(solution),
            _ => None,
        }
    }

    pub fn into_solution(self) -> Option<PlanSolution> {
        match self {
            PlanOutcome::Solved(solution) => Some(solution),
            _ => None,
        }
    }
}

impl fmt::Display for PlanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanOutcome::Solved(solution) => match solution.plan_length {
                Some(length) if solution.optimal => {
                    write!(f, "solved: minimal plan of {} steps", length)
                }
                Some(length) => {
                    write!(f, "solved: plan of {} steps (minimality not proven)", length)
                }
                None => write!(f, "solved: plan of {} steps", solution.steps()),
            },
            PlanOutcome::Infeasible { time_steps } => {
                write!(f, "infeasible: no plan within {} time steps", time_steps)
            }
            PlanOutcome::Unknown { time_steps } => {
                write!(f, "unknown: solver gave up on {} time steps", time_steps)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Level, ObjectKind, RuleLibrary, StayPolicy};
    use crate::sat::{FrameEncoding, VariableStatistics};
    use tempfile::tempdir;

    fn sample_solution(plan_length: Option<usize>) -> PlanSolution {
        let rules = RuleLibrary::moves_only(StayPolicy::Forbidden).unwrap();
        let move_e = rules.find("move-e").unwrap();
        let s0 = Level::new(4, 3)
            .with_border_walls()
            .with(1, 1, ObjectKind::Player)
            .unwrap()
            .initial_state();
        let s1 = move_e.apply(&s0, Cell::new(1, 1)).unwrap();

        PlanSolution {
            trajectory: Trajectory::new(vec![s0, s1.clone(), s1]),
            plan_length,
            optimal: true,
            actions: vec![AppliedAction {
                step: 1,
                rule: "move-e".to_string(),
                anchor: Cell::new(1, 1),
            }],
            solve_time: Duration::from_millis(12),
            encoding: EncodingStatistics {
                grid_width: 4,
                grid_height: 3,
                time_steps: 3,
                rules: 4,
                candidates_per_step: 16,
                constraints: 0,
                total_clauses: 0,
                variables: VariableStatistics::default(),
                frame: FrameEncoding::Explanatory,
                optimized: plan_length.is_some(),
                build_time: Duration::ZERO,
            },
            solver: SolverStatistics::default(),
        }
    }

    #[test]
    fn test_plan_states_stop_at_plan_length() {
        let solution = sample_solution(Some(1));
        assert_eq!(solution.steps(), 1);
        assert_eq!(solution.plan_states().len(), 2);
        assert_eq!(solution.final_state().unwrap().kind_at(2, 1), Some(ObjectKind::Player));

        let fixed = sample_solution(None);
        assert_eq!(fixed.steps(), 2);
        assert_eq!(fixed.plan_states().len(), 3);
    }

    #[test]
    fn test_json_round_trip() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("plan.json");

        let solution = sample_solution(Some(1));
        solution.save_to_file(&path).unwrap();
        let loaded = PlanSolution::load_from_file(&path).unwrap();

        assert_eq!(loaded.trajectory, solution.trajectory);
        assert_eq!(loaded.actions, solution.actions);
        assert_eq!(loaded.plan_length, Some(1));
    }

    #[test]
    fn test_load_rejects_truncated_snapshot() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("plan.json");

        let json = sample_solution(Some(1)).to_json().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["trajectory"][1]["cells"] = serde_json::json!(["wall"]);
        std::fs::write(&path, value.to_string()).unwrap();

        assert!(PlanSolution::load_from_file(&path).is_err());
    }

    #[test]
    fn test_outcome_serialises_status() {
        let json = serde_json::to_string(&PlanOutcome::Infeasible { time_steps: 5 }).unwrap();
        assert_eq!(json, r#"{"status":"infeasible","time_steps":5}"#);
        assert!(!PlanOutcome::Unknown { time_steps: 5 }.is_solved());
        assert!(PlanOutcome::Solved(sample_solution(Some(1))).is_solved());
    }

    #[test]
    fn test_format_trajectory_names_actions() {
        let text = sample_solution(Some(1)).format_trajectory();
        assert!(text.starts_with("Plan of 1 steps (minimal)"));
        assert!(text.contains("t=1 (move-e at (1, 1))"));
        assert!(text.contains("#.P#"));
    }
}
