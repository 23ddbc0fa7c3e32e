//! Display and output formatting utilities

use crate::config::OutputFormat;
use crate::game::GridState;
use crate::plan::{PlanOutcome, PlanSolution};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One cell as an external renderer consumes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRecord {
    pub x: usize,
    pub y: usize,
    /// Colour of the cell's object kind
    pub c: String,
}

/// Every cell of one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub t: usize,
    pub cells: Vec<CellRecord>,
}

/// Format plans for display
pub struct PlanFormatter;

impl PlanFormatter {
    /// Format a plan for console output
    pub fn format_solution(solution: &PlanSolution, show_trajectory: bool) -> String {
        let mut output = String::new();

        output.push_str("=== Plan ===\n");
        output.push_str(&format!("Steps: {}\n", solution.steps()));
        if solution.plan_length.is_some() {
            let minimal = if solution.optimal { "yes" } else { "not proven" };
            output.push_str(&format!("Minimal: {}\n", minimal));
        }
        output.push_str(&format!("Solve Time: {:.3}s\n", solution.solve_time.as_secs_f64()));
        output.push_str("Actions:\n");
        for action in &solution.actions {
            output.push_str(&format!("  {}\n", action));
        }
        output.push('\n');

        if show_trajectory {
            output.push_str(&solution.format_trajectory());
        } else if let (Some(first), Some(last)) =
            (solution.initial_state(), solution.final_state())
        {
            output.push_str("Initial State:\n");
            output.push_str(&first.to_string());
            output.push('\n');
            output.push_str(&format!("Final State (after {} steps):\n", solution.steps()));
            output.push_str(&last.to_string());
        }

        output
    }

    /// Format a snapshot with coordinates
    pub fn format_state_with_coords(state: &GridState) -> String {
        let mut output = String::new();

        output.push_str("   ");
        for x in 0..state.width {
            output.push_str(&format!("{:2}", x % 10));
        }
        output.push('\n');

        for y in 0..state.height {
            output.push_str(&format!("{:2} ", y));
            for x in 0..state.width {
                let symbol = state.kind_at(x, y).map(|k| k.symbol()).unwrap_or(' ');
                output.push_str(&format!(" {}", symbol));
            }
            output.push('\n');
        }

        output
    }

    /// Per-timestep records of the plan, up to the goal state
    pub fn to_records(solution: &PlanSolution) -> Vec<StateRecord> {
        solution
            .plan_states()
            .iter()
            .enumerate()
            .map(|(t, state)| StateRecord {
                t,
                cells: state
                    .iter()
                    .map(|(cell, kind)| CellRecord {
                        x: cell.x,
                        y: cell.y,
                        c: kind.color().to_string(),
                    })
                    .collect(),
            })
            .collect()
    }

    /// Save a plan in `format`, returning the written file
    pub fn save_solution<P: AsRef<Path>>(
        solution: &PlanSolution,
        output_dir: P,
        format: OutputFormat,
    ) -> Result<PathBuf> {
        let output_dir = output_dir.as_ref();
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

        let path = match format {
            OutputFormat::Text => {
                let path = output_dir.join("plan.txt");
                std::fs::write(&path, Self::format_solution(solution, true))?;
                path
            }
            OutputFormat::Json => {
                let path = output_dir.join("plan.json");
                solution.save_to_file(&path)?;
                path
            }
            OutputFormat::Records => {
                let path = output_dir.join("plan_records.json");
                let json = serde_json::to_string_pretty(&Self::to_records(solution))?;
                std::fs::write(&path, json)?;
                path
            }
        };

        Ok(path)
    }

    /// One line per outcome, for logs and the CLI
    pub fn format_outcome(outcome: &PlanOutcome) -> String {
        match outcome {
            PlanOutcome::Solved(_) => ColorOutput::success(&outcome.to_string()),
            PlanOutcome::Infeasible { .. } => ColorOutput::warning(&outcome.to_string()),
            PlanOutcome::Unknown { .. } => ColorOutput::error(&outcome.to_string()),
        }
    }
}

/// Color output utilities
pub struct ColorOutput;

impl ColorOutput {
    /// Format text with color (if terminal supports it)
    pub fn colored(text: &str, color: Color) -> String {
        if Self::supports_color() {
            format!("\x1b[{}m{}\x1b[0m", color.code(), text)
        } else {
            text.to_string()
        }
    }

    /// Check if terminal supports color
    fn supports_color() -> bool {
        std::env::var("NO_COLOR").is_err() && (std::env::var("TERM").unwrap_or_default() != "dumb")
    }

    /// Format success message
    pub fn success(text: &str) -> String {
        Self::colored(text, Color::Green)
    }

    /// Format error message
    pub fn error(text: &str) -> String {
        Self::colored(text, Color::Red)
    }

    /// Format warning message
    pub fn warning(text: &str) -> String {
        Self::colored(text, Color::Yellow)
    }

    /// Format info message
    pub fn info(text: &str) -> String {
        Self::colored(text, Color::Blue)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
}

impl Color {
    fn code(self) -> u8 {
        match self {
            Color::Red => 31,
            Color::Green => 32,
            Color::Yellow => 33,
            Color::Blue => 34,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GoalCondition, Level, ObjectKind, RuleLibrary, StayPolicy};
    use crate::plan::PlanningProblem;
    use crate::sat::{EncodingOptions, Horizon, SolverOptions};
    use tempfile::tempdir;

    fn solved_walk() -> PlanSolution {
        let level = Level::new(4, 3)
            .with_border_walls()
            .with(1, 1, ObjectKind::Player)
            .unwrap();
        let problem = PlanningProblem::with_parts(
            level,
            RuleLibrary::moves_only(StayPolicy::Forbidden).unwrap(),
            GoalCondition::object_at(2, 1, ObjectKind::Player),
            Horizon::Minimize { max: 3 },
            EncodingOptions::default(),
            SolverOptions::default(),
        );
        problem.solve().unwrap().into_solution().unwrap()
    }

    #[test]
    fn test_state_formatting() {
        let state = Level::new(3, 3).with_border_walls().initial_state();
        let with_coords = PlanFormatter::format_state_with_coords(&state);
        assert!(with_coords.starts_with("    0 1 2"));
        assert!(with_coords.contains(" 1  # . #"));
    }

    #[test]
    fn test_records_cover_plan_states() {
        let solution = solved_walk();
        let records = PlanFormatter::to_records(&solution);

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].t, 1);
        assert_eq!(records[1].cells.len(), 12);
        let player = records[1].cells.iter().find(|r| r.x == 2 && r.y == 1).unwrap();
        assert_eq!(player.c, ObjectKind::Player.color());
    }

    #[test]
    fn test_save_in_every_format() {
        let temp_dir = tempdir().unwrap();
        let solution = solved_walk();

        for format in [OutputFormat::Text, OutputFormat::Json, OutputFormat::Records] {
            let path = PlanFormatter::save_solution(&solution, temp_dir.path(), format).unwrap();
            assert!(path.exists());
        }
        let loaded = PlanSolution::load_from_file(temp_dir.path().join("plan.json")).unwrap();
        assert_eq!(loaded.plan_length, Some(1));
    }

    #[test]
    fn test_color_output() {
        let colored = ColorOutput::colored("test", Color::Red);
        assert!(colored.contains("test"));

        let success = ColorOutput::success("OK");
        assert!(success.contains("OK"));
    }
}
