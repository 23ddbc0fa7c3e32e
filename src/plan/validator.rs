//! Replays a trajectory without a solver

use super::solution::{AppliedAction, Trajectory};
use crate::game::{Cell, GoalCondition, GridState, RuleLibrary};
use itertools::iproduct;
use std::fmt;

/// Checks a decoded plan step by step against the rules and the goal
pub struct PlanValidator<'a> {
    rules: &'a RuleLibrary,
    goal: &'a GoalCondition,
}

/// Something a replay found wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A snapshot has different dimensions from the initial one
    Dimensions { step: usize },
    /// The first snapshot is not the level's initial state
    WrongStart { changed: Vec<Cell> },
    /// No single rule application turns `step - 1` into `step`
    Unexplained { step: usize, changed: Vec<Cell> },
    /// The grid changed after the plan ended
    ChangedAfterEnd { step: usize },
    /// The goal does not hold where the plan ends
    GoalNotReached { step: usize },
    /// The plan length points past the trajectory
    LengthOutOfRange { plan_length: usize, states: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Dimensions { step } => {
                write!(f, "step {} changes the board dimensions", step)
            }
            Violation::WrongStart { changed } => {
                write!(f, "plan does not start at the level ({} cells differ)", changed.len())
            }
            Violation::Unexplained { step, changed } => {
                write!(
                    f,
                    "step {} is not one rule application ({} cells changed)",
                    step,
                    changed.len()
                )
            }
            Violation::ChangedAfterEnd { step } => {
                write!(f, "step {} changes the grid after the plan ended", step)
            }
            Violation::GoalNotReached { step } => write!(f, "goal does not hold at step {}", step),
            Violation::LengthOutOfRange { plan_length, states } => {
                write!(f, "plan length {} exceeds the {} snapshots", plan_length, states)
            }
        }
    }
}

/// Result of replaying a plan
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// The rule application explaining each replayed step
    pub explanations: Vec<AppliedAction>,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

impl<'a> PlanValidator<'a> {
    pub fn new(rules: &'a RuleLibrary, goal: &'a GoalCondition) -> Self {
        Self { rules, goal }
    }

    /// Replay `trajectory` from `initial`. With `plan_length`, steps after it must
    /// leave the grid unchanged.
    pub fn validate(
        &self,
        initial: &GridState,
        trajectory: &Trajectory,
        plan_length: Option<usize>,
    ) -> ValidationReport {
        let mut report = ValidationReport::default();
        let Some(first) = trajectory.get(0) else {
            report.violations.push(Violation::LengthOutOfRange {
                plan_length: plan_length.unwrap_or(0),
                states: 0,
            });
            return report;
        };

        if first.width != initial.width || first.height != initial.height {
            report.violations.push(Violation::Dimensions { step: 0 });
            return report;
        }
        if first != initial {
            report.violations.push(Violation::WrongStart {
                changed: initial.diff(first),
            });
        }

        let end = plan_length.unwrap_or(trajectory.len() - 1);
        if end >= trajectory.len() {
            report.violations.push(Violation::LengthOutOfRange {
                plan_length: end,
                states: trajectory.len(),
            });
            return report;
        }

        for (step, pair) in trajectory.states().windows(2).enumerate() {
            let step = step + 1;
            let (prev, next) = (&pair[0], &pair[1]);

            if next.width != initial.width || next.height != initial.height {
                report.violations.push(Violation::Dimensions { step });
                continue;
            }

            if step > end {
                if prev != next {
                    report.violations.push(Violation::ChangedAfterEnd { step });
                }
                continue;
            }

            match self.explain(step, prev, next) {
                Some(action) => report.explanations.push(action),
                None => report.violations.push(Violation::Unexplained {
                    step,
                    changed: prev.diff(next),
                }),
            }
        }

        if let Some(state) = trajectory.get(end) {
            if !self.goal.is_satisfied_by(state) {
                report.violations.push(Violation::GoalNotReached { step: end });
            }
        }
        report
    }

    /// The first `(rule, anchor)` whose application to `prev` yields exactly `next`
    pub fn explain(
        &self,
        step: usize,
        prev: &GridState,
        next: &GridState,
    ) -> Option<AppliedAction> {
        iproduct!(self.rules.iter(), 0..prev.height, 0..prev.width).find_map(|(rule, y, x)| {
            let anchor = Cell::new(x, y);
            let fired = rule.apply(prev, anchor)?;
            (fired == *next).then(|| AppliedAction {
                step,
                rule: rule.name.clone(),
                anchor,
            })
        })
    }
}
