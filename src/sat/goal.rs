//! Goal injection: ties the goal predicate to the terminal snapshot

use super::constraints::{Constraint, ConstraintSet, Literal};
use super::transition::CandidateApplication;
use super::variables::Atom;
use crate::game::{Cell, GoalCondition, ObjectKind};
use itertools::iproduct;

pub struct GoalInjector<'a> {
    goal: &'a GoalCondition,
    width: usize,
    height: usize,
}

impl<'a> GoalInjector<'a> {
    pub fn new(goal: &'a GoalCondition, width: usize, height: usize) -> Self {
        Self { goal, width, height }
    }

    /// `GoalHolds(t) => goal(GridState[t])`
    pub fn goal_at(&self, t: usize) -> ConstraintSet {
        let guard = Literal::pos(Atom::GoalHolds { t });
        self.encode(self.goal, t, guard, ConstraintSet::new())
    }

    fn encode(
        &self,
        goal: &GoalCondition,
        t: usize,
        guard: Literal,
        set: ConstraintSet,
    ) -> ConstraintSet {
        match goal {
            GoalCondition::ObjectAt { x, y, kind } => {
                let atom = Atom::cell(Cell::new(*x, *y), t, *kind);
                set.add(Constraint::implies(guard, Literal::pos(atom)))
            }
            GoalCondition::Count { kind, exactly } => set.add(Constraint::Count {
                guard: Some(guard),
                literals: self.cells_holding(*kind, t),
                exactly: *exactly,
            }),
            GoalCondition::All(goals) => goals
                .iter()
                .fold(set, |set, goal| self.encode(goal, t, guard, set)),
        }
    }

    fn cells_holding(&self, kind: ObjectKind, t: usize) -> Vec<Literal> {
        iproduct!(0..self.height, 0..self.width)
            .map(|(y, x)| Literal::pos(Atom::cell(Cell::new(x, y), t, kind)))
            .collect()
    }

    /// Specialise the candidates of terminal step `t` to the goal.
    ///
    /// A candidate that writes a kind contrary to the goal into a goal cell can
    /// never be the last action and is ruled out. Every other candidate, once
    /// selected, requires the goal on its post-state. With no candidates (a
    /// single-snapshot horizon) the goal must hold on the initial state.
    pub fn inject_terminal(&self, t: usize, candidates: &[CandidateApplication]) -> ConstraintSet {
        let holds = Literal::pos(Atom::GoalHolds { t });
        let set = self.goal_at(t);

        if candidates.is_empty() {
            return set.add(Constraint::unit(holds));
        }

        set.extend(candidates.iter().map(|candidate| {
            let selected = Literal::pos(candidate.selector());
            if contradicts(self.goal, candidate) {
                Constraint::unit(!selected)
            } else {
                Constraint::implies(selected, holds)
            }
        }))
    }
}

/// Whether firing `candidate` overwrites a goal cell with the wrong kind
fn contradicts(goal: &GoalCondition, candidate: &CandidateApplication) -> bool {
    match goal {
        GoalCondition::ObjectAt { x, y, kind } => candidate
            .writes(Cell::new(*x, *y))
            .is_some_and(|written| written != *kind),
        GoalCondition::Count { .. } => false,
        GoalCondition::All(goals) => goals.iter().any(|g| contradicts(g, candidate)),
    }
}
