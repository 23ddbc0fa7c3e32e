//! Transition constraints: exactly one rule application per timestep
//!
//! Candidate generation is a pure function of a rule and the board, so it can be
//! unit tested and run per timestep on separate workers. The builder turns the
//! candidates of one step into a [`ConstraintSet`]; sets for different steps are
//! merged before anything reaches a solver.

use super::constraints::{Constraint, ConstraintSet, Literal};
use super::variables::Atom;
use crate::error::{PlanError, PlanResult};
use crate::game::{Cell, ObjectKind, Rule, RuleId, RuleLibrary};
use itertools::iproduct;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One way rule `rule` can fire with its anchor on `anchor` between `t - 1` and `t`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateApplication {
    pub rule: RuleId,
    pub anchor: Cell,
    pub t: usize,
    /// Absolute cells touched by the pattern, in pattern order
    pub affected: Vec<Cell>,
    /// `cellVar(cell, t - 1) == required` for every pattern entry
    pub lhs: Vec<Atom>,
    /// `cellVar(cell, t) == replacement` for every pattern entry
    pub rhs: Vec<Atom>,
}

impl CandidateApplication {
    pub fn selector(&self) -> Atom {
        Atom::Selected {
            rule: self.rule,
            anchor: self.anchor,
            t: self.t,
        }
    }

    pub fn touches(&self, cell: Cell) -> bool {
        self.affected.contains(&cell)
    }

    /// Kind this application writes into `cell`, if it touches it
    pub fn writes(&self, cell: Cell) -> Option<ObjectKind> {
        self.rhs.iter().find_map(|atom| match *atom {
            Atom::CellIs { cell: c, kind, .. } if c == cell => Some(kind),
            _ => None,
        })
    }
}

/// Every in-bounds application of `rule` on a `width x height` board at step `t`.
///
/// Anchors whose pattern would reach outside the board are not offered. Step 0
/// has no predecessor and yields nothing.
pub fn candidate_applications(
    rule: &Rule,
    width: usize,
    height: usize,
    t: usize,
) -> Vec<CandidateApplication> {
    if t == 0 {
        return Vec::new();
    }

    iproduct!(0..height, 0..width)
        .filter_map(|(y, x)| {
            let anchor = Cell::new(x, y);
            let affected: Vec<Cell> = rule
                .pattern
                .iter()
                .map(|entry| anchor.offset(entry.dx, entry.dy, width, height))
                .collect::<Option<_>>()?;

            let lhs = affected
                .iter()
                .zip(&rule.pattern)
                .map(|(&cell, entry)| Atom::cell(cell, t - 1, entry.kind))
                .collect();
            let rhs = affected
                .iter()
                .zip(&rule.replacement)
                .map(|(&cell, &kind)| Atom::cell(cell, t, kind))
                .collect();

            Some(CandidateApplication {
                rule: rule.id,
                anchor,
                t,
                affected,
                lhs,
                rhs,
            })
        })
        .collect()
}

/// How untouched cells are pinned to their previous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameEncoding {
    /// Per candidate: `selected => cellVar(c, t) == cellVar(c, t - 1)` for every
    /// cell outside its affected set.
    Classical,
    /// Per cell: a cell may only change if a selected candidate touches it.
    /// Equivalent to `Classical` under exactly-one selection and much smaller.
    #[default]
    Explanatory,
}

/// Whether a step must fire a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepActivation {
    /// The step is part of the plan: exactly one candidate fires.
    Always,
    /// Exactly one candidate fires when the literal holds; otherwise no
    /// candidate fires and every cell persists.
    When(Literal),
}

/// Builds domain and transition constraints for a fixed board and rule library
pub struct TransitionBuilder<'a> {
    rules: &'a RuleLibrary,
    width: usize,
    height: usize,
    frame: FrameEncoding,
}

impl<'a> TransitionBuilder<'a> {
    pub fn new(rules: &'a RuleLibrary, width: usize, height: usize, frame: FrameEncoding) -> Self {
        Self {
            rules,
            width,
            height,
            frame,
        }
    }

    fn cells(&self) -> impl Iterator<Item = Cell> {
        let width = self.width;
        iproduct!(0..self.height, 0..width).map(|(y, x)| Cell::new(x, y))
    }

    /// All candidates of every rule at step `t`, rule by rule
    pub fn candidates(&self, t: usize) -> Vec<CandidateApplication> {
        self.rules
            .iter()
            .flat_map(|rule| candidate_applications(rule, self.width, self.height, t))
            .collect()
    }

    /// Every cell holds exactly one kind at snapshot `t`
    pub fn domain_constraints(&self, t: usize) -> ConstraintSet {
        self.cells()
            .map(|cell| {
                Constraint::ExactlyOne(
                    ObjectKind::ALL
                        .iter()
                        .map(|&kind| Literal::pos(Atom::cell(cell, t, kind)))
                        .collect(),
                )
            })
            .collect()
    }

    /// Constraints for the step from `t - 1` to `t`
    pub fn step_constraints(
        &self,
        t: usize,
        activation: StepActivation,
    ) -> PlanResult<ConstraintSet> {
        if t == 0 {
            return Err(PlanError::encoding("step 0 has no predecessor"));
        }
        let candidates = self.candidates(t);
        if candidates.is_empty() {
            return Err(PlanError::configuration(format!(
                "no rule application fits on a {}x{} board",
                self.width, self.height
            )));
        }

        let selectors: Vec<Literal> =
            candidates.iter().map(|c| Literal::pos(c.selector())).collect();
        let mut set = self.domain_constraints(t);

        // Exactly one selected candidate, or none when the step is inactive
        set = match activation {
            StepActivation::Always => set.add(Constraint::ExactlyOne(selectors.clone())),
            StepActivation::When(active) => {
                let mut at_least_one = vec![!active];
                at_least_one.extend(selectors.iter().copied());
                set.add(Constraint::Clause(at_least_one))
                    .add(Constraint::AtMostOne(selectors.clone()))
                    .extend(selectors.iter().map(|&s| Constraint::implies(s, active)))
                    .merge(self.persist_unless(t, active))
            }
        };

        // selected => lhs and rhs
        for candidate in &candidates {
            let selected = Literal::pos(candidate.selector());
            set = set.extend(
                candidate
                    .lhs
                    .iter()
                    .chain(&candidate.rhs)
                    .map(|&atom| Constraint::implies(selected, Literal::pos(atom))),
            );
        }

        set = match self.frame {
            FrameEncoding::Classical => set.merge(self.classical_frame(t, &candidates)),
            FrameEncoding::Explanatory => set.merge(self.explanatory_frame(t, &candidates)),
        };

        debug!(timestep = t, candidates = candidates.len(), constraints = set.len(), "built step");
        Ok(set)
    }

    /// Constraints for steps `1..time_steps`, generated per step and merged in step order
    pub fn all_steps(
        &self,
        time_steps: usize,
        activation: impl Fn(usize) -> StepActivation + Sync,
        parallel: bool,
    ) -> PlanResult<ConstraintSet> {
        let build = |t: usize| self.step_constraints(t, activation(t));
        let steps: Vec<ConstraintSet> = if parallel {
            (1..time_steps).into_par_iter().map(build).collect::<PlanResult<_>>()?
        } else {
            (1..time_steps).map(build).collect::<PlanResult<_>>()?
        };
        Ok(steps.into_iter().fold(ConstraintSet::new(), ConstraintSet::merge))
    }

    /// `cellVar(c, t) == cellVar(c, t - 1)` for every cell unless `active` holds
    fn persist_unless(&self, t: usize, active: Literal) -> ConstraintSet {
        iproduct!(self.cells(), ObjectKind::ALL)
            .map(|(cell, kind)| {
                Constraint::Clause(vec![
                    active,
                    Literal::neg(Atom::cell(cell, t - 1, kind)),
                    Literal::pos(Atom::cell(cell, t, kind)),
                ])
            })
            .collect()
    }

    fn classical_frame(&self, t: usize, candidates: &[CandidateApplication]) -> ConstraintSet {
        let mut set = ConstraintSet::new();
        for candidate in candidates {
            let selected = Literal::pos(candidate.selector());
            set = set.extend(
                iproduct!(self.cells().filter(|&c| !candidate.touches(c)), ObjectKind::ALL).map(
                    |(cell, kind)| {
                        Constraint::implies_all(
                            &[selected, Literal::pos(Atom::cell(cell, t - 1, kind))],
                            Literal::pos(Atom::cell(cell, t, kind)),
                        )
                    },
                ),
            );
        }
        set
    }

    fn explanatory_frame(&self, t: usize, candidates: &[CandidateApplication]) -> ConstraintSet {
        let mut touching: HashMap<Cell, Vec<Literal>> = HashMap::new();
        for candidate in candidates {
            for &cell in &candidate.affected {
                touching.entry(cell).or_default().push(Literal::pos(candidate.selector()));
            }
        }

        iproduct!(self.cells(), ObjectKind::ALL)
            .map(|(cell, kind)| {
                // cell held `kind` and no longer does => some selected candidate touches it
                let mut literals = vec![
                    Literal::neg(Atom::cell(cell, t - 1, kind)),
                    Literal::pos(Atom::cell(cell, t, kind)),
                ];
                literals.extend(touching.get(&cell).into_iter().flatten().copied());
                Constraint::Clause(literals)
            })
            .collect()
    }
}
