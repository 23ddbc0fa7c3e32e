//! Plan length minimisation
//!
//! `planLength` is order encoded: `PlanReaches { k }` holds iff `planLength >= k`
//! for `k` in `1..=max_horizon`, and `PlanEndsAt { k }` iff `planLength == k`.
//! Step `t` fires a rule iff `planLength >= t`; later steps freeze the grid. The
//! minimum is found by a descending search on one solver session, tightening
//! the bound through assumptions.

use super::constraints::{Constraint, ConstraintSet, Literal};
use super::goal::GoalInjector;
use super::solver::{SolveOutcome, SolverAdapter, Witness};
use super::transition::StepActivation;
use super::variables::{Atom, VariableManager};
use crate::error::{PlanError, PlanResult};
use crate::game::GoalCondition;
use tracing::{debug, info};

/// Result of a minimisation run
#[derive(Debug, Clone)]
pub enum OptimizeOutcome {
    /// A plan of `plan_length` steps. `optimal` is false when the solver ran
    /// out of time before ruling out a shorter one.
    Found {
        witness: Witness,
        plan_length: usize,
        optimal: bool,
    },
    /// No plan of any length up to the bound
    Infeasible,
    /// The solver gave up before finding any plan
    Unknown,
}

#[derive(Debug, Clone, Copy)]
pub struct PlanOptimizer {
    max_horizon: usize,
}

impl PlanOptimizer {
    pub fn new(max_horizon: usize) -> Self {
        Self { max_horizon }
    }

    pub fn max_horizon(&self) -> usize {
        self.max_horizon
    }

    /// Snapshots the encoding needs: `0..=max_horizon`
    pub fn time_steps(&self) -> usize {
        self.max_horizon + 1
    }

    /// Step `t` is part of the plan iff `planLength >= t`
    pub fn activation(t: usize) -> StepActivation {
        StepActivation::When(Literal::pos(Atom::PlanReaches { k: t }))
    }

    fn reaches(k: usize) -> Literal {
        Literal::pos(Atom::PlanReaches { k })
    }

    fn ends_at(k: usize) -> Literal {
        Literal::pos(Atom::PlanEndsAt { k })
    }

    /// Order encoding of `planLength` in `[0, max_horizon]`
    pub fn length_constraints(&self) -> ConstraintSet {
        let max = self.max_horizon;
        if max == 0 {
            return ConstraintSet::new().add(Constraint::unit(Self::ends_at(0)));
        }

        let chain = (1..max).map(|k| Constraint::implies(Self::reaches(k + 1), Self::reaches(k)));

        // eq_0 <=> not ge_1, eq_max <=> ge_max
        let mut set = ConstraintSet::new()
            .extend(chain)
            .add(Constraint::Clause(vec![Self::ends_at(0), Self::reaches(1)]))
            .add(Constraint::implies(Self::ends_at(0), !Self::reaches(1)))
            .add(Constraint::implies(Self::reaches(max), Self::ends_at(max)))
            .add(Constraint::implies(Self::ends_at(max), Self::reaches(max)));

        // eq_k <=> ge_k and not ge_{k+1}
        for k in 1..max {
            set = set
                .add(Constraint::implies(Self::ends_at(k), Self::reaches(k)))
                .add(Constraint::implies(Self::ends_at(k), !Self::reaches(k + 1)))
                .add(Constraint::implies_all(
                    &[Self::reaches(k), !Self::reaches(k + 1)],
                    Self::ends_at(k),
                ));
        }
        set
    }

    /// The goal holds on the snapshot the plan ends at
    pub fn goal_constraints(
        &self,
        goal: &GoalCondition,
        width: usize,
        height: usize,
    ) -> ConstraintSet {
        let injector = GoalInjector::new(goal, width, height);
        (0..=self.max_horizon).fold(ConstraintSet::new(), |set, k| {
            set.add(Constraint::implies(
                Self::ends_at(k),
                Literal::pos(Atom::GoalHolds { t: k }),
            ))
            .merge(injector.goal_at(k))
        })
    }

    /// `planLength` as assigned by `witness`
    pub fn plan_length(&self, witness: &Witness, variables: &VariableManager) -> PlanResult<usize> {
        let mut ends = (0..=self.max_horizon).filter(|&k| {
            variables
                .lookup(&Atom::PlanEndsAt { k })
                .is_some_and(|id| witness.is_true(id))
        });

        match (ends.next(), ends.next()) {
            (Some(k), None) => Ok(k),
            (None, _) => Err(PlanError::encoding("witness assigns no plan length")),
            (Some(a), Some(b)) => Err(PlanError::encoding(format!(
                "witness assigns plan lengths {} and {}",
                a, b
            ))),
        }
    }

    /// Find the shortest plan, descending from the first witness
    pub fn minimize(
        &self,
        adapter: &mut SolverAdapter,
        variables: &VariableManager,
    ) -> PlanResult<OptimizeOutcome> {
        let mut best: Option<(Witness, usize)> = None;
        let mut assumptions = Vec::new();

        loop {
            match adapter.solve(&assumptions)? {
                SolveOutcome::Sat(witness) => {
                    let plan_length = self.plan_length(&witness, variables)?;
                    info!(plan_length, "found plan");
                    if plan_length == 0 {
                        return Ok(OptimizeOutcome::Found {
                            witness,
                            plan_length,
                            optimal: true,
                        });
                    }
                    let bound = variables
                        .lookup(&Atom::PlanReaches { k: plan_length })
                        .ok_or_else(|| {
                            PlanError::encoding(format!(
                                "planLength >= {} was never encoded",
                                plan_length
                            ))
                        })?;
                    assumptions = vec![-bound];
                    best = Some((witness, plan_length));
                }
                SolveOutcome::Unsat => {
                    debug!(bound = ?best.as_ref().map(|(_, len)| *len), "no shorter plan");
                    return Ok(match best {
                        Some((witness, plan_length)) => OptimizeOutcome::Found {
                            witness,
                            plan_length,
                            optimal: true,
                        },
                        None => OptimizeOutcome::Infeasible,
                    });
                }
                SolveOutcome::Unknown => {
                    return Ok(match best {
                        Some((witness, plan_length)) => OptimizeOutcome::Found {
                            witness,
                            plan_length,
                            optimal: false,
                        },
                        None => OptimizeOutcome::Unknown,
                    });
                }
            }
        }
    }
}
