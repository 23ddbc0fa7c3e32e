//! Turns a solver witness back into grid snapshots and rule firings

use super::solution::{AppliedAction, Trajectory};
use crate::error::{PlanError, PlanResult};
use crate::game::{Cell, GridState, ObjectKind, RuleLibrary};
use crate::sat::{Atom, VariableManager, Witness};
use itertools::iproduct;
use std::collections::BTreeMap;

/// Snapshots `0..time_steps` as assigned by `witness`.
///
/// Every cell must hold exactly one kind; anything else means the witness does
/// not belong to this encoding.
pub fn decode_trajectory(witness: &Witness, variables: &VariableManager) -> PlanResult<Trajectory> {
    let (width, height, time_steps) = variables.dimensions();
    let states = (0..time_steps)
        .map(|t| decode_state(witness, variables, t, width, height))
        .collect::<PlanResult<_>>()?;
    Ok(Trajectory::new(states))
}

fn decode_state(
    witness: &Witness,
    variables: &VariableManager,
    t: usize,
    width: usize,
    height: usize,
) -> PlanResult<GridState> {
    let cells = iproduct!(0..height, 0..width)
        .map(|(y, x)| {
            let cell = Cell::new(x, y);
            let mut kinds = ObjectKind::ALL.iter().copied().filter(|&kind| {
                variables
                    .lookup(&Atom::cell(cell, t, kind))
                    .is_some_and(|id| witness.is_true(id))
            });
            match (kinds.next(), kinds.next()) {
                (Some(kind), None) => Ok(kind),
                (None, _) => {
                    Err(PlanError::encoding(format!("cell {} holds no kind at t={}", cell, t)))
                }
                (Some(a), Some(b)) => Err(PlanError::encoding(format!(
                    "cell {} holds both {} and {} at t={}",
                    cell, a, b, t
                ))),
            }
        })
        .collect::<PlanResult<Vec<_>>>()?;
    GridState::from_kinds(width, height, cells)
}

/// Selected rule applications, one per step, in step order
pub fn decode_actions(
    witness: &Witness,
    variables: &VariableManager,
    rules: &RuleLibrary,
) -> PlanResult<Vec<AppliedAction>> {
    let mut by_step: BTreeMap<usize, AppliedAction> = BTreeMap::new();

    for (atom, id) in variables.selectors() {
        if !witness.is_true(id) {
            continue;
        }
        let Atom::Selected { rule, anchor, t } = atom else {
            continue;
        };
        let name = rules
            .get(rule)
            .map(|r| r.name.clone())
            .ok_or_else(|| PlanError::encoding(format!("selector names unknown rule {:?}", rule)))?;

        let action = AppliedAction { step: t, rule: name, anchor };
        if let Some(previous) = by_step.insert(t, action) {
            return Err(PlanError::encoding(format!(
                "step {} fires more than one rule ({} at {} among them)",
                t, previous.rule, previous.anchor
            )));
        }
    }

    Ok(by_step.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{RuleId, StayPolicy};

    fn witness_for(variables: &mut VariableManager, atoms: &[(Atom, bool)]) -> Witness {
        let mut witness = Witness::default();
        for &(atom, value) in atoms {
            let id = variables.atom(atom).unwrap();
            witness.assignment.insert(id, value);
        }
        witness
    }

    #[test]
    fn test_decode_trajectory() {
        let mut variables = VariableManager::new(2, 1, 2);
        let mut atoms = Vec::new();
        for t in 0..2 {
            for x in 0..2 {
                for kind in ObjectKind::ALL {
                    let expected = if (x + t) % 2 == 0 {
                        ObjectKind::Player
                    } else {
                        ObjectKind::Background
                    };
                    atoms.push((Atom::cell(Cell::new(x, 0), t, kind), kind == expected));
                }
            }
        }
        let witness = witness_for(&mut variables, &atoms);

        let trajectory = decode_trajectory(&witness, &variables).unwrap();
        assert_eq!(trajectory.len(), 2);
        assert_eq!(trajectory.get(0).unwrap().kind_at(0, 0), Some(ObjectKind::Player));
        assert_eq!(trajectory.get(1).unwrap().kind_at(1, 0), Some(ObjectKind::Player));
        assert_eq!(trajectory.get(1).unwrap().kind_at(0, 0), Some(ObjectKind::Background));
    }

    #[test]
    fn test_ambiguous_cell_is_an_encoding_error() {
        let mut variables = VariableManager::new(1, 1, 1);
        let cell = Cell::new(0, 0);
        let witness = witness_for(
            &mut variables,
            &[
                (Atom::cell(cell, 0, ObjectKind::Wall), true),
                (Atom::cell(cell, 0, ObjectKind::Crate), true),
            ],
        );
        assert!(matches!(decode_trajectory(&witness, &variables), Err(PlanError::Encoding(_))));

        let empty = Witness::default();
        assert!(decode_trajectory(&empty, &variables).is_err());
    }

    #[test]
    fn test_decode_actions_in_step_order() {
        let rules = RuleLibrary::moves_only(StayPolicy::Forbidden).unwrap();
        let move_e = rules.find("move-e").unwrap().id;
        let move_s = rules.find("move-s").unwrap().id;
        let mut variables = VariableManager::new(4, 4, 3);
        let witness = witness_for(
            &mut variables,
            &[
                (Atom::Selected { rule: move_s, anchor: Cell::new(2, 1), t: 2 }, true),
                (Atom::Selected { rule: move_e, anchor: Cell::new(1, 1), t: 1 }, true),
                (Atom::Selected { rule: move_e, anchor: Cell::new(2, 2), t: 1 }, false),
            ],
        );

        let actions = decode_actions(&witness, &variables, &rules).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].step, 1);
        assert_eq!(actions[0].rule, "move-e");
        assert_eq!(actions[1].anchor, Cell::new(2, 1));
    }

    #[test]
    fn test_two_rules_in_one_step_is_an_error() {
        let rules = RuleLibrary::moves_only(StayPolicy::Forbidden).unwrap();
        let mut variables = VariableManager::new(4, 4, 2);
        let witness = witness_for(
            &mut variables,
            &[
                (Atom::Selected { rule: RuleId(0), anchor: Cell::new(1, 1), t: 1 }, true),
                (Atom::Selected { rule: RuleId(1), anchor: Cell::new(2, 2), t: 1 }, true),
            ],
        );
        assert!(decode_actions(&witness, &variables, &rules).is_err());
    }
}
