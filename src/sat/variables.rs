//! Symbolic variables and their mapping to SAT integers

use crate::error::{PlanError, PlanResult};
use crate::game::{Cell, ObjectKind, RuleId};
use std::collections::HashMap;

/// A named boolean the encoding talks about, independent of any solver.
///
/// The symbolic integer `cellVar(x, y, t)` is the one-hot family
/// `CellIs { cell, t, kind }` over every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Atom {
    /// `cellVar(cell, t) == kind`
    CellIs { cell: Cell, t: usize, kind: ObjectKind },
    /// Rule `rule` anchored at `anchor` is the one rule firing between `t - 1` and `t`
    Selected { rule: RuleId, anchor: Cell, t: usize },
    /// The goal predicate holds on snapshot `t`
    GoalHolds { t: usize },
    /// `planLength >= k`
    PlanReaches { k: usize },
    /// `planLength == k`
    PlanEndsAt { k: usize },
}

impl Atom {
    pub fn cell(cell: Cell, t: usize, kind: ObjectKind) -> Self {
        Atom::CellIs { cell, t, kind }
    }
}

/// Types of variables used in the SAT encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableType {
    Atom(Atom),
    /// Helper introduced while lowering cardinality constraints
    Auxiliary(usize),
}

/// Manages SAT variables and their mapping to integers
#[derive(Debug, Default)]
pub struct VariableManager {
    variable_map: HashMap<VariableType, i32>,
    /// `kinds[id - 1]` is the variable behind SAT id `id`
    kinds: Vec<VariableType>,
    next_auxiliary: usize,
    width: usize,
    height: usize,
    time_steps: usize,
}

impl VariableManager {
    pub fn new(width: usize, height: usize, time_steps: usize) -> Self {
        Self {
            width,
            height,
            time_steps,
            ..Self::default()
        }
    }

    /// Get or create the SAT id of `atom`
    pub fn atom(&mut self, atom: Atom) -> PlanResult<i32> {
        let key = VariableType::Atom(atom);
        if let Some(&id) = self.variable_map.get(&key) {
            return Ok(id);
        }
        self.validate_atom(&atom)?;
        Ok(self.insert(key))
    }

    /// SAT id of the cell variable `cellVar(x, y, t) == kind`
    pub fn cell_variable(
        &mut self,
        x: usize,
        y: usize,
        t: usize,
        kind: ObjectKind,
    ) -> PlanResult<i32> {
        self.atom(Atom::cell(Cell::new(x, y), t, kind))
    }

    /// A fresh helper variable
    pub fn auxiliary(&mut self) -> i32 {
        let key = VariableType::Auxiliary(self.next_auxiliary);
        self.next_auxiliary += 1;
        self.insert(key)
    }

    /// SAT id of `atom` if the encoding ever mentioned it
    pub fn lookup(&self, atom: &Atom) -> Option<i32> {
        self.variable_map.get(&VariableType::Atom(*atom)).copied()
    }

    /// Variable behind a SAT id
    pub fn variable_type(&self, id: i32) -> Option<VariableType> {
        if id <= 0 {
            return None;
        }
        self.kinds.get(id as usize - 1).copied()
    }

    /// Every selector atom with its SAT id, in creation order
    pub fn selectors(&self) -> impl Iterator<Item = (Atom, i32)> + '_ {
        self.kinds.iter().enumerate().filter_map(|(i, kind)| match kind {
            VariableType::Atom(atom @ Atom::Selected { .. }) => Some((*atom, i as i32 + 1)),
            _ => None,
        })
    }

    fn insert(&mut self, key: VariableType) -> i32 {
        self.kinds.push(key);
        let id = self.kinds.len() as i32;
        self.variable_map.insert(key, id);
        id
    }

    pub fn variable_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn dimensions(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.time_steps)
    }

    fn validate_atom(&self, atom: &Atom) -> PlanResult<()> {
        let check_cell = |cell: &Cell| -> PlanResult<()> {
            if cell.x >= self.width || cell.y >= self.height {
                return Err(PlanError::encoding(format!(
                    "cell {} out of bounds ({}x{})",
                    cell, self.width, self.height
                )));
            }
            Ok(())
        };
        let check_time = |t: usize| -> PlanResult<()> {
            if t >= self.time_steps {
                return Err(PlanError::encoding(format!(
                    "time step {} out of bounds (time_steps: {})",
                    t, self.time_steps
                )));
            }
            Ok(())
        };

        match atom {
            Atom::CellIs { cell, t, .. } => {
                check_cell(cell)?;
                check_time(*t)
            }
            Atom::Selected { anchor, t, .. } => {
                check_cell(anchor)?;
                if *t == 0 {
                    return Err(PlanError::encoding("no rule fires into the initial state"));
                }
                check_time(*t)
            }
            Atom::GoalHolds { t } | Atom::PlanEndsAt { k: t } => check_time(*t),
            Atom::PlanReaches { k } => {
                if *k == 0 {
                    return Err(PlanError::encoding("planLength >= 0 is constant"));
                }
                check_time(*k)
            }
        }
    }

    pub fn statistics(&self) -> VariableStatistics {
        let mut stats = VariableStatistics {
            total_variables: self.variable_count(),
            ..VariableStatistics::default()
        };
        for kind in &self.kinds {
            match kind {
                VariableType::Atom(Atom::CellIs { .. }) => stats.cell_variables += 1,
                VariableType::Atom(Atom::Selected { .. }) => stats.selector_variables += 1,
                VariableType::Atom(_) => stats.plan_variables += 1,
                VariableType::Auxiliary(_) => stats.auxiliary_variables += 1,
            }
        }
        stats
    }
}

/// Statistics about variable usage
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VariableStatistics {
    pub total_variables: usize,
    pub cell_variables: usize,
    pub selector_variables: usize,
    pub plan_variables: usize,
    pub auxiliary_variables: usize,
}

impl std::fmt::Display for VariableStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Variable Statistics:")?;
        writeln!(f, "  Total variables: {}", self.total_variables)?;
        writeln!(f, "  Cell variables: {}", self.cell_variables)?;
        writeln!(f, "  Selector variables: {}", self.selector_variables)?;
        writeln!(f, "  Plan/goal variables: {}", self.plan_variables)?;
        writeln!(f, "  Auxiliary variables: {}", self.auxiliary_variables)?;
        Ok(())
    }
}
