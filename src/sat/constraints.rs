//! Solver-independent constraint vocabulary and its lowering to CNF

use super::variables::{Atom, VariableManager};
use crate::error::PlanResult;
use itertools::Itertools;
use std::ops::Not;

/// An atom or its negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal {
    pub atom: Atom,
    pub positive: bool,
}

impl Literal {
    pub fn pos(atom: Atom) -> Self {
        Self { atom, positive: true }
    }

    pub fn neg(atom: Atom) -> Self {
        Self { atom, positive: false }
    }
}

impl From<Atom> for Literal {
    fn from(atom: Atom) -> Self {
        Literal::pos(atom)
    }
}

impl Not for Literal {
    type Output = Literal;

    fn not(self) -> Literal {
        Literal {
            atom: self.atom,
            positive: !self.positive,
        }
    }
}

/// A boolean or cardinality assertion over atoms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// At least one literal holds
    Clause(Vec<Literal>),
    /// At most one literal holds
    AtMostOne(Vec<Literal>),
    /// Exactly one literal holds
    ExactlyOne(Vec<Literal>),
    /// When `guard` holds (or always, without one), exactly `exactly` literals hold
    Count {
        guard: Option<Literal>,
        literals: Vec<Literal>,
        exactly: usize,
    },
}

impl Constraint {
    /// `premise => conclusion`
    pub fn implies(premise: Literal, conclusion: Literal) -> Self {
        Constraint::Clause(vec![!premise, conclusion])
    }

    /// `premises[0] and premises[1] and ... => conclusion`
    pub fn implies_all(premises: &[Literal], conclusion: Literal) -> Self {
        let mut literals: Vec<Literal> = premises.iter().map(|&l| !l).collect();
        literals.push(conclusion);
        Constraint::Clause(literals)
    }

    pub fn unit(literal: Literal) -> Self {
        Constraint::Clause(vec![literal])
    }
}

/// An immutable, growing collection of constraints.
///
/// `add` consumes the set and returns the extended one, so partial sets built
/// for different timesteps never share mutable state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    #[must_use]
    pub fn extend<I: IntoIterator<Item = Constraint>>(mut self, constraints: I) -> Self {
        self.constraints.extend(constraints);
        self
    }

    #[must_use]
    pub fn merge(mut self, other: ConstraintSet) -> Self {
        self.constraints.extend(other.constraints);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn contains(&self, constraint: &Constraint) -> bool {
        self.constraints.contains(constraint)
    }
}

impl FromIterator<Constraint> for ConstraintSet {
    fn from_iter<I: IntoIterator<Item = Constraint>>(iter: I) -> Self {
        Self {
            constraints: iter.into_iter().collect(),
        }
    }
}

/// Represents a SAT clause (disjunction of literals)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub literals: Vec<i32>, // Positive for variable, negative for negation
}

impl Clause {
    pub fn new(literals: Vec<i32>) -> Self {
        Self { literals }
    }

    pub fn unit(literal: i32) -> Self {
        Self { literals: vec![literal] }
    }

    pub fn binary(lit1: i32, lit2: i32) -> Self {
        Self { literals: vec![lit1, lit2] }
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn is_unit(&self) -> bool {
        self.literals.len() == 1
    }
}

/// At-most-one groups up to this size use the pairwise encoding.
const PAIRWISE_LIMIT: usize = 6;

/// A literal after lowering: either a SAT literal or a known constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bit {
    Const(bool),
    Lit(i32),
}

impl Not for Bit {
    type Output = Bit;

    fn not(self) -> Bit {
        match self {
            Bit::Const(b) => Bit::Const(!b),
            Bit::Lit(l) => Bit::Lit(-l),
        }
    }
}

/// Lowers a [`ConstraintSet`] to CNF, allocating SAT ids through a [`VariableManager`]
pub struct CnfLowering<'a> {
    variables: &'a mut VariableManager,
    clauses: Vec<Clause>,
}

impl<'a> CnfLowering<'a> {
    pub fn new(variables: &'a mut VariableManager) -> Self {
        Self {
            variables,
            clauses: Vec::new(),
        }
    }

    /// Lower every constraint of `set`, in order
    pub fn lower(mut self, set: &ConstraintSet) -> PlanResult<Vec<Clause>> {
        for constraint in set.iter() {
            self.lower_constraint(constraint)?;
        }
        Ok(self.clauses)
    }

    fn literal(&mut self, literal: &Literal) -> PlanResult<i32> {
        let id = self.variables.atom(literal.atom)?;
        Ok(if literal.positive { id } else { -id })
    }

    fn literals(&mut self, literals: &[Literal]) -> PlanResult<Vec<i32>> {
        literals.iter().map(|l| self.literal(l)).collect()
    }

    fn lower_constraint(&mut self, constraint: &Constraint) -> PlanResult<()> {
        match constraint {
            Constraint::Clause(literals) => {
                let lits = self.literals(literals)?;
                self.emit(lits.into_iter().map(Bit::Lit).collect());
            }
            Constraint::AtMostOne(literals) => {
                let lits = self.literals(literals)?;
                self.at_most_one(&lits);
            }
            Constraint::ExactlyOne(literals) => {
                let lits = self.literals(literals)?;
                self.emit(lits.iter().copied().map(Bit::Lit).collect());
                self.at_most_one(&lits);
            }
            Constraint::Count { guard, literals, exactly } => {
                let guard = guard.as_ref().map(|g| self.literal(g)).transpose()?;
                let lits = self.literals(literals)?;
                self.exactly_k(guard, &lits, *exactly);
            }
        }
        Ok(())
    }

    /// Push a clause after constant folding. A clause that folds to nothing is
    /// unsatisfiable and becomes the pair `a`, `-a` on a fresh helper.
    fn emit(&mut self, bits: Vec<Bit>) {
        if bits.contains(&Bit::Const(true)) {
            return;
        }
        let literals: Vec<i32> = bits
            .into_iter()
            .filter_map(|b| match b {
                Bit::Lit(l) => Some(l),
                Bit::Const(_) => None,
            })
            .collect();
        if literals.is_empty() {
            let contradiction = self.variables.auxiliary();
            self.clauses.push(Clause::unit(contradiction));
            self.clauses.push(Clause::unit(-contradiction));
        } else {
            self.clauses.push(Clause::new(literals));
        }
    }

    fn at_most_one(&mut self, lits: &[i32]) {
        if lits.len() <= 1 {
            return;
        }
        if lits.len() <= PAIRWISE_LIMIT {
            for (a, b) in lits.iter().tuple_combinations() {
                self.clauses.push(Clause::binary(-a, -b));
            }
            return;
        }

        // Sequential counter: s[i] holds when one of lits[..=i] holds.
        let n = lits.len();
        let s: Vec<i32> = (0..n - 1).map(|_| self.variables.auxiliary()).collect();
        self.clauses.push(Clause::binary(-lits[0], s[0]));
        for i in 1..n - 1 {
            self.clauses.push(Clause::binary(-lits[i], s[i]));
            self.clauses.push(Clause::binary(-s[i - 1], s[i]));
            self.clauses.push(Clause::binary(-lits[i], -s[i - 1]));
        }
        self.clauses.push(Clause::binary(-lits[n - 1], -s[n - 2]));
    }

    /// `guard => exactly k of lits`, via a totally defined sequential counter.
    ///
    /// `r[i][j]` holds iff at least `j` of the first `i` literals hold, for `j <= k + 1`.
    fn exactly_k(&mut self, guard: Option<i32>, lits: &[i32], k: usize) {
        let top = k + 1;
        let mut prev: Vec<Bit> = (0..=top).map(|j| Bit::Const(j == 0)).collect();

        for (i, &x) in lits.iter().enumerate() {
            let x = Bit::Lit(x);
            let mut current = vec![Bit::Const(true)];
            for j in 1..=top {
                if j > i + 1 {
                    current.push(Bit::Const(false));
                    continue;
                }
                let r = Bit::Lit(self.variables.auxiliary());
                self.emit(vec![!prev[j], r]);
                self.emit(vec![!prev[j - 1], !x, r]);
                self.emit(vec![!r, prev[j], prev[j - 1]]);
                self.emit(vec![!r, prev[j], x]);
                current.push(r);
            }
            prev = current;
        }

        let not_guard = guard.map(|g| Bit::Lit(-g));
        let guarded = |bit: Bit| -> Vec<Bit> {
            not_guard.into_iter().chain(std::iter::once(bit)).collect()
        };
        if k > 0 {
            self.emit(guarded(prev[k]));
        }
        self.emit(guarded(!prev[top]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Cell, ObjectKind};
    use crate::sat::solver::SatSolver;

    fn cell_atom(x: usize) -> Atom {
        Atom::cell(Cell::new(x, 0), 0, ObjectKind::Crate)
    }

    fn count_true(solver_lits: &[i32], assignment: &std::collections::HashMap<i32, bool>) -> usize {
        solver_lits.iter().filter(|l| assignment.get(l) == Some(&true)).count()
    }

    #[test]
    fn test_clause_creation() {
        let clause = Clause::new(vec![1, -2, 3]);
        assert_eq!(clause.literals, vec![1, -2, 3]);
        assert!(!clause.is_unit());
        assert!(Clause::unit(5).is_unit());
    }

    #[test]
    fn test_constraint_set_add_returns_new_set() {
        let base = ConstraintSet::new();
        let one = base.clone().add(Constraint::unit(cell_atom(0).into()));
        assert!(base.is_empty());
        assert_eq!(one.len(), 1);

        let merged = one.clone().merge(one);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_negation_and_implication() {
        let a = Literal::pos(cell_atom(0));
        let b = Literal::pos(cell_atom(1));
        assert_eq!(!a, Literal::neg(cell_atom(0)));
        assert_eq!(Constraint::implies(a, b), Constraint::Clause(vec![!a, b]));
    }

    #[test]
    fn test_pairwise_at_most_one() {
        let mut vm = VariableManager::new(3, 1, 1);
        let set = ConstraintSet::new()
            .add(Constraint::AtMostOne((0..3).map(|x| cell_atom(x).into()).collect()));
        let clauses = CnfLowering::new(&mut vm).lower(&set).unwrap();
        assert_eq!(clauses.len(), 3);
        assert!(clauses.iter().all(|c| c.literals.len() == 2 && c.literals.iter().all(|&l| l < 0)));
    }

    #[test]
    fn test_sequential_exactly_one_is_sound() {
        let n = 10;
        let mut vm = VariableManager::new(n, 1, 1);
        let lits: Vec<Literal> = (0..n).map(|x| cell_atom(x).into()).collect();
        let set = ConstraintSet::new().add(Constraint::ExactlyOne(lits));
        let clauses = CnfLowering::new(&mut vm).lower(&set).unwrap();

        let mut solver = SatSolver::new();
        solver.add_clauses(&clauses).unwrap();
        let ids: Vec<i32> = (0..n).map(|x| vm.lookup(&cell_atom(x)).unwrap()).collect();

        let solutions = solver.solve_multiple(n + 2).unwrap();
        assert_eq!(solutions.len(), n);
        for solution in &solutions {
            assert_eq!(count_true(&ids, &solution.assignment), 1);
        }
    }

    #[test]
    fn test_guarded_count() {
        let n = 5;
        let mut vm = VariableManager::new(n, 1, 1);
        let guard = Literal::pos(Atom::GoalHolds { t: 0 });
        let lits: Vec<Literal> = (0..n).map(|x| cell_atom(x).into()).collect();
        let set = ConstraintSet::new()
            .add(Constraint::Count { guard: Some(guard), literals: lits, exactly: 2 })
            .add(Constraint::unit(guard))
            .add(Constraint::unit(cell_atom(0).into()))
            .add(Constraint::unit(cell_atom(4).into()));
        let clauses = CnfLowering::new(&mut vm).lower(&set).unwrap();

        let mut solver = SatSolver::new();
        solver.add_clauses(&clauses).unwrap();
        let solution = solver.solve().unwrap().expect("two forced literals satisfy the count");
        let ids: Vec<i32> = (0..n).map(|x| vm.lookup(&cell_atom(x)).unwrap()).collect();
        assert_eq!(count_true(&ids, &solution.assignment), 2);

        // A third forced literal breaks the count
        let id2 = vm.lookup(&cell_atom(2)).unwrap();
        solver.add_clause(&Clause::unit(id2)).unwrap();
        assert!(solver.solve().unwrap().is_none());
    }

    #[test]
    fn test_unguarded_count_zero() {
        let mut vm = VariableManager::new(3, 1, 1);
        let lits: Vec<Literal> = (0..3).map(|x| cell_atom(x).into()).collect();
        let set = ConstraintSet::new()
            .add(Constraint::Count { guard: None, literals: lits, exactly: 0 })
            .add(Constraint::unit(cell_atom(1).into()));
        let clauses = CnfLowering::new(&mut vm).lower(&set).unwrap();

        let mut solver = SatSolver::new();
        solver.add_clauses(&clauses).unwrap();
        assert!(solver.solve().unwrap().is_none());
    }

    #[test]
    fn test_empty_clause_lowers_to_contradiction() {
        let mut vm = VariableManager::new(1, 1, 1);
        let set = ConstraintSet::new().add(Constraint::Clause(vec![]));
        let clauses = CnfLowering::new(&mut vm).lower(&set).unwrap();
        assert_eq!(clauses.len(), 2);

        let mut solver = SatSolver::new();
        solver.add_clauses(&clauses).unwrap();
        assert!(solver.solve().unwrap().is_none());
    }
}
