//! SAT solver integration using CaDiCaL
//!
//! [`SatSolver`] wraps one CaDiCaL session. [`SolverAdapter`] is the boundary the
//! planner talks to: it remembers every submitted clause so a crashed backend can
//! be rebuilt and replayed, applies the timeout, and reports `Unknown` instead of
//! hanging.

use super::constraints::Clause;
use crate::error::{PlanError, PlanResult};
use cadical::{Solver, Timeout};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Answer of one solver call
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Sat,
    Unsat,
    /// Out of time or interrupted
    Unknown,
}

/// A satisfying assignment
#[derive(Debug, Clone, Default)]
pub struct Witness {
    pub assignment: HashMap<i32, bool>,
    pub solve_time: Duration,
}

impl Witness {
    /// Value of a SAT literal; negative literals read the negated variable
    pub fn value(&self, literal: i32) -> Option<bool> {
        self.assignment
            .get(&literal.abs())
            .map(|&v| if literal > 0 { v } else { !v })
    }

    pub fn is_true(&self, literal: i32) -> bool {
        self.value(literal) == Some(true)
    }
}

/// Anything that can take clauses and decide them under assumptions
pub trait SatBackend {
    fn add(&mut self, clause: &Clause) -> PlanResult<()>;

    /// Decide the clause database with `assumptions` holding for this call only
    fn check(&mut self, assumptions: &[i32]) -> PlanResult<SolveStatus>;

    /// Assignment found by the last `Sat` answer
    fn model(&self) -> HashMap<i32, bool>;
}

/// SAT solver wrapper for CaDiCaL
pub struct SatSolver {
    solver: Solver,
    variable_count: usize,
    clause_count: usize,
    timeout: Option<Duration>,
}

impl Default for SatSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SatSolver {
    /// Create a new SAT solver instance
    pub fn new() -> Self {
        Self {
            solver: Solver::new(),
            variable_count: 0,
            clause_count: 0,
            timeout: None,
        }
    }

    /// Set solving timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Add clauses to the solver
    pub fn add_clauses(&mut self, clauses: &[Clause]) -> PlanResult<()> {
        for clause in clauses {
            self.add_clause(clause)?;
        }
        Ok(())
    }

    /// Add a single clause to the solver
    pub fn add_clause(&mut self, clause: &Clause) -> PlanResult<()> {
        if clause.is_empty() {
            return Err(PlanError::encoding("cannot add empty clause"));
        }
        if clause.literals.contains(&0) {
            return Err(PlanError::encoding("literal 0 is not a variable"));
        }

        for &literal in &clause.literals {
            self.variable_count = self.variable_count.max(literal.unsigned_abs() as usize);
        }
        self.solver.add_clause(clause.literals.iter().copied());
        self.clause_count += 1;
        Ok(())
    }

    /// Solve and return the first solution.
    ///
    /// `None` covers both UNSAT and running out of time; use [`SatBackend::check`]
    /// to tell them apart.
    pub fn solve(&mut self) -> PlanResult<Option<Witness>> {
        let start_time = Instant::now();
        match self.check(&[])? {
            SolveStatus::Sat => Ok(Some(Witness {
                assignment: self.extract_assignment(),
                solve_time: start_time.elapsed(),
            })),
            SolveStatus::Unsat | SolveStatus::Unknown => Ok(None),
        }
    }

    /// Solve and find multiple solutions up to a limit.
    ///
    /// Each solution is blocked over every variable before the next call.
    pub fn solve_multiple(&mut self, max_solutions: usize) -> PlanResult<Vec<Witness>> {
        let mut solutions = Vec::new();
        let start_time = Instant::now();

        for _ in 0..max_solutions {
            if self.check(&[])? != SolveStatus::Sat {
                break;
            }
            let assignment = self.extract_assignment();
            let blocking: Vec<i32> = assignment
                .iter()
                .map(|(&var, &value)| if value { -var } else { var })
                .collect();
            solutions.push(Witness {
                assignment,
                solve_time: start_time.elapsed(),
            });
            if blocking.is_empty() {
                break;
            }
            self.add_clause(&Clause::new(blocking))?;
        }

        Ok(solutions)
    }

    fn extract_assignment(&self) -> HashMap<i32, bool> {
        (1..=self.variable_count as i32)
            .filter_map(|var| self.solver.value(var).map(|value| (var, value)))
            .collect()
    }

    /// Get the number of variables
    pub fn variable_count(&self) -> usize {
        self.variable_count
    }

    /// Get the number of clauses
    pub fn clause_count(&self) -> usize {
        self.clause_count
    }
}

impl SatBackend for SatSolver {
    fn add(&mut self, clause: &Clause) -> PlanResult<()> {
        self.add_clause(clause)
    }

    fn check(&mut self, assumptions: &[i32]) -> PlanResult<SolveStatus> {
        if let Some(timeout) = self.timeout {
            self.solver.set_callbacks(Some(Timeout::new(timeout.as_secs_f32())));
        }

        let solver = &mut self.solver;
        let answer =
            catch_unwind(AssertUnwindSafe(|| solver.solve_with(assumptions.iter().copied())))
                .map_err(|_| PlanError::adapter("CaDiCaL panicked during solve"))?;

        Ok(match answer {
            Some(true) => SolveStatus::Sat,
            Some(false) => SolveStatus::Unsat,
            None => SolveStatus::Unknown,
        })
    }

    fn model(&self) -> HashMap<i32, bool> {
        self.extract_assignment()
    }
}

/// Configuration options for the solver boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverOptions {
    /// Per-call wall clock limit; `None` waits for an answer
    pub timeout: Option<Duration>,
    /// Rebuilds after an adapter failure, not counting the first attempt
    pub max_retries: u32,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            max_retries: 2,
        }
    }
}

/// Creates a fresh backend session
pub type BackendFactory =
    Arc<dyn Fn(&SolverOptions) -> PlanResult<Box<dyn SatBackend>> + Send + Sync>;

/// Result of submitting the clause database
#[derive(Debug, Clone)]
pub enum SolveOutcome {
    Sat(Witness),
    Unsat,
    Unknown,
}

impl SolveOutcome {
    pub fn status(&self) -> SolveStatus {
        match self {
            SolveOutcome::Sat(_) => SolveStatus::Sat,
            SolveOutcome::Unsat => SolveStatus::Unsat,
            SolveOutcome::Unknown => SolveStatus::Unknown,
        }
    }
}

/// Narrow solver boundary with bounded retry on adapter failures.
///
/// Clauses are kept so a new session can be replayed after a failure. UNSAT and
/// UNKNOWN are answers and are never retried.
pub struct SolverAdapter {
    factory: BackendFactory,
    options: SolverOptions,
    clauses: Vec<Clause>,
    backend: Option<Box<dyn SatBackend>>,
    stats: SolverStatistics,
}

impl SolverAdapter {
    /// Adapter over CaDiCaL
    pub fn new(options: SolverOptions) -> Self {
        Self::with_factory(options, Arc::new(cadical_backend))
    }

    pub fn with_factory(options: SolverOptions, factory: BackendFactory) -> Self {
        Self {
            factory,
            options,
            clauses: Vec::new(),
            backend: None,
            stats: SolverStatistics::default(),
        }
    }

    /// Append clauses to the database
    pub fn submit(&mut self, clauses: Vec<Clause>) -> PlanResult<()> {
        if let Some(empty) = clauses.iter().position(Clause::is_empty) {
            return Err(PlanError::encoding(format!("clause {} is empty", empty)));
        }

        if let Some(backend) = self.backend.as_mut() {
            let added = clauses.iter().try_for_each(|clause| backend.add(clause));
            if let Err(err) = added {
                // The session is rebuilt from the recorded clauses on the next solve
                warn!(error = %err, "dropping solver session after failed submit");
                self.backend = None;
            }
        }

        self.stats.clause_count += clauses.len();
        for clause in &clauses {
            for &literal in &clause.literals {
                self.stats.variable_count =
                    self.stats.variable_count.max(literal.unsigned_abs() as usize);
            }
        }
        self.clauses.extend(clauses);
        Ok(())
    }

    /// Solve the submitted database with `assumptions` holding for this call only
    pub fn solve(&mut self, assumptions: &[i32]) -> PlanResult<SolveOutcome> {
        let mut attempt = 0;
        loop {
            self.stats.attempts += 1;
            match self.attempt(assumptions) {
                Ok(outcome) => {
                    self.stats.result = Some(outcome.status());
                    return Ok(outcome);
                }
                Err(err) if err.is_retryable() && attempt < self.options.max_retries => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.options.max_retries,
                        error = %err,
                        "solver failed, retrying"
                    );
                    self.backend = None;
                }
                Err(err) => {
                    self.backend = None;
                    return Err(err);
                }
            }
        }
    }

    fn attempt(&mut self, assumptions: &[i32]) -> PlanResult<SolveOutcome> {
        if self.backend.is_none() {
            let mut backend = (self.factory)(&self.options)?;
            for clause in &self.clauses {
                backend.add(clause)?;
            }
            debug!(clauses = self.clauses.len(), "solver session ready");
            self.backend = Some(backend);
        }
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| PlanError::adapter("solver session missing"))?;

        let start_time = Instant::now();
        let status = backend.check(assumptions)?;
        let solve_time = start_time.elapsed();
        self.stats.solve_calls += 1;
        self.stats.solve_time += solve_time;
        debug!(
            ?status,
            assumptions = assumptions.len(),
            elapsed_ms = solve_time.as_millis() as u64,
            "solver answered"
        );

        Ok(match status {
            SolveStatus::Sat => SolveOutcome::Sat(Witness {
                assignment: backend.model(),
                solve_time,
            }),
            SolveStatus::Unsat => SolveOutcome::Unsat,
            SolveStatus::Unknown => SolveOutcome::Unknown,
        })
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn statistics(&self) -> SolverStatistics {
        self.stats.clone()
    }
}

fn cadical_backend(options: &SolverOptions) -> PlanResult<Box<dyn SatBackend>> {
    let mut solver = SatSolver::new();
    if let Some(timeout) = options.timeout {
        solver.set_timeout(timeout);
    }
    Ok(Box::new(solver))
}

/// Statistics about the solving process
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SolverStatistics {
    pub variable_count: usize,
    pub clause_count: usize,
    pub solve_calls: usize,
    pub attempts: usize,
    pub solve_time: Duration,
    pub result: Option<SolveStatus>,
}

impl std::fmt::Display for SolverStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SAT Solver Statistics:")?;
        writeln!(f, "  Variables: {}", self.variable_count)?;
        writeln!(f, "  Clauses: {}", self.clause_count)?;
        writeln!(f, "  Solve calls: {} ({} attempts)", self.solve_calls, self.attempts)?;
        writeln!(f, "  Solve time: {:.3}s", self.solve_time.as_secs_f64())?;
        match self.result {
            Some(result) => writeln!(f, "  Last result: {:?}", result)?,
            None => writeln!(f, "  Last result: -")?,
        }
        Ok(())
    }
}
