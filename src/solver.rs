//! Pluggable LP solver backends.
//!
//! Two interchangeable implementations sit behind [`SolverBackend`]: a dense
//! simplex backend built on `microlp` and an interior-point backend built on
//! `clarabel`. Callers pick one through [`SolverChoice`]; nothing downstream
//! inspects the concrete type. The clarabel backend additionally reports the
//! equality-row dual vector, which the member-adding heuristic consumes.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::errors::SolveError;
use crate::lp::LpProblem;

/// Result of one successful LP solve.
#[derive(Clone, Debug)]
pub struct LpSolution {
    /// Signed axial force per member, in LP member-slot order.
    pub member_forces: Vec<f64>,
    /// Structural volume of the force distribution.
    pub volume: f64,
    /// Dual value per equilibrium row; empty when the backend does not
    /// expose duals.
    pub row_duals: Vec<f64>,
    /// Wall-clock time spent inside the backend.
    pub runtime: Duration,
}

/// A blocking LP solver.
///
/// `solve` is potentially long-running; the session never calls it
/// concurrently against the same problem.
pub trait SolverBackend {
    /// Short identifier used in diagnostics.
    fn name(&self) -> &'static str;

    /// Solve the equilibrium LP.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::Infeasible`] when no equilibrium force
    /// distribution exists and [`SolveError::Backend`] for any other backend
    /// failure, with the backend's message preserved verbatim.
    fn solve(&self, lp: &LpProblem) -> Result<LpSolution, SolveError>;
}

/// Configuration selector for the two available backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverChoice {
    /// Interior-point solve via `clarabel`. Exposes duals, so the
    /// member-adding heuristic works under this backend. The default.
    #[default]
    Clarabel,
    /// Simplex solve via `microlp`. Does not expose duals; member-adding
    /// sessions converge immediately under this backend.
    Microlp,
}

impl SolverChoice {
    /// Instantiate the selected backend.
    #[must_use]
    pub fn backend(self) -> Box<dyn SolverBackend> {
        match self {
            Self::Clarabel => Box::new(ClarabelBackend),
            Self::Microlp => Box::new(MicrolpBackend),
        }
    }
}

/// Simplex backend built on the pure-Rust `microlp` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct MicrolpBackend;

impl SolverBackend for MicrolpBackend {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn solve(&self, lp: &LpProblem) -> Result<LpSolution, SolveError> {
        use microlp::{ComparisonOp, OptimizationDirection, Problem};

        let started = Instant::now();
        let mut problem = Problem::new(OptimizationDirection::Minimize);

        let mut pairs = Vec::with_capacity(lp.members().len());
        for member in lp.members() {
            let tension = problem.add_var(member.tension_cost, (0.0, member.tension_bound));
            let compression =
                problem.add_var(member.compression_cost, (0.0, member.compression_bound));
            pairs.push((tension, compression));
        }

        for row in lp.rows() {
            let mut terms = Vec::with_capacity(row.terms.len() * 2);
            for term in &row.terms {
                let (tension, compression) = pairs[term.var];
                terms.push((tension, term.coeff));
                terms.push((compression, -term.coeff));
            }
            problem.add_constraint(terms.as_slice(), ComparisonOp::Eq, row.rhs);
        }

        let solution = problem.solve().map_err(|error| match error {
            microlp::Error::Infeasible => SolveError::Infeasible {
                message: error.to_string(),
            },
            other => SolveError::Backend {
                backend: self.name(),
                message: other.to_string(),
            },
        })?;

        let member_forces: Vec<f64> = pairs
            .iter()
            .map(|&(tension, compression)| solution[tension] - solution[compression])
            .collect();
        let volume = lp.volume(&member_forces);
        log::debug!(
            "microlp solved {} members / {} rows in {:.3?}",
            lp.members().len(),
            lp.rows().len(),
            started.elapsed()
        );

        Ok(LpSolution {
            member_forces,
            volume,
            row_duals: Vec::new(),
            runtime: started.elapsed(),
        })
    }
}

/// Interior-point backend built on the pure-Rust `clarabel` crate.
///
/// Equilibrium rows go into the zero cone and the variable bounds into the
/// nonnegative cone, so the equality duals come back in the leading block of
/// the dual vector.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClarabelBackend;

impl SolverBackend for ClarabelBackend {
    fn name(&self) -> &'static str {
        "clarabel"
    }

    fn solve(&self, lp: &LpProblem) -> Result<LpSolution, SolveError> {
        use clarabel::algebra::CscMatrix;
        use clarabel::solver::SupportedConeT::{NonnegativeConeT, ZeroConeT};
        use clarabel::solver::{DefaultSettings, DefaultSolver, IPSolver, SolverStatus};

        let started = Instant::now();
        let variables = 2 * lp.members().len();
        let equalities = lp.rows().len();
        let total_rows = equalities + 2 * variables;

        // Column-wise assembly: each variable appears in its equilibrium
        // rows, then a lower-bound row (-x <= 0), then an upper-bound row
        // (x <= bound).
        let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); variables];
        for (row_index, row) in lp.rows().iter().enumerate() {
            for term in &row.terms {
                columns[2 * term.var].push((row_index, term.coeff));
                columns[2 * term.var + 1].push((row_index, -term.coeff));
            }
        }

        let mut objective = Vec::with_capacity(variables);
        let mut rhs = vec![0.0; total_rows];
        for (row_index, row) in lp.rows().iter().enumerate() {
            rhs[row_index] = row.rhs;
        }
        for (slot, member) in lp.members().iter().enumerate() {
            objective.push(member.tension_cost);
            objective.push(member.compression_cost);
            let tension = 2 * slot;
            let compression = 2 * slot + 1;
            columns[tension].push((equalities + tension, -1.0));
            columns[compression].push((equalities + compression, -1.0));
            columns[tension].push((equalities + variables + tension, 1.0));
            columns[compression].push((equalities + variables + compression, 1.0));
            rhs[equalities + variables + tension] = member.tension_bound;
            rhs[equalities + variables + compression] = member.compression_bound;
        }

        let mut column_pointers = Vec::with_capacity(variables + 1);
        let mut row_indices = Vec::new();
        let mut values = Vec::new();
        column_pointers.push(0);
        for column in &columns {
            for &(row, value) in column {
                row_indices.push(row);
                values.push(value);
            }
            column_pointers.push(row_indices.len());
        }

        let constraint_matrix =
            CscMatrix::new(total_rows, variables, column_pointers, row_indices, values);
        let quadratic = CscMatrix::zeros((variables, variables));
        let cones = [ZeroConeT(equalities), NonnegativeConeT(2 * variables)];
        let mut settings = DefaultSettings::default();
        settings.verbose = false;

        let mut solver = DefaultSolver::new(
            &quadratic,
            &objective,
            &constraint_matrix,
            &rhs,
            &cones,
            settings,
        );
        solver.solve();

        let status = solver.solution.status;
        match status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {}
            SolverStatus::PrimalInfeasible | SolverStatus::DualInfeasible => {
                return Err(SolveError::Infeasible {
                    message: format!("{status:?}"),
                });
            }
            other => {
                return Err(SolveError::Backend {
                    backend: self.name(),
                    message: format!("{other:?}"),
                });
            }
        }

        let member_forces: Vec<f64> = (0..lp.members().len())
            .map(|slot| solver.solution.x[2 * slot] - solver.solution.x[2 * slot + 1])
            .collect();
        let volume = lp.volume(&member_forces);
        let row_duals = solver.solution.z[..equalities].to_vec();
        log::debug!(
            "clarabel solved {} members / {} rows in {:.3?}",
            lp.members().len(),
            equalities,
            started.elapsed()
        );

        Ok(LpSolution {
            member_forces,
            volume,
            row_duals,
            runtime: started.elapsed(),
        })
    }
}
