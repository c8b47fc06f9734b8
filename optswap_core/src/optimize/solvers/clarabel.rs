//! Implements a solver interface for Clarabel
//!
//! Clarabel is an interior point conic solver, so it only accepts continuous problems. Every row
//! and every finite variable bound becomes one entry of a single nonnegative cone.
use std::time::Instant;

use clarabel::algebra::CscMatrix as ClarabelCsc;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use log::debug;
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::configuration::SolverSettings;
use crate::optimize::problem::{MilpProblem, ObjectiveSense};
use crate::optimize::solvers::{check_dispatchable, MilpSolver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution, SolverDiagnostics};

#[derive(Clone, Debug, Default)]
pub struct ClarabelSolver {}

impl ClarabelSolver {
    /// Stack the rows and the finite bounds into `A x + s = b, s >= 0`
    fn conic_rows(problem: &MilpProblem) -> (ClarabelCsc<f64>, Vec<f64>) {
        let n = problem.num_variables();
        let mut triplets: Vec<(usize, usize, f64)> = problem.triplets();
        let mut b = problem.rhs.clone();
        for (i, ub) in problem.upper_bounds.iter().enumerate() {
            if ub.is_finite() {
                triplets.push((b.len(), i, 1f64));
                b.push(*ub);
            }
        }
        for (i, lb) in problem.lower_bounds.iter().enumerate() {
            if lb.is_finite() {
                triplets.push((b.len(), i, -1f64));
                b.push(-*lb);
            }
        }
        let mut coo = CooMatrix::new(b.len(), n);
        for (r, c, v) in triplets {
            coo.push(r, c, v);
        }
        let csc = CscMatrix::from(&coo);
        let a = ClarabelCsc::new(
            b.len(),
            n,
            csc.col_offsets().to_vec(),
            csc.row_indices().to_vec(),
            csc.values().to_vec(),
        );
        (a, b)
    }
}

impl MilpSolver for ClarabelSolver {
    fn name(&self) -> &'static str {
        "clarabel"
    }

    fn integer_variable_capable(&self) -> bool {
        false
    }

    fn solve(
        &self,
        problem: &MilpProblem,
        settings: &SolverSettings,
    ) -> Result<ProblemSolution, SolverError> {
        check_dispatchable(self, problem)?;
        let start = Instant::now();
        let n = problem.num_variables();
        let p = ClarabelCsc::<f64>::zeros((n, n));
        // Clarabel minimizes
        let q: Vec<f64> = match problem.sense {
            ObjectiveSense::Minimize => problem.objective.clone(),
            ObjectiveSense::Maximize => problem.objective.iter().map(|c| -c).collect(),
        };
        let (a, b) = Self::conic_rows(problem);
        let cones = [SupportedConeT::NonnegativeConeT(b.len())];
        let clarabel_settings = DefaultSettingsBuilder::default()
            .verbose(settings.verbosity > 0)
            .tol_feas(settings.feasibility_tolerance.max(1e-10))
            .tol_gap_abs(settings.absolute_gap_tolerance)
            .tol_gap_rel(settings.relative_gap_tolerance)
            .time_limit(settings.time_limit_seconds.unwrap_or(f64::INFINITY))
            .build()
            .map_err(|err| SolverError::Backend(format!("{err:?}")))?;

        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, clarabel_settings);
        solver.solve();
        let raw_status = solver.solution.status;
        debug!("Clarabel finished with status {:?}", raw_status);
        let diagnostics = SolverDiagnostics {
            solver: self.name().to_string(),
            raw_status: format!("{raw_status:?}"),
            solve_seconds: start.elapsed().as_secs_f64(),
            message: None,
        };
        let status = match raw_status {
            SolverStatus::Solved => OptimizationStatus::Optimal,
            SolverStatus::AlmostSolved => OptimizationStatus::AlmostOptimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                OptimizationStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                OptimizationStatus::Unbounded
            }
            SolverStatus::MaxTime => OptimizationStatus::TimeLimit,
            SolverStatus::MaxIterations | SolverStatus::InsufficientProgress => {
                OptimizationStatus::SolverHalted
            }
            SolverStatus::NumericalError => OptimizationStatus::NumericalError,
            _ => OptimizationStatus::Unoptimized,
        };
        if !status.has_solution() {
            return Ok(ProblemSolution::without_values(status, diagnostics));
        }
        let values = solver.solution.x.clone();
        Ok(ProblemSolution {
            status,
            objective_value: Some(problem.evaluate_objective(&values)),
            variable_values: Some(values),
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::manifest::Manifest;
    use crate::utils::sparse::csr_from_triplets;

    #[test]
    fn solves_small_lp() {
        // max x + 2y s.t. x + y <= 4, 2x + y <= 6, 0 <= y <= 3, x >= 0
        let mut columns = Manifest::new();
        columns.push("xy".to_string(), 2);
        let mut rows = Manifest::new();
        rows.push("capacity".to_string(), 2);
        let problem = MilpProblem {
            objective: vec![1., 2.],
            constraints: csr_from_triplets(
                2,
                2,
                vec![(0, 0, 1.), (0, 1, 1.), (1, 0, 2.), (1, 1, 1.)],
            ),
            rhs: vec![4., 6.],
            lower_bounds: vec![0., 0.],
            upper_bounds: vec![f64::INFINITY, 3.],
            integer_variables: vec![],
            sense: ObjectiveSense::Maximize,
            columns,
            rows,
        };
        let solution = ClarabelSolver::default()
            .solve(&problem, &SolverSettings::default())
            .unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert!((solution.objective_value.unwrap() - 7.).abs() < 1e-5);
        let values = solution.variable_values.unwrap();
        assert!((values[0] - 1.).abs() < 1e-4);
        assert!((values[1] - 3.).abs() < 1e-4);
    }

    #[test]
    fn rejects_integer_problems() {
        let mut columns = Manifest::new();
        columns.push("x".to_string(), 1);
        let problem = MilpProblem {
            objective: vec![1.],
            constraints: csr_from_triplets(0, 1, Vec::new()),
            rhs: vec![],
            lower_bounds: vec![0.],
            upper_bounds: vec![1.],
            integer_variables: vec![0],
            sense: ObjectiveSense::Maximize,
            columns,
            rows: Manifest::new(),
        };
        assert!(matches!(
            ClarabelSolver::default().solve(&problem, &SolverSettings::default()),
            Err(SolverError::IntegerVariablesUnsupported { .. })
        ));
    }
}
