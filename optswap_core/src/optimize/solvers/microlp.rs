//! Implements a solver interface for microlp
//!
//! microlp is a pure rust simplex and branch and bound solver. It has no tolerance, gap or time
//! limit options, so those settings are logged and ignored.
use std::time::Instant;

use log::{debug, warn};
use microlp::{ComparisonOp, OptimizationDirection, Problem, Variable};

use crate::configuration::SolverSettings;
use crate::optimize::problem::{MilpProblem, ObjectiveSense};
use crate::optimize::solvers::{check_dispatchable, integer_bound, MilpSolver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution, SolverDiagnostics};

#[derive(Clone, Debug, Default)]
pub struct MicrolpSolver {}

impl MilpSolver for MicrolpSolver {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn integer_variable_capable(&self) -> bool {
        true
    }

    fn solve(
        &self,
        problem: &MilpProblem,
        settings: &SolverSettings,
    ) -> Result<ProblemSolution, SolverError> {
        check_dispatchable(self, problem)?;
        let start = Instant::now();
        let mut diagnostics = SolverDiagnostics {
            solver: self.name().to_string(),
            ..SolverDiagnostics::default()
        };
        if settings.time_limit_seconds.is_some() {
            debug!("microlp has no time limit, solving to optimality");
            diagnostics.message = Some("time limit and gap settings ignored".to_string());
        }

        let direction = match problem.sense {
            ObjectiveSense::Minimize => OptimizationDirection::Minimize,
            ObjectiveSense::Maximize => OptimizationDirection::Maximize,
        };
        let mut lp = Problem::new(direction);
        let mut is_integer = vec![false; problem.num_variables()];
        for &index in &problem.integer_variables {
            is_integer[index] = true;
        }
        let variables: Vec<Variable> = (0..problem.num_variables())
            .map(|i| {
                let (lb, ub) = (problem.lower_bounds[i], problem.upper_bounds[i]);
                if is_integer[i] {
                    lp.add_integer_var(problem.objective[i], (integer_bound(lb), integer_bound(ub)))
                } else {
                    lp.add_var(problem.objective[i], (lb, ub))
                }
            })
            .collect();

        for (r, row) in problem.constraints.row_iter().enumerate() {
            let rhs = problem.rhs[r];
            if row.nnz() == 0 {
                // An empty row reads 0 <= rhs
                if rhs < -settings.feasibility_tolerance {
                    diagnostics.raw_status = format!("empty row {r} with negative right hand side");
                    diagnostics.solve_seconds = start.elapsed().as_secs_f64();
                    return Ok(ProblemSolution::without_values(
                        OptimizationStatus::Infeasible,
                        diagnostics,
                    ));
                }
                continue;
            }
            let terms: Vec<(Variable, f64)> = row
                .col_indices()
                .iter()
                .zip(row.values())
                .map(|(c, v)| (variables[*c], *v))
                .collect();
            lp.add_constraint(terms, ComparisonOp::Le, rhs);
        }

        let result = lp.solve();
        diagnostics.solve_seconds = start.elapsed().as_secs_f64();
        match result {
            Ok(solution) => {
                diagnostics.raw_status = "optimal".to_string();
                let values: Vec<f64> = variables.iter().map(|v| solution[*v]).collect();
                Ok(ProblemSolution {
                    status: OptimizationStatus::Optimal,
                    objective_value: Some(solution.objective()),
                    variable_values: Some(values),
                    diagnostics,
                })
            }
            Err(microlp::Error::Infeasible) => {
                diagnostics.raw_status = "infeasible".to_string();
                Ok(ProblemSolution::without_values(
                    OptimizationStatus::Infeasible,
                    diagnostics,
                ))
            }
            Err(microlp::Error::Unbounded) => {
                diagnostics.raw_status = "unbounded".to_string();
                Ok(ProblemSolution::without_values(
                    OptimizationStatus::Unbounded,
                    diagnostics,
                ))
            }
            #[allow(unreachable_patterns)]
            Err(err) => {
                warn!("microlp failed: {}", err);
                diagnostics.raw_status = "error".to_string();
                diagnostics.message = Some(err.to_string());
                Ok(ProblemSolution::without_values(
                    OptimizationStatus::NumericalError,
                    diagnostics,
                ))
            }
        }
    }
}
