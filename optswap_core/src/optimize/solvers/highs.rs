//! Implements a solver interface for HiGHS
use std::time::Instant;

use highs::{Col, HighsModelStatus, RowProblem, Sense};
use log::debug;

use crate::configuration::SolverSettings;
use crate::optimize::problem::{MilpProblem, ObjectiveSense};
use crate::optimize::solvers::{check_dispatchable, MilpSolver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution, SolverDiagnostics};

#[derive(Clone, Debug, Default)]
pub struct HighsSolver {}

impl MilpSolver for HighsSolver {
    fn name(&self) -> &'static str {
        "highs"
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

        let mut is_integer = vec![false; problem.num_variables()];
        for &index in &problem.integer_variables {
            is_integer[index] = true;
        }
        let mut pb = RowProblem::default();
        let columns: Vec<Col> = (0..problem.num_variables())
            .map(|i| {
                let (lb, ub) = (problem.lower_bounds[i], problem.upper_bounds[i]);
                if is_integer[i] {
                    pb.add_integer_column(problem.objective[i], lb..=ub)
                } else {
                    pb.add_column(problem.objective[i], lb..=ub)
                }
            })
            .collect();
        for (r, row) in problem.constraints.row_iter().enumerate() {
            let factors: Vec<(Col, f64)> = row
                .col_indices()
                .iter()
                .zip(row.values())
                .map(|(c, v)| (columns[*c], *v))
                .collect();
            pb.add_row(..=problem.rhs[r], &factors);
        }

        let sense = match problem.sense {
            ObjectiveSense::Minimize => Sense::Minimise,
            ObjectiveSense::Maximize => Sense::Maximise,
        };
        let mut model = pb.optimise(sense);
        model.set_option("output_flag", settings.verbosity > 0);
        model.set_option("mip_feasibility_tolerance", settings.integer_feasibility_tolerance);
        model.set_option("mip_rel_gap", settings.relative_gap_tolerance);
        model.set_option("mip_abs_gap", settings.absolute_gap_tolerance);
        model.set_option("primal_feasibility_tolerance", settings.feasibility_tolerance);
        model.set_option("dual_feasibility_tolerance", settings.optimality_tolerance);
        if let Some(limit) = settings.time_limit_seconds {
            model.set_option("time_limit", limit);
        }

        let solved = model.solve();
        let raw_status = solved.status();
        debug!("HiGHS finished with status {:?}", raw_status);
        let diagnostics = SolverDiagnostics {
            solver: self.name().to_string(),
            raw_status: format!("{raw_status:?}"),
            solve_seconds: start.elapsed().as_secs_f64(),
            message: None,
        };
        let status = map_status(raw_status);
        if !status.has_solution() {
            return Ok(ProblemSolution::without_values(status, diagnostics));
        }
        let values = solved.get_solution().columns().to_vec();
        // Without an incumbent HiGHS hands back an all zero point, which need not be feasible
        if status == OptimizationStatus::TimeLimit
            && problem.max_violation(&values) > settings.feasibility_tolerance.max(1e-6)
        {
            return Ok(ProblemSolution::without_values(status, diagnostics));
        }
        Ok(ProblemSolution {
            status,
            objective_value: Some(problem.evaluate_objective(&values)),
            variable_values: Some(values),
            diagnostics,
        })
    }
}

/// Status of the HiGHS run, in crate terms
///
/// Every column of a design problem is bounded, so a problem HiGHS can't tell apart from an
/// unbounded one is infeasible.
fn map_status(raw_status: HighsModelStatus) -> OptimizationStatus {
    match raw_status {
        HighsModelStatus::Optimal => OptimizationStatus::Optimal,
        HighsModelStatus::Infeasible | HighsModelStatus::UnboundedOrInfeasible => {
            OptimizationStatus::Infeasible
        }
        HighsModelStatus::Unbounded => OptimizationStatus::Unbounded,
        HighsModelStatus::ReachedTimeLimit => OptimizationStatus::TimeLimit,
        HighsModelStatus::ReachedIterationLimit => OptimizationStatus::SolverHalted,
        _ => OptimizationStatus::NumericalError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(
            map_status(HighsModelStatus::UnboundedOrInfeasible),
            OptimizationStatus::Infeasible
        );
        assert_eq!(
            map_status(HighsModelStatus::Infeasible),
            OptimizationStatus::Infeasible
        );
        assert_eq!(
            map_status(HighsModelStatus::Unbounded),
            OptimizationStatus::Unbounded
        );
        assert_eq!(
            map_status(HighsModelStatus::ReachedTimeLimit),
            OptimizationStatus::TimeLimit
        );
        assert!(!map_status(HighsModelStatus::SolveError).has_solution());
    }
}
