//! Module for representing and solving optimization problems

pub mod manifest;
pub mod problem;
pub mod solvers;

use serde::{Deserialize, Serialize};

/// Struct representing the solution to an optimization problem
#[derive(Clone, Debug)]
pub struct ProblemSolution {
    /// The status of the optimization problem, representing if the optimization was
    /// completed successfully
    pub status: OptimizationStatus,
    /// Optimized value of the objective
    ///
    /// Some(f64) if the solver returned a solution, None otherwise
    pub objective_value: Option<f64>,
    /// Values of the variables at the optimum (or best point found), in column order
    ///
    /// Some(Vec) if the solver returned a solution, None otherwise
    pub variable_values: Option<Vec<f64>>,
    /// What the solver reported beyond the status
    pub diagnostics: SolverDiagnostics,
}

impl ProblemSolution {
    /// A solution carrying only a status, for problems the solver couldn't solve
    pub fn without_values(status: OptimizationStatus, diagnostics: SolverDiagnostics) -> Self {
        ProblemSolution {
            status,
            objective_value: None,
            variable_values: None,
            diagnostics,
        }
    }
}

/// Raw solver information kept for auditing
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverDiagnostics {
    /// Name of the backend which produced the solution
    pub solver: String,
    /// Status exactly as the backend reported it
    pub raw_status: String,
    /// Wall clock time spent in the backend
    pub solve_seconds: f64,
    /// Any message the backend produced (error text, ignored options, ...)
    pub message: Option<String>,
}

/// Status of an optimization problem
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationStatus {
    /// Problem has not yet attempted to be optimized
    Unoptimized,
    /// Problem has been optimized
    Optimal,
    /// Problem can't be optimized because objective value is not bounded
    Unbounded,
    /// Problem can't be solved because it is infeasible (conflicting constraints)
    Infeasible,
    /// An approximate solution has been found
    AlmostOptimal,
    /// The time limit was reached, the best solution found so far is attached (if any)
    TimeLimit,
    /// A numerical error occurred during solving
    NumericalError,
    /// The solver hit the maximum allowed iterations, or made insufficient progress
    SolverHalted,
}

impl OptimizationStatus {
    /// Whether a solution with this status carries a meaningful variable assignment
    pub fn has_solution(&self) -> bool {
        matches!(
            self,
            OptimizationStatus::Optimal
                | OptimizationStatus::AlmostOptimal
                | OptimizationStatus::TimeLimit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_has_solution() {
        assert!(OptimizationStatus::Optimal.has_solution());
        assert!(OptimizationStatus::TimeLimit.has_solution());
        assert!(!OptimizationStatus::Infeasible.has_solution());
        assert!(!OptimizationStatus::Unbounded.has_solution());
        let solution = ProblemSolution::without_values(
            OptimizationStatus::Infeasible,
            SolverDiagnostics::default(),
        );
        assert!(solution.variable_values.is_none());
    }
}
