//! Solver boundary, and the backends implementing it
//!
//! Backends only translate a [`MilpProblem`] into their own representation and the result back
//! into a [`ProblemSolution`]; no strain design logic lives here.
use crate::configuration::{Solver, SolverSettings};
use crate::optimize::problem::{MilpProblem, ProblemError, ProblemType};
use crate::optimize::ProblemSolution;
use thiserror::Error;

pub mod clarabel;
#[cfg(feature = "highs")]
pub mod highs;
#[cfg(feature = "minilp")]
pub mod microlp;

/// A backend able to solve problems of the form described by [`MilpProblem`]
pub trait MilpSolver {
    /// Name reported in the solution diagnostics
    fn name(&self) -> &'static str;

    /// Whether the backend handles integer variables
    fn integer_variable_capable(&self) -> bool;

    /// Solve the problem
    ///
    /// Infeasible, unbounded, and time limited problems are reported through the status of the
    /// returned solution, an `Err` means the backend couldn't run at all.
    fn solve(
        &self,
        problem: &MilpProblem,
        settings: &SolverSettings,
    ) -> Result<ProblemSolution, SolverError>;
}

/// Create the backend selected in the settings
pub fn solver_for(settings: &SolverSettings) -> Result<Box<dyn MilpSolver>, SolverError> {
    match settings.solver {
        Solver::Microlp => microlp_backend(),
        Solver::Highs => highs_backend(),
        Solver::Clarabel => Ok(Box::new(clarabel::ClarabelSolver::default())),
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "minilp")] {
        fn microlp_backend() -> Result<Box<dyn MilpSolver>, SolverError> {
            Ok(Box::new(microlp::MicrolpSolver::default()))
        }
    } else {
        fn microlp_backend() -> Result<Box<dyn MilpSolver>, SolverError> {
            Err(SolverError::FeatureNotEnabled {
                solver: Solver::Microlp,
                feature: "minilp",
            })
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "highs")] {
        fn highs_backend() -> Result<Box<dyn MilpSolver>, SolverError> {
            Ok(Box::new(highs::HighsSolver::default()))
        }
    } else {
        fn highs_backend() -> Result<Box<dyn MilpSolver>, SolverError> {
            Err(SolverError::FeatureNotEnabled {
                solver: Solver::Highs,
                feature: "highs",
            })
        }
    }
}

/// Checks shared by every backend before it starts translating a problem
pub(crate) fn check_dispatchable(
    solver: &dyn MilpSolver,
    problem: &MilpProblem,
) -> Result<(), SolverError> {
    problem.validate()?;
    if problem.problem_type() == ProblemType::LinearMixedInteger
        && !solver.integer_variable_capable()
    {
        return Err(SolverError::IntegerVariablesUnsupported {
            solver: solver.name(),
        });
    }
    Ok(())
}

/// Round an integer variable bound, saturating infinite bounds
#[allow(dead_code)]
pub(crate) fn integer_bound(value: f64) -> i32 {
    if value.is_finite() {
        value.round() as i32
    } else if value > 0f64 {
        i32::MAX
    } else {
        i32::MIN
    }
}

/// Errors raised at the solver boundary
#[derive(Error, Debug, Clone)]
pub enum SolverError {
    /// Error when the selected backend wasn't compiled in
    #[error("Solver {solver:?} requires the `{feature}` feature")]
    FeatureNotEnabled {
        solver: Solver,
        feature: &'static str,
    },
    /// Error when an integer problem is handed to a continuous solver
    #[error("Solver {solver} can't handle integer variables")]
    IntegerVariablesUnsupported { solver: &'static str },
    /// Error when the problem itself is malformed
    #[error("Problem failed validation: {0}")]
    InvalidProblem(#[from] ProblemError),
    /// Error reported by the backend
    #[error("Solver backend failed: {0}")]
    Backend(String),
}
