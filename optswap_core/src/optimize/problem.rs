//! Provides struct representing a mixed integer linear program in standard form
//!
//! ```text
//! optimize  c'x
//! s.t.      A x <= b
//!           lb <= x <= ub
//!           x_i integer for i in integer_variables
//! ```
use crate::optimize::manifest::Manifest;
use crate::utils::sparse::mul_vec;
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents the sense of the objective, whether it should be maximized or minimized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveSense {
    /// The objective should be minimized
    Minimize,
    /// The objective should be maximized
    Maximize,
}

/// Types of optimization problems
#[derive(Clone, Debug, PartialEq)]
pub enum ProblemType {
    /// Problem with linear objectives and constraints, and continuous variables
    LinearContinuous,
    /// Problem with linear objective and constraints, with integer and continuous variables
    LinearMixedInteger,
}

/// A fully assembled optimization problem
#[derive(Debug, Clone)]
pub struct MilpProblem {
    /// Objective coefficients (C)
    pub objective: Vec<f64>,
    /// Inequality matrix (A)
    pub constraints: CsrMatrix<f64>,
    /// Right hand side (B)
    pub rhs: Vec<f64>,
    /// Lower variable bounds, may be `f64::NEG_INFINITY`
    pub lower_bounds: Vec<f64>,
    /// Upper variable bounds, may be `f64::INFINITY`
    pub upper_bounds: Vec<f64>,
    /// Indices of the variables restricted to integer values
    pub integer_variables: Vec<usize>,
    /// Sense of the objective
    pub sense: ObjectiveSense,
    /// Names and extents of the column blocks
    pub columns: Manifest<String>,
    /// Names and extents of the row blocks
    pub rows: Manifest<String>,
}

impl MilpProblem {
    // region Check Problem
    /// Number of variables (columns)
    pub fn num_variables(&self) -> usize {
        self.objective.len()
    }

    /// Number of inequality constraints (rows)
    pub fn num_constraints(&self) -> usize {
        self.rhs.len()
    }

    pub fn problem_type(&self) -> ProblemType {
        if self.integer_variables.is_empty() {
            ProblemType::LinearContinuous
        } else {
            ProblemType::LinearMixedInteger
        }
    }

    /// Check every dimension and bound invariant of the problem
    ///
    /// A problem which passes this check can be handed to any solver backend.
    pub fn validate(&self) -> Result<(), ProblemError> {
        let n = self.objective.len();
        if self.constraints.ncols() != n {
            return Err(ProblemError::ColumnCountMismatch {
                objective: n,
                matrix: self.constraints.ncols(),
            });
        }
        if self.constraints.nrows() != self.rhs.len() {
            return Err(ProblemError::RowCountMismatch {
                matrix: self.constraints.nrows(),
                rhs: self.rhs.len(),
            });
        }
        if self.lower_bounds.len() != n || self.upper_bounds.len() != n {
            return Err(ProblemError::BoundLengthMismatch {
                objective: n,
                lower: self.lower_bounds.len(),
                upper: self.upper_bounds.len(),
            });
        }
        if self.columns.len() != n || self.rows.len() != self.rhs.len() {
            return Err(ProblemError::ManifestMismatch);
        }
        for (index, (lb, ub)) in self.lower_bounds.iter().zip(&self.upper_bounds).enumerate() {
            if lb > ub || lb.is_nan() || ub.is_nan() {
                return Err(ProblemError::InvalidVariableBounds { index });
            }
        }
        for &index in &self.integer_variables {
            if index >= n {
                return Err(ProblemError::IntegerVariableOutOfRange { index, len: n });
            }
        }
        if self.objective.iter().any(|c| !c.is_finite())
            || self.rhs.iter().any(|b| !b.is_finite())
            || self.constraints.values().iter().any(|a| !a.is_finite())
        {
            return Err(ProblemError::NonFiniteCoefficient);
        }
        Ok(())
    }
    // endregion Check Problem

    /// Value of the objective at `x`
    pub fn evaluate_objective(&self, x: &[f64]) -> f64 {
        self.objective.iter().zip(x).map(|(c, v)| c * v).sum()
    }

    /// Largest violation of any row or bound at `x`, 0 if `x` is feasible
    pub fn max_violation(&self, x: &[f64]) -> f64 {
        let rows = mul_vec(&self.constraints, x)
            .into_iter()
            .zip(&self.rhs)
            .map(|(ax, b)| ax - b)
            .fold(0f64, f64::max);
        let bounds = x
            .iter()
            .zip(self.lower_bounds.iter().zip(&self.upper_bounds))
            .map(|(v, (lb, ub))| (lb - v).max(v - ub))
            .fold(0f64, f64::max);
        rows.max(bounds)
    }

    /// Fix a variable to a single value by collapsing its bounds
    pub fn fix_variable(&mut self, index: usize, value: f64) -> Result<(), ProblemError> {
        if index >= self.num_variables() {
            return Err(ProblemError::NonExistentVariable { index });
        }
        self.lower_bounds[index] = value;
        self.upper_bounds[index] = value;
        Ok(())
    }

    /// Nonzero entries of the constraint matrix, for auditing
    pub fn triplets(&self) -> Vec<(usize, usize, f64)> {
        self.constraints
            .triplet_iter()
            .map(|(r, c, v)| (r, c, *v))
            .collect()
    }
}

/// Errors associated with the Problem
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    /// Error when the objective and the constraint matrix disagree on the number of variables
    #[error("Objective has {objective} coefficients but the constraint matrix has {matrix} columns")]
    ColumnCountMismatch { objective: usize, matrix: usize },
    /// Error when the constraint matrix and right hand side disagree on the number of rows
    #[error("Constraint matrix has {matrix} rows but the right hand side has {rhs} entries")]
    RowCountMismatch { matrix: usize, rhs: usize },
    /// Error when the bound vectors don't match the number of variables
    #[error("Expected {objective} variable bounds, got {lower} lower and {upper} upper bounds")]
    BoundLengthMismatch {
        objective: usize,
        lower: usize,
        upper: usize,
    },
    /// Error when the block manifests don't cover the problem
    #[error("Row or column manifest doesn't match the problem dimensions")]
    ManifestMismatch,
    /// Error when a variable has lower_bound > upper_bound
    #[error("Variable {index} has lower_bound > upper_bound")]
    InvalidVariableBounds { index: usize },
    /// Error when an integer variable index is outside the problem
    #[error("Integer variable {index} is out of range for {len} variables")]
    IntegerVariableOutOfRange { index: usize, len: usize },
    /// Error when an objective, matrix, or right hand side entry is infinite or NaN
    #[error("Objective, constraint matrix and right hand side must be finite")]
    NonFiniteCoefficient,
    /// Error when trying to perform an update on a variable that doesn't exist
    #[error("Tried to access variable {index}, which doesn't exist")]
    NonExistentVariable { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::sparse::csr_from_triplets;

    fn small_problem() -> MilpProblem {
        // max x + 2y s.t. x + y <= 4, y binary
        let mut columns = Manifest::new();
        columns.push("x".to_string(), 1).push("y".to_string(), 1);
        let mut rows = Manifest::new();
        rows.push("capacity".to_string(), 1);
        MilpProblem {
            objective: vec![1., 2.],
            constraints: csr_from_triplets(1, 2, vec![(0, 0, 1.), (0, 1, 1.)]),
            rhs: vec![4.],
            lower_bounds: vec![0., 0.],
            upper_bounds: vec![f64::INFINITY, 1.],
            integer_variables: vec![1],
            sense: ObjectiveSense::Maximize,
            columns,
            rows,
        }
    }

    #[test]
    fn valid_problem() {
        let problem = small_problem();
        assert!(problem.validate().is_ok());
        assert_eq!(problem.problem_type(), ProblemType::LinearMixedInteger);
        assert_eq!(problem.num_variables(), 2);
        assert_eq!(problem.num_constraints(), 1);
        assert!((problem.evaluate_objective(&[3., 1.]) - 5.).abs() < 1e-12);
        assert!(problem.max_violation(&[3., 1.]).abs() < 1e-12);
        assert!((problem.max_violation(&[4., 1.]) - 1.).abs() < 1e-12);
    }

    #[test]
    fn invalid_problems() {
        let mut problem = small_problem();
        problem.rhs.push(0.);
        assert_eq!(
            problem.validate(),
            Err(ProblemError::RowCountMismatch { matrix: 1, rhs: 2 })
        );

        let mut problem = small_problem();
        problem.integer_variables.push(2);
        assert_eq!(
            problem.validate(),
            Err(ProblemError::IntegerVariableOutOfRange { index: 2, len: 2 })
        );

        let mut problem = small_problem();
        problem.lower_bounds[0] = 5.;
        problem.upper_bounds[0] = 1.;
        assert_eq!(
            problem.validate(),
            Err(ProblemError::InvalidVariableBounds { index: 0 })
        );

        let mut problem = small_problem();
        problem.objective.push(1.);
        assert!(matches!(
            problem.validate(),
            Err(ProblemError::ColumnCountMismatch { .. })
        ));

        let mut problem = small_problem();
        problem.rhs[0] = f64::INFINITY;
        assert_eq!(problem.validate(), Err(ProblemError::NonFiniteCoefficient));
    }

    #[test]
    fn fix_variable() {
        let mut problem = small_problem();
        problem.fix_variable(1, 0.).unwrap();
        assert_eq!(problem.upper_bounds[1], 0.);
        if let Err(ProblemError::NonExistentVariable { index }) = problem.fix_variable(7, 0.) {
            assert_eq!(index, 7);
        } else {
            panic!("Fixing a missing variable not caught")
        }
    }
}
