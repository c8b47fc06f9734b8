//! Inequality systems carrying named row and column blocks
//!
//! A [`LinearSystem`] is the unit passed between assembly stages:
//!
//! ```text
//! maximize  c'x
//! s.t.      A x + Ay g <= b
//!           lower <= x <= upper
//! ```
//!
//! where `g` are the binary gates, owned by the caller and never optimized over by the system
//! itself. Both `A` and `Ay` share the row manifest.
use std::fmt;

use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::design::StructuralError;
use crate::optimize::manifest::{check_len, Manifest};
use crate::utils::sparse::{csr_from_triplets, push_block};

/// Names of the row and column blocks appearing in the assembled systems
///
/// Blocks produced by a duality embedding carry the level of the embedding, 1 for the growth
/// problem and 2 for the worst case production problem.
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    // region Columns
    /// One way fluxes
    Flux,
    /// Dual variables, one per primal row
    Dual(u8),
    /// Linearized products of a binary gate and a dual variable
    Product(u8),
    /// Knockout binaries
    KnockoutGate,
    /// Binaries of the native cofactor variant of swappable reactions
    NativeGate,
    /// Binaries of the swapped cofactor variant
    SwapGate,
    // endregion Columns

    // region Rows
    /// `S v <= 0`
    MassBalance,
    /// `-S v <= 0`
    MassBalanceReverse,
    /// Upper bounds of ungated fluxes
    FreeUpper,
    /// Lower bounds of ungated fluxes
    FreeLower,
    /// Upper bounds of gated fluxes, `v - ub g <= 0`
    GatedUpper,
    /// Lower bounds of gated fluxes, `-v + lb g <= 0`
    GatedLower,
    /// `A'w <= c`
    DualFeasibility(u8),
    /// `-A'w <= -c`
    DualFeasibilityReverse(u8),
    /// `z - M g <= 0`
    ProductGate(u8),
    /// `z - w <= 0`
    ProductDual(u8),
    /// `-z + w + M g <= M`
    ProductLink(u8),
    /// Primal objective at least the dual objective
    StrongDuality,
    /// Box upper bounds of a column block written as rows
    ColumnUpper(Box<Block>),
    /// Box lower bounds of a column block written as rows
    ColumnLower(Box<Block>),
    KnockoutCount,
    SwapCount,
    InterventionCount,
    /// `q + s <= 1`
    SwapPairing,
    /// `-q - s <= -1`
    SwapPairingFloor,
    // endregion Rows
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::Flux => write!(f, "flux"),
            Block::Dual(level) => write!(f, "dual_{level}"),
            Block::Product(level) => write!(f, "product_{level}"),
            Block::KnockoutGate => write!(f, "knockout_gate"),
            Block::NativeGate => write!(f, "native_gate"),
            Block::SwapGate => write!(f, "swap_gate"),
            Block::MassBalance => write!(f, "mass_balance"),
            Block::MassBalanceReverse => write!(f, "mass_balance_reverse"),
            Block::FreeUpper => write!(f, "free_upper"),
            Block::FreeLower => write!(f, "free_lower"),
            Block::GatedUpper => write!(f, "gated_upper"),
            Block::GatedLower => write!(f, "gated_lower"),
            Block::DualFeasibility(level) => write!(f, "dual_feasibility_{level}"),
            Block::DualFeasibilityReverse(level) => {
                write!(f, "dual_feasibility_reverse_{level}")
            }
            Block::ProductGate(level) => write!(f, "product_gate_{level}"),
            Block::ProductDual(level) => write!(f, "product_dual_{level}"),
            Block::ProductLink(level) => write!(f, "product_link_{level}"),
            Block::StrongDuality => write!(f, "strong_duality"),
            Block::ColumnUpper(block) => write!(f, "{block}_upper"),
            Block::ColumnLower(block) => write!(f, "{block}_lower"),
            Block::KnockoutCount => write!(f, "knockout_count"),
            Block::SwapCount => write!(f, "swap_count"),
            Block::InterventionCount => write!(f, "intervention_count"),
            Block::SwapPairing => write!(f, "swap_pairing"),
            Block::SwapPairingFloor => write!(f, "swap_pairing_floor"),
        }
    }
}

/// Inequality system over continuous columns and external binary gates
#[derive(Clone, Debug)]
pub struct LinearSystem {
    /// Coefficients of the continuous columns
    pub a: CsrMatrix<f64>,
    /// Coefficients of the binary gates
    pub ay: CsrMatrix<f64>,
    /// Right hand side
    pub b: Vec<f64>,
    /// Objective of the system (maximized)
    pub objective: Vec<f64>,
    /// Box lower bounds of the continuous columns
    pub lower: Vec<f64>,
    /// Box upper bounds of the continuous columns
    pub upper: Vec<f64>,
    pub rows: Manifest<Block>,
    pub cols: Manifest<Block>,
}

impl LinearSystem {
    pub fn num_rows(&self) -> usize {
        self.b.len()
    }

    pub fn num_cols(&self) -> usize {
        self.objective.len()
    }

    pub fn num_gates(&self) -> usize {
        self.ay.ncols()
    }

    /// Check that every matrix and vector agrees with the manifests
    pub fn validate(&self, stage: &'static str) -> Result<(), StructuralError> {
        let rows = self.rows.len();
        let cols = self.cols.len();
        check_len(stage, "A rows", rows, self.a.nrows())?;
        check_len(stage, "Ay rows", rows, self.ay.nrows())?;
        check_len(stage, "right hand side", rows, self.b.len())?;
        check_len(stage, "A columns", cols, self.a.ncols())?;
        check_len(stage, "objective", cols, self.objective.len())?;
        check_len(stage, "lower bounds", cols, self.lower.len())?;
        check_len(stage, "upper bounds", cols, self.upper.len())?;
        Ok(())
    }

    /// Join two systems sharing the same gates, without coupling their continuous columns
    ///
    /// Rows of `self` come first, then rows of `other`; likewise for the columns.
    pub fn block_diagonal(&self, other: &LinearSystem) -> Result<LinearSystem, StructuralError> {
        self.validate("block diagonal join")?;
        other.validate("block diagonal join")?;
        check_len(
            "block diagonal join",
            "gates",
            self.num_gates(),
            other.num_gates(),
        )?;
        let (m1, n1) = (self.num_rows(), self.num_cols());
        let (m, n) = (m1 + other.num_rows(), n1 + other.num_cols());
        let mut a = CooMatrix::new(m, n);
        push_block(&mut a, &self.a, 0, 0, 1f64);
        push_block(&mut a, &other.a, m1, n1, 1f64);
        let mut ay = CooMatrix::new(m, self.num_gates());
        push_block(&mut ay, &self.ay, 0, 0, 1f64);
        push_block(&mut ay, &other.ay, m1, 0, 1f64);

        let mut rows = self.rows.clone();
        rows.extend(&other.rows);
        let mut cols = self.cols.clone();
        cols.extend(&other.cols);
        Ok(LinearSystem {
            a: CsrMatrix::from(&a),
            ay: CsrMatrix::from(&ay),
            b: [self.b.as_slice(), other.b.as_slice()].concat(),
            objective: [self.objective.as_slice(), other.objective.as_slice()].concat(),
            lower: [self.lower.as_slice(), other.lower.as_slice()].concat(),
            upper: [self.upper.as_slice(), other.upper.as_slice()].concat(),
            rows,
            cols,
        })
    }

    /// Append one block of rows
    ///
    /// `a_entries` and `ay_entries` are (row within the block, column, value) triplets.
    pub fn append_rows(
        &self,
        block: Block,
        a_entries: &[(usize, usize, f64)],
        ay_entries: &[(usize, usize, f64)],
        rhs: &[f64],
    ) -> LinearSystem {
        let offset = self.num_rows();
        let m = offset + rhs.len();
        let a = csr_from_triplets(
            m,
            self.num_cols(),
            self.a
                .triplet_iter()
                .map(|(r, c, v)| (r, c, *v))
                .chain(a_entries.iter().map(|(r, c, v)| (offset + r, *c, *v))),
        );
        let ay = csr_from_triplets(
            m,
            self.num_gates(),
            self.ay
                .triplet_iter()
                .map(|(r, c, v)| (r, c, *v))
                .chain(ay_entries.iter().map(|(r, c, v)| (offset + r, *c, *v))),
        );
        let mut rows = self.rows.clone();
        rows.push(block, rhs.len());
        LinearSystem {
            a,
            ay,
            b: [self.b.as_slice(), rhs].concat(),
            objective: self.objective.clone(),
            lower: self.lower.clone(),
            upper: self.upper.clone(),
            rows,
            cols: self.cols.clone(),
        }
    }

    /// Write the box bounds of the given column blocks as rows
    ///
    /// For every column of each block two rows are added, `x <= upper` and `-x <= -lower`.
    /// The box bounds themselves are kept.
    pub fn with_bound_rows(&self, blocks: &[Block]) -> Result<LinearSystem, StructuralError> {
        let mut system = self.clone();
        for block in blocks {
            let range = self.cols.range(block).ok_or_else(|| StructuralError::MissingBlock {
                stage: "bound rows",
                block: block.to_string(),
            })?;
            let upper: Vec<(usize, usize, f64)> = range
                .clone()
                .enumerate()
                .map(|(r, c)| (r, c, 1f64))
                .collect();
            let lower: Vec<(usize, usize, f64)> = range
                .clone()
                .enumerate()
                .map(|(r, c)| (r, c, -1f64))
                .collect();
            let ub: Vec<f64> = self.upper[range.clone()].to_vec();
            let lb: Vec<f64> = self.lower[range].iter().map(|l| -l).collect();
            system = system
                .append_rows(Block::ColumnUpper(Box::new(block.clone())), &upper, &[], &ub)
                .append_rows(Block::ColumnLower(Box::new(block.clone())), &lower, &[], &lb);
        }
        Ok(system)
    }
}
