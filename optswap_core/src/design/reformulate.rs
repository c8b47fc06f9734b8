//! Single level reformulation of the bilevel design problems
//!
//! All problem variants go through [`reformulate`], which assembles the primal growth problem,
//! embeds its dual, and (for the worst case variants) dualizes the resulting system a second
//! time. Rows acting on the binaries alone come from a callback over the [`BinaryLayout`].
use log::{debug, info};
use nalgebra_sparse::CooMatrix;

use crate::configuration::{DesignConfiguration, KnockType};
use crate::design::blocks::{Block, LinearSystem};
use crate::design::dual::{separate_transpose_join, DualCeiling, DualEmbedding};
use crate::design::primal::assemble_primal;
use crate::design::split::{BinaryLayout, SplitModel};
use crate::design::{Stage, StructuralError};
use crate::optimize::manifest::{check_len, Manifest};
use crate::optimize::problem::{MilpProblem, ObjectiveSense};
use crate::utils::sparse::push_block;

/// Shape of the single level problem
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    /// Growth optimality through one duality embedding, production maximized optimistically
    SingleLevel,
    /// Production maximized at its worst over all growth optimal fluxes
    WorstCase,
    /// [`Variant::WorstCase`] with cofactor swap binaries
    WorstCaseWithSwap,
    /// Production maximized above a growth floor, swap binaries only
    YieldWithSwap,
}

impl Variant {
    pub fn has_knockouts(&self) -> bool {
        !matches!(self, Variant::YieldWithSwap)
    }

    pub fn has_swaps(&self) -> bool {
        matches!(self, Variant::WorstCaseWithSwap | Variant::YieldWithSwap)
    }

    /// Whether the growth problem gets dualized at all
    pub fn has_dual(&self) -> bool {
        !matches!(self, Variant::YieldWithSwap)
    }
}

impl From<KnockType> for Variant {
    fn from(knock_type: KnockType) -> Self {
        match knock_type {
            KnockType::OptKnock => Variant::SingleLevel,
            KnockType::RobustKnock => Variant::WorstCase,
            KnockType::OptSwap => Variant::WorstCaseWithSwap,
            KnockType::OptSwapYield => Variant::YieldWithSwap,
        }
    }
}

/// Rows over the binaries only, `sum coef * g <= rhs`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BinaryRows {
    pub rows: Manifest<Block>,
    /// (row, gate, coefficient)
    pub entries: Vec<(usize, usize, f64)>,
    pub rhs: Vec<f64>,
}

impl BinaryRows {
    pub fn len(&self) -> usize {
        self.rhs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rhs.is_empty()
    }

    /// Append a block of rows, each given by its (gate, coefficient) terms and right hand side
    ///
    /// Rows without terms are vacuous and dropped, as are empty blocks.
    pub fn push_block(&mut self, block: Block, rows: Vec<(Vec<(usize, f64)>, f64)>) {
        let rows: Vec<_> = rows.into_iter().filter(|(terms, _)| !terms.is_empty()).collect();
        if rows.is_empty() {
            return;
        }
        self.rows.push(block, rows.len());
        for (terms, rhs) in rows {
            let row = self.rhs.len();
            self.entries
                .extend(terms.into_iter().map(|(gate, coef)| (row, gate, coef)));
            self.rhs.push(rhs);
        }
    }

    /// Largest violation of any row at the given binary values, 0 if all hold
    pub fn max_violation(&self, binaries: &[f64]) -> f64 {
        let mut activity = vec![0f64; self.rhs.len()];
        for &(row, gate, coef) in &self.entries {
            activity[row] += coef * binaries[gate];
        }
        activity
            .iter()
            .zip(&self.rhs)
            .map(|(a, b)| a - b)
            .fold(0f64, f64::max)
    }
}

/// Count limits and swap pairing for the given layout
///
/// - knockouts: `-sum y - sum q - sum s <= K - |y| - |q|`
/// - swaps: `sum s <= L`
/// - interventions: `-sum y - sum q <= X - |y| - |q|`
/// - pairing of each (q, s): `q + s <= 1`, and `-q - s <= -1` unless full dehydrogenase knockouts
///   are allowed
///
/// A negative count leaves its row out.
pub fn intervention_rows(config: &DesignConfiguration, layout: &BinaryLayout) -> BinaryRows {
    let mut rows = BinaryRows::default();
    let n_y = layout.knockout_range().len() as f64;
    let n_q = layout.native_range().len() as f64;
    let terms = |gates: Vec<usize>, coef: f64| -> Vec<(usize, f64)> {
        gates.into_iter().map(|g| (g, coef)).collect()
    };

    if config.knockout_count >= 0 {
        let gates: Vec<usize> = layout
            .knockout_range()
            .chain(layout.native_range())
            .chain(layout.swap_range())
            .collect();
        rows.push_block(
            Block::KnockoutCount,
            vec![(terms(gates, -1f64), config.knockout_count as f64 - n_y - n_q)],
        );
    }
    if config.swap_count >= 0 {
        rows.push_block(
            Block::SwapCount,
            vec![(
                terms(layout.swap_range().collect(), 1f64),
                config.swap_count as f64,
            )],
        );
    }
    if config.intervention_count >= 0 {
        let gates: Vec<usize> = layout.knockout_range().chain(layout.native_range()).collect();
        rows.push_block(
            Block::InterventionCount,
            vec![(
                terms(gates, -1f64),
                config.intervention_count as f64 - n_y - n_q,
            )],
        );
    }

    let pairs = layout.swap_pairs();
    rows.push_block(
        Block::SwapPairing,
        pairs
            .iter()
            .map(|&(q, s)| (vec![(q, 1f64), (s, 1f64)], 1f64))
            .collect(),
    );
    if !config.allow_full_dehydrogenase_knockout {
        rows.push_block(
            Block::SwapPairingFloor,
            pairs
                .iter()
                .map(|&(q, s)| (vec![(q, -1f64), (s, -1f64)], -1f64))
                .collect(),
        );
    }
    rows
}

/// Assemble the mixed integer problem `max objective'x` over `system`, with its gates binary
///
/// Columns are the system columns followed by the gates, rows the system rows followed by
/// `binary_rows`.
pub fn to_milp(
    system: &LinearSystem,
    objective: Vec<f64>,
    gates: &Manifest<Block>,
    binary_rows: &BinaryRows,
) -> Result<MilpProblem, StructuralError> {
    system.validate("milp assembly")?;
    let (m, n, nb) = (system.num_rows(), system.num_cols(), system.num_gates());
    check_len("milp assembly", "gates", gates.len(), nb)?;
    check_len("milp assembly", "objective", n, objective.len())?;
    check_len("milp assembly", "binary rows", binary_rows.rows.len(), binary_rows.len())?;
    if let Some(&(_, gate, _)) = binary_rows.entries.iter().find(|(_, g, _)| *g >= nb) {
        return Err(StructuralError::UnknownGate { gate, len: nb });
    }

    let mut coo = CooMatrix::new(m + binary_rows.len(), n + nb);
    push_block(&mut coo, &system.a, 0, 0, 1f64);
    push_block(&mut coo, &system.ay, 0, n, 1f64);
    for &(row, gate, coef) in &binary_rows.entries {
        if coef != 0f64 {
            coo.push(m + row, n + gate, coef);
        }
    }

    let mut columns = system.cols.labels();
    columns.extend(&gates.labels());
    let mut rows = system.rows.labels();
    rows.extend(&binary_rows.rows.labels());

    let mut full_objective = objective;
    full_objective.extend(std::iter::repeat(0f64).take(nb));
    let mut lower_bounds = system.lower.clone();
    lower_bounds.extend(std::iter::repeat(0f64).take(nb));
    let mut upper_bounds = system.upper.clone();
    upper_bounds.extend(std::iter::repeat(1f64).take(nb));

    Ok(MilpProblem {
        objective: full_objective,
        constraints: (&coo).into(),
        rhs: [system.b.as_slice(), binary_rows.rhs.as_slice()].concat(),
        lower_bounds,
        upper_bounds,
        integer_variables: (n..n + nb).collect(),
        sense: ObjectiveSense::Maximize,
        columns,
        rows,
    })
}

/// Primal rows, level 1 dual rows, and the strong duality row over `[v | w | z]`
fn single_level_system(
    primal: &LinearSystem,
    dual: &DualEmbedding,
) -> Result<LinearSystem, StructuralError> {
    primal.rows.expect_blocks(
        "single level stacking",
        &[
            Block::MassBalance,
            Block::MassBalanceReverse,
            Block::FreeUpper,
            Block::FreeLower,
            Block::GatedUpper,
            Block::GatedLower,
        ],
    )?;
    check_len(
        "single level stacking",
        "dual variables",
        primal.num_rows(),
        dual.w_size,
    )?;
    dual.system
        .cols
        .expect_blocks("single level stacking", &[Block::Dual(1), Block::Product(1)])?;

    let joined = primal.block_diagonal(&dual.system)?;
    let n = primal.num_cols();
    // -c'v + b'w - sum Ay z <= 0
    let strong_duality: Vec<(usize, usize, f64)> = primal
        .objective
        .iter()
        .enumerate()
        .map(|(j, c)| (0, j, -c))
        .chain(
            dual.min_objective()
                .into_iter()
                .enumerate()
                .map(|(k, c)| (0, n + k, c)),
        )
        .filter(|(_, _, v)| *v != 0f64)
        .collect();
    Ok(joined.append_rows(Block::StrongDuality, &strong_duality, &[], &[0f64]))
}

/// Build the single level mixed integer problem for `variant`
///
/// `ceiling` bounds the level 1 dual variables, level 2 duals are bounded by `max_dual_bound`.
/// `min_biomass` is the growth floor of [`Variant::YieldWithSwap`] and ignored otherwise.
/// `binary_rows` receives the final binary layout and returns the rows acting on it.
///
/// Column layout of the result, with the binaries always last and ordered `[y | q | s]`:
///
/// - `SingleLevel`: `[v | w | z | g]`
/// - `WorstCase`, `WorstCaseWithSwap`: `[v | w | z | u | z2 | g]`, where `(v, w, z)` is a
///   feasible growth optimal point and `(u, z2)` the level 2 dual
/// - `YieldWithSwap`: `[v | g]`
pub fn reformulate<F>(
    variant: Variant,
    split: &SplitModel,
    ceiling: &DualCeiling,
    max_dual_bound: f64,
    min_biomass: f64,
    binary_rows: F,
) -> Result<MilpProblem, StructuralError>
where
    F: FnOnce(&BinaryLayout) -> BinaryRows,
{
    info!("{}", Stage::AssemblePrimal);
    let floored;
    let split = if variant == Variant::YieldWithSwap {
        floored = split.with_growth_floor(min_biomass);
        &floored
    } else {
        split
    };
    let primal = assemble_primal(split)?;
    let gates = split.layout.manifest();

    let (system, objective) = match variant {
        Variant::YieldWithSwap => {
            let objective = split.c_chemical.clone();
            (primal, objective)
        }
        Variant::SingleLevel => {
            info!("{}", Stage::EmbedDual1);
            let dual = separate_transpose_join(&primal, 1, ceiling)?;
            let system = single_level_system(&primal, &dual)?;
            let mut objective = split.c_chemical.clone();
            objective.resize(system.num_cols(), 0f64);
            (system, objective)
        }
        Variant::WorstCase | Variant::WorstCaseWithSwap => {
            info!("{}", Stage::EmbedDual1);
            let dual = separate_transpose_join(&primal, 1, ceiling)?;
            let level_one = single_level_system(&primal, &dual)?;

            info!("{}", Stage::AssembleLevel2);
            // inner problem: minimize production over the growth optimal points
            let mut inner = level_one.with_bound_rows(&[Block::Dual(1), Block::Product(1)])?;
            inner.objective = split.c_chemical.iter().map(|c| -c).collect();
            // sized by the manifest, num_cols() follows the objective
            let cols = inner.cols.len();
            inner.objective.resize(cols, 0f64);

            info!("{}", Stage::EmbedDual2);
            let dual_two =
                separate_transpose_join(&inner, 2, &DualCeiling::Uniform(max_dual_bound))?;
            check_len(
                "level 2 stacking",
                "dual variables",
                inner.num_rows(),
                dual_two.w_size,
            )?;
            let system = inner.block_diagonal(&dual_two.system)?;
            // maximize the negated level 2 dual objective, the worst case production
            let mut objective = vec![0f64; inner.num_cols()];
            objective.extend_from_slice(&dual_two.system.objective);
            (system, objective)
        }
    };

    info!("{}", Stage::ApplyCountConstraints);
    let rows = binary_rows(&split.layout);
    let problem = to_milp(&system, objective, &gates, &rows)?;
    debug!(
        "{:?} problem: {} columns ({} binary), {} rows, {} nonzeros",
        variant,
        problem.num_variables(),
        problem.integer_variables.len(),
        problem.num_constraints(),
        problem.constraints.nnz()
    );
    Ok(problem)
}
