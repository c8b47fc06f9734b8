//! LP duality embedding of a gated inequality system
//!
//! For the primal
//!
//! ```text
//! maximize  c'v
//! s.t.      A v <= b - Ay g      (v free, g fixed binaries)
//! ```
//!
//! the dual is `minimize (b - Ay g)'w s.t. A'w = c, w >= 0`. The bilinear terms `g_j w_r` are
//! replaced by one product variable per nonzero of `Ay`, kept exact by the usual big-M rows with
//! the row's dual ceiling as M.
use log::{debug, info};
use nalgebra_sparse::CooMatrix;

use crate::configuration::SolverSettings;
use crate::design::blocks::{Block, LinearSystem};
use crate::design::{DesignError, StructuralError};
use crate::optimize::manifest::{check_len, Manifest};
use crate::optimize::problem::{MilpProblem, ObjectiveSense};
use crate::optimize::solvers::MilpSolver;
use crate::utils::sparse::{csr_from_triplets, mul_vec, push_block, push_block_transposed};

/// Upper bound of the dual variables
#[derive(Clone, Debug, PartialEq)]
pub enum DualCeiling {
    /// The same ceiling for every row
    Uniform(f64),
    /// One ceiling per primal row, see [`calibrate_dual_ceilings`]
    PerRow(Vec<f64>),
}

impl DualCeiling {
    pub fn for_row(&self, row: usize) -> f64 {
        match self {
            DualCeiling::Uniform(ceiling) => *ceiling,
            DualCeiling::PerRow(ceilings) => ceilings[row],
        }
    }

    fn check(&self, rows: usize) -> Result<(), StructuralError> {
        if let DualCeiling::PerRow(ceilings) = self {
            check_len("dual embedding", "dual ceilings", rows, ceilings.len())?;
        }
        Ok(())
    }
}

/// Output of [`separate_transpose_join`]
#[derive(Clone, Debug)]
pub struct DualEmbedding {
    /// Dual system over `[w | z]`, its objective is `C_w`, the negated dual objective
    pub system: LinearSystem,
    /// Number of dual variables, one per primal row
    pub w_size: usize,
    /// Number of product variables, one per nonzero of the gate block
    pub z_size: usize,
    /// (primal row, gate, coefficient) of each product variable
    pub products: Vec<(usize, usize, f64)>,
}

impl DualEmbedding {
    /// Dual objective in minimization form, `b'w - sum Ay_rj z_rj`
    pub fn min_objective(&self) -> Vec<f64> {
        self.system.objective.iter().map(|c| -c).collect()
    }
}

/// Build the dual of `primal`, with its gate dependence carried by product variables
///
/// The columns of the returned system are `[Dual(level) | Product(level)]` and it shares the
/// gates of `primal`. Rows are, in order:
///
/// - `A'w <= c` and `-A'w <= -c`
/// - `z_k - M g_j <= 0`
/// - `z_k - w_r <= 0`
/// - `-z_k + w_r + M g_j <= M`
///
/// where `k` runs over the nonzeros `(r, j)` of `Ay` and `M` is the ceiling of row `r`.
pub fn separate_transpose_join(
    primal: &LinearSystem,
    level: u8,
    ceiling: &DualCeiling,
) -> Result<DualEmbedding, StructuralError> {
    primal.validate("dual embedding")?;
    let (m, n) = (primal.num_rows(), primal.num_cols());
    ceiling.check(m)?;

    let products: Vec<(usize, usize, f64)> = primal
        .ay
        .triplet_iter()
        .filter(|(_, _, v)| **v != 0f64)
        .map(|(r, j, v)| (r, j, *v))
        .collect();
    let p = products.len();

    let rows_total = 2 * n + 3 * p;
    let mut a = CooMatrix::new(rows_total, m + p);
    let mut ay: Vec<(usize, usize, f64)> = Vec::with_capacity(2 * p);
    push_block_transposed(&mut a, &primal.a, 0, 0, 1f64);
    push_block_transposed(&mut a, &primal.a, n, 0, -1f64);
    let mut b: Vec<f64> = primal.objective.clone();
    b.extend(primal.objective.iter().map(|c| -c));

    let gate_rows = 2 * n;
    let dual_rows = gate_rows + p;
    let link_rows = dual_rows + p;
    for (k, &(r, j, _)) in products.iter().enumerate() {
        let big_m = ceiling.for_row(r);
        let z = m + k;
        a.push(gate_rows + k, z, 1f64);
        ay.push((gate_rows + k, j, -big_m));

        a.push(dual_rows + k, z, 1f64);
        a.push(dual_rows + k, r, -1f64);

        a.push(link_rows + k, z, -1f64);
        a.push(link_rows + k, r, 1f64);
        ay.push((link_rows + k, j, big_m));
    }
    b.extend(std::iter::repeat(0f64).take(2 * p));
    b.extend(products.iter().map(|(r, _, _)| ceiling.for_row(*r)));

    let mut objective: Vec<f64> = primal.b.iter().map(|v| -v).collect();
    objective.extend(products.iter().map(|(_, _, v)| *v));
    let mut upper: Vec<f64> = (0..m).map(|r| ceiling.for_row(r)).collect();
    upper.extend(products.iter().map(|(r, _, _)| ceiling.for_row(*r)));

    let mut rows = Manifest::new();
    rows.push(Block::DualFeasibility(level), n)
        .push(Block::DualFeasibilityReverse(level), n)
        .push(Block::ProductGate(level), p)
        .push(Block::ProductDual(level), p)
        .push(Block::ProductLink(level), p);
    let mut cols = Manifest::new();
    cols.push(Block::Dual(level), m).push(Block::Product(level), p);

    let system = LinearSystem {
        a: (&a).into(),
        ay: csr_from_triplets(rows_total, primal.num_gates(), ay),
        b,
        objective,
        lower: vec![0f64; m + p],
        upper,
        rows,
        cols,
    };
    system.validate("dual embedding")?;
    debug!("Level {level} dual: {m} dual variables, {p} products, {rows_total} rows");
    Ok(DualEmbedding {
        system,
        w_size: m,
        z_size: p,
        products,
    })
}

/// Largest value each dual variable takes over the optimal dual face of the wild type
///
/// All gates are set to 1. The growth optimum `mu` of the primal is computed first, then for every
/// row `r` the LP `max w_r s.t. A'w = c, (b - Ay 1)'w <= mu, 0 <= w <= max_dual_bound` is solved.
/// This takes one LP per row and is meant for calibrating `max_dual_bound`.
pub fn calibrate_dual_ceilings(
    primal: &LinearSystem,
    max_dual_bound: f64,
    solver: &dyn MilpSolver,
    settings: &SolverSettings,
) -> Result<Vec<f64>, DesignError> {
    primal.validate("dual calibration")?;
    let (m, n) = (primal.num_rows(), primal.num_cols());
    let gated_rhs: Vec<f64> = primal
        .b
        .iter()
        .zip(mul_vec(&primal.ay, &vec![1f64; primal.num_gates()]))
        .map(|(b, ay)| b - ay)
        .collect();

    let mut columns = Manifest::new();
    columns.push(Block::Flux.to_string(), n);
    let mut rows = Manifest::new();
    rows.push("wild_type".to_string(), m);
    let wild_type = MilpProblem {
        objective: primal.objective.clone(),
        constraints: primal.a.clone(),
        rhs: gated_rhs.clone(),
        lower_bounds: primal.lower.clone(),
        upper_bounds: primal.upper.clone(),
        integer_variables: Vec::new(),
        sense: ObjectiveSense::Maximize,
        columns,
        rows,
    };
    let solution = solver.solve(&wild_type, settings)?;
    let growth = match (solution.status.has_solution(), solution.objective_value) {
        (true, Some(value)) => value,
        _ => {
            return Err(DesignError::Calibration {
                stage: "wild type growth",
                status: solution.status,
            })
        }
    };
    info!("Calibrating {m} dual ceilings at wild type growth {growth}");

    let mut coo = CooMatrix::new(2 * n + 1, m);
    push_block_transposed(&mut coo, &primal.a, 0, 0, 1f64);
    push_block_transposed(&mut coo, &primal.a, n, 0, -1f64);
    let objective_row = csr_from_triplets(
        1,
        m,
        gated_rhs.iter().enumerate().map(|(r, v)| (0, r, *v)),
    );
    push_block(&mut coo, &objective_row, 2 * n, 0, 1f64);
    let mut rhs: Vec<f64> = primal.objective.clone();
    rhs.extend(primal.objective.iter().map(|c| -c));
    rhs.push(growth + settings.feasibility_tolerance.max(1e-7) * (1f64 + growth.abs()));

    let mut columns = Manifest::new();
    columns.push(Block::Dual(1).to_string(), m);
    let mut rows = Manifest::new();
    rows.push(Block::DualFeasibility(1).to_string(), n)
        .push(Block::DualFeasibilityReverse(1).to_string(), n)
        .push(Block::StrongDuality.to_string(), 1);
    let mut face = MilpProblem {
        objective: vec![0f64; m],
        constraints: (&coo).into(),
        rhs,
        lower_bounds: vec![0f64; m],
        upper_bounds: vec![max_dual_bound; m],
        integer_variables: Vec::new(),
        sense: ObjectiveSense::Maximize,
        columns,
        rows,
    };

    let mut ceilings = Vec::with_capacity(m);
    for r in 0..m {
        face.objective.iter_mut().for_each(|c| *c = 0f64);
        face.objective[r] = 1f64;
        let solution = solver.solve(&face, settings)?;
        match (solution.status.has_solution(), solution.objective_value) {
            (true, Some(value)) => ceilings.push(value.clamp(0f64, max_dual_bound)),
            _ => {
                return Err(DesignError::Calibration {
                    stage: "dual face",
                    status: solution.status,
                })
            }
        }
    }
    debug!(
        "Largest calibrated dual ceiling: {}",
        ceilings.iter().cloned().fold(0f64, f64::max)
    );
    Ok(ceilings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::sparse::row_entries;

    /// max 3x + 2y s.t. x + y <= 4, x + 3y <= 6, x <= 3g, x >= 0, y >= 0
    ///
    /// The optimum is 11 with the gate at 1 and 4 with the gate at 0.
    fn small_lp() -> LinearSystem {
        let mut rows = Manifest::new();
        rows.push(Block::MassBalance, 2)
            .push(Block::GatedUpper, 1)
            .push(Block::FreeLower, 2);
        let mut cols = Manifest::new();
        cols.push(Block::Flux, 2);
        LinearSystem {
            a: csr_from_triplets(
                5,
                2,
                vec![
                    (0, 0, 1.),
                    (0, 1, 1.),
                    (1, 0, 1.),
                    (1, 1, 3.),
                    (2, 0, 1.),
                    (3, 0, -1.),
                    (4, 1, -1.),
                ],
            ),
            ay: csr_from_triplets(5, 1, vec![(2, 0, -3.)]),
            b: vec![4., 6., 0., 0., 0.],
            objective: vec![3., 2.],
            lower: vec![0., 0.],
            upper: vec![10., 10.],
            rows,
            cols,
        }
    }

    #[test]
    fn embedding_shape() {
        let primal = small_lp();
        let dual = separate_transpose_join(&primal, 1, &DualCeiling::Uniform(100.)).unwrap();
        assert_eq!(dual.w_size, 5);
        assert_eq!(dual.z_size, 1);
        assert_eq!(dual.products, vec![(2, 0, -3.)]);
        let system = &dual.system;
        assert_eq!(system.num_cols(), 6);
        assert_eq!(system.num_rows(), 2 * 2 + 3);
        assert_eq!(system.num_gates(), 1);
        // b'w - Ay z
        assert_eq!(dual.min_objective(), vec![4., 6., 0., 0., 0., 3.]);
        // first dual feasibility row is the x column of A
        assert_eq!(row_entries(&system.a, 0), vec![(0, 1.), (1, 1.), (2, 1.), (3, -1.)]);
        let link = system.rows.range(&Block::ProductLink(1)).unwrap();
        assert_eq!(row_entries(&system.a, link.start), vec![(2, 1.), (5, -1.)]);
        assert_eq!(row_entries(&system.ay, link.start), vec![(0, 100.)]);
        assert_eq!(system.b[link.start], 100.);
        assert_eq!(system.upper, vec![100.; 6]);
    }

    #[test]
    fn ceiling_length_checked() {
        let res = separate_transpose_join(&small_lp(), 1, &DualCeiling::PerRow(vec![1.; 3]));
        assert!(matches!(res, Err(StructuralError::Manifest(_))));

        let mut broken = small_lp();
        broken.rows.push(Block::StrongDuality, 1);
        assert!(separate_transpose_join(&broken, 1, &DualCeiling::Uniform(1.)).is_err());
    }

    #[cfg(feature = "minilp")]
    mod solved {
        use super::*;
        use crate::configuration::SolverSettings;
        use crate::design::reformulate::{to_milp, BinaryRows};
        use crate::optimize::solvers::MilpSolver;
        use crate::optimize::solvers::microlp::MicrolpSolver;
        use crate::test_utils::init_logger;

        fn gates() -> Manifest<Block> {
            let mut gates = Manifest::new();
            gates.push(Block::KnockoutGate, 1);
            gates
        }

        #[test]
        fn strong_duality() {
            init_logger();
            let primal = small_lp();
            let dual = separate_transpose_join(&primal, 1, &DualCeiling::Uniform(100.)).unwrap();
            let settings = SolverSettings::default();
            for (gate, optimum) in [(1f64, 11f64), (0., 4.)] {
                let mut primal_problem =
                    to_milp(&primal, primal.objective.clone(), &gates(), &BinaryRows::default())
                        .unwrap();
                primal_problem.fix_variable(2, gate).unwrap();
                let primal_value = MicrolpSolver::default()
                    .solve(&primal_problem, &settings)
                    .unwrap()
                    .objective_value
                    .unwrap();
                assert!((primal_value - optimum).abs() < 1e-6);

                let mut dual_problem = to_milp(
                    &dual.system,
                    dual.system.objective.clone(),
                    &gates(),
                    &BinaryRows::default(),
                )
                .unwrap();
                dual_problem.fix_variable(6, gate).unwrap();
                let dual_value = MicrolpSolver::default()
                    .solve(&dual_problem, &settings)
                    .unwrap()
                    .objective_value
                    .unwrap();
                // C_w is the negated dual objective
                assert!((-dual_value - optimum).abs() < 1e-6);
            }
        }

        #[test]
        fn calibrated_ceilings() {
            init_logger();
            let ceilings = calibrate_dual_ceilings(
                &small_lp(),
                100.,
                &MicrolpSolver::default(),
                &SolverSettings::default(),
            )
            .unwrap();
            let expected = [2., 2. / 3., 7. / 3., 0., 0.];
            assert_eq!(ceilings.len(), expected.len());
            for (found, expected) in ceilings.iter().zip(expected) {
                assert!((found - expected).abs() < 1e-4, "{found} != {expected}");
            }
        }
    }
}
