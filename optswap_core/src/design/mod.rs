//! Bilevel strain design through single level MILP reformulation
//!
//! The outer problem chooses reaction knockouts and cofactor swaps, the inner problem is the
//! organism maximizing growth. The inner problem is replaced by its optimality conditions (a
//! duality embedding), giving a mixed integer linear program which any [`MilpSolver`] can solve.
//!
//! The pipeline runs through these modules:
//!
//! - [`prepare`]: model to matrices, growth and target selection
//! - [`split`]: one way flux columns, swapped cofactor variants, binary bookkeeping
//! - [`primal`]: the gated growth problem as `A v + Ay g <= b`
//! - [`dual`]: the linearized dual of a gated system
//! - [`reformulate`]: the single level problem of each design variant
//! - [`decode`]: interventions and fluxes out of a solution
//!
//! # Examples
//! ```rust,no_run
//! use optswap_core::configuration::{DesignConfigurationBuilder, KnockType};
//! use optswap_core::design::design;
//! use optswap_core::metabolic_model::model::Model;
//!
//! let model = Model::read_json("e_coli_core.json").unwrap();
//! let config = DesignConfigurationBuilder::default()
//!     .knock_type(KnockType::RobustKnock)
//!     .target_reaction("EX_etoh_e")
//!     .knockout_count(2)
//!     .build()
//!     .unwrap();
//! let result = design(&model, &config).unwrap();
//! println!("{:?} -> {:?}", result.knockouts, result.objective_value);
//! ```
use std::fmt;

use log::{info, warn};
use thiserror::Error;

use crate::configuration::{DesignConfiguration, KnockType};
use crate::design::decode::{decode, DesignResult, INTEGRALITY_TOLERANCE};
use crate::design::dual::{calibrate_dual_ceilings, DualCeiling};
use crate::design::prepare::prepare;
use crate::design::primal::assemble_primal;
use crate::design::reformulate::{intervention_rows, reformulate, BinaryRows, Variant};
use crate::design::split::{split_model, Candidates, SplitModel};
use crate::metabolic_model::model::Model;
use crate::optimize::manifest::ManifestError;
use crate::optimize::problem::{MilpProblem, ProblemError};
use crate::optimize::solvers::{solver_for, MilpSolver, SolverError};
use crate::optimize::OptimizationStatus;

pub mod blocks;
pub mod decode;
pub mod dual;
pub mod prepare;
pub mod primal;
pub mod reformulate;
pub mod split;

/// Steps of a design run, in order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    AssemblePrimal,
    EmbedDual1,
    AssembleLevel2,
    EmbedDual2,
    ApplyCountConstraints,
    DispatchSolver,
    DecodeResult,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::AssemblePrimal => "Assembling primal growth problem",
            Stage::EmbedDual1 => "Embedding level 1 dual",
            Stage::AssembleLevel2 => "Assembling worst case production problem",
            Stage::EmbedDual2 => "Embedding level 2 dual",
            Stage::ApplyCountConstraints => "Applying count constraints",
            Stage::DispatchSolver => "Dispatching to solver",
            Stage::DecodeResult => "Decoding result",
        };
        write!(f, "{name}")
    }
}

/// Errors raised when an assembly stage receives inconsistent input
///
/// These indicate a broken model or configuration, never a problem which is merely infeasible.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    /// A block an assembly stage needs isn't in the manifest
    #[error("{stage}: block {block} not found")]
    MissingBlock { stage: &'static str, block: String },
    /// A flux column is in more than one binary index set
    #[error("Column {column} belongs to more than one of the knockout and swap sets")]
    OverlappingIndexSets { column: usize },
    /// Native and swapped sets of different sizes
    #[error("{native} native swap columns but {swapped} swapped columns")]
    SwapCardinality { native: usize, swapped: usize },
    /// A coupled column without a gated primary column
    #[error("Coupled column {column} has no gated primary column")]
    UncoupledMirror { column: usize },
    #[error("Column {column} doesn't exist")]
    UnknownColumn { column: usize },
    #[error("Gate {gate} doesn't exist, there are {len} gates")]
    UnknownGate { gate: usize, len: usize },
}

/// Errors of a design run
#[derive(Error, Debug, Clone)]
pub enum DesignError {
    /// Error when a reaction named in the configuration isn't in the model
    #[error("{kind} {id} not found in the model")]
    NotFound { kind: &'static str, id: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Malformed formulation: {0}")]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    /// Error when an LP solved while calibrating the dual ceilings has no solution
    #[error("Dual ceiling calibration failed at {stage} with status {status:?}")]
    Calibration {
        stage: &'static str,
        status: OptimizationStatus,
    },
}

/// A fully assembled design problem, ready to be solved
#[derive(Clone, Debug)]
pub struct Formulation {
    pub knock_type: KnockType,
    pub variant: Variant,
    pub split: SplitModel,
    pub problem: MilpProblem,
    /// Count and pairing rows, kept for checking the rounded binaries
    pub binary_rows: BinaryRows,
    /// Calibrated level 1 dual ceilings, if requested
    pub dual_ceilings: Option<Vec<f64>>,
}

/// Build the mixed integer problem for `config` without solving it
///
/// `solver` is only used when `find_max_w` asks for calibrated dual ceilings.
pub fn formulate(
    model: &Model,
    config: &DesignConfiguration,
    solver: &dyn MilpSolver,
) -> Result<Formulation, DesignError> {
    let variant = Variant::from(config.knock_type);
    if !variant.has_swaps() && !config.swappable_reactions.is_empty() {
        warn!(
            "{:?} has no cofactor swaps, ignoring {} swappable reactions",
            config.knock_type,
            config.swappable_reactions.len()
        );
    }
    let prepared = prepare(
        model,
        &config.target_reaction,
        config.biomass_reaction.as_deref(),
    )?;
    let candidates = Candidates::resolve(
        &prepared,
        config,
        variant.has_knockouts(),
        variant.has_swaps(),
    )?;
    info!(
        "{:?}: {} knockout and {} swap candidates, target {}",
        config.knock_type,
        candidates.knockable.len(),
        candidates.swappable.len(),
        prepared.target_reaction().id
    );
    let split = split_model(&prepared, &candidates, &config.cofactor_pairs)?;
    if variant == Variant::YieldWithSwap && config.min_biomass > split.growth_ceiling() {
        return Err(DesignError::InvalidConfiguration(format!(
            "min_biomass {} is above the upper bound {} of growth reaction {}",
            config.min_biomass,
            split.growth_ceiling(),
            prepared.growth_reaction().id
        )));
    }

    let dual_ceilings = match (config.find_max_w, variant.has_dual()) {
        (true, true) => {
            let primal = assemble_primal(&split)?;
            Some(calibrate_dual_ceilings(
                &primal,
                config.max_dual_bound,
                solver,
                &config.solver,
            )?)
        }
        (true, false) => {
            warn!("{:?} has no dual, ignoring find_max_w", config.knock_type);
            None
        }
        _ => None,
    };
    let ceiling = match &dual_ceilings {
        Some(ceilings) => DualCeiling::PerRow(ceilings.clone()),
        None => DualCeiling::Uniform(config.max_dual_bound),
    };

    let mut binary_rows = BinaryRows::default();
    let problem = reformulate(
        variant,
        &split,
        &ceiling,
        config.max_dual_bound,
        config.min_biomass,
        |layout| {
            binary_rows = intervention_rows(config, layout);
            binary_rows.clone()
        },
    )?;
    Ok(Formulation {
        knock_type: config.knock_type,
        variant,
        split,
        problem,
        binary_rows,
        dual_ceilings,
    })
}

/// Formulate, solve, and decode a strain design problem with the given backend
///
/// An infeasible or unbounded problem is not an error, it is reported through the status of the
/// returned [`DesignResult`].
pub fn design_strains(
    model: &Model,
    config: &DesignConfiguration,
    solver: &dyn MilpSolver,
) -> Result<DesignResult, DesignError> {
    let formulation = formulate(model, config, solver)?;
    info!("{} ({})", Stage::DispatchSolver, solver.name());
    formulation.problem.validate()?;
    let solution = solver.solve(&formulation.problem, &config.solver)?;
    info!("{}", Stage::DecodeResult);
    let result = decode(formulation, solution, INTEGRALITY_TOLERANCE);
    match result.objective_value {
        Some(objective) => info!(
            "{:?} finished with status {:?}, objective {objective}, knockouts {:?}, swaps {:?}",
            result.knock_type, result.status, result.knockouts, result.swaps
        ),
        None => warn!(
            "{:?} finished with status {:?} and no solution",
            result.knock_type, result.status
        ),
    }
    Ok(result)
}

/// [`design_strains`] with the backend selected by `config.solver`
pub fn design(model: &Model, config: &DesignConfiguration) -> Result<DesignResult, DesignError> {
    let solver = solver_for(&config.solver)?;
    design_strains(model, config, solver.as_ref())
}
