//! Reading designs back out of solved problems
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;

use crate::configuration::KnockType;
use crate::design::split::SplitModel;
use crate::design::Formulation;
use crate::optimize::problem::MilpProblem;
use crate::optimize::{OptimizationStatus, ProblemSolution, SolverDiagnostics};

/// Binaries further than this from an integer are reported as fractional
pub const INTEGRALITY_TOLERANCE: f64 = 1e-6;

/// Outcome of a strain design run
///
/// Without a solution (infeasible, unbounded, solver failure) the design fields are empty and
/// only the status and diagnostics are meaningful.
#[derive(Clone, Debug, Serialize)]
pub struct DesignResult {
    pub knock_type: KnockType,
    pub status: OptimizationStatus,
    /// Optimal production: worst case for RobustKnock and OptSwap, optimistic otherwise
    pub objective_value: Option<f64>,
    /// Reactions knocked out
    pub knockouts: Vec<String>,
    /// Reactions whose cofactor specificity is swapped
    pub swaps: Vec<String>,
    /// Swappable reactions with neither cofactor variant active
    pub dehydrogenase_knockouts: Vec<String>,
    /// Net flux of every reaction at the returned point
    pub fluxes: IndexMap<String, f64>,
    pub growth_flux: Option<f64>,
    pub chemical_flux: Option<f64>,
    /// Per row level 1 dual ceilings, when calibrated
    pub dual_ceilings: Option<Vec<f64>>,
    pub diagnostics: SolverDiagnostics,
    /// The problem which was solved
    #[serde(skip)]
    pub problem: MilpProblem,
}

impl DesignResult {
    pub fn has_solution(&self) -> bool {
        self.status.has_solution() && self.objective_value.is_some()
    }
}

/// Design decisions encoded by the (rounded) binaries
#[derive(Clone, Debug, Default, PartialEq)]
struct Interventions {
    knockouts: Vec<String>,
    swaps: Vec<String>,
    dehydrogenase_knockouts: Vec<String>,
}

fn read_binaries(split: &SplitModel, binaries: &[bool]) -> Interventions {
    let layout = &split.layout;
    let reaction_of_gate = |gate: usize| -> Option<String> {
        layout
            .column_of_gate(gate)
            .map(|column| split.reaction_ids[split.columns[column].reaction].clone())
    };
    let mut interventions = Interventions {
        knockouts: layout
            .knockout_range()
            .filter(|&g| !binaries[g])
            .filter_map(reaction_of_gate)
            .collect(),
        ..Interventions::default()
    };
    for (q, s) in layout.swap_pairs() {
        match (binaries[q], binaries[s]) {
            (_, true) => interventions.swaps.extend(reaction_of_gate(q)),
            (false, false) => interventions.dehydrogenase_knockouts.extend(reaction_of_gate(q)),
            (true, false) => {}
        }
    }
    interventions
}

/// Turn the solver output for `formulation` into a [`DesignResult`]
///
/// Binaries are rounded; a binary which isn't within `tolerance` of 0 or 1 is logged, as is any
/// violated count or pairing row.
pub fn decode(formulation: Formulation, solution: ProblemSolution, tolerance: f64) -> DesignResult {
    let Formulation {
        knock_type,
        split,
        problem,
        binary_rows,
        dual_ceilings,
        ..
    } = formulation;
    let mut result = DesignResult {
        knock_type,
        status: solution.status,
        objective_value: None,
        knockouts: Vec::new(),
        swaps: Vec::new(),
        dehydrogenase_knockouts: Vec::new(),
        fluxes: IndexMap::new(),
        growth_flux: None,
        chemical_flux: None,
        dual_ceilings,
        diagnostics: solution.diagnostics,
        problem,
    };
    let values = match (solution.status.has_solution(), solution.variable_values) {
        (true, Some(values)) if values.len() == result.problem.num_variables() => values,
        (true, Some(values)) => {
            warn!(
                "Solver returned {} values for {} variables, discarding them",
                values.len(),
                result.problem.num_variables()
            );
            return result;
        }
        _ => {
            warn!("No solution to decode, status {:?}", solution.status);
            return result;
        }
    };

    let raw_binaries: Vec<f64> = result
        .problem
        .integer_variables
        .iter()
        .map(|&i| values[i])
        .collect();
    for (gate, value) in raw_binaries.iter().enumerate() {
        if (value - value.round()).abs() > tolerance {
            warn!("Binary {gate} is fractional ({value}), rounding");
        }
    }
    let rounded: Vec<f64> = raw_binaries.iter().map(|v| v.round()).collect();
    let violation = binary_rows.max_violation(&rounded);
    if violation > tolerance {
        warn!("Rounded binaries violate a count or pairing row by {violation}");
    }
    debug!(
        "Largest constraint violation of the returned point: {}",
        result.problem.max_violation(&values)
    );

    let binaries: Vec<bool> = rounded.iter().map(|v| *v > 0.5).collect();
    let interventions = read_binaries(&split, &binaries);

    let flux_values = &values[..split.num_columns()];
    let net = split.net_fluxes(flux_values);
    result.growth_flux = Some(net[split.growth_reaction]);
    result.chemical_flux = Some(net[split.target_reaction]);
    result.fluxes = split.reaction_ids.iter().cloned().zip(net).collect();
    result.objective_value = solution.objective_value;
    result.knockouts = interventions.knockouts;
    result.swaps = interventions.swaps;
    result.dehydrogenase_knockouts = interventions.dehydrogenase_knockouts;
    result
}
