//! Configuration records for strain design problems
//!
//! Every entry point takes its configuration explicitly, nothing in here is process wide.
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Lower flux bound given to reactions which don't specify one
pub const DEFAULT_LOWER_BOUND: f64 = -1000.;
/// Upper flux bound given to reactions which don't specify one
pub const DEFAULT_UPPER_BOUND: f64 = 1000.;

/// Count value meaning "no limit", the associated constraint row is omitted
pub const NO_LIMIT: i64 = -1;

/// Enum used to specify which solver backend to dispatch to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Solver {
    /// Use the microlp branch and bound solver, requires the minilp feature to be enabled
    #[default]
    Microlp,
    /// Use the HiGHS Mixed Integer Solver, requires the highs feature to be enabled
    Highs,
    /// Use the Clarabel interior point solver (continuous problems only)
    Clarabel,
}

/// Which strain design problem to formulate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KnockType {
    /// Optimistic bilevel knockout design
    OptKnock,
    /// Knockout design maximizing the worst case production at optimal growth
    RobustKnock,
    /// RobustKnock extended with NAD(H)/NADP(H) cofactor swaps
    OptSwap,
    /// Single level cofactor swap design maximizing production above a growth floor
    OptSwapYield,
}

/// Options recognized by the solver backends
///
/// Backends ignore the options they can't express, and log that they did so.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Solver backend to use
    pub solver: Solver,
    /// Distance from an integer within which a value counts as integral
    pub integer_feasibility_tolerance: f64,
    /// Relative optimality gap at which branch and bound may stop
    pub relative_gap_tolerance: f64,
    /// Absolute optimality gap at which branch and bound may stop
    pub absolute_gap_tolerance: f64,
    /// Primal feasibility tolerance
    pub feasibility_tolerance: f64,
    /// Dual feasibility (optimality) tolerance
    pub optimality_tolerance: f64,
    /// Wall clock limit, None for no limit
    pub time_limit_seconds: Option<f64>,
    /// 0 is silent, anything larger lets the backend print its log
    pub verbosity: u8,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            solver: Solver::default(),
            integer_feasibility_tolerance: 1e-9,
            relative_gap_tolerance: 1e-4,
            absolute_gap_tolerance: 1e-6,
            feasibility_tolerance: 1e-9,
            optimality_tolerance: 1e-9,
            time_limit_seconds: Some(3600.),
            verbosity: 0,
        }
    }
}

/// Options for a strain design run
///
/// # Examples
/// ```rust
/// use optswap_core::configuration::{DesignConfigurationBuilder, KnockType};
/// let config = DesignConfigurationBuilder::default()
///     .knock_type(KnockType::RobustKnock)
///     .target_reaction("EX_etoh_e")
///     .knockout_count(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.swap_count, 3);
/// ```
#[derive(Builder, Clone, Debug, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct DesignConfiguration {
    /// Problem to formulate
    #[builder(default = "KnockType::OptSwap")]
    pub knock_type: KnockType,
    /// Id of the reaction producing the target chemical
    pub target_reaction: String,
    /// Id of the growth reaction, defaults to the single reaction in the model objective
    #[builder(default = "None")]
    pub biomass_reaction: Option<String>,
    /// Maximum number of knockouts, negative for no limit
    #[builder(default = "3")]
    pub knockout_count: i64,
    /// Maximum number of cofactor swaps, negative for no limit
    #[builder(default = "3")]
    pub swap_count: i64,
    /// Maximum number of knockouts plus swaps, negative for no limit
    #[builder(default = "NO_LIMIT")]
    pub intervention_count: i64,
    /// Reactions allowed to be knocked out, None means every eligible reaction
    #[builder(default = "None")]
    pub knockable_reactions: Option<Vec<String>>,
    /// Reactions which are never knocked out
    #[builder(default = "Vec::new()")]
    pub excluded_reactions: Vec<String>,
    /// Reactions whose cofactor usage may be swapped
    #[builder(default = "Vec::new()")]
    pub swappable_reactions: Vec<String>,
    /// Ceiling on every dual variable
    #[builder(default = "1000.")]
    pub max_dual_bound: f64,
    /// Allow both cofactor variants of a swappable reaction to be inactive
    #[builder(default = "false")]
    pub allow_full_dehydrogenase_knockout: bool,
    /// Growth floor used by OptSwapYield
    #[builder(default = "0.1")]
    pub min_biomass: f64,
    /// Calibrate per row dual ceilings on the wild type instead of using `max_dual_bound`
    #[builder(default = "false")]
    pub find_max_w: bool,
    /// Metabolite replacements turning a native reaction into its swapped variant
    #[builder(default = "default_cofactor_pairs()")]
    pub cofactor_pairs: Vec<(String, String)>,
    /// Options passed to the solver backend
    #[builder(default = "SolverSettings::default()")]
    pub solver: SolverSettings,
}

impl DesignConfigurationBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(bound) = self.max_dual_bound {
            if !(bound.is_finite() && bound > 0.) {
                return Err(format!("max_dual_bound must be finite and positive, got {bound}"));
            }
        }
        if let Some(min_biomass) = self.min_biomass {
            if !min_biomass.is_finite() || min_biomass < 0. {
                return Err(format!(
                    "min_biomass must be finite and non-negative, got {min_biomass}"
                ));
            }
        }
        if let Some(target) = &self.target_reaction {
            if target.is_empty() {
                return Err("target_reaction must not be empty".to_string());
            }
        }
        Ok(())
    }
}

/// NAD(H) replaced by NADP(H)
pub fn default_cofactor_pairs() -> Vec<(String, String)> {
    vec![
        ("nad_c".to_string(), "nadp_c".to_string()),
        ("nadh_c".to_string(), "nadph_c".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = DesignConfigurationBuilder::default()
            .target_reaction("EX_succ_e")
            .build()
            .unwrap();
        assert_eq!(config.knock_type, KnockType::OptSwap);
        assert_eq!(config.knockout_count, 3);
        assert_eq!(config.intervention_count, NO_LIMIT);
        assert!(config.knockable_reactions.is_none());
        assert!(!config.allow_full_dehydrogenase_knockout);
        assert_eq!(config.cofactor_pairs.len(), 2);
        assert_eq!(config.solver.solver, Solver::Microlp);
    }

    #[test]
    fn builder_rejects_bad_values() {
        let res = DesignConfigurationBuilder::default()
            .target_reaction("EX_succ_e")
            .max_dual_bound(-1.)
            .build();
        assert!(res.is_err(), "Negative dual bound not caught");

        let res = DesignConfigurationBuilder::default()
            .target_reaction("")
            .build();
        assert!(res.is_err(), "Empty target not caught");

        let res = DesignConfigurationBuilder::default().build();
        assert!(res.is_err(), "Missing target not caught");
    }
}
