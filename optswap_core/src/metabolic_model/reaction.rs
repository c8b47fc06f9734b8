//! This module provides a struct for representing reactions
use crate::configuration::{DEFAULT_LOWER_BOUND, DEFAULT_UPPER_BOUND};
use crate::utils::hashing::hash_as_hex_string;
use derive_builder::Builder;
use indexmap::IndexMap;

/// Represents a reaction in the metabolic model
#[derive(Builder, Debug, Clone)]
pub struct Reaction {
    /// Used to identify the reaction
    pub id: String,
    /// Metabolite stoichiometry of the reaction
    #[builder(default = "IndexMap::new()")]
    pub metabolites: IndexMap<String, f64>,
    /// Human-readable reaction name
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Lower flux bound
    #[builder(default = "DEFAULT_LOWER_BOUND")]
    pub lower_bound: f64,
    /// Upper flux bound
    #[builder(default = "DEFAULT_UPPER_BOUND")]
    pub upper_bound: f64,
    /// Reaction subsystem
    #[builder(default = "None")]
    pub subsystem: Option<String>,
}

impl Reaction {
    /// Determine the id to be associated with the forward reaction in the optimization problem
    ///
    /// # Note:
    /// The forward id is the reaction id itself
    pub fn get_forward_id(&self) -> String {
        self.id.clone()
    }

    /// Determine the id to be associated with the reverse reaction in the optimization problem
    ///
    /// # Note:
    /// The reverse id is "{reaction_id}_reverse_{hexidecimal hash of reaction_id}"
    pub fn get_reverse_id(&self) -> String {
        format!("{}_reverse_{}", &self.id, hash_as_hex_string(&self.id))
    }

    /// Id of the cofactor swapped variant of this reaction
    ///
    /// # Note:
    /// The swap id is "{reaction_id}_swap_{hexidecimal hash of reaction_id}"
    pub fn get_swap_id(&self) -> String {
        format!("{}_swap_{}", &self.id, hash_as_hex_string(&self.id))
    }

    /// Whether the reaction can carry flux in both directions
    pub fn is_reversible(&self) -> bool {
        self.lower_bound < 0f64 && self.upper_bound > 0f64
    }

    /// Whether the reaction needs a reverse one-way flux variable
    pub(crate) fn has_reverse_direction(&self) -> bool {
        self.lower_bound < 0f64
    }

    /// Determine the upper bound of the variable associated with the forward reaction
    pub(crate) fn get_forward_upper_bound(&self) -> f64 {
        if self.upper_bound > 0f64 {
            self.upper_bound
        } else {
            0f64
        }
    }

    /// Determine the lower bound of the variable associated with the forward reaction
    pub(crate) fn get_forward_lower_bound(&self) -> f64 {
        if self.lower_bound > 0f64 {
            self.lower_bound
        } else {
            0f64
        }
    }

    /// Determine the upper bound of the variable associated with the reverse reaction
    pub(crate) fn get_reverse_upper_bound(&self) -> f64 {
        if self.lower_bound < 0f64 {
            -self.lower_bound
        } else {
            0f64
        }
    }

    /// Determine the lower bound of the variable associated with the reverse reaction
    pub(crate) fn get_reverse_lower_bound(&self) -> f64 {
        if self.upper_bound < 0f64 {
            -self.upper_bound
        } else {
            0f64
        }
    }

    /// Create the cofactor swapped variant of this reaction
    ///
    /// Every metabolite listed first in a pair of `cofactor_pairs` is replaced by the second one
    /// of the pair, keeping its coefficient. Returns None when the reaction uses none of the
    /// cofactors being replaced.
    pub fn with_swapped_cofactors(&self, cofactor_pairs: &[(String, String)]) -> Option<Reaction> {
        let mut swapped_any = false;
        let mut metabolites = IndexMap::with_capacity(self.metabolites.len());
        for (met, coef) in &self.metabolites {
            match cofactor_pairs.iter().find(|(from, _)| from == met) {
                Some((_, to)) => {
                    swapped_any = true;
                    *metabolites.entry(to.clone()).or_insert(0f64) += *coef;
                }
                None => {
                    *metabolites.entry(met.clone()).or_insert(0f64) += *coef;
                }
            }
        }
        if !swapped_any {
            return None;
        }
        Some(Reaction {
            id: self.get_swap_id(),
            metabolites,
            name: self.name.as_ref().map(|n| format!("{n} (swapped cofactors)")),
            lower_bound: self.lower_bound,
            upper_bound: self.upper_bound,
            subsystem: self.subsystem.clone(),
        })
    }
}
