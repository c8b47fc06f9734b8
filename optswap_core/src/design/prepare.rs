//! Turns a [`Model`] into the matrix form the reformulation works on
use indexmap::{IndexMap, IndexSet};
use log::debug;
use nalgebra_sparse::CsrMatrix;

use crate::design::DesignError;
use crate::metabolic_model::model::Model;
use crate::metabolic_model::reaction::Reaction;
use crate::utils::sparse::csr_from_triplets;

/// Stoichiometric coefficients smaller than this (in magnitude) are curation noise and dropped
pub const NOISE_THRESHOLD: f64 = 1e-3;

/// Optimization ready view of a model
#[derive(Clone, Debug)]
pub struct PreparedModel {
    /// Reactions in model order, with noise coefficients removed
    pub reactions: Vec<Reaction>,
    /// Metabolite ids, in row order of the stoichiometric matrix
    pub metabolites: IndexSet<String>,
    /// Metabolites x reactions
    pub stoichiometry: CsrMatrix<f64>,
    /// Unit vector selecting the growth reaction
    pub organism_objective: Vec<f64>,
    /// Unit vector selecting the target reaction
    pub c_chemical: Vec<f64>,
    pub growth_index: usize,
    pub target_index: usize,
}

impl PreparedModel {
    pub fn reaction_index(&self, id: &str) -> Option<usize> {
        self.reactions.iter().position(|r| r.id == id)
    }

    pub fn metabolite_index(&self, id: &str) -> Option<usize> {
        self.metabolites.get_index_of(id)
    }

    pub fn growth_reaction(&self) -> &Reaction {
        &self.reactions[self.growth_index]
    }

    pub fn target_reaction(&self) -> &Reaction {
        &self.reactions[self.target_index]
    }
}

/// Prepare a model for strain design
///
/// When `growth_reaction` is None, the growth reaction is the single reaction with a nonzero
/// coefficient in the model objective.
///
/// # Errors
/// - [`DesignError::NotFound`] when the growth or target reaction isn't in the model
/// - [`DesignError::InvalidConfiguration`] when the growth reaction can't be inferred, or a
///   reaction has non-finite or inverted bounds
pub fn prepare(
    model: &Model,
    target_reaction: &str,
    growth_reaction: Option<&str>,
) -> Result<PreparedModel, DesignError> {
    let growth_id = match growth_reaction {
        Some(id) => id.to_string(),
        None => {
            let objective = model.objective_reactions();
            if objective.len() != 1 {
                return Err(DesignError::InvalidConfiguration(format!(
                    "No growth reaction given and the model objective selects {} reactions",
                    objective.len()
                )));
            }
            objective[0].to_string()
        }
    };
    let growth_index = model
        .reaction_index(&growth_id)
        .ok_or_else(|| DesignError::NotFound {
            kind: "growth reaction",
            id: growth_id.clone(),
        })?;
    let target_index =
        model
            .reaction_index(target_reaction)
            .ok_or_else(|| DesignError::NotFound {
                kind: "target reaction",
                id: target_reaction.to_string(),
            })?;

    let mut metabolites: IndexSet<String> = model.metabolites.keys().cloned().collect();
    let mut reactions = Vec::with_capacity(model.reactions.len());
    let mut dropped = 0usize;
    for reaction in model.reactions.values() {
        if !(reaction.lower_bound.is_finite()
            && reaction.upper_bound.is_finite()
            && reaction.lower_bound <= reaction.upper_bound)
        {
            return Err(DesignError::InvalidConfiguration(format!(
                "Reaction {} has invalid bounds [{}, {}]",
                reaction.id, reaction.lower_bound, reaction.upper_bound
            )));
        }
        let mut kept: IndexMap<String, f64> = IndexMap::with_capacity(reaction.metabolites.len());
        for (met, coef) in &reaction.metabolites {
            if coef.abs() < NOISE_THRESHOLD {
                dropped += 1;
                continue;
            }
            metabolites.insert(met.clone());
            kept.insert(met.clone(), *coef);
        }
        reactions.push(Reaction {
            metabolites: kept,
            ..reaction.clone()
        });
    }
    if dropped > 0 {
        debug!("Dropped {dropped} stoichiometric coefficients below {NOISE_THRESHOLD}");
    }

    let mut triplets = Vec::new();
    for (j, reaction) in reactions.iter().enumerate() {
        for (met, coef) in &reaction.metabolites {
            if let Some(i) = metabolites.get_index_of(met) {
                triplets.push((i, j, *coef));
            }
        }
    }
    let stoichiometry = csr_from_triplets(metabolites.len(), reactions.len(), triplets);

    let mut organism_objective = vec![0f64; reactions.len()];
    organism_objective[growth_index] = 1f64;
    let mut c_chemical = vec![0f64; reactions.len()];
    c_chemical[target_index] = 1f64;

    Ok(PreparedModel {
        reactions,
        metabolites,
        stoichiometry,
        organism_objective,
        c_chemical,
        growth_index,
        target_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_logger, optknock_toy, reaction};

    #[test]
    fn unit_objectives() {
        init_logger();
        let model = optknock_toy();
        let prepared = prepare(&model, "TGT", Some("BIO")).unwrap();
        assert_eq!(prepared.growth_index, 1);
        assert_eq!(prepared.target_index, 2);
        assert_eq!(prepared.organism_objective, vec![0., 1., 0.]);
        assert_eq!(prepared.c_chemical, vec![0., 0., 1.]);
        assert_eq!(prepared.growth_reaction().id, "BIO");
        assert_eq!(prepared.target_reaction().id, "TGT");
        assert_eq!(prepared.stoichiometry.nrows(), 1);
        assert_eq!(prepared.stoichiometry.ncols(), 3);
    }

    #[test]
    fn growth_from_objective() {
        let mut model = optknock_toy();
        model.set_objective_coefficient("BIO", 1.);
        let prepared = prepare(&model, "TGT", None).unwrap();
        assert_eq!(prepared.growth_index, 1);

        model.set_objective_coefficient("TGT", 1.);
        assert!(matches!(
            prepare(&model, "TGT", None),
            Err(DesignError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn missing_reactions() {
        let model = optknock_toy();
        match prepare(&model, "TGT", Some("BIOMASS_Ec")) {
            Err(DesignError::NotFound { kind, id }) => {
                assert_eq!(kind, "growth reaction");
                assert_eq!(id, "BIOMASS_Ec");
            }
            other => panic!("Missing growth reaction not caught: {other:?}"),
        }
        assert!(matches!(
            prepare(&model, "EX_etoh_e", Some("BIO")),
            Err(DesignError::NotFound { .. })
        ));
    }

    #[test]
    fn removes_noise() {
        let mut model = optknock_toy();
        model.add_reaction(reaction("NOISY", &[("A", -1.), ("B", 5e-4)], 0., 10.));
        let prepared = prepare(&model, "TGT", Some("BIO")).unwrap();
        let noisy = prepared.reaction_index("NOISY").unwrap();
        assert!(prepared.reactions[noisy].metabolites.get("B").is_none());
        let b = prepared.metabolite_index("B").unwrap();
        let column: Vec<f64> = prepared
            .stoichiometry
            .triplet_iter()
            .filter(|(_, c, _)| *c == noisy)
            .map(|(_, _, v)| *v)
            .collect();
        assert_eq!(column, vec![-1.]);
        assert!(prepared
            .stoichiometry
            .triplet_iter()
            .all(|(r, _, _)| r != b));
    }

    #[test]
    fn rejects_infinite_bounds() {
        let mut model = optknock_toy();
        model.add_reaction(reaction("OPEN", &[("A", 1.)], f64::NEG_INFINITY, 10.));
        assert!(matches!(
            prepare(&model, "TGT", Some("BIO")),
            Err(DesignError::InvalidConfiguration(_))
        ));
    }
}
