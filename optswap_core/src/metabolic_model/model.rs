//! This module provides the Model struct for representing an entire metabolic model
use crate::metabolic_model::metabolite::Metabolite;
use crate::metabolic_model::reaction::Reaction;

use indexmap::IndexMap;

/// Represents a Genome Scale Metabolic Model
#[derive(Clone, Debug)]
pub struct Model {
    /// Map of reaction ids to Reaction Objects
    pub reactions: IndexMap<String, Reaction>,
    /// Map of metabolite ids to Metabolite Objects
    pub metabolites: IndexMap<String, Metabolite>,
    /// Map of reaction ids to objective function coefficients
    pub objective: IndexMap<String, f64>,
    /// Id associated with the Model
    pub id: Option<String>,
    /// Compartments in the model
    ///
    /// An IndexMap<String, String> of {short name: long name}
    pub compartments: Option<IndexMap<String, String>>,
    /// A version identifier for the Model, stored as a string
    pub version: Option<String>,
}

impl Model {
    pub fn new_empty() -> Self {
        Model {
            reactions: IndexMap::new(),
            metabolites: IndexMap::new(),
            objective: IndexMap::new(),
            id: None,
            compartments: None,
            version: None,
        }
    }

    /// Add a reaction to the model
    ///
    /// Metabolites referenced by the reaction which the model doesn't know about yet are added
    /// with only their id set.
    ///
    /// # Parameters
    /// - reaction: Reaction to add
    ///
    /// # Examples
    /// ```rust
    /// use optswap_core::metabolic_model::model::Model;
    /// use optswap_core::metabolic_model::reaction::{Reaction, ReactionBuilder};
    /// let mut model = Model::new_empty();
    /// let new_reaction = ReactionBuilder::default()
    ///     .id("new_reaction".to_string())
    ///     .build()
    ///     .unwrap();
    /// model.add_reaction(new_reaction);
    /// ```
    pub fn add_reaction(&mut self, reaction: Reaction) {
        for met in reaction.metabolites.keys() {
            if !self.metabolites.contains_key(met) {
                self.metabolites.insert(met.clone(), Metabolite::new(met));
            }
        }
        let id = reaction.id.clone();
        self.reactions.insert(id, reaction);
    }

    /// Add a metabolite to the model
    ///
    /// # Examples
    /// ```rust
    /// use optswap_core::metabolic_model::metabolite::MetaboliteBuilder;
    /// use optswap_core::metabolic_model::model::Model;
    /// let mut model = Model::new_empty();
    /// let new_metabolite = MetaboliteBuilder::default().id("nad_c".to_string()).build().unwrap();
    /// model.add_metabolite(new_metabolite);
    /// ```
    pub fn add_metabolite(&mut self, metabolite: Metabolite) {
        let id = metabolite.id.clone();
        self.metabolites.insert(id, metabolite);
    }

    /// Set the objective coefficient of a reaction
    ///
    /// Returns false (and leaves the objective unchanged) if the reaction isn't in the model
    pub fn set_objective_coefficient(&mut self, reaction_id: &str, coefficient: f64) -> bool {
        if !self.reactions.contains_key(reaction_id) {
            return false;
        }
        self.objective.insert(reaction_id.to_string(), coefficient);
        true
    }

    /// Position of a reaction in the model, which is also its column in the stoichiometric matrix
    pub fn reaction_index(&self, reaction_id: &str) -> Option<usize> {
        self.reactions.get_index_of(reaction_id)
    }

    /// Position of a metabolite in the model, which is also its row in the stoichiometric matrix
    pub fn metabolite_index(&self, metabolite_id: &str) -> Option<usize> {
        self.metabolites.get_index_of(metabolite_id)
    }

    /// Reactions with a nonzero objective coefficient
    pub fn objective_reactions(&self) -> Vec<&str> {
        self.objective
            .iter()
            .filter(|(_, coef)| **coef != 0f64)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}
