//! Module providing JSON IO: COBRA JSON models in, design results out
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use crate::configuration::{DEFAULT_LOWER_BOUND, DEFAULT_UPPER_BOUND};
use crate::design::decode::DesignResult;
use crate::metabolic_model::metabolite::Metabolite;
use crate::metabolic_model::model::Model;
use crate::metabolic_model::reaction::{ReactionBuilder, ReactionBuilderError};

// region JSON Model
/// Represents a JSON serialized model
///
/// Genes, notes, and annotations are accepted but not kept.
#[derive(Deserialize)]
struct JsonModel {
    #[serde(default)]
    metabolites: Vec<JsonMetabolite>,
    reactions: Vec<JsonReaction>,
    id: Option<String>,
    compartments: Option<IndexMap<String, String>>,
    version: Option<String>,
}

#[derive(Deserialize)]
struct JsonMetabolite {
    id: String,
    name: Option<String>,
    compartment: Option<String>,
    charge: Option<i32>,
    formula: Option<String>,
}

fn default_lower_bound() -> f64 {
    DEFAULT_LOWER_BOUND
}

fn default_upper_bound() -> f64 {
    DEFAULT_UPPER_BOUND
}

#[derive(Deserialize)]
struct JsonReaction {
    id: String,
    name: Option<String>,
    metabolites: IndexMap<String, f64>,
    #[serde(default = "default_lower_bound")]
    lower_bound: f64,
    #[serde(default = "default_upper_bound")]
    upper_bound: f64,
    objective_coefficient: Option<f64>,
    subsystem: Option<String>,
}
// endregion JSON Model

// region Conversions
impl From<JsonMetabolite> for Metabolite {
    fn from(m: JsonMetabolite) -> Self {
        Self {
            id: m.id,
            name: m.name,
            compartment: m.compartment,
            charge: m.charge.unwrap_or_default(),
            formula: m.formula,
        }
    }
}

impl Model {
    /// Read a COBRA JSON model file
    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Model, JsonError> {
        let model_str = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) => return Err(JsonError::UnableToRead(format!("{:?}", err))),
        };
        Model::from_json_str(&model_str)
    }

    /// Parse a COBRA JSON model
    pub fn from_json_str(data: &str) -> Result<Model, JsonError> {
        let json_model = match serde_json::from_str::<JsonModel>(data) {
            Ok(model) => model,
            Err(err) => return Err(JsonError::UnableToParse(format!("{:?}", err))),
        };
        Model::from_json(json_model)
    }

    fn from_json(json_model: JsonModel) -> Result<Self, JsonError> {
        let mut model = Model::new_empty();
        json_model.metabolites.into_iter().for_each(|m| {
            model.add_metabolite(Metabolite::from(m));
        });
        for rxn in json_model.reactions {
            let reaction = ReactionBuilder::default()
                .id(rxn.id.clone())
                .metabolites(rxn.metabolites)
                .name(rxn.name)
                .lower_bound(rxn.lower_bound)
                .upper_bound(rxn.upper_bound)
                .subsystem(rxn.subsystem)
                .build()?;
            model.add_reaction(reaction);
            if let Some(coef) = rxn.objective_coefficient {
                if coef != 0f64 {
                    model.set_objective_coefficient(&rxn.id, coef);
                }
            }
        }
        model.id = json_model.id;
        model.compartments = json_model.compartments;
        model.version = json_model.version;
        Ok(model)
    }
}

impl DesignResult {
    /// Serialize the result (without the assembled problem) to a JSON string
    pub fn to_json_string(&self) -> Result<String, JsonError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), JsonError> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum JsonError {
    #[error("Unable to read file due to {0}")]
    UnableToRead(String),
    #[error("Unable to parse json due to {0}")]
    UnableToParse(String),
    #[error("Unable to build reaction")]
    UnableToBuildReaction(#[from] ReactionBuilderError),
    #[error("Serde json error")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("Unable to write to file")]
    UnableToWrite(#[from] std::io::Error),
}
// endregion Conversions

#[cfg(test)]
mod tests {
    use super::*;

    const TOY: &str = r#"{
"id":"toy",
"metabolites":[
{"id":"A","name":"Metabolite A","compartment":"c","charge":-1,"formula":"C3"},
{"id":"nad_c","notes":{"original_bigg_ids":["nad_c"]}}
],
"reactions":[
{"id":"EX_A","name":"A exchange","metabolites":{"A":-1.0},"lower_bound":-10.0,
 "upper_bound":10.0,"gene_reaction_rule":"","objective_coefficient":0.0},
{"id":"BIO","metabolites":{"A":-1.0},"lower_bound":0.0,"upper_bound":8.0,
 "gene_reaction_rule":"b0001 and b0002","objective_coefficient":1.0,
 "annotation":{"sbo":"SBO:0000629"}},
{"id":"TGT","metabolites":{"A":-1.0},"subsystem":"Target"}
],
"genes":[{"id":"b0001"},{"id":"b0002"}],
"version":"1"
}"#;

    #[test]
    fn read_model() {
        let model = Model::from_json_str(TOY).unwrap();
        assert_eq!(model.id.as_deref(), Some("toy"));
        assert_eq!(model.reactions.len(), 3);
        assert_eq!(model.metabolites.len(), 2);
        let met = &model.metabolites["A"];
        assert_eq!(met.charge, -1);
        assert_eq!(met.formula.as_deref(), Some("C3"));

        let ex = &model.reactions["EX_A"];
        assert_eq!(ex.name.as_deref(), Some("A exchange"));
        assert_eq!((ex.lower_bound, ex.upper_bound), (-10., 10.));
        let tgt = &model.reactions["TGT"];
        assert_eq!(tgt.lower_bound, DEFAULT_LOWER_BOUND);
        assert_eq!(tgt.upper_bound, DEFAULT_UPPER_BOUND);
        assert_eq!(tgt.subsystem.as_deref(), Some("Target"));

        assert_eq!(model.objective_reactions(), vec!["BIO"]);
    }

    #[test]
    fn malformed_model() {
        let res = Model::from_json_str(r#"{"metabolites": []}"#);
        assert!(matches!(res, Err(JsonError::UnableToParse(_))));
        let res = Model::read_json("does/not/exist.json");
        assert!(matches!(res, Err(JsonError::UnableToRead(_))));
    }

    #[cfg(feature = "minilp")]
    #[test]
    fn result_json() {
        use crate::configuration::{DesignConfigurationBuilder, KnockType};
        use crate::design::design_strains;
        use crate::optimize::solvers::microlp::MicrolpSolver;

        let model = Model::from_json_str(TOY).unwrap();
        let config = DesignConfigurationBuilder::default()
            .knock_type(KnockType::OptKnock)
            .target_reaction("TGT")
            .knockable_reactions(Some(vec!["EX_A".to_string()]))
            .knockout_count(1)
            .build()
            .unwrap();
        // TGT keeps its default reversible bounds, uptake still caps it at 2 at growth 8
        let result = design_strains(&model, &config, &MicrolpSolver::default()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&result.to_json_string().unwrap()).unwrap();
        assert_eq!(value["knock_type"], "OptKnock");
        assert_eq!(value["status"], "Optimal");
        assert!(value["knockouts"].as_array().unwrap().is_empty());
        assert!((value["objective_value"].as_f64().unwrap() - 2.).abs() < 1e-6);
        assert_eq!(value["fluxes"].as_object().unwrap().len(), 3);
        assert!(value.get("problem").is_none());
    }
}
