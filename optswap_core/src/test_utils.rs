//! Toy networks and helpers shared by the unit tests
use indexmap::IndexMap;

use crate::metabolic_model::model::Model;
use crate::metabolic_model::reaction::{Reaction, ReactionBuilder};

/// Install a logger printing everything, safe to call from every test
pub fn init_logger() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

pub fn reaction(
    id: &str,
    metabolites: &[(&str, f64)],
    lower_bound: f64,
    upper_bound: f64,
) -> Reaction {
    let metabolites: IndexMap<String, f64> = metabolites
        .iter()
        .map(|(met, coef)| (met.to_string(), *coef))
        .collect();
    ReactionBuilder::default()
        .id(id.to_string())
        .metabolites(metabolites)
        .lower_bound(lower_bound)
        .upper_bound(upper_bound)
        .build()
        .unwrap()
}

fn model_of(reactions: Vec<Reaction>) -> Model {
    let mut model = Model::new_empty();
    for r in reactions {
        model.add_reaction(r);
    }
    model
}

/// Reversible exchange of A, growth and target both draining A
///
/// Growth is capped at 8 and at most 10 A can be taken up, so at optimal growth the target can
/// carry up to 2, but need not carry any.
pub fn optknock_toy() -> Model {
    model_of(vec![
        reaction("EX_A", &[("A", -1.)], -10., 10.),
        reaction("BIO", &[("A", -1.)], 0., 8.),
        reaction("TGT", &[("A", -1.)], 0., 10.),
    ])
}

/// Uptake of A, and two routes from A to E, growth needs one A and one E
///
/// At optimal growth (5) the E can come from BYP alone, knocking BYP out forces 5 through TGT.
pub fn robust_toy() -> Model {
    model_of(vec![
        reaction("UPT", &[("A", 1.)], 0., 10.),
        reaction("BYP", &[("A", -1.), ("E", 1.)], 0., 10.),
        reaction("TGT", &[("A", -1.), ("E", 1.)], 0., 10.),
        reaction("BIO", &[("A", -1.), ("E", -1.)], 0., 10.),
    ])
}

/// Uptake of A, growth needs one A and one E, BYP makes two E per A and TGT one
///
/// Growth is highest (20/3) through BYP alone with no production. With BYP knocked out, growth
/// (5) is coupled to 5 units of target flux.
pub fn coupling_toy() -> Model {
    model_of(vec![
        reaction("UPT", &[("A", 1.)], 0., 10.),
        reaction("BYP", &[("A", -1.), ("E", 2.)], 0., 10.),
        reaction("TGT", &[("A", -1.), ("E", 1.)], 0., 10.),
        reaction("BIO", &[("A", -1.), ("E", -1.)], 0., 10.),
    ])
}

/// NADH producing dehydrogenase feeding growth, with NADH oxidation available but no NADPH sink
/// other than the target
///
/// Swapping DH to NADP(H) makes the target the only way to reoxidize the cofactor.
pub fn swap_toy() -> Model {
    model_of(vec![
        reaction("UPT", &[("A", 1.)], 0., 10.),
        reaction(
            "DH",
            &[("A", -1.), ("nad_c", -1.), ("B", 1.), ("nadh_c", 1.)],
            0.,
            10.,
        ),
        reaction("BIO", &[("B", -1.)], 0., 10.),
        reaction("NOX", &[("nadh_c", -1.), ("nad_c", 1.)], 0., 10.),
        reaction("TGT", &[("nadph_c", -1.), ("nadp_c", 1.)], 0., 10.),
    ])
}

/// A reversible exchange [-5, 10] balanced by a reversible drain [-10, 10]
pub fn gating_toy() -> Model {
    model_of(vec![
        reaction("EX_A", &[("A", -1.)], -5., 10.),
        reaction("BIO", &[("A", -1.)], -10., 10.),
    ])
}
