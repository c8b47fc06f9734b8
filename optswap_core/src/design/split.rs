//! Splits reactions into one way fluxes and builds the index sets the reformulation gates on
//!
//! Every reaction gets a forward column. Reactions with a negative lower bound also get a
//! reverse column, which mirrors the forward one in the [`CouplingRelation`]. Swappable
//! reactions additionally get a cofactor swapped copy (forward and, if needed, reverse), paired
//! with the native reaction in the [`SwapCoupling`].
use std::ops::Range;

use log::debug;
use nalgebra_sparse::CsrMatrix;
use serde::Serialize;

use crate::configuration::DesignConfiguration;
use crate::design::blocks::Block;
use crate::design::prepare::PreparedModel;
use crate::design::{DesignError, StructuralError};
use crate::metabolic_model::reaction::Reaction;
use crate::optimize::manifest::Manifest;
use crate::utils::sparse::{csr_from_triplets, row_entries};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    /// Sign of the column in the net flux of its reaction
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Forward => 1f64,
            Direction::Reverse => -1f64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CofactorForm {
    Native,
    Swapped,
}

/// A one way flux column
#[derive(Clone, Debug, PartialEq)]
pub struct FluxColumn {
    pub id: String,
    /// Index of the reaction in the prepared model
    pub reaction: usize,
    pub direction: Direction,
    pub form: CofactorForm,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Pairs (primary, mirror) of the two one way fluxes of a reversible reaction
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CouplingRelation {
    pairs: Vec<(usize, usize)>,
}

impl CouplingRelation {
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    pub fn mirror_of(&self, primary: usize) -> Option<usize> {
        self.pairs.iter().find(|(p, _)| *p == primary).map(|(_, m)| *m)
    }

    pub fn primary_of(&self, mirror: usize) -> Option<usize> {
        self.pairs.iter().find(|(_, m)| *m == mirror).map(|(p, _)| *p)
    }
}

/// Pairs (native, swapped) of the forward columns of a swappable reaction and its variant
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SwapCoupling {
    pairs: Vec<(usize, usize)>,
}

impl SwapCoupling {
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    /// The other column of the pair containing `column`
    ///
    /// Looking up the partner of the partner gives back `column`.
    pub fn partner(&self, column: usize) -> Option<usize> {
        self.pairs.iter().find_map(|&(q, s)| {
            if q == column {
                Some(s)
            } else if s == column {
                Some(q)
            } else {
                None
            }
        })
    }
}

/// Column index sets of the gated fluxes
///
/// `y` are knockout candidates, `q` native swappable reactions, `s` their swapped variants. The
/// `_coupled` sets hold the reverse columns of the reversible members.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReactionIndexSets {
    pub y: Vec<usize>,
    pub y_coupled: Vec<usize>,
    pub q: Vec<usize>,
    pub q_coupled: Vec<usize>,
    pub s: Vec<usize>,
    pub s_coupled: Vec<usize>,
}

impl ReactionIndexSets {
    /// Check that the sets are pairwise disjoint, in range, and that swaps are paired
    pub fn validate(&self, num_columns: usize) -> Result<(), StructuralError> {
        if self.q.len() != self.s.len() || self.q_coupled.len() != self.s_coupled.len() {
            return Err(StructuralError::SwapCardinality {
                native: self.q.len() + self.q_coupled.len(),
                swapped: self.s.len() + self.s_coupled.len(),
            });
        }
        let mut seen = vec![false; num_columns];
        for &column in [
            &self.y,
            &self.y_coupled,
            &self.q,
            &self.q_coupled,
            &self.s,
            &self.s_coupled,
        ]
        .into_iter()
        .flatten()
        {
            if column >= num_columns {
                return Err(StructuralError::UnknownColumn { column });
            }
            if seen[column] {
                return Err(StructuralError::OverlappingIndexSets { column });
            }
            seen[column] = true;
        }
        Ok(())
    }
}

/// Position of every binary gate, ordered `[y | q | s]`
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryLayout {
    knockout: Vec<usize>,
    native: Vec<usize>,
    swapped: Vec<usize>,
    /// Gate of every flux column, None for ungated columns
    gates: Vec<Option<usize>>,
}

impl BinaryLayout {
    /// Assign one binary to each primary gated column and share it with the mirror column
    pub fn new(
        sets: &ReactionIndexSets,
        coupling: &CouplingRelation,
        num_columns: usize,
    ) -> Result<BinaryLayout, StructuralError> {
        sets.validate(num_columns)?;
        let mut gates = vec![None; num_columns];
        let primaries = sets.y.iter().chain(&sets.q).chain(&sets.s);
        for (gate, &column) in primaries.enumerate() {
            gates[column] = Some(gate);
        }
        for &mirror in sets.y_coupled.iter().chain(&sets.q_coupled).chain(&sets.s_coupled) {
            let primary = coupling
                .primary_of(mirror)
                .ok_or(StructuralError::UncoupledMirror { column: mirror })?;
            if gates[primary].is_none() {
                return Err(StructuralError::UncoupledMirror { column: mirror });
            }
            gates[mirror] = gates[primary];
        }
        Ok(BinaryLayout {
            knockout: sets.y.clone(),
            native: sets.q.clone(),
            swapped: sets.s.clone(),
            gates,
        })
    }

    /// Total number of binaries
    pub fn len(&self) -> usize {
        self.knockout.len() + self.native.len() + self.swapped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn knockout_range(&self) -> Range<usize> {
        0..self.knockout.len()
    }

    pub fn native_range(&self) -> Range<usize> {
        let start = self.knockout.len();
        start..start + self.native.len()
    }

    pub fn swap_range(&self) -> Range<usize> {
        let start = self.knockout.len() + self.native.len();
        start..start + self.swapped.len()
    }

    /// Binary gating the flux column, if any
    pub fn gate_of_column(&self, column: usize) -> Option<usize> {
        self.gates.get(column).copied().flatten()
    }

    /// Primary flux column of a binary
    pub fn column_of_gate(&self, gate: usize) -> Option<usize> {
        self.knockout
            .iter()
            .chain(&self.native)
            .chain(&self.swapped)
            .nth(gate)
            .copied()
    }

    /// Binary pairs (native, swapped), following the order of the swap blocks
    pub fn swap_pairs(&self) -> Vec<(usize, usize)> {
        self.native_range().zip(self.swap_range()).collect()
    }

    /// Column blocks of the binaries
    pub fn manifest(&self) -> Manifest<Block> {
        let mut manifest = Manifest::new();
        manifest
            .push(Block::KnockoutGate, self.knockout.len())
            .push(Block::NativeGate, self.native.len())
            .push(Block::SwapGate, self.swapped.len());
        manifest
    }
}

/// One way flux view of a prepared model
#[derive(Clone, Debug)]
pub struct SplitModel {
    pub columns: Vec<FluxColumn>,
    /// Metabolites x columns
    pub stoichiometry: CsrMatrix<f64>,
    /// Ids of the reactions of the prepared model
    pub reaction_ids: Vec<String>,
    pub index_sets: ReactionIndexSets,
    pub coupling: CouplingRelation,
    pub swap_coupling: SwapCoupling,
    pub layout: BinaryLayout,
    /// Growth objective over the columns (net flux of the growth reaction)
    pub growth_objective: Vec<f64>,
    /// Production objective over the columns (net flux of the target reaction)
    pub c_chemical: Vec<f64>,
    pub growth_reaction: usize,
    pub target_reaction: usize,
}

impl SplitModel {
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Column carrying the native forward flux of a reaction
    pub fn forward_column(&self, reaction: usize) -> Option<usize> {
        self.columns.iter().position(|c| {
            c.reaction == reaction
                && c.direction == Direction::Forward
                && c.form == CofactorForm::Native
        })
    }

    /// Copy with the forward growth flux forced to at least `min_biomass`
    ///
    /// Only the lower bound moves. A floor above the growth upper bound leaves an empty column
    /// box, see [`SplitModel::growth_ceiling`].
    pub fn with_growth_floor(&self, min_biomass: f64) -> SplitModel {
        let mut split = self.clone();
        if let Some(column) = split.forward_column(split.growth_reaction) {
            let col = &mut split.columns[column];
            col.lower_bound = col.lower_bound.max(min_biomass);
        }
        split
    }

    /// Largest forward growth flux the model bounds allow
    pub fn growth_ceiling(&self) -> f64 {
        self.forward_column(self.growth_reaction)
            .map_or(0f64, |column| self.columns[column].upper_bound)
    }

    /// Net flux of every reaction, summing the one way fluxes of both cofactor forms
    pub fn net_fluxes(&self, values: &[f64]) -> Vec<f64> {
        let mut net = vec![0f64; self.reaction_ids.len()];
        for (column, value) in self.columns.iter().zip(values) {
            net[column.reaction] += column.direction.sign() * value;
        }
        net
    }
}

/// Reactions receiving knockout and swap binaries
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Candidates {
    pub knockable: Vec<usize>,
    pub swappable: Vec<usize>,
}

impl Candidates {
    /// Resolve the configured candidate reactions against the prepared model
    ///
    /// Without an explicit knockable list, every reaction which isn't excluded, growth, target or
    /// swappable is a knockout candidate.
    pub fn resolve(
        prepared: &PreparedModel,
        config: &DesignConfiguration,
        with_knockouts: bool,
        with_swaps: bool,
    ) -> Result<Candidates, DesignError> {
        let lookup = |id: &String, kind: &'static str| {
            prepared.reaction_index(id).ok_or_else(|| DesignError::NotFound {
                kind,
                id: id.clone(),
            })
        };
        let excluded = config
            .excluded_reactions
            .iter()
            .map(|id| lookup(id, "excluded reaction"))
            .collect::<Result<Vec<usize>, DesignError>>()?;
        let swappable = if with_swaps {
            config
                .swappable_reactions
                .iter()
                .map(|id| lookup(id, "swappable reaction"))
                .collect::<Result<Vec<usize>, DesignError>>()?
        } else {
            Vec::new()
        };
        let knockable = if !with_knockouts {
            Vec::new()
        } else if let Some(ids) = &config.knockable_reactions {
            ids.iter()
                .map(|id| lookup(id, "knockable reaction"))
                .collect::<Result<Vec<usize>, DesignError>>()?
                .into_iter()
                .filter(|i| !excluded.contains(i))
                .collect()
        } else {
            (0..prepared.reactions.len())
                .filter(|i| {
                    !excluded.contains(i)
                        && !swappable.contains(i)
                        && *i != prepared.growth_index
                        && *i != prepared.target_index
                })
                .collect()
        };
        Ok(Candidates {
            knockable,
            swappable,
        })
    }
}

/// Split the prepared model into one way fluxes and build the gate bookkeeping
///
/// Native columns take their coefficients from the prepared stoichiometry and their objective
/// weights from the prepared growth and target vectors.
pub fn split_model(
    prepared: &PreparedModel,
    candidates: &Candidates,
    cofactor_pairs: &[(String, String)],
) -> Result<SplitModel, DesignError> {
    let mut columns: Vec<FluxColumn> = Vec::new();
    let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
    let mut coupling = CouplingRelation::default();
    let mut sets = ReactionIndexSets::default();
    // reactions x metabolites
    let by_reaction = prepared.stoichiometry.transpose();
    // forward and reverse column of each native reaction
    let mut native_columns: Vec<(usize, Option<usize>)> =
        Vec::with_capacity(prepared.reactions.len());

    for (index, reaction) in prepared.reactions.iter().enumerate() {
        let rows = row_entries(&by_reaction, index);
        let (forward, reverse) = push_directions(
            reaction,
            &rows,
            index,
            CofactorForm::Native,
            &mut columns,
            &mut triplets,
        );
        if let Some(reverse) = reverse {
            coupling.pairs.push((forward, reverse));
        }
        native_columns.push((forward, reverse));
    }

    for &index in &candidates.knockable {
        let (forward, reverse) = native_columns[index];
        sets.y.push(forward);
        sets.y_coupled.extend(reverse);
    }

    let mut swap_coupling = SwapCoupling::default();
    for &index in &candidates.swappable {
        let native = &prepared.reactions[index];
        let swapped = native.with_swapped_cofactors(cofactor_pairs).ok_or_else(|| {
            DesignError::InvalidConfiguration(format!(
                "Swappable reaction {} uses none of the swapped cofactors",
                native.id
            ))
        })?;
        let (forward, reverse) = native_columns[index];
        sets.q.push(forward);
        sets.q_coupled.extend(reverse);
        let rows = metabolite_rows(prepared, &swapped)?;
        let (swap_forward, swap_reverse) = push_directions(
            &swapped,
            &rows,
            index,
            CofactorForm::Swapped,
            &mut columns,
            &mut triplets,
        );
        if let Some(swap_reverse) = swap_reverse {
            coupling.pairs.push((swap_forward, swap_reverse));
        }
        sets.s.push(swap_forward);
        sets.s_coupled.extend(swap_reverse);
        swap_coupling.pairs.push((forward, swap_forward));
    }

    let stoichiometry = csr_from_triplets(prepared.metabolites.len(), columns.len(), triplets);
    let layout = BinaryLayout::new(&sets, &coupling, columns.len())?;

    // a reaction's weight goes to its native columns, negated on the reverse one
    let spread = |weights: &[f64]| -> Vec<f64> {
        columns
            .iter()
            .map(|c| match c.form {
                CofactorForm::Native => c.direction.sign() * weights[c.reaction],
                CofactorForm::Swapped => 0f64,
            })
            .collect()
    };
    let growth_objective = spread(&prepared.organism_objective);
    let c_chemical = spread(&prepared.c_chemical);
    debug!(
        "Split {} reactions into {} one way fluxes, {} binaries",
        prepared.reactions.len(),
        columns.len(),
        layout.len()
    );

    Ok(SplitModel {
        columns,
        stoichiometry,
        reaction_ids: prepared.reactions.iter().map(|r| r.id.clone()).collect(),
        index_sets: sets,
        coupling,
        swap_coupling,
        layout,
        growth_objective,
        c_chemical,
        growth_reaction: prepared.growth_index,
        target_reaction: prepared.target_index,
    })
}

/// (row, coefficient) pairs of a reaction built outside the prepared matrix
fn metabolite_rows(
    prepared: &PreparedModel,
    reaction: &Reaction,
) -> Result<Vec<(usize, f64)>, DesignError> {
    reaction
        .metabolites
        .iter()
        .map(|(met, coef)| {
            prepared
                .metabolite_index(met)
                .map(|row| (row, *coef))
                .ok_or_else(|| {
                    DesignError::InvalidConfiguration(format!(
                        "Metabolite {met} of {} is not in the model",
                        reaction.id
                    ))
                })
        })
        .collect()
}

/// Append the forward column (and reverse column when needed) of `reaction`
///
/// Swapped variants carry the swap id, so their columns are named after it.
fn push_directions(
    reaction: &Reaction,
    rows: &[(usize, f64)],
    index: usize,
    form: CofactorForm,
    columns: &mut Vec<FluxColumn>,
    triplets: &mut Vec<(usize, usize, f64)>,
) -> (usize, Option<usize>) {
    let forward = columns.len();
    columns.push(FluxColumn {
        id: reaction.get_forward_id(),
        reaction: index,
        direction: Direction::Forward,
        form,
        lower_bound: reaction.get_forward_lower_bound(),
        upper_bound: reaction.get_forward_upper_bound(),
    });
    triplets.extend(rows.iter().map(|(row, coef)| (*row, forward, *coef)));
    if !reaction.has_reverse_direction() {
        return (forward, None);
    }
    let reverse = columns.len();
    columns.push(FluxColumn {
        id: reaction.get_reverse_id(),
        reaction: index,
        direction: Direction::Reverse,
        form,
        lower_bound: reaction.get_reverse_lower_bound(),
        upper_bound: reaction.get_reverse_upper_bound(),
    });
    triplets.extend(rows.iter().map(|(row, coef)| (*row, reverse, -*coef)));
    (forward, Some(reverse))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::{default_cofactor_pairs, DesignConfigurationBuilder};
    use crate::design::prepare::prepare;
    use crate::test_utils::{init_logger, optknock_toy, reaction, swap_toy};

    fn split_swap_toy(
        knockable: Vec<String>,
        swappable: Vec<String>,
    ) -> Result<SplitModel, DesignError> {
        let prepared = prepare(&swap_toy(), "TGT", Some("BIO")).unwrap();
        let config = DesignConfigurationBuilder::default()
            .target_reaction("TGT")
            .knockable_reactions(Some(knockable))
            .swappable_reactions(swappable)
            .build()
            .unwrap();
        let candidates = Candidates::resolve(&prepared, &config, true, true)?;
        split_model(&prepared, &candidates, &config.cofactor_pairs)
    }

    #[test]
    fn reversible_split() {
        init_logger();
        let prepared = prepare(&optknock_toy(), "TGT", Some("BIO")).unwrap();
        let config = DesignConfigurationBuilder::default()
            .target_reaction("TGT")
            .build()
            .unwrap();
        let candidates = Candidates::resolve(&prepared, &config, true, false).unwrap();
        assert_eq!(candidates.knockable, vec![0]);
        let split = split_model(&prepared, &candidates, &config.cofactor_pairs).unwrap();

        assert_eq!(split.num_columns(), 4);
        assert_eq!(split.columns[1].direction, Direction::Reverse);
        assert_eq!(split.columns[1].upper_bound, 10.);
        assert_eq!(split.coupling.pairs(), &[(0, 1)]);
        assert_eq!(split.index_sets.y, vec![0]);
        assert_eq!(split.index_sets.y_coupled, vec![1]);
        assert_eq!(split.layout.len(), 1);
        assert_eq!(split.layout.gate_of_column(0), Some(0));
        assert_eq!(split.layout.gate_of_column(1), Some(0));
        assert_eq!(split.layout.gate_of_column(2), None);
        assert_eq!(split.growth_objective, vec![0., 0., 1., 0.]);
        assert_eq!(split.c_chemical, vec![0., 0., 0., 1.]);
        assert_eq!(split.net_fluxes(&[1., 4., 2., 1.]), vec![-3., 2., 1.]);

        // the reverse exchange column takes A up
        let reverse: Vec<(usize, f64)> = split
            .stoichiometry
            .triplet_iter()
            .filter(|(_, c, _)| *c == 1)
            .map(|(r, _, v)| (r, *v))
            .collect();
        assert_eq!(reverse, vec![(0, 1.)]);
    }

    #[test]
    fn follows_prepared_model() {
        let mut prepared = prepare(&optknock_toy(), "TGT", Some("BIO")).unwrap();
        // EX_A, BIO, TGT all drain A once
        assert_eq!(row_entries(&prepared.stoichiometry, 0), vec![(0, -1.), (1, -1.), (2, -1.)]);
        let doubled = vec![(0, 0, -1.), (0, 1, -2.), (0, 2, -1.)];
        prepared.stoichiometry = csr_from_triplets(1, 3, doubled);
        prepared.organism_objective = vec![1., 0.5, 0.];
        let split = split_model(&prepared, &Candidates::default(), &default_cofactor_pairs())
            .unwrap();
        // columns EX_A, EX_A reverse, BIO, TGT
        assert_eq!(
            row_entries(&split.stoichiometry, 0),
            vec![(0, -1.), (1, 1.), (2, -2.), (3, -1.)]
        );
        assert_eq!(split.growth_objective, vec![1., -1., 0.5, 0.]);
        assert_eq!(split.c_chemical, vec![0., 0., 0., 1.]);
    }

    #[test]
    fn swap_partners() {
        let split = split_swap_toy(vec![], vec!["DH".to_string()]).unwrap();
        assert_eq!(split.index_sets.q.len(), split.index_sets.s.len());
        let q = split.index_sets.q[0];
        let s = split.index_sets.s[0];
        assert_eq!(split.swap_coupling.partner(q), Some(s));
        for &(q, s) in split.swap_coupling.pairs() {
            let partner = split.swap_coupling.partner(q).unwrap();
            assert_eq!(split.swap_coupling.partner(partner), Some(q));
            assert_eq!(split.swap_coupling.partner(s), Some(q));
        }
        assert_eq!(split.swap_coupling.partner(0), None);
        assert_eq!(split.columns[s].form, CofactorForm::Swapped);
        assert_eq!(split.columns[s].reaction, split.columns[q].reaction);
        assert_eq!(split.layout.swap_pairs(), vec![(0, 1)]);
        assert_eq!(split.layout.column_of_gate(1), Some(s));

        // nadph_c
        let nadph = 4;
        let nadph_entries: Vec<usize> = split
            .stoichiometry
            .triplet_iter()
            .filter(|(r, _, _)| *r == nadph)
            .map(|(_, c, _)| c)
            .collect();
        assert_eq!(split.stoichiometry.nrows(), 6);
        assert!(nadph_entries.contains(&s));
    }

    #[test]
    fn overlapping_candidates() {
        let res = split_swap_toy(vec!["DH".to_string()], vec!["DH".to_string()]);
        assert!(matches!(
            res,
            Err(DesignError::Structural(StructuralError::OverlappingIndexSets { .. }))
        ));
    }

    #[test]
    fn swappable_without_cofactor() {
        let res = split_swap_toy(vec![], vec!["UPT".to_string()]);
        assert!(matches!(res, Err(DesignError::InvalidConfiguration(_))));
    }

    #[test]
    fn unknown_candidates() {
        let res = split_swap_toy(vec!["PGI".to_string()], vec![]);
        assert!(matches!(res, Err(DesignError::NotFound { .. })));
    }

    #[test]
    fn unpaired_sets() {
        let sets = ReactionIndexSets {
            q: vec![0],
            ..ReactionIndexSets::default()
        };
        assert!(matches!(
            sets.validate(2),
            Err(StructuralError::SwapCardinality { native: 1, swapped: 0 })
        ));
        let sets = ReactionIndexSets {
            y: vec![0],
            y_coupled: vec![1],
            ..ReactionIndexSets::default()
        };
        assert!(matches!(
            BinaryLayout::new(&sets, &CouplingRelation::default(), 2),
            Err(StructuralError::UncoupledMirror { column: 1 })
        ));
    }

    #[test]
    fn growth_floor() {
        let mut model = optknock_toy();
        model.add_reaction(reaction("EX_B", &[("B", -1.)], 0., 10.));
        let prepared = prepare(&model, "TGT", Some("BIO")).unwrap();
        let split = split_model(&prepared, &Candidates::default(), &default_cofactor_pairs())
            .unwrap()
            .with_growth_floor(0.1);
        let growth = split.forward_column(1).unwrap();
        assert_eq!(split.columns[growth].lower_bound, 0.1);
        assert!(split.layout.is_empty());

        // a floor above the ceiling doesn't loosen the model
        let raised = split.with_growth_floor(12.);
        assert_eq!(raised.columns[growth].lower_bound, 12.);
        assert_eq!(raised.columns[growth].upper_bound, 8.);
        assert_eq!(raised.growth_ceiling(), 8.);
    }
}
