//! Inequality form of the inner growth problem
//!
//! Every flux bound is written as a row, so the flux columns can be treated as free variables
//! when the system is dualized. Bounds of gated columns are multiplied by the gate: with the gate
//! at 0 the flux is pinned to 0, with the gate at 1 its original range is restored.
use log::debug;

use crate::design::blocks::{Block, LinearSystem};
use crate::design::split::SplitModel;
use crate::design::StructuralError;
use crate::optimize::manifest::{Manifest, ManifestError};
use crate::utils::sparse::csr_from_triplets;

/// Build `A v + Ay g <= b` for the one way fluxes of `split`
///
/// Rows are, in order: `S v <= 0`, `-S v <= 0`, upper then lower bounds of the ungated columns,
/// `v - ub g <= 0` then `-v + lb g <= 0` for the gated columns. A zero bound gives a gated row
/// without a gate coefficient. The system objective is the growth objective.
pub fn assemble_primal(split: &SplitModel) -> Result<LinearSystem, StructuralError> {
    let n = split.num_columns();
    let m = split.stoichiometry.nrows();
    let layout = &split.layout;
    if split.stoichiometry.ncols() != n {
        return Err(StructuralError::Manifest(ManifestError::ShapeMismatch {
            stage: "primal assembly",
            what: "stoichiometric columns",
            expected: n,
            found: split.stoichiometry.ncols(),
        }));
    }

    let (gated, free): (Vec<usize>, Vec<usize>) =
        (0..n).partition(|&c| layout.gate_of_column(c).is_some());

    let mut a_entries: Vec<(usize, usize, f64)> = Vec::new();
    let mut ay_entries: Vec<(usize, usize, f64)> = Vec::new();
    let mut b: Vec<f64> = Vec::new();

    for (r, c, v) in split.stoichiometry.triplet_iter() {
        a_entries.push((r, c, *v));
        a_entries.push((m + r, c, -*v));
    }
    b.extend(std::iter::repeat(0f64).take(2 * m));

    let mut row = 2 * m;
    for &c in &free {
        a_entries.push((row, c, 1f64));
        b.push(split.columns[c].upper_bound);
        row += 1;
    }
    for &c in &free {
        a_entries.push((row, c, -1f64));
        b.push(-split.columns[c].lower_bound);
        row += 1;
    }
    for &c in &gated {
        let gate = layout
            .gate_of_column(c)
            .ok_or(StructuralError::UnknownColumn { column: c })?;
        a_entries.push((row, c, 1f64));
        ay_entries.push((row, gate, -split.columns[c].upper_bound));
        b.push(0f64);
        row += 1;
    }
    for &c in &gated {
        let gate = layout
            .gate_of_column(c)
            .ok_or(StructuralError::UnknownColumn { column: c })?;
        a_entries.push((row, c, -1f64));
        ay_entries.push((row, gate, split.columns[c].lower_bound));
        b.push(0f64);
        row += 1;
    }

    let mut rows = Manifest::new();
    rows.push(Block::MassBalance, m)
        .push(Block::MassBalanceReverse, m)
        .push(Block::FreeUpper, free.len())
        .push(Block::FreeLower, free.len())
        .push(Block::GatedUpper, gated.len())
        .push(Block::GatedLower, gated.len());
    let mut cols = Manifest::new();
    cols.push(Block::Flux, n);

    let (lower, upper): (Vec<f64>, Vec<f64>) = split
        .columns
        .iter()
        .enumerate()
        .map(|(c, col)| {
            if layout.gate_of_column(c).is_some() {
                (col.lower_bound.min(0f64), col.upper_bound.max(0f64))
            } else {
                (col.lower_bound, col.upper_bound)
            }
        })
        .unzip();

    let system = LinearSystem {
        a: csr_from_triplets(row, n, a_entries),
        ay: csr_from_triplets(row, layout.len(), ay_entries),
        b,
        objective: split.growth_objective.clone(),
        lower,
        upper,
        rows,
        cols,
    };
    system.validate("primal assembly")?;
    debug!(
        "Primal system: {} rows, {} fluxes ({} gated)",
        system.num_rows(),
        n,
        gated.len()
    );
    Ok(system)
}
