//! Helpers for assembling sparse matrices out of blocks
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Build a CSR matrix from (row, col, value) triplets, dropping explicit zeros
///
/// Duplicate entries are summed.
pub(crate) fn csr_from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> CsrMatrix<f64>
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut coo = CooMatrix::new(nrows, ncols);
    for (r, c, v) in triplets {
        if v != 0f64 {
            coo.push(r, c, v);
        }
    }
    CsrMatrix::from(&coo)
}

/// Copy `block`, multiplied by `scale`, into `coo` with its top left corner at
/// (row_offset, col_offset)
pub(crate) fn push_block(
    coo: &mut CooMatrix<f64>,
    block: &CsrMatrix<f64>,
    row_offset: usize,
    col_offset: usize,
    scale: f64,
) {
    for (r, c, v) in block.triplet_iter() {
        let value = *v * scale;
        if value != 0f64 {
            coo.push(row_offset + r, col_offset + c, value);
        }
    }
}

/// Copy the transpose of `block`, multiplied by `scale`, into `coo` at the given offset
pub(crate) fn push_block_transposed(
    coo: &mut CooMatrix<f64>,
    block: &CsrMatrix<f64>,
    row_offset: usize,
    col_offset: usize,
    scale: f64,
) {
    for (r, c, v) in block.triplet_iter() {
        let value = *v * scale;
        if value != 0f64 {
            coo.push(row_offset + c, col_offset + r, value);
        }
    }
}

/// Sparse matrix times dense vector
pub(crate) fn mul_vec(matrix: &CsrMatrix<f64>, x: &[f64]) -> Vec<f64> {
    matrix
        .row_iter()
        .map(|row| {
            row.col_indices()
                .iter()
                .zip(row.values())
                .map(|(c, v)| v * x[*c])
                .sum::<f64>()
        })
        .collect()
}

/// The (column, value) pairs of a single row
pub(crate) fn row_entries(matrix: &CsrMatrix<f64>, row: usize) -> Vec<(usize, f64)> {
    let row = matrix.row(row);
    row.col_indices()
        .iter()
        .copied()
        .zip(row.values().iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triplets_and_products() {
        let m = csr_from_triplets(2, 3, vec![(0, 0, 1.), (0, 2, 2.), (1, 1, -1.), (1, 1, 0.)]);
        assert_eq!(m.nnz(), 3);
        assert_eq!(mul_vec(&m, &[1., 2., 3.]), vec![7., -2.]);
        assert_eq!(row_entries(&m, 0), vec![(0, 1.), (2, 2.)]);
    }

    #[test]
    fn blocks() {
        let m = csr_from_triplets(1, 2, vec![(0, 0, 1.), (0, 1, 3.)]);
        let mut coo = CooMatrix::new(3, 4);
        push_block(&mut coo, &m, 0, 2, -1.);
        push_block_transposed(&mut coo, &m, 1, 0, 2.);
        let out = CsrMatrix::from(&coo);
        assert_eq!(row_entries(&out, 0), vec![(2, -1.), (3, -3.)]);
        assert_eq!(row_entries(&out, 1), vec![(0, 2.)]);
        assert_eq!(row_entries(&out, 2), vec![(0, 6.)]);
    }
}
