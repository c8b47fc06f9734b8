//! Named block descriptors for the rows and columns of assembled matrices
//!
//! Every assembly stage records which contiguous range of rows (or columns) each of its blocks
//! occupies. The next stage checks the manifest it is handed before it reads from the matrix,
//! so a shape mismatch between stages is reported instead of silently producing a wrong problem.
use std::fmt::{Debug, Display};
use std::ops::Range;

use thiserror::Error;

/// Ordered list of (block, length) pairs
#[derive(Clone, Debug, PartialEq)]
pub struct Manifest<B> {
    entries: Vec<(B, usize)>,
}

impl<B> Default for Manifest<B> {
    fn default() -> Self {
        Manifest {
            entries: Vec::new(),
        }
    }
}

impl<B: Clone + PartialEq + Debug> Manifest<B> {
    /// Create an empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block, zero length blocks are recorded as well
    pub fn push(&mut self, block: B, len: usize) -> &mut Self {
        self.entries.push((block, len));
        self
    }

    /// Append every block of `other`
    pub fn extend(&mut self, other: &Manifest<B>) -> &mut Self {
        self.entries.extend(other.entries.iter().cloned());
        self
    }

    /// Total length of all blocks
    pub fn len(&self) -> usize {
        self.entries.iter().map(|(_, len)| len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> &[(B, usize)] {
        &self.entries
    }

    /// Range covered by the first block equal to `block`
    pub fn range(&self, block: &B) -> Option<Range<usize>> {
        let mut offset = 0;
        for (b, len) in &self.entries {
            if b == block {
                return Some(offset..offset + len);
            }
            offset += len;
        }
        None
    }

    /// Length of the first block equal to `block`, 0 if absent
    pub fn block_len(&self, block: &B) -> usize {
        self.range(block).map(|r| r.len()).unwrap_or(0)
    }

    /// Check that the blocks appear in exactly the `expected` order
    pub fn expect_blocks(&self, stage: &'static str, expected: &[B]) -> Result<(), ManifestError> {
        let found: Vec<&B> = self.entries.iter().map(|(b, _)| b).collect();
        if found.len() != expected.len() || found.iter().zip(expected).any(|(f, e)| *f != e) {
            return Err(ManifestError::BlockOrder {
                stage,
                expected: format!("{expected:?}"),
                found: format!("{found:?}"),
            });
        }
        Ok(())
    }

    /// Check that the manifest describes exactly `actual` rows (or columns)
    pub fn expect_len(
        &self,
        stage: &'static str,
        what: &'static str,
        actual: usize,
    ) -> Result<(), ManifestError> {
        check_len(stage, what, self.len(), actual)
    }
}

impl<B: Display> Manifest<B> {
    /// Replace the blocks by their display labels
    pub fn labels(&self) -> Manifest<String> {
        Manifest {
            entries: self
                .entries
                .iter()
                .map(|(b, len)| (b.to_string(), *len))
                .collect(),
        }
    }
}

/// Compare two lengths which must agree
pub fn check_len(
    stage: &'static str,
    what: &'static str,
    expected: usize,
    found: usize,
) -> Result<(), ManifestError> {
    if expected != found {
        return Err(ManifestError::ShapeMismatch {
            stage,
            what,
            expected,
            found,
        });
    }
    Ok(())
}

/// Errors raised when one assembly stage hands a malformed system to the next
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ManifestError {
    /// A dimension doesn't agree with what the manifest (or a sibling matrix) says
    #[error("{stage}: {what} has length {found}, expected {expected}")]
    ShapeMismatch {
        stage: &'static str,
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// Blocks are missing, extra, or out of order
    #[error("{stage}: expected blocks {expected}, found {found}")]
    BlockOrder {
        stage: &'static str,
        expected: String,
        found: String,
    },
}
