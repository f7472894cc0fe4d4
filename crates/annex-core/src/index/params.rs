//! Tuning knobs for index creation and traversal.

use crate::index::layout::DEFAULT_BLOCK_SIZE_UNITS;
use serde::{Deserialize, Serialize};

/// Options applied when an index file is created.
///
/// Opening an existing file only validates `dimension` against the
/// stored header; the block size is read back from disk. Changing the
/// block size of an existing index requires rewriting the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Vector dimension declared by the schema.
    pub dimension: u16,
    /// Block size in 512-byte units (`8` = 4096-byte blocks).
    pub block_size_units: u16,
}

impl IndexOptions {
    /// Creates options for `dimension`-element vectors with the default
    /// 4096-byte blocks.
    #[must_use]
    pub const fn new(dimension: u16) -> Self {
        Self {
            dimension,
            block_size_units: DEFAULT_BLOCK_SIZE_UNITS,
        }
    }
}

/// Traversal parameters.
///
/// `width` is the `L` parameter of the DiskANN literature: the number
/// of closest pending candidates kept while walking the graph. It is a
/// pure traversal knob, independent of the per-node fan-out bound `M`
/// that falls out of the block geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Search width. Higher widths improve recall at the cost of more
    /// block reads per query.
    pub width: usize,
    /// Upper bound on block reads per traversal. A search that exhausts
    /// the budget returns the best results found so far instead of
    /// failing.
    pub read_budget: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            width: 10,
            read_budget: 512,
        }
    }
}

impl SearchParams {
    /// Creates parameters with search width `width` and the default
    /// read budget.
    #[must_use]
    pub fn with_width(width: usize) -> Self {
        Self {
            width: width.max(1),
            ..Self::default()
        }
    }
}
