//! Launch geometry of the grid-parallel backend.

use std::ops::Range;

use crate::config::THREADS_PER_BLOCK;

/// Largest block count a grid may have.
pub const MAX_GRID_BLOCKS: usize = (1 << 31) - 1;

/// Blocks and units per block for one launch.
///
/// Unit `(block, thread)` handles outer index `block * threads_per_block +
/// thread`; units whose index reaches the extent do nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaunchGeometry {
    /// Number of blocks.
    pub blocks: usize,
    /// Units per block.
    pub threads_per_block: usize,
}

impl LaunchGeometry {
    /// Smallest grid of [`THREADS_PER_BLOCK`]-wide blocks covering `extent`.
    pub fn for_extent(extent: usize) -> Self {
        Self {
            blocks: extent.div_ceil(THREADS_PER_BLOCK),
            threads_per_block: THREADS_PER_BLOCK,
        }
    }

    /// Total units, saturated.
    pub fn units(&self) -> usize {
        self.blocks.saturating_mul(self.threads_per_block)
    }

    /// Outer indices of `block` below `extent`, in thread order.
    pub fn active_range(&self, block: usize, extent: usize) -> Range<usize> {
        let start = block.saturating_mul(self.threads_per_block).min(extent);
        let end = start.saturating_add(self.threads_per_block).min(extent);
        start..end
    }

    /// Whether the grid fits the block limit.
    pub fn is_valid(&self) -> bool {
        self.blocks <= MAX_GRID_BLOCKS && self.threads_per_block > 0
    }
}
