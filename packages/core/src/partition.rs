//! Uniform partition bounds.
//!
//! For a uniform refinement that splits every tree into `2^(dimension *
//! level)` children, ordered by tree then child index, each rank is assigned
//! a fair share of the global child range. This module provides:
//!
//! - [`uniform_child_interval`]: the `[first_child, last_child)` interval of
//!   one rank over a global child count
//! - [`uniform_extents`]: the interval translated into tree ids and in-tree
//!   child offsets
//! - [`Cmesh::uniform_bounds`]: the committed-mesh entry point with the
//!   pyramid and overflow checks
//!
//! Fair shares are computed as `floor(total * rank / size)` with 128-bit
//! intermediates, so adjacent ranks produce exactly adjoining intervals for
//! any global child count that fits in 64 bits.

use serde::{Deserialize, Serialize};

use crate::cmesh::Cmesh;
use crate::eclass::EClass;
use crate::error::{MeshError, MeshResult};
use crate::tree::GlobalTreeId;

/// Per-rank tree range and in-tree child offsets of a uniform refinement.
///
/// The tree range is inclusive: `first_local_tree ..= last_local_tree`, with
/// `child_in_tree_begin` the first owned child of the first tree and
/// `child_in_tree_end` the end (exclusive) of the owned children in the last
/// tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniformBounds {
    pub first_local_tree: GlobalTreeId,
    pub child_in_tree_begin: u64,
    pub last_local_tree: GlobalTreeId,
    pub child_in_tree_end: u64,
}

impl UniformBounds {
    /// Whether this rank's slice of the refinement is empty.
    ///
    /// An empty slice collapses the offsets: the tree range degenerates to a
    /// single tree with `child_in_tree_begin == child_in_tree_end`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_local_tree == self.last_local_tree
            && self.child_in_tree_begin == self.child_in_tree_end
    }
}

/// The `[first_child, last_child)` interval of `rank` over `total_children`.
///
/// Rank 0 always starts at 0 and rank `size - 1` always ends at
/// `total_children`, so the per-rank intervals tile the global range with no
/// gap and no overlap: `last_child` of rank `r` equals `first_child` of rank
/// `r + 1`.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // shares are bounded by total_children
pub fn uniform_child_interval(total_children: u64, rank: u32, size: u32) -> (u64, u64) {
    debug_assert!(rank < size);
    let share = |r: u32| (u128::from(total_children) * u128::from(r) / u128::from(size)) as u64;
    let first = if rank == 0 { 0 } else { share(rank) };
    let last = if rank == size - 1 {
        total_children
    } else {
        share(rank + 1)
    };
    (first, last)
}

/// Translates a rank's child interval into tree ids and in-tree offsets.
///
/// `children_per_tree` is `2^(dimension * level)`; the product
/// `num_trees * children_per_tree` must fit in 64 bits (checked by
/// [`Cmesh::uniform_bounds`]).
#[must_use]
pub fn uniform_extents(
    num_trees: u64,
    children_per_tree: u64,
    rank: u32,
    size: u32,
) -> UniformBounds {
    debug_assert!(num_trees.checked_mul(children_per_tree).is_some());
    let total = num_trees * children_per_tree;
    let (first_child, last_child) = uniform_child_interval(total, rank, size);

    let first_local_tree = first_child / children_per_tree;
    let child_in_tree_begin = first_child - first_local_tree * children_per_tree;
    let last_local_tree = if first_child < last_child {
        (last_child - 1) / children_per_tree
    } else {
        first_local_tree
    };
    let child_in_tree_end = last_child - last_local_tree * children_per_tree;

    UniformBounds {
        first_local_tree,
        child_in_tree_begin,
        last_local_tree,
        child_in_tree_end,
    }
}

impl Cmesh {
    /// Per-rank bounds of the uniform refinement at `level`.
    ///
    /// # Errors
    ///
    /// Unsupported if the mesh contains pyramid trees (no hybrid pyramid
    /// partition); Config error if `2^(dimension * level)` children per tree
    /// or the global child count overflow 64 bits.
    pub fn uniform_bounds(&self, level: u32) -> MeshResult<UniformBounds> {
        if self.class_count(EClass::Pyramid) > 0 {
            return Err(MeshError::PyramidPartition);
        }
        let overflow = || MeshError::LevelOverflow {
            level,
            dimension: self.dimension(),
        };
        let shift = u32::from(self.dimension()) * level;
        let children_per_tree = 1_u64.checked_shl(shift).ok_or_else(overflow)?;
        self.num_trees()
            .checked_mul(children_per_tree)
            .ok_or_else(overflow)?;

        Ok(uniform_extents(
            self.num_trees(),
            children_per_tree,
            self.rank(),
            self.size(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cmesh::CmeshBuilder;
    use crate::comm::{GroupComm, SingleComm};
    use crate::error::ErrorKind;

    fn committed(class: EClass, count: u64, rank: u32, size: u32) -> Cmesh {
        let mut builder = CmeshBuilder::new();
        builder
            .set_mpicomm(Arc::new(GroupComm::new(rank, size)), false)
            .unwrap();
        builder.set_num_trees(count).unwrap();
        for t in 0..count {
            builder.set_tree(t, class).unwrap();
        }
        builder.commit().unwrap()
    }

    // -- literal scenarios --

    #[test]
    fn single_hex_at_level_zero() {
        let mut builder = CmeshBuilder::new();
        builder.set_mpicomm(Arc::new(SingleComm), false).unwrap();
        builder.set_num_trees(1).unwrap();
        builder.set_tree(0, EClass::Hex).unwrap();
        let cmesh = builder.commit().unwrap();

        assert_eq!(cmesh.dimension(), 3);
        let bounds = cmesh.uniform_bounds(0).unwrap();
        assert_eq!(
            bounds,
            UniformBounds {
                first_local_tree: 0,
                child_in_tree_begin: 0,
                last_local_tree: 0,
                child_in_tree_end: 1,
            }
        );
        assert!(!bounds.is_empty());
    }

    #[test]
    fn six_tets_at_level_one() {
        let cmesh = committed(EClass::Tet, 6, 0, 1);
        assert_eq!(cmesh.dimension(), 3);
        // C = 2^3 = 8 children per tree, G = 48.
        let bounds = cmesh.uniform_bounds(1).unwrap();
        assert_eq!(
            bounds,
            UniformBounds {
                first_local_tree: 0,
                child_in_tree_begin: 0,
                last_local_tree: 5,
                child_in_tree_end: 8,
            }
        );
    }

    #[test]
    fn three_triangles_level_two_rank_two_of_four() {
        // C = 2^(2*2) = 16, G = 48; rank 2 owns [24, 36).
        let cmesh = committed(EClass::Triangle, 3, 2, 4);
        let bounds = cmesh.uniform_bounds(2).unwrap();
        assert_eq!(
            bounds,
            UniformBounds {
                first_local_tree: 1,
                child_in_tree_begin: 8,
                last_local_tree: 2,
                child_in_tree_end: 4,
            }
        );
    }

    #[test]
    fn empty_rank_collapses_the_offsets() {
        // G = 2 children over 4 ranks: rank 2 gets [1, 1).
        let (first, last) = uniform_child_interval(2, 2, 4);
        assert_eq!((first, last), (1, 1));

        let cmesh = committed(EClass::Line, 2, 2, 4);
        let bounds = cmesh.uniform_bounds(0).unwrap();
        assert!(bounds.is_empty());
        assert_eq!(bounds.first_local_tree, bounds.last_local_tree);
        assert_eq!(bounds.child_in_tree_begin, bounds.child_in_tree_end);
    }

    // -- guards --

    #[test]
    fn pyramids_cannot_be_partitioned() {
        let cmesh = committed(EClass::Pyramid, 3, 0, 2);
        let err = cmesh.uniform_bounds(1).unwrap_err();
        assert!(matches!(err, MeshError::PyramidPartition));
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn oversized_levels_are_rejected() {
        let cmesh = committed(EClass::Hex, 2, 0, 1);
        // 3 * 22 = 66 bits of children per tree.
        let err = cmesh.uniform_bounds(22).unwrap_err();
        assert!(matches!(err, MeshError::LevelOverflow { level: 22, .. }));

        // The shift fits but num_trees * children does not.
        let cmesh = committed(EClass::Hex, 3, 0, 1);
        let err = cmesh.uniform_bounds(21).unwrap_err();
        assert!(matches!(err, MeshError::LevelOverflow { level: 21, .. }));
    }

    #[test]
    fn large_child_counts_do_not_overflow() {
        // G = 2^63: the naive 64-bit product G * rank would overflow.
        let total = 1_u64 << 63;
        let (first, last) = uniform_child_interval(total, 2, 3);
        assert!(first < last);
        assert_eq!(uniform_child_interval(total, 1, 3).1, first);
        assert_eq!(uniform_child_interval(total, 2, 3).1, total);
    }
}
