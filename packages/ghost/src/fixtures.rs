//! Deterministic forest fixtures for ghost-layer tests.
//!
//! [`UniformQuadForest`] is a horizontal strip of quad trees, each uniformly
//! refined to a fixed level, with elements in Morton order and ownership
//! split into contiguous global-element ranges per rank. It implements the
//! full [`ForestView`] surface in memory, so multi-rank scenarios run as
//! plain loops over per-rank instances with no transport involved.

use std::sync::Arc;

use treemesh_core::{
    uniform_child_interval, Cmesh, CmeshBuilder, EClass, GlobalTreeId, GroupComm, LocalTreeId,
    MeshResult, TreeRecord,
};

use crate::forest::ForestView;
use crate::scheme::{ElementArray, ElementScheme};

/// Byte size of a quad fixture element: level and Morton index, both LE u64.
pub const QUAD_ELEM_SIZE: usize = 16;

/// Encodes a quad element as `level || morton` little-endian bytes.
pub fn quad_elem(level: u32, morton: u64) -> [u8; QUAD_ELEM_SIZE] {
    let mut bytes = [0_u8; QUAD_ELEM_SIZE];
    bytes[..8].copy_from_slice(&u64::from(level).to_le_bytes());
    bytes[8..].copy_from_slice(&morton.to_le_bytes());
    bytes
}

fn decode(elem: &[u8]) -> (u32, u64) {
    let level = u64::from_le_bytes(elem[..8].try_into().unwrap());
    let morton = u64::from_le_bytes(elem[8..].try_into().unwrap());
    (u32::try_from(level).unwrap(), morton)
}

fn morton_encode(x: u64, y: u64) -> u64 {
    let mut morton = 0;
    for bit in 0..32 {
        morton |= ((x >> bit) & 1) << (2 * bit);
        morton |= ((y >> bit) & 1) << (2 * bit + 1);
    }
    morton
}

fn morton_decode(morton: u64) -> (u64, u64) {
    let mut x = 0;
    let mut y = 0;
    for bit in 0..32 {
        x |= ((morton >> (2 * bit)) & 1) << bit;
        y |= ((morton >> (2 * bit + 1)) & 1) << bit;
    }
    (x, y)
}

/// Scheme for the 16-byte quad fixture elements.
#[derive(Debug, Default)]
pub struct QuadScheme;

impl ElementScheme for QuadScheme {
    fn element_size(&self) -> usize {
        QUAD_ELEM_SIZE
    }

    fn element_level(&self, elem: &[u8]) -> u32 {
        decode(elem).0
    }

    fn element_linear_id(&self, elem: &[u8], level: u32) -> u64 {
        let (own_level, morton) = decode(elem);
        if level >= own_level {
            morton << (2 * (level - own_level))
        } else {
            morton >> (2 * (own_level - level))
        }
    }

    fn element_num_faces(&self, _elem: &[u8]) -> usize {
        4
    }

    fn element_num_face_children(&self, _elem: &[u8], _face: usize) -> usize {
        2
    }

    fn element_copy(&self, src: &[u8], dst: &mut [u8]) {
        dst.copy_from_slice(src);
    }
}

// ---------------------------------------------------------------------------
// UniformQuadForest
// ---------------------------------------------------------------------------

/// A strip of quad trees uniformly refined to `level`, partitioned into
/// contiguous global-element ranges.
///
/// Faces are numbered left, right, bottom, top; tree `t` is joined to tree
/// `t + 1` through faces 1 and 0. The strip's top and bottom are domain
/// boundaries.
pub struct UniformQuadForest {
    cmesh: Cmesh,
    scheme: QuadScheme,
    level: u32,
    rank: u32,
    size: u32,
    /// Global element-index boundaries per rank, length `size + 1`.
    splits: Vec<u64>,
    /// Global id of the first forest-local tree.
    first_tree: GlobalTreeId,
    /// Owned elements per local tree, in Morton order.
    trees: Vec<ElementArray>,
}

impl UniformQuadForest {
    /// Builds the forest for one rank with explicit ownership splits.
    pub fn new(num_trees: u64, level: u32, rank: u32, size: u32, splits: Vec<u64>) -> Self {
        let elems_per_tree = 1_u64 << (2 * level);
        assert_eq!(splits.len(), size as usize + 1);
        assert_eq!(splits[0], 0);
        assert_eq!(splits[size as usize], num_trees * elems_per_tree);

        let mut builder = CmeshBuilder::new();
        builder
            .set_mpicomm(Arc::new(GroupComm::new(rank, size)), false)
            .unwrap();
        builder.set_num_trees(num_trees).unwrap();
        for tree in 0..num_trees {
            builder.set_tree(tree, EClass::Quad).unwrap();
        }
        for tree in 0..num_trees.saturating_sub(1) {
            builder.join_faces(tree, tree + 1, 1, 0, 0).unwrap();
        }
        let cmesh = builder.commit().unwrap();

        let begin = splits[rank as usize];
        let end = splits[rank as usize + 1];
        let first_tree = if begin < end { begin / elems_per_tree } else { 0 };
        let mut trees = Vec::new();
        if begin < end {
            let last_tree = (end - 1) / elems_per_tree;
            for tree in first_tree..=last_tree {
                let lo = begin.max(tree * elems_per_tree);
                let hi = end.min((tree + 1) * elems_per_tree);
                let mut elements = ElementArray::new(QUAD_ELEM_SIZE);
                for global in lo..hi {
                    elements.push_copy(&quad_elem(level, global - tree * elems_per_tree));
                }
                trees.push(elements);
            }
        }

        Self {
            cmesh,
            scheme: QuadScheme,
            level,
            rank,
            size,
            splits,
            first_tree,
            trees,
        }
    }

    /// Builds the forest with the fair uniform element split.
    pub fn uniform(num_trees: u64, level: u32, rank: u32, size: u32) -> Self {
        let total = num_trees << (2 * level);
        let mut splits: Vec<u64> = (0..size)
            .map(|r| uniform_child_interval(total, r, size).0)
            .collect();
        splits.push(total);
        Self::new(num_trees, level, rank, size, splits)
    }

    fn elems_per_tree(&self) -> u64 {
        1 << (2 * self.level)
    }

    /// The global element index of an ancestor cell of `elem` at the forest
    /// refinement level inside `tree`.
    fn global_index(&self, tree: GlobalTreeId, elem: &[u8]) -> u64 {
        let (level, morton) = decode(elem);
        assert!(level >= self.level);
        let ancestor = morton >> (2 * (level - self.level));
        tree * self.elems_per_tree() + ancestor
    }
}

impl ForestView for UniformQuadForest {
    fn cmesh(&self) -> &Cmesh {
        &self.cmesh
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn first_local_tree(&self) -> GlobalTreeId {
        self.first_tree
    }

    fn num_local_trees(&self) -> u64 {
        self.trees.len() as u64
    }

    fn first_tree_shared(&self) -> bool {
        !self.trees.is_empty() && self.splits[self.rank as usize] % self.elems_per_tree() != 0
    }

    fn last_tree_shared(&self) -> bool {
        !self.trees.is_empty() && self.splits[self.rank as usize + 1] % self.elems_per_tree() != 0
    }

    fn tree_class(&self, _itree: LocalTreeId) -> EClass {
        EClass::Quad
    }

    fn tree_element_count(&self, itree: LocalTreeId) -> usize {
        self.trees[itree as usize].len()
    }

    fn tree_element(&self, itree: LocalTreeId, index: usize) -> &[u8] {
        self.trees[itree as usize].get(index)
    }

    fn scheme(&self, _class: EClass) -> &dyn ElementScheme {
        &self.scheme
    }

    fn coarse_tree(&self, itree: LocalTreeId) -> &TreeRecord {
        self.cmesh.tree(self.first_tree + itree).unwrap()
    }

    fn cmesh_local_to_forest_local(&self, cmesh_tree: LocalTreeId) -> Option<LocalTreeId> {
        // The cmesh is replicated, so cmesh-local ids are global ids.
        let forest_local = cmesh_tree.checked_sub(self.first_tree)?;
        (forest_local < self.num_local_trees()).then_some(forest_local)
    }

    fn neighbor_class(&self, _itree: LocalTreeId, _elem: &[u8], _face: usize) -> EClass {
        EClass::Quad
    }

    fn half_face_neighbors(
        &self,
        itree: LocalTreeId,
        elem: &[u8],
        face: usize,
        out: &mut ElementArray,
    ) -> Option<GlobalTreeId> {
        let (level, morton) = decode(elem);
        let cells = 1_u64 << level;
        let (x, y) = morton_decode(morton);
        let tree = self.first_tree + itree;
        let link = |face: usize| self.cmesh.face_neighbor(tree, face).map(|l| l.tree);

        // Neighbor cell at the same level, possibly in the adjacent tree.
        let (neighbor_tree, nx, ny) = match face {
            0 if x == 0 => (link(0)?, cells - 1, y),
            0 => (tree, x - 1, y),
            1 if x + 1 == cells => (link(1)?, 0, y),
            1 => (tree, x + 1, y),
            2 if y == 0 => return None,
            2 => (tree, x, y - 1),
            3 if y + 1 == cells => return None,
            3 => (tree, x, y + 1),
            _ => unreachable!("quads have 4 faces"),
        };

        // The two children of the neighbor cell adjacent to the shared face.
        let children = match face {
            0 => [(2 * nx + 1, 2 * ny), (2 * nx + 1, 2 * ny + 1)],
            1 => [(2 * nx, 2 * ny), (2 * nx, 2 * ny + 1)],
            2 => [(2 * nx, 2 * ny + 1), (2 * nx + 1, 2 * ny + 1)],
            3 => [(2 * nx, 2 * ny), (2 * nx + 1, 2 * ny)],
            _ => unreachable!(),
        };
        for (slot, (cx, cy)) in children.into_iter().enumerate() {
            out.get_mut(slot)
                .copy_from_slice(&quad_elem(level + 1, morton_encode(cx, cy)));
        }
        Some(neighbor_tree)
    }

    fn find_owner(&self, tree: GlobalTreeId, elem: &[u8], _class: EClass) -> MeshResult<u32> {
        let global = self.global_index(tree, elem);
        let owner = self.splits.partition_point(|&split| split <= global) - 1;
        Ok(u32::try_from(owner).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn morton_roundtrip() {
        for morton in 0..64 {
            let (x, y) = morton_decode(morton);
            assert_eq!(morton_encode(x, y), morton);
        }
        assert_eq!(morton_decode(0), (0, 0));
        assert_eq!(morton_decode(1), (1, 0));
        assert_eq!(morton_decode(2), (0, 1));
        assert_eq!(morton_decode(3), (1, 1));
    }

    #[test]
    fn linear_id_shifts_between_levels() {
        let scheme = QuadScheme;
        let elem = quad_elem(1, 3);
        assert_eq!(scheme.element_level(&elem), 1);
        assert_eq!(scheme.element_linear_id(&elem, 1), 3);
        assert_eq!(scheme.element_linear_id(&elem, 2), 12);
        assert_eq!(scheme.element_linear_id(&elem, 0), 0);
    }

    #[test]
    fn uniform_split_covers_every_element_once() {
        let forest0 = UniformQuadForest::uniform(3, 1, 0, 2);
        let forest1 = UniformQuadForest::uniform(3, 1, 1, 2);
        let owned = |forest: &UniformQuadForest| -> usize {
            (0..forest.num_local_trees())
                .map(|itree| forest.tree_element_count(itree))
                .sum()
        };
        assert_eq!(owned(&forest0) + owned(&forest1), 12);
    }

    #[test]
    fn shared_tree_flags_follow_the_split() {
        // Split [0, 6, 12) over 3 trees of 4 elements: tree 1 is shared.
        let forest0 = UniformQuadForest::new(3, 1, 0, 2, vec![0, 6, 12]);
        assert!(!forest0.first_tree_shared());
        assert!(forest0.last_tree_shared());
        assert_eq!(forest0.first_local_tree(), 0);
        assert_eq!(forest0.num_local_trees(), 2);

        let forest1 = UniformQuadForest::new(3, 1, 1, 2, vec![0, 6, 12]);
        assert!(forest1.first_tree_shared());
        assert!(!forest1.last_tree_shared());
        assert_eq!(forest1.first_local_tree(), 1);
        assert_eq!(forest1.num_local_trees(), 2);
    }

    #[test]
    fn half_face_neighbors_cross_the_tree_boundary() {
        let forest = UniformQuadForest::uniform(2, 1, 0, 1);
        let mut out = ElementArray::new(QUAD_ELEM_SIZE);
        out.reset(QUAD_ELEM_SIZE, 2);

        // Element (1, 0) of tree 0 looks right into tree 1.
        let elem = quad_elem(1, morton_encode(1, 0));
        let neighbor = forest.half_face_neighbors(0, &elem, 1, &mut out);
        assert_eq!(neighbor, Some(1));
        // The children sit on tree 1's left edge at level 2.
        assert_eq!(decode(out.get(0)), (2, morton_encode(0, 0)));
        assert_eq!(decode(out.get(1)), (2, morton_encode(0, 1)));

        // The strip's top is a domain boundary.
        let top = quad_elem(1, morton_encode(0, 1));
        assert_eq!(forest.half_face_neighbors(0, &top, 3, &mut out), None);
    }

    #[test]
    fn find_owner_follows_the_splits() {
        let forest = UniformQuadForest::new(2, 1, 0, 2, vec![0, 3, 8]);
        // A level-2 child of tree 1's cell (0,0): ancestor is global index 4.
        let child = quad_elem(2, morton_encode(1, 1));
        assert_eq!(forest.find_owner(1, &child, EClass::Quad).unwrap(), 1);
        // A child of tree 0's cell (0,0): ancestor is global index 0.
        let child = quad_elem(2, morton_encode(0, 1));
        assert_eq!(forest.find_owner(0, &child, EClass::Quad).unwrap(), 0);
    }
}
