//! Ghost-layer construction.
//!
//! Given a locally partitioned forest over a committed cmesh,
//! [`Ghost::build`] derives the one-layer ghost plan:
//!
//! - **Phase A** populates the ghost-tree skeleton: the first and last
//!   locally owned trees when they are shared with other ranks, plus every
//!   coarse face neighbor of a local tree that is not forest-local. The
//!   skeleton is sorted by global id and indexed.
//! - **Phase B** scans every face of every local element, constructs the
//!   one-level-finer half-face neighbors in a shared scratch buffer,
//!   resolves their owners, and records each element that touches a remote
//!   owner in that owner's [`RemoteBundle`].
//!
//! The ghost itself never communicates. The send side is the per-rank
//! bundles; the receive side is filled by the caller's transport through
//! [`Ghost::ingest`], rank by rank in ascending order, which also records
//! the per-rank [`ProcessOffset`] chunk table.

use ahash::AHashMap;
use once_cell::sync::OnceCell;

use treemesh_core::{EClass, GlobalTreeId, MeshError, MeshResult};

use crate::forest::ForestView;
use crate::scheme::ElementArray;
use crate::store::{GhostTree, ProcessOffset, RemoteBundle, RemoteStore};

/// The ghost layer of one rank: ghost trees to receive into, remote bundles
/// to send, and the per-rank chunk offsets of the exchange.
///
/// Read-only after construction except for [`Ghost::ingest`]; shared between
/// consumers as `Arc<Ghost>` once the exchange is done. Dropping the last
/// reference releases all element buffers.
#[derive(Debug)]
pub struct Ghost {
    /// Ghost trees, sorted ascending by global id.
    ghost_trees: Vec<GhostTree>,
    /// Global tree id -> index into `ghost_trees`.
    tree_index: AHashMap<GlobalTreeId, usize>,
    remote: RemoteStore,
    /// Per-rank chunk starts, in ingest (ascending rank) order.
    chunks: Vec<ProcessOffset>,
    /// Rank -> index into `chunks`; built on first offset query.
    offset_index: OnceCell<AHashMap<u32, usize>>,
}

impl Ghost {
    /// Builds the ghost layer for `forest`.
    ///
    /// Reads the committed cmesh and the forest only; neither may be
    /// mutated concurrently. Cost is O(local elements x faces).
    ///
    /// # Errors
    ///
    /// Contract error when a coarse face neighbor's class is not recorded
    /// in the cmesh; owner-lookup failures from the forest are propagated.
    /// Any failure aborts the build with all intermediate storage released.
    pub fn build<F: ForestView>(forest: &F) -> MeshResult<Self> {
        let (ghost_trees, tree_index) = collect_skeleton(forest)?;

        let mut remote = RemoteStore::new();
        scan_local_elements(forest, &mut remote)?;

        tracing::debug!(
            num_ghost_trees = ghost_trees.len(),
            num_remote_ranks = remote.ranks().len(),
            num_remote_elements = remote.num_elements(),
            rank = forest.rank(),
            "built ghost layer"
        );

        Ok(Self {
            ghost_trees,
            tree_index,
            remote,
            chunks: Vec::new(),
            offset_index: OnceCell::new(),
        })
    }

    /// Number of ghost trees.
    #[must_use]
    pub fn num_ghost_trees(&self) -> usize {
        self.ghost_trees.len()
    }

    /// Iterates the ghost trees in ascending global-id order.
    pub fn ghost_trees(&self) -> impl Iterator<Item = &GhostTree> {
        self.ghost_trees.iter()
    }

    /// The ghost tree with the given global id.
    #[must_use]
    pub fn ghost_tree(&self, tree: GlobalTreeId) -> Option<&GhostTree> {
        self.ghost_tree_index(tree).map(|idx| &self.ghost_trees[idx])
    }

    /// Position of a global tree id in the sorted ghost-tree array.
    #[must_use]
    pub fn ghost_tree_index(&self, tree: GlobalTreeId) -> Option<usize> {
        self.tree_index.get(&tree).copied()
    }

    /// Total number of received ghost elements.
    #[must_use]
    pub fn num_ghost_elements(&self) -> usize {
        self.ghost_trees.iter().map(|tree| tree.elements.len()).sum()
    }

    /// Remote ranks in the order they were first discovered.
    #[must_use]
    pub fn remote_ranks(&self) -> &[u32] {
        self.remote.ranks()
    }

    /// Remote ranks in ascending order.
    #[must_use]
    pub fn sorted_remote_ranks(&self) -> Vec<u32> {
        self.remote.sorted_ranks()
    }

    /// The bundle of locally owned elements to ship to `rank`.
    #[must_use]
    pub fn remote_bundle(&self, rank: u32) -> Option<&RemoteBundle> {
        self.remote.bundle(rank)
    }

    /// Total number of element copies across all remote bundles.
    #[must_use]
    pub fn num_remote_elements(&self) -> usize {
        self.remote.num_elements()
    }

    /// Deposits received ghost elements into a ghost tree.
    ///
    /// The transport calls this once per (sender rank, tree) pair, with
    /// ranks in ascending order and trees within a rank in ascending global
    /// id, the rank-major receive layout. The first deposit of each rank
    /// records its [`ProcessOffset`]. Returns the number of elements
    /// appended.
    ///
    /// # Errors
    ///
    /// Contract errors when ranks arrive out of order, the tree is not a
    /// ghost tree, or the payload is not a whole number of elements.
    pub fn ingest(
        &mut self,
        from_rank: u32,
        tree: GlobalTreeId,
        payload: &[u8],
    ) -> MeshResult<usize> {
        if let Some(last) = self.chunks.last() {
            if from_rank < last.rank {
                return Err(MeshError::IngestOutOfOrder {
                    rank: from_rank,
                    seen: last.rank,
                });
            }
        }
        let idx = self
            .tree_index
            .get(&tree)
            .copied()
            .ok_or(MeshError::NotAGhostTree { tree })?;

        let elements = &mut self.ghost_trees[idx].elements;
        if payload.len() % elements.elem_size() != 0 {
            return Err(MeshError::PayloadSize {
                len: payload.len(),
                elem_size: elements.elem_size(),
            });
        }

        if self.chunks.last().map(|chunk| chunk.rank) != Some(from_rank) {
            self.chunks.push(ProcessOffset {
                rank: from_rank,
                first_tree: idx,
                first_element: elements.len(),
            });
        }
        // Invalidate the lazy rank index; it is rebuilt on the next query.
        self.offset_index.take();

        Ok(elements.extend_from_bytes(payload))
    }

    /// Per-rank chunk offsets of the exchange, in ascending rank order.
    #[must_use]
    pub fn process_offsets(&self) -> &[ProcessOffset] {
        &self.chunks
    }

    /// The chunk offset of one sender rank.
    #[must_use]
    pub fn process_offset(&self, rank: u32) -> Option<ProcessOffset> {
        let index = self.offset_index.get_or_init(|| {
            self.chunks
                .iter()
                .enumerate()
                .map(|(idx, chunk)| (chunk.rank, idx))
                .collect()
        });
        index.get(&rank).map(|&idx| self.chunks[idx])
    }
}

// ---------------------------------------------------------------------------
// Phase A: ghost tree skeleton
// ---------------------------------------------------------------------------

/// Collects the ghost-tree skeleton, sorted by global id and indexed.
///
/// Every ghost tree needs a class to size its element storage, so a
/// neighbor link whose class is not recorded in the cmesh is an error.
fn collect_skeleton<F: ForestView>(
    forest: &F,
) -> MeshResult<(Vec<GhostTree>, AHashMap<GlobalTreeId, usize>)> {
    let mut classes: AHashMap<GlobalTreeId, EClass> = AHashMap::new();
    let num_local = forest.num_local_trees();

    if num_local > 0 {
        if forest.first_tree_shared() {
            classes.insert(forest.first_local_tree(), forest.tree_class(0));
        }
        if forest.last_tree_shared() {
            classes.insert(
                forest.first_local_tree() + num_local - 1,
                forest.tree_class(num_local - 1),
            );
        }
    }

    for itree in 0..num_local {
        let record = forest.coarse_tree(itree);
        for link in record.neighbors.iter().flatten() {
            if !is_forest_local(forest, link.tree) {
                let class = link
                    .class
                    .ok_or(MeshError::UnknownNeighborClass { tree: link.tree })?;
                classes.insert(link.tree, class);
            }
        }
    }

    let mut ghost_trees: Vec<GhostTree> = classes
        .into_iter()
        .map(|(global_id, class)| GhostTree {
            global_id,
            class,
            elements: ElementArray::new(forest.scheme(class).element_size()),
        })
        .collect();
    ghost_trees.sort_by_key(|tree| tree.global_id);

    let tree_index = ghost_trees
        .iter()
        .enumerate()
        .map(|(idx, tree)| (tree.global_id, idx))
        .collect();
    Ok((ghost_trees, tree_index))
}

/// Whether the global tree holds locally owned forest elements.
fn is_forest_local<F: ForestView>(forest: &F, tree: GlobalTreeId) -> bool {
    let cmesh = forest.cmesh();
    let Some(cmesh_local) = tree.checked_sub(cmesh.first_treeid()) else {
        return false;
    };
    if cmesh_local >= cmesh.num_local_trees() {
        return false;
    }
    forest.cmesh_local_to_forest_local(cmesh_local).is_some()
}

// ---------------------------------------------------------------------------
// Phase B: local element scan
// ---------------------------------------------------------------------------

/// Scans every face of every local element and records remote copies.
fn scan_local_elements<F: ForestView>(
    forest: &F,
    remote: &mut RemoteStore,
) -> MeshResult<()> {
    let own_rank = forest.rank();
    // Shared scratch for half-face neighbors; regrown per face.
    let mut half_neighbors = ElementArray::new(1);

    for itree in 0..forest.num_local_trees() {
        let class = forest.tree_class(itree);
        let scheme = forest.scheme(class);
        let global_tree = forest.first_local_tree() + itree;

        for index in 0..forest.tree_element_count(itree) {
            let elem = forest.tree_element(itree, index);

            for face in 0..scheme.element_num_faces(elem) {
                let num_children = scheme.element_num_face_children(elem, face);
                if num_children == 0 {
                    // No refined children across this face: nothing can
                    // touch it from the other side.
                    continue;
                }
                let neighbor_class = forest.neighbor_class(itree, elem, face);
                let neighbor_scheme = forest.scheme(neighbor_class);
                half_neighbors.reset(neighbor_scheme.element_size(), num_children);

                let Some(neighbor_tree) =
                    forest.half_face_neighbors(itree, elem, face, &mut half_neighbors)
                else {
                    // Domain boundary.
                    continue;
                };

                for child in 0..num_children {
                    let owner = forest.find_owner(
                        neighbor_tree,
                        half_neighbors.get(child),
                        neighbor_class,
                    )?;
                    if owner != own_rank {
                        remote.add(owner, global_tree, class, elem, scheme);
                    }
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
