//! Cmesh builder and committed cmesh.
//!
//! A cmesh moves through a staged lifecycle: a [`CmeshBuilder`] accepts the
//! topology (communicator, partition layout, trees, face joins) and a single
//! consuming [`CmeshBuilder::commit`] freezes it into an immutable [`Cmesh`].
//! Splitting the phases over two types makes wrong-phase calls
//! unrepresentable: no setter exists on a committed mesh, and no rank/size
//! query exists on a builder.
//!
//! # Partition layouts
//!
//! A cmesh is either **replicated** (every rank holds all trees) or
//! **partitioned** (each rank holds a contiguous local slice of the global
//! tree range). Replicated is the default; calling
//! [`CmeshBuilder::set_partitioned`] opts into the partitioned layout before
//! any tree is inserted. All ranks must run matching setter sequences and
//! commit collectively, otherwise their partition metadata diverges.

use std::sync::Arc;

use crate::comm::Communicator;
use crate::eclass::{ClassCounts, EClass, MAX_FACES};
use crate::error::{MeshError, MeshResult};
use crate::tree::{FaceCode, FaceLink, GlobalTreeId, LocalTreeId, TreeRecord};

// ---------------------------------------------------------------------------
// CmeshBuilder
// ---------------------------------------------------------------------------

/// Partition layout chosen during configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum LayoutState {
    /// No layout chosen yet; the first `set_num_trees` selects replicated.
    #[default]
    Undecided,
    Replicated,
    Partitioned {
        num_trees: u64,
        first_tree: GlobalTreeId,
        num_ghosts: u64,
    },
}

/// Staged builder for a [`Cmesh`] (the Configuring phase).
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use treemesh_core::{CmeshBuilder, EClass, SingleComm};
///
/// let mut builder = CmeshBuilder::new();
/// builder.set_mpicomm(Arc::new(SingleComm), false).unwrap();
/// builder.set_num_trees(1).unwrap();
/// builder.set_tree(0, EClass::Triangle).unwrap();
/// let cmesh = builder.commit().unwrap();
/// assert_eq!(cmesh.num_trees(), 1);
/// assert_eq!(cmesh.dimension(), 2);
/// ```
#[derive(Debug, Default)]
pub struct CmeshBuilder {
    comm: Option<Arc<dyn Communicator>>,
    do_dup: bool,
    layout: LayoutState,
    /// Local tree slots; `None` until `set_num_trees`, then one entry per
    /// local tree, filled by `set_tree`.
    trees: Option<Vec<Option<TreeRecord>>>,
    dimension: Option<u8>,
    class_counts: ClassCounts,
    tree_offsets: Option<Vec<u64>>,
    num_inserted: u64,
}

impl CmeshBuilder {
    /// Creates an empty builder with no communicator and no layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the process-group communicator.
    ///
    /// When `do_dup` is set, `commit` duplicates the communicator and the
    /// committed mesh owns the duplicate until it is dropped.
    ///
    /// # Errors
    ///
    /// Contract error if an explicit communicator was already set.
    pub fn set_mpicomm(
        &mut self,
        comm: Arc<dyn Communicator>,
        do_dup: bool,
    ) -> MeshResult<()> {
        if self.comm.is_some() {
            return Err(MeshError::CommAlreadySet);
        }
        self.comm = Some(comm);
        self.do_dup = do_dup;
        Ok(())
    }

    /// Selects the replicated or partitioned layout.
    ///
    /// With `partitioned == false` this is equivalent to
    /// `set_num_trees(num_global_trees)`; `first_local_tree` and
    /// `num_ghosts` are ignored. With `partitioned == true` the global tree
    /// count, this rank's first tree, and the coarse ghost count are
    /// recorded; the local count follows via [`CmeshBuilder::set_num_trees`].
    ///
    /// # Errors
    ///
    /// Contract error if the layout was already fixed or a tree was already
    /// inserted; Config error if `num_global_trees` is zero.
    pub fn set_partitioned(
        &mut self,
        partitioned: bool,
        num_global_trees: u64,
        first_local_tree: GlobalTreeId,
        num_ghosts: u64,
    ) -> MeshResult<()> {
        if self.layout != LayoutState::Undecided {
            return Err(MeshError::LayoutAlreadySet);
        }
        if self.num_inserted > 0 {
            return Err(MeshError::TreesAlreadyInserted);
        }
        if !partitioned {
            // The replicated branch still rejects a zero tree count.
            return self.set_num_trees(num_global_trees);
        }
        if num_global_trees == 0 {
            return Err(MeshError::EmptyMesh);
        }
        self.layout = LayoutState::Partitioned {
            num_trees: num_global_trees,
            first_tree: first_local_tree,
            num_ghosts,
        };
        Ok(())
    }

    /// Sets the tree count and allocates the local tree slots.
    ///
    /// Replicated layout: sets the global and local count to `n` (`n > 0`).
    /// Partitioned layout: sets this rank's local count (`n` may be zero for
    /// an empty rank); the global count must have been fixed by
    /// [`CmeshBuilder::set_partitioned`] already.
    ///
    /// # Errors
    ///
    /// Contract error on a repeated call; Config error on a zero count in
    /// the replicated layout.
    pub fn set_num_trees(&mut self, n: u64) -> MeshResult<()> {
        if self.trees.is_some() {
            return Err(MeshError::TreeCountAlreadySet);
        }
        match self.layout {
            LayoutState::Undecided | LayoutState::Replicated => {
                if n == 0 {
                    return Err(MeshError::EmptyMesh);
                }
                self.layout = LayoutState::Replicated;
            }
            LayoutState::Partitioned { num_trees, .. } => {
                debug_assert!(num_trees > 0);
            }
        }
        self.trees = Some(vec![None; cast_len(n)]);
        Ok(())
    }

    /// Inserts one tree.
    ///
    /// `tree_id` is a global id and must lie in the valid local range
    /// (replicated: `[0, num_trees)`; partitioned: `[first_tree, first_tree
    /// + num_local_trees)`, first tree included). The first insertion fixes
    /// the cmesh dimension; later insertions must match it.
    ///
    /// # Errors
    ///
    /// Contract errors for an unset tree count, an out-of-range or repeated
    /// id, and a dimension mismatch.
    pub fn set_tree(&mut self, tree_id: GlobalTreeId, class: EClass) -> MeshResult<()> {
        let (first, end) = self.local_range()?;
        if tree_id < first || tree_id >= end {
            return Err(MeshError::TreeOutOfRange {
                tree: tree_id,
                first,
                end,
            });
        }
        let expected = self.dimension.unwrap_or_else(|| class.dimension());
        if class.dimension() != expected {
            return Err(MeshError::DimensionMismatch {
                tree: tree_id,
                class,
                actual: class.dimension(),
                expected,
            });
        }

        let slot = &mut self.trees.as_mut().expect("checked by local_range")
            [cast_len(tree_id - first)];
        if slot.is_some() {
            return Err(MeshError::TreeAlreadySet { tree: tree_id });
        }
        *slot = Some(TreeRecord::new(tree_id, class));

        self.dimension = Some(expected);
        self.class_counts.increment(class);
        self.num_inserted += 1;
        Ok(())
    }

    /// Connects two trees along the given faces.
    ///
    /// At least one of the trees must be local. When both are, both face
    /// slots are written, so committed links between local trees are always
    /// symmetric. For a cross-rank join only the local side's slot is
    /// updated and the remote tree's class is recorded as unknown; the
    /// owning rank records its side of the link itself. `orientation`
    /// encodes the relative permutation of the face vertices and is packed
    /// with the partner face index into each written [`FaceCode`].
    ///
    /// # Errors
    ///
    /// Contract errors when neither tree is local, for uninserted local
    /// trees, bad face indices, mismatched face classes (validated whenever
    /// both classes are known), and already-joined faces.
    #[allow(clippy::cast_possible_truncation)] // face indices are at most 6
    pub fn join_faces(
        &mut self,
        tree_a: GlobalTreeId,
        tree_b: GlobalTreeId,
        face_a: usize,
        face_b: usize,
        orientation: u8,
    ) -> MeshResult<()> {
        let (first, end) = self.local_range()?;
        let local = |t: GlobalTreeId| t >= first && t < end;
        if !local(tree_a) && !local(tree_b) {
            return Err(MeshError::JoinNotLocal {
                a: tree_a,
                b: tree_b,
            });
        }

        let class_a = if local(tree_a) {
            Some(self.inserted_class(tree_a - first)?)
        } else {
            None
        };
        let class_b = if local(tree_b) {
            Some(self.inserted_class(tree_b - first)?)
        } else {
            None
        };
        let face_class_a = face_class_of(tree_a, class_a, face_a)?;
        let face_class_b = face_class_of(tree_b, class_b, face_b)?;
        if let (Some(left), Some(right)) = (face_class_a, face_class_b) {
            if left != right {
                return Err(MeshError::FaceClassMismatch { left, right });
            }
        }

        // Check every slot that will be written before writing any, so a
        // failing join leaves no half-written link behind.
        let same_slot = tree_a == tree_b && face_a == face_b;
        if local(tree_a) {
            self.ensure_slot_free(tree_a - first, face_a)?;
        }
        if local(tree_b) && !same_slot {
            self.ensure_slot_free(tree_b - first, face_b)?;
        }

        if local(tree_a) {
            self.write_slot(
                tree_a - first,
                face_a,
                FaceLink {
                    tree: tree_b,
                    class: class_b,
                    code: FaceCode::pack(face_b as u8, orientation),
                },
            );
        }
        if local(tree_b) && !same_slot {
            self.write_slot(
                tree_b - first,
                face_b,
                FaceLink {
                    tree: tree_a,
                    class: class_a,
                    code: FaceCode::pack(face_a as u8, orientation),
                },
            );
        }
        Ok(())
    }

    /// Records the global first-tree offset of every rank.
    ///
    /// The array is validated at commit: length `size + 1`, monotone
    /// non-decreasing, final entry equal to the global tree count, and the
    /// entry at this rank equal to the configured first tree.
    ///
    /// # Errors
    ///
    /// Contract error if offsets were already recorded.
    pub fn set_tree_offsets(&mut self, offsets: Vec<u64>) -> MeshResult<()> {
        if self.tree_offsets.is_some() {
            return Err(MeshError::LayoutAlreadySet);
        }
        self.tree_offsets = Some(offsets);
        Ok(())
    }

    /// Freezes the builder into an immutable [`Cmesh`].
    ///
    /// Duplicates the communicator when `do_dup` was requested, queries the
    /// final rank and size, and validates the partition metadata. Under
    /// debug assertions the face-link symmetry of the local topology is
    /// verified as well.
    ///
    /// # Errors
    ///
    /// Config errors for a missing communicator, an empty mesh, an
    /// unpopulated tree slot, or inconsistent partition metadata; Comm
    /// errors from the communicator are propagated verbatim.
    pub fn commit(self) -> MeshResult<Cmesh> {
        let comm = self.comm.ok_or(MeshError::MissingCommunicator)?;
        let slots = self.trees.ok_or(MeshError::EmptyMesh)?;

        let comm = if self.do_dup { comm.duplicate()? } else { comm };
        let rank = comm.rank()?;
        let size = comm.size()?;

        let num_local_trees = slots.len() as u64;
        let (partitioned, num_trees, first_tree, num_ghosts) = match self.layout {
            // `set_num_trees` ran, so the replicated count is positive.
            LayoutState::Undecided | LayoutState::Replicated => {
                (false, num_local_trees, 0, 0)
            }
            LayoutState::Partitioned {
                num_trees,
                first_tree,
                num_ghosts,
            } => (true, num_trees, first_tree, num_ghosts),
        };
        if num_trees == 0 {
            return Err(MeshError::EmptyMesh);
        }
        if first_tree + num_local_trees > num_trees {
            return Err(MeshError::InvalidPartition {
                reason: format!(
                    "local range [{first_tree}, {}) exceeds num_trees {num_trees}",
                    first_tree + num_local_trees
                ),
            });
        }

        let mut trees = Vec::with_capacity(slots.len());
        for (idx, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(record) => trees.push(record),
                None => {
                    return Err(MeshError::TreeNotSet {
                        tree: first_tree + idx as u64,
                    })
                }
            }
        }

        if let Some(offsets) = &self.tree_offsets {
            validate_tree_offsets(offsets, partitioned, num_trees, first_tree, rank, size)?;
        }

        let cmesh = Cmesh {
            comm,
            do_dup: self.do_dup,
            rank,
            size,
            partitioned,
            dimension: self.dimension.unwrap_or(0),
            num_trees,
            num_local_trees,
            first_tree,
            num_ghosts,
            class_counts: self.class_counts,
            trees,
            tree_offsets: self.tree_offsets,
        };

        #[cfg(debug_assertions)]
        cmesh.assert_symmetric_links();

        tracing::debug!(
            num_trees,
            num_local_trees,
            first_tree,
            rank,
            size,
            partitioned,
            "committed cmesh"
        );
        Ok(cmesh)
    }

    /// The valid global-id range for local trees.
    fn local_range(&self) -> MeshResult<(GlobalTreeId, GlobalTreeId)> {
        let len = self
            .trees
            .as_ref()
            .ok_or(MeshError::TreeCountNotSet)?
            .len() as u64;
        let first = match self.layout {
            LayoutState::Partitioned { first_tree, .. } => first_tree,
            LayoutState::Undecided | LayoutState::Replicated => 0,
        };
        Ok((first, first + len))
    }

    /// Class of an inserted local tree, by local index.
    fn inserted_class(&self, local: LocalTreeId) -> MeshResult<EClass> {
        let slots = self.trees.as_ref().ok_or(MeshError::TreeCountNotSet)?;
        slots[cast_len(local)]
            .as_ref()
            .map(|record| record.class)
            .ok_or(MeshError::TreeNotSet {
                tree: self.local_range()?.0 + local,
            })
    }

    /// Errors if the face slot of an inserted local tree is already linked.
    fn ensure_slot_free(&self, local: LocalTreeId, face: usize) -> MeshResult<()> {
        let slots = self.trees.as_ref().ok_or(MeshError::TreeCountNotSet)?;
        let record = slots[cast_len(local)]
            .as_ref()
            .expect("class lookup checked insertion");
        if record.neighbors[face].is_some() {
            return Err(MeshError::FaceAlreadyJoined {
                tree: record.global_id,
                face,
            });
        }
        Ok(())
    }

    /// Writes a face slot; both trees were validated by the caller.
    fn write_slot(&mut self, local: LocalTreeId, face: usize, link: FaceLink) {
        let slots = self.trees.as_mut().expect("validated by ensure_slot_free");
        let record = slots[cast_len(local)]
            .as_mut()
            .expect("class lookup checked insertion");
        debug_assert!(record.neighbors[face].is_none());
        record.neighbors[face] = Some(link);
    }
}

/// The class of face `face` of a tree, when the tree's class is known.
///
/// For a tree whose class is not known locally, only the face-index bound
/// shared by every class can be checked.
fn face_class_of(
    tree: GlobalTreeId,
    class: Option<EClass>,
    face: usize,
) -> MeshResult<Option<EClass>> {
    match class {
        Some(class) => class
            .face_class(face)
            .map(Some)
            .ok_or(MeshError::FaceOutOfRange { tree, face }),
        None => {
            if face >= MAX_FACES {
                return Err(MeshError::FaceOutOfRange { tree, face });
            }
            Ok(None)
        }
    }
}

/// Checks a rank-offset array against the committed partition metadata.
fn validate_tree_offsets(
    offsets: &[u64],
    partitioned: bool,
    num_trees: u64,
    first_tree: GlobalTreeId,
    rank: u32,
    size: u32,
) -> MeshResult<()> {
    let fail = |reason: String| Err(MeshError::InvalidPartition { reason });
    if !partitioned {
        return fail("tree offsets require a partitioned layout".to_string());
    }
    if offsets.len() != size as usize + 1 {
        return fail(format!(
            "expected {} offsets for {size} ranks, got {}",
            size + 1,
            offsets.len()
        ));
    }
    if offsets.windows(2).any(|pair| pair[0] > pair[1]) {
        return fail("offsets must be monotone non-decreasing".to_string());
    }
    if offsets[size as usize] != num_trees {
        return fail(format!(
            "final offset {} does not equal num_trees {num_trees}",
            offsets[size as usize]
        ));
    }
    if offsets[rank as usize] != first_tree {
        return fail(format!(
            "offset {} of rank {rank} does not equal first_tree {first_tree}",
            offsets[rank as usize]
        ));
    }
    Ok(())
}

/// Local tree counts are bounded by addressable memory.
#[allow(clippy::cast_possible_truncation)]
fn cast_len(n: u64) -> usize {
    n as usize
}

// ---------------------------------------------------------------------------
// Cmesh
// ---------------------------------------------------------------------------

/// A committed, immutable coarse mesh (the Committed phase).
///
/// All queries are pure functions of the frozen state. The mesh is shared
/// between subsystems as `Arc<Cmesh>`; dropping the last reference releases
/// the tree storage and, when the communicator was duplicated at commit,
/// the duplicated handle.
#[derive(Debug)]
pub struct Cmesh {
    comm: Arc<dyn Communicator>,
    do_dup: bool,
    rank: u32,
    size: u32,
    partitioned: bool,
    dimension: u8,
    num_trees: u64,
    num_local_trees: u64,
    first_tree: GlobalTreeId,
    num_ghosts: u64,
    class_counts: ClassCounts,
    trees: Vec<TreeRecord>,
    tree_offsets: Option<Vec<u64>>,
}

impl Cmesh {
    /// Global number of trees.
    #[must_use]
    pub fn num_trees(&self) -> u64 {
        self.num_trees
    }

    /// Number of trees on this rank (equals [`Cmesh::num_trees`] when
    /// replicated).
    #[must_use]
    pub fn num_local_trees(&self) -> u64 {
        self.num_local_trees
    }

    /// Global id of this rank's first local tree.
    #[must_use]
    pub fn first_treeid(&self) -> GlobalTreeId {
        self.first_tree
    }

    /// Number of coarse ghost trees announced for this rank.
    #[must_use]
    pub fn num_ghosts(&self) -> u64 {
        self.num_ghosts
    }

    /// Topological dimension of the mesh.
    #[must_use]
    pub fn dimension(&self) -> u8 {
        self.dimension
    }

    /// Whether the partitioned layout was selected.
    #[must_use]
    pub fn is_partitioned(&self) -> bool {
        self.partitioned
    }

    /// This process's rank, read from the communicator at commit.
    #[must_use]
    pub fn rank(&self) -> u32 {
        self.rank
    }

    /// The process-group size, read from the communicator at commit.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// The communicator handle and whether it was duplicated at commit.
    #[must_use]
    pub fn mpicomm(&self) -> (&Arc<dyn Communicator>, bool) {
        (&self.comm, self.do_dup)
    }

    /// Number of local trees of the given class.
    #[must_use]
    pub fn class_count(&self, class: EClass) -> u64 {
        self.class_counts.count(class)
    }

    /// The class of a local tree, by global id.
    #[must_use]
    pub fn tree_class(&self, tree_id: GlobalTreeId) -> Option<EClass> {
        self.tree(tree_id).map(|record| record.class)
    }

    /// The record of a local tree, by global id.
    #[must_use]
    pub fn tree(&self, tree_id: GlobalTreeId) -> Option<&TreeRecord> {
        let local = tree_id.checked_sub(self.first_tree)?;
        self.trees.get(cast_len(local))
    }

    /// The face-neighbor link of a local tree, `None` for boundaries and
    /// unknown trees.
    #[must_use]
    pub fn face_neighbor(&self, tree_id: GlobalTreeId, face: usize) -> Option<&FaceLink> {
        self.tree(tree_id).and_then(|record| record.neighbor(face))
    }

    /// The per-rank first-tree offsets, when recorded.
    #[must_use]
    pub fn tree_offsets(&self) -> Option<&[u64]> {
        self.tree_offsets.as_deref()
    }

    /// Iterates the local tree records in local-id order.
    pub fn local_trees(&self) -> impl Iterator<Item = &TreeRecord> {
        self.trees.iter()
    }

    /// Verifies that every link between two local trees points back.
    #[cfg(debug_assertions)]
    fn assert_symmetric_links(&self) {
        for record in &self.trees {
            for (face, link) in record.neighbors.iter().enumerate() {
                let Some(link) = link else { continue };
                let Some(partner) = self.tree(link.tree) else {
                    continue;
                };
                let back = partner.neighbor(link.code.face() as usize);
                debug_assert!(
                    back.is_some_and(|b| b.tree == record.global_id
                        && b.code.face() as usize == face),
                    "asymmetric link: tree {} face {face} -> tree {} face {}",
                    record.global_id,
                    link.tree,
                    link.code.face(),
                );
            }
        }
    }
}

/// Structural equality: compares the frozen topology and partition
/// metadata, ignoring communicator identity.
impl PartialEq for Cmesh {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank
            && self.size == other.size
            && self.partitioned == other.partitioned
            && self.dimension == other.dimension
            && self.num_trees == other.num_trees
            && self.num_local_trees == other.num_local_trees
            && self.first_tree == other.first_tree
            && self.num_ghosts == other.num_ghosts
            && self.class_counts == other.class_counts
            && self.trees == other.trees
            && self.tree_offsets == other.tree_offsets
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
