//! Forest capability consumed by the ghost builder.
//!
//! The ghost layer never refines elements itself; it reads a locally
//! partitioned forest of fine elements through [`ForestView`]. Implementors
//! own the element storage: every `&[u8]` handed out is an element of the
//! scheme for the corresponding class.

use treemesh_core::{Cmesh, EClass, GlobalTreeId, LocalTreeId, MeshResult, TreeRecord};

use crate::scheme::{ElementArray, ElementScheme};

/// Read-only view of a committed forest over a committed cmesh.
///
/// Local tree ids are forest-local: `0..num_local_trees()`, with
/// `first_local_tree() + itree` the global id of local tree `itree`.
/// Elements within a tree are stored in ascending linear-id order; the
/// ghost builder's dedup relies on that ordering.
pub trait ForestView {
    /// The committed cmesh this forest refines.
    fn cmesh(&self) -> &Cmesh;

    /// This process's rank.
    fn rank(&self) -> u32;

    /// The process-group size.
    fn size(&self) -> u32;

    /// Global id of the first locally owned tree.
    fn first_local_tree(&self) -> GlobalTreeId;

    /// Number of locally owned trees.
    fn num_local_trees(&self) -> u64;

    /// Whether the first local tree also holds elements of a lower rank.
    fn first_tree_shared(&self) -> bool;

    /// Whether the last local tree also holds elements of a higher rank.
    fn last_tree_shared(&self) -> bool;

    /// Element class of a local tree.
    fn tree_class(&self, itree: LocalTreeId) -> EClass;

    /// Number of locally owned elements in a local tree.
    fn tree_element_count(&self, itree: LocalTreeId) -> usize;

    /// The `index`-th locally owned element of a local tree, in storage
    /// (ascending linear-id) order.
    fn tree_element(&self, itree: LocalTreeId, index: usize) -> &[u8];

    /// The element scheme for a class.
    fn scheme(&self, class: EClass) -> &dyn ElementScheme;

    /// The coarse tree record underlying a local tree.
    fn coarse_tree(&self, itree: LocalTreeId) -> &TreeRecord;

    /// Maps a cmesh-local tree id to a forest-local id, or `None` when the
    /// tree holds no locally owned elements.
    fn cmesh_local_to_forest_local(&self, cmesh_tree: LocalTreeId) -> Option<LocalTreeId>;

    /// Class of the face-neighbor elements across `face` of `elem`.
    fn neighbor_class(&self, itree: LocalTreeId, elem: &[u8], face: usize) -> EClass;

    /// Constructs the one-level-finer neighbor elements sharing `face`.
    ///
    /// `out` has been reset by the caller to the expected child count with
    /// the neighbor scheme's element size; the implementation fills every
    /// slot. Returns the neighbor's global tree id, or `None` when the face
    /// lies on the domain boundary.
    fn half_face_neighbors(
        &self,
        itree: LocalTreeId,
        elem: &[u8],
        face: usize,
        out: &mut ElementArray,
    ) -> Option<GlobalTreeId>;

    /// The rank owning `elem` of class `class` in global tree `tree`.
    ///
    /// # Errors
    ///
    /// Implementations report owner-lookup failures (element outside the
    /// global partition) as Contract errors; the ghost build aborts on them.
    fn find_owner(&self, tree: GlobalTreeId, elem: &[u8], class: EClass) -> MeshResult<u32>;
}
