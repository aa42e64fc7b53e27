//! Ghost-tree and remote-element stores.
//!
//! Two mirrored stores back the ghost layer:
//!
//! - [`GhostTree`]: a tree owned elsewhere whose elements this rank will
//!   receive; the ghost builder creates the skeleton, the exchange fills the
//!   element arrays.
//! - [`RemoteBundle`]/[`RemoteTree`]: per-remote-rank groups of locally
//!   owned elements other ranks will receive, appended in local iteration
//!   order by [`RemoteStore::add`].
//!
//! `RemoteStore::add` relies on the ghost builder's iteration order: trees
//! in ascending local id, elements in ascending linear id. That order makes
//! the last tree and last element of a bundle the only possible duplicates,
//! an invariant enforced with debug assertions.

use serde::{Deserialize, Serialize};

use treemesh_core::{EClass, GlobalTreeId};

use crate::scheme::{elements_equal, ElementArray, ElementScheme};

/// A tree with remotely owned elements neighboring this rank's domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostTree {
    /// Global id of the tree.
    pub global_id: GlobalTreeId,
    /// Element class of the tree.
    pub class: EClass,
    /// Received ghost elements, filled rank-major by the exchange.
    pub elements: ElementArray,
}

/// A tree's worth of locally owned elements shipped to one remote rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTree {
    /// Global id of the tree.
    pub global_id: GlobalTreeId,
    /// Element class of the tree.
    pub class: EClass,
    /// Element copies to send, in ascending linear-id order.
    pub elements: ElementArray,
}

/// Everything this rank sends to one remote rank, grouped by tree.
///
/// Trees appear in ascending global-id order; elements within a tree in
/// ascending linear-id order, deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBundle {
    /// The receiving rank.
    pub rank: u32,
    /// Per-tree element groups.
    pub trees: Vec<RemoteTree>,
}

impl RemoteBundle {
    /// Total number of elements across all trees of the bundle.
    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.trees.iter().map(|tree| tree.elements.len()).sum()
    }
}

/// Addressing record for one remote rank's chunk of the ghost exchange:
/// where the rank's first received element lands in the ghost-tree store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOffset {
    /// The sending rank.
    pub rank: u32,
    /// Index of the rank's first ghost tree in the sorted ghost-tree array.
    pub first_tree: usize,
    /// Element index within that tree where the rank's chunk begins.
    pub first_element: usize,
}

// ---------------------------------------------------------------------------
// RemoteStore
// ---------------------------------------------------------------------------

/// Per-remote-rank bundles of locally owned elements.
#[derive(Debug, Default)]
pub(crate) struct RemoteStore {
    /// Ranks in discovery order (first element shipped to them).
    ranks: Vec<u32>,
    bundles: ahash::AHashMap<u32, RemoteBundle>,
}

impl RemoteStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records that `elem` of tree `global_tree` must be shipped to `rank`.
    ///
    /// Trees are appended strictly in ascending global id because the
    /// caller iterates local trees in order; within a tree, elements arrive
    /// in ascending linear id, so a duplicate (the same element reached
    /// through several faces) can only be the bundle's last element.
    pub(crate) fn add(
        &mut self,
        rank: u32,
        global_tree: GlobalTreeId,
        class: EClass,
        elem: &[u8],
        scheme: &dyn ElementScheme,
    ) {
        if !self.bundles.contains_key(&rank) {
            self.ranks.push(rank);
            self.bundles.insert(
                rank,
                RemoteBundle {
                    rank,
                    trees: Vec::new(),
                },
            );
        }
        let bundle = self.bundles.get_mut(&rank).expect("inserted above");

        let needs_tree = match bundle.trees.last() {
            Some(tree) => {
                debug_assert!(tree.global_id <= global_tree, "trees must arrive in order");
                tree.global_id != global_tree
            }
            None => true,
        };
        if needs_tree {
            bundle.trees.push(RemoteTree {
                global_id: global_tree,
                class,
                elements: ElementArray::new(scheme.element_size()),
            });
        }

        let tree = bundle.trees.last_mut().expect("tree pushed above");
        if let Some(last) = tree.elements.last() {
            if elements_equal(scheme, last, elem) {
                return;
            }
            debug_assert!(
                scheme.element_linear_id(last, scheme.element_level(last))
                    <= scheme.element_linear_id(elem, scheme.element_level(elem)),
                "elements must arrive in linear order"
            );
        }
        tree.elements.push_copy(elem);
    }

    /// Ranks in discovery order.
    pub(crate) fn ranks(&self) -> &[u32] {
        &self.ranks
    }

    /// Ranks in ascending order.
    pub(crate) fn sorted_ranks(&self) -> Vec<u32> {
        let mut sorted = self.ranks.clone();
        sorted.sort_unstable();
        sorted
    }

    /// The bundle for `rank`, if any element is shipped to it.
    pub(crate) fn bundle(&self, rank: u32) -> Option<&RemoteBundle> {
        self.bundles.get(&rank)
    }

    /// Total number of elements across all bundles.
    pub(crate) fn num_elements(&self) -> usize {
        self.bundles.values().map(RemoteBundle::num_elements).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
