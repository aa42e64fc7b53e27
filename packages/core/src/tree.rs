//! Coarse tree records and face-neighbor slots.
//!
//! A tree is one topological cell of the cmesh. Its face-neighbor slots
//! either reference another tree ([`FaceLink`]) or mark a domain boundary
//! (`None`). The packed [`FaceCode`] byte is an external contract shared
//! with peer codes that read and write mesh files; its bit layout (low bits
//! = neighbor face index, high bits = orientation) must not change.

use serde::{Deserialize, Serialize};

use crate::eclass::EClass;

/// Index of a tree in the global `[0, num_trees)` numbering.
pub type GlobalTreeId = u64;

/// Index of a tree in a rank's local `[0, num_local_trees)` numbering.
pub type LocalTreeId = u64;

// ---------------------------------------------------------------------------
// FaceCode
// ---------------------------------------------------------------------------

/// Packed tree-to-face byte.
///
/// Low [`FaceCode::FACE_BITS`] bits hold the neighbor's face index, the high
/// bits the orientation of the face-to-face vertex permutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceCode(u8);

impl FaceCode {
    /// Bits reserved for the face index. Face counts never exceed 6.
    pub const FACE_BITS: u32 = 3;
    const FACE_MASK: u8 = (1 << FaceCode::FACE_BITS) - 1;

    /// Packs a neighbor face index and an orientation into one byte.
    ///
    /// `face` must fit in [`FaceCode::FACE_BITS`] bits and `orientation` in
    /// the remaining high bits; both hold for every supported class.
    #[must_use]
    pub fn pack(face: u8, orientation: u8) -> Self {
        debug_assert!(face <= FaceCode::FACE_MASK);
        debug_assert!(orientation < (1 << (8 - FaceCode::FACE_BITS)));
        Self((orientation << FaceCode::FACE_BITS) | face)
    }

    /// The neighbor's face index.
    #[must_use]
    pub fn face(self) -> u8 {
        self.0 & FaceCode::FACE_MASK
    }

    /// The face-to-face orientation.
    #[must_use]
    pub fn orientation(self) -> u8 {
        self.0 >> FaceCode::FACE_BITS
    }

    /// The raw packed byte, as stored in mesh files.
    #[must_use]
    pub fn raw(self) -> u8 {
        self.0
    }

    /// Reconstructs a code from its raw byte.
    #[must_use]
    pub fn from_raw(raw: u8) -> Self {
        Self(raw)
    }
}

// ---------------------------------------------------------------------------
// FaceLink / TreeRecord
// ---------------------------------------------------------------------------

/// A populated face-neighbor slot: the tree on the other side of a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceLink {
    /// Global id of the neighbor tree.
    pub tree: GlobalTreeId,
    /// Class of the neighbor tree. `None` when the neighbor lives on
    /// another rank and its class is not known locally.
    pub class: Option<EClass>,
    /// Packed neighbor-face index and orientation.
    pub code: FaceCode,
}

/// One coarse tree of a committed cmesh.
///
/// `neighbors.len()` equals `class.num_faces()`; a `None` slot is a domain
/// boundary. In a committed cmesh every link between two local trees is
/// symmetric: the neighbor's slot at `code.face()` points back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeRecord {
    /// Global id of this tree.
    pub global_id: GlobalTreeId,
    /// Element class of this tree.
    pub class: EClass,
    /// Face-neighbor slots, one per face.
    pub neighbors: Vec<Option<FaceLink>>,
}

impl TreeRecord {
    /// Creates a record with all faces unset (boundary).
    #[must_use]
    pub fn new(global_id: GlobalTreeId, class: EClass) -> Self {
        Self {
            global_id,
            class,
            neighbors: vec![None; class.num_faces()],
        }
    }

    /// The neighbor link at `face`, or `None` for a boundary face.
    #[must_use]
    pub fn neighbor(&self, face: usize) -> Option<&FaceLink> {
        self.neighbors.get(face).and_then(Option::as_ref)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
