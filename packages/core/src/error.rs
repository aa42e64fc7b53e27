//! Error types for cmesh construction, partitioning, and ghost building.
//!
//! Every failure carries a structured [`MeshError`] variant; [`MeshError::kind`]
//! collapses the variants into the four coarse [`ErrorKind`]s so callers can
//! branch without matching individual variants. No error is recovered
//! internally: setters check their preconditions before mutating, so a
//! failing call leaves the builder unchanged.

use crate::eclass::EClass;
use crate::tree::GlobalTreeId;

/// Helper type for a call that could go wrong.
pub type MeshResult<T> = Result<T, MeshError>;

/// Coarse classification of a [`MeshError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller broke an API precondition (wrong phase, bad id, mismatched
    /// dimension). Treated as an assertion failure by the library's users.
    Contract,
    /// The configured state cannot be committed (zero trees, missing
    /// communicator, inconsistent offsets).
    Config,
    /// A communicator operation failed; the underlying error is passed
    /// through verbatim.
    Comm,
    /// The requested operation is deliberately not supported.
    Unsupported,
}

/// Errors reported by the coarse-mesh core.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("an explicit communicator was already set")]
    CommAlreadySet,
    #[error("partition layout was already fixed")]
    LayoutAlreadySet,
    #[error("layout cannot change after trees were inserted")]
    TreesAlreadyInserted,
    #[error("local tree count was already set")]
    TreeCountAlreadySet,
    #[error("tree count must be set before inserting or joining trees")]
    TreeCountNotSet,
    #[error("tree {tree} outside the local range [{first}, {end})")]
    TreeOutOfRange {
        tree: GlobalTreeId,
        first: GlobalTreeId,
        end: GlobalTreeId,
    },
    #[error("tree {tree} was already inserted")]
    TreeAlreadySet { tree: GlobalTreeId },
    #[error("tree {tree} has class {class:?} of dimension {actual}, cmesh dimension is {expected}")]
    DimensionMismatch {
        tree: GlobalTreeId,
        class: EClass,
        actual: u8,
        expected: u8,
    },
    #[error("face {face} out of range for tree {tree}")]
    FaceOutOfRange { tree: GlobalTreeId, face: usize },
    #[error("face classes do not match: {left:?} vs {right:?}")]
    FaceClassMismatch { left: EClass, right: EClass },
    #[error("face {face} of tree {tree} is already joined")]
    FaceAlreadyJoined { tree: GlobalTreeId, face: usize },
    #[error("neither tree {a} nor tree {b} is local")]
    JoinNotLocal { a: GlobalTreeId, b: GlobalTreeId },
    #[error("ghost elements from rank {rank} arrived after rank {seen}")]
    IngestOutOfOrder { rank: u32, seen: u32 },
    #[error("tree {tree} is not a ghost tree")]
    NotAGhostTree { tree: GlobalTreeId },
    #[error("ghost payload of {len} bytes is not a multiple of the element size {elem_size}")]
    PayloadSize { len: usize, elem_size: usize },
    #[error("the class of neighbor tree {tree} is not known locally")]
    UnknownNeighborClass { tree: GlobalTreeId },

    #[error("commit requires a communicator")]
    MissingCommunicator,
    #[error("commit requires a positive tree count")]
    EmptyMesh,
    #[error("tree {tree} was never inserted")]
    TreeNotSet { tree: GlobalTreeId },
    #[error("partition metadata is inconsistent: {reason}")]
    InvalidPartition { reason: String },
    #[error("refinement level {level} overflows the child index space in dimension {dimension}")]
    LevelOverflow { level: u32, dimension: u8 },

    #[error("communicator failure: {0}")]
    Comm(#[from] anyhow::Error),

    #[error("uniform partitions of meshes containing pyramids are not supported")]
    PyramidPartition,
}

impl MeshError {
    /// The coarse kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeshError::CommAlreadySet
            | MeshError::LayoutAlreadySet
            | MeshError::TreesAlreadyInserted
            | MeshError::TreeCountAlreadySet
            | MeshError::TreeCountNotSet
            | MeshError::TreeOutOfRange { .. }
            | MeshError::TreeAlreadySet { .. }
            | MeshError::DimensionMismatch { .. }
            | MeshError::FaceOutOfRange { .. }
            | MeshError::FaceClassMismatch { .. }
            | MeshError::FaceAlreadyJoined { .. }
            | MeshError::JoinNotLocal { .. }
            | MeshError::IngestOutOfOrder { .. }
            | MeshError::NotAGhostTree { .. }
            | MeshError::PayloadSize { .. }
            | MeshError::UnknownNeighborClass { .. } => ErrorKind::Contract,
            MeshError::MissingCommunicator
            | MeshError::EmptyMesh
            | MeshError::TreeNotSet { .. }
            | MeshError::InvalidPartition { .. }
            | MeshError::LevelOverflow { .. } => ErrorKind::Config,
            MeshError::Comm(_) => ErrorKind::Comm,
            MeshError::PyramidPartition => ErrorKind::Unsupported,
        }
    }
}
