//! Treemesh core -- coarse-mesh topology store for a parallel adaptive mesh
//! library.
//!
//! A cmesh is a coarse, unstructured description of a computational domain:
//! a collection of trees, each an instance of one element class, glued
//! together along faces. This crate provides the foundation layer:
//!
//! - **EClass** ([`eclass`]): element class registry with dimension and face
//!   tables
//! - **Tree records** ([`tree`]): per-tree face-neighbor slots and the packed
//!   tree-to-face byte
//! - **Cmesh** ([`cmesh`]): staged builder and committed, immutable topology
//!   store with per-rank partition metadata
//! - **Partition** ([`partition`]): fair per-rank child ranges for uniform
//!   refinements
//! - **Communicator** ([`comm`]): process-group capability consumed at commit
//! - **Factory** ([`factory`]): canonical unit-hypercube meshes
//!
//! Refining trees into fine elements and tracking ghost elements across rank
//! boundaries happens in the companion `treemesh-ghost` crate.

pub mod cmesh;
pub mod comm;
pub mod eclass;
pub mod error;
pub mod factory;
pub mod partition;
pub mod tree;

// Cmesh
pub use cmesh::{Cmesh, CmeshBuilder};

// Communicator
pub use comm::{Communicator, GroupComm, SingleComm};

// EClass
pub use eclass::{num_hypercube_trees, ClassCounts, EClass, MAX_FACES};

// Errors
pub use error::{ErrorKind, MeshError, MeshResult};

// Factory
pub use factory::hypercube;

// Partition
pub use partition::{uniform_child_interval, uniform_extents, UniformBounds};

// Trees
pub use tree::{FaceCode, FaceLink, GlobalTreeId, LocalTreeId, TreeRecord};
