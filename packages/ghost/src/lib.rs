//! Treemesh ghost layer -- remote-element planning over a partitioned
//! forest.
//!
//! Given a committed cmesh (from `treemesh-core`) and a locally partitioned
//! forest of fine elements, this crate derives the one-layer ghost plan of
//! each rank:
//!
//! - **Scheme** ([`scheme`]): per-eclass element operations and flat byte
//!   storage for opaque elements
//! - **Forest** ([`forest`]): the read-only forest capability the builder
//!   consumes
//! - **Stores** ([`store`]): ghost trees to receive into and per-rank
//!   remote bundles to send
//! - **Ghost** ([`ghost`]): the builder itself, plus the rank-major receive
//!   fill and per-rank chunk offsets
//!
//! The crate plans the exchange but never communicates; the caller's
//! transport ships the bundles and deposits received payloads through
//! [`Ghost::ingest`].

pub mod forest;
pub mod ghost;
pub mod scheme;
pub mod store;

#[cfg(test)]
mod fixtures;

// Forest
pub use forest::ForestView;

// Ghost
pub use ghost::Ghost;

// Scheme
pub use scheme::{elements_equal, ElementArray, ElementScheme};

// Stores
pub use store::{GhostTree, ProcessOffset, RemoteBundle, RemoteTree};
