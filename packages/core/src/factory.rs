//! Canonical hypercube meshes.
//!
//! [`hypercube`] builds the unit hypercube tiled with trees of a single
//! class, replicated on every rank. The tree counts come from the
//! [`num_hypercube_trees`] registry table; the face connectivity is this
//! crate's canonical convention:
//!
//! - triangles: the two trees share the diagonal
//! - tetrahedra: six trees fan around the main diagonal, each sharing a
//!   triangular face with the next
//! - prisms / pyramids: three trees in a ring around the cube
//!
//! Classes that tile the cube with one tree (vertex, line, quad, hex) have
//! only boundary faces.

use std::sync::Arc;

use crate::cmesh::{Cmesh, CmeshBuilder};
use crate::comm::Communicator;
use crate::eclass::{num_hypercube_trees, EClass};
use crate::error::MeshResult;

/// Builds the unit-hypercube cmesh for the given class.
///
/// The mesh is replicated; `comm` and `do_dup` are handed to the builder
/// unchanged.
///
/// # Errors
///
/// Propagates builder errors (Comm errors from the communicator at commit;
/// the setter sequence itself is valid for every class).
pub fn hypercube(
    class: EClass,
    comm: Arc<dyn Communicator>,
    do_dup: bool,
) -> MeshResult<Cmesh> {
    let num_trees = num_hypercube_trees(class);

    let mut builder = CmeshBuilder::new();
    builder.set_mpicomm(comm, do_dup)?;
    builder.set_num_trees(num_trees)?;
    for tree in 0..num_trees {
        builder.set_tree(tree, class)?;
    }

    match class {
        EClass::Triangle => {
            builder.join_faces(0, 1, 1, 2, 0)?;
        }
        EClass::Tet => {
            for i in 0..6 {
                builder.join_faces(i, (i + 1) % 6, 2, 1, 0)?;
            }
        }
        EClass::Prism => {
            for i in 0..3 {
                builder.join_faces(i, (i + 1) % 3, 1, 2, 0)?;
            }
        }
        EClass::Pyramid => {
            for i in 0..3 {
                builder.join_faces(i, (i + 1) % 3, 0, 3, 0)?;
            }
        }
        EClass::Vertex | EClass::Line | EClass::Quad | EClass::Hex => {}
    }

    builder.commit()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
