//! Element class registry.
//!
//! The eight element classes a coarse tree can be an instance of, together
//! with their static topology tables:
//!
//! - [`EClass::dimension`]: topological dimension, 0..=3
//! - [`EClass::num_faces`]: number of codimension-1 faces, 0..=6
//! - [`EClass::face_class`]: the class of an individual face
//! - [`num_hypercube_trees`]: how many trees of a class tile the unit cube
//!
//! The tables are pure data shared by every rank; nothing here carries
//! state. Per-cmesh bookkeeping of how many trees of each class were
//! inserted lives in [`ClassCounts`].

use serde::{Deserialize, Serialize};

/// Element class of a coarse tree.
///
/// The class fixes the topological dimension and the face layout of a tree.
/// For the prism, faces 0..=2 are the quadrilateral sides and faces 3..=4
/// the triangular caps; for the pyramid, faces 0..=3 are the triangular
/// sides and face 4 the quadrilateral base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EClass {
    Vertex,
    Line,
    Triangle,
    Quad,
    Tet,
    Hex,
    Prism,
    Pyramid,
}

/// The largest face count over all classes (the hexahedron's 6).
pub const MAX_FACES: usize = 6;

impl EClass {
    /// Number of element classes.
    pub const COUNT: usize = 8;

    /// All classes, in registry order.
    pub const ALL: [EClass; EClass::COUNT] = [
        EClass::Vertex,
        EClass::Line,
        EClass::Triangle,
        EClass::Quad,
        EClass::Tet,
        EClass::Hex,
        EClass::Prism,
        EClass::Pyramid,
    ];

    /// Position of this class in the registry order.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Topological dimension of the class.
    #[must_use]
    pub fn dimension(self) -> u8 {
        match self {
            EClass::Vertex => 0,
            EClass::Line => 1,
            EClass::Triangle | EClass::Quad => 2,
            EClass::Tet | EClass::Hex | EClass::Prism | EClass::Pyramid => 3,
        }
    }

    /// Number of codimension-1 faces of the class.
    #[must_use]
    pub fn num_faces(self) -> usize {
        match self {
            EClass::Vertex => 0,
            EClass::Line => 2,
            EClass::Triangle => 3,
            EClass::Quad | EClass::Tet => 4,
            EClass::Prism | EClass::Pyramid => 5,
            EClass::Hex => 6,
        }
    }

    /// The class of face `face` of this class.
    ///
    /// Returns `None` if `face >= num_faces()`.
    #[must_use]
    pub fn face_class(self, face: usize) -> Option<EClass> {
        if face >= self.num_faces() {
            return None;
        }
        Some(match self {
            EClass::Vertex => unreachable!("a vertex has no faces"),
            EClass::Line => EClass::Vertex,
            EClass::Triangle | EClass::Quad => EClass::Line,
            EClass::Tet => EClass::Triangle,
            EClass::Hex => EClass::Quad,
            // Quad sides first, triangle caps last.
            EClass::Prism => {
                if face < 3 {
                    EClass::Quad
                } else {
                    EClass::Triangle
                }
            }
            // Triangle sides first, quad base last.
            EClass::Pyramid => {
                if face < 4 {
                    EClass::Triangle
                } else {
                    EClass::Quad
                }
            }
        })
    }
}

/// Number of trees of the given class that tile the unit hypercube.
#[must_use]
pub fn num_hypercube_trees(class: EClass) -> u64 {
    match class {
        EClass::Vertex | EClass::Line | EClass::Quad | EClass::Hex => 1,
        EClass::Triangle => 2,
        EClass::Prism | EClass::Pyramid => 3,
        EClass::Tet => 6,
    }
}

// ---------------------------------------------------------------------------
// ClassCounts
// ---------------------------------------------------------------------------

/// Per-class tree count table of a cmesh.
///
/// Indexed densely by [`EClass::index`]; the sum over all classes equals the
/// number of locally inserted trees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts([u64; EClass::COUNT]);

impl ClassCounts {
    /// Creates an all-zero table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the count for one class.
    #[must_use]
    pub fn count(&self, class: EClass) -> u64 {
        self.0[class.index()]
    }

    /// Increments the count for one class.
    pub fn increment(&mut self, class: EClass) {
        self.0[class.index()] += 1;
    }

    /// Sum of all per-class counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_cover_zero_to_three() {
        assert_eq!(EClass::Vertex.dimension(), 0);
        assert_eq!(EClass::Line.dimension(), 1);
        assert_eq!(EClass::Triangle.dimension(), 2);
        assert_eq!(EClass::Quad.dimension(), 2);
        assert_eq!(EClass::Tet.dimension(), 3);
        assert_eq!(EClass::Hex.dimension(), 3);
        assert_eq!(EClass::Prism.dimension(), 3);
        assert_eq!(EClass::Pyramid.dimension(), 3);
    }

    #[test]
    fn face_counts_match_registry() {
        let expected = [0, 2, 3, 4, 4, 6, 5, 5];
        for (class, want) in EClass::ALL.into_iter().zip(expected) {
            assert_eq!(class.num_faces(), want, "{class:?}");
        }
    }

    #[test]
    fn no_face_count_exceeds_max() {
        for class in EClass::ALL {
            assert!(class.num_faces() <= MAX_FACES);
        }
    }

    #[test]
    fn face_class_of_volume_classes() {
        for face in 0..4 {
            assert_eq!(EClass::Tet.face_class(face), Some(EClass::Triangle));
        }
        for face in 0..6 {
            assert_eq!(EClass::Hex.face_class(face), Some(EClass::Quad));
        }
        // Prism: quad sides, triangle caps.
        assert_eq!(EClass::Prism.face_class(0), Some(EClass::Quad));
        assert_eq!(EClass::Prism.face_class(2), Some(EClass::Quad));
        assert_eq!(EClass::Prism.face_class(3), Some(EClass::Triangle));
        assert_eq!(EClass::Prism.face_class(4), Some(EClass::Triangle));
        // Pyramid: triangle sides, quad base.
        assert_eq!(EClass::Pyramid.face_class(3), Some(EClass::Triangle));
        assert_eq!(EClass::Pyramid.face_class(4), Some(EClass::Quad));
    }

    #[test]
    fn face_class_out_of_range_is_none() {
        assert_eq!(EClass::Vertex.face_class(0), None);
        assert_eq!(EClass::Triangle.face_class(3), None);
        assert_eq!(EClass::Hex.face_class(6), None);
    }

    #[test]
    fn hypercube_tree_counts() {
        assert_eq!(num_hypercube_trees(EClass::Vertex), 1);
        assert_eq!(num_hypercube_trees(EClass::Line), 1);
        assert_eq!(num_hypercube_trees(EClass::Triangle), 2);
        assert_eq!(num_hypercube_trees(EClass::Quad), 1);
        assert_eq!(num_hypercube_trees(EClass::Tet), 6);
        assert_eq!(num_hypercube_trees(EClass::Hex), 1);
        assert_eq!(num_hypercube_trees(EClass::Prism), 3);
        assert_eq!(num_hypercube_trees(EClass::Pyramid), 3);
    }

    #[test]
    fn class_counts_increment_and_total() {
        let mut counts = ClassCounts::new();
        assert_eq!(counts.total(), 0);

        counts.increment(EClass::Tet);
        counts.increment(EClass::Tet);
        counts.increment(EClass::Hex);

        assert_eq!(counts.count(EClass::Tet), 2);
        assert_eq!(counts.count(EClass::Hex), 1);
        assert_eq!(counts.count(EClass::Quad), 0);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn eclass_msgpack_roundtrip() {
        for class in EClass::ALL {
            let bytes = rmp_serde::to_vec(&class).expect("serialize");
            let decoded: EClass = rmp_serde::from_slice(&bytes).expect("deserialize");
            assert_eq!(class, decoded);
        }
    }
}
