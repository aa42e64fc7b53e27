//! Element scheme capability and byte-array element storage.
//!
//! Fine elements are opaque to the ghost layer: each element class comes
//! with an [`ElementScheme`] vtable that knows the element byte size, level,
//! linear id, and face layout. Elements themselves are stored as fixed-size
//! byte records inside an [`ElementArray`], so the ghost and remote stores
//! own their element payloads outright and teardown is plain `Drop`.

/// Per-eclass operations on opaque fine elements.
///
/// An element is a `&[u8]` of exactly [`ElementScheme::element_size`] bytes.
/// Implementations are supplied by the fine-element scheme of the forest;
/// the ghost layer only consumes them.
pub trait ElementScheme {
    /// Byte size of one element of this class.
    fn element_size(&self) -> usize;

    /// Refinement level of an element.
    fn element_level(&self, elem: &[u8]) -> u32;

    /// Deterministic linear ordering index of an element at `level`.
    fn element_linear_id(&self, elem: &[u8], level: u32) -> u64;

    /// Number of faces of an element.
    fn element_num_faces(&self, elem: &[u8]) -> usize;

    /// Number of one-level-finer neighbor elements sharing `face`.
    fn element_num_face_children(&self, elem: &[u8], face: usize) -> usize;

    /// Copies an element into a destination slot of the same size.
    fn element_copy(&self, src: &[u8], dst: &mut [u8]);
}

/// Returns `true` when two elements occupy the same position: equal level
/// and equal linear id at that level.
pub fn elements_equal(scheme: &dyn ElementScheme, a: &[u8], b: &[u8]) -> bool {
    let level = scheme.element_level(a);
    level == scheme.element_level(b)
        && scheme.element_linear_id(a, level) == scheme.element_linear_id(b, level)
}

// ---------------------------------------------------------------------------
// ElementArray
// ---------------------------------------------------------------------------

/// Flat storage for elements of one class.
///
/// Records are `elem_size`-strided byte slices in a single contiguous
/// buffer. The array doubles as the ghost builder's scratch buffer:
/// [`ElementArray::reset`] discards the previous contents and reallocates
/// for a new element size and count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementArray {
    elem_size: usize,
    data: Vec<u8>,
}

impl ElementArray {
    /// Creates an empty array for elements of `elem_size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `elem_size` is zero.
    #[must_use]
    pub fn new(elem_size: usize) -> Self {
        assert!(elem_size > 0, "element size must be positive");
        Self {
            elem_size,
            data: Vec::new(),
        }
    }

    /// Byte size of one element.
    #[must_use]
    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// Number of stored elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.elem_size
    }

    /// Whether the array holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[must_use]
    pub fn get(&self, index: usize) -> &[u8] {
        let start = index * self.elem_size;
        &self.data[start..start + self.elem_size]
    }

    /// Mutable access to the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn get_mut(&mut self, index: usize) -> &mut [u8] {
        let start = index * self.elem_size;
        &mut self.data[start..start + self.elem_size]
    }

    /// The last stored element, if any.
    #[must_use]
    pub fn last(&self) -> Option<&[u8]> {
        self.len().checked_sub(1).map(|i| self.get(i))
    }

    /// Appends a copy of `elem`.
    ///
    /// # Panics
    ///
    /// Panics if `elem.len() != elem_size()`.
    pub fn push_copy(&mut self, elem: &[u8]) {
        assert_eq!(elem.len(), self.elem_size, "element size mismatch");
        self.data.extend_from_slice(elem);
    }

    /// Appends `bytes` as whole elements, returning how many were added.
    ///
    /// # Panics
    ///
    /// Panics if `bytes.len()` is not a multiple of the element size;
    /// callers validate payload sizes before appending.
    pub fn extend_from_bytes(&mut self, bytes: &[u8]) -> usize {
        assert_eq!(bytes.len() % self.elem_size, 0, "payload size mismatch");
        self.data.extend_from_slice(bytes);
        bytes.len() / self.elem_size
    }

    /// Discards all contents and reallocates `count` zeroed elements of a
    /// possibly different size.
    pub fn reset(&mut self, elem_size: usize, count: usize) {
        assert!(elem_size > 0, "element size must be positive");
        self.elem_size = elem_size;
        self.data.clear();
        self.data.resize(elem_size * count, 0);
    }

    /// Iterates the stored elements in order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.elem_size)
    }

    /// The raw contiguous element bytes, for handing to a transport.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
