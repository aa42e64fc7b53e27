//! Communicator capability.
//!
//! The cmesh never sends or receives messages; it only reads its process
//! coordinates (`rank`, `size`) from a caller-supplied communicator at
//! commit, and optionally duplicates the handle so the committed mesh owns
//! an independent one for its whole lifetime. Abstracting the handle behind
//! a trait allows deterministic testing: simulation tests substitute a
//! fixed-coordinate [`GroupComm`] for a real process group.
//!
//! Freeing a duplicated communicator is dropping its last handle; the
//! committed cmesh holds exactly one.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A process-group communicator handle.
///
/// `rank` and `size` may fail at the transport level; such errors are
/// propagated to the caller verbatim.
pub trait Communicator: fmt::Debug + Send + Sync {
    /// This process's rank within the group, in `[0, size)`.
    fn rank(&self) -> anyhow::Result<u32>;

    /// Number of processes in the group.
    fn size(&self) -> anyhow::Result<u32>;

    /// Creates an independent handle to the same group.
    fn duplicate(&self) -> anyhow::Result<Arc<dyn Communicator>>;
}

/// The single-process world: rank 0 of a group of size 1.
#[derive(Debug, Clone, Default)]
pub struct SingleComm;

impl Communicator for SingleComm {
    fn rank(&self) -> anyhow::Result<u32> {
        Ok(0)
    }

    fn size(&self) -> anyhow::Result<u32> {
        Ok(1)
    }

    fn duplicate(&self) -> anyhow::Result<Arc<dyn Communicator>> {
        Ok(Arc::new(SingleComm))
    }
}

/// A fixed-coordinate communicator for SPMD simulation.
///
/// Each simulated rank constructs its own `GroupComm::new(rank, size)`.
/// Duplicates share a live-handle counter with the handle they were created
/// from, so tests can observe that a committed cmesh releases its duplicated
/// communicator exactly when the last reference to the mesh drops.
pub struct GroupComm {
    rank: u32,
    size: u32,
    live_duplicates: Arc<AtomicUsize>,
    counted: bool,
}

impl GroupComm {
    /// Creates a communicator for the given process coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `rank >= size`.
    #[must_use]
    pub fn new(rank: u32, size: u32) -> Self {
        assert!(rank < size, "rank {rank} out of range [0, {size})");
        Self {
            rank,
            size,
            live_duplicates: Arc::new(AtomicUsize::new(0)),
            counted: false,
        }
    }

    /// Number of duplicates of this communicator currently alive.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.live_duplicates.load(Ordering::Acquire)
    }
}

impl fmt::Debug for GroupComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("duplicate", &self.counted)
            .finish()
    }
}

impl Communicator for GroupComm {
    fn rank(&self) -> anyhow::Result<u32> {
        Ok(self.rank)
    }

    fn size(&self) -> anyhow::Result<u32> {
        Ok(self.size)
    }

    fn duplicate(&self) -> anyhow::Result<Arc<dyn Communicator>> {
        self.live_duplicates.fetch_add(1, Ordering::AcqRel);
        Ok(Arc::new(GroupComm {
            rank: self.rank,
            size: self.size,
            live_duplicates: Arc::clone(&self.live_duplicates),
            counted: true,
        }))
    }
}

impl Drop for GroupComm {
    fn drop(&mut self) {
        if self.counted {
            self.live_duplicates.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
