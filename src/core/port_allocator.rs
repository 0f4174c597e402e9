//! Reservation of backend ports out of a configured inclusive range.
//!
//! The allocator has no synchronization of its own: per spec, both
//! `reserve` and `release` are called while the registry already holds its
//! bookkeeping lock, so this type is plain, synchronous, single-threaded
//! code that a `&mut self` caller drives under that lock.

use std::collections::BTreeSet;

use super::session::PortRange;

/// Tracks which ports in a `PortRange` are currently in use.
///
/// Iteration is deterministic and ascending: `reserve` always returns the
/// lowest free port. This isn't load-bearing for correctness, only for
/// reproducible tests and logs.
pub struct PortAllocator {
    range: PortRange,
    used: BTreeSet<u16>,
}

impl PortAllocator {
    #[must_use]
    pub fn new(range: PortRange) -> Self {
        Self {
            range,
            used: BTreeSet::new(),
        }
    }

    /// Reserve the lowest free port in the configured range.
    pub fn reserve(&mut self) -> Option<u16> {
        for port in self.range.iter() {
            if !self.used.contains(&port) {
                self.used.insert(port);
                return Some(port);
            }
        }
        None
    }

    /// Release a port back to the pool.
    ///
    /// Idempotent: releasing a port that isn't reserved is a no-op, logged
    /// as a warning rather than treated as an error.
    pub fn release(&mut self, port: u16) {
        if !self.used.remove(&port) {
            tracing::warn!(port, "released a port that was not reserved");
        }
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.range.len() - self.used.len()
    }

    #[must_use]
    pub fn used_ports(&self) -> Vec<u16> {
        self.used.iter().copied().collect()
    }
}
