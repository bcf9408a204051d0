//! Identifiers for stored objects and links.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of an object (graph node).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

/// Identifier of a link (graph edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(u64);

impl ObjectId {
    /// Wrap a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric id.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl LinkId {
    /// Wrap a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric id.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// Monotonic id allocator shared by concurrent writers.
///
/// Ids start at 1; `0` is never handed out.
#[derive(Debug)]
pub(crate) struct IdAllocator {
    next_object: AtomicU64,
    next_link: AtomicU64,
}

impl IdAllocator {
    pub(crate) fn new() -> Self {
        Self {
            next_object: AtomicU64::new(1),
            next_link: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_object(&self) -> ObjectId {
        ObjectId(self.next_object.fetch_add(1, Ordering::SeqCst))
    }

    pub(crate) fn next_link(&self) -> LinkId {
        LinkId(self.next_link.fetch_add(1, Ordering::SeqCst))
    }

    /// Make sure future allocations never collide with `id`.
    pub(crate) fn observe_object(&self, id: ObjectId) {
        self.next_object.fetch_max(id.0 + 1, Ordering::SeqCst);
    }

    /// Make sure future allocations never collide with `id`.
    pub(crate) fn observe_link(&self, id: LinkId) {
        self.next_link.fetch_max(id.0 + 1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let alloc = IdAllocator::new();
        let a = alloc.next_object();
        let b = alloc.next_object();
        assert_eq!(a.raw(), 1);
        assert_eq!(b.raw(), 2);
        assert_eq!(alloc.next_link().raw(), 1);
    }

    #[test]
    fn test_observe_skips_past_imported_ids() {
        let alloc = IdAllocator::new();
        alloc.observe_object(ObjectId::new(41));
        alloc.observe_object(ObjectId::new(7));
        assert_eq!(alloc.next_object().raw(), 42);

        alloc.observe_link(LinkId::new(3));
        assert_eq!(alloc.next_link().raw(), 4);
    }

    #[test]
    fn test_display() {
        assert_eq!(ObjectId::new(5).to_string(), "obj#5");
        assert_eq!(LinkId::new(9).to_string(), "link#9");
    }
}
