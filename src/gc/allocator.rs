//! Object arena for the JavaScript heap
//!
//! Objects live in a slot vector and are referred to by [`ObjectId`]. A slot
//! is either occupied or on the free list:
//!
//! ```text
//! slots: [ obj | obj | free -> 4 | obj | free -> END | obj ]
//!                      ^ free_head
//! ```
//!
//! Every slot carries a mark bit used by the collector. Stores of heap
//! references into an object must go through [`Heap::write_barrier`].

use std::fmt;

use super::barrier::{NoBarrier, WriteBarrier};
use crate::runtime::object::JSObject;
use crate::value::Value;

/// Index of an object in the heap
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjectId(u32);

impl ObjectId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        ObjectId(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Largest object id that still fits a value payload
const MAX_OBJECTS: usize = 1 << 26;

enum Slot {
    Occupied { object: JSObject, marked: bool },
    Free { next: Option<u32> },
}

/// The JavaScript heap
///
/// Owns every object and the write barrier installed by the embedder.
pub struct Heap {
    slots: Vec<Slot>,
    free_head: Option<u32>,
    live: usize,
    barrier: Box<dyn WriteBarrier>,
}

impl Heap {
    /// Create an empty heap with no write barrier
    pub fn new() -> Self {
        Self::with_barrier(Box::new(NoBarrier))
    }

    /// Create an empty heap reporting stores to `barrier`
    pub fn with_barrier(barrier: Box<dyn WriteBarrier>) -> Self {
        Heap {
            slots: Vec::new(),
            free_head: None,
            live: 0,
            barrier,
        }
    }

    /// Allocate an object, reusing a free slot when possible
    pub fn alloc(&mut self, object: JSObject) -> ObjectId {
        self.live += 1;
        if let Some(idx) = self.free_head {
            let slot = &mut self.slots[idx as usize];
            if let Slot::Free { next } = *slot {
                self.free_head = next;
            }
            *slot = Slot::Occupied {
                object,
                marked: false,
            };
            return ObjectId(idx);
        }

        if self.slots.len() >= MAX_OBJECTS {
            crate::error::out_of_memory("object arena");
        }
        let id = ObjectId(self.slots.len() as u32);
        self.slots.push(Slot::Occupied {
            object,
            marked: false,
        });
        id
    }

    /// Check whether `id` refers to a live object
    #[inline]
    pub fn contains(&self, id: ObjectId) -> bool {
        matches!(self.slots.get(id.index()), Some(Slot::Occupied { .. }))
    }

    /// Borrow an object
    ///
    /// Ids are only handed out for live objects and stay valid while the
    /// object is reachable, so a stale id is an embedder bug.
    #[inline]
    pub fn get(&self, id: ObjectId) -> &JSObject {
        match self.slots.get(id.index()) {
            Some(Slot::Occupied { object, .. }) => object,
            _ => panic!("use of collected object {:?}", id),
        }
    }

    /// Mutably borrow an object
    #[inline]
    pub fn get_mut(&mut self, id: ObjectId) -> &mut JSObject {
        match self.slots.get_mut(id.index()) {
            Some(Slot::Occupied { object, .. }) => object,
            _ => panic!("use of collected object {:?}", id),
        }
    }

    /// Report a store of `value` into `owner`
    ///
    /// Must be called for every slot store; non-reference values are
    /// filtered here.
    #[inline]
    pub fn write_barrier(&mut self, owner: ObjectId, value: Value) {
        if let Some(target) = value.to_object() {
            self.barrier.on_store(owner, target);
        }
    }

    /// Number of live objects
    #[inline]
    pub fn live_objects(&self) -> usize {
        self.live
    }

    /// Number of slots, live or free
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Get memory usage statistics
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            slots: self.slots.len(),
            live: self.live,
            free: self.slots.len() - self.live,
        }
    }

    pub(super) fn set_marked(&mut self, id: ObjectId, on: bool) -> bool {
        match self.slots.get_mut(id.index()) {
            Some(Slot::Occupied { marked, .. }) => {
                let was = *marked;
                *marked = on;
                was
            }
            _ => true,
        }
    }

    pub(super) fn clear_marks(&mut self) {
        for slot in &mut self.slots {
            if let Slot::Occupied { marked, .. } = slot {
                *marked = false;
            }
        }
    }

    /// Free every unmarked object; returns how many were freed
    pub(super) fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for idx in (0..self.slots.len()).rev() {
            if let Slot::Occupied { marked: false, .. } = self.slots[idx] {
                self.slots[idx] = Slot::Free {
                    next: self.free_head,
                };
                self.free_head = Some(idx as u32);
                freed += 1;
            }
        }
        self.live -= freed;
        freed
    }

    /// Iterate over all live objects
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &JSObject)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| match slot {
            Slot::Occupied { object, .. } => Some((ObjectId(idx as u32), object)),
            Slot::Free { .. } => None,
        })
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// Memory usage statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Total slots ever allocated
    pub slots: usize,
    /// Occupied slots
    pub live: usize,
    /// Slots on the free list
    pub free: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::shape::ShapeTable;

    fn plain(shapes: &ShapeTable) -> JSObject {
        JSObject::new(shapes.root())
    }

    #[test]
    fn test_heap_creation() {
        let heap = Heap::new();
        assert_eq!(heap.live_objects(), 0);
        assert_eq!(heap.capacity(), 0);
    }

    #[test]
    fn test_alloc() {
        let shapes = ShapeTable::new(4);
        let mut heap = Heap::new();

        let a = heap.alloc(plain(&shapes));
        let b = heap.alloc(plain(&shapes));
        assert_ne!(a, b);
        assert!(heap.contains(a));
        assert_eq!(heap.live_objects(), 2);
        assert_eq!(heap.iter().count(), 2);
    }

    #[test]
    fn test_sweep_reuses_slots() {
        let shapes = ShapeTable::new(4);
        let mut heap = Heap::new();

        let a = heap.alloc(plain(&shapes));
        let b = heap.alloc(plain(&shapes));
        heap.clear_marks();
        heap.set_marked(a, true);

        assert_eq!(heap.sweep(), 1);
        assert!(!heap.contains(b));
        assert_eq!(heap.stats().free, 1);

        let c = heap.alloc(plain(&shapes));
        assert_eq!(c, b);
        assert_eq!(heap.stats().free, 0);
    }
}
