//! Garbage collector interface
//!
//! Objects live in an index-addressed arena and are reclaimed by a tracing
//! mark-sweep collector. Shapes, dictionaries, element stores and listener
//! registries expose their references through [`Trace`]; every store of a
//! heap reference into an object goes through [`Heap::write_barrier`].

mod allocator;
mod barrier;
mod collector;

pub use allocator::{Heap, HeapStats, ObjectId};
pub use barrier::{NoBarrier, RememberedSet, WriteBarrier};
pub use collector::{GcStats, Trace, Tracer};

use crate::value::Value;

impl Heap {
    /// Run garbage collection, keeping everything reachable from `roots`
    pub fn collect(&mut self, roots: &[Value]) -> GcStats {
        collector::collect(self, roots)
    }
}
