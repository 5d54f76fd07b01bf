//! Mark-sweep garbage collector
//!
//! The GC works in two phases:
//! 1. Mark: Traverse all reachable objects starting from roots, set mark bit
//! 2. Sweep: Put every unmarked slot on the free list
//!
//! Objects report their outgoing references through [`Trace`]. Shapes are
//! reference counted and drop with the last object wearing them, but they
//! hold prototype ids, so they trace too. Listener registries hold weak
//! references only and report nothing.

use super::allocator::{Heap, ObjectId};
use crate::value::Value;

/// Visits references held by a heap structure
pub trait Tracer {
    /// Mark an object as reachable
    fn mark_object(&mut self, id: ObjectId);

    /// Mark a value if it refers to an object
    #[inline]
    fn mark_value(&mut self, value: Value) {
        if let Some(id) = value.to_object() {
            self.mark_object(id);
        }
    }
}

/// Implemented by every structure that can hold heap references
pub trait Trace {
    fn trace(&self, tracer: &mut dyn Tracer);
}

/// Tracer that pushes newly seen objects on a worklist
struct MarkTracer {
    worklist: Vec<ObjectId>,
}

impl Tracer for MarkTracer {
    #[inline]
    fn mark_object(&mut self, id: ObjectId) {
        self.worklist.push(id);
    }
}

/// Statistics about a GC run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Number of objects before collection
    pub objects_before: usize,
    /// Number of objects after collection
    pub objects_after: usize,
    /// Objects freed
    pub freed: usize,
}

/// Run garbage collection on the heap
///
/// 1. Clear all mark bits
/// 2. Mark everything reachable from `roots`
/// 3. Sweep unmarked objects onto the free list
pub fn collect(heap: &mut Heap, roots: &[Value]) -> GcStats {
    let objects_before = heap.live_objects();

    heap.clear_marks();

    let mut tracer = MarkTracer {
        worklist: roots.iter().filter_map(|v| v.to_object()).collect(),
    };
    while let Some(id) = tracer.worklist.pop() {
        if !heap.contains(id) || heap.set_marked(id, true) {
            continue; // Already marked
        }
        heap.get(id).trace(&mut tracer);
    }

    let freed = heap.sweep();
    let stats = GcStats {
        objects_before,
        objects_after: heap.live_objects(),
        freed,
    };
    log::debug!("gc: {:?}", stats);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::object::JSObject;
    use crate::runtime::shape::ShapeTable;

    #[test]
    fn test_collect_empty_heap() {
        let mut heap = Heap::new();
        let stats = collect(&mut heap, &[]);
        assert_eq!(stats, GcStats::default());
    }

    #[test]
    fn test_collect_frees_unreachable() {
        let shapes = ShapeTable::new(4);
        let mut heap = Heap::new();

        let kept = heap.alloc(JSObject::new(shapes.root()));
        heap.alloc(JSObject::new(shapes.root()));
        heap.alloc(JSObject::new(shapes.root()));

        let stats = collect(&mut heap, &[Value::object(kept), Value::int(5)]);
        assert_eq!(stats.objects_before, 3);
        assert_eq!(stats.freed, 2);
        assert!(heap.contains(kept));
    }

    #[test]
    fn test_collect_follows_prototype_of_shape() {
        let shapes = ShapeTable::new(4);
        let mut heap = Heap::new();

        let proto = heap.alloc(JSObject::new(shapes.root()));
        let shape = shapes.blueprint(Some(proto), 2);
        let child = heap.alloc(JSObject::new(shape));

        collect(&mut heap, &[Value::object(child)]);
        assert!(heap.contains(proto));
    }
}
