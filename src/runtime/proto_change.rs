//! Prototype change notification
//!
//! Inline caches that looked a property up through a prototype chain need a
//! cheap way to learn that something on that chain changed. Each shape can
//! carry:
//!
//! - a [`ChangeMarker`]: a sticky flag polled by the cache
//! - [`ChangeDetails`]: the shape's position in its prototype's listener
//!   registry, plus (for prototype shapes) the registry of shapes that use
//!   the object wearing it as their prototype
//!
//! ```text
//!   A (registry: [B])        marker flips propagate downward:
//!   ^                        A mutates -> notice(A) -> B -> C
//!   B (registry: [C], index 0 in A)
//!   ^
//!   C (index 0 in B)
//! ```
//!
//! Registries hold weak references and are never compacted; detaching a
//! shape leaves a tombstone so every other entry keeps its index.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::gc::{Heap, Trace, Tracer};
use crate::runtime::shape::Shape;

/// Sticky "something upstream changed" flag
#[derive(Debug, Default)]
pub struct ChangeMarker {
    changed: Cell<bool>,
}

impl ChangeMarker {
    pub fn new() -> Rc<Self> {
        Rc::new(ChangeMarker::default())
    }

    #[inline]
    pub fn has_changed(&self) -> bool {
        self.changed.get()
    }

    #[inline]
    pub(crate) fn set_changed(&self) {
        self.changed.set(true);
    }
}

/// Registries shorter than this always append
const MIN_REUSE_SLOTS: usize = 4;

/// Registry position and listeners of one shape
#[derive(Default)]
pub struct ChangeDetails {
    /// Index of the owning shape in its prototype's registry
    registered_index: Cell<Option<u32>>,
    /// Shapes whose prototype wears the owning shape
    listeners: RefCell<Vec<Option<Weak<Shape>>>>,
    /// Number of tombstones in `listeners`
    free: Cell<u32>,
}

impl ChangeDetails {
    #[inline]
    pub fn registered_index(&self) -> Option<u32> {
        self.registered_index.get()
    }

    #[inline]
    pub fn is_registered(&self) -> bool {
        self.registered_index.get().is_some()
    }

    /// Registry length, tombstones included
    pub fn listener_slots(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Live listener at `index`, or `None` for a tombstone or a dead shape
    pub fn listener(&self, index: u32) -> Option<Rc<Shape>> {
        self.listeners
            .borrow()
            .get(index as usize)
            .and_then(|slot| slot.as_ref())
            .and_then(Weak::upgrade)
    }

    /// Whether `index` was detached
    pub fn is_tombstone(&self, index: u32) -> bool {
        matches!(self.listeners.borrow().get(index as usize), Some(None))
    }

    /// Every listener still alive
    pub fn live_listeners(&self) -> Vec<Rc<Shape>> {
        self.listeners
            .borrow()
            .iter()
            .flatten()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Append `shape`, or reuse a tombstone once the registry is large
    ///
    /// A tombstone's former owner already dropped its index, so handing the
    /// slot to a new listener cannot revive a stale registration. Entries
    /// whose shape died are turned into tombstones when the vector is full.
    fn add_listener(&self, shape: &Rc<Shape>) -> u32 {
        let mut listeners = self.listeners.borrow_mut();
        let entry = Some(Rc::downgrade(shape));
        if listeners.len() >= MIN_REUSE_SLOTS {
            if self.free.get() == 0 && listeners.len() == listeners.capacity() {
                let mut dead = 0;
                for slot in listeners.iter_mut() {
                    if slot.as_ref().is_some_and(|w| w.strong_count() == 0) {
                        *slot = None;
                        dead += 1;
                    }
                }
                self.free.set(dead);
            }
            if self.free.get() > 0 {
                if let Some(index) = listeners.iter().position(Option::is_none) {
                    listeners[index] = entry;
                    self.free.set(self.free.get() - 1);
                    return index as u32;
                }
            }
        }
        listeners.push(entry);
        (listeners.len() - 1) as u32
    }

    fn tombstone(&self, index: u32) {
        if let Some(slot) = self.listeners.borrow_mut().get_mut(index as usize) {
            if slot.take().is_some() {
                self.free.set(self.free.get() + 1);
            }
        }
    }
}

impl Trace for ChangeDetails {
    /// Registries only hold weak references; nothing is kept alive
    fn trace(&self, _tracer: &mut dyn Tracer) {}
}

impl fmt::Debug for ChangeDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots: Vec<_> = self
            .listeners
            .borrow()
            .iter()
            .map(|slot| slot.as_ref().and_then(Weak::upgrade).map(|s| s.id()))
            .collect();
        f.debug_struct("ChangeDetails")
            .field("registered_index", &self.registered_index.get())
            .field("listeners", &slots)
            .finish()
    }
}

fn ensure_details(shape: &Shape) -> Rc<ChangeDetails> {
    let mut details = shape.details.borrow_mut();
    Rc::clone(details.get_or_insert_with(Default::default))
}

/// Start tracking changes to `shape`'s prototype chain
///
/// Returns the shape's marker, replacing it with a fresh one if it already
/// flipped, and registers the shape on its chain.
pub fn enable_change_tracking(heap: &Heap, shape: &Rc<Shape>) -> Rc<ChangeMarker> {
    let marker = {
        let mut slot = shape.marker.borrow_mut();
        match slot.as_ref() {
            Some(marker) if !marker.has_changed() => Rc::clone(marker),
            _ => {
                let marker = ChangeMarker::new();
                *slot = Some(Rc::clone(&marker));
                marker
            }
        }
    };
    register_on_chain(heap, shape);
    marker
}

/// Register `shape` in its prototype's registry, then the prototype's shape
/// in its own prototype's, until reaching an already registered shape or the
/// end of the chain
pub fn register_on_chain(heap: &Heap, shape: &Rc<Shape>) {
    let mut current = Rc::clone(shape);
    loop {
        let details = ensure_details(&current);
        if details.is_registered() {
            break;
        }
        let Some(proto) = current.prototype() else {
            break;
        };
        let proto_shape = Rc::clone(heap.get(proto).shape());
        let index = ensure_details(&proto_shape).add_listener(&current);
        details.registered_index.set(Some(index));
        log::debug!(
            "registered shape {:?} at index {} under {:?}",
            current.id(),
            index,
            proto_shape.id()
        );
        current = proto_shape;
    }
}

/// Flip `shape`'s marker and every marker reachable through the listener
/// registries below it
///
/// Returns the number of shapes visited.
pub fn notice_through_chain(shape: &Rc<Shape>) -> usize {
    let mut visited = 0;
    let mut worklist = vec![Rc::clone(shape)];
    while let Some(current) = worklist.pop() {
        visited += 1;
        if let Some(marker) = current.marker.borrow().as_ref() {
            marker.set_changed();
        }
        if let Some(details) = current.details.borrow().as_ref() {
            worklist.extend(details.live_listeners());
        }
    }
    if visited > 1 {
        log::debug!("change under shape {:?} reached {} shapes", shape.id(), visited - 1);
    }
    visited
}

/// Tombstone `shape`'s entry in its prototype's registry
///
/// Registration is per level: the prototype's own registration is left
/// alone, other dependents may still rely on it.
pub fn unregister_on_chain(heap: &Heap, shape: &Shape) {
    let Some(details) = shape.change_details() else {
        return;
    };
    let Some(index) = details.registered_index.take() else {
        return;
    };
    if let Some(proto) = shape.prototype() {
        if heap.contains(proto) {
            if let Some(proto_details) = heap.get(proto).shape().change_details() {
                proto_details.tombstone(index);
            }
        }
    }
}

/// An object wearing the unique shape `old` now wears `new`
///
/// Moves the listener registry over so dependents keep being notified, and
/// re-registers under the (possibly different) prototype of `new` if `old`
/// was registered.
pub fn refresh_users(heap: &Heap, old: &Rc<Shape>, new: &Rc<Shape>) {
    let was_registered = old
        .change_details()
        .is_some_and(|details| details.is_registered());
    unregister_on_chain(heap, old);

    let details = old.details.borrow_mut().take();
    if let Some(details) = details {
        *new.details.borrow_mut() = Some(details);
    }
    if was_registered {
        register_on_chain(heap, new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::ObjectId;
    use crate::runtime::object::JSObject;
    use crate::runtime::shape::ShapeTable;

    /// Allocate an object wearing a prototype shape with the given prototype
    fn proto_object(heap: &mut Heap, shapes: &ShapeTable, proto: Option<ObjectId>) -> ObjectId {
        let shape = shapes.as_prototype(&shapes.with_prototype(&shapes.root(), proto));
        heap.alloc(JSObject::new(shape))
    }

    #[test]
    fn test_marker_is_sticky() {
        let marker = ChangeMarker::new();
        assert!(!marker.has_changed());
        marker.set_changed();
        marker.set_changed();
        assert!(marker.has_changed());
    }

    #[test]
    fn test_enable_registers_whole_chain() {
        let shapes = ShapeTable::new(4);
        let mut heap = Heap::new();
        let a = proto_object(&mut heap, &shapes, None);
        let b = proto_object(&mut heap, &shapes, Some(a));
        let c_shape = shapes.with_prototype(&shapes.root(), Some(b));

        let marker = enable_change_tracking(&heap, &c_shape);
        assert!(!marker.has_changed());

        let b_shape = Rc::clone(heap.get(b).shape());
        let a_shape = Rc::clone(heap.get(a).shape());
        assert_eq!(c_shape.change_details().unwrap().registered_index(), Some(0));
        assert_eq!(b_shape.change_details().unwrap().registered_index(), Some(0));
        assert!(Rc::ptr_eq(&a_shape.change_details().unwrap().listener(0).unwrap(), &b_shape));
        assert!(!a_shape.change_details().unwrap().is_registered());

        // Enabling again reuses the unflipped marker and registers nothing new
        let again = enable_change_tracking(&heap, &c_shape);
        assert!(Rc::ptr_eq(&marker, &again));
        assert_eq!(b_shape.change_details().unwrap().listener_slots(), 1);
    }

    #[test]
    fn test_notice_flips_descendants_only() {
        let shapes = ShapeTable::new(4);
        let mut heap = Heap::new();
        let a = proto_object(&mut heap, &shapes, None);
        let b = proto_object(&mut heap, &shapes, Some(a));
        let c_shape = shapes.with_prototype(&shapes.root(), Some(b));

        let b_shape = Rc::clone(heap.get(b).shape());
        let b_marker = enable_change_tracking(&heap, &b_shape);
        let c_marker = enable_change_tracking(&heap, &c_shape);

        notice_through_chain(&c_shape);
        assert!(c_marker.has_changed());
        assert!(!b_marker.has_changed());

        let a_shape = Rc::clone(heap.get(a).shape());
        assert_eq!(notice_through_chain(&a_shape), 3);
        assert!(b_marker.has_changed());

        let fresh = enable_change_tracking(&heap, &b_shape);
        assert!(!Rc::ptr_eq(&fresh, &b_marker));
        assert!(!fresh.has_changed());
    }

    #[test]
    fn test_rearm_after_flip_keeps_shape() {
        let shapes = ShapeTable::new(4);
        let mut heap = Heap::new();
        let p = proto_object(&mut heap, &shapes, None);
        let shape = shapes.with_prototype(&shapes.root(), Some(p));

        let stale = enable_change_tracking(&heap, &shape);
        let p_shape = Rc::clone(heap.get(p).shape());
        notice_through_chain(&p_shape);
        assert!(stale.has_changed());

        // Same shape, new marker, still a single registration
        let fresh = enable_change_tracking(&heap, &shape);
        assert!(!Rc::ptr_eq(&fresh, &stale));
        assert!(Rc::ptr_eq(&shape.change_marker().unwrap(), &fresh));
        assert_eq!(shape.change_details().unwrap().registered_index(), Some(0));
        assert_eq!(p_shape.change_details().unwrap().listener_slots(), 1);

        notice_through_chain(&p_shape);
        assert!(fresh.has_changed());
    }

    #[test]
    fn test_unregister_leaves_tombstone() {
        let shapes = ShapeTable::new(4);
        let mut heap = Heap::new();
        let p = proto_object(&mut heap, &shapes, None);
        let first = shapes.with_prototype(&shapes.root(), Some(p));
        let second = shapes.add_property(
            &first,
            crate::runtime::atom::Atom::from_raw(1),
            Default::default(),
        );

        enable_change_tracking(&heap, &first);
        enable_change_tracking(&heap, &second);
        unregister_on_chain(&heap, &first);

        let p_details = heap.get(p).shape().change_details().unwrap();
        assert!(p_details.is_tombstone(0));
        assert!(p_details.listener(1).is_some());
        assert_eq!(second.change_details().unwrap().registered_index(), Some(1));
        assert!(!first.change_details().unwrap().is_registered());
    }

    #[test]
    fn test_registry_reuses_tombstones() {
        let shapes = ShapeTable::new(4);
        let mut heap = Heap::new();
        let p = proto_object(&mut heap, &shapes, None);

        let kept: Vec<_> = (0..4).map(|_| shapes.blueprint(Some(p), 0)).collect();
        for shape in &kept {
            enable_change_tracking(&heap, shape);
        }
        let p_details = heap.get(p).shape().change_details().unwrap();
        assert_eq!(p_details.listener_slots(), 4);

        unregister_on_chain(&heap, &kept[1]);
        let late = shapes.blueprint(Some(p), 0);
        enable_change_tracking(&heap, &late);
        assert_eq!(late.change_details().unwrap().registered_index(), Some(1));
        assert_eq!(p_details.listener_slots(), 4);
        assert!(Rc::ptr_eq(&p_details.listener(1).unwrap(), &late));
        assert!(!kept[1].change_details().unwrap().is_registered());
    }

    #[test]
    fn test_registry_recycles_dead_listeners() {
        let shapes = ShapeTable::new(4);
        let mut heap = Heap::new();
        let p = proto_object(&mut heap, &shapes, None);
        let survivor = shapes.blueprint(Some(p), 0);
        enable_change_tracking(&heap, &survivor);

        for _ in 0..100 {
            let transient = shapes.blueprint(Some(p), 0);
            enable_change_tracking(&heap, &transient);
        }

        let p_details = heap.get(p).shape().change_details().unwrap();
        assert!(p_details.listener_slots() <= 8);
        assert_eq!(p_details.live_listeners().len(), 1);
        assert!(Rc::ptr_eq(&p_details.listener(0).unwrap(), &survivor));
    }

    #[test]
    fn test_refresh_users_moves_registry() {
        let shapes = ShapeTable::new(4);
        let mut heap = Heap::new();
        let p1 = proto_object(&mut heap, &shapes, None);
        let p2 = proto_object(&mut heap, &shapes, None);
        let o = proto_object(&mut heap, &shapes, Some(p1));
        let x_shape = shapes.with_prototype(&shapes.root(), Some(o));
        let marker = enable_change_tracking(&heap, &x_shape);

        let old = Rc::clone(heap.get(o).shape());
        let new = shapes.with_prototype(&old, Some(p2));
        notice_through_chain(&old);
        refresh_users(&heap, &old, &new);
        heap.get_mut(o).set_shape(Rc::clone(&new));

        assert!(marker.has_changed());
        let new_details = new.change_details().unwrap();
        assert_eq!(new_details.live_listeners().len(), 1);
        assert_eq!(new_details.registered_index(), Some(0));
        assert!(heap.get(p1).shape().change_details().unwrap().is_tombstone(0));
        assert!(heap.get(p2).shape().change_details().unwrap().listener(0).is_some());
        assert!(old.change_details().is_none());
    }
}
