//! Property lookup state
//!
//! An [`ObjectOperator`] resolves one `(receiver, key)` access to the object
//! physically holding the property (the holder) and the slot it lives in.
//! It walks the prototype chain starting at the holder:
//!
//! 1. index keys search element storage, named keys search the shape (fast
//!    mode) or the dictionary
//! 2. on a miss the prototype becomes the holder and the access is marked
//!    as found on a prototype
//! 3. at the end of the chain the key is reported as not found, with default
//!    attributes
//!
//! The operator lives on the stack for a single operation and never outlives
//! it; writes that change the receiver's shape make it search the receiver again.

use crate::gc::{Heap, ObjectId};
use crate::runtime::atom::PropertyKey;
use crate::runtime::elements::Elements;
use crate::runtime::object::Properties;
use crate::runtime::property::PropertyAttributes;
use crate::runtime::shape::ShapeId;
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct OperatorFlags {
    /// Found in shape-described or fast element storage
    fast: bool,
    /// Holder is not the object the lookup started from
    on_prototype: bool,
    /// Receiver was given explicitly
    has_receiver: bool,
    /// Receiver lacks the key and is extensible: a write adds a property
    transition: bool,
}

/// Per-operation lookup state
#[derive(Debug, Clone)]
pub struct ObjectOperator {
    key: PropertyKey,
    holder: ObjectId,
    receiver: Value,
    /// Slot offset (fast named), element index or enumeration index; `None`
    /// when not found
    index: Option<u32>,
    attrs: PropertyAttributes,
    value: Option<Value>,
    flags: OperatorFlags,
    /// Receiver's shape when the lookup ran
    receiver_shape: Option<ShapeId>,
}

impl ObjectOperator {
    fn start(heap: &Heap, holder: ObjectId, key: PropertyKey, receiver: Value) -> Self {
        let receiver_shape = receiver
            .to_object()
            .filter(|&id| heap.contains(id))
            .map(|id| heap.get(id).shape().id());
        ObjectOperator {
            key,
            holder,
            receiver,
            index: None,
            attrs: PropertyAttributes::not_found(),
            value: None,
            flags: OperatorFlags::default(),
            receiver_shape,
        }
    }

    /// Look `key` up on `holder` and its prototype chain, with `holder` as
    /// receiver
    pub fn new(heap: &Heap, holder: ObjectId, key: PropertyKey) -> Self {
        let mut op = Self::start(heap, holder, key, Value::object(holder));
        op.walk_chain(heap, holder);
        op
    }

    /// Look `key` up on `holder` and its prototype chain on behalf of
    /// `receiver` (accessors run with `this = receiver`)
    pub fn with_receiver(heap: &Heap, holder: ObjectId, key: PropertyKey, receiver: Value) -> Self {
        let mut op = Self::start(heap, holder, key, receiver);
        op.flags.has_receiver = true;
        op.walk_chain(heap, holder);
        op
    }

    /// Search `obj`'s own storage only
    pub fn own(heap: &Heap, obj: ObjectId, key: PropertyKey) -> Self {
        let mut op = Self::start(heap, obj, key, Value::object(obj));
        op.search_own(heap, obj);
        op
    }

    /// Lookup of a global binding
    ///
    /// The global object's own dictionary is consulted first, then its
    /// prototype chain.
    pub fn global(heap: &Heap, global: ObjectId, key: PropertyKey) -> Self {
        let mut op = Self::start(heap, global, key, Value::object(global));
        let own_hit = match (heap.get(global).dictionary(), key) {
            (Some(dict), PropertyKey::Atom(atom)) => dict.get(&atom).map(|e| (e.enum_index(), e.attrs, e.value)),
            _ => None,
        };
        if let Some((index, attrs, value)) = own_hit {
            op.record(index, attrs, Some(value), false);
            return op;
        }
        if op.search_own(heap, global) {
            return op;
        }
        match heap.get(global).prototype() {
            Some(proto) => {
                op.flags.on_prototype = true;
                op.walk_chain(heap, proto);
            }
            None => op.not_found(),
        }
        op
    }

    fn walk_chain(&mut self, heap: &Heap, start: ObjectId) {
        let mut current = start;
        loop {
            if self.search_own(heap, current) {
                return;
            }
            match heap.get(current).prototype() {
                Some(proto) => {
                    current = proto;
                    self.flags.on_prototype = true;
                }
                None => {
                    self.not_found();
                    return;
                }
            }
        }
    }

    /// Search one object's own storage, making it the holder on a hit
    fn search_own(&mut self, heap: &Heap, obj: ObjectId) -> bool {
        let object = heap.get(obj);
        let hit = match self.key {
            PropertyKey::Index(index) => {
                let fast = matches!(object.elements(), Elements::Fast(_));
                object
                    .elements()
                    .get(index)
                    .map(|(value, attrs)| (index, attrs, Some(value), fast))
            }
            PropertyKey::Atom(atom) => match object.properties() {
                Properties::Fast(_) => object
                    .shape()
                    .lookup(atom)
                    .map(|attrs| (attrs.offset(), attrs, None, true)),
                Properties::Dictionary(dict) => dict
                    .get(&atom)
                    .map(|e| (e.enum_index(), e.attrs, Some(e.value), false)),
            },
        };
        match hit {
            Some((index, attrs, value, fast)) => {
                self.holder = obj;
                self.record(index, attrs, value, fast);
                true
            }
            None => false,
        }
    }

    fn record(&mut self, index: u32, attrs: PropertyAttributes, value: Option<Value>, fast: bool) {
        self.index = Some(index);
        self.attrs = attrs;
        self.value = value;
        self.flags.fast = fast;
    }

    fn not_found(&mut self) {
        self.index = None;
        self.attrs = PropertyAttributes::not_found();
        self.value = None;
        self.flags.fast = false;
    }

    /// Forget the cached result and search the receiver's own storage
    ///
    /// Used when a write must land on the receiver after the property was
    /// found elsewhere, and when the receiver's shape changed since lookup.
    /// A miss on an extensible receiver marks the access as a transition.
    pub fn relookup_in_receiver(&mut self, heap: &Heap) {
        self.not_found();
        self.flags.on_prototype = false;
        self.flags.transition = false;
        let Some(receiver) = self.receiver.to_object() else {
            return;
        };
        self.holder = receiver;
        self.receiver_shape = Some(heap.get(receiver).shape().id());
        if !self.search_own(heap, receiver) {
            self.flags.transition = heap.get(receiver).is_extensible();
        }
    }

    /// Whether the receiver's shape differs from the one seen at lookup
    pub fn receiver_shape_changed(&self, heap: &Heap) -> bool {
        match self.receiver.to_object() {
            Some(id) => self.receiver_shape != Some(heap.get(id).shape().id()),
            None => false,
        }
    }

    /// Value of the found property (the accessor pair for accessors)
    ///
    /// Fast named values are read from the holder on first use.
    pub fn value(&mut self, heap: &Heap) -> Value {
        if let Some(value) = self.value {
            return value;
        }
        let value = if self.is_found() && self.flags.fast {
            heap.get(self.holder).read_slot(self.attrs)
        } else {
            Value::undefined()
        };
        self.value = Some(value);
        value
    }

    #[inline]
    pub fn key(&self) -> PropertyKey {
        self.key
    }

    /// Element index, for index keys
    #[inline]
    pub fn element_index(&self) -> Option<u32> {
        self.key.as_index()
    }

    /// Object the property was found on (the start object when not found)
    #[inline]
    pub fn holder(&self) -> ObjectId {
        self.holder
    }

    #[inline]
    pub fn receiver(&self) -> Value {
        self.receiver
    }

    #[inline]
    pub fn index(&self) -> Option<u32> {
        self.index
    }

    #[inline]
    pub fn is_found(&self) -> bool {
        self.index.is_some()
    }

    #[inline]
    pub fn attributes(&self) -> PropertyAttributes {
        self.attrs
    }

    #[inline]
    pub fn is_accessor(&self) -> bool {
        self.is_found() && self.attrs.is_accessor()
    }

    #[inline]
    pub fn is_fast_mode(&self) -> bool {
        self.flags.fast
    }

    #[inline]
    pub fn is_on_prototype(&self) -> bool {
        self.flags.on_prototype
    }

    #[inline]
    pub fn has_receiver(&self) -> bool {
        self.flags.has_receiver
    }

    /// Holder and receiver are the same object
    #[inline]
    pub fn holder_is_receiver(&self) -> bool {
        self.receiver.to_object() == Some(self.holder)
    }

    /// A write through this operator adds a new own property
    #[inline]
    pub fn is_transition(&self) -> bool {
        self.flags.transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ObjectModelConfig;
    use crate::runtime::atom::Atom;
    use crate::runtime::object::JSObject;
    use crate::runtime::shape::ShapeTable;

    struct Fixture {
        shapes: ShapeTable,
        heap: Heap,
        config: ObjectModelConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                shapes: ShapeTable::new(4),
                heap: Heap::new(),
                config: ObjectModelConfig::default(),
            }
        }

        fn object(&mut self, proto: Option<ObjectId>, keys: &[(u32, i32)]) -> ObjectId {
            let mut shape = self.shapes.with_prototype(&self.shapes.root(), proto);
            let mut obj = JSObject::new(shape.clone());
            for &(key, value) in keys {
                shape = self.shapes.add_property(&shape, Atom::from_raw(key), PropertyAttributes::default());
                obj.add_fast(&self.config, shape.clone(), Value::int(value));
            }
            self.heap.alloc(obj)
        }
    }

    fn named(raw: u32) -> PropertyKey {
        PropertyKey::Atom(Atom::from_raw(raw))
    }

    #[test]
    fn test_own_hit() {
        let mut fx = Fixture::new();
        let obj = fx.object(None, &[(1, 10), (2, 20)]);

        let mut op = ObjectOperator::new(&fx.heap, obj, named(2));
        assert!(op.is_found());
        assert!(op.is_fast_mode());
        assert!(!op.is_on_prototype());
        assert!(op.holder_is_receiver());
        assert_eq!(op.index(), Some(1));
        assert_eq!(op.value(&fx.heap), Value::int(20));
    }

    #[test]
    fn test_chain_walk() {
        let mut fx = Fixture::new();
        let grandparent = fx.object(None, &[(1, 1)]);
        let parent = fx.object(Some(grandparent), &[(2, 2)]);
        let child = fx.object(Some(parent), &[(3, 3)]);

        let mut op = ObjectOperator::new(&fx.heap, child, named(1));
        assert!(op.is_found());
        assert!(op.is_on_prototype());
        assert_eq!(op.holder(), grandparent);
        assert!(!op.holder_is_receiver());
        assert_eq!(op.receiver(), Value::object(child));
        assert_eq!(op.value(&fx.heap), Value::int(1));

        let op = ObjectOperator::new(&fx.heap, child, named(3));
        assert_eq!(op.holder(), child);
        assert!(op.holder_is_receiver());
    }

    #[test]
    fn test_not_found_reports_defaults() {
        let mut fx = Fixture::new();
        let parent = fx.object(None, &[]);
        let child = fx.object(Some(parent), &[]);

        let mut op = ObjectOperator::new(&fx.heap, child, named(9));
        assert!(!op.is_found());
        assert_eq!(op.index(), None);
        assert_eq!(op.attributes(), PropertyAttributes::not_found());
        assert_eq!(op.value(&fx.heap), Value::undefined());
    }

    #[test]
    fn test_own_does_not_walk() {
        let mut fx = Fixture::new();
        let parent = fx.object(None, &[(1, 1)]);
        let child = fx.object(Some(parent), &[]);
        assert!(!ObjectOperator::own(&fx.heap, child, named(1)).is_found());
    }

    #[test]
    fn test_element_path() {
        let mut fx = Fixture::new();
        let obj = fx.object(None, &[]);
        fx.heap.get_mut(obj).elements_mut().put(
            &fx.config,
            3,
            Value::int(33),
            PropertyAttributes::default(),
        );

        let mut op = ObjectOperator::new(&fx.heap, obj, PropertyKey::Index(3));
        assert_eq!(op.element_index(), Some(3));
        assert!(op.is_found());
        assert!(op.is_fast_mode());
        assert_eq!(op.value(&fx.heap), Value::int(33));
        assert!(!ObjectOperator::new(&fx.heap, obj, PropertyKey::Index(2)).is_found());
    }

    #[test]
    fn test_relookup_in_receiver() {
        let mut fx = Fixture::new();
        let parent = fx.object(None, &[(1, 1)]);
        let child = fx.object(Some(parent), &[]);

        let mut op = ObjectOperator::with_receiver(&fx.heap, child, named(1), Value::object(child));
        assert!(op.has_receiver());
        assert!(op.is_on_prototype());
        assert!(!op.receiver_shape_changed(&fx.heap));

        let shape = fx
            .shapes
            .add_property(fx.heap.get(child).shape(), Atom::from_raw(1), PropertyAttributes::default());
        fx.heap.get_mut(child).add_fast(&fx.config, shape, Value::int(5));
        assert!(op.receiver_shape_changed(&fx.heap));

        op.relookup_in_receiver(&fx.heap);
        assert!(op.is_found());
        assert!(!op.is_on_prototype());
        assert_eq!(op.holder(), child);
        assert_eq!(op.value(&fx.heap), Value::int(5));
        assert!(!op.receiver_shape_changed(&fx.heap));
        assert!(!op.is_transition());
    }

    #[test]
    fn test_relookup_miss_marks_transition() {
        let mut fx = Fixture::new();
        let parent = fx.object(None, &[(1, 1)]);
        let child = fx.object(Some(parent), &[]);

        let mut op = ObjectOperator::new(&fx.heap, child, named(1));
        assert!(!op.is_transition());
        op.relookup_in_receiver(&fx.heap);
        assert!(!op.is_found());
        assert!(op.is_transition());

        let sealed = fx.shapes.prevent_extensions(fx.heap.get(child).shape());
        fx.heap.get_mut(child).set_shape(sealed);
        let mut op = ObjectOperator::new(&fx.heap, child, named(1));
        op.relookup_in_receiver(&fx.heap);
        assert!(!op.is_found());
        assert!(!op.is_transition());
    }

    #[test]
    fn test_global_checks_dictionary_first() {
        let mut fx = Fixture::new();
        let proto = fx.object(None, &[(1, 100)]);
        let shape = fx.shapes.with_prototype(&fx.shapes.root(), Some(proto));
        let shape = fx.shapes.to_dictionary(&shape);
        let mut global = JSObject::new(shape);
        global
            .dictionary_mut()
            .unwrap()
            .insert(Atom::from_raw(1), Value::int(1), PropertyAttributes::default());
        let global = fx.heap.alloc(global);

        let mut op = ObjectOperator::global(&fx.heap, global, named(1));
        assert!(!op.is_on_prototype());
        assert!(!op.is_fast_mode());
        assert_eq!(op.value(&fx.heap), Value::int(1));

        let op = ObjectOperator::global(&fx.heap, global, named(7));
        assert!(!op.is_found());
        assert!(op.is_on_prototype());
    }
}
