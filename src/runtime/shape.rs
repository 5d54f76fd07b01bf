//! Shapes (hidden classes)
//!
//! A shape describes the layout of every object wearing it: the prototype,
//! the named properties in insertion order with their attributes and slot
//! offsets, the element storage kind and extensibility.
//!
//! Shared shapes form a DAG rooted at the empty root shape or a per
//! constructor blueprint. Each edge adds one property (or changes the
//! prototype, extensibility or element kind) and is memoized in the parent,
//! so objects built the same way converge on one shape:
//!
//! ```text
//!        root
//!        /  \
//!     +x      +y
//!      |       |
//!     +y      +x
//!  {x, y}    {y, x}
//! ```
//!
//! Parents hold their children weakly; children hold their parent strongly.
//!
//! Two kinds of shapes are unique to one object and never memoized:
//! - dictionary shapes, whose layout lives in the object's own dictionary
//! - prototype shapes, worn by objects that some shape uses as prototype
//!
//! Changing a unique shape produces a fresh unique copy.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::config::ObjectModelConfig;
use crate::gc::{ObjectId, Trace, Tracer};
use crate::runtime::atom::Atom;
use crate::runtime::property::PropertyAttributes;
use crate::runtime::proto_change::{ChangeDetails, ChangeMarker};

/// Unique identifier of a shape, used as inline cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ShapeId(u32);

impl ShapeId {
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Storage class of an object's indexed properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ElementsKind {
    /// Holey vector indexed by element index
    #[default]
    Fast,
    /// Per-object hash table
    Dictionary,
}

/// Label of a memoized edge in the shape DAG
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKey {
    /// Add a named property with the given attribute flags
    Property(Atom, u8),
    /// Re-point the prototype
    Prototype(Option<ObjectId>),
    PreventExtensions,
    DictionaryElements,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ShapeFlags {
    extensible: bool,
    dictionary: bool,
    prototype: bool,
}

/// Immutable layout descriptor
pub struct Shape {
    id: ShapeId,
    parent: Option<Rc<Shape>>,
    prototype: Option<ObjectId>,
    /// Named properties in insertion order
    layout: Vec<(Atom, PropertyAttributes)>,
    /// Key to position in `layout`
    index: FxHashMap<Atom, u32>,
    inlined_capacity: u32,
    elements_kind: ElementsKind,
    flags: ShapeFlags,
    transitions: RefCell<FxHashMap<TransitionKey, Weak<Shape>>>,
    pub(crate) marker: RefCell<Option<Rc<ChangeMarker>>>,
    pub(crate) details: RefCell<Option<Rc<ChangeDetails>>>,
}

impl Shape {
    fn new_root(id: ShapeId, prototype: Option<ObjectId>, inlined_capacity: u32) -> Self {
        Shape {
            id,
            parent: None,
            prototype,
            layout: Vec::new(),
            index: FxHashMap::default(),
            inlined_capacity,
            elements_kind: ElementsKind::Fast,
            flags: ShapeFlags {
                extensible: true,
                dictionary: false,
                prototype: false,
            },
            transitions: RefCell::new(FxHashMap::default()),
            marker: RefCell::new(None),
            details: RefCell::new(None),
        }
    }

    /// Structural copy with a fresh identity and no transitions, marker or
    /// change details
    fn derive(self: &Rc<Self>, id: ShapeId) -> Self {
        let parent = if self.is_unique() {
            self.parent.clone()
        } else {
            Some(Rc::clone(self))
        };
        Shape {
            id,
            parent,
            prototype: self.prototype,
            layout: self.layout.clone(),
            index: self.index.clone(),
            inlined_capacity: self.inlined_capacity,
            elements_kind: self.elements_kind,
            flags: self.flags,
            transitions: RefCell::new(FxHashMap::default()),
            marker: RefCell::new(None),
            details: RefCell::new(None),
        }
    }

    #[inline]
    pub fn id(&self) -> ShapeId {
        self.id
    }

    #[inline]
    pub fn parent(&self) -> Option<&Rc<Shape>> {
        self.parent.as_ref()
    }

    #[inline]
    pub fn prototype(&self) -> Option<ObjectId> {
        self.prototype
    }

    /// Attributes of a named property, including its slot location
    #[inline]
    pub fn lookup(&self, key: Atom) -> Option<PropertyAttributes> {
        self.index.get(&key).map(|&i| self.layout[i as usize].1)
    }

    /// Named properties in insertion order
    pub fn properties(&self) -> impl Iterator<Item = (Atom, PropertyAttributes)> + '_ {
        self.layout.iter().copied()
    }

    /// Number of named properties described by this shape
    #[inline]
    pub fn property_count(&self) -> u32 {
        self.layout.len() as u32
    }

    #[inline]
    pub fn inlined_capacity(&self) -> u32 {
        self.inlined_capacity
    }

    /// Slots needed out of line for the current layout
    #[inline]
    pub fn out_of_line_count(&self) -> u32 {
        self.property_count().saturating_sub(self.inlined_capacity)
    }

    #[inline]
    pub fn elements_kind(&self) -> ElementsKind {
        self.elements_kind
    }

    #[inline]
    pub fn is_extensible(&self) -> bool {
        self.flags.extensible
    }

    /// Named properties live in the object's dictionary
    #[inline]
    pub fn is_dictionary(&self) -> bool {
        self.flags.dictionary
    }

    /// Worn by an object used as a prototype
    #[inline]
    pub fn is_prototype(&self) -> bool {
        self.flags.prototype
    }

    /// Owned by a single object and never memoized
    #[inline]
    pub fn is_unique(&self) -> bool {
        self.flags.dictionary || self.flags.prototype
    }

    /// Current change marker, if change tracking was ever enabled
    pub fn change_marker(&self) -> Option<Rc<ChangeMarker>> {
        self.marker.borrow().clone()
    }

    /// Change details (registry position and listeners), if any
    pub fn change_details(&self) -> Option<Rc<ChangeDetails>> {
        self.details.borrow().clone()
    }

    /// Number of live memoized edges out of this shape
    pub fn transition_count(&self) -> usize {
        self.transitions
            .borrow()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    fn cached_transition(&self, key: &TransitionKey) -> Option<Rc<Shape>> {
        self.transitions.borrow().get(key).and_then(Weak::upgrade)
    }

    fn remember_transition(&self, key: TransitionKey, child: &Rc<Shape>) {
        let mut transitions = self.transitions.borrow_mut();
        let len = transitions.len();
        if len >= 8 && len.is_power_of_two() {
            transitions.retain(|_, w| w.strong_count() > 0);
        }
        transitions.insert(key, Rc::downgrade(child));
    }
}

impl Trace for Shape {
    fn trace(&self, tracer: &mut dyn Tracer) {
        // Ancestors stay reachable through memoized edges, so their
        // prototypes must stay alive too.
        let mut shape = Some(self);
        while let Some(s) = shape {
            if let Some(proto) = s.prototype {
                tracer.mark_object(proto);
            }
            shape = s.parent.as_deref();
        }
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("id", &self.id)
            .field("prototype", &self.prototype)
            .field("layout", &self.layout)
            .field("inlined_capacity", &self.inlined_capacity)
            .field("elements_kind", &self.elements_kind)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Creates shapes and memoizes transitions between them
pub struct ShapeTable {
    next_id: Cell<u32>,
    root: Rc<Shape>,
    max_inlined_capacity: u32,
}

impl ShapeTable {
    /// Create a table whose root shape reserves `default_inlined` inline slots
    pub fn new(default_inlined: u32) -> Self {
        let config = ObjectModelConfig::default();
        ShapeTable {
            next_id: Cell::new(1),
            root: Rc::new(Shape::new_root(ShapeId(0), None, default_inlined)),
            max_inlined_capacity: config.max_inlined_capacity.max(default_inlined),
        }
    }

    pub fn with_config(config: &ObjectModelConfig) -> Self {
        let mut table = Self::new(config.default_inlined_capacity);
        table.max_inlined_capacity = config.max_inlined_capacity.max(config.default_inlined_capacity);
        table
    }

    /// The shared empty shape with a null prototype
    #[inline]
    pub fn root(&self) -> Rc<Shape> {
        Rc::clone(&self.root)
    }

    /// Number of shapes created so far
    pub fn shapes_created(&self) -> u32 {
        self.next_id.get()
    }

    fn next_id(&self) -> ShapeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        ShapeId(id)
    }

    /// Fresh empty root for one constructor
    ///
    /// Requests above the configured maximum are clamped; the overflow is
    /// stored out of line.
    pub fn blueprint(&self, prototype: Option<ObjectId>, inlined_capacity: u32) -> Rc<Shape> {
        let inlined = inlined_capacity.min(self.max_inlined_capacity);
        if inlined < inlined_capacity {
            log::debug!(
                "blueprint inline capacity {} clamped to {}",
                inlined_capacity,
                inlined
            );
        }
        Rc::new(Shape::new_root(self.next_id(), prototype, inlined))
    }

    /// Follow a memoized edge out of a shared shape, or derive a fresh unique
    /// copy of a unique one
    fn transition(
        &self,
        shape: &Rc<Shape>,
        key: TransitionKey,
        edit: impl FnOnce(&mut Shape),
    ) -> Rc<Shape> {
        if !shape.is_unique() {
            if let Some(child) = shape.cached_transition(&key) {
                return child;
            }
        }

        let mut child = shape.derive(self.next_id());
        edit(&mut child);
        let child = Rc::new(child);

        #[cfg(feature = "trace-transitions")]
        log::trace!("shape {:?} --{:?}--> {:?}", shape.id, key, child.id);

        if !shape.is_unique() {
            shape.remember_transition(key, &child);
        }
        child
    }

    /// Shape with one more named property
    ///
    /// The new property takes the next offset and is inlined while the
    /// offset is below the inline capacity.
    pub fn add_property(
        &self,
        shape: &Rc<Shape>,
        key: Atom,
        attrs: PropertyAttributes,
    ) -> Rc<Shape> {
        debug_assert!(!shape.is_dictionary(), "dictionary shapes have no layout");
        debug_assert!(shape.lookup(key).is_none(), "property already present");

        let flags = attrs.flags_only();
        self.transition(shape, TransitionKey::Property(key, flags.flag_bits()), |child| {
            let offset = child.layout.len() as u32;
            let attrs = flags.with_location(offset, offset < child.inlined_capacity);
            child.index.insert(key, offset);
            child.layout.push((key, attrs));
        })
    }

    /// Same layout with a different prototype
    pub fn with_prototype(&self, shape: &Rc<Shape>, prototype: Option<ObjectId>) -> Rc<Shape> {
        self.transition(shape, TransitionKey::Prototype(prototype), |child| {
            child.prototype = prototype;
        })
    }

    /// Same layout, no new properties allowed
    pub fn prevent_extensions(&self, shape: &Rc<Shape>) -> Rc<Shape> {
        self.transition(shape, TransitionKey::PreventExtensions, |child| {
            child.flags.extensible = false;
        })
    }

    /// Same layout with elements in dictionary mode
    pub fn with_dictionary_elements(&self, shape: &Rc<Shape>) -> Rc<Shape> {
        self.transition(shape, TransitionKey::DictionaryElements, |child| {
            child.elements_kind = ElementsKind::Dictionary;
        })
    }

    /// Unique shape whose named properties live in the object's dictionary
    pub fn to_dictionary(&self, shape: &Rc<Shape>) -> Rc<Shape> {
        let mut child = shape.derive(self.next_id());
        child.layout.clear();
        child.index.clear();
        child.inlined_capacity = 0;
        child.flags.dictionary = true;
        Rc::new(child)
    }

    /// Unique copy flagged as a prototype shape
    ///
    /// A shape that already is a prototype shape is returned as is.
    pub fn as_prototype(&self, shape: &Rc<Shape>) -> Rc<Shape> {
        if shape.is_prototype() {
            return Rc::clone(shape);
        }
        let mut child = shape.derive(self.next_id());
        child.flags.prototype = true;
        Rc::new(child)
    }
}

/// Growth for a fast element vector that must hold `min_len` elements
pub fn compute_element_capacity(config: &ObjectModelConfig, old: u32, min_len: u32) -> u32 {
    let grown = old.saturating_add(old / 2);
    grown.max(min_len).max(config.element_min_capacity)
}

/// Growth for the out-of-line property vector
pub fn compute_property_capacity(config: &ObjectModelConfig, old: u32, min_len: u32) -> u32 {
    let grown = old.saturating_add(old / 2);
    grown.max(min_len).max(config.property_min_capacity)
}

/// Whether writing element `index` into a fast store of `capacity` should
/// switch the store to dictionary mode
pub fn should_trans_to_dict(config: &ObjectModelConfig, capacity: u32, index: u32) -> bool {
    if index < capacity {
        return false;
    }
    if index - capacity > config.element_max_gap {
        return true;
    }
    capacity >= config.element_sparse_floor
        && u64::from(index) >= u64::from(capacity) * u64::from(config.element_sparse_factor)
}

/// Whether adding one more named property to `count` existing ones should
/// switch the object to dictionary mode
#[inline]
pub fn should_use_dictionary(config: &ObjectModelConfig, count: u32) -> bool {
    count >= config.max_fast_properties
}
