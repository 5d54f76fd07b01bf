//! Object model context
//!
//! The Context is the main entry point: it owns the heap, the atom table,
//! the shape table, the tuning configuration and the intrinsic objects
//! (`Object.prototype`, `Function.prototype` and the global object).
//! Property operations live in `runtime::ops`.

use std::rc::{Rc, Weak};

use crate::config::ObjectModelConfig;
use crate::error::{ConfigError, JsError, JsResult};
use crate::gc::{GcStats, Heap, NoBarrier, ObjectId, WriteBarrier};
use crate::runtime::atom::{Atom, AtomTable, PropertyKey};
use crate::runtime::object::{JSObject, ObjectData};
use crate::runtime::proto_change::{self, ChangeMarker};
use crate::runtime::shape::{Shape, ShapeTable};
use crate::runtime::ClassId;
use crate::value::Value;

/// Object model context
pub struct Context {
    pub(crate) heap: Heap,
    pub(crate) atoms: AtomTable,
    pub(crate) shapes: ShapeTable,
    pub(crate) config: ObjectModelConfig,
    object_prototype: ObjectId,
    function_prototype: ObjectId,
    global: ObjectId,
    /// Values pinned by the embedder
    roots: Vec<Value>,
    /// Blueprints handed out by `create_blueprint`; their prototypes stay
    /// alive while the blueprint does
    pub(crate) blueprints: Vec<Weak<Shape>>,
}

impl Context {
    /// Create a context with the default configuration
    pub fn new() -> Self {
        Self::build(ObjectModelConfig::default(), Box::new(NoBarrier))
    }

    /// Create a context with a validated configuration
    pub fn with_config(config: ObjectModelConfig) -> Result<Self, ConfigError> {
        Self::with_barrier(config, Box::new(NoBarrier))
    }

    /// Create a context whose heap reports reference stores to `barrier`
    pub fn with_barrier(
        config: ObjectModelConfig,
        barrier: Box<dyn WriteBarrier>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, barrier))
    }

    fn build(config: ObjectModelConfig, barrier: Box<dyn WriteBarrier>) -> Self {
        let shapes = ShapeTable::with_config(&config);
        let mut heap = Heap::with_barrier(barrier);

        let root = shapes.root();
        let object_prototype = heap.alloc(JSObject::new(shapes.as_prototype(&root)));

        let shape = shapes.with_prototype(&root, Some(object_prototype));
        let function_prototype = heap.alloc(JSObject::new(shapes.as_prototype(&shape)));

        // Global bindings come and go at runtime, so the global object
        // starts out in dictionary mode.
        let global_shape = shapes.to_dictionary(&shape);
        let global = heap.alloc(JSObject::with_class(ClassId::Global, global_shape));

        log::debug!("context created with {:?}", config);
        Context {
            heap,
            atoms: AtomTable::new(),
            shapes,
            config,
            object_prototype,
            function_prototype,
            global,
            roots: Vec::new(),
            blueprints: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &ObjectModelConfig {
        &self.config
    }

    #[inline]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    #[inline]
    pub fn shapes(&self) -> &ShapeTable {
        &self.shapes
    }

    #[inline]
    pub fn atoms(&self) -> &AtomTable {
        &self.atoms
    }

    /// Borrow an object
    #[inline]
    pub fn object(&self, id: ObjectId) -> &JSObject {
        self.heap.get(id)
    }

    /// Current shape of an object
    pub fn shape_of(&self, id: ObjectId) -> Rc<Shape> {
        Rc::clone(self.heap.get(id).shape())
    }

    #[inline]
    pub fn object_prototype(&self) -> ObjectId {
        self.object_prototype
    }

    #[inline]
    pub fn function_prototype(&self) -> ObjectId {
        self.function_prototype
    }

    #[inline]
    pub fn global_object(&self) -> ObjectId {
        self.global
    }

    /// Intern a string
    pub fn intern(&mut self, s: &str) -> Atom {
        self.atoms.intern(s)
    }

    /// Create a new unique symbol
    pub fn symbol(&mut self, description: Option<&str>) -> Atom {
        self.atoms.symbol(description)
    }

    /// Property key for a string, normalizing canonical indices
    pub fn key(&mut self, s: &str) -> PropertyKey {
        self.atoms.key(s)
    }

    /// Printable form of a key
    pub fn key_name(&self, key: PropertyKey) -> String {
        self.atoms.display(key)
    }

    /// Keep `value` alive across collections
    pub fn pin(&mut self, value: Value) {
        if value.is_object() {
            self.roots.push(value);
        }
    }

    /// Drop one pin of `value`; returns false if it was not pinned
    pub fn unpin(&mut self, value: Value) -> bool {
        match self.roots.iter().rposition(|&v| v == value) {
            Some(pos) => {
                self.roots.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Collect garbage, keeping intrinsics and pinned values alive
    pub fn gc(&mut self) -> GcStats {
        self.gc_with_roots(&[])
    }

    /// Collect garbage with extra roots (e.g. the interpreter's stack)
    pub fn gc_with_roots(&mut self, extra: &[Value]) -> GcStats {
        self.blueprints.retain(|shape| shape.strong_count() > 0);

        let mut roots = Vec::with_capacity(3 + self.roots.len() + self.blueprints.len() + extra.len());
        roots.push(Value::object(self.object_prototype));
        roots.push(Value::object(self.function_prototype));
        roots.push(Value::object(self.global));
        roots.extend_from_slice(&self.roots);
        roots.extend(
            self.blueprints
                .iter()
                .filter_map(Weak::upgrade)
                .filter_map(|shape| shape.prototype())
                .map(Value::object),
        );
        roots.extend_from_slice(extra);
        self.heap.collect(&roots)
    }

    /// Call a function object
    pub fn call(&mut self, func: Value, this: Value, args: &[Value]) -> JsResult<Value> {
        let native = match func.to_object().map(|id| *self.heap.get(id).data()) {
            Some(ObjectData::NativeFunction(native)) => native,
            _ => return Err(JsError::type_error(format!("{} is not a function", func))),
        };
        native.call(self, this, args)
    }

    /// Start tracking changes to `obj`'s prototype chain
    ///
    /// The marker flips once anything on the chain changes layout; tracking
    /// again afterwards yields a fresh marker.
    pub fn enable_change_tracking(&mut self, obj: ObjectId) -> Rc<ChangeMarker> {
        let shape = Rc::clone(self.heap.get(obj).shape());
        proto_change::enable_change_tracking(&self.heap, &shape)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_creation() {
        let ctx = Context::new();
        let global = ctx.object(ctx.global_object());
        assert_eq!(global.class_id(), ClassId::Global);
        assert!(global.is_dictionary_mode());
        assert_eq!(global.prototype(), Some(ctx.object_prototype()));

        assert!(ctx.shape_of(ctx.object_prototype()).is_prototype());
        assert_eq!(
            ctx.object(ctx.function_prototype()).prototype(),
            Some(ctx.object_prototype())
        );
        assert_eq!(ctx.heap().live_objects(), 3);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ObjectModelConfig::default().with_max_fast_properties(0);
        assert!(Context::with_config(config).is_err());
    }

    #[test]
    fn test_keys() {
        let mut ctx = Context::new();
        assert_eq!(ctx.key("12"), PropertyKey::Index(12));
        let x = ctx.key("x");
        assert_eq!(ctx.key_name(x), "x");
        assert_eq!(ctx.key("x"), x);
        let sym = ctx.symbol(Some("s"));
        assert!(sym.is_symbol());
        assert_ne!(ctx.symbol(Some("s")), sym);
    }

    #[test]
    fn test_call_non_function() {
        let mut ctx = Context::new();
        let err = ctx.call(Value::int(1), Value::undefined(), &[]).unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_gc_respects_pins() {
        let mut ctx = Context::new();
        let proto = ctx.object_prototype();
        let kept = ctx.create_object(Some(proto));
        ctx.create_object(Some(proto));
        ctx.pin(Value::object(kept));

        let stats = ctx.gc();
        assert_eq!(stats.freed, 1);
        assert!(ctx.heap().contains(kept));

        assert!(ctx.unpin(Value::object(kept)));
        assert!(!ctx.unpin(Value::object(kept)));
        assert_eq!(ctx.gc().freed, 1);
    }
}
