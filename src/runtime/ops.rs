//! Property operations
//!
//! The internal methods of ordinary objects (`[[Get]]`, `[[Set]]`,
//! `[[HasProperty]]`, `[[Delete]]`, `[[DefineOwnProperty]]`,
//! `[[OwnPropertyKeys]]`, ...) built on [`ObjectOperator`].
//!
//! Operations that may fail without throwing return `JsResult<bool>`:
//! `Ok(false)` means the caller decides whether to throw. Every call into a
//! getter or setter is followed by `?` so an exception unwinds immediately.
//!
//! Layout changes on an object wearing a unique shape (a prototype or a
//! dictionary shape) notify the shapes depending on it; see
//! `runtime::proto_change`.

use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::context::Context;
use crate::error::{JsError, JsResult};
use crate::gc::ObjectId;
use crate::runtime::atom::PropertyKey;
use crate::runtime::function::{NativeFn, NativeFunction};
use crate::runtime::object::{ClassId, JSObject, ObjectData};
use crate::runtime::operator::ObjectOperator;
use crate::runtime::property::{PropertyAttributes, PropertyDescriptor};
use crate::runtime::proto_change::{notice_through_chain, refresh_users, register_on_chain};
use crate::runtime::shape::{should_use_dictionary, ElementsKind, Shape};
use crate::value::Value;

/// Target of `Object.seal` / `Object.freeze`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityLevel {
    Sealed,
    Frozen,
}

impl Context {
    // ------------------------------------------------------------------
    // Object creation
    // ------------------------------------------------------------------

    /// Create an ordinary object with the given prototype
    ///
    /// Objects created with the same prototype start out sharing a shape.
    pub fn create_object(&mut self, proto: Option<ObjectId>) -> ObjectId {
        if let Some(proto) = proto {
            self.make_prototype(proto);
        }
        let shape = self.shapes.with_prototype(&self.shapes.root(), proto);
        self.heap.alloc(JSObject::new(shape))
    }

    /// Create a plain `{}` inheriting from `Object.prototype`
    pub fn new_object(&mut self) -> ObjectId {
        self.create_object(Some(self.object_prototype()))
    }

    /// Fresh root shape for one constructor
    ///
    /// The prototype is kept alive for as long as the blueprint (or any
    /// object or shape derived from it) is.
    pub fn create_blueprint(&mut self, proto: Option<ObjectId>, inlined_capacity: u32) -> Rc<Shape> {
        if let Some(proto) = proto {
            self.make_prototype(proto);
        }
        let blueprint = self.shapes.blueprint(proto, inlined_capacity);
        if proto.is_some() {
            self.blueprints.push(Rc::downgrade(&blueprint));
        }
        blueprint
    }

    /// Instantiate an object from a constructor's blueprint
    pub fn create_from_blueprint(&mut self, blueprint: &Rc<Shape>) -> ObjectId {
        if let Some(proto) = blueprint.prototype() {
            self.make_prototype(proto);
        }
        self.heap.alloc(JSObject::new(Rc::clone(blueprint)))
    }

    /// Create an array holding `values` at indices `0..values.len()`
    pub fn create_array(&mut self, values: &[Value]) -> ObjectId {
        let proto = self.object_prototype();
        self.make_prototype(proto);
        let shape = self.shapes.with_prototype(&self.shapes.root(), Some(proto));
        let mut array = JSObject::with_class(ClassId::Array, shape);
        for (index, &value) in values.iter().enumerate() {
            array.elements_mut().put(
                &self.config,
                index as u32,
                value,
                PropertyAttributes::default_data(),
            );
        }
        let id = self.heap.alloc(array);
        for &value in values {
            self.heap.write_barrier(id, value);
        }
        id
    }

    /// Create a host function object
    pub fn create_function(&mut self, func: NativeFn, name: &str, length: u32) -> ObjectId {
        let proto = self.function_prototype();
        self.make_prototype(proto);
        let name = self.intern(name);
        let shape = self.shapes.with_prototype(&self.shapes.root(), Some(proto));
        let mut function = JSObject::with_class(ClassId::Function, shape);
        function.set_data(ObjectData::NativeFunction(NativeFunction::new(
            func,
            Some(name),
            length,
        )));
        self.heap.alloc(function)
    }

    fn create_accessor_pair(&mut self, getter: Value, setter: Value) -> ObjectId {
        let mut pair = JSObject::with_class(ClassId::AccessorPair, self.shapes.root());
        pair.set_data(ObjectData::Accessor { getter, setter });
        let id = self.heap.alloc(pair);
        self.heap.write_barrier(id, getter);
        self.heap.write_barrier(id, setter);
        id
    }

    /// Getter and setter stored in an accessor property's slot
    fn accessor_pair(&self, slot: Value) -> (Value, Value) {
        match slot.to_object().map(|id| self.heap.get(id).data()) {
            Some(&ObjectData::Accessor { getter, setter }) => (getter, setter),
            _ => (Value::undefined(), Value::undefined()),
        }
    }

    // ------------------------------------------------------------------
    // Shape bookkeeping
    // ------------------------------------------------------------------

    /// Give `proto` a unique prototype shape before anything inherits from it
    pub(crate) fn make_prototype(&mut self, proto: ObjectId) {
        let old = Rc::clone(self.heap.get(proto).shape());
        if old.is_prototype() {
            return;
        }
        let new = self.shapes.as_prototype(&old);
        if old.is_unique() {
            refresh_users(&self.heap, &old, &new);
        } else if old.change_details().is_some_and(|d| d.is_registered()) {
            register_on_chain(&self.heap, &new);
        }
        self.heap.get_mut(proto).set_shape(new);
    }

    /// An object moved from `old` to `new`
    fn shape_changed(&self, old: &Rc<Shape>, new: &Rc<Shape>) {
        if old.is_unique() {
            notice_through_chain(old);
            refresh_users(&self.heap, old, new);
        }
    }

    /// Install a shape describing the same slots
    fn install_shape(&mut self, obj: ObjectId, new: Rc<Shape>) {
        let old = Rc::clone(self.heap.get(obj).shape());
        self.heap.get_mut(obj).set_shape(Rc::clone(&new));
        self.shape_changed(&old, &new);
    }

    /// The object's layout changed without a shape change
    fn notice_in_place(&self, obj: ObjectId) {
        let shape = self.heap.get(obj).shape();
        if shape.is_unique() {
            notice_through_chain(shape);
        }
    }

    /// Move named properties to dictionary mode (one-way)
    fn normalize_properties(&mut self, obj: ObjectId) {
        let old = Rc::clone(self.heap.get(obj).shape());
        if old.is_dictionary() {
            return;
        }
        let new = self.shapes.to_dictionary(&old);
        self.heap.get_mut(obj).convert_to_dictionary(Rc::clone(&new));
        self.shape_changed(&old, &new);
    }

    /// Move elements to dictionary mode (one-way)
    fn normalize_elements(&mut self, obj: ObjectId) {
        let old = Rc::clone(self.heap.get(obj).shape());
        if old.elements_kind() == ElementsKind::Dictionary {
            return;
        }
        let new = self.shapes.with_dictionary_elements(&old);
        self.heap
            .get_mut(obj)
            .convert_elements_to_dictionary(Rc::clone(&new));
        self.shape_changed(&old, &new);
    }

    /// Add a property known to be absent from an extensible object
    fn add_own_property(
        &mut self,
        obj: ObjectId,
        key: PropertyKey,
        value: Value,
        attrs: PropertyAttributes,
    ) {
        match key {
            PropertyKey::Atom(atom) => {
                let object = self.heap.get(obj);
                if !object.is_dictionary_mode()
                    && should_use_dictionary(&self.config, object.own_property_count())
                {
                    self.normalize_properties(obj);
                }
                let in_dictionary = match self.heap.get_mut(obj).dictionary_mut() {
                    Some(dict) => {
                        dict.insert(atom, value, attrs);
                        true
                    }
                    None => false,
                };
                if in_dictionary {
                    self.notice_in_place(obj);
                } else {
                    let old = Rc::clone(self.heap.get(obj).shape());
                    let new = self.shapes.add_property(&old, atom, attrs);
                    self.heap
                        .get_mut(obj)
                        .add_fast(&self.config, Rc::clone(&new), value);
                    self.shape_changed(&old, &new);
                }
            }
            PropertyKey::Index(index) => {
                if self
                    .heap
                    .get(obj)
                    .elements()
                    .needs_dictionary(&self.config, index, attrs)
                {
                    self.normalize_elements(obj);
                }
                self.heap
                    .get_mut(obj)
                    .elements_mut()
                    .put(&self.config, index, value, attrs);
                self.notice_in_place(obj);
            }
        }
        self.heap.write_barrier(obj, value);
    }

    /// Give an existing own property new attributes (and value)
    fn reconfigure_property(
        &mut self,
        obj: ObjectId,
        key: PropertyKey,
        attrs: PropertyAttributes,
        value: Value,
    ) {
        match key {
            PropertyKey::Atom(atom) => {
                self.normalize_properties(obj);
                if let Some(dict) = self.heap.get_mut(obj).dictionary_mut() {
                    dict.insert(atom, value, attrs);
                }
            }
            PropertyKey::Index(index) => {
                if self
                    .heap
                    .get(obj)
                    .elements()
                    .needs_dictionary(&self.config, index, attrs)
                {
                    self.normalize_elements(obj);
                }
                self.heap
                    .get_mut(obj)
                    .elements_mut()
                    .put(&self.config, index, value, attrs);
            }
        }
        self.notice_in_place(obj);
        self.heap.write_barrier(obj, value);
    }

    /// Overwrite the value of the own data property `op` found
    fn write_found(&mut self, op: &mut ObjectOperator, value: Value) {
        if op.receiver_shape_changed(&self.heap) {
            op.relookup_in_receiver(&self.heap);
        }
        if !op.is_found() {
            return;
        }
        let obj = op.holder();
        let object = self.heap.get_mut(obj);
        match op.key() {
            PropertyKey::Atom(atom) => {
                if op.is_fast_mode() {
                    object.write_slot(op.attributes(), value);
                } else if let Some(entry) = object.dictionary_mut().and_then(|d| d.get_mut(&atom)) {
                    entry.value = value;
                }
            }
            PropertyKey::Index(index) => {
                object.elements_mut().set_value(index, value);
            }
        }
        self.heap.write_barrier(obj, value);
    }

    // ------------------------------------------------------------------
    // [[Get]] / [[Set]] / [[HasProperty]] / [[Delete]]
    // ------------------------------------------------------------------

    /// Resolve the target of a property access
    ///
    /// `None` for primitives other than null and undefined, which have no
    /// own properties here.
    fn target_object(&self, target: Value, key: PropertyKey, verb: &str) -> JsResult<Option<ObjectId>> {
        if target.is_nullish() {
            return Err(JsError::type_error(format!(
                "cannot {} property '{}' of {}",
                verb,
                self.key_name(key),
                target
            )));
        }
        Ok(target.to_object())
    }

    /// `target[key]`
    pub fn get(&mut self, target: Value, key: PropertyKey) -> JsResult<Value> {
        self.get_with_receiver(target, key, target)
    }

    /// `Reflect.get(target, key, receiver)`
    pub fn get_with_receiver(
        &mut self,
        target: Value,
        key: PropertyKey,
        receiver: Value,
    ) -> JsResult<Value> {
        let Some(obj) = self.target_object(target, key, "read")? else {
            return Ok(Value::undefined());
        };
        let mut op = ObjectOperator::with_receiver(&self.heap, obj, key, receiver);
        if !op.is_found() {
            return Ok(Value::undefined());
        }
        let value = op.value(&self.heap);
        if op.is_accessor() {
            let (getter, _) = self.accessor_pair(value);
            if getter.is_undefined() {
                return Ok(Value::undefined());
            }
            return self.call(getter, receiver, &[]);
        }
        Ok(value)
    }

    /// `target[key] = value`
    ///
    /// In strict mode a failed assignment throws a TypeError; otherwise it
    /// returns `Ok(false)`.
    pub fn set(&mut self, target: Value, key: PropertyKey, value: Value, strict: bool) -> JsResult<bool> {
        let done = self.set_with_receiver(target, key, value, target)?;
        if !done && strict {
            return Err(JsError::type_error(format!(
                "cannot assign to read only property '{}'",
                self.key_name(key)
            )));
        }
        Ok(done)
    }

    /// `Reflect.set(target, key, value, receiver)`
    pub fn set_with_receiver(
        &mut self,
        target: Value,
        key: PropertyKey,
        value: Value,
        receiver: Value,
    ) -> JsResult<bool> {
        let Some(obj) = self.target_object(target, key, "set")? else {
            return Ok(false);
        };
        let mut op = ObjectOperator::with_receiver(&self.heap, obj, key, receiver);

        if op.is_found() {
            if op.is_accessor() {
                let pair = op.value(&self.heap);
                let (_, setter) = self.accessor_pair(pair);
                if setter.is_undefined() {
                    return Ok(false);
                }
                self.call(setter, receiver, &[value])?;
                return Ok(true);
            }
            if !op.attributes().is_writable() {
                return Ok(false);
            }
            if op.holder_is_receiver() {
                self.write_found(&mut op, value);
                return Ok(true);
            }
        }

        // Not found, or found elsewhere: the write lands on the receiver
        let Some(receiver_obj) = receiver.to_object() else {
            return Ok(false);
        };
        op.relookup_in_receiver(&self.heap);
        if op.is_transition() {
            self.add_own_property(receiver_obj, key, value, PropertyAttributes::default_data());
            return Ok(true);
        }
        if !op.is_found() || op.is_accessor() || !op.attributes().is_writable() {
            return Ok(false);
        }
        self.write_found(&mut op, value);
        Ok(true)
    }

    /// `key in target`
    pub fn has(&mut self, target: Value, key: PropertyKey) -> JsResult<bool> {
        let Some(obj) = self.target_object(target, key, "check")? else {
            return Err(JsError::type_error(format!(
                "cannot use 'in' operator to search for '{}' in {}",
                self.key_name(key),
                target
            )));
        };
        Ok(ObjectOperator::new(&self.heap, obj, key).is_found())
    }

    /// `Object.hasOwn(obj, key)`
    pub fn has_own(&self, obj: ObjectId, key: PropertyKey) -> bool {
        ObjectOperator::own(&self.heap, obj, key).is_found()
    }

    /// `delete target[key]`
    ///
    /// Deleting an absent key succeeds without touching the object.
    pub fn delete(&mut self, target: Value, key: PropertyKey) -> JsResult<bool> {
        let Some(obj) = self.target_object(target, key, "delete")? else {
            return Ok(true);
        };
        let op = ObjectOperator::own(&self.heap, obj, key);
        if !op.is_found() {
            return Ok(true);
        }
        if !op.attributes().is_configurable() {
            return Ok(false);
        }

        match key {
            PropertyKey::Atom(atom) => {
                // Fast slots are never compacted; the object goes to
                // dictionary mode so other offsets stay valid.
                self.normalize_properties(obj);
                if let Some(dict) = self.heap.get_mut(obj).dictionary_mut() {
                    dict.remove(&atom);
                }
            }
            PropertyKey::Index(index) => {
                self.heap.get_mut(obj).elements_mut().remove(index);
                if self.heap.get(obj).elements().too_sparse(&self.config) {
                    self.normalize_elements(obj);
                }
            }
        }
        self.notice_in_place(obj);
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Own properties
    // ------------------------------------------------------------------

    /// `[[GetOwnProperty]]`
    pub fn get_own_property(&self, obj: ObjectId, key: PropertyKey) -> Option<PropertyDescriptor> {
        let mut op = ObjectOperator::own(&self.heap, obj, key);
        if !op.is_found() {
            return None;
        }
        let value = op.value(&self.heap);
        let attrs = op.attributes();
        if attrs.is_accessor() {
            let (getter, setter) = self.accessor_pair(value);
            Some(PropertyDescriptor::accessor(getter, setter, attrs))
        } else {
            Some(PropertyDescriptor::data(value, attrs))
        }
    }

    /// `[[DefineOwnProperty]]`
    pub fn define_own_property(
        &mut self,
        obj: ObjectId,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> JsResult<bool> {
        let mut op = ObjectOperator::own(&self.heap, obj, key);

        if !op.is_found() {
            if !self.heap.get(obj).is_extensible() {
                return Ok(false);
            }
            let attrs = desc.to_new_attributes();
            let value = if attrs.is_accessor() {
                let getter = desc.get.unwrap_or_default();
                let setter = desc.set.unwrap_or_default();
                Value::object(self.create_accessor_pair(getter, setter))
            } else {
                desc.value.unwrap_or_default()
            };
            self.add_own_property(obj, key, value, attrs);
            return Ok(true);
        }

        let current = op.attributes();
        let slot = op.value(&self.heap);
        let (cur_get, cur_set) = if current.is_accessor() {
            self.accessor_pair(slot)
        } else {
            (Value::undefined(), Value::undefined())
        };

        if desc == PropertyDescriptor::default() {
            return Ok(true);
        }

        if !current.is_configurable() {
            if desc.configurable == Some(true) {
                return Ok(false);
            }
            if desc.enumerable.is_some_and(|e| e != current.is_enumerable()) {
                return Ok(false);
            }
            if !desc.is_generic_descriptor() && desc.is_accessor_descriptor() != current.is_accessor() {
                return Ok(false);
            }
            if current.is_accessor() {
                if desc.get.is_some_and(|g| g != cur_get) || desc.set.is_some_and(|s| s != cur_set) {
                    return Ok(false);
                }
            } else if !current.is_writable() {
                if desc.writable == Some(true) {
                    return Ok(false);
                }
                if desc.value.is_some_and(|v| v != slot) {
                    return Ok(false);
                }
            }
        }

        let mut attrs = current.flags_only();
        if let Some(enumerable) = desc.enumerable {
            attrs.set_enumerable(enumerable);
        }
        if let Some(configurable) = desc.configurable {
            attrs.set_configurable(configurable);
        }

        let value = if desc.is_accessor_descriptor() {
            let getter = desc.get.unwrap_or(cur_get);
            let setter = desc.set.unwrap_or(cur_set);
            attrs.set_accessor(true);
            match slot.to_object().filter(|_| current.is_accessor()) {
                Some(pair) => {
                    if getter != cur_get || setter != cur_set {
                        self.heap
                            .get_mut(pair)
                            .set_data(ObjectData::Accessor { getter, setter });
                        self.heap.write_barrier(pair, getter);
                        self.heap.write_barrier(pair, setter);
                        self.notice_in_place(obj);
                    }
                    slot
                }
                None => Value::object(self.create_accessor_pair(getter, setter)),
            }
        } else if desc.is_data_descriptor() {
            if current.is_accessor() {
                attrs.set_accessor(false);
                attrs.set_writable(desc.writable.unwrap_or(false));
                desc.value.unwrap_or_default()
            } else {
                if let Some(writable) = desc.writable {
                    attrs.set_writable(writable);
                }
                desc.value.unwrap_or(slot)
            }
        } else {
            slot
        };

        if attrs.same_flags(current) {
            if value != slot {
                self.write_found(&mut op, value);
            }
        } else {
            log::trace!(
                "reconfigure '{}' on {:?}: {:?} -> {:?}",
                self.key_name(key),
                obj,
                current.flags_only(),
                attrs
            );
            self.reconfigure_property(obj, key, attrs, value);
        }
        Ok(true)
    }

    /// `DefinePropertyOrThrow`
    pub fn define_property_or_throw(
        &mut self,
        obj: ObjectId,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> JsResult<()> {
        if self.define_own_property(obj, key, desc)? {
            Ok(())
        } else {
            Err(JsError::type_error(format!(
                "cannot define property '{}'",
                self.key_name(key)
            )))
        }
    }

    /// `[[OwnPropertyKeys]]`: indices ascending, then strings in creation
    /// order, then symbols in creation order
    pub fn own_property_keys(&self, obj: ObjectId) -> Vec<PropertyKey> {
        let object = self.heap.get(obj);
        let mut keys: Vec<PropertyKey> = object
            .elements()
            .keys()
            .into_iter()
            .map(PropertyKey::Index)
            .collect();

        let named: Vec<_> = match object.dictionary() {
            Some(dict) => dict.keys().collect(),
            None => object.shape().properties().map(|(atom, _)| atom).collect(),
        };
        keys.extend(named.iter().filter(|a| a.is_string()).map(|&a| PropertyKey::Atom(a)));
        keys.extend(named.iter().filter(|a| a.is_symbol()).map(|&a| PropertyKey::Atom(a)));
        keys
    }

    /// `Object.keys`: own enumerable string keys
    pub fn own_enumerable_string_keys(&self, obj: ObjectId) -> Vec<PropertyKey> {
        self.own_property_keys(obj)
            .into_iter()
            .filter(|key| !key.is_symbol())
            .filter(|&key| {
                ObjectOperator::own(&self.heap, obj, key)
                    .attributes()
                    .is_enumerable()
            })
            .collect()
    }

    /// Keys visited by `for (k in obj)`
    ///
    /// Walks the prototype chain; a key seen on a closer object shadows the
    /// same key further up, even when the closer one is not enumerable.
    pub fn for_in_keys(&self, obj: ObjectId) -> Vec<PropertyKey> {
        let mut seen = FxHashSet::default();
        let mut keys = Vec::new();
        let mut current = Some(obj);
        while let Some(id) = current {
            for key in self.own_property_keys(id) {
                if key.is_symbol() || !seen.insert(key) {
                    continue;
                }
                if ObjectOperator::own(&self.heap, id, key)
                    .attributes()
                    .is_enumerable()
                {
                    keys.push(key);
                }
            }
            current = self.heap.get(id).prototype();
        }
        keys
    }

    // ------------------------------------------------------------------
    // Prototype and extensibility
    // ------------------------------------------------------------------

    /// `[[GetPrototypeOf]]`
    pub fn get_prototype_of(&self, obj: ObjectId) -> Option<ObjectId> {
        self.heap.get(obj).prototype()
    }

    /// `[[SetPrototypeOf]]`
    ///
    /// Fails for non-extensible objects and for prototypes that would create
    /// a cycle.
    pub fn set_prototype_of(&mut self, obj: ObjectId, proto: Option<ObjectId>) -> JsResult<bool> {
        let object = self.heap.get(obj);
        if object.prototype() == proto {
            return Ok(true);
        }
        if !object.is_extensible() {
            return Ok(false);
        }
        let mut ancestor = proto;
        while let Some(id) = ancestor {
            if id == obj {
                return Ok(false);
            }
            ancestor = self.heap.get(id).prototype();
        }

        if let Some(proto) = proto {
            self.make_prototype(proto);
        }
        let old = Rc::clone(self.heap.get(obj).shape());
        let new = self.shapes.with_prototype(&old, proto);
        log::debug!("set prototype of {:?} to {:?}", obj, proto);
        self.install_shape(obj, new);
        Ok(true)
    }

    /// `[[PreventExtensions]]`
    pub fn prevent_extensions(&mut self, obj: ObjectId) -> JsResult<bool> {
        let old = Rc::clone(self.heap.get(obj).shape());
        if old.is_extensible() {
            let new = self.shapes.prevent_extensions(&old);
            self.install_shape(obj, new);
        }
        Ok(true)
    }

    /// `[[IsExtensible]]`
    pub fn is_extensible(&self, obj: ObjectId) -> bool {
        self.heap.get(obj).is_extensible()
    }

    /// `SetIntegrityLevel`
    pub fn set_integrity_level(&mut self, obj: ObjectId, level: IntegrityLevel) -> JsResult<bool> {
        if !self.prevent_extensions(obj)? {
            return Ok(false);
        }
        for key in self.own_property_keys(obj) {
            let mut desc = PropertyDescriptor {
                configurable: Some(false),
                ..Default::default()
            };
            if level == IntegrityLevel::Frozen
                && self
                    .get_own_property(obj, key)
                    .is_some_and(|current| current.is_data_descriptor())
            {
                desc.writable = Some(false);
            }
            self.define_property_or_throw(obj, key, desc)?;
        }
        Ok(true)
    }

    /// `TestIntegrityLevel`
    pub fn test_integrity_level(&self, obj: ObjectId, level: IntegrityLevel) -> bool {
        if self.is_extensible(obj) {
            return false;
        }
        self.own_property_keys(obj).into_iter().all(|key| {
            let attrs = ObjectOperator::own(&self.heap, obj, key).attributes();
            !attrs.is_configurable()
                && (level == IntegrityLevel::Sealed || attrs.is_accessor() || !attrs.is_writable())
        })
    }

    // ------------------------------------------------------------------
    // Global bindings
    // ------------------------------------------------------------------

    /// Value of a global binding, `None` if unbound
    pub fn get_global_binding(&mut self, name: PropertyKey) -> JsResult<Option<Value>> {
        let global = self.global_object();
        let mut op = ObjectOperator::global(&self.heap, global, name);
        if !op.is_found() {
            return Ok(None);
        }
        let value = op.value(&self.heap);
        if op.is_accessor() {
            let (getter, _) = self.accessor_pair(value);
            if getter.is_undefined() {
                return Ok(Some(Value::undefined()));
            }
            return self.call(getter, Value::object(global), &[]).map(Some);
        }
        Ok(Some(value))
    }

    /// `var name = value` at top level: a non-configurable global binding
    pub fn declare_global_var(&mut self, name: PropertyKey, value: Value) -> JsResult<()> {
        let global = self.global_object();
        if self.has_own(global, name) {
            self.set(Value::object(global), name, value, true)?;
            return Ok(());
        }
        let desc = PropertyDescriptor::data(value, PropertyAttributes::data(true, true, false));
        self.define_property_or_throw(global, name, desc)
    }
}
