//! JavaScript object representation
//!
//! A [`JSObject`] is a shape plus storage:
//!
//! ```text
//! JSObject
//!   shape ------> Shape { prototype, layout, inlined_capacity, .. }
//!   inline        [v0 v1 v2 v3]        offsets below inlined_capacity
//!   properties    Fast([v4 v5 ..])     offset - inlined_capacity
//!               | Dictionary(key -> (attrs, value))
//!   elements      Fast([e0 hole e2])  | Dictionary(index -> (attrs, value))
//!   data          class specific payload
//! ```
//!
//! Named properties and elements switch to dictionary mode independently.
//! Objects never record their own id, so callers storing heap references
//! report them through `Heap::write_barrier`.

use std::rc::Rc;

use crate::config::ObjectModelConfig;
use crate::error::out_of_memory;
use crate::gc::{Trace, Tracer};
use crate::runtime::atom::Atom;
use crate::runtime::dictionary::Dictionary;
use crate::runtime::elements::Elements;
use crate::runtime::function::NativeFunction;
use crate::runtime::property::PropertyAttributes;
use crate::runtime::shape::{compute_property_capacity, ElementsKind, Shape};
use crate::value::Value;

/// JavaScript class IDs
///
/// These identify the type of a JavaScript object and determine its behavior.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassId {
    /// Plain object
    Object = 0,
    /// Array
    Array = 1,
    /// Native function
    Function = 2,
    /// The global object
    Global = 3,
    /// Getter/setter pair stored in an accessor property's slot
    AccessorPair = 4,
}

impl ClassId {
    /// Check if this is a function class
    #[inline]
    pub fn is_function(self) -> bool {
        matches!(self, ClassId::Function)
    }
}

/// Class specific payload
#[derive(Debug, Clone, Copy, Default)]
pub enum ObjectData {
    #[default]
    None,
    /// Getter and setter of an accessor property (undefined when absent)
    Accessor { getter: Value, setter: Value },
    /// Host function
    NativeFunction(NativeFunction),
}

/// Out-of-line named property storage
#[derive(Debug, Clone)]
pub enum Properties {
    /// Slots past the inline region, indexed by `offset - inlined_capacity`
    Fast(Vec<Value>),
    /// Key, attributes and value of every named property
    Dictionary(Dictionary<Atom>),
}

/// JavaScript object
#[derive(Debug)]
pub struct JSObject {
    class_id: ClassId,
    shape: Rc<Shape>,
    inline: Box<[Value]>,
    properties: Properties,
    elements: Elements,
    data: ObjectData,
}

impl JSObject {
    /// Create a plain object wearing `shape`
    pub fn new(shape: Rc<Shape>) -> Self {
        Self::with_class(ClassId::Object, shape)
    }

    /// Create an object of the given class
    ///
    /// Every slot the shape already describes starts out undefined.
    pub fn with_class(class_id: ClassId, shape: Rc<Shape>) -> Self {
        let inline = vec![Value::undefined(); shape.inlined_capacity() as usize].into_boxed_slice();
        let properties = if shape.is_dictionary() {
            Properties::Dictionary(Dictionary::new())
        } else {
            Properties::Fast(vec![Value::undefined(); shape.out_of_line_count() as usize])
        };
        let mut elements = Elements::new();
        if shape.elements_kind() == ElementsKind::Dictionary {
            elements.convert_to_dictionary();
        }
        JSObject {
            class_id,
            shape,
            inline,
            properties,
            elements,
            data: ObjectData::None,
        }
    }

    #[inline]
    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    #[inline]
    pub fn shape(&self) -> &Rc<Shape> {
        &self.shape
    }

    #[inline]
    pub fn prototype(&self) -> Option<crate::gc::ObjectId> {
        self.shape.prototype()
    }

    #[inline]
    pub fn is_extensible(&self) -> bool {
        self.shape.is_extensible()
    }

    /// Named properties live in a dictionary
    #[inline]
    pub fn is_dictionary_mode(&self) -> bool {
        matches!(self.properties, Properties::Dictionary(_))
    }

    #[inline]
    pub fn is_function(&self) -> bool {
        self.class_id.is_function()
    }

    #[inline]
    pub fn data(&self) -> &ObjectData {
        &self.data
    }

    #[inline]
    pub fn set_data(&mut self, data: ObjectData) {
        self.data = data;
    }

    #[inline]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// The named property dictionary, in dictionary mode
    pub fn dictionary(&self) -> Option<&Dictionary<Atom>> {
        match &self.properties {
            Properties::Dictionary(dict) => Some(dict),
            Properties::Fast(_) => None,
        }
    }

    pub(crate) fn dictionary_mut(&mut self) -> Option<&mut Dictionary<Atom>> {
        match &mut self.properties {
            Properties::Dictionary(dict) => Some(dict),
            Properties::Fast(_) => None,
        }
    }

    #[inline]
    pub fn elements(&self) -> &Elements {
        &self.elements
    }

    #[inline]
    pub(crate) fn elements_mut(&mut self) -> &mut Elements {
        &mut self.elements
    }

    /// Swap in a shape describing the same slots
    ///
    /// Used for prototype, extensibility and element-kind changes and for
    /// unique copies; layout changes go through [`JSObject::add_fast`] and
    /// [`JSObject::convert_to_dictionary`].
    pub(crate) fn set_shape(&mut self, shape: Rc<Shape>) {
        debug_assert_eq!(shape.is_dictionary(), self.is_dictionary_mode());
        debug_assert!(
            shape.is_dictionary() || shape.property_count() == self.shape.property_count(),
            "shape swap must keep the layout"
        );
        self.shape = shape;
    }

    /// Value stored at a fast property's location
    #[inline]
    pub fn read_slot(&self, attrs: PropertyAttributes) -> Value {
        let offset = attrs.offset();
        if attrs.is_inlined() {
            self.inline[offset as usize]
        } else {
            match &self.properties {
                Properties::Fast(slots) => {
                    slots[(offset - self.shape.inlined_capacity()) as usize]
                }
                Properties::Dictionary(_) => Value::undefined(),
            }
        }
    }

    /// Overwrite the value at a fast property's location
    #[inline]
    pub(crate) fn write_slot(&mut self, attrs: PropertyAttributes, value: Value) {
        let offset = attrs.offset();
        if attrs.is_inlined() {
            self.inline[offset as usize] = value;
        } else {
            let inlined = self.shape.inlined_capacity();
            if let Properties::Fast(slots) = &mut self.properties {
                slots[(offset - inlined) as usize] = value;
            }
        }
    }

    /// Own named property: value and attributes
    ///
    /// Fast-mode attributes carry the slot location; dictionary attributes
    /// carry flags only.
    pub fn get_own(&self, key: Atom) -> Option<(Value, PropertyAttributes)> {
        match &self.properties {
            Properties::Dictionary(dict) => dict.get(&key).map(|e| (e.value, e.attrs)),
            Properties::Fast(_) => self
                .shape
                .lookup(key)
                .map(|attrs| (self.read_slot(attrs), attrs)),
        }
    }

    /// Number of own named properties
    pub fn own_property_count(&self) -> u32 {
        match &self.properties {
            Properties::Dictionary(dict) => dict.len() as u32,
            Properties::Fast(_) => self.shape.property_count(),
        }
    }

    /// Install `shape`, which extends the current one by a single property,
    /// and store that property's value
    pub(crate) fn add_fast(&mut self, config: &ObjectModelConfig, shape: Rc<Shape>, value: Value) {
        debug_assert_eq!(shape.property_count(), self.shape.property_count() + 1);
        let Some((_, attrs)) = shape.properties().last() else {
            return;
        };
        if !attrs.is_inlined() {
            if let Properties::Fast(slots) = &mut self.properties {
                let index = (attrs.offset() - shape.inlined_capacity()) as usize;
                if index >= slots.capacity() {
                    let capacity =
                        compute_property_capacity(config, slots.capacity() as u32, index as u32 + 1);
                    if slots.try_reserve_exact(capacity as usize - slots.len()).is_err() {
                        out_of_memory("property storage");
                    }
                }
                slots.resize(index, Value::undefined());
                slots.push(value);
            }
        }
        self.shape = shape;
        if attrs.is_inlined() {
            self.inline[attrs.offset() as usize] = value;
        }
    }

    /// Move every named property into a dictionary and install `shape`,
    /// a dictionary shape derived from the current one
    pub(crate) fn convert_to_dictionary(&mut self, shape: Rc<Shape>) {
        debug_assert!(shape.is_dictionary());
        if self.is_dictionary_mode() {
            self.shape = shape;
            return;
        }
        let mut dict = Dictionary::with_capacity(self.shape.property_count() as usize);
        for (key, attrs) in self.shape.properties() {
            dict.insert(key, self.read_slot(attrs), attrs);
        }
        log::debug!(
            "object with shape {:?} to dictionary mode ({} properties)",
            self.shape.id(),
            dict.len()
        );
        self.inline = Box::default();
        self.properties = Properties::Dictionary(dict);
        self.shape = shape;
    }

    /// Switch elements to dictionary mode and install `shape`, which must
    /// record dictionary elements
    pub(crate) fn convert_elements_to_dictionary(&mut self, shape: Rc<Shape>) {
        debug_assert_eq!(shape.elements_kind(), ElementsKind::Dictionary);
        self.elements.convert_to_dictionary();
        self.set_shape(shape);
    }
}

impl Trace for JSObject {
    fn trace(&self, tracer: &mut dyn Tracer) {
        self.shape.trace(tracer);
        for &value in self.inline.iter() {
            tracer.mark_value(value);
        }
        match &self.properties {
            Properties::Fast(slots) => {
                for &value in slots {
                    tracer.mark_value(value);
                }
            }
            Properties::Dictionary(dict) => dict.trace(tracer),
        }
        self.elements.trace(tracer);
        if let ObjectData::Accessor { getter, setter } = self.data {
            tracer.mark_value(getter);
            tracer.mark_value(setter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::shape::ShapeTable;

    fn add(
        obj: &mut JSObject,
        shapes: &ShapeTable,
        config: &ObjectModelConfig,
        key: u32,
        value: i32,
    ) {
        let shape = shapes.add_property(obj.shape(), Atom::from_raw(key), PropertyAttributes::default());
        obj.add_fast(config, shape, Value::int(value));
    }

    #[test]
    fn test_class_id_function() {
        assert!(ClassId::Function.is_function());
        assert!(!ClassId::Object.is_function());
        assert!(!ClassId::AccessorPair.is_function());
    }

    #[test]
    fn test_new_object() {
        let shapes = ShapeTable::new(4);
        let obj = JSObject::new(shapes.root());
        assert_eq!(obj.class_id(), ClassId::Object);
        assert!(!obj.is_dictionary_mode());
        assert!(obj.is_extensible());
        assert_eq!(obj.own_property_count(), 0);
        assert!(obj.prototype().is_none());
    }

    #[test]
    fn test_inline_and_out_of_line_slots() {
        let shapes = ShapeTable::new(2);
        let config = ObjectModelConfig::default();
        let mut obj = JSObject::new(shapes.root());
        for i in 0..6 {
            add(&mut obj, &shapes, &config, i, i as i32 * 10);
        }

        for i in 0..6 {
            let (value, attrs) = obj.get_own(Atom::from_raw(i)).unwrap();
            assert_eq!(value, Value::int(i as i32 * 10));
            assert_eq!(attrs.is_inlined(), i < 2);
        }
        let Properties::Fast(slots) = obj.properties() else {
            panic!("expected fast properties");
        };
        assert_eq!(slots.len(), 4);
        assert!(slots.capacity() >= 4);

        let attrs = obj.shape().lookup(Atom::from_raw(5)).unwrap();
        obj.write_slot(attrs, Value::int(-1));
        assert_eq!(obj.read_slot(attrs), Value::int(-1));
    }

    #[test]
    fn test_convert_to_dictionary_keeps_values_and_order() {
        let shapes = ShapeTable::new(2);
        let config = ObjectModelConfig::default();
        let mut obj = JSObject::new(shapes.root());
        for i in 0..4 {
            add(&mut obj, &shapes, &config, i, i as i32);
        }
        let dict_shape = shapes.to_dictionary(obj.shape());
        obj.convert_to_dictionary(dict_shape);

        assert!(obj.is_dictionary_mode());
        assert_eq!(obj.own_property_count(), 4);
        let keys: Vec<_> = obj.dictionary().unwrap().keys().collect();
        assert_eq!(keys, (0..4).map(Atom::from_raw).collect::<Vec<_>>());
        assert_eq!(obj.get_own(Atom::from_raw(3)).unwrap().0, Value::int(3));
    }

    #[test]
    fn test_trace_reports_slots() {
        struct Count(usize);
        impl Tracer for Count {
            fn mark_object(&mut self, _id: crate::gc::ObjectId) {
                self.0 += 1;
            }
        }

        let shapes = ShapeTable::new(1);
        let config = ObjectModelConfig::default();
        let mut obj = JSObject::new(shapes.root());
        let target = crate::gc::ObjectId::from_raw(9);
        for key in 0..2 {
            let shape = shapes.add_property(obj.shape(), Atom::from_raw(key), PropertyAttributes::default());
            obj.add_fast(&config, shape, Value::object(target));
        }
        obj.elements_mut()
            .put(&config, 0, Value::object(target), PropertyAttributes::default());

        let mut count = Count(0);
        obj.trace(&mut count);
        assert_eq!(count.0, 3);
    }
}
