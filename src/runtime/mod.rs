//! Runtime support
//!
//! This module contains the object model:
//! - Atoms and property keys (interned strings, symbols, array indices)
//! - Shapes (hidden classes) and their transition tree
//! - Object representation (JSObject, fast slots, dictionaries, elements)
//! - Prototype change tracking
//! - Property lookup and the ordinary object operations

pub mod atom;
pub mod dictionary;
pub mod elements;
pub mod function;
pub mod object;
pub mod operator;
pub mod ops;
pub mod property;
pub mod proto_change;
pub mod shape;

pub use atom::{Atom, AtomTable, PropertyKey};
pub use dictionary::{DictEntry, Dictionary};
pub use elements::{Elements, FastElements};
pub use function::{NativeFn, NativeFunction, MAX_ARGS};
pub use object::{ClassId, JSObject, ObjectData, Properties};
pub use operator::ObjectOperator;
pub use ops::IntegrityLevel;
pub use property::{PropertyAttributes, PropertyDescriptor};
pub use proto_change::{ChangeDetails, ChangeMarker};
pub use shape::{ElementsKind, Shape, ShapeId, ShapeTable, TransitionKey};
