//! hclass - the object model of an ECMAScript engine
//!
//! Objects are described by shared, immutable shapes (hidden classes).
//! Adding a property moves an object along a memoized transition, so objects
//! built the same way share one shape and an inline cache keyed on that shape
//! can skip the property lookup.
//!
//! # Features
//! - Shape transition tree with weakly held, memoized edges
//! - Fast (slot) and dictionary storage for named properties and elements,
//!   with one-way promotion
//! - Prototype change markers and listener registries
//! - Ordinary object operations: get, set, has, delete, define, own keys,
//!   integrity levels and `for-in` enumeration
//! - Mark-and-sweep heap with a pluggable write barrier
//!
//! # Example
//! ```
//! use hclass::{Context, Value};
//!
//! let mut ctx = Context::new();
//! let obj = ctx.new_object();
//! let x = ctx.key("x");
//! ctx.set(Value::object(obj), x, Value::int(3), true).unwrap();
//! assert_eq!(ctx.get(Value::object(obj), x), Ok(Value::int(3)));
//! ```

// Core modules
pub mod config;
pub mod context;
pub mod error;
pub mod value;

// Garbage collector
pub mod gc;

// Object model
pub mod runtime;

// Re-export main types
pub use config::ObjectModelConfig;
pub use context::Context;
pub use error::{ConfigError, JsError, JsResult};
pub use gc::{Heap, ObjectId};
pub use runtime::{IntegrityLevel, PropertyAttributes, PropertyDescriptor, PropertyKey};
pub use value::Value;
