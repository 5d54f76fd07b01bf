//! Native functions
//!
//! Getters, setters and other host callbacks are plain Rust functions stored
//! in a function object's data. They receive the context, the `this` value
//! and the arguments, and report abrupt completions through `Err`.

use std::fmt;

use crate::context::Context;
use crate::error::JsResult;
use crate::runtime::atom::Atom;
use crate::value::Value;

/// Maximum number of function arguments
pub const MAX_ARGS: usize = 65535;

/// Native function signature
pub type NativeFn = fn(ctx: &mut Context, this: Value, args: &[Value]) -> JsResult<Value>;

/// Host function payload of a function object
#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub func: NativeFn,
    /// Name used in diagnostics
    pub name: Option<Atom>,
    /// Declared parameter count
    pub length: u32,
}

impl NativeFunction {
    pub fn new(func: NativeFn, name: Option<Atom>, length: u32) -> Self {
        NativeFunction { func, name, length }
    }

    /// Invoke the function
    #[inline]
    pub fn call(&self, ctx: &mut Context, this: Value, args: &[Value]) -> JsResult<Value> {
        (self.func)(ctx, this, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("length", &self.length)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_arg(_ctx: &mut Context, _this: Value, args: &[Value]) -> JsResult<Value> {
        Ok(args.first().copied().unwrap_or_default())
    }

    #[test]
    fn test_call_native() {
        let mut ctx = Context::new();
        let f = NativeFunction::new(first_arg, None, 1);
        assert_eq!(f.call(&mut ctx, Value::undefined(), &[Value::int(3)]), Ok(Value::int(3)));
        assert_eq!(f.call(&mut ctx, Value::undefined(), &[]), Ok(Value::undefined()));
        assert_eq!(format!("{:?}", f), "NativeFunction { name: None, length: 1 }");
    }
}
