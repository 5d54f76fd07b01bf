//! Error types
//!
//! Object model operations return a tri-state `Result<bool, JsError>`:
//! `Ok(true)` succeeded, `Ok(false)` failed and the caller decides whether to
//! throw, `Err(_)` an exception is already in flight.

use thiserror::Error;

use crate::value::Value;

/// A language-level exception
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsError {
    /// TypeError raised by the object model itself
    #[error("TypeError: {0}")]
    TypeError(String),
    /// Abrupt completion thrown by user code (a getter, setter or native)
    #[error("uncaught exception: {0}")]
    Thrown(Value),
}

impl JsError {
    pub fn type_error(msg: impl Into<String>) -> Self {
        JsError::TypeError(msg.into())
    }

    /// Check if this is a TypeError raised by the object model
    pub fn is_type_error(&self) -> bool {
        matches!(self, JsError::TypeError(_))
    }
}

/// Result of an object model operation
pub type JsResult<T> = Result<T, JsError>;

/// Invalid tuning configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} must be at least {min}, got {value}")]
    TooSmall {
        name: &'static str,
        min: u32,
        value: u32,
    },
    #[error("{name} must not exceed {max}, got {value}")]
    TooLarge {
        name: &'static str,
        max: u32,
        value: u32,
    },
    #[error("default_inlined_capacity ({default}) exceeds max_inlined_capacity ({max})")]
    InlinedCapacity { default: u32, max: u32 },
}

/// Abort on allocator exhaustion
///
/// Running out of memory while growing object storage is never turned into
/// a catchable exception.
#[cold]
pub fn out_of_memory(what: &str) -> ! {
    log::error!("out of memory while growing {}", what);
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = JsError::type_error("cannot redefine property: x");
        assert!(err.is_type_error());
        assert_eq!(err.to_string(), "TypeError: cannot redefine property: x");

        let thrown = JsError::Thrown(Value::int(7));
        assert!(!thrown.is_type_error());
        assert_eq!(thrown.to_string(), "uncaught exception: 7");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::TooSmall {
            name: "element_min_capacity",
            min: 1,
            value: 0,
        };
        assert_eq!(err.to_string(), "element_min_capacity must be at least 1, got 0");
    }
}
