//! Object model tuning
//!
//! Growth factors and promotion thresholds are policy: changing them alters
//! when storage switches representation, never what a program observes.
//! Every knob can be overridden from the environment with an `HCLASS_`
//! prefixed variable (see [`ObjectModelConfig::from_env`]).

use crate::error::ConfigError;

/// Tuning policy for shapes and object storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectModelConfig {
    /// Inline slots reserved by the root shape and by blueprints that do
    /// not ask for a specific count
    pub default_inlined_capacity: u32,
    /// Blueprint requests above this are clamped; overflow lands out of line
    pub max_inlined_capacity: u32,
    /// Named property count past which storage becomes a dictionary
    pub max_fast_properties: u32,
    /// Minimum capacity of a fast element vector once it grows
    pub element_min_capacity: u32,
    /// Largest distance past capacity a fast element store tolerates
    pub element_max_gap: u32,
    /// Capacity above which the sparseness rule applies
    pub element_sparse_floor: u32,
    /// An index at or past `capacity * factor` is considered sparse
    pub element_sparse_factor: u32,
    /// Holes tolerated in a fast element store before deletion promotes it
    pub element_hole_threshold: u32,
    /// Minimum out-of-line property capacity once it grows
    pub property_min_capacity: u32,
}

impl Default for ObjectModelConfig {
    fn default() -> Self {
        ObjectModelConfig {
            default_inlined_capacity: 4,
            max_inlined_capacity: 64,
            max_fast_properties: 128,
            element_min_capacity: 16,
            element_max_gap: 1024,
            element_sparse_floor: 256,
            element_sparse_factor: 3,
            element_hole_threshold: 16,
            property_min_capacity: 4,
        }
    }
}

impl ObjectModelConfig {
    pub fn with_default_inlined_capacity(mut self, n: u32) -> Self {
        self.default_inlined_capacity = n;
        self
    }

    pub fn with_max_inlined_capacity(mut self, n: u32) -> Self {
        self.max_inlined_capacity = n;
        self
    }

    pub fn with_max_fast_properties(mut self, n: u32) -> Self {
        self.max_fast_properties = n;
        self
    }

    pub fn with_element_min_capacity(mut self, n: u32) -> Self {
        self.element_min_capacity = n;
        self
    }

    pub fn with_element_max_gap(mut self, n: u32) -> Self {
        self.element_max_gap = n;
        self
    }

    pub fn with_element_sparse_floor(mut self, n: u32) -> Self {
        self.element_sparse_floor = n;
        self
    }

    pub fn with_element_sparse_factor(mut self, n: u32) -> Self {
        self.element_sparse_factor = n;
        self
    }

    pub fn with_element_hole_threshold(mut self, n: u32) -> Self {
        self.element_hole_threshold = n;
        self
    }

    pub fn with_property_min_capacity(mut self, n: u32) -> Self {
        self.property_min_capacity = n;
        self
    }

    /// Defaults overridden by `HCLASS_*` environment variables
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let fields: [(&str, &mut u32); 9] = [
            ("HCLASS_DEFAULT_INLINED_CAPACITY", &mut config.default_inlined_capacity),
            ("HCLASS_MAX_INLINED_CAPACITY", &mut config.max_inlined_capacity),
            ("HCLASS_MAX_FAST_PROPERTIES", &mut config.max_fast_properties),
            ("HCLASS_ELEMENT_MIN_CAPACITY", &mut config.element_min_capacity),
            ("HCLASS_ELEMENT_MAX_GAP", &mut config.element_max_gap),
            ("HCLASS_ELEMENT_SPARSE_FLOOR", &mut config.element_sparse_floor),
            ("HCLASS_ELEMENT_SPARSE_FACTOR", &mut config.element_sparse_factor),
            ("HCLASS_ELEMENT_HOLE_THRESHOLD", &mut config.element_hole_threshold),
            ("HCLASS_PROPERTY_MIN_CAPACITY", &mut config.property_min_capacity),
        ];
        for (var, slot) in fields {
            if let Some(n) = env_u32(var) {
                *slot = n;
            }
        }
        config
    }

    /// Check that the thresholds are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        let at_least = |name, min, value| {
            if value < min {
                Err(ConfigError::TooSmall { name, min, value })
            } else {
                Ok(())
            }
        };
        at_least("max_fast_properties", 1, self.max_fast_properties)?;
        at_least("element_min_capacity", 1, self.element_min_capacity)?;
        at_least("element_sparse_factor", 2, self.element_sparse_factor)?;
        at_least("property_min_capacity", 1, self.property_min_capacity)?;

        const MAX_INLINED: u32 = 1 << 10;
        if self.max_inlined_capacity > MAX_INLINED {
            return Err(ConfigError::TooLarge {
                name: "max_inlined_capacity",
                max: MAX_INLINED,
                value: self.max_inlined_capacity,
            });
        }
        if self.default_inlined_capacity > self.max_inlined_capacity {
            return Err(ConfigError::InlinedCapacity {
                default: self.default_inlined_capacity,
                max: self.max_inlined_capacity,
            });
        }
        Ok(())
    }
}

fn env_u32(var: &str) -> Option<u32> {
    let val = std::env::var(var).ok()?;
    match val.trim().parse::<u32>() {
        Ok(n) => Some(n),
        Err(_) => {
            log::warn!("ignoring {}={:?}: not a non-negative integer", var, val);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(ObjectModelConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_builders() {
        let config = ObjectModelConfig::default()
            .with_max_fast_properties(8)
            .with_element_hole_threshold(2);
        assert_eq!(config.max_fast_properties, 8);
        assert_eq!(config.element_hole_threshold, 2);
        assert_eq!(config.default_inlined_capacity, 4);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ObjectModelConfig::default().with_max_fast_properties(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooSmall {
                name: "max_fast_properties",
                ..
            })
        ));

        let config = ObjectModelConfig::default()
            .with_default_inlined_capacity(10)
            .with_max_inlined_capacity(8);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InlinedCapacity { default: 10, max: 8 })
        );

        let config = ObjectModelConfig::default().with_max_inlined_capacity(1 << 20);
        assert!(matches!(config.validate(), Err(ConfigError::TooLarge { .. })));
    }

    #[test]
    fn test_env_override() {
        // SAFETY: the variable is unique to this test
        unsafe { std::env::set_var("HCLASS_ELEMENT_MAX_GAP", "77") };
        let config = ObjectModelConfig::from_env();
        unsafe { std::env::remove_var("HCLASS_ELEMENT_MAX_GAP") };
        assert_eq!(config.element_max_gap, 77);
    }
}
