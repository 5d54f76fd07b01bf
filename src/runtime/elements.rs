//! Indexed property storage
//!
//! Elements start out as a holey vector: index `i` lives at position `i`,
//! missing indices hold [`Value::hole`]. Fast elements always carry default
//! attributes (writable, enumerable, configurable).
//!
//! A store switches to an element dictionary, for good, when
//! - a write lands too far past the current capacity
//! - an element needs non-default attributes
//! - deletes leave more holes than the threshold and half the length

use crate::config::ObjectModelConfig;
use crate::error::out_of_memory;
use crate::gc::{Trace, Tracer};
use crate::runtime::dictionary::Dictionary;
use crate::runtime::property::PropertyAttributes;
use crate::runtime::shape::{compute_element_capacity, should_trans_to_dict, ElementsKind};
use crate::value::Value;

/// Holey vector of element values
#[derive(Debug, Clone, Default)]
pub struct FastElements {
    values: Vec<Value>,
    /// Capacity granted by the growth policy
    capacity: u32,
    /// Positions below `len` holding a hole
    holes: u32,
}

impl FastElements {
    pub fn new() -> Self {
        Self::default()
    }

    /// One past the highest present index
    #[inline]
    pub fn len(&self) -> u32 {
        self.values.len() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn holes(&self) -> u32 {
        self.holes
    }

    #[inline]
    pub fn get(&self, index: u32) -> Option<Value> {
        self.values
            .get(index as usize)
            .copied()
            .filter(|v| !v.is_hole())
    }

    /// Store `value` at `index`, growing and filling the gap with holes
    fn set(&mut self, config: &ObjectModelConfig, index: u32, value: Value) {
        let len = self.len();
        if index < len {
            let slot = &mut self.values[index as usize];
            if slot.is_hole() {
                self.holes -= 1;
            }
            *slot = value;
            return;
        }

        if index >= self.capacity {
            let capacity = compute_element_capacity(config, self.capacity, index + 1);
            let additional = capacity as usize - self.values.len();
            if self.values.try_reserve_exact(additional).is_err() {
                out_of_memory("element storage");
            }
            self.capacity = capacity;
        }
        self.holes += index - len;
        self.values.resize(index as usize, Value::hole());
        self.values.push(value);
    }

    /// Punch a hole at `index`; trailing holes are trimmed
    fn delete(&mut self, index: u32) -> bool {
        match self.values.get_mut(index as usize) {
            Some(slot) if !slot.is_hole() => *slot = Value::hole(),
            _ => return false,
        }
        self.holes += 1;
        while self.values.last().is_some_and(|v| v.is_hole()) {
            self.values.pop();
            self.holes -= 1;
        }
        true
    }

    fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_hole())
            .map(|(i, _)| i as u32)
    }
}

/// Element storage of one object
#[derive(Debug, Clone)]
pub enum Elements {
    Fast(FastElements),
    Dictionary(Dictionary<u32>),
}

impl Elements {
    pub fn new() -> Self {
        Elements::Fast(FastElements::new())
    }

    #[inline]
    pub fn kind(&self) -> ElementsKind {
        match self {
            Elements::Fast(_) => ElementsKind::Fast,
            Elements::Dictionary(_) => ElementsKind::Dictionary,
        }
    }

    /// Value and attributes of a present element
    pub fn get(&self, index: u32) -> Option<(Value, PropertyAttributes)> {
        match self {
            Elements::Fast(fast) => fast
                .get(index)
                .map(|v| (v, PropertyAttributes::default_data())),
            Elements::Dictionary(dict) => dict.get(&index).map(|e| (e.value, e.attrs)),
        }
    }

    #[inline]
    pub fn contains(&self, index: u32) -> bool {
        self.get(index).is_some()
    }

    /// Number of present elements
    pub fn count(&self) -> usize {
        match self {
            Elements::Fast(fast) => (fast.len() - fast.holes()) as usize,
            Elements::Dictionary(dict) => dict.len(),
        }
    }

    /// Present indices in ascending order
    pub fn keys(&self) -> Vec<u32> {
        match self {
            Elements::Fast(fast) => fast.keys().collect(),
            Elements::Dictionary(dict) => {
                let mut keys: Vec<_> = dict.keys().collect();
                keys.sort_unstable();
                keys
            }
        }
    }

    /// Whether storing `index` with `attrs` requires dictionary mode first
    pub fn needs_dictionary(
        &self,
        config: &ObjectModelConfig,
        index: u32,
        attrs: PropertyAttributes,
    ) -> bool {
        match self {
            Elements::Fast(fast) => {
                !attrs.same_flags(PropertyAttributes::default_data())
                    || (index >= fast.len() && should_trans_to_dict(config, fast.capacity(), index))
            }
            Elements::Dictionary(_) => false,
        }
    }

    /// Store an element
    ///
    /// Fast storage ignores `attrs`; callers check [`Elements::needs_dictionary`]
    /// first.
    pub fn put(
        &mut self,
        config: &ObjectModelConfig,
        index: u32,
        value: Value,
        attrs: PropertyAttributes,
    ) {
        match self {
            Elements::Fast(fast) => fast.set(config, index, value),
            Elements::Dictionary(dict) => {
                dict.insert(index, value, attrs);
            }
        }
    }

    /// Overwrite the value of an existing element, keeping its attributes
    pub fn set_value(&mut self, index: u32, value: Value) -> bool {
        match self {
            Elements::Fast(fast) => match fast.values.get_mut(index as usize) {
                Some(slot) if !slot.is_hole() => {
                    *slot = value;
                    true
                }
                _ => false,
            },
            Elements::Dictionary(dict) => match dict.get_mut(&index) {
                Some(entry) => {
                    entry.value = value;
                    true
                }
                None => false,
            },
        }
    }

    /// Remove an element; returns false if it was absent
    pub fn remove(&mut self, index: u32) -> bool {
        match self {
            Elements::Fast(fast) => fast.delete(index),
            Elements::Dictionary(dict) => dict.remove(&index).is_some(),
        }
    }

    /// Whether a fast store has become too holey to stay fast
    pub fn too_sparse(&self, config: &ObjectModelConfig) -> bool {
        match self {
            Elements::Fast(fast) => {
                fast.holes() > config.element_hole_threshold && fast.holes() * 2 > fast.len()
            }
            Elements::Dictionary(_) => false,
        }
    }

    /// Move every present element into a dictionary
    pub fn convert_to_dictionary(&mut self) {
        let Elements::Fast(fast) = self else {
            return;
        };
        let mut dict = Dictionary::with_capacity(fast.len() as usize - fast.holes() as usize);
        for index in fast.keys() {
            dict.insert(
                index,
                fast.values[index as usize],
                PropertyAttributes::default_data(),
            );
        }
        log::debug!(
            "elements to dictionary: {} entries, {} holes dropped",
            dict.len(),
            fast.holes()
        );
        *self = Elements::Dictionary(dict);
    }
}

impl Default for Elements {
    fn default() -> Self {
        Self::new()
    }
}

impl Trace for Elements {
    fn trace(&self, tracer: &mut dyn Tracer) {
        match self {
            Elements::Fast(fast) => {
                for &value in &fast.values {
                    tracer.mark_value(value);
                }
            }
            Elements::Dictionary(dict) => dict.trace(tracer),
        }
    }
}
