//! Property attributes and descriptors
//!
//! [`PropertyAttributes`] is the compact per-property record stored in shapes
//! and dictionary entries. [`PropertyDescriptor`] is the partial, user-facing
//! form accepted by `DefineOwnProperty`.

use std::fmt;

use crate::value::Value;

/// Packed property attributes
///
/// Layout (from LSB):
/// - Bit 0: writable
/// - Bit 1: enumerable
/// - Bit 2: configurable
/// - Bit 3: accessor (slot holds a getter/setter pair)
/// - Bit 4: inlined (slot lives in the object's inline region)
/// - Bits 5-31: slot offset
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct PropertyAttributes(u32);

impl PropertyAttributes {
    const WRITABLE: u32 = 1 << 0;
    const ENUMERABLE: u32 = 1 << 1;
    const CONFIGURABLE: u32 = 1 << 2;
    const ACCESSOR: u32 = 1 << 3;
    const INLINED: u32 = 1 << 4;

    /// Bits that describe behavior rather than location
    const FLAG_MASK: u32 = Self::WRITABLE | Self::ENUMERABLE | Self::CONFIGURABLE | Self::ACCESSOR;
    const OFFSET_SHIFT: u32 = 5;

    /// Largest encodable slot offset
    pub const MAX_OFFSET: u32 = (1 << (32 - Self::OFFSET_SHIFT)) - 1;

    /// Data property with explicit flags, no location yet
    #[inline]
    pub const fn data(writable: bool, enumerable: bool, configurable: bool) -> Self {
        let mut bits = 0;
        if writable {
            bits |= Self::WRITABLE;
        }
        if enumerable {
            bits |= Self::ENUMERABLE;
        }
        if configurable {
            bits |= Self::CONFIGURABLE;
        }
        PropertyAttributes(bits)
    }

    /// Accessor property with explicit flags, no location yet
    #[inline]
    pub const fn accessor(enumerable: bool, configurable: bool) -> Self {
        let base = Self::data(false, enumerable, configurable);
        PropertyAttributes(base.0 | Self::ACCESSOR)
    }

    /// Writable, enumerable, configurable data property
    #[inline]
    pub const fn default_data() -> Self {
        Self::data(true, true, true)
    }

    /// Attributes reported for a key that was not found
    #[inline]
    pub const fn not_found() -> Self {
        Self::default_data()
    }

    #[inline]
    pub const fn is_writable(self) -> bool {
        (self.0 & Self::WRITABLE) != 0
    }

    #[inline]
    pub const fn is_enumerable(self) -> bool {
        (self.0 & Self::ENUMERABLE) != 0
    }

    #[inline]
    pub const fn is_configurable(self) -> bool {
        (self.0 & Self::CONFIGURABLE) != 0
    }

    #[inline]
    pub const fn is_accessor(self) -> bool {
        (self.0 & Self::ACCESSOR) != 0
    }

    #[inline]
    pub const fn is_inlined(self) -> bool {
        (self.0 & Self::INLINED) != 0
    }

    /// Slot offset within the shape layout
    #[inline]
    pub const fn offset(self) -> u32 {
        self.0 >> Self::OFFSET_SHIFT
    }

    /// Same flags at a new location
    #[inline]
    pub const fn with_location(self, offset: u32, inlined: bool) -> Self {
        assert!(offset <= Self::MAX_OFFSET, "property offset out of range");
        let mut bits = (self.0 & Self::FLAG_MASK) | (offset << Self::OFFSET_SHIFT);
        if inlined {
            bits |= Self::INLINED;
        }
        PropertyAttributes(bits)
    }

    /// Drop location information, keeping only the behavior flags
    #[inline]
    pub const fn flags_only(self) -> Self {
        PropertyAttributes(self.0 & Self::FLAG_MASK)
    }

    /// Compare behavior flags, ignoring location
    #[inline]
    pub const fn same_flags(self, other: Self) -> bool {
        (self.0 & Self::FLAG_MASK) == (other.0 & Self::FLAG_MASK)
    }

    /// Raw flag bits, used as part of a transition key
    #[inline]
    pub const fn flag_bits(self) -> u8 {
        (self.0 & Self::FLAG_MASK) as u8
    }

    #[inline]
    pub fn set_writable(&mut self, on: bool) {
        self.set_bit(Self::WRITABLE, on);
    }

    #[inline]
    pub fn set_enumerable(&mut self, on: bool) {
        self.set_bit(Self::ENUMERABLE, on);
    }

    #[inline]
    pub fn set_configurable(&mut self, on: bool) {
        self.set_bit(Self::CONFIGURABLE, on);
    }

    #[inline]
    pub fn set_accessor(&mut self, on: bool) {
        self.set_bit(Self::ACCESSOR, on);
        if on {
            self.set_bit(Self::WRITABLE, false);
        }
    }

    #[inline]
    fn set_bit(&mut self, bit: u32, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

impl Default for PropertyAttributes {
    fn default() -> Self {
        Self::default_data()
    }
}

impl fmt::Debug for PropertyAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |on: bool, c: char| if on { c } else { '-' };
        write!(
            f,
            "{}{}{}{}@{}{}",
            flag(self.is_writable(), 'w'),
            flag(self.is_enumerable(), 'e'),
            flag(self.is_configurable(), 'c'),
            flag(self.is_accessor(), 'a'),
            self.offset(),
            if self.is_inlined() { "i" } else { "" },
        )
    }
}

/// A partial property descriptor, as passed to `DefineOwnProperty`
///
/// Absent fields mean "leave as is" for existing properties and "false /
/// undefined" for new ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub value: Option<Value>,
    pub get: Option<Value>,
    pub set: Option<Value>,
    pub writable: Option<bool>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    /// Fully populated data descriptor
    pub fn data(value: Value, attrs: PropertyAttributes) -> Self {
        PropertyDescriptor {
            value: Some(value),
            writable: Some(attrs.is_writable()),
            enumerable: Some(attrs.is_enumerable()),
            configurable: Some(attrs.is_configurable()),
            ..Default::default()
        }
    }

    /// Fully populated accessor descriptor
    pub fn accessor(get: Value, set: Value, attrs: PropertyAttributes) -> Self {
        PropertyDescriptor {
            get: Some(get),
            set: Some(set),
            enumerable: Some(attrs.is_enumerable()),
            configurable: Some(attrs.is_configurable()),
            ..Default::default()
        }
    }

    /// Writable, enumerable, configurable data descriptor
    pub fn with_value(value: Value) -> Self {
        Self::data(value, PropertyAttributes::default_data())
    }

    #[inline]
    pub fn is_accessor_descriptor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    #[inline]
    pub fn is_data_descriptor(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    #[inline]
    pub fn is_generic_descriptor(&self) -> bool {
        !self.is_accessor_descriptor() && !self.is_data_descriptor()
    }

    /// Attributes for a brand-new property described by this descriptor
    pub fn to_new_attributes(&self) -> PropertyAttributes {
        let enumerable = self.enumerable.unwrap_or(false);
        let configurable = self.configurable.unwrap_or(false);
        if self.is_accessor_descriptor() {
            PropertyAttributes::accessor(enumerable, configurable)
        } else {
            PropertyAttributes::data(self.writable.unwrap_or(false), enumerable, configurable)
        }
    }
}
