//! Property values
//!
//! A [`Value`] is one tagged machine word. Slots, element vectors and
//! dictionary entries all store it by value, so reading or copying a property
//! never touches the heap.
//!
//! # Encoding
//! - Bit 0 clear: a 31-bit signed integer, shifted left by one
//! - Low two bits set: an immediate with a 5-bit tag and a 27-bit payload
//!
//! Immediates are null, undefined, booleans, the hole marker, atoms
//! (strings and symbols, payload = atom index) and object references
//! (payload = heap index).

use std::fmt;

use crate::gc::ObjectId;
use crate::runtime::atom::Atom;

const INT_TAG_MASK: u32 = 1;
const IMMEDIATE_MASK: u32 = 0b11;
const IMMEDIATE_BITS: u32 = 0b11;
const KIND_BITS: u32 = 5;
const KIND_MASK: u32 = (1 << KIND_BITS) - 1;

/// Immediate kinds; each value has the low two bits set
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bool = 0b00011,
    Null = 0b00111,
    Undefined = 0b01011,
    Hole = 0b01111,
    Atom = 0b10011,
    Object = 0b10111,
}

/// Smallest integer a value can hold inline
pub const INT_MIN: i32 = -(1 << 30);
/// Largest integer a value can hold inline
pub const INT_MAX: i32 = (1 << 30) - 1;

/// Whether `n` can be stored as an inline integer
#[inline]
pub const fn fits_in_short_int(n: i32) -> bool {
    n >= INT_MIN && n <= INT_MAX
}

/// A property value
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Value(u32);

impl Value {
    #[inline]
    const fn immediate(kind: Kind, payload: u32) -> Self {
        Value(kind as u32 | (payload << KIND_BITS))
    }

    #[inline]
    const fn kind_bits(self) -> u32 {
        if self.0 & IMMEDIATE_MASK == IMMEDIATE_BITS {
            self.0 & KIND_MASK
        } else {
            0
        }
    }

    #[inline]
    const fn payload(self) -> u32 {
        self.0 >> KIND_BITS
    }

    #[inline]
    pub const fn null() -> Self {
        Self::immediate(Kind::Null, 0)
    }

    #[inline]
    pub const fn undefined() -> Self {
        Self::immediate(Kind::Undefined, 0)
    }

    #[inline]
    pub const fn bool(b: bool) -> Self {
        Self::immediate(Kind::Bool, b as u32)
    }

    /// Inline integer
    ///
    /// # Panics
    /// If `n` is outside `INT_MIN..=INT_MAX`.
    #[inline]
    pub const fn int(n: i32) -> Self {
        assert!(fits_in_short_int(n), "integer out of 31-bit range");
        Value((n << 1) as u32)
    }

    /// Marker for an empty element slot
    ///
    /// Holes never escape the object model: reads that hit a hole report
    /// "not found" instead of returning it.
    #[inline]
    pub const fn hole() -> Self {
        Self::immediate(Kind::Hole, 0)
    }

    /// String or symbol
    #[inline]
    pub const fn atom(atom: Atom) -> Self {
        Self::immediate(Kind::Atom, atom.raw())
    }

    /// Object reference
    #[inline]
    pub const fn object(id: ObjectId) -> Self {
        Self::immediate(Kind::Object, id.raw())
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == Self::null().0
    }

    #[inline]
    pub const fn is_undefined(self) -> bool {
        self.0 == Self::undefined().0
    }

    /// null or undefined
    #[inline]
    pub const fn is_nullish(self) -> bool {
        self.is_null() || self.is_undefined()
    }

    #[inline]
    pub const fn is_bool(self) -> bool {
        self.kind_bits() == Kind::Bool as u32
    }

    #[inline]
    pub const fn is_int(self) -> bool {
        self.0 & INT_TAG_MASK == 0
    }

    #[inline]
    pub const fn is_hole(self) -> bool {
        self.0 == Self::hole().0
    }

    #[inline]
    pub const fn is_atom(self) -> bool {
        self.kind_bits() == Kind::Atom as u32
    }

    #[inline]
    pub const fn is_object(self) -> bool {
        self.kind_bits() == Kind::Object as u32
    }

    #[inline]
    pub const fn to_bool(self) -> Option<bool> {
        if self.is_bool() {
            Some(self.payload() != 0)
        } else {
            None
        }
    }

    #[inline]
    pub const fn to_i32(self) -> Option<i32> {
        if self.is_int() {
            Some((self.0 as i32) >> 1)
        } else {
            None
        }
    }

    #[inline]
    pub const fn to_atom(self) -> Option<Atom> {
        if self.is_atom() {
            Some(Atom::from_raw(self.payload()))
        } else {
            None
        }
    }

    #[inline]
    pub const fn to_object(self) -> Option<ObjectId> {
        if self.is_object() {
            Some(ObjectId::from_raw(self.payload()))
        } else {
            None
        }
    }

    /// The encoded word
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::undefined()
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::object(id)
    }
}

impl From<Atom> for Value {
    fn from(atom: Atom) -> Self {
        Value::atom(atom)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.to_i32() {
            write!(f, "Int({})", n)
        } else if let Some(b) = self.to_bool() {
            write!(f, "Bool({})", b)
        } else if let Some(atom) = self.to_atom() {
            write!(f, "Atom({})", atom.raw())
        } else if let Some(id) = self.to_object() {
            write!(f, "Object({})", id.raw())
        } else if self.is_null() {
            write!(f, "Null")
        } else if self.is_undefined() {
            write!(f, "Undefined")
        } else if self.is_hole() {
            write!(f, "Hole")
        } else {
            write!(f, "Value(0x{:08x})", self.0)
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.to_i32() {
            write!(f, "{}", n)
        } else if let Some(b) = self.to_bool() {
            write!(f, "{}", b)
        } else if let Some(atom) = self.to_atom() {
            write!(f, "[atom {}]", atom.raw())
        } else if let Some(id) = self.to_object() {
            write!(f, "[object #{}]", id.raw())
        } else if self.is_null() {
            write!(f, "null")
        } else if self.is_undefined() {
            write!(f, "undefined")
        } else if self.is_hole() {
            write!(f, "[hole]")
        } else {
            write!(f, "[unknown]")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullish() {
        assert!(Value::null().is_nullish());
        assert!(Value::undefined().is_nullish());
        assert!(!Value::null().is_undefined());
        assert!(!Value::bool(false).is_nullish());
        assert!(!Value::int(0).is_nullish());
        assert_eq!(Value::default(), Value::undefined());
    }

    #[test]
    fn test_bool() {
        assert_eq!(Value::bool(true).to_bool(), Some(true));
        assert_eq!(Value::bool(false).to_bool(), Some(false));
        assert_eq!(Value::null().to_bool(), None);
        assert!(!Value::bool(true).is_int());
    }

    #[test]
    fn test_int_range() {
        for n in [0, 1, -1, -100, INT_MAX, INT_MIN] {
            let v = Value::int(n);
            assert!(v.is_int());
            assert_eq!(v.to_i32(), Some(n));
            assert!(!v.is_object());
        }
        assert!(fits_in_short_int(INT_MAX));
        assert!(!fits_in_short_int(i32::MAX));
        assert!(!fits_in_short_int(INT_MIN - 1));
    }

    #[test]
    #[should_panic(expected = "31-bit")]
    fn test_int_overflow_panics() {
        Value::int(INT_MAX + 1);
    }

    #[test]
    fn test_hole_is_not_undefined() {
        let h = Value::hole();
        assert!(h.is_hole());
        assert!(!h.is_undefined());
        assert!(!h.is_nullish());
        assert_ne!(h, Value::undefined());
    }

    #[test]
    fn test_object_and_atom_payloads() {
        let obj = Value::object(ObjectId::from_raw(1234));
        assert!(obj.is_object());
        assert!(!obj.is_atom());
        assert_eq!(obj.to_object(), Some(ObjectId::from_raw(1234)));
        assert_ne!(obj, Value::object(ObjectId::from_raw(1235)));

        let atom = Value::atom(Atom::from_raw(77));
        assert!(atom.is_atom());
        assert_eq!(atom.to_atom(), Some(Atom::from_raw(77)));
        assert_eq!(atom.to_object(), None);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format!("{:?}", Value::int(42)), "Int(42)");
        assert_eq!(format!("{:?}", Value::object(ObjectId::from_raw(3))), "Object(3)");
        assert_eq!(format!("{:?}", Value::undefined()), "Undefined");
        assert_eq!(Value::int(-7).to_string(), "-7");
        assert_eq!(Value::null().to_string(), "null");
        assert_eq!(Value::object(ObjectId::from_raw(3)).to_string(), "[object #3]");
    }
}
