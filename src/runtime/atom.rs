//! Atoms and property keys
//!
//! Property names are interned once into an [`AtomTable`] and compared by
//! id afterwards. Symbols are atoms too, but every symbol is unique even when
//! two share a description.
//!
//! Strings that spell a canonical array index ("0", "17", never "017") are
//! not atoms at all: [`AtomTable::key`] normalizes them to
//! [`PropertyKey::Index`] so they take the element path.

use std::fmt;

use rustc_hash::FxHashMap;

/// Marker bit distinguishing symbols from strings in an atom id
pub const SYMBOL_MARKER: u32 = 1 << 26;

/// Largest valid array index (2^32 - 2)
pub const MAX_ARRAY_INDEX: u32 = u32::MAX - 1;

/// An interned string or a unique symbol
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Atom(u32);

impl Atom {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Atom(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check if this atom is a symbol
    #[inline]
    pub const fn is_symbol(self) -> bool {
        (self.0 & SYMBOL_MARKER) != 0
    }

    /// Check if this atom is a string
    #[inline]
    pub const fn is_string(self) -> bool {
        !self.is_symbol()
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_symbol() {
            write!(f, "Symbol({})", self.0 & !SYMBOL_MARKER)
        } else {
            write!(f, "Atom({})", self.0)
        }
    }
}

/// A normalized property key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PropertyKey {
    /// Named property (string or symbol)
    Atom(Atom),
    /// Array index below 2^32 - 1
    Index(u32),
}

impl PropertyKey {
    #[inline]
    pub fn as_index(self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) => Some(i),
            PropertyKey::Atom(_) => None,
        }
    }

    #[inline]
    pub fn as_atom(self) -> Option<Atom> {
        match self {
            PropertyKey::Atom(a) => Some(a),
            PropertyKey::Index(_) => None,
        }
    }

    #[inline]
    pub fn is_symbol(self) -> bool {
        matches!(self, PropertyKey::Atom(a) if a.is_symbol())
    }
}

impl From<Atom> for PropertyKey {
    fn from(atom: Atom) -> Self {
        PropertyKey::Atom(atom)
    }
}

impl From<u32> for PropertyKey {
    /// `u32::MAX` is not an array index; callers spelling it as a key must go
    /// through [`AtomTable::key`] instead.
    fn from(index: u32) -> Self {
        debug_assert!(index <= MAX_ARRAY_INDEX);
        PropertyKey::Index(index)
    }
}

/// Check if a string represents a canonical array index
#[inline]
pub fn is_array_index(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }

    // Fast path for single digits
    if s.len() == 1 {
        let b = s.as_bytes()[0];
        if b.is_ascii_digit() {
            return Some((b - b'0') as u32);
        }
        return None;
    }

    // Leading zeros are not valid (except "0"), and neither is a sign
    if s.starts_with('0') || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    s.parse::<u32>().ok().filter(|&n| n <= MAX_ARRAY_INDEX)
}

#[derive(Debug)]
enum AtomEntry {
    String(Box<str>),
    Symbol(Option<Box<str>>),
}

/// String interning table
///
/// Maintains the set of unique strings plus every symbol ever created.
/// Atoms are never freed.
#[derive(Debug, Default)]
pub struct AtomTable {
    strings: Vec<AtomEntry>,
    symbols: Vec<AtomEntry>,
    lookup: FxHashMap<Box<str>, Atom>,
}

impl AtomTable {
    /// Create a new atom table
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of interned strings and symbols
    #[inline]
    pub fn count(&self) -> usize {
        self.strings.len() + self.symbols.len()
    }

    /// Intern a string, returning the existing atom if already present
    pub fn intern(&mut self, s: &str) -> Atom {
        if let Some(&atom) = self.lookup.get(s) {
            return atom;
        }
        let atom = Atom(self.strings.len() as u32);
        debug_assert!(atom.0 < SYMBOL_MARKER, "atom table exhausted");
        self.strings.push(AtomEntry::String(s.into()));
        self.lookup.insert(s.into(), atom);
        atom
    }

    /// Create a fresh symbol
    pub fn symbol(&mut self, description: Option<&str>) -> Atom {
        let atom = Atom(self.symbols.len() as u32 | SYMBOL_MARKER);
        self.symbols.push(AtomEntry::Symbol(description.map(Into::into)));
        atom
    }

    /// Normalize a source-level key: canonical indices become element keys
    pub fn key(&mut self, s: &str) -> PropertyKey {
        match is_array_index(s) {
            Some(index) => PropertyKey::Index(index),
            None => PropertyKey::Atom(self.intern(s)),
        }
    }

    /// Resolve a string atom to its text, or a symbol to its description
    pub fn name(&self, atom: Atom) -> Option<&str> {
        let entry = if atom.is_symbol() {
            self.symbols.get((atom.0 & !SYMBOL_MARKER) as usize)?
        } else {
            self.strings.get(atom.0 as usize)?
        };
        match entry {
            AtomEntry::String(s) => Some(s),
            AtomEntry::Symbol(desc) => desc.as_deref(),
        }
    }

    /// Render a key for diagnostics
    pub fn display(&self, key: PropertyKey) -> String {
        match key {
            PropertyKey::Index(i) => i.to_string(),
            PropertyKey::Atom(a) if a.is_symbol() => {
                format!("Symbol({})", self.name(a).unwrap_or(""))
            }
            PropertyKey::Atom(a) => self.name(a).unwrap_or("<unknown>").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_array_index() {
        assert_eq!(is_array_index("0"), Some(0));
        assert_eq!(is_array_index("1"), Some(1));
        assert_eq!(is_array_index("42"), Some(42));
        assert_eq!(is_array_index("4294967294"), Some(MAX_ARRAY_INDEX));
        assert_eq!(is_array_index("4294967295"), None); // 2^32 - 1 is a name
        assert_eq!(is_array_index(""), None);
        assert_eq!(is_array_index("01"), None); // Leading zero
        assert_eq!(is_array_index("-1"), None); // Negative
        assert_eq!(is_array_index("+1"), None);
        assert_eq!(is_array_index("abc"), None);
        assert_eq!(is_array_index("1.5"), None);
    }

    #[test]
    fn test_intern_is_stable() {
        let mut table = AtomTable::new();
        let a = table.intern("hello");
        let b = table.intern("hello");
        let c = table.intern("world");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.name(a), Some("hello"));
        assert_eq!(table.count(), 2);
    }

    #[test]
    fn test_symbols_are_unique() {
        let mut table = AtomTable::new();
        let s1 = table.symbol(Some("tag"));
        let s2 = table.symbol(Some("tag"));
        let name = table.intern("tag");

        assert_ne!(s1, s2);
        assert!(s1.is_symbol());
        assert!(!name.is_symbol());
        assert_ne!(s1, name);
        assert_eq!(table.name(s2), Some("tag"));
    }

    #[test]
    fn test_key_normalizes_indices() {
        let mut table = AtomTable::new();
        assert_eq!(table.key("7"), PropertyKey::Index(7));
        assert!(matches!(table.key("07"), PropertyKey::Atom(_)));
        assert!(matches!(table.key("length"), PropertyKey::Atom(_)));
        assert_eq!(table.display(PropertyKey::Index(3)), "3");
    }
}
