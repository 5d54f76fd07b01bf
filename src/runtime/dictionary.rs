//! Per-object property dictionary
//!
//! Objects whose layout no longer fits a shape keep their properties here.
//! The table is a chained hash over an append-only entry vector:
//!
//! - buckets: entry index + 1 of the chain head (0 = empty)
//! - entries: `Some(entry)` or a tombstone left by a delete
//!
//! Every entry carries an enumeration index assigned on insertion, so
//! insertion order survives deletes. Tombstones are only reclaimed when the
//! table grows or rehashes, which compacts the entry vector without
//! reordering it.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::error::out_of_memory;
use crate::gc::{Trace, Tracer};
use crate::runtime::property::PropertyAttributes;
use crate::value::Value;

/// One dictionary entry
#[derive(Debug, Clone, Copy)]
pub struct DictEntry<K> {
    pub key: K,
    pub value: Value,
    /// Behavior flags only; dictionary entries have no slot location
    pub attrs: PropertyAttributes,
    enum_index: u32,
    /// Entry index + 1 of the next entry in the bucket chain (0 = end)
    hash_next: u32,
}

impl<K> DictEntry<K> {
    /// Position in insertion order
    #[inline]
    pub fn enum_index(&self) -> u32 {
        self.enum_index
    }
}

/// Hash table from key to (attributes, value)
#[derive(Debug, Clone)]
pub struct Dictionary<K> {
    buckets: Vec<u32>,
    entries: Vec<Option<DictEntry<K>>>,
    live: u32,
    next_enum_index: u32,
}

impl<K: Copy + Eq + Hash> Dictionary<K> {
    /// Minimum bucket count
    const MIN_BUCKETS: usize = 8;

    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a dictionary able to hold `capacity` entries without growing
    pub fn with_capacity(capacity: usize) -> Self {
        let buckets = Self::bucket_count_for(capacity);
        let mut entries = Vec::new();
        if entries.try_reserve(capacity).is_err() {
            out_of_memory("property dictionary");
        }
        Dictionary {
            buckets: vec![0; buckets],
            entries,
            live: 0,
            next_enum_index: 0,
        }
    }

    /// Buckets for `n` entries at a load factor of 3/4
    fn bucket_count_for(n: usize) -> usize {
        (n.saturating_mul(4) / 3 + 1)
            .next_power_of_two()
            .max(Self::MIN_BUCKETS)
    }

    /// Number of live entries
    #[inline]
    pub fn len(&self) -> usize {
        self.live as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Deleted entries not yet reclaimed
    #[inline]
    pub fn tombstones(&self) -> usize {
        self.entries.len() - self.live as usize
    }

    #[inline]
    fn hash(key: &K) -> u32 {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        let h = hasher.finish();
        (h ^ (h >> 32)) as u32
    }

    #[inline]
    fn bucket(&self, key: &K) -> usize {
        Self::hash(key) as usize & (self.buckets.len() - 1)
    }

    /// Entry index of `key`
    fn find(&self, key: &K) -> Option<usize> {
        let mut link = self.buckets[self.bucket(key)];
        while link != 0 {
            let idx = (link - 1) as usize;
            let entry = self.entries[idx].as_ref()?;
            if entry.key == *key {
                return Some(idx);
            }
            link = entry.hash_next;
        }
        None
    }

    pub fn get(&self, key: &K) -> Option<&DictEntry<K>> {
        self.find(key).and_then(|idx| self.entries[idx].as_ref())
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut DictEntry<K>> {
        let idx = self.find(key)?;
        self.entries[idx].as_mut()
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Insert or update an entry
    ///
    /// An update keeps the entry's enumeration index. Returns true if the key
    /// was new.
    pub fn insert(&mut self, key: K, value: Value, attrs: PropertyAttributes) -> bool {
        let attrs = attrs.flags_only();
        if let Some(entry) = self.get_mut(&key) {
            entry.value = value;
            entry.attrs = attrs;
            return false;
        }

        if (self.entries.len() + 1) * 4 > self.buckets.len() * 3 {
            self.rehash(self.live as usize + 1);
        }
        if self.entries.try_reserve(1).is_err() {
            out_of_memory("property dictionary");
        }

        let bucket = self.bucket(&key);
        let idx = self.entries.len();
        self.entries.push(Some(DictEntry {
            key,
            value,
            attrs,
            enum_index: self.next_enum_index,
            hash_next: self.buckets[bucket],
        }));
        self.buckets[bucket] = (idx + 1) as u32;
        self.next_enum_index += 1;
        self.live += 1;
        true
    }

    /// Remove an entry, leaving a tombstone
    pub fn remove(&mut self, key: &K) -> Option<DictEntry<K>> {
        let bucket = self.bucket(key);
        let mut prev: Option<usize> = None;
        let mut link = self.buckets[bucket];

        while link != 0 {
            let idx = (link - 1) as usize;
            let entry = self.entries[idx]?;
            if entry.key == *key {
                match prev {
                    Some(p) => {
                        if let Some(prev_entry) = self.entries[p].as_mut() {
                            prev_entry.hash_next = entry.hash_next;
                        }
                    }
                    None => self.buckets[bucket] = entry.hash_next,
                }
                self.entries[idx] = None;
                self.live -= 1;
                return Some(entry);
            }
            prev = Some(idx);
            link = entry.hash_next;
        }
        None
    }

    /// Rebuild the table for at least `min_live` entries, dropping tombstones
    ///
    /// Survivors keep their relative order and are renumbered densely.
    fn rehash(&mut self, min_live: usize) {
        let buckets = Self::bucket_count_for(min_live.max(self.live as usize * 2));
        let mut entries = Vec::new();
        if entries.try_reserve(buckets * 3 / 4).is_err() {
            out_of_memory("property dictionary");
        }
        log::debug!(
            "dictionary rehash: {} live, {} tombstones, {} -> {} buckets",
            self.live,
            self.tombstones(),
            self.buckets.len(),
            buckets
        );

        self.buckets = vec![0; buckets];
        let old = std::mem::replace(&mut self.entries, entries);
        let mut next = 0;
        for mut entry in old.into_iter().flatten() {
            let bucket = self.bucket(&entry.key);
            entry.enum_index = next;
            entry.hash_next = self.buckets[bucket];
            self.buckets[bucket] = (self.entries.len() + 1) as u32;
            self.entries.push(Some(entry));
            next += 1;
        }
        self.next_enum_index = next;
    }

    /// Live entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &DictEntry<K>> {
        // The entry vector is append-only between rehashes and rehashing
        // preserves order, so physical order is enumeration order.
        self.entries.iter().flatten()
    }

    /// Live keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.iter().map(|e| e.key)
    }

    /// Mutable access to every live entry
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DictEntry<K>> {
        self.entries.iter_mut().flatten()
    }
}

impl<K: Copy + Eq + Hash> Default for Dictionary<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Trace for Dictionary<K> {
    fn trace(&self, tracer: &mut dyn Tracer) {
        for entry in self.entries.iter().flatten() {
            tracer.mark_value(entry.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> PropertyAttributes {
        PropertyAttributes::default_data()
    }

    #[test]
    fn test_empty_table() {
        let dict: Dictionary<u32> = Dictionary::new();
        assert!(dict.is_empty());
        assert_eq!(dict.len(), 0);
        assert!(dict.get(&1).is_none());
    }

    #[test]
    fn test_insert_get_update() {
        let mut dict = Dictionary::new();
        assert!(dict.insert(42u32, Value::int(100), attrs()));
        assert!(!dict.insert(42, Value::int(200), PropertyAttributes::data(false, true, true)));

        assert_eq!(dict.len(), 1);
        let entry = dict.get(&42).unwrap();
        assert_eq!(entry.value, Value::int(200));
        assert!(!entry.attrs.is_writable());
        assert_eq!(entry.enum_index(), 0);
    }

    #[test]
    fn test_insert_strips_location() {
        let mut dict = Dictionary::new();
        dict.insert(1u32, Value::int(1), attrs().with_location(7, true));
        let stored = dict.get(&1).unwrap().attrs;
        assert_eq!(stored.offset(), 0);
        assert!(!stored.is_inlined());
    }

    #[test]
    fn test_delete_tombstones() {
        let mut dict = Dictionary::new();
        for i in 0..5u32 {
            dict.insert(i, Value::int(i as i32), attrs());
        }
        let removed = dict.remove(&2).unwrap();
        assert_eq!(removed.value, Value::int(2));
        assert_eq!(dict.len(), 4);
        assert_eq!(dict.tombstones(), 1);
        assert!(!dict.contains(&2));
        assert!(dict.remove(&2).is_none());
        assert!(dict.contains(&3));
    }

    #[test]
    fn test_order_survives_delete_and_reinsert() {
        let mut dict = Dictionary::new();
        for i in 0..10u32 {
            dict.insert(i, Value::int(0), attrs());
        }
        dict.remove(&5);
        dict.insert(5, Value::int(0), attrs());

        let keys: Vec<_> = dict.keys().collect();
        assert_eq!(keys, vec![0, 1, 2, 3, 4, 6, 7, 8, 9, 5]);
    }

    #[test]
    fn test_growth_reclaims_tombstones() {
        let mut dict = Dictionary::new();
        for i in 0..6u32 {
            dict.insert(i, Value::int(i as i32), attrs());
        }
        for i in 0..5u32 {
            dict.remove(&i);
        }
        assert_eq!(dict.tombstones(), 5);

        for i in 100..200u32 {
            dict.insert(i, Value::int(i as i32), attrs());
        }
        assert_eq!(dict.tombstones(), 0);
        assert_eq!(dict.len(), 101);

        let keys: Vec<_> = dict.keys().take(3).collect();
        assert_eq!(keys, vec![5, 100, 101]);
        let indices: Vec<_> = dict.iter().map(|e| e.enum_index()).collect();
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        for i in 100..200u32 {
            assert_eq!(dict.get(&i).unwrap().value, Value::int(i as i32));
        }
    }

    #[test]
    fn test_many_entries() {
        let mut dict = Dictionary::with_capacity(4);
        for i in 0..1000u32 {
            dict.insert(i, Value::int(i as i32 * 2), attrs());
        }
        assert_eq!(dict.len(), 1000);
        for i in 0..1000u32 {
            assert_eq!(dict.get(&i).unwrap().value, Value::int(i as i32 * 2));
        }
    }
}
