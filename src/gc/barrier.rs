//! Write barriers
//!
//! The object model calls the installed barrier after every store of a heap
//! reference into an object slot (named property, element, accessor pair).
//! An incremental or generational collector uses the reports to rescan the
//! owner; the default barrier ignores them.

use rustc_hash::FxHashSet;

use super::ObjectId;

/// Receives every object-to-object reference store
pub trait WriteBarrier {
    /// `owner` now holds a reference to `target`
    fn on_store(&mut self, owner: ObjectId, target: ObjectId);
}

/// Barrier for collectors that never run concurrently with the mutator
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBarrier;

impl WriteBarrier for NoBarrier {
    #[inline]
    fn on_store(&mut self, _owner: ObjectId, _target: ObjectId) {}
}

/// Records owners that received reference stores since the last drain
///
/// Each owner is recorded once no matter how many stores it receives.
#[derive(Debug, Default)]
pub struct RememberedSet {
    owners: FxHashSet<ObjectId>,
    stores: usize,
}

impl RememberedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct owners recorded
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Total stores observed, including repeats
    pub fn stores(&self) -> usize {
        self.stores
    }

    pub fn contains(&self, owner: ObjectId) -> bool {
        self.owners.contains(&owner)
    }

    /// Take every recorded owner, leaving the set empty
    pub fn drain(&mut self) -> Vec<ObjectId> {
        let mut owners: Vec<_> = self.owners.drain().collect();
        owners.sort();
        owners
    }
}

impl WriteBarrier for RememberedSet {
    fn on_store(&mut self, owner: ObjectId, _target: ObjectId) {
        self.stores += 1;
        self.owners.insert(owner);
    }
}

/// Forwards to a shared barrier so the embedder can inspect it afterwards
impl<B: WriteBarrier> WriteBarrier for std::rc::Rc<std::cell::RefCell<B>> {
    fn on_store(&mut self, owner: ObjectId, target: ObjectId) {
        self.borrow_mut().on_store(owner, target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remembered_set_dedups_owners() {
        let mut set = RememberedSet::new();
        let a = ObjectId::from_raw(1);
        let b = ObjectId::from_raw(2);

        set.on_store(a, b);
        set.on_store(a, b);
        set.on_store(b, a);

        assert_eq!(set.len(), 2);
        assert_eq!(set.stores(), 3);
        assert!(set.contains(a));
        assert_eq!(set.drain(), vec![a, b]);
        assert!(set.is_empty());
    }
}
