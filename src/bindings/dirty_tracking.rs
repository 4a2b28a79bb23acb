// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
This module implements "N-frame dirty tracking" for values that are replicated once per frame slot.

Each logical value has one authoritative copy on the CPU and one physical copy embedded in every
frame slot.  Editing the authoritative value marks the entry stale in every replica; a flush into a
slot writes the physical representation and clears that slot's mark.  The dirty count of an entry
is the number of replicas still stale.  Once it reaches zero, every replica agrees with the
authoritative value and further flushes skip the entry.

Marks are kept per replica, so flushing the same slot twice counts once, and the count is *reset*
to all replicas on edit.  An edit landing halfway through a propagation must reach the slots that
were already refreshed with the older value.

```text
edit ──▶ dirty=3 ──flush(0)──▶ dirty=2 ──flush(1)──▶ dirty=1 ──flush(2)──▶ dirty=0
                                  │
                         edit ────┘ dirty=3 (slot 0 holds the old value again)
```
*/

use std::fmt::{Debug, Formatter};
use std::hash::Hash;
use std::marker::PhantomData;

use crate::bindings::constants::CRepr;

/**
A logical value that has a GPU-layout physical representation.
*/
pub trait Replicate {
    type Physical: CRepr;
    fn to_physical(&self) -> Self::Physical;
}

/**
Stable handle to an entry of a [ReplicatedResourceSet].

The handle doubles as the entry's index into every slot's [ConstantRegion].
*/
pub struct ResourceId<V> {
    index: u32,
    set: u32,
    _marker: PhantomData<fn() -> V>,
}

impl<V> ResourceId<V> {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

// Boilerplate implementations; derives would wrongly require bounds on V.
impl<V> Clone for ResourceId<V> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<V> Copy for ResourceId<V> {}
impl<V> PartialEq for ResourceId<V> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.set == other.set
    }
}
impl<V> Eq for ResourceId<V> {}
impl<V> Hash for ResourceId<V> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.set.hash(state);
    }
}
impl<V> Debug for ResourceId<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResourceId({}#{})", self.set, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("resource {index} does not belong to this set")]
pub struct UnknownResource {
    pub index: usize,
}

/// A flush named a replica the set does not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("replica {slot} does not exist; the set has {replicas}")]
pub struct UnknownReplica {
    pub slot: usize,
    pub replicas: usize,
}

/**
The physical copies embedded in one frame slot, addressed by [ResourceId::index].
*/
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantRegion<P> {
    elements: Vec<P>,
}

impl<P: CRepr> ConstantRegion<P> {
    pub fn with_capacity(capacity: usize) -> Self {
        ConstantRegion {
            elements: Vec::with_capacity(capacity),
        }
    }
    /// Number of entries written so far.  Entries registered but never flushed here are not counted.
    pub fn len(&self) -> usize {
        self.elements.len()
    }
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
    /// The physical copy of entry `index`, as of the last flush into this region.
    pub fn get(&self, index: usize) -> Option<&P> {
        self.elements.get(index)
    }
    /// Every entry in GPU layout, ready to upload.
    pub fn as_slice(&self) -> &[P] {
        &self.elements
    }
    fn write(&mut self, index: usize, value: P) {
        if index >= self.elements.len() {
            //entries are dense and start dirty, so the first flush into a slot fills every gap
            self.elements.resize(index + 1, value);
        }
        self.elements[index] = value;
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    /// One flag per replica that still holds an older value.
    stale: Vec<bool>,
    dirty: usize,
}

impl<V> Entry<V> {
    fn mark_all(&mut self) {
        self.stale.fill(true);
        self.dirty = self.stale.len();
    }
}

static NEXT_SET: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(0);

/**
Generic N-buffered, dirty-propagated value store.

One set exists per kind of payload (render-item transforms, materials, ...).  Physical copies live
in the frame slots; the set itself only holds the authoritative values and their countdowns.
*/
pub struct ReplicatedResourceSet<V: Replicate> {
    entries: Vec<Entry<V>>,
    replicas: usize,
    set: u32,
}

impl<V: Replicate + Debug> Debug for ReplicatedResourceSet<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatedResourceSet")
            .field("entries", &self.entries)
            .field("replicas", &self.replicas)
            .finish()
    }
}

impl<V: Replicate> ReplicatedResourceSet<V> {
    /**
    Creates an empty set whose values are replicated into `replicas` slots.
    */
    pub fn new(replicas: usize) -> Self {
        ReplicatedResourceSet {
            entries: Vec::new(),
            replicas,
            set: NEXT_SET.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
        }
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /**
    Adds an entry.  It starts dirty so that every replica receives its initial value.
    */
    pub fn register(&mut self, value: V) -> ResourceId<V> {
        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            value,
            stale: vec![true; self.replicas],
            dirty: self.replicas,
        });
        ResourceId {
            index,
            set: self.set,
            _marker: PhantomData,
        }
    }

    fn entry(&self, id: ResourceId<V>) -> Result<&Entry<V>, UnknownResource> {
        if id.set != self.set {
            return Err(UnknownResource { index: id.index() });
        }
        self.entries
            .get(id.index())
            .ok_or(UnknownResource { index: id.index() })
    }

    fn entry_mut(&mut self, id: ResourceId<V>) -> Result<&mut Entry<V>, UnknownResource> {
        if id.set != self.set {
            return Err(UnknownResource { index: id.index() });
        }
        self.entries
            .get_mut(id.index())
            .ok_or(UnknownResource { index: id.index() })
    }

    /// The authoritative value.
    pub fn get(&self, id: ResourceId<V>) -> Result<&V, UnknownResource> {
        self.entry(id).map(|e| &e.value)
    }

    /// Remaining flushes before every replica agrees with the authoritative value.
    pub fn dirty_count(&self, id: ResourceId<V>) -> Result<usize, UnknownResource> {
        self.entry(id).map(|e| e.dirty)
    }

    /// Whether any entry still needs to reach some replica.
    pub fn any_dirty(&self) -> bool {
        self.entries.iter().any(|e| e.dirty > 0)
    }

    /**
    Restarts propagation of the entry to all replicas, regardless of how far a previous
    propagation got.
    */
    pub fn mark_dirty(&mut self, id: ResourceId<V>) -> Result<(), UnknownResource> {
        self.entry_mut(id)?.mark_all();
        Ok(())
    }

    /// Mutates the authoritative value and marks it dirty.
    pub fn edit<R>(&mut self, id: ResourceId<V>, f: impl FnOnce(&mut V) -> R) -> Result<R, UnknownResource> {
        let entry = self.entry_mut(id)?;
        let r = f(&mut entry.value);
        entry.mark_all();
        Ok(r)
    }

    /// Replaces the authoritative value and marks it dirty.
    pub fn replace(&mut self, id: ResourceId<V>, value: V) -> Result<V, UnknownResource> {
        self.edit(id, |v| std::mem::replace(v, value))
    }

    /**
    Writes every entry that is stale in replica `slot_index` into `region`, the copy belonging to
    that slot, and marks it current there.

    Entries already current in this replica are skipped, so flushing the same slot twice writes
    nothing the second time.  Returns the number of entries written.

    # Errors
    [UnknownReplica] if `slot_index` is not below the replica count.  Nothing is written.
    */
    pub fn flush(
        &mut self,
        slot_index: usize,
        region: &mut ConstantRegion<V::Physical>,
    ) -> Result<usize, UnknownReplica> {
        if slot_index >= self.replicas {
            return Err(UnknownReplica {
                slot: slot_index,
                replicas: self.replicas,
            });
        }
        let mut written = 0;
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.stale[slot_index] {
                region.write(index, entry.value.to_physical());
                entry.stale[slot_index] = false;
                entry.dirty -= 1;
                written += 1;
            }
        }
        if written > 0 {
            logwise::trace_sync!(
                "flushed {written} entries into slot {slot}",
                written = logwise::privacy::LogIt(&written),
                slot = logwise::privacy::LogIt(&slot_index)
            );
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Scalar(f32);
    impl Replicate for Scalar {
        type Physical = f32;
        fn to_physical(&self) -> f32 {
            self.0 * 2.0
        }
    }

    fn regions(n: usize) -> Vec<ConstantRegion<f32>> {
        (0..n).map(|_| ConstantRegion::with_capacity(4)).collect()
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn register_reaches_every_replica() {
        let mut set = ReplicatedResourceSet::new(3);
        let mut regions = regions(3);
        let a = set.register(Scalar(1.0));
        let b = set.register(Scalar(5.0));
        for (i, r) in regions.iter_mut().enumerate() {
            assert_eq!(set.flush(i, r), Ok(2));
        }
        for r in &regions {
            assert_eq!(r.as_slice(), &[2.0, 10.0]);
        }
        assert_eq!(set.dirty_count(a), Ok(0));
        assert_eq!(set.dirty_count(b), Ok(0));
        assert!(!set.any_dirty());
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn edit_converges_after_n_flushes() {
        let mut set = ReplicatedResourceSet::new(3);
        let mut regions = regions(3);
        let a = set.register(Scalar(1.0));
        let b = set.register(Scalar(2.0));
        for (i, r) in regions.iter_mut().enumerate() {
            set.flush(i, r).unwrap();
        }
        set.replace(a, Scalar(7.0)).unwrap();
        for (i, r) in regions.iter_mut().enumerate() {
            //only the edited entry is written
            assert_eq!(set.flush(i, r), Ok(1));
        }
        for r in &regions {
            assert_eq!(r.get(a.index()), Some(&14.0));
            assert_eq!(r.get(b.index()), Some(&4.0));
        }
        assert_eq!(set.dirty_count(a), Ok(0));
        for (i, r) in regions.iter_mut().enumerate() {
            assert_eq!(set.flush(i, r), Ok(0));
        }
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn redirty_restarts_window() {
        let mut set = ReplicatedResourceSet::new(3);
        let mut regions = regions(3);
        let a = set.register(Scalar(0.0));
        for (i, r) in regions.iter_mut().enumerate() {
            set.flush(i, r).unwrap();
        }
        set.replace(a, Scalar(1.0)).unwrap();
        set.flush(0, &mut regions[0]).unwrap();
        assert_eq!(set.dirty_count(a), Ok(2));
        set.edit(a, |v| v.0 = 3.0).unwrap();
        assert_eq!(set.dirty_count(a), Ok(3));
        set.flush(1, &mut regions[1]).unwrap();
        set.flush(2, &mut regions[2]).unwrap();
        //slot 0 still holds the intermediate value
        assert_eq!(set.dirty_count(a), Ok(1));
        assert_eq!(regions[0].get(0), Some(&2.0));
        set.flush(0, &mut regions[0]).unwrap();
        assert_eq!(set.dirty_count(a), Ok(0));
        for r in &regions {
            assert_eq!(r.get(0), Some(&6.0));
        }
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn repeated_slot_counts_once() {
        let mut set = ReplicatedResourceSet::new(2);
        let mut regions = regions(2);
        let a = set.register(Scalar(1.0));
        assert_eq!(set.flush(0, &mut regions[0]), Ok(1));
        for _ in 0..4 {
            assert_eq!(set.flush(0, &mut regions[0]), Ok(0));
        }
        //slot 1 has not seen the value yet
        assert_eq!(set.dirty_count(a), Ok(1));
        assert!(regions[1].is_empty());
        assert_eq!(set.flush(1, &mut regions[1]), Ok(1));
        assert_eq!(set.dirty_count(a), Ok(0));
        set.mark_dirty(a).unwrap();
        assert_eq!(set.dirty_count(a), Ok(2));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn flush_into_missing_replica() {
        let mut set = ReplicatedResourceSet::new(2);
        let mut region = ConstantRegion::with_capacity(1);
        let a = set.register(Scalar(1.0));
        assert_eq!(
            set.flush(2, &mut region),
            Err(UnknownReplica {
                slot: 2,
                replicas: 2
            })
        );
        assert!(region.is_empty());
        assert_eq!(set.dirty_count(a), Ok(2));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn foreign_ids_are_rejected() {
        let mut one = ReplicatedResourceSet::new(3);
        let mut two = ReplicatedResourceSet::new(3);
        let _ = two.register(Scalar(0.0));
        let foreign = two.register(Scalar(0.0));
        let _ = one.register(Scalar(0.0));
        assert_eq!(one.mark_dirty(foreign), Err(UnknownResource { index: 1 }));
        assert!(one.get(foreign).is_err());
    }
}
