use bevy::prelude::*;

/// Objects that can be recycled through a [`Pool`].
pub trait Poolable: Default {
    /// Returns the object to its canonical state before the slot is reused.
    fn reset(&mut self);
}

/// Generational handle to a pooled object. Releasing the slot invalidates every copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId {
    slot: u32,
    generation: u32,
}

impl PoolId {
    pub fn slot(self) -> usize {
        self.slot as usize
    }
}

#[derive(Debug)]
struct Slot<T> {
    item: T,
    generation: u32,
    in_use: bool,
    dirty: bool,
}

/// Slot pool with a free list and a dirty list for the render sync.
///
/// The backing store grows on demand; `hard_cap` only triggers a one-time warning.
#[derive(Debug)]
pub struct Pool<T: Poolable> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    dirty: Vec<u32>,
    active: usize,
    hard_cap: usize,
    warned: bool,
}

impl<T: Poolable> Pool<T> {
    pub fn with_capacity(soft_cap: usize, hard_cap: usize) -> Self {
        let mut slots = Vec::with_capacity(soft_cap);
        slots.resize_with(soft_cap, || Slot {
            item: T::default(),
            generation: 0,
            in_use: false,
            dirty: false,
        });
        // pop from the back so low slots are handed out first
        let free = (0..soft_cap as u32).rev().collect();
        Self {
            slots,
            free,
            dirty: Vec::new(),
            active: 0,
            hard_cap,
            warned: false,
        }
    }

    /// Takes a slot in its canonical state.
    pub fn acquire(&mut self) -> PoolId {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(Slot {
                    item: T::default(),
                    generation: 0,
                    in_use: false,
                    dirty: false,
                });
                (self.slots.len() - 1) as u32
            }
        };

        self.active += 1;
        if self.active > self.hard_cap && !self.warned {
            warn!("Pool grew past {} live objects", self.hard_cap);
            self.warned = true;
        }

        let entry = &mut self.slots[slot as usize];
        entry.in_use = true;
        let id = PoolId { slot, generation: entry.generation };
        self.mark_dirty(slot);
        id
    }

    /// Resets the object and returns its slot to the free list.
    ///
    /// # Returns
    /// `false` if `id` was already stale, which makes double releases harmless
    pub fn release(&mut self, id: PoolId) -> bool {
        let Some(entry) = self.slots.get_mut(id.slot as usize) else {
            return false;
        };
        if !entry.in_use || entry.generation != id.generation {
            return false;
        }

        entry.item.reset();
        entry.in_use = false;
        entry.generation = entry.generation.wrapping_add(1);
        self.active -= 1;
        self.free.push(id.slot);
        self.mark_dirty(id.slot);
        true
    }

    pub fn get(&self, id: PoolId) -> Option<&T> {
        self.slots
            .get(id.slot as usize)
            .filter(|entry| entry.in_use && entry.generation == id.generation)
            .map(|entry| &entry.item)
    }

    /// Mutable access; the slot is queued for the next render sync.
    pub fn get_mut(&mut self, id: PoolId) -> Option<&mut T> {
        let valid = self
            .slots
            .get(id.slot as usize)
            .is_some_and(|entry| entry.in_use && entry.generation == id.generation);
        if !valid {
            return None;
        }
        self.mark_dirty(id.slot);
        Some(&mut self.slots[id.slot as usize].item)
    }

    pub fn is_live(&self, id: PoolId) -> bool {
        self.get(id).is_some()
    }

    /// Object stored in a slot regardless of whether it is in use.
    pub fn slot(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot).map(|entry| &entry.item)
    }

    /// Handles of every live object.
    pub fn live_ids(&self) -> Vec<PoolId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.in_use)
            .map(|(slot, entry)| PoolId { slot: slot as u32, generation: entry.generation })
            .collect()
    }

    /// Slots changed since the last drain.
    pub fn drain_dirty(&mut self) -> Vec<usize> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty
            .into_iter()
            .map(|slot| {
                self.slots[slot as usize].dirty = false;
                slot as usize
            })
            .collect()
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn mark_dirty(&mut self, slot: u32) {
        let entry = &mut self.slots[slot as usize];
        if !entry.dirty {
            entry.dirty = true;
            self.dirty.push(slot);
        }
    }
}
