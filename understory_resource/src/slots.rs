// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generational slot storage backing dictionary and object handles.
//!
//! - On insert, a fresh slot is allocated with generation `1`.
//! - On remove, the slot is freed; any handle that pointed to it is now stale.
//! - On reuse of a freed slot, its generation is incremented, so stale handles
//!   never alias a different live entry.

use alloc::vec::Vec;

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Clone, Debug)]
pub(crate) struct Slots<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> Slots<T> {
    /// Stores `value` and returns its `(index, generation)` pair.
    pub(crate) fn insert(&mut self, value: T) -> (u32, u32) {
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.value = Some(value);
            (idx, slot.generation)
        } else {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "more than u32::MAX live slots is not supported"
            )]
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 1,
                value: Some(value),
            });
            (idx, 1)
        }
    }

    pub(crate) fn get(&self, idx: u32, generation: u32) -> Option<&T> {
        self.slots
            .get(idx as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub(crate) fn get_mut(&mut self, idx: u32, generation: u32) -> Option<&mut T> {
        self.slots
            .get_mut(idx as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub(crate) fn remove(&mut self, idx: u32, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        self.free.push(idx);
        Some(value)
    }

    /// Iterates live entries as `(index, generation, value)`.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (u32, u32, &mut T)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(idx, slot)| {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "indices fit in u32 by construction"
            )]
            let idx = idx as u32;
            let generation = slot.generation;
            slot.value.as_mut().map(|value| (idx, generation, value))
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}
