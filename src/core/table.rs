use std::ops::{Index, IndexMut};

use crate::{core::slot::Slot, prelude::*, quantity::{Zero, energy::WattHours}};

/// The load table: the ordered hourly series of forecast slots.
///
/// The scheduler owns the scheduling flags on the slots and rebuilds them
/// every planning cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadTable {
    slots: Vec<Slot>,
}

impl LoadTable {
    pub fn new(slots: Vec<Slot>) -> Result<Self> {
        ensure!(
            slots.iter().enumerate().all(|(index, slot)| slot.index == index),
            "slot indexes must be dense and ascending",
        );
        ensure!(
            slots.iter().all(|slot| {
                slot.consumption >= WattHours::ZERO && slot.pv >= WattHours::ZERO
            }),
            "consumption and production cannot be negative",
        );
        Ok(Self { slots })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index)
    }
}

impl Index<usize> for LoadTable {
    type Output = Slot;

    fn index(&self, index: usize) -> &Self::Output {
        &self.slots[index]
    }
}

impl IndexMut<usize> for LoadTable {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.slots[index]
    }
}
