//! Per-character inventory record: a fixed number of slots plus a money counter.
use serde::{Deserialize, Serialize};

use super::item::ItemId;

/// Quantity of a single item class held in one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: ItemId,
    pub amount: u32,
}

impl ItemStack {
    pub fn new(item: ItemId, amount: u32) -> Self {
        Self { item, amount }
    }
}

/// Authoritative inventory of one character.
///
/// Mutation goes through [`InventoryTransaction`](super::InventoryTransaction); the
/// ledger only exposes read accessors and the raw constructors used when a record
/// is loaded from storage. Every committed mutation bumps `revision`, which the
/// world uses to decide what needs writing back to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLedger {
    pub(crate) slots: Vec<Option<ItemStack>>,
    pub(crate) money: u32,
    #[serde(skip)]
    pub(crate) revision: u64,
}

impl InventoryLedger {
    /// Empty inventory with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            money: 0,
            revision: 0,
        }
    }

    /// Rebuild a ledger from persisted slot contents. Zero-quantity stacks collapse to empty
    /// slots. The slot vector is padded up to `capacity`; a record saved under a larger
    /// capacity keeps its extra slots so nothing is lost when the limit is lowered.
    pub fn from_parts(mut slots: Vec<Option<ItemStack>>, money: u32, capacity: usize) -> Self {
        if slots.len() < capacity {
            slots.resize(capacity, None);
        }
        for slot in slots.iter_mut() {
            if matches!(slot, Some(stack) if stack.amount == 0) {
                *slot = None;
            }
        }
        Self {
            slots,
            money,
            revision: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn money(&self) -> u32 {
        self.money
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn slot(&self, index: usize) -> Option<&ItemStack> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    pub fn slots(&self) -> &[Option<ItemStack>] {
        &self.slots
    }

    /// Occupied slots as `(index, stack)` pairs.
    pub fn stacks(&self) -> impl Iterator<Item = (usize, &ItemStack)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|stack| (i, stack)))
    }

    /// Total quantity of `item` over all slots.
    pub fn count(&self, item: ItemId) -> u32 {
        self.stacks()
            .filter(|(_, s)| s.item == item)
            .fold(0u32, |acc, (_, s)| acc.saturating_add(s.amount))
    }

    pub fn used_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.money == 0 && self.used_slots() == 0
    }
}
