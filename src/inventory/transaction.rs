//! Staged access to an [`InventoryLedger`].
//!
//! A ledger is opened either shared ([`InventoryView`], queries only) or exclusive
//! ([`InventoryTransaction`]). Exclusive mutations are applied to the ledger as they
//! happen, with a snapshot taken before the first one; [`InventoryTransaction::cancel`]
//! restores that snapshot. Letting a transaction go out of scope without cancelling it
//! keeps its effects, so there is no separate commit call. While a transaction is
//! open the borrow checker keeps everyone else out of the ledger, so no caller can
//! observe a half-applied multi-step change.

use super::item::{ItemCatalog, ItemId};
use super::ledger::{InventoryLedger, ItemStack};

/// Read-only view for queries such as "how many of item X does this character hold".
#[derive(Debug, Clone, Copy)]
pub struct InventoryView<'a> {
    ledger: &'a InventoryLedger,
}

impl<'a> InventoryView<'a> {
    pub fn open(ledger: &'a InventoryLedger) -> Self {
        Self { ledger }
    }

    /// Item class stored in `slot`, `None` for empty or out-of-range slots.
    pub fn item_at(&self, slot: usize) -> Option<ItemId> {
        self.ledger.slot(slot).map(|s| s.item)
    }

    pub fn amount_at(&self, slot: usize) -> u32 {
        self.ledger.slot(slot).map(|s| s.amount).unwrap_or(0)
    }

    pub fn count(&self, item: ItemId) -> u32 {
        self.ledger.count(item)
    }

    pub fn money(&self) -> u32 {
        self.ledger.money()
    }

    pub fn ledger(&self) -> &'a InventoryLedger {
        self.ledger
    }
}

/// Exclusive, cancellable mutation scope over one ledger.
pub struct InventoryTransaction<'a> {
    ledger: &'a mut InventoryLedger,
    catalog: &'a ItemCatalog,
    snapshot: Option<InventoryLedger>,
}

impl<'a> InventoryTransaction<'a> {
    pub fn open(ledger: &'a mut InventoryLedger, catalog: &'a ItemCatalog) -> Self {
        Self {
            ledger,
            catalog,
            snapshot: None,
        }
    }

    pub fn view(&self) -> InventoryView<'_> {
        InventoryView::open(self.ledger)
    }

    pub fn catalog(&self) -> &ItemCatalog {
        self.catalog
    }

    /// True when this transaction has applied at least one mutation that was not cancelled.
    pub fn has_changes(&self) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|s| s.revision != self.ledger.revision)
    }

    fn stage(&mut self) {
        if self.snapshot.is_none() {
            self.snapshot = Some(self.ledger.clone());
        }
    }

    fn bump(&mut self) {
        self.ledger.revision = self.ledger.revision.wrapping_add(1);
    }

    /// Remove `amount` of `item` from `slot`.
    ///
    /// Returns the quantity removed: either `amount`, or 0 when the slot is empty, holds a
    /// different item, or holds fewer than `amount`. Nothing is ever partially removed.
    pub fn remove(&mut self, item: ItemId, slot: usize, amount: u32) -> u32 {
        if amount == 0 {
            return 0;
        }
        match self.ledger.slot(slot) {
            Some(stack) if stack.item == item && stack.amount >= amount => {}
            _ => return 0,
        }
        self.stage();
        let cell = &mut self.ledger.slots[slot];
        if let Some(stack) = cell {
            stack.amount -= amount;
            if stack.amount == 0 {
                *cell = None;
            }
        }
        self.bump();
        amount
    }

    /// Remove up to `amount` of `item` wherever it is stored, emptying the highest slots first.
    /// Returns the quantity actually removed.
    pub fn remove_item(&mut self, item: ItemId, amount: u32) -> u32 {
        if amount == 0 || self.ledger.count(item) == 0 {
            return 0;
        }
        self.stage();
        let mut wanted = amount;
        for cell in self.ledger.slots.iter_mut().rev() {
            if wanted == 0 {
                break;
            }
            let Some(stack) = cell else { continue };
            if stack.item != item {
                continue;
            }
            let taken = stack.amount.min(wanted);
            stack.amount -= taken;
            wanted -= taken;
            if stack.amount == 0 {
                *cell = None;
            }
        }
        self.bump();
        amount - wanted
    }

    /// Insert `amount` of `item`, topping up existing stacks before using empty slots.
    ///
    /// Returns the quantity that could not be placed (0 on full success). Unknown item
    /// classes place nothing. The caller decides what happens to the remainder.
    pub fn insert(&mut self, item: ItemId, amount: u32) -> u32 {
        if amount == 0 {
            return 0;
        }
        let Some(max_stack) = self.catalog.max_stack(item) else {
            return amount;
        };
        self.stage();
        let mut left = amount;

        for stack in self.ledger.slots.iter_mut().flatten() {
            if left == 0 {
                break;
            }
            if stack.item == item && stack.amount < max_stack {
                let added = (max_stack - stack.amount).min(left);
                stack.amount += added;
                left -= added;
            }
        }

        for cell in self.ledger.slots.iter_mut() {
            if left == 0 {
                break;
            }
            if cell.is_none() {
                let added = max_stack.min(left);
                *cell = Some(ItemStack::new(item, added));
                left -= added;
            }
        }

        if left != amount {
            self.bump();
        }
        left
    }

    /// Apply `delta` to the money counter. A change that would go below zero is refused
    /// (`false`, no effect); a change past the counter's maximum saturates.
    pub fn change_money(&mut self, delta: i64) -> bool {
        let target = i64::from(self.ledger.money).saturating_add(delta);
        if target < 0 {
            return false;
        }
        let target = u32::try_from(target).unwrap_or(u32::MAX);
        if target != self.ledger.money {
            self.stage();
            self.ledger.money = target;
            self.bump();
        }
        true
    }

    /// Add `amount` to the money counter. Refused (`false`, no effect) if the counter
    /// would overflow.
    pub fn deposit_money(&mut self, amount: u32) -> bool {
        let Some(target) = self.ledger.money.checked_add(amount) else {
            return false;
        };
        if target != self.ledger.money {
            self.stage();
            self.ledger.money = target;
            self.bump();
        }
        true
    }

    /// Discard every mutation made since `open`. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.ledger = snapshot;
        }
    }
}
