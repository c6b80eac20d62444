//! Multi-step inventory changes requested by scripts and NPC shops.
//!
//! Changes are applied in order inside one transaction. A failed money change or
//! removal cancels everything applied so far, insertions included, and no insertion
//! remainders are reported. Remainders are only returned with a fully applied batch.

use log::warn;

use super::item::ItemId;
use super::transaction::{InventoryTransaction, InventoryView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryChange {
    Money(i64),
    Remove(ItemId, u32),
    Insert(ItemId, u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every change applied. `unplaced` lists insertion remainders the caller must dispose of.
    Applied { unplaced: Vec<(ItemId, u32)> },
    /// A money change or removal could not be satisfied; the transaction was cancelled.
    Cancelled { failed_at: usize },
}

impl BatchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

pub fn apply_changes(txn: &mut InventoryTransaction<'_>, changes: &[InventoryChange]) -> BatchOutcome {
    let mut unplaced = Vec::new();
    for (index, change) in changes.iter().enumerate() {
        match *change {
            InventoryChange::Money(delta) => {
                if !txn.change_money(delta) {
                    txn.cancel();
                    return BatchOutcome::Cancelled { failed_at: index };
                }
            }
            InventoryChange::Remove(item, amount) => {
                if txn.remove_item(item, amount) != amount {
                    txn.cancel();
                    return BatchOutcome::Cancelled { failed_at: index };
                }
            }
            InventoryChange::Insert(item, amount) => {
                if !txn.catalog().contains(item) {
                    warn!("inventory change skipped unknown item {}", item);
                    continue;
                }
                let left = txn.insert(item, amount);
                if left > 0 {
                    unplaced.push((item, left));
                }
            }
        }
    }
    BatchOutcome::Applied { unplaced }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemQuery {
    Money,
    Item(ItemId),
}

/// Answer several count queries against one snapshot.
pub fn count_many(view: InventoryView<'_>, queries: &[ItemQuery]) -> Vec<u32> {
    queries
        .iter()
        .map(|q| match q {
            ItemQuery::Money => view.money(),
            ItemQuery::Item(id) => view.count(*id),
        })
        .collect()
}
