//! Atomic application of two accepted offer lists.
//!
//! Offers are only proposals: between an `ADD` and the final accept the items can be
//! dropped, consumed or moved by another system, so every entry is checked again here
//! against the live inventory. Any mismatch aborts the whole exchange; nothing is
//! substituted or partially applied.

use thiserror::Error;

use crate::inventory::{InventoryLedger, InventoryTransaction, ItemCatalog, ItemId};
use crate::world::CharacterId;

use super::offer::OfferList;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("{owner} slot {slot} no longer holds item {expected} (found {found:?})")]
    SlotChanged {
        owner: CharacterId,
        slot: usize,
        expected: ItemId,
        found: Option<ItemId>,
    },

    #[error("{owner} slot {slot} holds {held} of item {item}, offer needs {wanted}")]
    Insufficient {
        owner: CharacterId,
        slot: usize,
        item: ItemId,
        wanted: u32,
        held: u32,
    },

    #[error("{receiver} has no room for {unplaced} of item {item}")]
    NoRoom {
        receiver: CharacterId,
        item: ItemId,
        unplaced: u32,
    },

    #[error("{owner} offered {wanted} money but holds {held}")]
    InsufficientMoney {
        owner: CharacterId,
        wanted: u32,
        held: u32,
    },

    #[error("{receiver} cannot hold {amount} more money")]
    MoneyOverflow { receiver: CharacterId, amount: u32 },

    #[error("participant {0} is not available")]
    MissingParticipant(CharacterId),
}

/// One participant's side of a settlement.
pub struct SettlementSide<'a> {
    pub id: CharacterId,
    pub ledger: &'a mut InventoryLedger,
    pub offers: &'a OfferList,
}

/// Move `first.offers` into `second` and `second.offers` into `first`, or change nothing.
///
/// Both sides are debited before anything is delivered, so an offer is only ever backed by
/// what its owner held when the trade was accepted. The result does not depend on which
/// side comes first.
pub fn settle(
    first: SettlementSide<'_>,
    second: SettlementSide<'_>,
    catalog: &ItemCatalog,
) -> Result<(), SettlementError> {
    let mut first_txn = InventoryTransaction::open(first.ledger, catalog);
    let mut second_txn = InventoryTransaction::open(second.ledger, catalog);

    let result = take_offers(first.id, first.offers, &mut first_txn)
        .and_then(|()| take_offers(second.id, second.offers, &mut second_txn))
        .and_then(|()| deliver_offers(first.offers, second.id, &mut second_txn))
        .and_then(|()| deliver_offers(second.offers, first.id, &mut first_txn));

    if result.is_err() {
        first_txn.cancel();
        second_txn.cancel();
    }
    result
}

/// Remove every offered entry and the offered money from the giver.
fn take_offers(
    giver: CharacterId,
    offers: &OfferList,
    from: &mut InventoryTransaction<'_>,
) -> Result<(), SettlementError> {
    for entry in offers.entries() {
        let view = from.view();
        let found = view.item_at(entry.slot);
        if found != Some(entry.item) {
            return Err(SettlementError::SlotChanged {
                owner: giver,
                slot: entry.slot,
                expected: entry.item,
                found,
            });
        }
        let held = view.amount_at(entry.slot);
        if from.remove(entry.item, entry.slot, entry.amount) != entry.amount {
            return Err(SettlementError::Insufficient {
                owner: giver,
                slot: entry.slot,
                item: entry.item,
                wanted: entry.amount,
                held,
            });
        }
    }

    let money = offers.money();
    if money > 0 {
        let held = from.view().money();
        if !from.change_money(-i64::from(money)) {
            return Err(SettlementError::InsufficientMoney {
                owner: giver,
                wanted: money,
                held,
            });
        }
    }
    Ok(())
}

/// Insert what the other side gave up into `to`.
fn deliver_offers(
    offers: &OfferList,
    receiver: CharacterId,
    to: &mut InventoryTransaction<'_>,
) -> Result<(), SettlementError> {
    for entry in offers.entries() {
        let unplaced = to.insert(entry.item, entry.amount);
        if unplaced > 0 {
            return Err(SettlementError::NoRoom {
                receiver,
                item: entry.item,
                unplaced,
            });
        }
    }

    let money = offers.money();
    if money > 0 && !to.deposit_money(money) {
        return Err(SettlementError::MoneyOverflow {
            receiver,
            amount: money,
        });
    }
    Ok(())
}
