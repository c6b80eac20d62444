//! Player-to-player trading.
//!
//! A trade is negotiated over several client round-trips ([`TradeEvent`]s in,
//! [`TradeNotice`]s out) by a [`TradeSession`] state machine. Sessions live in the
//! [`SessionRegistry`], which also enforces that a character takes part in at most
//! one trade. The final exchange ([`settlement`]) is all-or-nothing across both
//! inventories.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::inventory::{InventoryLedger, ItemId};
use crate::world::{CharacterId, PublicId};

pub mod notice;
pub mod offer;
pub mod registry;
pub mod session;
pub mod settlement;

pub use notice::{Notifier, Outbox, TradeNotice};
pub use offer::{OfferEntry, OfferList};
pub use registry::SessionRegistry;
pub use session::{SessionEnd, Side, TradeSession, TradeState, Transition};
pub use settlement::SettlementError;

/// Registry-assigned identifier of a trade session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TradeId(pub u32);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trade-{}", self.0)
    }
}

/// Inbound protocol events for a character that is already in a session.
/// Starting a session goes through [`SessionRegistry::begin_session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeEvent {
    /// Responder confirms the request from the character with this public id.
    RequestAck { initiator: PublicId },
    /// Offer `amount` of whatever currently sits in inventory `slot`.
    AddItem { slot: usize, amount: u32 },
    /// Offer this much money (replaces any earlier money offer).
    SetMoney { amount: u32 },
    Accept,
    Cancel,
}

/// Inventory access the trade core needs from whoever owns the characters.
pub trait TradeParties {
    fn ledger(&self, who: CharacterId) -> Option<&InventoryLedger>;

    /// Both ledgers at once, returned in argument order. Implementations resolve them in
    /// ascending [`CharacterId`] order; `None` if either is missing or `a == b`.
    fn ledger_pair_mut(
        &mut self,
        a: CharacterId,
        b: CharacterId,
    ) -> Option<(&mut InventoryLedger, &mut InventoryLedger)>;

    /// Item class currently stored in `slot` of `who`'s inventory.
    fn item_in_slot(&self, who: CharacterId, slot: usize) -> Option<ItemId> {
        self.ledger(who).and_then(|l| l.slot(slot)).map(|s| s.item)
    }
}

/// Pick two distinct entries out of an ordered map, lowest key first, then hand them
/// back in the order they were asked for.
pub(crate) fn ordered_pair_mut<V>(
    map: &mut BTreeMap<CharacterId, V>,
    a: CharacterId,
    b: CharacterId,
) -> Option<(&mut V, &mut V)> {
    if a == b {
        return None;
    }
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    let mut range = map.range_mut(low..=high);
    let (low_id, low_value) = range.next()?;
    if *low_id != low {
        return None;
    }
    let (high_id, high_value) = range.next_back()?;
    if *high_id != high {
        return None;
    }
    if a < b {
        Some((low_value, high_value))
    } else {
        Some((high_value, low_value))
    }
}

impl TradeParties for BTreeMap<CharacterId, InventoryLedger> {
    fn ledger(&self, who: CharacterId) -> Option<&InventoryLedger> {
        self.get(&who)
    }

    fn ledger_pair_mut(
        &mut self,
        a: CharacterId,
        b: CharacterId,
    ) -> Option<(&mut InventoryLedger, &mut InventoryLedger)> {
        ordered_pair_mut(self, a, b)
    }
}
