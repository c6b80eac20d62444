use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::inventory::{InventoryLedger, InventoryTransaction, InventoryView, ItemCatalog};

/// Stable database identity of a character. Also the global ordering used whenever two
/// characters' inventories are locked together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub u32);

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Short per-login identifier clients use to refer to each other on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicId(pub u16);

impl fmt::Display for PublicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance in tiles.
    pub fn distance(&self, other: &Position) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

/// An online character. Owns its inventory; trade participation is tracked by the
/// session registry, keyed by `id`.
#[derive(Debug, Clone)]
pub struct Character {
    pub id: CharacterId,
    pub public_id: PublicId,
    pub name: String,
    pub map: u16,
    pub position: Position,
    pub gm: bool,
    pub created_at: DateTime<Utc>,
    ledger: InventoryLedger,
    persisted_revision: u64,
}

impl Character {
    pub fn new(id: CharacterId, public_id: PublicId, name: &str, ledger: InventoryLedger) -> Self {
        let persisted_revision = ledger.revision();
        Self {
            id,
            public_id,
            name: name.to_string(),
            map: 1,
            position: Position::default(),
            gm: false,
            created_at: Utc::now(),
            ledger,
            persisted_revision,
        }
    }

    pub fn at(mut self, map: u16, position: Position) -> Self {
        self.map = map;
        self.position = position;
        self
    }

    pub fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut InventoryLedger {
        &mut self.ledger
    }

    /// Shared open: query-only view.
    pub fn inventory(&self) -> InventoryView<'_> {
        InventoryView::open(&self.ledger)
    }

    /// Exclusive open: mutations are kept unless the transaction is cancelled.
    pub fn inventory_mut<'a>(&'a mut self, catalog: &'a ItemCatalog) -> InventoryTransaction<'a> {
        InventoryTransaction::open(&mut self.ledger, catalog)
    }

    /// Whether inventory changes happened since the last call to [`Character::mark_persisted`].
    pub fn is_dirty(&self) -> bool {
        self.ledger.revision() != self.persisted_revision
    }

    pub fn mark_persisted(&mut self) {
        self.persisted_revision = self.ledger.revision();
    }

    pub fn is_near(&self, other: &Character, max_distance: u32) -> bool {
        self.map == other.map && self.position.distance(&other.position) <= max_distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::ItemId;

    #[test]
    fn test_dirty_tracking_follows_ledger_revision() {
        let catalog = ItemCatalog::builtin();
        let mut c = Character::new(CharacterId(1), PublicId(10), "Ada", InventoryLedger::new(4));
        assert!(!c.is_dirty());

        c.inventory_mut(&catalog).insert(ItemId(1), 2);
        assert!(c.is_dirty());
        c.mark_persisted();
        assert!(!c.is_dirty());

        let mut txn = c.inventory_mut(&catalog);
        txn.insert(ItemId(1), 2);
        txn.cancel();
        drop(txn);
        assert!(!c.is_dirty());
    }

    #[test]
    fn test_is_near_requires_same_map() {
        let a = Character::new(CharacterId(1), PublicId(1), "A", InventoryLedger::new(1))
            .at(3, Position::new(10, 10));
        let b = Character::new(CharacterId(2), PublicId(2), "B", InventoryLedger::new(1))
            .at(3, Position::new(13, 8));
        let c = b.clone().at(4, Position::new(10, 10));
        assert!(a.is_near(&b, 3));
        assert!(!a.is_near(&b, 2));
        assert!(!a.is_near(&c, 100));
    }
}
