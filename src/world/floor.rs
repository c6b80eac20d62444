use crate::inventory::ItemId;

use super::character::Position;

/// An item stack lying on the ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloorItem {
    pub item: ItemId,
    pub amount: u32,
    pub map: u16,
    pub position: Position,
}

/// Items that did not fit into an inventory or were dropped by a GM. Not persisted.
#[derive(Debug, Default)]
pub struct Floor {
    items: Vec<FloorItem>,
}

impl Floor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drop_item(&mut self, item: ItemId, amount: u32, map: u16, position: Position) {
        if amount == 0 {
            return;
        }
        self.items.push(FloorItem {
            item,
            amount,
            map,
            position,
        });
    }

    pub fn items_at(&self, map: u16, position: Position) -> impl Iterator<Item = &FloorItem> {
        self.items
            .iter()
            .filter(move |i| i.map == map && i.position == position)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_at_filters_by_map_and_tile() {
        let mut floor = Floor::new();
        let here = Position::new(4, 4);
        floor.drop_item(ItemId(1), 3, 1, here);
        floor.drop_item(ItemId(2), 1, 2, here);
        floor.drop_item(ItemId(3), 0, 1, here);
        assert_eq!(floor.len(), 2);
        let found: Vec<_> = floor.items_at(1, here).map(|i| i.item).collect();
        assert_eq!(found, vec![ItemId(1)]);
    }
}
