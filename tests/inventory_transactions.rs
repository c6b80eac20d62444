//! Script-driven inventory changes against an online character.

mod common;

use common::{record, rules, stack};
use tradeworld::inventory::{
    BatchOutcome, InventoryChange, InventoryLedger, InventoryTransaction, ItemCatalog, ItemId,
    ItemQuery,
};
use tradeworld::world::World;

fn world() -> (World, tradeworld::world::CharacterId) {
    let mut world = World::new(rules(), ItemCatalog::builtin());
    let id = world
        .login(record(7, "Cleo", vec![stack(1, 25), stack(6, 100)], 40))
        .unwrap();
    world.take_messages();
    (world, id)
}

#[test]
fn test_shop_purchase_debits_money_and_adds_items() {
    let (mut world, id) = world();
    let outcome = world
        .script_inventory_change(
            id,
            &[InventoryChange::Money(-30), InventoryChange::Insert(ItemId(5), 2)],
        )
        .unwrap();
    assert_eq!(outcome, BatchOutcome::Applied { unplaced: vec![] });
    assert_eq!(
        world.script_count(id, &[ItemQuery::Money, ItemQuery::Item(ItemId(5))]),
        Some(vec![10, 2])
    );
    let dirty = world.take_dirty();
    assert_eq!(dirty.len(), 1);
    assert!(world.take_dirty().is_empty());
}

#[test]
fn test_unaffordable_purchase_changes_nothing() {
    let (mut world, id) = world();
    let before = world.character(id).unwrap().ledger().clone();
    let outcome = world
        .script_inventory_change(
            id,
            &[
                InventoryChange::Remove(ItemId(6), 50),
                InventoryChange::Money(-41),
                InventoryChange::Insert(ItemId(8), 1),
            ],
        )
        .unwrap();
    assert_eq!(outcome, BatchOutcome::Cancelled { failed_at: 1 });
    assert_eq!(world.character(id).unwrap().ledger(), &before);
    assert!(world.take_dirty().is_empty());
}

#[test]
fn test_overflow_lands_on_the_floor() {
    let (mut world, id) = world();
    // 6 free slots of capacity 1 for swords
    let outcome = world
        .script_inventory_change(id, &[InventoryChange::Insert(ItemId(2), 9)])
        .unwrap();
    assert_eq!(
        outcome,
        BatchOutcome::Applied {
            unplaced: vec![(ItemId(2), 3)]
        }
    );
    let character = world.character(id).unwrap();
    assert_eq!(character.ledger().count(ItemId(2)), 6);
    let floor: Vec<_> = world
        .floor()
        .items_at(character.map, character.position)
        .map(|f| (f.item, f.amount))
        .collect();
    assert_eq!(floor, vec![(ItemId(2), 3)]);
}

#[test]
fn test_apples_top_up_existing_stack_first() {
    let (mut world, id) = world();
    world.script_inventory_change(id, &[InventoryChange::Insert(ItemId(1), 10)]);
    let ledger = world.character(id).unwrap().ledger();
    assert_eq!(ledger.slot(0).map(|s| s.amount), Some(30));
    assert_eq!(ledger.slot(2).map(|s| (s.item, s.amount)), Some((ItemId(1), 5)));
}

#[test]
fn test_seed_catalog_matches_builtin_ids() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/seeds/items.json");
    let seeded = ItemCatalog::load_json(path).unwrap();
    let builtin = ItemCatalog::builtin();
    for id in 1..=10 {
        assert_eq!(seeded.get(ItemId(id)), builtin.get(ItemId(id)));
    }
    // no max_stack in the seed means one per slot
    assert_eq!(seeded.max_stack(ItemId(11)), Some(1));
    assert_eq!(seeded.len(), 12);
}

#[test]
fn test_cancelled_transaction_restores_every_mutation() {
    let catalog = ItemCatalog::builtin();
    let mut ledger = InventoryLedger::from_parts(vec![stack(4, 50), stack(9, 2)], 5, 4);
    let before = ledger.clone();
    {
        let mut txn = InventoryTransaction::open(&mut ledger, &catalog);
        assert_eq!(txn.remove(ItemId(9), 1, 2), 2);
        assert_eq!(txn.insert(ItemId(4), 100), 0);
        assert!(txn.change_money(20));
        assert!(txn.has_changes());
        txn.cancel();
        assert!(!txn.has_changes());
    }
    assert_eq!(ledger, before);
}
