//! Characters survive logout, trades and restarts through the sled store.

mod common;

use tempfile::TempDir;

use common::{notices_for, rules, CAPACITY};
use tradeworld::inventory::{InventoryChange, ItemCatalog, ItemId};
use tradeworld::protocol::ClientCommand;
use tradeworld::storage::CharacterStore;
use tradeworld::trade::TradeNotice;
use tradeworld::world::World;

#[test]
fn test_trade_result_is_written_through_and_reloaded() {
    let dir = TempDir::new().expect("tempdir");
    let catalog = ItemCatalog::builtin();
    {
        let store = CharacterStore::open(dir.path()).expect("store");
        let mut world = World::new(rules(), catalog.clone());
        let a = world
            .login(store.load_or_create("Ada", CAPACITY, 0).expect("ada"))
            .expect("online");
        let b = world
            .login(store.load_or_create("Bob", CAPACITY, 0).expect("bob"))
            .expect("online");
        world.script_inventory_change(a, &[InventoryChange::Insert(ItemId(4), 20)]);
        world.script_inventory_change(b, &[InventoryChange::Money(75)]);
        for record in world.take_dirty() {
            store.put_character(record).expect("put");
        }

        let b_pub = world.character(b).expect("b").public_id;
        let a_pub = world.character(a).expect("a").public_id;
        world.handle(a, ClientCommand::Trade { target: b_pub });
        world.handle(b, ClientCommand::Ack { initiator: a_pub });
        world.handle(a, ClientCommand::Add { slot: 0, amount: 20 });
        world.handle(b, ClientCommand::Money { amount: 75 });
        world.handle(a, ClientCommand::Accept);
        world.handle(b, ClientCommand::Accept);
        assert_eq!(
            notices_for(&world.take_messages(), a).last(),
            Some(&TradeNotice::Complete)
        );

        let dirty = world.take_dirty();
        assert_eq!(dirty.len(), 2);
        for record in dirty {
            store.put_character(record).expect("put");
        }
        store.flush().expect("flush");
    }

    let store = CharacterStore::open(dir.path()).expect("reopen");
    let ada = store.get_character("ada").expect("ada");
    let bob = store.get_character("bob").expect("bob");
    assert_eq!((ada.money, ada.ledger(CAPACITY).count(ItemId(4))), (75, 0));
    assert_eq!((bob.money, bob.ledger(CAPACITY).count(ItemId(4))), (0, 20));
    assert_ne!(ada.id, bob.id);
    assert_eq!(store.character_count(), 2);
}

#[test]
fn test_logout_record_keeps_position_and_creation_time() {
    let dir = TempDir::new().expect("tempdir");
    let store = CharacterStore::open(dir.path()).expect("store");
    let created = store.load_or_create("Cleo", CAPACITY, 15).expect("cleo");
    assert_eq!(created.money, 15);

    let mut world = World::new(rules(), ItemCatalog::builtin());
    let id = world.login(created.clone()).expect("online");
    world.handle(id, ClientCommand::Move { x: 4, y: 2 });
    let record = world.logout(id).expect("record");
    store.put_character(record).expect("put");

    let stored = store.get_character("Cleo").expect("get");
    assert_eq!((stored.position.x, stored.position.y), (4, 2));
    assert_eq!(stored.created_at, created.created_at);
    assert!(stored.updated_at >= created.updated_at);
    assert!(world.character(id).is_none());
}

#[test]
fn test_offline_edit_cancelled_in_closure_stores_nothing_new() {
    let dir = TempDir::new().expect("tempdir");
    let store = CharacterStore::open(dir.path()).expect("store");
    store.load_or_create("Dora", CAPACITY, 5).expect("dora");
    let catalog = ItemCatalog::builtin();

    let (ok, record) = store
        .update_inventory("dora", CAPACITY, &catalog, |txn| {
            txn.insert(ItemId(8), 1);
            let ok = txn.change_money(-6);
            if !ok {
                txn.cancel();
            }
            ok
        })
        .expect("update");
    assert!(!ok);
    assert_eq!(record.money, 5);
    assert_eq!(record.ledger(CAPACITY).count(ItemId(8)), 0);
}
