//! Shared fixtures for the integration tests: a small world with two characters
//! standing next to each other.
#![allow(dead_code)]

use tradeworld::inventory::{InventoryLedger, ItemCatalog, ItemId, ItemStack};
use tradeworld::protocol::ServerMessage;
use tradeworld::storage::CharacterRecord;
use tradeworld::trade::TradeNotice;
use tradeworld::world::{CharacterId, PublicId, World, WorldRules};

pub const CAPACITY: usize = 8;

pub fn rules() -> WorldRules {
    WorldRules {
        inventory_capacity: CAPACITY,
        max_distance: 10,
        gm_names: vec!["Root".to_string()],
        ..WorldRules::default()
    }
}

pub fn record(id: u32, name: &str, slots: Vec<Option<ItemStack>>, money: u32) -> CharacterRecord {
    let ledger = InventoryLedger::from_parts(slots, money, CAPACITY);
    CharacterRecord::new(CharacterId(id), name, &ledger)
}

pub fn stack(item: u32, amount: u32) -> Option<ItemStack> {
    Some(ItemStack::new(ItemId(item), amount))
}

/// Online pair used by the trade scenarios.
pub struct Pair {
    pub world: World,
    pub a: CharacterId,
    pub b: CharacterId,
    pub a_pub: PublicId,
    pub b_pub: PublicId,
}

/// A holds 3 x item 5 in slot 2, B holds 1 x item 9 in slot 0.
pub fn pair() -> Pair {
    let mut world = World::new(rules(), ItemCatalog::builtin());
    let a = world
        .login(record(1, "Ada", vec![None, None, stack(5, 3)], 0))
        .expect("a online");
    let b = world
        .login(record(2, "Bob", vec![stack(9, 1)], 0))
        .expect("b online");
    let a_pub = world.character(a).expect("a").public_id;
    let b_pub = world.character(b).expect("b").public_id;
    world.take_messages();
    Pair {
        world,
        a,
        b,
        a_pub,
        b_pub,
    }
}

/// Trade notices addressed to `who`, in order.
pub fn notices_for(messages: &[(CharacterId, ServerMessage)], who: CharacterId) -> Vec<TradeNotice> {
    messages
        .iter()
        .filter(|(to, _)| *to == who)
        .filter_map(|(_, m)| match m {
            ServerMessage::Trade(notice) => Some(*notice),
            _ => None,
        })
        .collect()
}
