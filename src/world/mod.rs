//! The game world: online characters, the trades between them and the floor.
//!
//! [`World`] is the composition root. It owns the item catalog, the roster, the
//! session registry and the outgoing mailbox, and is driven by one task at a time, so
//! none of its parts need locking. It performs no I/O: the server loads records before
//! [`World::login`] and writes back whatever [`World::take_dirty`] and
//! [`World::logout`] hand it.

pub mod character;
pub mod floor;
pub mod gm;
pub mod roster;

pub use character::{Character, CharacterId, Position, PublicId};
pub use floor::{Floor, FloorItem};
pub use gm::{GmCommand, GmError, GmTarget};
pub use roster::Roster;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

use crate::config::Config;
use crate::inventory::{apply_changes, count_many, BatchOutcome, InventoryChange, ItemCatalog, ItemQuery};
use crate::logutil::escape_log;
use crate::protocol::{ClientCommand, ServerMessage};
use crate::storage::CharacterRecord;
use crate::trade::{Notifier, SessionEnd, SessionRegistry, TradeEvent, TradeId, TradeNotice};

/// Limits the world enforces, taken from [`Config`].
#[derive(Debug, Clone)]
pub struct WorldRules {
    pub inventory_capacity: usize,
    pub starting_money: u32,
    pub max_offer_entries: usize,
    pub max_distance: u32,
    pub idle_timeout: Option<Duration>,
    pub gm_names: Vec<String>,
}

impl WorldRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            inventory_capacity: config.inventory.capacity,
            starting_money: config.inventory.starting_money,
            max_offer_entries: config.trade.max_offer_entries,
            max_distance: config.trade.max_distance,
            idle_timeout: config.trade.idle_timeout(),
            gm_names: config.gm.names.clone(),
        }
    }

    pub fn is_gm(&self, name: &str) -> bool {
        self.gm_names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}

impl Default for WorldRules {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Messages queued for delivery, in the order they were produced.
#[derive(Debug, Default)]
pub struct Mailbox {
    queue: Vec<(CharacterId, ServerMessage)>,
}

impl Mailbox {
    pub fn send(&mut self, to: CharacterId, message: ServerMessage) {
        self.queue.push((to, message));
    }

    pub fn take_all(&mut self) -> Vec<(CharacterId, ServerMessage)> {
        std::mem::take(&mut self.queue)
    }

    pub fn pending(&self) -> &[(CharacterId, ServerMessage)] {
        &self.queue
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Notifier for Mailbox {
    fn notify(&mut self, to: CharacterId, notice: TradeNotice) {
        self.send(to, ServerMessage::Trade(notice));
    }
}

pub struct World {
    rules: WorldRules,
    catalog: ItemCatalog,
    roster: Roster,
    registry: SessionRegistry,
    floor: Floor,
    mailbox: Mailbox,
}

impl World {
    pub fn new(rules: WorldRules, catalog: ItemCatalog) -> Self {
        let registry = SessionRegistry::new(rules.max_offer_entries);
        Self {
            rules,
            catalog,
            roster: Roster::new(),
            registry,
            floor: Floor::new(),
            mailbox: Mailbox::default(),
        }
    }

    pub fn rules(&self) -> &WorldRules {
        &self.rules
    }

    pub fn catalog(&self) -> &ItemCatalog {
        &self.catalog
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn floor(&self) -> &Floor {
        &self.floor
    }

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.roster.get(id)
    }

    pub(crate) fn send(&mut self, to: CharacterId, message: ServerMessage) {
        self.mailbox.send(to, message);
    }

    /// Drain everything produced since the last call.
    pub fn take_messages(&mut self) -> Vec<(CharacterId, ServerMessage)> {
        self.mailbox.take_all()
    }

    /// Bring a stored character online and greet it. `None` when a character with the
    /// same id or name is already online.
    pub fn login(&mut self, record: CharacterRecord) -> Option<CharacterId> {
        let public_id = self.roster.allocate_public_id();
        let mut character = record.into_character(public_id, self.rules.inventory_capacity);
        character.gm = self.rules.is_gm(&character.name);
        let (id, name) = (character.id, character.name.clone());
        if self.roster.insert(character).is_err() {
            debug!("{} is already online", escape_log(&name));
            return None;
        }
        info!("{} ({}) online as {}", escape_log(&name), id, public_id);
        self.send(id, ServerMessage::Welcome { public_id, name });
        Some(id)
    }

    /// Take a character offline. Its trade is cancelled with the character as trigger, so
    /// only the counterpart hears about it. Returns the record to persist.
    pub fn logout(&mut self, who: CharacterId) -> Option<CharacterRecord> {
        self.registry.cancel_for(who, &mut self.mailbox);
        let character = self.roster.remove(who)?;
        info!("{} ({}) offline", escape_log(&character.name), who);
        Some(CharacterRecord::from_character(&character))
    }

    /// Apply one parsed client command from an online character.
    pub fn handle(&mut self, who: CharacterId, command: ClientCommand) {
        if self.roster.get(who).is_none() {
            return;
        }
        match command {
            ClientCommand::Login { .. } => {
                self.send(who, ServerMessage::Error("already logged in".to_string()))
            }
            ClientCommand::Trade { target } => {
                self.request_trade(who, target);
            }
            ClientCommand::Ack { initiator } => {
                self.dispatch_trade(who, TradeEvent::RequestAck { initiator });
            }
            ClientCommand::Add { slot, amount } => {
                self.dispatch_trade(who, TradeEvent::AddItem { slot, amount });
            }
            ClientCommand::Money { amount } => {
                self.dispatch_trade(who, TradeEvent::SetMoney { amount });
            }
            ClientCommand::Accept => {
                self.dispatch_trade(who, TradeEvent::Accept);
            }
            ClientCommand::Cancel => {
                self.dispatch_trade(who, TradeEvent::Cancel);
            }
            ClientCommand::Inventory => {
                if let Some(character) = self.roster.get(who) {
                    let message = ServerMessage::inventory_of(character.ledger());
                    self.send(who, message);
                }
            }
            ClientCommand::Who => {
                let online = self
                    .roster
                    .iter()
                    .map(|c| (c.public_id, c.name.clone()))
                    .collect();
                self.send(who, ServerMessage::Who(online));
            }
            ClientCommand::Move { x, y } => self.move_to(who, Position::new(x, y)),
            // the connection closes itself; logout follows from the disconnect
            ClientCommand::Quit => {}
            ClientCommand::Gm(line) => self.handle_gm(who, &line),
        }
    }

    /// Ask the character with public id `target` to trade. Ignored when the target is not
    /// online, is the requester, or is out of reach.
    pub fn request_trade(&mut self, who: CharacterId, target: PublicId) -> Option<TradeId> {
        let initiator = self.roster.get(who)?;
        let Some(responder) = self.roster.by_public_id(target) else {
            debug!("{} asked unknown public id {}", who, target);
            return None;
        };
        if responder.id == who {
            return None;
        }
        if !initiator.is_near(responder, self.rules.max_distance) {
            debug!("{} too far from {} to trade", who, responder.id);
            return None;
        }
        let pair = (
            (initiator.id, initiator.public_id),
            (responder.id, responder.public_id),
        );
        self.registry.begin_session(pair.0, pair.1, &mut self.mailbox)
    }

    pub fn dispatch_trade(&mut self, who: CharacterId, event: TradeEvent) -> Option<SessionEnd> {
        self.registry
            .dispatch(who, event, &mut self.roster, &self.catalog, &mut self.mailbox)
    }

    pub fn move_to(&mut self, who: CharacterId, position: Position) {
        if let Some(character) = self.roster.get_mut(who) {
            character.position = position;
        }
    }

    /// Run a scripted batch of inventory changes for `who`. Insertion remainders that do
    /// not fit are dropped on the floor under the character.
    pub fn script_inventory_change(
        &mut self,
        who: CharacterId,
        changes: &[InventoryChange],
    ) -> Option<BatchOutcome> {
        let character = self.roster.get_mut(who)?;
        let mut txn = character.inventory_mut(&self.catalog);
        let outcome = apply_changes(&mut txn, changes);
        drop(txn);
        if let BatchOutcome::Applied { unplaced } = &outcome {
            for &(item, amount) in unplaced {
                self.floor
                    .drop_item(item, amount, character.map, character.position);
            }
        }
        Some(outcome)
    }

    pub fn script_count(&self, who: CharacterId, queries: &[ItemQuery]) -> Option<Vec<u32>> {
        self.roster
            .get(who)
            .map(|c| count_many(c.inventory(), queries))
    }

    /// Cancel trades idle for longer than the configured timeout.
    pub fn expire_idle(&mut self, now: DateTime<Utc>) -> usize {
        match self.rules.idle_timeout {
            Some(timeout) => self.registry.expire_idle(now, timeout, &mut self.mailbox),
            None => 0,
        }
    }

    /// Records of characters whose inventory changed since the last call. They are
    /// marked persisted as they are returned.
    pub fn take_dirty(&mut self) -> Vec<CharacterRecord> {
        self.roster
            .iter_mut()
            .filter(|c| c.is_dirty())
            .map(|c| {
                c.mark_persisted();
                CharacterRecord::from_character(c)
            })
            .collect()
    }

    /// Records of every online character.
    pub fn snapshot_all(&self) -> Vec<CharacterRecord> {
        self.roster.iter().map(CharacterRecord::from_character).collect()
    }
}
