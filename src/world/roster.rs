use std::collections::{BTreeMap, HashMap};

use crate::inventory::InventoryLedger;
use crate::trade::{ordered_pair_mut, TradeParties};

use super::character::{Character, CharacterId, PublicId};

/// Characters currently online, ordered by [`CharacterId`].
#[derive(Debug, Default)]
pub struct Roster {
    characters: BTreeMap<CharacterId, Character>,
    by_public: HashMap<PublicId, CharacterId>,
    by_name: HashMap<String, CharacterId>,
    next_public: u16,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Next unused public id. Ids are recycled only after the counter wraps.
    pub fn allocate_public_id(&mut self) -> PublicId {
        loop {
            self.next_public = self.next_public.wrapping_add(1).max(1);
            let candidate = PublicId(self.next_public);
            if !self.by_public.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Add a character. Fails (handing the character back) if its id or name is already online.
    pub fn insert(&mut self, character: Character) -> Result<(), Character> {
        let key = character.name.to_lowercase();
        if self.characters.contains_key(&character.id) || self.by_name.contains_key(&key) {
            return Err(character);
        }
        self.by_public.insert(character.public_id, character.id);
        self.by_name.insert(key, character.id);
        self.characters.insert(character.id, character);
        Ok(())
    }

    pub fn remove(&mut self, id: CharacterId) -> Option<Character> {
        let character = self.characters.remove(&id)?;
        self.by_public.remove(&character.public_id);
        self.by_name.remove(&character.name.to_lowercase());
        Some(character)
    }

    pub fn get(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn get_mut(&mut self, id: CharacterId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    pub fn by_public_id(&self, public_id: PublicId) -> Option<&Character> {
        self.by_public
            .get(&public_id)
            .and_then(|id| self.characters.get(id))
    }

    /// Case-insensitive name lookup.
    pub fn by_name(&self, name: &str) -> Option<&Character> {
        self.by_name
            .get(&name.to_lowercase())
            .and_then(|id| self.characters.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Character> {
        self.characters.values_mut()
    }
}

impl TradeParties for Roster {
    fn ledger(&self, who: CharacterId) -> Option<&InventoryLedger> {
        self.characters.get(&who).map(Character::ledger)
    }

    fn ledger_pair_mut(
        &mut self,
        a: CharacterId,
        b: CharacterId,
    ) -> Option<(&mut InventoryLedger, &mut InventoryLedger)> {
        ordered_pair_mut(&mut self.characters, a, b).map(|(x, y)| (x.ledger_mut(), y.ledger_mut()))
    }
}
