//! # Storage Module - Character Persistence
//!
//! Characters (position plus inventory) are kept in a sled database with bincode
//! encoded values, one record per character:
//!
//! ```text
//! data/
//! ├── tradeworld.lock   ← exclusive lock held while a store is open
//! └── db/               ← sled database
//!     ├── characters    ← characters:<lowercase name> → CharacterRecord
//!     └── meta          ← next_character_id counter
//! ```
//!
//! The inventory code never touches storage. The world reports characters whose ledger
//! changed and the server hands those records to [`CharacterStore::put_character`].
//!
//! ```rust,no_run
//! use tradeworld::storage::CharacterStore;
//!
//! # fn main() -> Result<(), tradeworld::errors::WorldError> {
//! let store = CharacterStore::open("./data")?;
//! let record = store.load_or_create("Ada", 50, 0)?;
//! println!("{} holds {} money", record.name, record.money);
//! # Ok(())
//! # }
//! ```

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use log::debug;
use serde::{Deserialize, Serialize};
use sled::IVec;

use crate::errors::WorldError;
use crate::inventory::{InventoryLedger, InventoryTransaction, ItemCatalog, ItemStack};
use crate::world::{Character, CharacterId, Position, PublicId};

pub const CHARACTER_SCHEMA_VERSION: u8 = 1;

const TREE_CHARACTERS: &str = "characters";
const TREE_META: &str = "meta";
const NEXT_ID_KEY: &[u8] = b"next_character_id";
const LOCK_FILE: &str = "tradeworld.lock";
/// Map new characters start on.
pub const START_MAP: u16 = 1;

/// Persisted form of a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub id: CharacterId,
    pub name: String,
    pub map: u16,
    pub position: Position,
    pub slots: Vec<Option<ItemStack>>,
    pub money: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl CharacterRecord {
    pub fn new(id: CharacterId, name: &str, ledger: &InventoryLedger) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.to_string(),
            map: START_MAP,
            position: Position::default(),
            slots: ledger.slots().to_vec(),
            money: ledger.money(),
            created_at: now,
            updated_at: now,
            schema_version: CHARACTER_SCHEMA_VERSION,
        }
    }

    /// Snapshot of an online character.
    pub fn from_character(character: &Character) -> Self {
        let ledger = character.ledger();
        Self {
            id: character.id,
            name: character.name.clone(),
            map: character.map,
            position: character.position,
            slots: ledger.slots().to_vec(),
            money: ledger.money(),
            created_at: character.created_at,
            updated_at: Utc::now(),
            schema_version: CHARACTER_SCHEMA_VERSION,
        }
    }

    pub fn ledger(&self, capacity: usize) -> InventoryLedger {
        InventoryLedger::from_parts(self.slots.clone(), self.money, capacity)
    }

    pub fn into_character(self, public_id: PublicId, capacity: usize) -> Character {
        let ledger = self.ledger(capacity);
        let mut character =
            Character::new(self.id, public_id, &self.name, ledger).at(self.map, self.position);
        character.created_at = self.created_at;
        character
    }
}

/// Sled-backed persistence for character records.
pub struct CharacterStore {
    path: PathBuf,
    _db: sled::Db,
    characters: sled::Tree,
    meta: sled::Tree,
    _lock: File,
}

impl CharacterStore {
    /// Open (or create) the store under `path`. Fails with [`WorldError::DataDirLocked`]
    /// while another process holds the same directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WorldError> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        lock.try_lock_exclusive()
            .map_err(|_| WorldError::DataDirLocked(path.display().to_string()))?;

        let db = sled::open(path.join("db"))?;
        let characters = db.open_tree(TREE_CHARACTERS)?;
        let meta = db.open_tree(TREE_META)?;
        debug!("character store opened at {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            _db: db,
            characters,
            meta,
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn character_key(name: &str) -> Vec<u8> {
        format!("characters:{}", name.to_lowercase()).into_bytes()
    }

    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, WorldError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, WorldError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    /// Insert or update a character record.
    pub fn put_character(&self, mut record: CharacterRecord) -> Result<(), WorldError> {
        record.schema_version = CHARACTER_SCHEMA_VERSION;
        record.updated_at = Utc::now();
        let key = Self::character_key(&record.name);
        let bytes = Self::serialize(&record)?;
        self.characters.insert(key, bytes)?;
        self.characters.flush()?;
        Ok(())
    }

    /// Write several records in one atomic sled batch: either all of them land or none.
    pub fn put_characters(&self, records: Vec<CharacterRecord>) -> Result<(), WorldError> {
        if records.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let mut batch = sled::Batch::default();
        for mut record in records {
            record.schema_version = CHARACTER_SCHEMA_VERSION;
            record.updated_at = now;
            batch.insert(Self::character_key(&record.name), Self::serialize(&record)?);
        }
        self.characters.apply_batch(batch)?;
        self.characters.flush()?;
        Ok(())
    }

    /// Fetch a character by name (case-insensitive).
    pub fn get_character(&self, name: &str) -> Result<CharacterRecord, WorldError> {
        let key = Self::character_key(name);
        let Some(bytes) = self.characters.get(&key)? else {
            return Err(WorldError::NotFound(format!("character: {}", name)));
        };
        let record: CharacterRecord = Self::deserialize(bytes)?;
        if record.schema_version != CHARACTER_SCHEMA_VERSION {
            return Err(WorldError::SchemaMismatch {
                entity: "character",
                expected: CHARACTER_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    /// Like [`get_character`](Self::get_character) but `None` when absent.
    pub fn find_character(&self, name: &str) -> Result<Option<CharacterRecord>, WorldError> {
        match self.get_character(name) {
            Ok(record) => Ok(Some(record)),
            Err(WorldError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Load `name`, creating a fresh character with an empty inventory when it does not exist.
    pub fn load_or_create(
        &self,
        name: &str,
        capacity: usize,
        starting_money: u32,
    ) -> Result<CharacterRecord, WorldError> {
        if let Some(record) = self.find_character(name)? {
            return Ok(record);
        }
        let id = self.next_character_id()?;
        let ledger = InventoryLedger::from_parts(Vec::new(), starting_money, capacity);
        let record = CharacterRecord::new(id, name, &ledger);
        self.put_character(record.clone())?;
        debug!("created character {} for {}", id, name);
        Ok(record)
    }

    /// Edit an offline character's inventory in one transaction and store the result.
    /// Whatever `edit` leaves in place is written, so a cancelled transaction stores the
    /// record unchanged.
    pub fn update_inventory<R>(
        &self,
        name: &str,
        capacity: usize,
        catalog: &ItemCatalog,
        edit: impl FnOnce(&mut InventoryTransaction<'_>) -> R,
    ) -> Result<(R, CharacterRecord), WorldError> {
        let mut record = self.get_character(name)?;
        let mut ledger = record.ledger(capacity);
        let result = {
            let mut txn = InventoryTransaction::open(&mut ledger, catalog);
            edit(&mut txn)
        };
        record.slots = ledger.slots().to_vec();
        record.money = ledger.money();
        self.put_character(record.clone())?;
        Ok((result, record))
    }

    /// Lowercased names of every stored character.
    pub fn list_character_names(&self) -> Result<Vec<String>, WorldError> {
        let mut names = Vec::new();
        for entry in self.characters.scan_prefix(b"characters:") {
            let (key, _) = entry?;
            let text = String::from_utf8_lossy(&key);
            if let Some(name) = text.strip_prefix("characters:") {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    /// Allocate the next character id. Ids start at 1 and are never reused.
    pub fn next_character_id(&self) -> Result<CharacterId, WorldError> {
        let updated = self.meta.update_and_fetch(NEXT_ID_KEY, |old| {
            let current = old
                .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
                .map(u32::from_be_bytes)
                .unwrap_or(0);
            Some(current.saturating_add(1).to_be_bytes().to_vec())
        })?;
        let bytes = updated
            .and_then(|raw| <[u8; 4]>::try_from(raw.as_ref()).ok())
            .ok_or_else(|| WorldError::NotFound("character id counter".to_string()))?;
        self.meta.flush()?;
        Ok(CharacterId(u32::from_be_bytes(bytes)))
    }

    pub fn flush(&self) -> Result<(), WorldError> {
        self.characters.flush()?;
        self.meta.flush()?;
        Ok(())
    }
}
