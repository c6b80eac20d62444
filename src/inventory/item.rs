//! Item classes and the catalog that knows their stacking rules.
//!
//! The catalog is handed to every component that needs it (inventory
//! transactions, GM commands, scripted changes) instead of being looked up
//! through a process-wide item manager.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::WorldError;

/// Database identifier of an item class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemClass {
    pub id: ItemId,
    pub name: String,
    /// Largest quantity a single inventory slot may hold.
    #[serde(default = "default_max_stack")]
    pub max_stack: u32,
}

fn default_max_stack() -> u32 {
    1
}

impl ItemClass {
    pub fn new(id: u32, name: &str, max_stack: u32) -> Self {
        Self {
            id: ItemId(id),
            name: name.to_string(),
            max_stack,
        }
    }
}

/// Registry of known item classes.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    classes: HashMap<ItemId, ItemClass>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a list of classes. Duplicate ids and zero stack limits are rejected.
    pub fn from_classes(classes: Vec<ItemClass>) -> Result<Self, WorldError> {
        let mut catalog = Self::new();
        for class in classes {
            if class.id.0 == 0 {
                return Err(WorldError::Seed(format!(
                    "item '{}' uses reserved id 0",
                    class.name
                )));
            }
            if class.max_stack == 0 {
                return Err(WorldError::Seed(format!(
                    "item {} ('{}') has a zero stack limit",
                    class.id, class.name
                )));
            }
            if catalog.classes.contains_key(&class.id) {
                return Err(WorldError::Seed(format!("duplicate item id {}", class.id)));
            }
            catalog.classes.insert(class.id, class);
        }
        Ok(catalog)
    }

    /// Load item classes from a JSON seed file (`[{"id": 1, "name": "...", "max_stack": 30}]`).
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, WorldError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let classes: Vec<ItemClass> = serde_json::from_str(&contents)
            .map_err(|e| WorldError::Seed(format!("failed to parse {}: {}", path.display(), e)))?;
        Self::from_classes(classes)
    }

    /// Small starter catalog used when no seed file is configured.
    pub fn builtin() -> Self {
        let classes = vec![
            ItemClass::new(1, "Apple", 30),
            ItemClass::new(2, "Short Sword", 1),
            ItemClass::new(3, "Leather Shirt", 1),
            ItemClass::new(4, "Iron Ore", 99),
            ItemClass::new(5, "Healing Potion", 20),
            ItemClass::new(6, "Arrow", 250),
            ItemClass::new(7, "Maggot Slime", 50),
            ItemClass::new(8, "Bow", 1),
            ItemClass::new(9, "Ruby", 10),
            ItemClass::new(10, "Cactus Drink", 30),
        ];
        // Ids above are unique and non-zero.
        let mut catalog = Self::new();
        for class in classes {
            catalog.classes.insert(class.id, class);
        }
        catalog
    }

    pub fn insert(&mut self, class: ItemClass) {
        self.classes.insert(class.id, class);
    }

    pub fn get(&self, id: ItemId) -> Option<&ItemClass> {
        self.classes.get(&id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.classes.contains_key(&id)
    }

    pub fn max_stack(&self, id: ItemId) -> Option<u32> {
        self.classes.get(&id).map(|c| c.max_stack)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
