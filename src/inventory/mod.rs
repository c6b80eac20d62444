//! Character inventories: item classes, the slot/money ledger, and the staged
//! transaction engine every caller (trades, scripts, GM commands) mutates it through.

pub mod batch;
pub mod item;
pub mod ledger;
pub mod transaction;

pub use batch::{apply_changes, count_many, BatchOutcome, InventoryChange, ItemQuery};
pub use item::{ItemCatalog, ItemClass, ItemId};
pub use ledger::{InventoryLedger, ItemStack};
pub use transaction::{InventoryTransaction, InventoryView};
