//! Pantry Sync - household pantry & grocery-list manager
//!
//! Members of a household track pantry quantities in SQLite and derive a
//! unified shopping list from three sources: manual additions, entries linked
//! to inventory, and "ghost" items surfaced automatically when stock falls
//! below a threshold. Completed trips commit back into inventory.

pub mod database;
pub mod error;
pub mod household;
pub mod list;
pub mod models;
pub mod resolver;
pub mod trip;
pub mod web;

pub use error::{PantryError, Result};
pub use list::{compile, compile_household};
pub use models::{InventoryItem, LineSource, ListEntry, ListLine};
