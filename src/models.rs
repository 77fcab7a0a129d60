//! Data model: pantry items, staged shopping-list entries, and the derived
//! unified list line.

use serde::{Deserialize, Serialize};

/// A pantry item owned by a household.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryItem {
    pub id: i64,
    pub household_id: i64,
    pub name: String,
    pub quantity: i64,
    /// Restock threshold; 0 disables low-stock surfacing for this item.
    pub threshold_quantity: i64,
    pub default_buy_qty: Option<i64>,
    pub units: String,
    pub category: Option<String>,
}

impl InventoryItem {
    /// Suggested buy amount: the default-buy override if set, else the full
    /// threshold amount, else 1.
    pub fn suggested_quantity(&self) -> i64 {
        match self.default_buy_qty {
            Some(qty) if qty > 0 => qty,
            _ if self.threshold_quantity > 0 => self.threshold_quantity,
            _ => 1,
        }
    }

    /// Whether the item is below its restock threshold. The boundary is
    /// exclusive: an item exactly at its threshold is not low.
    pub fn is_low(&self) -> bool {
        self.threshold_quantity > 0 && self.quantity < self.threshold_quantity
    }
}

/// A staged shopping-list row: explicit user intent to buy something.
///
/// Exactly one of `item_id` / `manual_name` is set (enforced by a CHECK
/// constraint in the schema). `manual_threshold` and `manual_category` only
/// matter for unlinked rows, where they seed the item created at commit time.
#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub id: i64,
    pub household_id: i64,
    pub item_id: Option<i64>,
    pub manual_name: Option<String>,
    /// The user's current desired buy amount.
    pub quantity: i64,
    /// Quantity at creation or last manual-add rebase.
    pub initial_quantity: i64,
    pub units: String,
    pub is_checked: bool,
    pub manual_threshold: i64,
    pub manual_category: Option<String>,
}

/// Where a compiled line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineSource {
    /// Low-stock inventory item, surfaced automatically.
    Auto,
    /// Staged row linked to an inventory item that is not low.
    Linked,
    /// Staged row with no inventory backing.
    Manual,
}

/// One row of the unified shopping list. Derived, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ListLine {
    pub unique_id: String,
    pub item_id: Option<i64>,
    pub entry_id: Option<i64>,
    pub name: String,
    /// The amount to buy: the entry's own quantity for staged rows, the
    /// suggestion for ghosts.
    pub quantity_needed: i64,
    pub suggested_quantity: i64,
    pub units: String,
    pub source: LineSource,
    pub is_checked: bool,
    pub category: String,
    pub inventory_quantity: i64,
    pub threshold_quantity: i64,
}
