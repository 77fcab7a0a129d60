//! List Compiler: derives the unified shopping list from inventory and
//! staging snapshots.
//!
//! `compile` is a pure function over the two snapshots so tests can feed it
//! synthetic data; `compile_household` is the thin storage-reading wrapper.
//! Three sources merge into one view: ghosts (low-stock items with no staging
//! row), staged rows linked to inventory, and purely manual staged rows.

use crate::database::{self, DbResult};
use crate::models::{InventoryItem, LineSource, ListEntry, ListLine};
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};

/// Compile the unified, deduplicated shopping list.
///
/// Deterministic given its inputs, no side effects. Output is sorted by
/// (category, name), case-insensitively; callers partition into active and
/// cart subsets by `is_checked`.
pub fn compile(inventory: &[InventoryItem], staging: &[ListEntry]) -> Vec<ListLine> {
    let items_by_id: HashMap<i64, &InventoryItem> =
        inventory.iter().map(|item| (item.id, item)).collect();
    let staged_ids: HashSet<i64> = staging.iter().filter_map(|entry| entry.item_id).collect();

    let mut lines: Vec<ListLine> = Vec::with_capacity(inventory.len() + staging.len());

    // Ghosts: items below threshold that nobody has staged yet. Once a ghost
    // is promoted its item id lands in staged_ids and it stops deriving here.
    for item in inventory {
        if item.is_low() && !staged_ids.contains(&item.id) {
            lines.push(ghost_line(item));
        }
    }

    for entry in staging {
        let linked = entry.item_id.and_then(|id| items_by_id.get(&id).copied());
        lines.push(staged_line(entry, linked));
    }

    lines.sort_by(|a, b| {
        let by_category = a.category.to_lowercase().cmp(&b.category.to_lowercase());
        by_category.then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    lines
}

/// Read both snapshots for a household and compile them
pub fn compile_household(conn: &Connection, household_id: i64) -> DbResult<Vec<ListLine>> {
    let inventory = database::get_inventory(conn, household_id)?;
    let staging = database::get_staging_entries(conn, household_id)?;
    Ok(compile(&inventory, &staging))
}

fn ghost_line(item: &InventoryItem) -> ListLine {
    let suggested = item.suggested_quantity();
    ListLine {
        unique_id: format!("item-{}", item.id),
        item_id: Some(item.id),
        entry_id: None,
        name: item.name.clone(),
        quantity_needed: suggested,
        suggested_quantity: suggested,
        units: item.units.clone(),
        source: LineSource::Auto,
        is_checked: false,
        category: item.category.clone().unwrap_or_else(|| "General".to_string()),
        inventory_quantity: item.quantity,
        threshold_quantity: item.threshold_quantity,
    }
}

fn staged_line(entry: &ListEntry, linked: Option<&InventoryItem>) -> ListLine {
    // Suggestion comes from the linked item when it resolves; a manual entry
    // anchors on its creation-time quantity instead.
    let suggested = match linked {
        Some(item) => item.suggested_quantity(),
        None if entry.initial_quantity > 0 => entry.initial_quantity,
        None => entry.quantity,
    };
    let source = match linked {
        Some(item) if item.is_low() => LineSource::Auto,
        Some(_) => LineSource::Linked,
        None => LineSource::Manual,
    };
    let name = linked
        .map(|item| item.name.clone())
        .or_else(|| entry.manual_name.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    let category = entry
        .manual_category
        .clone()
        .or_else(|| linked.and_then(|item| item.category.clone()))
        .unwrap_or_else(|| "General".to_string());

    ListLine {
        unique_id: format!("entry-{}", entry.id),
        item_id: entry.item_id,
        entry_id: Some(entry.id),
        name,
        // Always the entry's own quantity (the user's live edit), never
        // recomputed from inventory.
        quantity_needed: entry.quantity,
        suggested_quantity: suggested,
        units: entry.units.clone(),
        source,
        is_checked: entry.is_checked,
        category,
        inventory_quantity: linked.map_or(0, |item| item.quantity),
        threshold_quantity: linked.map_or(entry.manual_threshold, |item| item.threshold_quantity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, name: &str, quantity: i64, threshold: i64) -> InventoryItem {
        InventoryItem {
            id,
            household_id: 1,
            name: name.to_string(),
            quantity,
            threshold_quantity: threshold,
            default_buy_qty: None,
            units: "units".to_string(),
            category: None,
        }
    }

    fn linked(id: i64, item_id: i64, quantity: i64) -> ListEntry {
        ListEntry {
            id,
            household_id: 1,
            item_id: Some(item_id),
            manual_name: None,
            quantity,
            initial_quantity: quantity,
            units: "units".to_string(),
            is_checked: false,
            manual_threshold: 0,
            manual_category: None,
        }
    }

    fn manual(id: i64, name: &str, quantity: i64) -> ListEntry {
        ListEntry {
            id,
            household_id: 1,
            item_id: None,
            manual_name: Some(name.to_string()),
            quantity,
            initial_quantity: quantity,
            units: "units".to_string(),
            is_checked: false,
            manual_threshold: 0,
            manual_category: None,
        }
    }

    #[test]
    fn low_item_becomes_auto_line() {
        let lines = compile(&[item(1, "Milk", 1, 3)], &[]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].source, LineSource::Auto);
        assert_eq!(lines[0].quantity_needed, 3);
        assert_eq!(lines[0].suggested_quantity, 3);
        assert!(!lines[0].is_checked);
        assert_eq!(lines[0].unique_id, "item-1");
    }

    #[test]
    fn default_buy_qty_overrides_threshold_suggestion() {
        let mut low = item(1, "Milk", 1, 3);
        low.default_buy_qty = Some(6);
        let lines = compile(&[low], &[]);
        assert_eq!(lines[0].quantity_needed, 6);
        assert_eq!(lines[0].suggested_quantity, 6);
    }

    #[test]
    fn zero_threshold_never_surfaces() {
        let lines = compile(&[item(1, "Milk", 0, 0)], &[]);
        assert!(lines.is_empty());
    }

    #[test]
    fn at_threshold_is_not_low() {
        let lines = compile(&[item(1, "Milk", 3, 3)], &[]);
        assert!(lines.is_empty());
    }

    #[test]
    fn staged_item_suppresses_its_ghost() {
        let lines = compile(&[item(1, "Milk", 1, 3)], &[linked(10, 1, 5)]);
        // One line only: the staged row, not a duplicate auto line.
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].entry_id, Some(10));
        assert_eq!(lines[0].quantity_needed, 5);
        // Still low in inventory, so the staged row is classed as auto.
        assert_eq!(lines[0].source, LineSource::Auto);
    }

    #[test]
    fn staged_linked_item_above_threshold_is_linked_source() {
        let lines = compile(&[item(1, "Milk", 4, 3)], &[linked(10, 1, 2)]);
        assert_eq!(lines[0].source, LineSource::Linked);
        assert_eq!(lines[0].inventory_quantity, 4);
    }

    #[test]
    fn manual_entry_suggestion_falls_back_to_initial_quantity() {
        let mut entry = manual(10, "Foil", 4);
        entry.initial_quantity = 2;
        let lines = compile(&[], &[entry]);
        assert_eq!(lines[0].source, LineSource::Manual);
        assert_eq!(lines[0].quantity_needed, 4);
        assert_eq!(lines[0].suggested_quantity, 2);
    }

    #[test]
    fn quantity_needed_is_the_entry_quantity_not_the_suggestion() {
        let lines = compile(&[item(1, "Milk", 1, 3)], &[linked(10, 1, 7)]);
        assert_eq!(lines[0].quantity_needed, 7);
        assert_eq!(lines[0].suggested_quantity, 3);
    }

    #[test]
    fn sort_is_case_insensitive_by_category_then_name() {
        let mut yogurt = item(1, "Yogurt", 1, 3);
        yogurt.category = Some("dairy".to_string());
        let mut butter = item(2, "Butter", 1, 3);
        butter.category = Some("Dairy".to_string());
        let mut apples = item(3, "apples", 1, 3);
        apples.category = Some("Produce".to_string());

        let lines = compile(&[yogurt, butter, apples], &[]);
        let names: Vec<&str> = lines.iter().map(|l| l.name.as_str()).collect();
        // "dairy"/"Dairy" sort adjacently, names ascending within.
        assert_eq!(names, vec!["Butter", "Yogurt", "apples"]);
    }

    #[test]
    fn missing_category_sorts_as_general() {
        let mut dairy = item(1, "Milk", 1, 3);
        dairy.category = Some("Dairy".to_string());
        let uncategorized = item(2, "Rice", 1, 3); // reads as "General"
        let mut produce = item(3, "Apples", 1, 3);
        produce.category = Some("Produce".to_string());

        let lines = compile(&[produce, uncategorized, dairy], &[]);
        let cats: Vec<&str> = lines.iter().map(|l| l.category.as_str()).collect();
        assert_eq!(cats, vec!["Dairy", "General", "Produce"]);
    }

    #[test]
    fn compile_is_pure_and_deterministic() {
        let inventory = [item(1, "Milk", 1, 3), item(2, "Eggs", 0, 6)];
        let staging = [manual(10, "Foil", 1)];
        let first = compile(&inventory, &staging);
        let second = compile(&inventory, &staging);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.unique_id, b.unique_id);
            assert_eq!(a.quantity_needed, b.quantity_needed);
        }
    }
}
