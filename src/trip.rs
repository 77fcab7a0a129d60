//! Trip Committer: applies the checked staging rows back to inventory.
//!
//! Each checked entry is its own unit of work: a linked entry bumps its
//! item's stock with one atomic relative update, a manual entry creates a
//! fresh pantry item. Entries whose inventory mutation succeeded are deleted;
//! a failed entry stays staged for the next attempt and never aborts the
//! rest of the batch.

use crate::database::{self, NewItem};
use crate::error::{PantryError, Result};
use crate::models::ListEntry;
use rusqlite::Connection;
use serde::Serialize;

/// Summary of a committed shopping trip
#[derive(Debug, Default, Serialize)]
pub struct TripResult {
    /// Entries applied to inventory and removed from staging
    pub committed: usize,
    /// Entries left staged because their inventory mutation failed
    pub failed: Vec<EntryFailure>,
}

/// One entry that could not be committed
#[derive(Debug, Serialize)]
pub struct EntryFailure {
    pub entry_id: i64,
    pub name: String,
    pub reason: String,
}

/// Commit the shopping trip for a household.
///
/// No-op when nothing is checked. Unchecked entries always remain staged for
/// the next cycle. `user_id`, when known, is recorded on items created from
/// manual entries.
pub fn commit_trip(
    conn: &mut Connection,
    household_id: i64,
    user_id: Option<i64>,
) -> Result<TripResult> {
    let checked = database::get_checked_entries(conn, household_id)?;
    if checked.is_empty() {
        return Ok(TripResult::default());
    }

    let mut bought_ids = Vec::with_capacity(checked.len());
    let mut failed = Vec::new();

    for entry in &checked {
        match apply_entry(conn, household_id, user_id, entry) {
            Ok(()) => bought_ids.push(entry.id),
            Err(err) => {
                log::warn!(
                    "Entry {} ('{}') failed to commit, leaving it staged: {}",
                    entry.id,
                    entry_name(entry),
                    err
                );
                failed.push(EntryFailure {
                    entry_id: entry.id,
                    name: entry_name(entry).to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }

    if !bought_ids.is_empty() {
        database::delete_entries(conn, household_id, &bought_ids)?;
    }

    log::info!(
        "Committed trip for household {}: {} entries applied, {} failed",
        household_id,
        bought_ids.len(),
        failed.len()
    );
    Ok(TripResult { committed: bought_ids.len(), failed })
}

fn entry_name(entry: &ListEntry) -> &str {
    entry.manual_name.as_deref().unwrap_or("linked item")
}

fn apply_entry(
    conn: &Connection,
    household_id: i64,
    user_id: Option<i64>,
    entry: &ListEntry,
) -> Result<()> {
    match (entry.item_id, &entry.manual_name) {
        (Some(item_id), _) => {
            // Buying adds stock: a single atomic relative bump.
            let touched =
                database::adjust_item_quantity(conn, item_id, household_id, entry.quantity, true)?;
            if touched == 0 {
                return Err(PantryError::NotFound(format!("inventory item {item_id}")));
            }
            Ok(())
        }
        (None, Some(name)) => {
            database::insert_item(
                conn,
                &NewItem {
                    household_id,
                    name: name.clone(),
                    quantity: entry.quantity,
                    threshold_quantity: entry.manual_threshold,
                    default_buy_qty: None,
                    units: entry.units.clone(),
                    category: Some(
                        entry.manual_category.clone().unwrap_or_else(|| "General".to_string()),
                    ),
                    last_updated_by: user_id,
                },
            )?;
            Ok(())
        }
        // Unreachable: the schema CHECK guarantees one side is set.
        (None, None) => Err(PantryError::NotFound(format!("target of entry {}", entry.id))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tests::{linked_entry, manual_entry, seed_household, seed_item, test_db};
    use rusqlite::params;

    fn item_quantity(conn: &Connection, item_id: i64) -> i64 {
        conn.query_row("SELECT quantity FROM items WHERE id = ?1", params![item_id], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn empty_cart_is_a_no_op() {
        let mut conn = test_db();
        let hid = seed_household(&conn, 1);
        seed_item(&conn, hid, "Milk", 1, 3);

        let result = commit_trip(&mut conn, hid, None).unwrap();
        assert_eq!(result.committed, 0);
        assert!(result.failed.is_empty());
    }

    #[test]
    fn linked_entry_bumps_stock_and_is_deleted() {
        let mut conn = test_db();
        let hid = seed_household(&conn, 1);
        let item = seed_item(&conn, hid, "Milk", 1, 3);

        let mut entry = linked_entry(hid, item, 2);
        entry.is_checked = true;
        database::insert_entry(&conn, &entry).unwrap();

        let result = commit_trip(&mut conn, hid, None).unwrap();
        assert_eq!(result.committed, 1);
        assert_eq!(item_quantity(&conn, item), 3);
        assert!(database::get_staging_entries(&conn, hid).unwrap().is_empty());
    }

    #[test]
    fn manual_entry_creates_an_inventory_item() {
        let mut conn = test_db();
        let hid = seed_household(&conn, 1);

        let mut entry = manual_entry(hid, "Foil", 1);
        entry.units = "box".to_string();
        entry.is_checked = true;
        database::insert_entry(&conn, &entry).unwrap();

        let result = commit_trip(&mut conn, hid, Some(7)).unwrap();
        assert_eq!(result.committed, 1);

        let created = database::find_item_by_name(&conn, hid, "Foil").unwrap().unwrap();
        assert_eq!(created.quantity, 1);
        assert_eq!(created.units, "box");
        assert_eq!(created.threshold_quantity, 0);
        assert_eq!(created.category.as_deref(), Some("General"));
        assert!(database::get_staging_entries(&conn, hid).unwrap().is_empty());
    }

    #[test]
    fn unchecked_entries_stay_staged() {
        let mut conn = test_db();
        let hid = seed_household(&conn, 1);
        let item = seed_item(&conn, hid, "Milk", 1, 3);

        let mut checked = linked_entry(hid, item, 2);
        checked.is_checked = true;
        database::insert_entry(&conn, &checked).unwrap();
        database::insert_entry(&conn, &manual_entry(hid, "Foil", 1)).unwrap();

        commit_trip(&mut conn, hid, None).unwrap();

        let remaining = database::get_staging_entries(&conn, hid).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].manual_name.as_deref(), Some("Foil"));
    }

    #[test]
    fn one_failing_entry_does_not_abort_the_batch() {
        let mut conn = test_db();
        let hid = seed_household(&conn, 1);
        let item = seed_item(&conn, hid, "Milk", 1, 3);

        let mut good = linked_entry(hid, item, 2);
        good.is_checked = true;
        database::insert_entry(&conn, &good).unwrap();

        // Entry whose linked item was deleted out from under it.
        let mut orphan = linked_entry(hid, 9999, 1);
        orphan.is_checked = true;
        let orphan_id = database::insert_entry(&conn, &orphan).unwrap();

        let result = commit_trip(&mut conn, hid, None).unwrap();
        assert_eq!(result.committed, 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].entry_id, orphan_id);
        assert_eq!(item_quantity(&conn, item), 3);

        // The failed entry is not deleted.
        let remaining = database::get_staging_entries(&conn, hid).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, orphan_id);
    }
}
