//! Entry Resolver: turns user interactions into staging-table mutations.
//!
//! The caller acts on a compiled list that may already be stale — another
//! session can promote the same ghost or edit the same row in between — so
//! every decision re-checks the authoritative store before choosing insert
//! vs. update, and a lost insert race converges via one fallback update
//! instead of erroring.

use crate::database::{self, NewEntry};
use crate::error::{PantryError, Result};
use crate::models::ListLine;
use rusqlite::Connection;
use serde::Deserialize;

fn default_units() -> String {
    "units".to_string()
}

/// The subset of a compiled line a mutation needs to act on it
#[derive(Debug, Clone, Deserialize)]
pub struct LineTarget {
    pub entry_id: Option<i64>,
    pub item_id: Option<i64>,
    #[serde(default)]
    pub quantity_needed: i64,
    #[serde(default = "default_units")]
    pub units: String,
    /// The checked state the caller last saw
    #[serde(default)]
    pub is_checked: bool,
}

impl From<&ListLine> for LineTarget {
    fn from(line: &ListLine) -> Self {
        Self {
            entry_id: line.entry_id,
            item_id: line.item_id,
            quantity_needed: line.quantity_needed,
            units: line.units.clone(),
            is_checked: line.is_checked,
        }
    }
}

/// A manual-add request
#[derive(Debug, Clone, Deserialize)]
pub struct ManualAdd {
    pub name: String,
    #[serde(default = "default_manual_quantity")]
    pub quantity: i64,
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default)]
    pub threshold: i64,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_manual_quantity() -> i64 {
    1
}

fn default_category() -> String {
    "General".to_string()
}

/// Add (or merge) a manual shopping-list entry.
///
/// Looks for an inventory item with the same name and an existing staged
/// entry for it; a repeat add accumulates onto the existing row instead of
/// duplicating it. Adding the name of a low-stock ghost folds the deficit
/// into the starting quantity, so the one staged row replaces the ghost
/// without losing the implied need.
pub fn add_manual_entry(conn: &Connection, household_id: i64, req: &ManualAdd) -> Result<()> {
    let name = req.name.trim();
    if name.is_empty() {
        return Ok(());
    }
    let requested = req.quantity.max(1);

    let inventory_item = database::find_item_by_name(conn, household_id, name)?;
    let existing = match &inventory_item {
        Some(item) => database::find_entry_by_item(conn, household_id, item.id)?,
        None => database::find_entry_by_manual_name(conn, household_id, name)?,
    };

    let baseline = match (&existing, &inventory_item) {
        // Already in the cart: merge additively on top of it.
        (Some(entry), _) => entry.quantity,
        // A ghost about to become real: start from its deficit.
        (None, Some(item)) if item.is_low() => item.threshold_quantity - item.quantity,
        _ => 0,
    };
    let final_quantity = baseline + requested;

    match existing {
        Some(entry) => {
            database::rebase_entry_quantity(conn, entry.id, household_id, final_quantity)?;
            log::debug!(
                "Merged manual add '{}' into entry {} (quantity {})",
                name,
                entry.id,
                final_quantity
            );
        }
        None => {
            let (item_id, manual_name) = match &inventory_item {
                Some(item) => (Some(item.id), None),
                None => (None, Some(name.to_string())),
            };
            database::insert_entry(
                conn,
                &NewEntry {
                    household_id,
                    item_id,
                    manual_name,
                    quantity: final_quantity,
                    initial_quantity: final_quantity,
                    units: req.units.clone(),
                    is_checked: false,
                    manual_threshold: req.threshold,
                    manual_category: Some(req.category.clone()),
                },
            )?;
            log::debug!("Staged new entry '{}' (quantity {})", name, final_quantity);
        }
    }
    Ok(())
}

/// Check or uncheck a line.
///
/// A line with a backing entry just flips its flag. A ghost being checked is
/// promoted: a real staged row is inserted, already checked, carrying the
/// suggested quantity at time of promotion. Unchecking a ghost cannot happen
/// (ghosts always start unchecked) and falls through as a no-op.
pub fn toggle_check(conn: &Connection, household_id: i64, line: &LineTarget) -> Result<()> {
    if let Some(entry_id) = line.entry_id {
        database::set_entry_checked(conn, entry_id, household_id, !line.is_checked)?;
    } else if let (Some(item_id), false) = (line.item_id, line.is_checked) {
        let quantity = line.quantity_needed.max(1);
        database::insert_entry(
            conn,
            &NewEntry {
                household_id,
                item_id: Some(item_id),
                manual_name: None,
                quantity,
                initial_quantity: quantity,
                units: line.units.clone(),
                is_checked: true,
                manual_threshold: 0,
                manual_category: None,
            },
        )?;
        log::debug!("Promoted ghost item {} into a checked entry", item_id);
    }
    Ok(())
}

/// Set a line's quantity, tolerating a stale caller view.
///
/// Fails closed on membership: a caller who is not a member of the household
/// gets `Unauthorized`. Values below 1 are rejected as a silent no-op.
///
/// Resolution order, first success wins:
/// 1. update by entry id;
/// 2. update by (household, item) — the affected-row count confirms a row
///    actually existed, since a zero-match update is otherwise
///    indistinguishable from success;
/// 3. insert a fresh linked row. If that insert loses a race to a concurrent
///    promotion, the unique violation is the signal: converge with one final
///    update-by-item instead of erroring.
pub fn set_quantity(
    conn: &Connection,
    household_id: i64,
    user_id: i64,
    line: &LineTarget,
    new_quantity: i64,
) -> Result<()> {
    if !database::is_member(conn, household_id, user_id)? {
        log::warn!(
            "Rejected quantity edit: user {} is not a member of household {}",
            user_id,
            household_id
        );
        return Err(PantryError::Unauthorized(household_id));
    }

    if new_quantity < 1 {
        return Ok(());
    }

    if let Some(entry_id) = line.entry_id {
        if database::update_entry_quantity_by_id(conn, entry_id, household_id, new_quantity)? > 0 {
            return Ok(());
        }
    }

    let Some(item_id) = line.item_id else {
        // A manual line whose entry vanished: nothing left to edit.
        return Ok(());
    };

    if database::update_entry_quantity_by_item(conn, household_id, item_id, new_quantity)? > 0 {
        return Ok(());
    }

    insert_or_converge(conn, household_id, item_id, new_quantity, &line.units)
}

/// Final step of `set_quantity`: insert a fresh linked row, treating a unique
/// violation as a lost race to a concurrent session and converging with one
/// update-by-item instead of erroring.
fn insert_or_converge(
    conn: &Connection,
    household_id: i64,
    item_id: i64,
    new_quantity: i64,
    units: &str,
) -> Result<()> {
    let insert = database::insert_entry(
        conn,
        &NewEntry {
            household_id,
            item_id: Some(item_id),
            manual_name: None,
            quantity: new_quantity,
            initial_quantity: new_quantity,
            units: units.to_string(),
            is_checked: false,
            manual_threshold: 0,
            manual_category: None,
        },
    );
    match insert {
        Ok(_) => Ok(()),
        Err(ref err) if database::is_unique_violation(err) => {
            // Lost the race: another session created the row between our
            // existence check and the insert. Converge on our value.
            log::debug!("Insert race lost for item {}, converging via update", item_id);
            database::update_entry_quantity_by_item(conn, household_id, item_id, new_quantity)?;
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
