//! SQLite storage for households, pantry items, and the grocery staging table.
//!
//! Uses parameterized queries exclusively (no SQL string concatenation), and
//! every item/entry statement filters by household id so one household can
//! never touch another's rows. Multi-statement writes are transactional.

use crate::models::{InventoryItem, ListEntry};
use rusqlite::{params, Connection, ErrorCode, Row};

/// Result type for database operations
pub type DbResult<T> = rusqlite::Result<T>;

/// Initialize the database schema
///
/// Creates tables if they don't exist:
/// - `households` / `household_members`: ownership and the authorization gate
/// - `items`: the pantry inventory per household
/// - `grocery_list_entries`: the staging table of explicit shopping intents
pub fn init_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS households (
            id         INTEGER PRIMARY KEY,
            name       TEXT NOT NULL,
            room_code  TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS household_members (
            id           INTEGER PRIMARY KEY,
            household_id INTEGER NOT NULL REFERENCES households(id),
            user_id      INTEGER NOT NULL,
            role         TEXT NOT NULL DEFAULT 'member',
            joined_at    TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (household_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS items (
            id                 INTEGER PRIMARY KEY,
            household_id       INTEGER NOT NULL REFERENCES households(id),
            name               TEXT NOT NULL,
            quantity           INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
            threshold_quantity INTEGER NOT NULL DEFAULT 0 CHECK (threshold_quantity >= 0),
            default_buy_qty    INTEGER,
            units              TEXT NOT NULL DEFAULT 'units',
            category           TEXT,
            last_updated_by    INTEGER,
            updated_at         TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_items_household ON items(household_id);

        -- Staging table: one row per explicit shopping-list intent.
        -- Exactly one of item_id / manual_name is set.
        CREATE TABLE IF NOT EXISTS grocery_list_entries (
            id               INTEGER PRIMARY KEY,
            household_id     INTEGER NOT NULL REFERENCES households(id),
            item_id          INTEGER REFERENCES items(id),
            manual_name      TEXT,
            quantity         INTEGER NOT NULL,
            initial_quantity INTEGER NOT NULL,
            units            TEXT NOT NULL DEFAULT 'units',
            is_checked       INTEGER NOT NULL DEFAULT 0,
            manual_threshold INTEGER NOT NULL DEFAULT 0,
            manual_category  TEXT,
            CHECK ((item_id IS NULL) <> (manual_name IS NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_entries_household ON grocery_list_entries(household_id);

        -- Duplicate prevention is a schema contract, not a convention: at most
        -- one entry per linked item and one per manual name per household.
        -- These indexes are also the race signal for insert-then-reconcile.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_household_item
            ON grocery_list_entries(household_id, item_id)
            WHERE item_id IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_household_manual
            ON grocery_list_entries(household_id, lower(manual_name))
            WHERE manual_name IS NOT NULL;
        ",
    )?;

    log::info!("Database schema initialized");
    Ok(())
}

/// Whether an error is SQLite reporting a violated uniqueness or check
/// constraint. A unique-index hit on insert means another session won the
/// race for the same logical row.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<InventoryItem> {
    Ok(InventoryItem {
        id: row.get(0)?,
        household_id: row.get(1)?,
        name: row.get(2)?,
        quantity: row.get(3)?,
        threshold_quantity: row.get(4)?,
        default_buy_qty: row.get(5)?,
        units: row.get(6)?,
        category: row.get(7)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<ListEntry> {
    Ok(ListEntry {
        id: row.get(0)?,
        household_id: row.get(1)?,
        item_id: row.get(2)?,
        manual_name: row.get(3)?,
        quantity: row.get(4)?,
        initial_quantity: row.get(5)?,
        units: row.get(6)?,
        is_checked: row.get(7)?,
        manual_threshold: row.get(8)?,
        manual_category: row.get(9)?,
    })
}

const ITEM_COLUMNS: &str =
    "id, household_id, name, quantity, threshold_quantity, default_buy_qty, units, category";

const ENTRY_COLUMNS: &str = "id, household_id, item_id, manual_name, quantity, initial_quantity, \
                             units, is_checked, manual_threshold, manual_category";

// ── Inventory ──────────────────────────────────────────────────────────────

/// Get all pantry items for a household
pub fn get_inventory(conn: &Connection, household_id: i64) -> DbResult<Vec<InventoryItem>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {ITEM_COLUMNS} FROM items WHERE household_id = ?1 ORDER BY id"
    ))?;
    let items = stmt.query_map(params![household_id], item_from_row)?.collect();
    items
}

/// Find a pantry item by case-insensitive exact name match
pub fn find_item_by_name(
    conn: &Connection,
    household_id: i64,
    name: &str,
) -> DbResult<Option<InventoryItem>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {ITEM_COLUMNS} FROM items
         WHERE household_id = ?1 AND name = ?2 COLLATE NOCASE"
    ))?;
    let mut rows = stmt.query_map(params![household_id, name], item_from_row)?;
    rows.next().transpose()
}

/// Fields for a new pantry item
#[derive(Debug, Clone)]
pub struct NewItem {
    pub household_id: i64,
    pub name: String,
    pub quantity: i64,
    pub threshold_quantity: i64,
    pub default_buy_qty: Option<i64>,
    pub units: String,
    pub category: Option<String>,
    pub last_updated_by: Option<i64>,
}

/// Insert a pantry item, returning its id
pub fn insert_item(conn: &Connection, item: &NewItem) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO items
         (household_id, name, quantity, threshold_quantity, default_buy_qty, units, category, last_updated_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            item.household_id,
            &item.name,
            item.quantity,
            item.threshold_quantity,
            item.default_buy_qty,
            &item.units,
            &item.category,
            item.last_updated_by,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Delete a pantry item; the household filter guards cross-household deletes.
/// Returns the number of rows removed (0 or 1).
pub fn delete_item(conn: &Connection, item_id: i64, household_id: i64) -> DbResult<usize> {
    conn.execute(
        "DELETE FROM items WHERE id = ?1 AND household_id = ?2",
        params![item_id, household_id],
    )
}

/// Adjust an item's quantity as a single atomic statement.
///
/// Relative mode applies a delta (buying adds stock, consuming removes it);
/// absolute mode overwrites. Both floor at zero. Because the read-modify-write
/// happens inside one UPDATE, two concurrent adjustments can never lose one
/// another's change.
///
/// Returns the affected-row count; 0 means the item does not exist in this
/// household.
pub fn adjust_item_quantity(
    conn: &Connection,
    item_id: i64,
    household_id: i64,
    value: i64,
    is_relative: bool,
) -> DbResult<usize> {
    if is_relative {
        conn.execute(
            "UPDATE items SET quantity = MAX(0, quantity + ?1), updated_at = datetime('now')
             WHERE id = ?2 AND household_id = ?3",
            params![value, item_id, household_id],
        )
    } else {
        conn.execute(
            "UPDATE items SET quantity = MAX(0, ?1), updated_at = datetime('now')
             WHERE id = ?2 AND household_id = ?3",
            params![value, item_id, household_id],
        )
    }
}

// ── Staging ────────────────────────────────────────────────────────────────

/// Get all staged entries for a household
pub fn get_staging_entries(conn: &Connection, household_id: i64) -> DbResult<Vec<ListEntry>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {ENTRY_COLUMNS} FROM grocery_list_entries WHERE household_id = ?1 ORDER BY id"
    ))?;
    let entries = stmt.query_map(params![household_id], entry_from_row)?.collect();
    entries
}

/// Get the checked ("in the cart") entries for a household
pub fn get_checked_entries(conn: &Connection, household_id: i64) -> DbResult<Vec<ListEntry>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {ENTRY_COLUMNS} FROM grocery_list_entries
         WHERE household_id = ?1 AND is_checked = 1 ORDER BY id"
    ))?;
    let entries = stmt.query_map(params![household_id], entry_from_row)?.collect();
    entries
}

/// Find the staged entry linked to an inventory item, if any
pub fn find_entry_by_item(
    conn: &Connection,
    household_id: i64,
    item_id: i64,
) -> DbResult<Option<ListEntry>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {ENTRY_COLUMNS} FROM grocery_list_entries
         WHERE household_id = ?1 AND item_id = ?2"
    ))?;
    let mut rows = stmt.query_map(params![household_id, item_id], entry_from_row)?;
    rows.next().transpose()
}

/// Find an unlinked staged entry by case-insensitive manual name
pub fn find_entry_by_manual_name(
    conn: &Connection,
    household_id: i64,
    name: &str,
) -> DbResult<Option<ListEntry>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {ENTRY_COLUMNS} FROM grocery_list_entries
         WHERE household_id = ?1 AND manual_name = ?2 COLLATE NOCASE"
    ))?;
    let mut rows = stmt.query_map(params![household_id, name], entry_from_row)?;
    rows.next().transpose()
}

/// Fields for a new staged entry
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub household_id: i64,
    pub item_id: Option<i64>,
    pub manual_name: Option<String>,
    pub quantity: i64,
    pub initial_quantity: i64,
    pub units: String,
    pub is_checked: bool,
    pub manual_threshold: i64,
    pub manual_category: Option<String>,
}

/// Insert a staged entry, returning its id.
///
/// Fails with a unique violation if the household already stages the same
/// linked item or manual name; callers decide whether that is an error or a
/// lost race (see the resolver).
pub fn insert_entry(conn: &Connection, entry: &NewEntry) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO grocery_list_entries
         (household_id, item_id, manual_name, quantity, initial_quantity, units,
          is_checked, manual_threshold, manual_category)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.household_id,
            entry.item_id,
            &entry.manual_name,
            entry.quantity,
            entry.initial_quantity,
            &entry.units,
            entry.is_checked,
            entry.manual_threshold,
            &entry.manual_category,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Update an entry's quantity by entry id. Returns the affected-row count.
pub fn update_entry_quantity_by_id(
    conn: &Connection,
    entry_id: i64,
    household_id: i64,
    quantity: i64,
) -> DbResult<usize> {
    conn.execute(
        "UPDATE grocery_list_entries SET quantity = ?1 WHERE id = ?2 AND household_id = ?3",
        params![quantity, entry_id, household_id],
    )
}

/// Update an entry's quantity by its linked item id. The affected-row count
/// is the only way to tell "updated" apart from "no such row".
pub fn update_entry_quantity_by_item(
    conn: &Connection,
    household_id: i64,
    item_id: i64,
    quantity: i64,
) -> DbResult<usize> {
    conn.execute(
        "UPDATE grocery_list_entries SET quantity = ?1
         WHERE household_id = ?2 AND item_id = ?3",
        params![quantity, household_id, item_id],
    )
}

/// Set an entry's quantity and reset its initial_quantity to the same value,
/// rebasing the suggestion anchor (used by manual-add merges).
pub fn rebase_entry_quantity(
    conn: &Connection,
    entry_id: i64,
    household_id: i64,
    quantity: i64,
) -> DbResult<usize> {
    conn.execute(
        "UPDATE grocery_list_entries SET quantity = ?1, initial_quantity = ?1
         WHERE id = ?2 AND household_id = ?3",
        params![quantity, entry_id, household_id],
    )
}

/// Flip or set an entry's checked flag
pub fn set_entry_checked(
    conn: &Connection,
    entry_id: i64,
    household_id: i64,
    checked: bool,
) -> DbResult<usize> {
    conn.execute(
        "UPDATE grocery_list_entries SET is_checked = ?1 WHERE id = ?2 AND household_id = ?3",
        params![checked, entry_id, household_id],
    )
}

/// Delete exactly the given entries (and only within this household).
/// Returns the number of rows removed.
pub fn delete_entries(conn: &mut Connection, household_id: i64, ids: &[i64]) -> DbResult<usize> {
    let tx = conn.transaction()?;
    let mut deleted = 0;
    {
        let mut stmt = tx.prepare_cached(
            "DELETE FROM grocery_list_entries WHERE id = ?1 AND household_id = ?2",
        )?;
        for id in ids {
            deleted += stmt.execute(params![id, household_id])?;
        }
    }
    tx.commit()?;
    Ok(deleted)
}

// ── Households & membership ────────────────────────────────────────────────

/// Insert a household, returning its id. Fails with a unique violation on a
/// room-code collision.
pub fn insert_household(conn: &Connection, name: &str, room_code: &str) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO households (name, room_code) VALUES (?1, ?2)",
        params![name, room_code],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Look up a household id by its room code
pub fn find_household_by_room_code(conn: &Connection, room_code: &str) -> DbResult<Option<i64>> {
    let mut stmt = conn.prepare_cached("SELECT id FROM households WHERE room_code = ?1")?;
    let mut rows = stmt.query_map(params![room_code], |row| row.get(0))?;
    rows.next().transpose()
}

/// Insert a membership row. Fails with a unique violation if the user is
/// already a member.
pub fn insert_member(
    conn: &Connection,
    household_id: i64,
    user_id: i64,
    role: &str,
) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO household_members (household_id, user_id, role) VALUES (?1, ?2, ?3)",
        params![household_id, user_id, role],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Membership check used as the authorization gate for quantity edits
pub fn is_member(conn: &Connection, household_id: i64, user_id: i64) -> DbResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM household_members WHERE household_id = ?1 AND user_id = ?2",
        params![household_id, user_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
