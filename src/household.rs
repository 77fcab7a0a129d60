//! Household creation, room-code joins, and membership.

use crate::database;
use crate::error::{PantryError, Result};
use rand::Rng;
use rusqlite::Connection;
use serde::Serialize;

const ROOM_CODE_LEN: usize = 6;
// No 0/O/1/I: room codes get read out loud and typed on phones.
const ROOM_CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ROOM_CODE_ATTEMPTS: usize = 8;

/// A created household, with the room code others use to join it
#[derive(Debug, Clone, Serialize)]
pub struct Household {
    pub id: i64,
    pub name: String,
    pub room_code: String,
}

fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_CHARSET[rng.gen_range(0..ROOM_CODE_CHARSET.len())] as char)
        .collect()
}

/// Create a household and enroll the creator as its admin member.
///
/// Both inserts happen in one transaction so a failed membership insert
/// cannot leave an orphaned household behind. Room-code collisions are
/// retried with a fresh code a bounded number of times.
pub fn create_household(conn: &mut Connection, name: &str, user_id: i64) -> Result<Household> {
    let name = name.trim();
    let tx = conn.transaction()?;

    let mut code = generate_room_code();
    let mut id = None;
    for _ in 0..ROOM_CODE_ATTEMPTS {
        match database::insert_household(&tx, name, &code) {
            Ok(new_id) => {
                id = Some(new_id);
                break;
            }
            Err(ref err) if database::is_unique_violation(err) => code = generate_room_code(),
            Err(err) => return Err(err.into()),
        }
    }
    let Some(id) = id else {
        return Err(PantryError::NotFound("free room code".to_string()));
    };

    database::insert_member(&tx, id, user_id, "admin")?;
    tx.commit()?;

    log::info!("Created household {} ('{}') with room code {}", id, name, code);
    Ok(Household { id, name: name.to_string(), room_code: code })
}

/// Join a household by room code.
///
/// Codes are matched case-insensitively (stored uppercase). Joining twice
/// reports `AlreadyMember`, whether the duplicate is seen up front or only
/// as a lost race on the membership insert.
pub fn join_household(conn: &Connection, room_code: &str, user_id: i64) -> Result<i64> {
    let code = room_code.trim().to_uppercase();
    let Some(household_id) = database::find_household_by_room_code(conn, &code)? else {
        return Err(PantryError::NotFound(format!("household with room code {code}")));
    };

    if database::is_member(conn, household_id, user_id)? {
        return Err(PantryError::AlreadyMember);
    }

    match database::insert_member(conn, household_id, user_id, "member") {
        Ok(_) => {
            log::info!("User {} joined household {}", user_id, household_id);
            Ok(household_id)
        }
        Err(ref err) if database::is_unique_violation(err) => Err(PantryError::AlreadyMember),
        Err(err) => Err(err.into()),
    }
}
