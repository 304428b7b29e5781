// Database schema types and query helpers

use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

// ----- Users -----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCredential {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
}

pub fn count_users(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count)
}

pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserCredential>> {
    let result = conn
        .query_row(
            "SELECT id, username, email, password_hash FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok(UserCredential {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                    password_hash: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(result)
}

/// Insert a credential unless the id or username is already cached. Existing
/// rows (and their hashes) are never overwritten. Returns true if a row was
/// actually inserted.
pub fn insert_user_if_absent(conn: &Connection, user: &UserCredential) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO users (id, username, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
        params![user.id, user.username, user.email, user.password_hash],
    )?;
    Ok(inserted > 0)
}

// ----- Biomass records -----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiomassRecord {
    pub local_id: i64,
    pub owner_id: String,
    pub record_id: String,
    pub shrimp_count: i64,
    pub biomass: f64,
    pub feed_measurement: f64,
    pub created_at: String,
    pub synced: bool,
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BiomassRecord> {
    Ok(BiomassRecord {
        local_id: row.get(0)?,
        owner_id: row.get(1)?,
        record_id: row.get(2)?,
        shrimp_count: row.get(3)?,
        biomass: row.get(4)?,
        feed_measurement: row.get(5)?,
        created_at: row.get(6)?,
        synced: row.get::<_, i64>(7)? != 0,
    })
}

const RECORD_COLUMNS: &str =
    "local_id, owner_id, record_id, shrimp_count, biomass, feed_measurement, created_at, synced";

/// Append a new record for an owner. The record id is freshly assigned and
/// never changes afterwards; the row starts unsynced.
pub fn insert_record(
    conn: &Connection,
    owner_id: &str,
    shrimp_count: i64,
    biomass: f64,
    feed_measurement: f64,
) -> Result<BiomassRecord> {
    let record_id = Uuid::new_v4().to_string();
    let created_at = Local::now().to_rfc3339();

    conn.execute(
        "INSERT INTO biomass_records
            (owner_id, record_id, shrimp_count, biomass, feed_measurement, created_at, synced)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
        params![owner_id, record_id, shrimp_count, biomass, feed_measurement, created_at],
    )?;

    Ok(BiomassRecord {
        local_id: conn.last_insert_rowid(),
        owner_id: owner_id.to_string(),
        record_id,
        shrimp_count,
        biomass,
        feed_measurement,
        created_at,
        synced: false,
    })
}

/// All records for an owner, newest first. Ordering is by insertion order
/// (local_id), not by parsing timestamps.
pub fn list_records_by_owner(conn: &Connection, owner_id: &str) -> Result<Vec<BiomassRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM biomass_records WHERE owner_id = ?1 ORDER BY local_id DESC"
    ))?;
    let rows = stmt.query_map(params![owner_id], record_from_row)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

pub fn latest_record_by_owner(conn: &Connection, owner_id: &str) -> Result<Option<BiomassRecord>> {
    let result = conn
        .query_row(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM biomass_records
                 WHERE owner_id = ?1 ORDER BY local_id DESC LIMIT 1"
            ),
            params![owner_id],
            record_from_row,
        )
        .optional()?;
    Ok(result)
}

/// Most recent record regardless of owner (recent-activity display).
pub fn latest_record_any(conn: &Connection) -> Result<Option<BiomassRecord>> {
    let result = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM biomass_records ORDER BY local_id DESC LIMIT 1"),
            [],
            record_from_row,
        )
        .optional()?;
    Ok(result)
}

pub fn unsynced_records_by_owner(conn: &Connection, owner_id: &str) -> Result<Vec<BiomassRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM biomass_records
         WHERE owner_id = ?1 AND synced = 0 ORDER BY local_id ASC"
    ))?;
    let rows = stmt.query_map(params![owner_id], record_from_row)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// Flip every pending row for an owner to synced in one statement. Called
/// only after the remote bulk insert is confirmed. Returns the row count.
pub fn mark_owner_synced(conn: &Connection, owner_id: &str) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE biomass_records SET synced = 1 WHERE owner_id = ?1 AND synced = 0",
        params![owner_id],
    )?;
    Ok(updated)
}

/// Owner-scoped delete. A correct local_id presented with the wrong owner
/// matches nothing: the row is untouched and None is returned. On success
/// returns the removed row's (record_id, synced) for remote mirroring.
pub fn delete_record_local(
    conn: &Connection,
    local_id: i64,
    owner_id: &str,
) -> Result<Option<(String, bool)>> {
    let found = conn
        .query_row(
            "SELECT record_id, synced FROM biomass_records WHERE local_id = ?1 AND owner_id = ?2",
            params![local_id, owner_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? != 0)),
        )
        .optional()?;

    let Some((record_id, synced)) = found else {
        return Ok(None);
    };

    conn.execute(
        "DELETE FROM biomass_records WHERE local_id = ?1 AND owner_id = ?2",
        params![local_id, owner_id],
    )?;

    Ok(Some((record_id, synced)))
}
