// Database module

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use anyhow::Result;
use rusqlite::Connection;

use crate::constants::{
    BOOTSTRAP_EMAIL, BOOTSTRAP_PASSWORD, BOOTSTRAP_USERNAME, BOOTSTRAP_USER_ID, DATA_DIR,
    DB_FILENAME,
};

/// Open or create a database at the given path
pub fn open_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)?;

    // Enable foreign keys (must be done per connection)
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    // Enable WAL mode for better concurrency
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;

    // Run migrations
    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// Default data directory: ~/.shrimpscale
pub fn default_data_dir() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(home.home_dir().join(DATA_DIR))
}

/// Get the database path for a data directory
pub fn get_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DB_FILENAME)
}

/// Idempotent startup initialization: schema is already created by
/// `open_db`; here we seed the offline bootstrap credential, but only when
/// the user table is empty (first initialization, never after).
pub fn initialize(conn: &Connection) -> Result<()> {
    if schema::count_users(conn)? > 0 {
        return Ok(());
    }

    let password_hash = bcrypt::hash(BOOTSTRAP_PASSWORD, bcrypt::DEFAULT_COST)?;
    let admin = schema::UserCredential {
        id: BOOTSTRAP_USER_ID.to_string(),
        username: BOOTSTRAP_USERNAME.to_string(),
        email: Some(BOOTSTRAP_EMAIL.to_string()),
        password_hash,
    };
    schema::insert_user_if_absent(conn, &admin)?;
    log::info!("Seeded bootstrap credential '{}'", BOOTSTRAP_USERNAME);

    Ok(())
}
