//! Schema versioning for the stopwatch database.
//!
//! The version lives under `schema_version` in the `metadata` table. Each
//! migration runs in its own transaction together with the version bump, so
//! a database is never left between versions.

use std::cmp::Ordering;

use rusqlite::Connection;
use tracing::debug;

use crate::error::{Error, Result};

use super::schema::{CREATE_METADATA_TABLE, CREATE_STOPWATCH_TABLE};

/// The current schema version.
pub const CURRENT_VERSION: i32 = 1;

const VERSION_KEY: &str = "schema_version";

type Migration = fn(&Connection) -> Result<()>;

/// Migrations by the version they produce, ascending.
const MIGRATIONS: &[(i32, Migration)] = &[(1, create_stopwatch_table)];

/// Bring the database up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns an error if a migration fails or the database was written by a
/// newer version of yourtime.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_METADATA_TABLE, [])?;
    let version = schema_version(conn)?;

    match version.cmp(&CURRENT_VERSION) {
        Ordering::Equal => Ok(()),
        Ordering::Greater => Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        }),
        Ordering::Less => MIGRATIONS
            .iter()
            .filter(|(target, _)| *target > version)
            .try_for_each(|&(target, migrate)| apply(conn, target, migrate)),
    }
}

fn apply(conn: &Connection, target: i32, migrate: Migration) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    migrate(&tx)?;
    tx.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, target.to_string()),
    )?;
    tx.commit()?;
    debug!(version = target, "Applied schema migration");
    Ok(())
}

/// Stored schema version, 0 for a fresh database.
fn schema_version(conn: &Connection) -> Result<i32> {
    let stored = conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get::<_, String>(0),
    );

    match stored {
        Ok(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn create_stopwatch_table(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_STOPWATCH_TABLE, [])?;
    Ok(())
}
