//! `SQLite` table definitions.

/// One row per stopwatch. `AUTOINCREMENT` keeps deleted ids from coming back.
pub const CREATE_STOPWATCH_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS stopwatch (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_name TEXT NOT NULL,
    time_ms INTEGER NOT NULL DEFAULT 0 CHECK (time_ms >= 0)
)
";

/// Key-value bookkeeping, currently just the schema version.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";
