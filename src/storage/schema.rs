//! Checkpoint database schema
//!
//! Every save creates a fresh database with this schema, so there are no
//! migrations: a version bump makes older checkpoints unreadable on purpose.

/// Value of the `format` meta key
pub const FORMAT_TAG: &str = "obit-crawl-checkpoint";

/// Value of the `version` meta key
pub const SCHEMA_VERSION: u32 = 2;

/// SQL schema for a checkpoint database
pub const SCHEMA_SQL: &str = r#"
-- Self-description: format tag, version, run id, saved_at, entry_count, digest
CREATE TABLE checkpoint_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Root category snapshot (at most one row)
CREATE TABLE root_category (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    title TEXT NOT NULL
);

CREATE TABLE root_members (
    position INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    namespace INTEGER NOT NULL
);

-- Completed entries, keyed by (year, name)
CREATE TABLE entries (
    year INTEGER NOT NULL,
    name TEXT NOT NULL,
    slug TEXT NOT NULL,
    views INTEGER NOT NULL CHECK (views >= 0),
    PRIMARY KEY (year, name)
);
"#;

/// Initializes the schema on a fresh connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
