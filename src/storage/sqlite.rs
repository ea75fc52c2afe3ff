//! SQLite checkpoint store
//!
//! Each save writes a complete database to `<checkpoint>.tmp` inside a single
//! transaction, syncs it, and renames it over the previous checkpoint. A crash
//! at any point leaves either the old file or the new one in place.

use crate::client::{Category, CategoryMember};
use crate::state::{CrawlState, EntryResult, RunId};
use crate::storage::schema::{initialize_schema, FORMAT_TAG, SCHEMA_VERSION};
use crate::storage::traits::{CheckpointError, CheckpointResult, CheckpointStore};
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Checkpoint store keeping one SQLite file per run identifier
#[derive(Debug, Clone)]
pub struct SqliteCheckpointStore {
    dir: PathBuf,
}

impl SqliteCheckpointStore {
    /// Creates a store rooted at `dir` (created on first save)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write_database(&self, path: &Path, run_id: &RunId, state: &CrawlState) -> CheckpointResult<()> {
        let mut conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = DELETE;
            PRAGMA synchronous = FULL;
        ",
        )?;

        let tx = conn.transaction()?;
        initialize_schema(&tx)?;

        let meta = [
            ("format", FORMAT_TAG.to_string()),
            ("version", SCHEMA_VERSION.to_string()),
            ("run_id", run_id.to_string()),
            ("saved_at", Utc::now().to_rfc3339()),
            ("entry_count", state.entry_count().to_string()),
            ("digest", state_digest(state)),
        ];
        for (key, value) in &meta {
            tx.execute(
                "INSERT INTO checkpoint_meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
        }

        if let Some(root) = &state.root_category {
            tx.execute(
                "INSERT INTO root_category (id, title) VALUES (1, ?1)",
                params![root.title],
            )?;
            let mut stmt = tx.prepare(
                "INSERT INTO root_members (position, title, namespace) VALUES (?1, ?2, ?3)",
            )?;
            for (position, member) in root.members.iter().enumerate() {
                stmt.execute(params![position as i64, member.title, member.namespace])?;
            }
        }

        {
            let mut stmt =
                tx.prepare("INSERT INTO entries (year, name, slug, views) VALUES (?1, ?2, ?3, ?4)")?;
            for row in state.entries() {
                let views = i64::try_from(row.views).map_err(|_| CheckpointError::Corrupt {
                    path: path.to_path_buf(),
                    reason: format!("views for {} out of range: {}", row.name, row.views),
                })?;
                stmt.execute(params![row.year, row.name, row.slug, views])?;
            }
        }

        tx.commit()?;
        conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    fn load(&self, run_id: &RunId) -> CheckpointResult<Option<CrawlState>> {
        let path = self.path_for(run_id);
        if !path.exists() {
            return Ok(None);
        }

        tracing::info!("Loading checkpoint at {}", path.display());
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| corrupt(&path, e.to_string()))?;

        let (meta, state) = read_checkpoint(&conn).map_err(|e| corrupt(&path, e.to_string()))?;
        verify_checkpoint(&path, run_id, &meta, &state)?;

        tracing::info!(
            "Loaded checkpoint with {} entries (saved at {})",
            state.entry_count(),
            meta.get("saved_at").map(String::as_str).unwrap_or("unknown")
        );
        Ok(Some(state))
    }

    fn save(&self, run_id: &RunId, state: &CrawlState) -> CheckpointResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(run_id);
        let tmp = path.with_extension("db.tmp");

        // Leftover from a crash mid-save
        if tmp.exists() {
            fs::remove_file(&tmp)?;
        }

        if let Err(e) = self.write_database(&tmp, run_id, state) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        File::open(&tmp)?.sync_all()?;
        fs::rename(&tmp, &path)?;

        // Persist the rename itself; not supported on every platform
        if let Ok(dir) = File::open(&self.dir) {
            let _ = dir.sync_all();
        }

        tracing::info!(
            "Caching {} entries to {}",
            state.entry_count(),
            path.display()
        );
        Ok(())
    }

    fn path_for(&self, run_id: &RunId) -> PathBuf {
        self.dir.join(format!("cache-{}.db", run_id))
    }
}

fn corrupt(path: &Path, reason: impl Into<String>) -> CheckpointError {
    CheckpointError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Reads meta values and state without judging them
fn read_checkpoint(conn: &Connection) -> rusqlite::Result<(HashMap<String, String>, CrawlState)> {
    let check: String = conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
    if check != "ok" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CORRUPT),
            Some(format!("quick_check: {}", check)),
        ));
    }

    let mut meta = HashMap::new();
    {
        let mut stmt = conn.prepare("SELECT key, value FROM checkpoint_meta")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (key, value) = row?;
            meta.insert(key, value);
        }
    }

    let mut state = CrawlState::new();

    let root_title: Option<String> = conn
        .query_row("SELECT title FROM root_category WHERE id = 1", [], |row| row.get(0))
        .optional()?;
    if let Some(title) = root_title {
        let mut stmt = conn
            .prepare("SELECT title, namespace FROM root_members ORDER BY position")?;
        let members = stmt
            .query_map([], |row| {
                Ok(CategoryMember {
                    title: row.get(0)?,
                    namespace: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        state.root_category = Some(Category { title, members });
    }

    let mut stmt = conn.prepare("SELECT year, name, slug, views FROM entries ORDER BY year, name")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i32>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;
    for row in rows {
        let (year, name, slug, views) = row?;
        let views = u64::try_from(views).map_err(|_| {
            rusqlite::Error::IntegralValueOutOfRange(3, views)
        })?;
        state.record(year, &name, EntryResult { slug, views });
    }

    Ok((meta, state))
}

/// Checks the self-description and digest of a loaded checkpoint
fn verify_checkpoint(
    path: &Path,
    run_id: &RunId,
    meta: &HashMap<String, String>,
    state: &CrawlState,
) -> CheckpointResult<()> {
    let field = |key: &str| {
        meta.get(key)
            .ok_or_else(|| corrupt(path, format!("missing meta key '{}'", key)))
    };

    let format = field("format")?;
    if format != FORMAT_TAG {
        return Err(corrupt(path, format!("unrecognized format tag '{}'", format)));
    }

    let version = field("version")?;
    if version.parse::<u32>().ok() != Some(SCHEMA_VERSION) {
        return Err(corrupt(path, format!("unsupported schema version '{}'", version)));
    }

    let found = field("run_id")?;
    if found != run_id.as_str() {
        return Err(CheckpointError::RunMismatch {
            path: path.to_path_buf(),
            expected: run_id.to_string(),
            found: found.clone(),
        });
    }

    let expected_count = field("entry_count")?;
    if expected_count.parse::<usize>().ok() != Some(state.entry_count()) {
        return Err(corrupt(
            path,
            format!(
                "entry count mismatch: header says {}, found {}",
                expected_count,
                state.entry_count()
            ),
        ));
    }

    if field("digest")? != &state_digest(state) {
        return Err(corrupt(path, "content digest mismatch"));
    }

    Ok(())
}

/// SHA-256 over the canonical content of a state
fn state_digest(state: &CrawlState) -> String {
    let mut hasher = Sha256::new();

    if let Some(root) = &state.root_category {
        hasher.update(b"root\0");
        hasher.update(root.title.as_bytes());
        hasher.update(b"\n");
        for member in &root.members {
            hasher.update(member.title.as_bytes());
            hasher.update(b"\0");
            hasher.update(member.namespace.to_string().as_bytes());
            hasher.update(b"\n");
        }
    }

    for row in state.entries() {
        hasher.update(row.year.to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(row.name.as_bytes());
        hasher.update(b"\0");
        hasher.update(row.slug.as_bytes());
        hasher.update(b"\0");
        hasher.update(row.views.to_string().as_bytes());
        hasher.update(b"\n");
    }

    hex::encode(hasher.finalize())
}
