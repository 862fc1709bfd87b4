//! SQLite-backed lineage store
//!
//! One `backups` table:
//!
//! ```sql
//! CREATE TABLE backups (
//!     id INTEGER PRIMARY KEY ASC, directory TEXT, archive_id TEXT,
//!     vault TEXT, location TEXT, encrypted TEXT, multi_part INTEGER,
//!     size INTEGER, deleted INTEGER, date TEXT);
//! ```
//!
//! An existing table is validated column by column on open and never
//! migrated. `encrypted` holds the encryption recipient id, or an empty
//! string for unencrypted archives. `date` is UTC with microseconds and is
//! informational only: entries are ordered by `id`, the insertion sequence,
//! so a clock stepping back never reorders the ledger. All access goes
//! through one connection behind a mutex, and every write runs in its own
//! transaction.

use crate::error::{StoreError, StoreResult};
use crate::store::LineageStore;
use chrono::{NaiveDateTime, Utc};
use frostline_core::{LineageEntry, NewLineageEntry, TIMESTAMP_FORMAT};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Ledger table name
pub const TABLE_NAME: &str = "backups";

/// Column definitions, in table order
pub const COLUMNS: [(&str, &str); 10] = [
    ("id", "INTEGER PRIMARY KEY ASC"),
    ("directory", "TEXT"),
    ("archive_id", "TEXT"),
    ("vault", "TEXT"),
    ("location", "TEXT"),
    ("encrypted", "TEXT"),
    ("multi_part", "INTEGER"),
    ("size", "INTEGER"),
    ("deleted", "INTEGER"),
    ("date", "TEXT"),
];

const SELECT_COLUMNS: &str =
    "id, directory, archive_id, vault, location, encrypted, multi_part, size, deleted, date";

/// Lineage store in a single SQLite database file
pub struct SqliteLineageStore {
    conn: Mutex<Connection>,
}

impl SqliteLineageStore {
    /// Open (or create) the ledger at `path`
    ///
    /// Fails with [`StoreError::NotADatabase`] if the file is not SQLite and
    /// with [`StoreError::SchemaMismatch`] if an existing table differs.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::init(conn)?;
        debug!(path = %path.display(), "Opened lineage store");
        Ok(store)
    }

    /// Open a throwaway in-memory ledger
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        if has_backups_table(&conn)? {
            validate_schema(&conn)?;
        } else {
            create_backups_table(&conn)?;
        }
        Ok(SqliteLineageStore {
            conn: Mutex::new(conn),
        })
    }

    /// Append an entry with an explicit timestamp
    ///
    /// `append` uses the current UTC time. The timestamp does not affect
    /// ordering.
    pub fn append_at(
        &self,
        entry: NewLineageEntry,
        created_at: NaiveDateTime,
    ) -> StoreResult<LineageEntry> {
        let date = created_at.format(TIMESTAMP_FORMAT).to_string();
        let created_at = parse_date(0, &date)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO backups \
             (directory, archive_id, vault, location, encrypted, multi_part, size, deleted, date) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
            params![
                directory_key(&entry.source_directory),
                entry.remote_archive_id,
                entry.vault,
                entry.remote_location,
                entry.encryption_recipient.clone().unwrap_or_default(),
                entry.is_multi_part as i64,
                entry.size_bytes as i64,
                date,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(LineageEntry {
            id,
            source_directory: entry.source_directory,
            remote_archive_id: entry.remote_archive_id,
            vault: entry.vault,
            remote_location: entry.remote_location,
            encryption_recipient: entry.encryption_recipient,
            is_multi_part: entry.is_multi_part,
            size_bytes: entry.size_bytes,
            deleted: false,
            created_at,
        })
    }

    fn query(&self, directory: &Path, active_only: bool) -> StoreResult<Vec<LineageEntry>> {
        let sql = format!(
            "SELECT {} FROM backups WHERE directory = ?1 {} ORDER BY id ASC",
            SELECT_COLUMNS,
            if active_only { "AND deleted = 0" } else { "" }
        );

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![directory_key(directory)], RawRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawRow::into_entry).collect()
    }
}

impl LineageStore for SqliteLineageStore {
    fn append(&self, entry: NewLineageEntry) -> StoreResult<LineageEntry> {
        self.append_at(entry, Utc::now().naive_utc())
    }

    fn list_active(&self, directory: &Path) -> StoreResult<Vec<LineageEntry>> {
        self.query(directory, true)
    }

    fn history(&self, directory: &Path) -> StoreResult<Vec<LineageEntry>> {
        self.query(directory, false)
    }

    fn soft_delete(&self, remote_archive_id: &str) -> StoreResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE backups SET deleted = 1 WHERE archive_id = ?1 AND deleted = 0",
            params![remote_archive_id],
        )?;
        tx.commit()?;
        Ok(changed > 0)
    }
}

struct RawRow {
    id: i64,
    directory: String,
    archive_id: String,
    vault: String,
    location: String,
    encrypted: Option<String>,
    multi_part: i64,
    size: i64,
    deleted: i64,
    date: String,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawRow {
            id: row.get(0)?,
            directory: row.get(1)?,
            archive_id: row.get(2)?,
            vault: row.get(3)?,
            location: row.get(4)?,
            encrypted: row.get(5)?,
            multi_part: row.get(6)?,
            size: row.get(7)?,
            deleted: row.get(8)?,
            date: row.get(9)?,
        })
    }

    fn into_entry(self) -> StoreResult<LineageEntry> {
        let size_bytes = u64::try_from(self.size).map_err(|_| StoreError::InvalidRow {
            id: self.id,
            reason: format!("negative size {}", self.size),
        })?;
        let created_at = parse_date(self.id, &self.date)?;

        Ok(LineageEntry {
            id: self.id,
            source_directory: PathBuf::from(self.directory),
            remote_archive_id: self.archive_id,
            vault: self.vault,
            remote_location: self.location,
            encryption_recipient: self.encrypted.filter(|r| !r.is_empty()),
            is_multi_part: self.multi_part != 0,
            size_bytes,
            deleted: self.deleted != 0,
            created_at,
        })
    }
}

fn directory_key(directory: &Path) -> String {
    directory.to_string_lossy().into_owned()
}

fn parse_date(id: i64, date: &str) -> StoreResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(date, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S"))
        .map_err(|e| StoreError::InvalidRow {
            id,
            reason: format!("bad date {:?}: {}", date, e),
        })
}

fn has_backups_table(conn: &Connection) -> StoreResult<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![TABLE_NAME],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn create_backups_table(conn: &Connection) -> StoreResult<()> {
    let columns: Vec<String> = COLUMNS
        .iter()
        .map(|(name, decl)| format!("{} {}", name, decl))
        .collect();
    conn.execute_batch(&format!(
        "CREATE TABLE {} ({});",
        TABLE_NAME,
        columns.join(", ")
    ))?;
    debug!("Created backups table");
    Ok(())
}

/// Column signature as reported by `PRAGMA table_info`: name, type, primary key
fn expected_signature() -> Vec<(String, String, bool)> {
    COLUMNS
        .iter()
        .map(|(name, decl)| {
            let ty = decl.split_whitespace().next().unwrap_or_default();
            (name.to_string(), ty.to_string(), decl.contains("PRIMARY KEY"))
        })
        .collect()
}

fn validate_schema(conn: &Connection) -> StoreResult<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", TABLE_NAME))?;
    let found = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let ty: String = row.get(2)?;
            let pk: i64 = row.get(5)?;
            Ok((name, ty.to_uppercase(), pk > 0))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let expected = expected_signature();
    if found != expected {
        return Err(StoreError::SchemaMismatch {
            expected: describe(&expected),
            found: describe(&found),
        });
    }
    Ok(())
}

fn describe(columns: &[(String, String, bool)]) -> String {
    columns
        .iter()
        .map(|(name, ty, pk)| {
            if *pk {
                format!("{} {} PRIMARY KEY", name, ty)
            } else {
                format!("{} {}", name, ty)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
