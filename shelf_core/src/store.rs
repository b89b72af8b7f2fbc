//! SQLite-backed slot store and event log.
//!
//! Two relations live in one database file:
//! - `slots`: one row per provisioned slot, mutated in place
//! - `events`: append-only loan log with AUTOINCREMENT ids
//!
//! The connection sits behind a mutex so every ingestion cycle runs its
//! read-modify-write sequence inside one `BEGIN IMMEDIATE` transaction.

use crate::layout::SlotBinding;
use crate::{Error, Event, EventAction, LifecycleState, NewEvent, Result, Slot};
use rusqlite::types::{FromSqlError, Type};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS slots (
    slot_id      INTEGER PRIMARY KEY,
    name         TEXT    NOT NULL,
    status       INTEGER NOT NULL DEFAULT -1,
    holder_token TEXT    NOT NULL DEFAULT '',
    weight       REAL    NOT NULL DEFAULT 0.0,
    borrow_time  TEXT,
    usage_count  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS events (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    slot_id      INTEGER NOT NULL,
    action       TEXT    NOT NULL,
    holder_token TEXT    NOT NULL DEFAULT '',
    timestamp    TEXT    NOT NULL
);
";

const SLOT_COLUMNS: &str =
    "slot_id, name, status, holder_token, weight, borrow_time, usage_count";

const EVENT_COLUMNS: &str = "id, slot_id, action, holder_token, timestamp";

/// How long a writer waits on another process holding the database lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Slot store and event log over a single SQLite connection
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Store {
    /// Open or create the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("Opened shelf database {:?} (journal_mode={})", path, mode);

        Self::initialize(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Create a throwaway in-memory store
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    fn initialize(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Database file backing this store, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::StorageUnavailable("slot store lock poisoned".into()))
    }

    /// Insert rows for any bound slot that does not exist yet
    ///
    /// Existing rows keep their name, state and usage count.
    /// Returns the number of newly provisioned slots.
    pub fn provision(&self, bindings: &[SlotBinding]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = insert_missing(&tx, bindings)?;
        tx.commit()?;

        if inserted > 0 {
            tracing::info!("Provisioned {} new slot(s)", inserted);
        }
        Ok(inserted)
    }

    /// Provision missing slots, then reset every slot row to Uninitialized
    ///
    /// Live state is always re-learned from the next hardware report; usage
    /// counts and the event log are preserved.
    pub fn cold_restart(&self, bindings: &[SlotBinding]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let inserted = insert_missing(&tx, bindings)?;
        let reset = tx.execute(
            "UPDATE slots
             SET status = ?1, weight = 0.0, holder_token = '', borrow_time = NULL",
            params![LifecycleState::Uninitialized.code()],
        )?;
        tx.commit()?;

        tracing::info!(
            "Cold restart: {} slot(s) reset to waiting, {} newly provisioned",
            reset,
            inserted
        );
        Ok(())
    }

    /// All slots in slot-id order
    pub fn slots(&self) -> Result<Vec<Slot>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots ORDER BY slot_id ASC"
        ))?;
        let slots = stmt
            .query_map([], row_to_slot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(slots)
    }

    /// A single slot, if provisioned
    pub fn slot(&self, slot_id: i64) -> Result<Option<Slot>> {
        let conn = self.lock()?;
        let slot = conn
            .query_row(
                &format!("SELECT {SLOT_COLUMNS} FROM slots WHERE slot_id = ?1"),
                params![slot_id],
                row_to_slot,
            )
            .optional()?;
        Ok(slot)
    }

    /// The most recent `limit` events, newest first
    pub fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY id DESC LIMIT ?1"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let events = stmt
            .query_map(params![limit], row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Every event, newest first
    pub fn events_newest_first(&self) -> Result<Vec<Event>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY id DESC"
        ))?;
        let events = stmt
            .query_map([], row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Run `f` inside one write transaction
    ///
    /// The transaction commits only if `f` returns `Ok`; any error rolls back
    /// every change made through the [`Cycle`].
    pub fn with_cycle<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Cycle<'_>) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut cycle = Cycle { tx };

        let out = f(&mut cycle)?;
        cycle.tx.commit()?;
        Ok(out)
    }
}

/// Write access to the store for the duration of one ingestion cycle
pub struct Cycle<'conn> {
    tx: Transaction<'conn>,
}

impl Cycle<'_> {
    /// Read the current row for a slot; a missing row is a storage failure
    pub fn load_slot(&self, slot_id: i64) -> Result<Slot> {
        let slot = self.tx.query_row(
            &format!("SELECT {SLOT_COLUMNS} FROM slots WHERE slot_id = ?1"),
            params![slot_id],
            row_to_slot,
        )?;
        Ok(slot)
    }

    /// Overwrite the mutable columns of a slot row
    pub fn save_slot(&self, slot: &Slot) -> Result<()> {
        self.tx.execute(
            "UPDATE slots
             SET status = ?1, holder_token = ?2, weight = ?3, borrow_time = ?4, usage_count = ?5
             WHERE slot_id = ?6",
            params![
                slot.lifecycle_state.code(),
                slot.holder_token,
                slot.weight,
                slot.borrow_time,
                slot.usage_count,
                slot.slot_id,
            ],
        )?;
        Ok(())
    }

    /// Append an event and return its assigned id
    pub fn append_event(&self, event: &NewEvent) -> Result<i64> {
        self.tx.execute(
            "INSERT INTO events (slot_id, action, holder_token, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event.slot_id,
                event.action.as_str(),
                event.holder_token,
                event.timestamp,
            ],
        )?;
        Ok(self.tx.last_insert_rowid())
    }
}

fn insert_missing(tx: &Transaction<'_>, bindings: &[SlotBinding]) -> Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT OR IGNORE INTO slots (slot_id, name, status, holder_token, weight, borrow_time, usage_count)
         VALUES (?1, ?2, ?3, '', 0.0, NULL, 0)",
    )?;

    let mut inserted = 0;
    for binding in bindings {
        inserted += stmt.execute(params![
            binding.slot_id,
            binding.name,
            LifecycleState::Uninitialized.code(),
        ])?;
    }
    Ok(inserted)
}

fn row_to_slot(row: &rusqlite::Row<'_>) -> rusqlite::Result<Slot> {
    let code: i64 = row.get(2)?;
    let lifecycle_state = LifecycleState::from_code(code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Integer,
            Box::new(FromSqlError::OutOfRange(code)),
        )
    })?;

    Ok(Slot {
        slot_id: row.get(0)?,
        name: row.get(1)?,
        lifecycle_state,
        holder_token: row.get(3)?,
        weight: row.get(4)?,
        borrow_time: row.get(5)?,
        usage_count: row.get(6)?,
    })
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let action: String = row.get(2)?;
    let action = EventAction::parse(&action).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(FromSqlError::InvalidType))
    })?;

    Ok(Event {
        id: row.get(0)?,
        slot_id: row.get(1)?,
        action,
        holder_token: row.get(3)?,
        timestamp: row.get(4)?,
    })
}
