//! Event log views: recent history and the spreadsheet export.
//!
//! Both read the event log newest first. The export is a five-column CSV with
//! a UTF-8 byte-order mark so spreadsheet tools detect the encoding.

use crate::store::Store;
use crate::{Error, Event, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Number of events returned by the history view
pub const HISTORY_LIMIT: usize = 50;

/// Default file name for the CSV export
pub const EXPORT_FILE_NAME: &str = "tools_report.csv";

const BOM: &[u8] = "\u{feff}".as_bytes();

/// A row in the CSV export
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Log ID")]
    id: i64,
    #[serde(rename = "Slot ID")]
    slot_id: i64,
    #[serde(rename = "Action")]
    action: &'static str,
    #[serde(rename = "Authorized")]
    holder_token: &'a str,
    #[serde(rename = "Timestamp")]
    timestamp: &'a str,
}

impl<'a> From<&'a Event> for CsvRow<'a> {
    fn from(event: &'a Event) -> Self {
        CsvRow {
            id: event.id,
            slot_id: event.slot_id,
            action: event.action.as_str(),
            holder_token: &event.holder_token,
            timestamp: &event.timestamp,
        }
    }
}

/// Most recent events, newest first, capped at `limit`
pub fn load_history(store: &Store, limit: usize) -> Result<Vec<Event>> {
    let events = store.recent_events(limit)?;
    tracing::debug!("Loaded {} history events", events.len());
    Ok(events)
}

/// Write events as BOM-prefixed CSV
///
/// The header row is always written, even for an empty log.
pub fn write_export<W: Write>(events: &[Event], mut out: W) -> Result<()> {
    out.write_all(BOM)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    writer.write_record(["Log ID", "Slot ID", "Action", "Authorized", "Timestamp"])?;
    for event in events {
        writer.serialize(CsvRow::from(event))?;
    }
    writer.flush()?;
    Ok(())
}

/// Export the whole event log (newest first) into an in-memory buffer
pub fn export_bytes(store: &Store) -> Result<Vec<u8>> {
    let events = store.events_newest_first()?;
    let mut buf = Vec::new();
    write_export(&events, &mut buf)?;
    Ok(buf)
}

/// Export the whole event log to `path`, replacing it atomically
///
/// Returns the number of events written.
pub fn export_to_path(store: &Store, path: &Path) -> Result<usize> {
    let events = store.events_newest_first()?;

    // Ensure parent directory exists
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&parent)?;

    // Create unique temp file in the same directory for atomic rename
    let mut temp = NamedTempFile::new_in(&parent)?;
    write_export(&events, temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::info!("Exported {} events to {:?}", events.len(), path);
    Ok(events.len())
}
