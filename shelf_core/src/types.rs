//! Core domain types for the tool shelf.
//!
//! This module defines the fundamental types used throughout the system:
//! - Slot lifecycle states and their persisted codes
//! - Slot rows and loan events
//! - Timestamp formatting shared by the store and the projector

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage format for `borrow_time` and event timestamps (second resolution).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Holder token written for an authorized reading.
pub const TOKEN_AUTHORIZED: &str = "True";

/// Holder token written for an unauthorized reading.
pub const TOKEN_UNAUTHORIZED: &str = "False";

// ============================================================================
// Lifecycle
// ============================================================================

/// Loan status of a slot as derived from hardware reports
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// No report received since the last cold restart
    Uninitialized,
    /// Tool is resting in the slot
    Available,
    /// Tool has been lifted off the shelf
    Borrowed,
}

impl LifecycleState {
    /// Integer code stored in the `tools.status` column
    pub fn code(self) -> i64 {
        match self {
            LifecycleState::Uninitialized => -1,
            LifecycleState::Borrowed => 0,
            LifecycleState::Available => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(LifecycleState::Uninitialized),
            0 => Some(LifecycleState::Borrowed),
            1 => Some(LifecycleState::Available),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LifecycleState::Uninitialized => "Uninitialized",
            LifecycleState::Available => "Available",
            LifecycleState::Borrowed => "Borrowed",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Slot
// ============================================================================

/// One physical slot on the shelf, as persisted in the slot store
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub slot_id: i64,
    pub name: String,
    pub lifecycle_state: LifecycleState,
    pub holder_token: String,
    pub weight: f64,
    /// Raw persisted timestamp text; parsed lazily so bad rows stay readable.
    pub borrow_time: Option<String>,
    pub usage_count: i64,
}

impl Slot {
    /// A freshly provisioned (or cold-restarted) slot
    pub fn provisioned(slot_id: i64, name: impl Into<String>) -> Self {
        Self {
            slot_id,
            name: name.into(),
            lifecycle_state: LifecycleState::Uninitialized,
            holder_token: String::new(),
            weight: 0.0,
            borrow_time: None,
            usage_count: 0,
        }
    }

    pub fn is_borrowed(&self) -> bool {
        self.lifecycle_state == LifecycleState::Borrowed
    }
}

// ============================================================================
// Events
// ============================================================================

/// Kind of loan event written to the event log
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventAction {
    Borrowed,
    Returned,
}

impl EventAction {
    pub fn as_str(self) -> &'static str {
        match self {
            EventAction::Borrowed => "Borrowed",
            EventAction::Returned => "Returned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Borrowed" => Some(EventAction::Borrowed),
            "Returned" => Some(EventAction::Returned),
            _ => None,
        }
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event about to be appended; the log assigns the id
#[derive(Clone, Debug, PartialEq)]
pub struct NewEvent {
    pub slot_id: i64,
    pub action: EventAction,
    pub holder_token: String,
    pub timestamp: String,
}

/// A persisted, immutable loan event
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: i64,
    pub slot_id: i64,
    pub action: EventAction,
    pub holder_token: String,
    pub timestamp: String,
}

// ============================================================================
// Timestamps
// ============================================================================

/// Format a timestamp the way the store persists it
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a persisted timestamp
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
}

/// Current local wall-clock time truncated to whole seconds
pub fn now_local() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Serialized form of the hardware authorization flag
pub fn holder_token_for(authorized: bool) -> &'static str {
    if authorized {
        TOKEN_AUTHORIZED
    } else {
        TOKEN_UNAUTHORIZED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_lifecycle_codes_roundtrip() {
        for state in [
            LifecycleState::Uninitialized,
            LifecycleState::Available,
            LifecycleState::Borrowed,
        ] {
            assert_eq!(LifecycleState::from_code(state.code()), Some(state));
        }
        assert_eq!(LifecycleState::from_code(7), None);
    }

    #[test]
    fn test_timestamp_format() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(8, 5, 1)
            .unwrap();
        let s = format_timestamp(at);
        assert_eq!(s, "2024-03-09 08:05:01");
        assert_eq!(parse_timestamp(&s).unwrap(), at);
        assert!(parse_timestamp("yesterday-ish").is_err());
    }

    #[test]
    fn test_holder_token() {
        assert_eq!(holder_token_for(true), "True");
        assert_eq!(holder_token_for(false), "False");
    }
}
