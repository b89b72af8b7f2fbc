//! Sensor report intake.
//!
//! The shelf controller posts one JSON object per polling tick, keyed by slot
//! key (`system1`, `system2`, ...). Each value is a partial snapshot; firmware
//! may omit any field, so every field has a documented default:
//!
//! | field            | default    |
//! |------------------|------------|
//! | `presenceSignal` | `occupied` |
//! | `authorized`     | `false`    |
//! | `weight`         | `0.0`      |
//!
//! Older firmware sends `led_status` (`red` = tool lifted) instead of
//! `presenceSignal`. Both spellings are accepted; when a slot carries both,
//! `presenceSignal` wins.

use crate::layout::SlotBinding;
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Discrete presence indicator reported for a slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenceSignal {
    /// Tool is resting in the slot
    Occupied,
    /// Tool has been lifted off the shelf
    Empty,
}

impl PresenceSignal {
    /// Interpret a wire value; anything that is not a loan signal reads as occupied
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "empty" | "red" => PresenceSignal::Empty,
            "occupied" | "green" => PresenceSignal::Occupied,
            other => {
                tracing::debug!("Unrecognised presence signal '{}', treating as occupied", other);
                PresenceSignal::Occupied
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PresenceSignal::Occupied => "occupied",
            PresenceSignal::Empty => "empty",
        }
    }
}

/// Per-slot report as sent by firmware (every field optional)
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SensorReport {
    #[serde(default, rename = "presenceSignal")]
    pub presence_signal: Option<String>,

    #[serde(default)]
    pub led_status: Option<String>,

    #[serde(default)]
    pub authorized: Option<bool>,

    #[serde(default)]
    pub weight: Option<f64>,
}

/// A fully-defaulted snapshot, ready for the ingestion engine
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorSnapshot {
    pub presence: PresenceSignal,
    pub authorized: bool,
    pub weight: f64,
}

impl SensorSnapshot {
    pub fn new(presence: PresenceSignal, authorized: bool, weight: f64) -> Self {
        Self {
            presence,
            authorized,
            weight,
        }
    }
}

impl From<SensorReport> for SensorSnapshot {
    fn from(report: SensorReport) -> Self {
        let presence = report
            .presence_signal
            .as_deref()
            .or(report.led_status.as_deref())
            .map(PresenceSignal::from_wire)
            .unwrap_or(PresenceSignal::Occupied);

        let weight = match report.weight {
            Some(w) if w.is_finite() && w >= 0.0 => w,
            Some(w) => {
                tracing::warn!("Discarding out-of-range weight {}, using 0.0", w);
                0.0
            }
            None => 0.0,
        };

        SensorSnapshot {
            presence,
            authorized: report.authorized.unwrap_or(false),
            weight,
        }
    }
}

/// One polling tick's worth of snapshots, keyed by slot id (ascending)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShelfReport {
    snapshots: BTreeMap<i64, SensorSnapshot>,
}

impl ShelfReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the snapshot for a slot
    pub fn with(mut self, slot_id: i64, snapshot: SensorSnapshot) -> Self {
        self.snapshots.insert(slot_id, snapshot);
        self
    }

    /// Snapshots in slot-id order
    pub fn iter(&self) -> impl Iterator<Item = (i64, &SensorSnapshot)> {
        self.snapshots.iter().map(|(id, snap)| (*id, snap))
    }

    pub fn get(&self, slot_id: i64) -> Option<&SensorSnapshot> {
        self.snapshots.get(&slot_id)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Parse a raw report body against the configured layout
///
/// Rejected with [`Error::InvalidInput`] before anything is mutated when the
/// body is not JSON, not an object, empty, or when a monitored slot carries a
/// value of the wrong shape. Unknown keys are ignored; a monitored key that is
/// missing, `null` or `{}` leaves that slot untouched.
pub fn parse_report(raw: &str, bindings: &[SlotBinding]) -> Result<ShelfReport> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| Error::InvalidInput(format!("Unparseable payload: {}", e)))?;

    let map = match value {
        Value::Object(map) => map,
        Value::Null => return Err(Error::InvalidInput("Empty payload".into())),
        other => {
            return Err(Error::InvalidInput(format!(
                "Payload must be a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    if map.is_empty() {
        return Err(Error::InvalidInput("Empty payload".into()));
    }

    let mut report = ShelfReport::new();
    for binding in bindings {
        let snapshot = match map.get(&binding.key) {
            None | Some(Value::Null) => continue,
            Some(Value::Object(fields)) if fields.is_empty() => continue,
            Some(v @ Value::Object(_)) => SensorReport::deserialize(v).map_err(|e| {
                Error::InvalidInput(format!("Slot '{}': {}", binding.key, e))
            })?,
            Some(other) => {
                return Err(Error::InvalidInput(format!(
                    "Slot '{}' must be an object, got {}",
                    binding.key,
                    json_kind(other)
                )))
            }
        };
        report.snapshots.insert(binding.slot_id, snapshot.into());
    }

    let ignored = map
        .keys()
        .filter(|k| !bindings.iter().any(|b| &b.key == *k))
        .count();
    if ignored > 0 {
        tracing::debug!("Ignored {} unknown key(s) in report", ignored);
    }

    Ok(report)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
