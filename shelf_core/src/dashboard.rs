//! Dashboard projection of the slot store.
//!
//! A pure read-side function: slot rows plus the current time in, one display
//! record per slot out. Overdue and maintenance alerts are evaluated
//! independently, so both can be raised for the same slot.

use crate::config::AlertConfig;
use crate::types::parse_timestamp;
use crate::{LifecycleState, Slot};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Status label shown for a slot
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub enum DisplayStatus {
    Waiting,
    Available,
    Borrowed,
    Overdue,
}

/// Indicator colour for a slot
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedColor {
    Grey,
    Green,
    Red,
}

/// Shown instead of a holder while a slot waits for its first report
pub const CONNECTING: &str = "Connecting";

/// Shown instead of a holder for an available slot
pub const NO_HOLDER: &str = "-";

/// One display-ready dashboard row
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SlotView {
    pub slot_id: i64,
    pub name: String,
    pub usage_count: i64,
    pub weight: f64,
    pub display_status: DisplayStatus,
    pub led_color: LedColor,
    pub authorized_status: String,
    pub alert_overdue: bool,
    pub alert_maintenance: bool,
}

/// Project every slot, preserving the input (slot-id) order
pub fn project(slots: &[Slot], now: NaiveDateTime, alerts: &AlertConfig) -> Vec<SlotView> {
    slots
        .iter()
        .map(|slot| project_slot(slot, now, alerts))
        .collect()
}

/// Project a single slot
pub fn project_slot(slot: &Slot, now: NaiveDateTime, alerts: &AlertConfig) -> SlotView {
    let mut view = SlotView {
        slot_id: slot.slot_id,
        name: slot.name.clone(),
        usage_count: slot.usage_count,
        weight: slot.weight,
        display_status: DisplayStatus::Available,
        led_color: LedColor::Green,
        authorized_status: NO_HOLDER.to_string(),
        alert_overdue: false,
        alert_maintenance: false,
    };

    match slot.lifecycle_state {
        LifecycleState::Uninitialized => {
            view.display_status = DisplayStatus::Waiting;
            view.led_color = LedColor::Grey;
            view.authorized_status = CONNECTING.to_string();
            view.weight = 0.0;
            return view;
        }
        LifecycleState::Available => {}
        LifecycleState::Borrowed => {
            view.display_status = DisplayStatus::Borrowed;
            view.led_color = LedColor::Red;
            view.authorized_status = slot.holder_token.clone();

            if is_overdue(slot, now, alerts.overdue_seconds) {
                view.display_status = DisplayStatus::Overdue;
                view.alert_overdue = true;
            }
        }
    }

    view.alert_maintenance = slot.usage_count >= i64::from(alerts.maintenance_threshold);
    view
}

/// Strictly longer than `overdue_seconds` since the borrow started
///
/// A missing or unparseable borrow time is never overdue.
fn is_overdue(slot: &Slot, now: NaiveDateTime, overdue_seconds: u64) -> bool {
    let Some(raw) = slot.borrow_time.as_deref() else {
        return false;
    };

    match parse_timestamp(raw) {
        Ok(borrowed_at) => {
            let elapsed = (now - borrowed_at).num_seconds();
            elapsed > i64::try_from(overdue_seconds).unwrap_or(i64::MAX)
        }
        Err(e) => {
            tracing::warn!(
                "Slot {} has malformed borrow time {:?}: {}",
                slot.slot_id,
                raw,
                e
            );
            false
        }
    }
}
