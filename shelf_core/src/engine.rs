//! Ingestion engine: turns sensor snapshots into slot lifecycle transitions.
//!
//! Transition rules, keyed on the stored lifecycle state:
//! - `Uninitialized → Available | Borrowed`: first contact, no event
//! - `Available → Borrowed`: usage +1, borrow time set, `Borrowed` event
//! - `Borrowed → Available`: holder and borrow time cleared, `Returned` event
//! - unchanged state: only the weight is refreshed
//!
//! Transitions are edge-triggered on the stored state, so retransmitted
//! snapshots never double-count a borrow. A whole cycle commits or rolls back
//! as one transaction.

use crate::layout::SlotBinding;
use crate::report::{parse_report, PresenceSignal, SensorSnapshot, ShelfReport};
use crate::store::{Cycle, Store};
use crate::types::{format_timestamp, holder_token_for, now_local};
use crate::{EventAction, LifecycleState, NewEvent, Result, Slot};
use chrono::NaiveDateTime;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// What happened to one slot during a cycle
#[derive(Clone, Debug, PartialEq)]
pub enum TransitionKind {
    /// First report since cold restart; no event is logged
    Initialized(LifecycleState),
    /// Tool lifted off the shelf
    Borrowed { holder_token: String, event_id: i64 },
    /// Tool put back
    Returned { event_id: i64 },
}

/// A lifecycle change applied to a slot
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub slot_id: i64,
    pub kind: TransitionKind,
    pub presence: PresenceSignal,
    pub weight: f64,
}

impl Transition {
    /// Borrow and return transitions are loan events; initialization is not
    pub fn is_loan_event(&self) -> bool {
        !matches!(self.kind, TransitionKind::Initialized(_))
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TransitionKind::Initialized(state) => write!(
                f,
                "Slot {} [CONNECTED] | Status: {} | Weight: {}",
                self.slot_id, state, self.weight
            ),
            TransitionKind::Borrowed { holder_token, .. } => write!(
                f,
                "Slot {} [TAKEN] | Auth: {} | Presence: {}",
                self.slot_id,
                holder_token,
                self.presence.as_str()
            ),
            TransitionKind::Returned { .. } => write!(
                f,
                "Slot {} [RETURNED] | Weight: {} | Presence: {}",
                self.slot_id,
                self.weight,
                self.presence.as_str()
            ),
        }
    }
}

/// Result of one committed ingestion cycle
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleOutcome {
    /// Every transition applied, in slot-id order
    pub transitions: Vec<Transition>,
    /// Number of slots whose snapshot was applied (including no-op ones)
    pub slots_seen: usize,
    /// True only for the first report this engine has accepted
    pub first_report: bool,
}

impl CycleOutcome {
    /// Human-readable descriptions of the loan events in this cycle
    pub fn processed(&self) -> Vec<String> {
        self.transitions
            .iter()
            .filter(|t| t.is_loan_event())
            .map(|t| t.to_string())
            .collect()
    }
}

/// Applies shelf reports to the store
pub struct IngestionEngine {
    store: Store,
    bindings: Vec<SlotBinding>,
    first_report_seen: AtomicBool,
}

impl IngestionEngine {
    pub fn new(store: Store, bindings: Vec<SlotBinding>) -> Self {
        Self {
            store,
            bindings,
            first_report_seen: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn bindings(&self) -> &[SlotBinding] {
        &self.bindings
    }

    /// Parse and apply a raw report body using the current local time
    pub fn ingest(&self, raw: &str) -> Result<CycleOutcome> {
        self.ingest_at(raw, now_local())
    }

    /// Parse and apply a raw report body at a given time
    pub fn ingest_at(&self, raw: &str, now: NaiveDateTime) -> Result<CycleOutcome> {
        let report = parse_report(raw, &self.bindings)?;
        self.apply(&report, now)
    }

    /// Apply an already-parsed report as one atomic cycle
    pub fn apply(&self, report: &ShelfReport, now: NaiveDateTime) -> Result<CycleOutcome> {
        let first_report = !self.first_report_seen.swap(true, Ordering::SeqCst);
        if first_report {
            tracing::info!("First hardware report received, shelf controller connected");
        }

        let timestamp = format_timestamp(now);
        let transitions = self.store.with_cycle(|cycle| {
            let mut transitions = Vec::new();
            for (slot_id, snapshot) in report.iter() {
                if let Some(t) = apply_snapshot(cycle, slot_id, snapshot, &timestamp)? {
                    transitions.push(t);
                }
            }
            Ok(transitions)
        })?;

        for t in &transitions {
            tracing::info!("{}", t);
        }

        Ok(CycleOutcome {
            transitions,
            slots_seen: report.len(),
            first_report,
        })
    }
}

/// Derive the lifecycle state a snapshot implies
pub fn derive_state(snapshot: &SensorSnapshot) -> LifecycleState {
    match snapshot.presence {
        PresenceSignal::Empty => LifecycleState::Borrowed,
        PresenceSignal::Occupied => LifecycleState::Available,
    }
}

fn apply_snapshot(
    cycle: &Cycle<'_>,
    slot_id: i64,
    snapshot: &SensorSnapshot,
    timestamp: &str,
) -> Result<Option<Transition>> {
    let mut slot = cycle.load_slot(slot_id)?;
    let kind = step(&mut slot, snapshot, timestamp);

    let kind = match kind {
        Step::Unchanged => None,
        Step::Initialized(state) => Some(TransitionKind::Initialized(state)),
        Step::Borrowed => {
            let event_id = cycle.append_event(&NewEvent {
                slot_id,
                action: EventAction::Borrowed,
                holder_token: slot.holder_token.clone(),
                timestamp: timestamp.to_string(),
            })?;
            Some(TransitionKind::Borrowed {
                holder_token: slot.holder_token.clone(),
                event_id,
            })
        }
        Step::Returned => {
            let event_id = cycle.append_event(&NewEvent {
                slot_id,
                action: EventAction::Returned,
                holder_token: String::new(),
                timestamp: timestamp.to_string(),
            })?;
            Some(TransitionKind::Returned { event_id })
        }
    };

    cycle.save_slot(&slot)?;

    Ok(kind.map(|kind| Transition {
        slot_id,
        kind,
        presence: snapshot.presence,
        weight: snapshot.weight,
    }))
}

#[derive(Debug, PartialEq)]
enum Step {
    Unchanged,
    Initialized(LifecycleState),
    Borrowed,
    Returned,
}

/// Apply the state machine to an in-memory slot row
fn step(slot: &mut Slot, snapshot: &SensorSnapshot, timestamp: &str) -> Step {
    slot.weight = snapshot.weight;
    let derived = derive_state(snapshot);
    let token = holder_token_for(snapshot.authorized);

    match (slot.lifecycle_state, derived) {
        (LifecycleState::Uninitialized, state) => {
            slot.lifecycle_state = state;
            slot.holder_token = token.to_string();
            slot.borrow_time = match state {
                LifecycleState::Borrowed => Some(timestamp.to_string()),
                _ => None,
            };
            Step::Initialized(state)
        }
        (LifecycleState::Available, LifecycleState::Borrowed) => {
            slot.lifecycle_state = LifecycleState::Borrowed;
            slot.usage_count += 1;
            slot.holder_token = token.to_string();
            slot.borrow_time = Some(timestamp.to_string());
            Step::Borrowed
        }
        (LifecycleState::Borrowed, LifecycleState::Available) => {
            slot.lifecycle_state = LifecycleState::Available;
            slot.holder_token.clear();
            slot.borrow_time = None;
            Step::Returned
        }
        _ => Step::Unchanged,
    }
}
