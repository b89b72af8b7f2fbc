#![forbid(unsafe_code)]

//! Core domain model and business logic for the smart tool shelf.
//!
//! This crate provides:
//! - Domain types (slots, lifecycle states, loan events)
//! - Shelf layout and configuration
//! - Sensor report intake and the ingestion engine
//! - Persistence (SQLite slot store and event log)
//! - Dashboard projection, history and CSV export

pub mod types;
pub mod error;
pub mod layout;
pub mod config;
pub mod logging;
pub mod store;
pub mod report;
pub mod engine;
pub mod dashboard;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use layout::{build_default_layout, SlotBinding};
pub use config::{AlertConfig, Config};
pub use store::Store;
pub use report::{parse_report, PresenceSignal, SensorSnapshot, ShelfReport};
pub use engine::{CycleOutcome, IngestionEngine, Transition, TransitionKind};
pub use dashboard::{project, DisplayStatus, LedColor, SlotView};
pub use history::{export_to_path, load_history, write_export, HISTORY_LIMIT};
