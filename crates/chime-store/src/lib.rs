//! `chime-store`: SQLite persistence for alarm definitions.
//!
//! Definitions live in a single `alarm_definition` table. Weekdays, metadata
//! and notification settings are stored as JSON text columns and decoded
//! leniently: a corrupt blob reads back as empty instead of failing the row.

pub mod db;
pub mod error;
mod row;
pub mod store;

pub use error::{Result, StoreError};
pub use store::SqliteAlarmStore;
