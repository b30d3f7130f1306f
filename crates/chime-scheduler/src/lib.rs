//! `chime-scheduler`: alarm lifecycle on top of the `chime-core` contracts.
//!
//! # Overview
//!
//! [`AlarmCoordinator`] computes trigger times, arms the wake-up backend and
//! keeps the stored definitions in step as alarms fire. [`AlarmReceiver`] is
//! the boundary that feeds it wake-ups and system events, and [`AlarmClient`]
//! is the host-facing API.
//!
//! # Transitions
//!
//! | Event                 | One-shot alarm                  | Repeating alarm            |
//! |-----------------------|---------------------------------|----------------------------|
//! | `schedule`            | armed for today or tomorrow     | armed for next allowed day |
//! | wake-up (`on_fire`)   | `is_active = false`, disarmed   | armed for next occurrence  |
//! | boot                  | re-armed if trigger not passed  | same                       |
//! | time / zone change    | re-armed if active              | same                       |
//! | `cancel`              | disarmed, definition kept       | same                       |

pub mod backend;
pub mod client;
pub mod coordinator;
pub mod presenter;
pub mod receiver;
pub mod task;

pub use backend::{FireEvent, TokioAlarmBackend};
pub use client::{AlarmClient, AlarmEnvironment, AlarmRequest, AlarmUpdate, SyncReport};
pub use coordinator::{AlarmCoordinator, FireOutcome, Scheduled, SweepReport};
pub use presenter::{TracingLauncher, TracingPresenter};
pub use receiver::{AlarmReceiver, SystemEvent};
pub use task::BackgroundTask;
