//! `chime-core`: data model, collaborator contracts and trigger-time math
//! shared by every chime crate.
//!
//! An [`AlarmDefinition`] with an empty [`WeekDaySet`] is a one-shot alarm;
//! any other set makes it repeat weekly on those days. The
//! [`schedule::compute_next_trigger`] function turns a definition's
//! time-of-day into the next epoch-millisecond instant.

pub mod clock;
pub mod config;
pub mod error;
pub mod notification;
pub mod schedule;
pub mod traits;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ChimeConfig;
pub use error::{AlarmError, Result};
pub use notification::{
    IntentRef, NotificationChannel, NotificationConfig, NotificationSpec, NotificationTarget,
    TargetKind,
};
pub use schedule::{AlarmTimeCalculator, DefaultAlarmTimeCalculator, Zone};
pub use traits::{
    AlarmIdGenerator, AlarmStore, NotificationPresenter, ObservableAlarmStore, SchedulingBackend,
    SequentialIdGenerator, TargetLauncher, TimestampIdGenerator,
};
pub use types::{AlarmDefinition, AlarmId, TimeOfDay, WeekDay, WeekDaySet};
