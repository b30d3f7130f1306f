//! Contracts for the collaborators the coordinator drives.

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::Result;
use crate::notification::{NotificationConfig, NotificationTarget};
use crate::types::{AlarmDefinition, AlarmId};

/// Durable storage of alarm definitions, keyed by id.
///
/// Implementations serialize conflicting writes per id; the last write wins.
#[async_trait]
pub trait AlarmStore: Send + Sync {
    /// Insert or replace the definition with the same id.
    async fn insert(&self, definition: &AlarmDefinition) -> Result<()>;

    /// Replace an existing definition. Returns `false` when no row matched.
    async fn update(&self, definition: &AlarmDefinition) -> Result<bool>;

    /// Remove a definition. Removing an unknown id is a no-op.
    async fn delete(&self, id: AlarmId) -> Result<()>;

    async fn get(&self, id: AlarmId) -> Result<Option<AlarmDefinition>>;

    async fn get_all(&self) -> Result<Vec<AlarmDefinition>>;

    /// Live view of the store, when the implementation supports one.
    fn as_observable(&self) -> Option<&dyn ObservableAlarmStore> {
        None
    }
}

/// Store variant that publishes a fresh snapshot after every change.
pub trait ObservableAlarmStore: AlarmStore {
    /// Yields the current snapshot immediately, then one per mutation.
    fn watch(&self) -> BoxStream<'static, Vec<AlarmDefinition>>;
}

/// The OS-level exact wake-up facility.
///
/// A wake-up armed for `id` must eventually be reported back with that id to
/// whoever consumes the backend's fire events.
pub trait SchedulingBackend: Send + Sync {
    /// Arm (or re-arm, replacing any previous registration) a wake-up for `id`.
    ///
    /// Fails with `PermissionDenied` when exact wake-ups are not allowed.
    fn arm_exact(&self, id: AlarmId, trigger_at_millis: i64) -> Result<()>;

    /// Drop any pending registration for `id`. Unknown ids are ignored.
    fn cancel(&self, id: AlarmId) -> Result<()>;

    fn exists(&self, id: AlarmId) -> Result<bool>;

    /// Pending registrations as `(id, trigger_at_millis)`, ordered by id.
    /// Backends that cannot enumerate their registrations return nothing.
    fn armed(&self) -> Result<Vec<(AlarmId, i64)>> {
        Ok(Vec::new())
    }
}

/// Shows the notification attached to a firing alarm. Best-effort.
pub trait NotificationPresenter: Send + Sync {
    fn show(&self, id: AlarmId, config: &NotificationConfig) -> Result<()>;
}

/// Opens an activation target, e.g. after the user taps a notification.
pub trait TargetLauncher: Send + Sync {
    fn launch(&self, id: AlarmId, target: &NotificationTarget) -> Result<()>;
}

pub trait AlarmIdGenerator: Send + Sync {
    fn generate_id(&self) -> AlarmId;
}

/// Derives ids from the wall clock: the low 31 bits of epoch millis.
#[derive(Debug, Default)]
pub struct TimestampIdGenerator;

impl AlarmIdGenerator for TimestampIdGenerator {
    fn generate_id(&self) -> AlarmId {
        let millis = chrono::Utc::now().timestamp_millis();
        match (millis & i32::MAX as i64) as AlarmId {
            0 => 1,
            id => id,
        }
    }
}

/// Hands out 1, 2, 3, …; handy for tests and demos.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    next: AtomicI32,
}

impl SequentialIdGenerator {
    pub fn starting_at(first: AlarmId) -> Self {
        Self {
            next: AtomicI32::new(first),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl AlarmIdGenerator for SequentialIdGenerator {
    fn generate_id(&self) -> AlarmId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
