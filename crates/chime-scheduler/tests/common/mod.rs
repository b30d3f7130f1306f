// Recording collaborators shared by the lifecycle tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chime_core::{
    AlarmDefinition, AlarmError, AlarmId, AlarmStore, DefaultAlarmTimeCalculator, FixedClock,
    NotificationConfig, NotificationPresenter, NotificationTarget, Result, SchedulingBackend,
    SequentialIdGenerator, TargetLauncher, Zone,
};
use chime_scheduler::{AlarmClient, AlarmCoordinator, AlarmEnvironment};
use chime_store::SqliteAlarmStore;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

pub fn millis(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> i64 {
    utc(y, mo, d, h, mi).timestamp_millis()
}

#[derive(Default)]
pub struct RecordingBackend {
    pub armed: Mutex<BTreeMap<AlarmId, i64>>,
    pub cancelled: Mutex<Vec<AlarmId>>,
    pub denied: AtomicBool,
}

impl RecordingBackend {
    pub fn armed_at(&self, id: AlarmId) -> Option<i64> {
        self.armed.lock().unwrap().get(&id).copied()
    }

    pub fn deny(&self, denied: bool) {
        self.denied.store(denied, Ordering::SeqCst);
    }
}

impl SchedulingBackend for RecordingBackend {
    fn arm_exact(&self, id: AlarmId, trigger_at_millis: i64) -> Result<()> {
        if self.denied.load(Ordering::SeqCst) {
            return Err(AlarmError::PermissionDenied {
                reason: "test".to_string(),
            });
        }
        self.armed.lock().unwrap().insert(id, trigger_at_millis);
        Ok(())
    }

    fn cancel(&self, id: AlarmId) -> Result<()> {
        self.armed.lock().unwrap().remove(&id);
        self.cancelled.lock().unwrap().push(id);
        Ok(())
    }

    fn exists(&self, id: AlarmId) -> Result<bool> {
        Ok(self.armed.lock().unwrap().contains_key(&id))
    }

    fn armed(&self) -> Result<Vec<(AlarmId, i64)>> {
        Ok(self
            .armed
            .lock()
            .unwrap()
            .iter()
            .map(|(id, at)| (*id, *at))
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingPresenter {
    pub shown: Mutex<Vec<AlarmId>>,
    pub fail: AtomicBool,
}

impl NotificationPresenter for RecordingPresenter {
    fn show(&self, id: AlarmId, _config: &NotificationConfig) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AlarmError::Presentation("invalid channel".to_string()));
        }
        self.shown.lock().unwrap().push(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingLauncher {
    pub launched: Mutex<Vec<(AlarmId, NotificationTarget)>>,
}

impl TargetLauncher for RecordingLauncher {
    fn launch(&self, id: AlarmId, target: &NotificationTarget) -> Result<()> {
        self.launched.lock().unwrap().push((id, target.clone()));
        Ok(())
    }
}

/// Reads go through to the wrapped store; every write fails.
pub struct ReadOnlyStore(pub Arc<SqliteAlarmStore>);

#[async_trait]
impl AlarmStore for ReadOnlyStore {
    async fn insert(&self, _definition: &AlarmDefinition) -> Result<()> {
        Err(AlarmError::Store("attempt to write a readonly database".to_string()))
    }

    async fn update(&self, _definition: &AlarmDefinition) -> Result<bool> {
        Err(AlarmError::Store("attempt to write a readonly database".to_string()))
    }

    async fn delete(&self, _id: AlarmId) -> Result<()> {
        Err(AlarmError::Store("attempt to write a readonly database".to_string()))
    }

    async fn get(&self, id: AlarmId) -> Result<Option<AlarmDefinition>> {
        self.0.get(id).await
    }

    async fn get_all(&self) -> Result<Vec<AlarmDefinition>> {
        self.0.get_all().await
    }
}

pub struct Harness {
    pub client: AlarmClient,
    pub store: Arc<SqliteAlarmStore>,
    pub backend: Arc<RecordingBackend>,
    pub presenter: Arc<RecordingPresenter>,
    pub launcher: Arc<RecordingLauncher>,
    pub clock: Arc<FixedClock>,
}

/// Client wired to an in-memory store, UTC, and a clock frozen at `now`.
pub fn harness(now: DateTime<Utc>) -> Harness {
    let store = Arc::new(SqliteAlarmStore::open_in_memory().unwrap());
    let backend = Arc::new(RecordingBackend::default());
    let presenter = Arc::new(RecordingPresenter::default());
    let launcher = Arc::new(RecordingLauncher::default());
    let clock = Arc::new(FixedClock::new(now));
    let zone = Zone::Fixed(FixedOffset::east_opt(0).unwrap());

    let env = AlarmEnvironment {
        store: store.clone(),
        backend: backend.clone(),
        presenter: presenter.clone(),
        calculator: Arc::new(DefaultAlarmTimeCalculator::new(zone, clock.clone())),
        id_generator: Arc::new(SequentialIdGenerator::default()),
        launcher: launcher.clone(),
        clock: clock.clone(),
    };
    Harness {
        client: AlarmClient::new(env),
        store,
        backend,
        presenter,
        launcher,
        clock,
    }
}

impl Harness {
    /// Coordinator sharing this harness' backend, presenter and clock, but
    /// reading and writing through `store`.
    pub fn coordinator_over(&self, store: Arc<dyn AlarmStore>) -> AlarmCoordinator {
        let zone = Zone::Fixed(FixedOffset::east_opt(0).unwrap());
        AlarmCoordinator::new(
            store,
            self.backend.clone(),
            self.presenter.clone(),
            Arc::new(DefaultAlarmTimeCalculator::new(zone, self.clock.clone())),
            self.clock.clone(),
        )
    }
}
