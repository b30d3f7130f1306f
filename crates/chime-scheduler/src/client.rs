//! High-level alarm API over an explicitly wired [`AlarmEnvironment`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chime_core::{
    AlarmDefinition, AlarmError, AlarmId, AlarmIdGenerator, AlarmStore, AlarmTimeCalculator,
    ChimeConfig, Clock, DefaultAlarmTimeCalculator, NotificationConfig, NotificationPresenter,
    Result, SchedulingBackend, SystemClock, TargetLauncher, TimeOfDay, TimestampIdGenerator,
    WeekDay, WeekDaySet,
};
use futures_util::stream::BoxStream;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::backend::{FireEvent, TokioAlarmBackend};
use crate::coordinator::{AlarmCoordinator, SweepReport};
use crate::presenter::{TracingLauncher, TracingPresenter};
use crate::receiver::AlarmReceiver;

/// Every collaborator the alarm machinery needs, wired once by the host.
#[derive(Clone)]
pub struct AlarmEnvironment {
    pub store: Arc<dyn AlarmStore>,
    pub backend: Arc<dyn SchedulingBackend>,
    pub presenter: Arc<dyn NotificationPresenter>,
    pub calculator: Arc<dyn AlarmTimeCalculator>,
    pub id_generator: Arc<dyn AlarmIdGenerator>,
    pub launcher: Arc<dyn TargetLauncher>,
    pub clock: Arc<dyn Clock>,
}

impl AlarmEnvironment {
    /// Wire `store` to an in-process tokio backend using `config`.
    ///
    /// Returns the environment, the concrete backend and the fire channel
    /// the backend reports on.
    pub fn in_process(
        config: &ChimeConfig,
        store: Arc<dyn AlarmStore>,
    ) -> Result<(Self, Arc<TokioAlarmBackend>, mpsc::Receiver<FireEvent>)> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let zone = config.clock.zone()?;
        let (backend, fire_rx) =
            TokioAlarmBackend::channel(config.scheduler.fire_channel_capacity, Arc::clone(&clock));
        let backend =
            Arc::new(backend.with_exact_alarms_allowed(config.scheduler.exact_alarms_allowed));

        let env = Self {
            store,
            backend: backend.clone(),
            presenter: Arc::new(TracingPresenter),
            calculator: Arc::new(DefaultAlarmTimeCalculator::new(zone, Arc::clone(&clock))),
            id_generator: Arc::new(TimestampIdGenerator),
            launcher: Arc::new(TracingLauncher),
            clock,
        };
        Ok((env, backend, fire_rx))
    }

    pub fn coordinator(&self) -> AlarmCoordinator {
        AlarmCoordinator::new(
            Arc::clone(&self.store),
            Arc::clone(&self.backend),
            Arc::clone(&self.presenter),
            Arc::clone(&self.calculator),
            Arc::clone(&self.clock),
        )
    }
}

/// Parameters for a new alarm.
#[derive(Debug, Clone)]
pub struct AlarmRequest {
    pub id: Option<AlarmId>,
    pub time: TimeOfDay,
    pub weekdays: WeekDaySet,
    pub metadata: BTreeMap<String, String>,
    pub notification: Option<NotificationConfig>,
}

impl AlarmRequest {
    pub fn new(hour: u8, minute: u8) -> Self {
        Self {
            id: None,
            time: TimeOfDay::hm(hour, minute),
            weekdays: WeekDaySet::one_shot(),
            metadata: BTreeMap::new(),
            notification: None,
        }
    }

    /// Use a caller-chosen id instead of a generated one.
    pub fn id(mut self, id: AlarmId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn second(mut self, second: u8) -> Self {
        self.time.second = second;
        self
    }

    pub fn millis(mut self, millis: u16) -> Self {
        self.time.millis = millis;
        self
    }

    pub fn weekdays(mut self, weekdays: WeekDaySet) -> Self {
        self.weekdays = weekdays;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn notification(mut self, config: NotificationConfig) -> Self {
        self.notification = Some(config);
        self
    }
}

/// Partial change to a stored alarm; `None` fields are left as they are.
#[derive(Debug, Clone, Default)]
pub struct AlarmUpdate {
    pub id: AlarmId,
    pub time: Option<TimeOfDay>,
    pub weekdays: Option<WeekDaySet>,
    pub is_active: Option<bool>,
    pub notification: Option<NotificationConfig>,
    pub metadata: Option<BTreeMap<String, String>>,
}

impl AlarmUpdate {
    pub fn new(id: AlarmId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn time(mut self, time: TimeOfDay) -> Self {
        self.time = Some(time);
        self
    }

    pub fn weekdays(mut self, weekdays: WeekDaySet) -> Self {
        self.weekdays = Some(weekdays);
        self
    }

    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn notification(mut self, config: NotificationConfig) -> Self {
        self.notification = Some(config);
        self
    }

    /// Replace the whole metadata map.
    pub fn metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    fn apply(self, def: &mut AlarmDefinition) {
        if let Some(time) = self.time {
            def.set_time_of_day(time);
        }
        if let Some(weekdays) = self.weekdays {
            def.weekdays = weekdays;
        }
        if let Some(is_active) = self.is_active {
            def.is_active = is_active;
        }
        if let Some(config) = self.notification {
            def.notification_config = Some(config);
        }
        if let Some(metadata) = self.metadata {
            def.metadata = metadata;
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActiveAlarmList {
    alarm_items: Vec<AlarmItem>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AlarmItem {
    request_id: AlarmId,
    hour: u8,
    minute: u8,
    week_days: Vec<WeekDay>,
    is_active: bool,
    /// Metadata map encoded as a JSON string.
    info_pairs: String,
}

/// Outcome of [`AlarmClient::sync`].
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Missing alarms re-armed, plus realigned ones.
    pub renewed: SweepReport,
    pub realigned: Vec<AlarmId>,
    pub dropped: Vec<AlarmId>,
}

/// Entry point for hosts: set, update, cancel and list alarms.
pub struct AlarmClient {
    env: AlarmEnvironment,
    coordinator: Arc<AlarmCoordinator>,
}

impl AlarmClient {
    pub fn new(env: AlarmEnvironment) -> Self {
        let coordinator = Arc::new(env.coordinator());
        Self { env, coordinator }
    }

    pub fn coordinator(&self) -> &Arc<AlarmCoordinator> {
        &self.coordinator
    }

    /// Receiver sharing this client's coordinator.
    pub fn receiver(&self) -> AlarmReceiver {
        AlarmReceiver::new(Arc::clone(&self.coordinator), Arc::clone(&self.env.launcher))
    }

    /// Store a new active alarm and arm it.
    ///
    /// A `PermissionDenied` from the backend is returned; the definition stays
    /// stored so a later renew can arm it.
    pub async fn set(&self, request: AlarmRequest) -> Result<AlarmId> {
        let time = request.time.validate()?;
        let id = request
            .id
            .unwrap_or_else(|| self.env.id_generator.generate_id());

        let mut def = AlarmDefinition::new(id, time, request.weekdays);
        def.metadata = request.metadata;
        def.notification_config = request.notification;
        self.env.store.insert(&def).await?;

        let scheduled = self.coordinator.schedule(id, time, &def.weekdays)?;
        scheduled.persisted.join_and_log().await;
        info!(alarm_id = id, op = "set", "alarm set");
        Ok(id)
    }

    /// Apply `change` to the stored alarm. Does not re-arm; call
    /// [`AlarmClient::renew`] afterwards when time or weekdays changed.
    pub async fn update(&self, change: AlarmUpdate) -> Result<AlarmDefinition> {
        let id = change.id;
        let mut def = self
            .env
            .store
            .get(id)
            .await?
            .ok_or(AlarmError::NotFound { id })?;
        change.apply(&mut def);
        if !self.coordinator.update(&def).await? {
            return Err(AlarmError::NotFound { id });
        }
        Ok(def)
    }

    /// Re-arm one stored alarm from its current parameters.
    pub async fn renew(&self, id: AlarmId) -> Result<i64> {
        let def = self
            .env
            .store
            .get(id)
            .await?
            .ok_or(AlarmError::NotFound { id })?;
        let scheduled = self.coordinator.renew(&def)?;
        let at = scheduled.trigger_at_millis;
        scheduled.persisted.join_and_log().await;
        Ok(at)
    }

    /// Stop the alarm from firing but keep its definition, marked inactive.
    pub async fn disarm(&self, id: AlarmId) -> Result<()> {
        self.coordinator.cancel(id)?;
        let mut def = self
            .env
            .store
            .get(id)
            .await?
            .ok_or(AlarmError::NotFound { id })?;
        def.is_active = false;
        self.coordinator.update(&def).await?;
        Ok(())
    }

    /// Remove the alarm entirely: registration and definition.
    pub async fn cancel(&self, id: AlarmId) -> Result<()> {
        self.coordinator.cancel(id)?;
        self.env.store.delete(id).await?;
        info!(alarm_id = id, op = "cancel", "alarm removed");
        Ok(())
    }

    /// Re-arm active alarms the backend has no registration for.
    ///
    /// Uses the boot-sweep rule: an alarm whose cached trigger already passed
    /// without firing is left alone.
    pub async fn renew_missing(&self) -> Result<SweepReport> {
        let now = self.env.clock.now_millis();
        let defs = self.env.store.get_all().await?;
        let mut report = SweepReport {
            examined: defs.len(),
            ..SweepReport::default()
        };
        for def in defs {
            if !AlarmCoordinator::eligible_after_boot(&def, now) {
                report.skipped.push(def.id);
                continue;
            }
            match self.env.backend.exists(def.id) {
                Ok(true) => report.skipped.push(def.id),
                Ok(false) => self.coordinator.renew_into(&def, &mut report).await,
                Err(e) => report.failed.push((def.id, e)),
            }
        }
        if !report.rearmed.is_empty() {
            info!(op = "renew_missing", rearmed = ?report.rearmed, "missing alarms re-armed");
        }
        Ok(report)
    }

    /// Bring the backend in line with the store.
    ///
    /// Re-arms missing active alarms, re-arms registrations whose trigger
    /// differs from the stored `next_trigger_time` (another process renewed
    /// the alarm), and drops registrations whose definition is gone or
    /// inactive.
    pub async fn sync(&self) -> Result<SyncReport> {
        let renewed = self.renew_missing().await?;
        let mut report = SyncReport {
            renewed,
            ..SyncReport::default()
        };

        for (id, armed_at) in self.env.backend.armed()? {
            match self.env.store.get(id).await? {
                Some(def) if def.is_active => {
                    if def.next_trigger_time.is_some_and(|t| t != armed_at) {
                        self.coordinator.renew_into(&def, &mut report.renewed).await;
                        report.realigned.push(id);
                    }
                }
                _ => {
                    self.coordinator.cancel(id)?;
                    report.dropped.push(id);
                }
            }
        }
        if !report.dropped.is_empty() {
            warn!(op = "sync", dropped = ?report.dropped, "stale registrations dropped");
        }
        if !report.realigned.is_empty() {
            info!(op = "sync", realigned = ?report.realigned, "registrations realigned with store");
        }
        Ok(report)
    }

    pub async fn get(&self, id: AlarmId) -> Result<Option<AlarmDefinition>> {
        self.env.store.get(id).await
    }

    pub async fn list(&self) -> Result<Vec<AlarmDefinition>> {
        self.env.store.get_all().await
    }

    /// All alarms as `{"alarmItems":[{"requestId":..,"hour":..,...}]}`.
    pub async fn list_json(&self) -> Result<String> {
        let defs = self.list().await?;
        let alarm_items = defs
            .into_iter()
            .map(|def| {
                Ok(AlarmItem {
                    request_id: def.id,
                    hour: def.hour,
                    minute: def.minute,
                    week_days: def.weekdays.iter().collect(),
                    is_active: def.is_active,
                    info_pairs: serde_json::to_string(&def.metadata)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(serde_json::to_string(&ActiveAlarmList { alarm_items })?)
    }

    /// Live snapshots of all alarms, when the store supports it.
    pub fn watch(&self) -> Option<BoxStream<'static, Vec<AlarmDefinition>>> {
        self.env.store.as_observable().map(|s| s.watch())
    }

    /// Trigger the calculator would pick right now, without storing anything.
    pub fn next_trigger(&self, time: TimeOfDay, weekdays: &WeekDaySet) -> Result<i64> {
        self.env.calculator.next_trigger_millis(time, weekdays)
    }
}
