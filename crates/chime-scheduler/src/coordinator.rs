//! Alarm lifecycle: schedule, fire, reschedule, renew and cancel.

use std::sync::Arc;

use chime_core::{
    AlarmDefinition, AlarmError, AlarmId, AlarmStore, AlarmTimeCalculator, Clock,
    NotificationPresenter, NotificationTarget, Result, SchedulingBackend, TimeOfDay, WeekDaySet,
};
use tracing::{debug, error, info, warn};

use crate::task::BackgroundTask;

/// Result of arming an alarm.
pub struct Scheduled {
    pub alarm_id: AlarmId,
    pub trigger_at_millis: i64,
    /// Write of `next_trigger_time` onto the stored definition. Resolves to
    /// `false` when the definition no longer exists.
    pub persisted: BackgroundTask<bool>,
}

/// What `on_fire` did with the alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// No definition with that id; nothing happened.
    Missing,
    /// One-shot alarm marked inactive and its registration cleared.
    Deactivated,
    /// Repeating alarm armed for its next occurrence.
    Rearmed { next_trigger_millis: i64 },
}

/// Per-alarm results of a boot or time-change sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub examined: usize,
    pub rearmed: Vec<AlarmId>,
    pub skipped: Vec<AlarmId>,
    pub failed: Vec<(AlarmId, AlarmError)>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives alarm state transitions against the store and the wake-up backend.
pub struct AlarmCoordinator {
    store: Arc<dyn AlarmStore>,
    backend: Arc<dyn SchedulingBackend>,
    presenter: Arc<dyn NotificationPresenter>,
    calculator: Arc<dyn AlarmTimeCalculator>,
    clock: Arc<dyn Clock>,
}

impl AlarmCoordinator {
    pub fn new(
        store: Arc<dyn AlarmStore>,
        backend: Arc<dyn SchedulingBackend>,
        presenter: Arc<dyn NotificationPresenter>,
        calculator: Arc<dyn AlarmTimeCalculator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            backend,
            presenter,
            calculator,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<dyn AlarmStore> {
        &self.store
    }

    pub fn backend(&self) -> &Arc<dyn SchedulingBackend> {
        &self.backend
    }

    pub fn calculator(&self) -> &Arc<dyn AlarmTimeCalculator> {
        &self.calculator
    }

    /// Compute the next trigger, arm the backend, then persist the trigger
    /// time in the background.
    ///
    /// Arming replaces any earlier registration for `id`. Backend errors
    /// (notably `PermissionDenied`) are returned to the caller.
    pub fn schedule(&self, id: AlarmId, time: TimeOfDay, weekdays: &WeekDaySet) -> Result<Scheduled> {
        let trigger_at_millis = self.calculator.next_trigger_millis(time, weekdays)?;
        self.backend.arm_exact(id, trigger_at_millis)?;
        info!(alarm_id = id, op = "schedule", trigger_at_millis, "alarm scheduled");

        let store = Arc::clone(&self.store);
        let persisted = BackgroundTask::spawn("persist_next_trigger", id, async move {
            match store.get(id).await? {
                Some(mut def) => {
                    def.next_trigger_time = Some(trigger_at_millis);
                    store.update(&def).await
                }
                None => {
                    debug!(alarm_id = id, "definition gone, next trigger not persisted");
                    Ok(false)
                }
            }
        });

        Ok(Scheduled {
            alarm_id: id,
            trigger_at_millis,
            persisted,
        })
    }

    /// Arm the next occurrence after a repeating alarm fired.
    pub fn reschedule_tomorrow(&self, def: &AlarmDefinition) -> Result<Scheduled> {
        self.schedule(def.id, def.time_of_day(), &def.weekdays)
    }

    /// Re-arm from stored parameters after boot or a clock change.
    pub fn renew(&self, def: &AlarmDefinition) -> Result<Scheduled> {
        self.schedule(def.id, def.time_of_day(), &def.weekdays)
    }

    /// Handle a delivered wake-up for `id`.
    ///
    /// A presentation failure is logged and does not stop the state
    /// transition.
    pub async fn on_fire(&self, id: AlarmId) -> Result<FireOutcome> {
        let Some(mut def) = self.store.get(id).await? else {
            warn!(alarm_id = id, op = "on_fire", code = "NOT_FOUND", "fired alarm not in store");
            return Ok(FireOutcome::Missing);
        };

        if def.should_notify() {
            if let Some(config) = &def.notification_config {
                if let Err(e) = self.presenter.show(id, config) {
                    error!(alarm_id = id, op = "on_fire", code = e.code(), error = %e,
                        "notification presentation failed");
                }
            }
        }

        if def.is_one_shot() {
            def.is_active = false;
            let deactivated = self.store.update(&def).await;
            // clear the registration even if the store write failed
            self.backend.cancel(id)?;
            if !deactivated? {
                warn!(alarm_id = id, op = "on_fire", "definition vanished before deactivation");
            }
            info!(alarm_id = id, op = "on_fire", "one-shot alarm deactivated");
            return Ok(FireOutcome::Deactivated);
        }

        let scheduled = self.reschedule_tomorrow(&def)?;
        let next_trigger_millis = scheduled.trigger_at_millis;
        scheduled.persisted.join_and_log().await;
        Ok(FireOutcome::Rearmed {
            next_trigger_millis,
        })
    }

    /// Remove the backend registration. The stored definition is untouched.
    pub fn cancel(&self, id: AlarmId) -> Result<()> {
        self.backend.cancel(id)?;
        debug!(alarm_id = id, op = "cancel", "registration removed");
        Ok(())
    }

    /// Replace the stored definition.
    ///
    /// This does not re-arm the backend: changed time or weekdays take effect
    /// only after a following `schedule`/`renew`. Returns `false` when no
    /// definition with that id exists.
    pub async fn update(&self, def: &AlarmDefinition) -> Result<bool> {
        let updated = self.store.update(def).await?;
        if updated {
            info!(alarm_id = def.id, op = "update", "definition updated");
        } else {
            warn!(alarm_id = def.id, op = "update", code = "NOT_FOUND", "nothing to update");
        }
        Ok(updated)
    }

    pub fn exists(&self, id: AlarmId) -> Result<bool> {
        self.backend.exists(id)
    }

    /// Whether the boot sweep would re-arm `def` at `now_millis`: active, and
    /// its cached trigger is unknown or not yet passed.
    pub fn eligible_after_boot(def: &AlarmDefinition, now_millis: i64) -> bool {
        def.is_active && def.next_trigger_time.map_or(true, |t| t >= now_millis)
    }

    /// Re-arm active alarms after a restart.
    pub async fn boot_sweep(&self) -> Result<SweepReport> {
        let now = self.clock.now_millis();
        let defs = self.store.get_all().await?;
        let mut report = SweepReport {
            examined: defs.len(),
            ..SweepReport::default()
        };
        for def in defs {
            if Self::eligible_after_boot(&def, now) {
                self.renew_into(&def, &mut report).await;
            } else {
                report.skipped.push(def.id);
            }
        }
        info!(
            op = "boot_sweep",
            rearmed = report.rearmed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "boot sweep finished"
        );
        Ok(report)
    }

    /// Re-arm every active alarm after the wall clock or zone moved.
    pub async fn time_change_sweep(&self) -> Result<SweepReport> {
        let defs = self.store.get_all().await?;
        let mut report = SweepReport {
            examined: defs.len(),
            ..SweepReport::default()
        };
        for def in defs {
            if def.is_active {
                self.renew_into(&def, &mut report).await;
            } else {
                report.skipped.push(def.id);
            }
        }
        info!(
            op = "time_change_sweep",
            rearmed = report.rearmed.len(),
            failed = report.failed.len(),
            "time change sweep finished"
        );
        Ok(report)
    }

    /// The activation target for a tapped notification, if the alarm has one.
    pub async fn content_target(&self, id: AlarmId) -> Result<Option<NotificationTarget>> {
        let Some(def) = self.store.get(id).await? else {
            warn!(alarm_id = id, op = "content_target", code = "NOT_FOUND", "alarm not in store");
            return Ok(None);
        };
        Ok(def.notification_config.and_then(|c| c.content_target))
    }

    pub(crate) async fn renew_into(&self, def: &AlarmDefinition, report: &mut SweepReport) {
        match self.renew(def) {
            Ok(scheduled) => {
                scheduled.persisted.join_and_log().await;
                report.rearmed.push(def.id);
            }
            Err(e) => {
                error!(alarm_id = def.id, op = "renew", code = e.code(), error = %e, "re-arm failed");
                report.failed.push((def.id, e));
            }
        }
    }
}
