//! Boundary handlers: wake-up delivery, system events and notification taps.
//!
//! Handlers log every failure and hand the result back for inspection; none
//! of them propagate an error past their own logging.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chime_core::{AlarmId, Result, TargetLauncher};
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use crate::backend::FireEvent;
use crate::coordinator::{AlarmCoordinator, FireOutcome, SweepReport};

/// Platform notifications that require re-arming alarms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    BootCompleted,
    LockedBootCompleted,
    TimeChanged,
    DateChanged,
    TimezoneChanged,
}

impl SystemEvent {
    pub const ALL: [SystemEvent; 5] = [
        SystemEvent::BootCompleted,
        SystemEvent::LockedBootCompleted,
        SystemEvent::TimeChanged,
        SystemEvent::DateChanged,
        SystemEvent::TimezoneChanged,
    ];

    pub fn is_boot(self) -> bool {
        matches!(
            self,
            SystemEvent::BootCompleted | SystemEvent::LockedBootCompleted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SystemEvent::BootCompleted => "boot_completed",
            SystemEvent::LockedBootCompleted => "locked_boot_completed",
            SystemEvent::TimeChanged => "time_changed",
            SystemEvent::DateChanged => "date_changed",
            SystemEvent::TimezoneChanged => "timezone_changed",
        }
    }
}

impl fmt::Display for SystemEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemEvent {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        SystemEvent::ALL
            .into_iter()
            .find(|e| e.as_str() == wanted)
            .ok_or_else(|| format!("unknown system event: {s}"))
    }
}

/// Receives wake-ups and system events and routes them to the coordinator.
#[derive(Clone)]
pub struct AlarmReceiver {
    coordinator: Arc<AlarmCoordinator>,
    launcher: Arc<dyn TargetLauncher>,
}

impl AlarmReceiver {
    pub fn new(coordinator: Arc<AlarmCoordinator>, launcher: Arc<dyn TargetLauncher>) -> Self {
        Self {
            coordinator,
            launcher,
        }
    }

    pub async fn on_alarm_received(&self, id: AlarmId) -> Result<FireOutcome> {
        let outcome = self.coordinator.on_fire(id).await;
        match &outcome {
            Ok(FireOutcome::Rearmed { next_trigger_millis }) => {
                info!(alarm_id = id, next_trigger_millis, "repeating alarm handled");
            }
            Ok(o) => info!(alarm_id = id, outcome = ?o, "alarm handled"),
            Err(e) => error!(alarm_id = id, op = "on_fire", code = e.code(), error = %e,
                "alarm handling failed"),
        }
        outcome
    }

    pub async fn on_system_event(&self, event: SystemEvent) -> Result<SweepReport> {
        info!(event = %event, "system event received");
        let report = if event.is_boot() {
            self.coordinator.boot_sweep().await
        } else {
            self.coordinator.time_change_sweep().await
        };
        if let Err(e) = &report {
            error!(event = %event, code = e.code(), error = %e, "sweep failed");
        }
        report
    }

    /// Open the content target of a tapped notification. Returns whether a
    /// target was launched.
    pub async fn on_content_tapped(&self, id: AlarmId) -> Result<bool> {
        let result = match self.coordinator.content_target(id).await {
            Ok(Some(target)) => self.launcher.launch(id, &target).map(|()| true),
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            error!(alarm_id = id, op = "content_tapped", code = e.code(), error = %e,
                "could not open content target");
        }
        result
    }

    /// Consume fire events until `shutdown` flips to `true` or the channel
    /// closes. Each event is handled on its own task.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<FireEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("alarm receiver started");
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("fire channel closed, alarm receiver stopping");
                        break;
                    };
                    let receiver = self.clone();
                    tokio::spawn(async move {
                        let _ = receiver.on_alarm_received(event.alarm_id).await;
                    });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("alarm receiver shutting down");
                        break;
                    }
                }
            }
        }
    }
}
