use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chime_core::SchedulingBackend;
use chime_scheduler::{AlarmClient, FireEvent, SystemEvent, TokioAlarmBackend};
use chrono::{Local, Offset, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Wall-clock drift beyond this between two ticks counts as a time change.
const CLOCK_JUMP_TOLERANCE_MS: i64 = 5_000;

/// Boot sweep, then serve wake-ups until Ctrl-C. Every `resync` the backend
/// is reconciled with the store so alarms edited from other processes are
/// picked up, and wall-clock jumps or zone changes trigger a time-change
/// sweep.
pub async fn run(
    client: AlarmClient,
    backend: Arc<TokioAlarmBackend>,
    fire_rx: mpsc::Receiver<FireEvent>,
    resync: Duration,
) -> Result<()> {
    if !backend.exact_alarms_allowed() {
        warn!("exact alarms are disabled, nothing will be armed");
    }

    let receiver = client.receiver();
    if let Ok(report) = receiver.on_system_event(SystemEvent::BootCompleted).await {
        info!(
            rearmed = report.rearmed.len(),
            skipped = report.skipped.len(),
            "daemon started"
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let receiver_task = tokio::spawn(receiver.clone().run(fire_rx, shutdown_rx));

    let mut ticker = tokio::time::interval(resync);
    ticker.tick().await;
    let mut clock_watch =
        ClockWatch::new(Instant::now(), Utc::now().timestamp_millis(), local_offset());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let observed = clock_watch.observe(
                    Instant::now(),
                    Utc::now().timestamp_millis(),
                    local_offset(),
                );
                if let Some(event) = observed {
                    let _ = receiver.on_system_event(event).await;
                }
                match client.sync().await {
                    Ok(report) => debug!(
                        rearmed = report.renewed.rearmed.len(),
                        realigned = report.realigned.len(),
                        dropped = report.dropped.len(),
                        armed = backend.armed().map(|a| a.len()).unwrap_or_default(),
                        "resync done"
                    ),
                    Err(e) => error!(code = e.code(), error = %e, "resync failed"),
                }
            }
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    error!("ctrl-c handler failed: {e}");
                }
                info!("shutdown requested");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = receiver_task.await {
        warn!("receiver task ended abnormally: {e}");
    }
    Ok(())
}

fn local_offset() -> i32 {
    Local::now().offset().fix().local_minus_utc()
}

/// Detects wall-clock jumps and local offset changes between samples.
struct ClockWatch {
    mono: Instant,
    wall_millis: i64,
    offset_secs: i32,
}

impl ClockWatch {
    fn new(mono: Instant, wall_millis: i64, offset_secs: i32) -> Self {
        Self {
            mono,
            wall_millis,
            offset_secs,
        }
    }

    fn observe(&mut self, mono: Instant, wall_millis: i64, offset_secs: i32) -> Option<SystemEvent> {
        let mono_elapsed = mono.saturating_duration_since(self.mono).as_millis() as i64;
        let wall_elapsed = wall_millis - self.wall_millis;
        let zone_changed = offset_secs != self.offset_secs;
        *self = Self::new(mono, wall_millis, offset_secs);

        if zone_changed {
            info!(offset_secs, "local UTC offset changed");
            Some(SystemEvent::TimezoneChanged)
        } else if (wall_elapsed - mono_elapsed).abs() > CLOCK_JUMP_TOLERANCE_MS {
            info!(drift_ms = wall_elapsed - mono_elapsed, "wall clock jumped");
            Some(SystemEvent::TimeChanged)
        } else {
            None
        }
    }
}
