//! In-process exact wake-up backend built on tokio timers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chime_core::{AlarmError, AlarmId, Clock, Result, SchedulingBackend};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Delivered on the fire channel when an armed wake-up elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireEvent {
    pub alarm_id: AlarmId,
    /// The instant the wake-up was armed for, epoch millis.
    pub scheduled_for_millis: i64,
}

struct Pending {
    generation: u64,
    trigger_at_millis: i64,
    handle: JoinHandle<()>,
}

/// One sleeping tokio task per armed id.
///
/// Re-arming an id aborts the previous task. A task that wakes up removes its
/// own registration before reporting, so `exists` turns false once an alarm
/// has fired.
pub struct TokioAlarmBackend {
    pending: Arc<DashMap<AlarmId, Pending>>,
    fire_tx: mpsc::Sender<FireEvent>,
    clock: Arc<dyn Clock>,
    exact_allowed: AtomicBool,
    generation: AtomicU64,
}

impl TokioAlarmBackend {
    pub fn new(fire_tx: mpsc::Sender<FireEvent>, clock: Arc<dyn Clock>) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            fire_tx,
            clock,
            exact_allowed: AtomicBool::new(true),
            generation: AtomicU64::new(0),
        }
    }

    /// Build a backend together with the receiving end of its fire channel.
    pub fn channel(capacity: usize, clock: Arc<dyn Clock>) -> (Self, mpsc::Receiver<FireEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx, clock), rx)
    }

    pub fn with_exact_alarms_allowed(self, allowed: bool) -> Self {
        self.set_exact_alarms_allowed(allowed);
        self
    }

    /// Grant or revoke the right to arm wake-ups. Already armed ones stay.
    pub fn set_exact_alarms_allowed(&self, allowed: bool) {
        self.exact_allowed.store(allowed, Ordering::SeqCst);
    }

    pub fn exact_alarms_allowed(&self) -> bool {
        self.exact_allowed.load(Ordering::SeqCst)
    }

    /// Trigger instant of the pending registration for `id`, if any.
    pub fn trigger_at(&self, id: AlarmId) -> Option<i64> {
        self.pending
            .get(&id)
            .filter(|p| !p.handle.is_finished())
            .map(|p| p.trigger_at_millis)
    }
}

impl SchedulingBackend for TokioAlarmBackend {
    fn arm_exact(&self, id: AlarmId, trigger_at_millis: i64) -> Result<()> {
        if !self.exact_alarms_allowed() {
            return Err(AlarmError::PermissionDenied {
                reason: "exact alarms are not allowed".to_string(),
            });
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AlarmError::Backend(format!("no tokio runtime: {e}")))?;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let delay = (trigger_at_millis - self.clock.now_millis()).max(0) as u64;
        let pending = Arc::clone(&self.pending);
        let fire_tx = self.fire_tx.clone();

        let handle = runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            pending.remove_if(&id, |_, p| p.generation == generation);
            let event = FireEvent {
                alarm_id: id,
                scheduled_for_millis: trigger_at_millis,
            };
            if fire_tx.send(event).await.is_err() {
                warn!(alarm_id = id, "fire channel closed, wake-up dropped");
            }
        });

        let previous = self.pending.insert(
            id,
            Pending {
                generation,
                trigger_at_millis,
                handle,
            },
        );
        if let Some(previous) = previous {
            previous.handle.abort();
            debug!(alarm_id = id, "replaced pending wake-up");
        }
        info!(alarm_id = id, trigger_at_millis, delay_ms = delay, "wake-up armed");
        Ok(())
    }

    fn cancel(&self, id: AlarmId) -> Result<()> {
        if let Some((_, p)) = self.pending.remove(&id) {
            p.handle.abort();
            info!(alarm_id = id, "wake-up cancelled");
        }
        Ok(())
    }

    fn exists(&self, id: AlarmId) -> Result<bool> {
        // a zero-delay task can finish before its entry is inserted
        self.pending.remove_if(&id, |_, p| p.handle.is_finished());
        Ok(self.pending.contains_key(&id))
    }

    fn armed(&self) -> Result<Vec<(AlarmId, i64)>> {
        self.pending.retain(|_, p| !p.handle.is_finished());
        let mut armed: Vec<(AlarmId, i64)> = self
            .pending
            .iter()
            .map(|e| (*e.key(), e.trigger_at_millis))
            .collect();
        armed.sort_unstable();
        Ok(armed)
    }
}

impl Drop for TokioAlarmBackend {
    fn drop(&mut self) {
        for entry in self.pending.iter() {
            entry.handle.abort();
        }
    }
}
