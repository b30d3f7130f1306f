use std::future::Future;

use chime_core::{AlarmError, AlarmId, Result};
use tokio::task::JoinHandle;
use tracing::error;

/// A spawned store/backend operation whose outcome can be awaited later.
///
/// Dropping it detaches the task; it still runs to completion.
#[must_use = "await the task or call `join_and_log` to observe failures"]
pub struct BackgroundTask<T> {
    op: &'static str,
    alarm_id: AlarmId,
    handle: JoinHandle<Result<T>>,
}

impl<T: Send + 'static> BackgroundTask<T> {
    pub fn spawn<F>(op: &'static str, alarm_id: AlarmId, fut: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            op,
            alarm_id,
            handle: tokio::spawn(fut),
        }
    }

    /// Wait for the task. A panic inside it is reported as a backend error.
    pub async fn join(self) -> Result<T> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(AlarmError::Backend(format!("{} task aborted: {e}", self.op))),
        }
    }

    /// Wait for the task, logging instead of returning its error.
    pub async fn join_and_log(self) -> Option<T> {
        let (op, alarm_id) = (self.op, self.alarm_id);
        match self.join().await {
            Ok(v) => Some(v),
            Err(e) => {
                error!(alarm_id, op, code = e.code(), error = %e, "background task failed");
                None
            }
        }
    }
}
