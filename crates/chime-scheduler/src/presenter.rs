//! Log-only presenter and launcher for hosts without a notification surface.

use chime_core::{
    AlarmError, AlarmId, NotificationConfig, NotificationPresenter, NotificationTarget, Result,
    TargetLauncher,
};
use tracing::info;

/// Writes each notification as a structured `info!` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPresenter;

impl NotificationPresenter for TracingPresenter {
    fn show(&self, id: AlarmId, config: &NotificationConfig) -> Result<()> {
        let channel = config
            .channel
            .as_ref()
            .ok_or_else(|| AlarmError::Presentation("no notification channel".to_string()))?;
        if channel.channel_id.trim().is_empty() {
            return Err(AlarmError::Presentation("empty channel id".to_string()));
        }
        let notice = config
            .notification
            .as_ref()
            .ok_or_else(|| AlarmError::Presentation("no notification descriptor".to_string()))?;

        info!(
            alarm_id = id,
            channel_id = %channel.channel_id,
            importance = ?channel.importance,
            title = notice.title.as_deref().unwrap_or(""),
            message = notice.message.as_deref().unwrap_or(""),
            content_target = config.content_target.as_ref().map(NotificationTarget::component),
            full_screen = config.full_screen_target.is_some(),
            "alarm notification"
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLauncher;

impl TargetLauncher for TracingLauncher {
    fn launch(&self, id: AlarmId, target: &NotificationTarget) -> Result<()> {
        info!(
            alarm_id = id,
            kind = ?target.kind(),
            package = target.package(),
            component = target.component(),
            action = target.action(),
            "launching target"
        );
        Ok(())
    }
}
