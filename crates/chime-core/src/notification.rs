//! Portable descriptions of what to show, and what to invoke, when an alarm fires.
//!
//! Nothing in here talks to a notification service. Presenters and launchers
//! (see [`crate::traits`]) turn these descriptors into real side effects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AlarmError, Result};

pub const DEFAULT_CHANNEL_ID: &str = "chime_alarm_channel";
pub const DEFAULT_CHANNEL_NAME: &str = "chime.alarm.channel";
pub const DEFAULT_CHANNEL_DESCRIPTION: &str = "Notification channel created by chime";

/// Channel importance, mirroring the usual platform levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    None,
    Min,
    Low,
    Default,
    #[default]
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub channel_id: String,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub show_badge: bool,
    pub name: String,
    pub description: String,
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self {
            channel_id: DEFAULT_CHANNEL_ID.to_string(),
            importance: Importance::High,
            show_badge: false,
            name: DEFAULT_CHANNEL_NAME.to_string(),
            description: DEFAULT_CHANNEL_DESCRIPTION.to_string(),
        }
    }
}

impl NotificationChannel {
    pub fn with_id(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_badge(mut self, show_badge: bool) -> Self {
        self.show_badge = show_badge;
        self
    }
}

/// Content of the notification shown when an alarm fires.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_icon: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub big_text: Option<String>,
    /// `None` is treated as `true` by presenters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_cancel: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_button_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_button_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_button_target: Option<NotificationTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_button_target: Option<NotificationTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismiss_target: Option<NotificationTarget>,
}

impl NotificationSpec {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_big_text(mut self, big_text: impl Into<String>) -> Self {
        self.big_text = Some(big_text.into());
        self
    }

    pub fn with_small_icon(mut self, icon: i32) -> Self {
        self.small_icon = Some(icon);
        self
    }

    pub fn with_auto_cancel(mut self, auto_cancel: bool) -> Self {
        self.auto_cancel = Some(auto_cancel);
        self
    }

    pub fn with_first_button(mut self, text: impl Into<String>, target: NotificationTarget) -> Self {
        self.first_button_text = Some(text.into());
        self.first_button_target = Some(target);
        self
    }

    pub fn with_second_button(mut self, text: impl Into<String>, target: NotificationTarget) -> Self {
        self.second_button_text = Some(text.into());
        self.second_button_target = Some(target);
        self
    }

    pub fn with_dismiss_target(mut self, target: NotificationTarget) -> Self {
        self.dismiss_target = Some(target);
        self
    }
}

/// Where a notification interaction should lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationTarget {
    Screen {
        package: String,
        activity: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
        #[serde(default)]
        extras: BTreeMap<String, String>,
    },
    Service {
        package: String,
        service: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
        #[serde(default)]
        extras: BTreeMap<String, String>,
    },
    Broadcast {
        package: String,
        receiver: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
        #[serde(default)]
        extras: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Screen,
    Service,
    Broadcast,
}

/// Explicit component reference carried by an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRef {
    pub package: String,
    pub class_name: String,
}

/// Minimal view of a platform intent, as handed over by the embedding app.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentRef {
    pub component: Option<ComponentRef>,
    pub action: Option<String>,
    pub extras: BTreeMap<String, String>,
}

impl IntentRef {
    pub fn explicit(package: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            component: Some(ComponentRef {
                package: package.into(),
                class_name: class_name.into(),
            }),
            ..Default::default()
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }
}

impl NotificationTarget {
    /// Build a target from an intent. The intent must name an explicit component.
    pub fn from_intent(kind: TargetKind, intent: &IntentRef) -> Result<Self> {
        let component = intent.component.as_ref().ok_or_else(|| {
            AlarmError::InvalidTarget(format!(
                "intent must have an explicit component to build a {kind:?} target"
            ))
        })?;
        if component.package.is_empty() || component.class_name.is_empty() {
            return Err(AlarmError::InvalidTarget(
                "intent component has an empty package or class name".to_string(),
            ));
        }

        let package = component.package.clone();
        let class = component.class_name.clone();
        let action = intent.action.clone();
        let extras = intent.extras.clone();

        Ok(match kind {
            TargetKind::Screen => NotificationTarget::Screen {
                package,
                activity: class,
                action,
                extras,
            },
            TargetKind::Service => NotificationTarget::Service {
                package,
                service: class,
                action,
                extras,
            },
            TargetKind::Broadcast => NotificationTarget::Broadcast {
                package,
                receiver: class,
                action,
                extras,
            },
        })
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            NotificationTarget::Screen { .. } => TargetKind::Screen,
            NotificationTarget::Service { .. } => TargetKind::Service,
            NotificationTarget::Broadcast { .. } => TargetKind::Broadcast,
        }
    }

    pub fn package(&self) -> &str {
        match self {
            NotificationTarget::Screen { package, .. }
            | NotificationTarget::Service { package, .. }
            | NotificationTarget::Broadcast { package, .. } => package,
        }
    }

    pub fn component(&self) -> &str {
        match self {
            NotificationTarget::Screen { activity, .. } => activity,
            NotificationTarget::Service { service, .. } => service,
            NotificationTarget::Broadcast { receiver, .. } => receiver,
        }
    }

    pub fn action(&self) -> Option<&str> {
        match self {
            NotificationTarget::Screen { action, .. }
            | NotificationTarget::Service { action, .. }
            | NotificationTarget::Broadcast { action, .. } => action.as_deref(),
        }
    }

    pub fn extras(&self) -> &BTreeMap<String, String> {
        match self {
            NotificationTarget::Screen { extras, .. }
            | NotificationTarget::Service { extras, .. }
            | NotificationTarget::Broadcast { extras, .. } => extras,
        }
    }

    /// Back to the intent shape handed to the platform.
    pub fn to_intent(&self) -> IntentRef {
        IntentRef {
            component: Some(ComponentRef {
                package: self.package().to_string(),
                class_name: self.component().to_string(),
            }),
            action: self.action().map(str::to_string),
            extras: self.extras().clone(),
        }
    }
}

/// Everything needed to present an alarm when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub channel: Option<NotificationChannel>,
    #[serde(default)]
    pub notification: Option<NotificationSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_target: Option<NotificationTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_screen_target: Option<NotificationTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_received_target: Option<NotificationTarget>,
}

impl NotificationConfig {
    pub fn new(channel: NotificationChannel, notification: NotificationSpec) -> Self {
        Self {
            channel: Some(channel),
            notification: Some(notification),
            ..Default::default()
        }
    }

    pub fn with_content_target(mut self, target: NotificationTarget) -> Self {
        self.content_target = Some(target);
        self
    }

    pub fn with_full_screen_target(mut self, target: NotificationTarget) -> Self {
        self.full_screen_target = Some(target);
        self
    }

    pub fn with_alarm_received_target(mut self, target: NotificationTarget) -> Self {
        self.alarm_received_target = Some(target);
        self
    }

    pub fn has_targets(&self) -> bool {
        self.content_target.is_some()
            || self.full_screen_target.is_some()
            || self.alarm_received_target.is_some()
    }
}
