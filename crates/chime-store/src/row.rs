//! Mapping between [`AlarmDefinition`] and the `alarm_definition` row shape.
//!
//! Decoding never fails on a bad blob: unreadable JSON is logged and treated
//! as absent so one corrupt column cannot hide the whole alarm.

use std::collections::BTreeMap;

use chime_core::{
    AlarmDefinition, AlarmId, NotificationChannel, NotificationConfig, NotificationSpec,
    NotificationTarget, WeekDay, WeekDaySet,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

pub(crate) const SELECT_COLUMNS: &str = "id, hour, minute, second, millis, weekdays_json, \
     is_active, next_trigger_time, metadata_json, notification_channel_json, \
     notification_json, notification_targets_json";

/// Raw column values of one `alarm_definition` row.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AlarmRow {
    pub id: AlarmId,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millis: u16,
    pub weekdays_json: String,
    pub is_active: bool,
    pub next_trigger_time: Option<i64>,
    pub metadata_json: String,
    pub notification_channel_json: Option<String>,
    pub notification_json: Option<String>,
    pub notification_targets_json: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NotificationTargets {
    #[serde(default)]
    content_target: Option<NotificationTarget>,
    #[serde(default)]
    full_screen_target: Option<NotificationTarget>,
    #[serde(default)]
    alarm_received_target: Option<NotificationTarget>,
}

impl AlarmRow {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            hour: row.get(1)?,
            minute: row.get(2)?,
            second: row.get(3)?,
            millis: row.get(4)?,
            weekdays_json: row.get(5)?,
            is_active: row.get(6)?,
            next_trigger_time: row.get(7)?,
            metadata_json: row.get(8)?,
            notification_channel_json: row.get(9)?,
            notification_json: row.get(10)?,
            notification_targets_json: row.get(11)?,
        })
    }

    /// Like [`AlarmRow::from_row`], but a row whose columns cannot be read
    /// (e.g. an hour outside `u8`) is logged and yields `None`.
    pub(crate) fn read_lenient(row: &rusqlite::Row<'_>) -> rusqlite::Result<Option<Self>> {
        match Self::from_row(row) {
            Ok(r) => Ok(Some(r)),
            Err(e) => {
                let alarm_id = row.get::<_, AlarmId>(0).ok();
                warn!(alarm_id = ?alarm_id, error = %e, "unreadable alarm row skipped");
                Ok(None)
            }
        }
    }

    pub(crate) fn encode(def: &AlarmDefinition) -> Result<Self> {
        let weekdays: Vec<&str> = def.weekdays.iter().map(WeekDay::name).collect();
        let config = def.notification_config.as_ref();

        let targets_json = match config {
            Some(c) if c.has_targets() => Some(serde_json::to_string(&NotificationTargets {
                content_target: c.content_target.clone(),
                full_screen_target: c.full_screen_target.clone(),
                alarm_received_target: c.alarm_received_target.clone(),
            })?),
            _ => None,
        };

        Ok(Self {
            id: def.id,
            hour: def.hour,
            minute: def.minute,
            second: def.second,
            millis: def.millis,
            weekdays_json: serde_json::to_string(&weekdays)?,
            is_active: def.is_active,
            next_trigger_time: def.next_trigger_time,
            metadata_json: serde_json::to_string(&def.metadata)?,
            notification_channel_json: config
                .and_then(|c| c.channel.as_ref())
                .map(serde_json::to_string)
                .transpose()?,
            notification_json: config
                .and_then(|c| c.notification.as_ref())
                .map(serde_json::to_string)
                .transpose()?,
            notification_targets_json: targets_json,
        })
    }

    pub(crate) fn decode(self) -> AlarmDefinition {
        let id = self.id;

        let weekdays: WeekDaySet = parse_or_warn::<Vec<String>>(id, "weekdays", &self.weekdays_json)
            .unwrap_or_default()
            .iter()
            .filter_map(|name| name.parse::<WeekDay>().ok())
            .collect();

        let metadata: BTreeMap<String, String> =
            parse_or_warn(id, "metadata", &self.metadata_json).unwrap_or_default();

        let channel: Option<NotificationChannel> = self
            .notification_channel_json
            .as_deref()
            .and_then(|s| parse_or_warn(id, "notification_channel", s));
        let notification: Option<NotificationSpec> = self
            .notification_json
            .as_deref()
            .and_then(|s| parse_or_warn(id, "notification", s));
        let targets: Option<NotificationTargets> = self
            .notification_targets_json
            .as_deref()
            .and_then(|s| parse_or_warn(id, "notification_targets", s));

        let notification_config = if channel.is_some() || notification.is_some() || targets.is_some()
        {
            let targets = targets.unwrap_or_default();
            Some(NotificationConfig {
                channel,
                notification,
                content_target: targets.content_target,
                full_screen_target: targets.full_screen_target,
                alarm_received_target: targets.alarm_received_target,
            })
        } else {
            None
        };

        AlarmDefinition {
            id,
            hour: self.hour,
            minute: self.minute,
            second: self.second,
            millis: self.millis,
            weekdays,
            is_active: self.is_active,
            next_trigger_time: self.next_trigger_time,
            metadata,
            notification_config,
        }
    }
}

fn parse_or_warn<T: DeserializeOwned>(id: AlarmId, column: &str, json: &str) -> Option<T> {
    match serde_json::from_str(json) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(alarm_id = id, column, error = %e, "unreadable column treated as empty");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::{IntentRef, TargetKind, TimeOfDay};

    fn sample() -> AlarmDefinition {
        let target = NotificationTarget::from_intent(
            TargetKind::Screen,
            &IntentRef::explicit("com.example", "com.example.MainActivity"),
        )
        .unwrap();
        AlarmDefinition::new(
            7,
            TimeOfDay::new(6, 45, 30, 500),
            WeekDaySet::from([WeekDay::Monday, WeekDay::Friday]),
        )
        .with_metadata("label", "gym")
        .with_notification(
            NotificationConfig::new(
                NotificationChannel::default(),
                NotificationSpec::default().with_title("Gym"),
            )
            .with_content_target(target),
        )
    }

    #[test]
    fn encoded_row_restores_the_definition() {
        let def = sample();
        let row = AlarmRow::encode(&def).unwrap();
        assert_eq!(row.weekdays_json, r#"["MONDAY","FRIDAY"]"#);
        assert_eq!(row.metadata_json, r#"{"label":"gym"}"#);
        assert!(row.notification_targets_json.is_some());
        assert_eq!(row.decode(), def);
    }

    #[test]
    fn config_without_targets_stores_no_targets_blob() {
        let mut def = sample();
        if let Some(c) = def.notification_config.as_mut() {
            c.content_target = None;
        }
        let row = AlarmRow::encode(&def).unwrap();
        assert!(row.notification_targets_json.is_none());
        assert_eq!(row.decode(), def);
    }

    #[test]
    fn corrupt_blobs_decode_as_empty() {
        let mut row = AlarmRow::encode(&sample()).unwrap();
        row.weekdays_json = "not json".to_string();
        row.metadata_json = "{broken".to_string();
        row.notification_channel_json = Some("[]".to_string());
        row.notification_json = None;
        row.notification_targets_json = Some("???".to_string());

        let def = row.decode();
        assert!(def.weekdays.is_one_shot());
        assert!(def.metadata.is_empty());
        assert!(def.notification_config.is_none());
    }

    #[test]
    fn unknown_weekday_names_are_dropped() {
        let mut row = AlarmRow::encode(&sample()).unwrap();
        row.weekdays_json = r#"["MONDAY","FUNDAY","SUNDAY"]"#.to_string();
        let def = row.decode();
        assert_eq!(def.weekdays, WeekDaySet::from([WeekDay::Monday, WeekDay::Sunday]));
    }
}
