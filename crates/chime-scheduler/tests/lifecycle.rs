// Alarm lifecycle against an in-memory store and a recording backend.
// Clock starts on Sunday 2024-06-02 15:51 UTC.

mod common;

use std::sync::Arc;

use chime_core::{
    AlarmDefinition, AlarmStore, IntentRef, NotificationChannel, NotificationConfig,
    NotificationSpec, NotificationTarget, SchedulingBackend, TargetKind, TimeOfDay, WeekDay,
    WeekDaySet,
};
use chime_scheduler::{AlarmRequest, AlarmUpdate, FireOutcome, SystemEvent};
use chrono::Duration;
use common::{harness, millis, utc, ReadOnlyStore};

fn sunday_afternoon() -> common::Harness {
    harness(utc(2024, 6, 2, 15, 51))
}

fn with_notification(request: AlarmRequest) -> AlarmRequest {
    request.notification(NotificationConfig::new(
        NotificationChannel::default(),
        NotificationSpec::default().with_title("Alarm"),
    ))
}

#[tokio::test]
async fn one_shot_fire_deactivates_and_disarms() {
    let h = sunday_afternoon();
    let id = h
        .client
        .set(with_notification(AlarmRequest::new(15, 0)))
        .await
        .unwrap();

    // 15:00 already passed today, so tomorrow
    assert_eq!(h.backend.armed_at(id), Some(millis(2024, 6, 3, 15, 0)));
    let stored = h.client.get(id).await.unwrap().unwrap();
    assert_eq!(stored.next_trigger_time, Some(millis(2024, 6, 3, 15, 0)));

    h.clock.set(utc(2024, 6, 3, 15, 0));
    let outcome = h.client.receiver().on_alarm_received(id).await.unwrap();
    assert_eq!(outcome, FireOutcome::Deactivated);

    let stored = h.client.get(id).await.unwrap().unwrap();
    assert!(!stored.is_active);
    assert!(!h.client.coordinator().exists(id).unwrap());
    assert_eq!(*h.presenter.shown.lock().unwrap(), vec![id]);
}

#[tokio::test]
async fn one_shot_fire_clears_registration_when_deactivation_fails() {
    let h = sunday_afternoon();
    let id = h.client.set(AlarmRequest::new(16, 0)).await.unwrap();
    assert!(h.backend.armed_at(id).is_some());

    let coordinator = h.coordinator_over(Arc::new(ReadOnlyStore(h.store.clone())));
    h.clock.set(utc(2024, 6, 2, 16, 0));
    let err = coordinator.on_fire(id).await.unwrap_err();
    assert_eq!(err.code(), "STORE_ERROR");

    assert!(!h.backend.exists(id).unwrap());
    assert_eq!(*h.backend.cancelled.lock().unwrap(), vec![id]);
    // the write never landed
    assert!(h.client.get(id).await.unwrap().unwrap().is_active);
}

#[tokio::test]
async fn repeating_fire_stays_active_and_rearms() {
    let h = sunday_afternoon();
    let id = h
        .client
        .set(AlarmRequest::new(15, 0).weekdays(WeekDaySet::from([WeekDay::Sunday])))
        .await
        .unwrap();
    assert_eq!(h.backend.armed_at(id), Some(millis(2024, 6, 9, 15, 0)));

    h.clock.set(utc(2024, 6, 9, 15, 0) + Duration::milliseconds(500));
    let outcome = h.client.coordinator().on_fire(id).await.unwrap();
    let next = millis(2024, 6, 16, 15, 0);
    assert_eq!(
        outcome,
        FireOutcome::Rearmed {
            next_trigger_millis: next
        }
    );

    let stored = h.client.get(id).await.unwrap().unwrap();
    assert!(stored.is_active);
    assert_eq!(stored.next_trigger_time, Some(next));
    assert_eq!(h.backend.armed_at(id), Some(next));
    // no channel/notification configured
    assert!(h.presenter.shown.lock().unwrap().is_empty());
}

#[tokio::test]
async fn presentation_failure_does_not_block_deactivation() {
    let h = sunday_afternoon();
    h.presenter
        .fail
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let id = h
        .client
        .set(with_notification(AlarmRequest::new(16, 0)))
        .await
        .unwrap();

    let outcome = h.client.coordinator().on_fire(id).await.unwrap();
    assert_eq!(outcome, FireOutcome::Deactivated);
    assert!(!h.client.get(id).await.unwrap().unwrap().is_active);
}

#[tokio::test]
async fn firing_an_unknown_id_is_a_noop() {
    let h = sunday_afternoon();
    let outcome = h.client.coordinator().on_fire(404).await.unwrap();
    assert_eq!(outcome, FireOutcome::Missing);
    assert!(h.backend.cancelled.lock().unwrap().is_empty());
}

#[tokio::test]
async fn schedule_skips_persisting_for_missing_definition() {
    let h = sunday_afternoon();
    let scheduled = h
        .client
        .coordinator()
        .schedule(77, TimeOfDay::hm(18, 30), &WeekDaySet::one_shot())
        .unwrap();
    assert_eq!(scheduled.trigger_at_millis, millis(2024, 6, 2, 18, 30));
    assert!(!scheduled.persisted.join().await.unwrap());
    assert!(h.client.get(77).await.unwrap().is_none());
    assert!(h.backend.exists(77).unwrap());
}

#[tokio::test]
async fn permission_denied_surfaces_from_set() {
    let h = sunday_afternoon();
    h.backend.deny(true);
    let err = h.client.set(AlarmRequest::new(7, 0).id(5)).await.unwrap_err();
    assert!(err.is_permission_denied());

    // definition kept for a later renew, nothing armed
    assert!(h.client.get(5).await.unwrap().is_some());
    assert!(h.backend.armed_at(5).is_none());

    h.backend.deny(false);
    let at = h.client.renew(5).await.unwrap();
    assert_eq!(at, millis(2024, 6, 3, 7, 0));
}

#[tokio::test]
async fn invalid_time_is_rejected_before_storing() {
    let h = sunday_afternoon();
    let err = h
        .client
        .set(AlarmRequest::new(24, 0).id(9))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_TIME");
    assert!(h.client.get(9).await.unwrap().is_none());
}

#[tokio::test]
async fn update_does_not_rearm() {
    let h = sunday_afternoon();
    let id = h.client.set(AlarmRequest::new(15, 0)).await.unwrap();
    let armed = h.backend.armed_at(id);

    let updated = h
        .client
        .update(AlarmUpdate::new(id).time(TimeOfDay::hm(16, 30)))
        .await
        .unwrap();
    assert_eq!((updated.hour, updated.minute), (16, 30));
    assert_eq!(h.backend.armed_at(id), armed);

    let at = h.client.renew(id).await.unwrap();
    assert_eq!(at, millis(2024, 6, 2, 16, 30));
    assert_eq!(h.backend.armed_at(id), Some(at));
}

#[tokio::test]
async fn update_of_unknown_alarm_is_not_found() {
    let h = sunday_afternoon();
    let err = h
        .client
        .update(AlarmUpdate::new(12).active(false))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn boot_sweep_rearms_active_alarms_not_yet_due() {
    let h = sunday_afternoon();
    let now = millis(2024, 6, 2, 15, 51);

    let unknown = AlarmDefinition::new(1, TimeOfDay::hm(8, 0), WeekDaySet::one_shot());
    let mut future = AlarmDefinition::new(2, TimeOfDay::hm(20, 0), WeekDaySet::one_shot());
    future.next_trigger_time = Some(now + 60_000);
    let mut missed = AlarmDefinition::new(3, TimeOfDay::hm(9, 0), WeekDaySet::every_day());
    missed.next_trigger_time = Some(now - 60_000);
    let mut inactive = AlarmDefinition::new(4, TimeOfDay::hm(10, 0), WeekDaySet::one_shot());
    inactive.is_active = false;
    let mut due_now = AlarmDefinition::new(5, TimeOfDay::hm(15, 51), WeekDaySet::one_shot());
    due_now.next_trigger_time = Some(now);
    for def in [&unknown, &future, &missed, &inactive, &due_now] {
        h.store.insert(def).await.unwrap();
    }

    let report = h
        .client
        .receiver()
        .on_system_event(SystemEvent::BootCompleted)
        .await
        .unwrap();
    assert_eq!(report.examined, 5);
    // a trigger exactly at boot time still counts as not yet due
    assert_eq!(report.rearmed, vec![1, 2, 5]);
    assert_eq!(report.skipped, vec![3, 4]);
    assert!(report.is_clean());
    assert_eq!(h.backend.armed_at(1), Some(millis(2024, 6, 3, 8, 0)));
    assert_eq!(
        h.client.get(2).await.unwrap().unwrap().next_trigger_time,
        Some(millis(2024, 6, 2, 20, 0))
    );
}

#[tokio::test]
async fn time_change_rearms_every_active_alarm() {
    let h = sunday_afternoon();
    let mut missed = AlarmDefinition::new(3, TimeOfDay::hm(9, 0), WeekDaySet::every_day());
    missed.next_trigger_time = Some(0);
    let mut inactive = AlarmDefinition::new(4, TimeOfDay::hm(10, 0), WeekDaySet::one_shot());
    inactive.is_active = false;
    h.store.insert(&missed).await.unwrap();
    h.store.insert(&inactive).await.unwrap();

    let report = h
        .client
        .receiver()
        .on_system_event(SystemEvent::TimezoneChanged)
        .await
        .unwrap();
    assert_eq!(report.rearmed, vec![3]);
    assert_eq!(report.skipped, vec![4]);
    assert_eq!(h.backend.armed_at(3), Some(millis(2024, 6, 3, 9, 0)));
}

#[tokio::test]
async fn sweep_reports_backend_failures() {
    let h = sunday_afternoon();
    h.store
        .insert(&AlarmDefinition::new(1, TimeOfDay::hm(8, 0), WeekDaySet::one_shot()))
        .await
        .unwrap();
    h.backend.deny(true);

    let report = h
        .client
        .receiver()
        .on_system_event(SystemEvent::TimeChanged)
        .await
        .unwrap();
    assert!(!report.is_clean());
    assert_eq!(report.failed[0].0, 1);
    assert!(report.failed[0].1.is_permission_denied());
}

#[tokio::test]
async fn content_tap_launches_target() {
    let h = sunday_afternoon();
    let target = NotificationTarget::from_intent(
        TargetKind::Screen,
        &IntentRef::explicit("com.example.clock", "com.example.clock.AlarmActivity"),
    )
    .unwrap();
    let config = NotificationConfig::default().with_content_target(target.clone());
    let with_target = h
        .client
        .set(AlarmRequest::new(6, 0).notification(config))
        .await
        .unwrap();
    let without_target = h.client.set(AlarmRequest::new(6, 30)).await.unwrap();

    let receiver = h.client.receiver();
    assert!(receiver.on_content_tapped(with_target).await.unwrap());
    assert!(!receiver.on_content_tapped(without_target).await.unwrap());
    assert!(!receiver.on_content_tapped(999).await.unwrap());
    assert_eq!(
        *h.launcher.launched.lock().unwrap(),
        vec![(with_target, target)]
    );
}

#[tokio::test]
async fn disarm_keeps_definition_and_cancel_removes_it() {
    let h = sunday_afternoon();
    let a = h.client.set(AlarmRequest::new(6, 0)).await.unwrap();
    let b = h.client.set(AlarmRequest::new(7, 0)).await.unwrap();

    h.client.disarm(a).await.unwrap();
    assert!(!h.backend.exists(a).unwrap());
    assert!(!h.client.get(a).await.unwrap().unwrap().is_active);

    h.client.cancel(b).await.unwrap();
    assert!(!h.backend.exists(b).unwrap());
    assert!(h.client.get(b).await.unwrap().is_none());
}

#[tokio::test]
async fn renew_missing_and_sync_reconcile_backend() {
    let h = sunday_afternoon();
    let armed = h.client.set(AlarmRequest::new(6, 0)).await.unwrap();
    let missing = AlarmDefinition::new(50, TimeOfDay::hm(22, 15), WeekDaySet::one_shot());
    h.store.insert(&missing).await.unwrap();
    // registration with no definition behind it
    h.backend.arm_exact(99, millis(2024, 6, 5, 0, 0)).unwrap();

    let report = h.client.sync().await.unwrap();
    assert_eq!(report.renewed.rearmed, vec![50]);
    assert_eq!(report.renewed.skipped, vec![armed]);
    assert_eq!(report.dropped, vec![99]);
    assert!(report.realigned.is_empty());
    assert_eq!(h.backend.armed_at(50), Some(millis(2024, 6, 2, 22, 15)));
    assert!(!h.backend.exists(99).unwrap());
}

#[tokio::test]
async fn sync_realigns_registration_renewed_elsewhere() {
    let h = sunday_afternoon();
    let id = h.client.set(AlarmRequest::new(6, 0)).await.unwrap();
    // another process moved the alarm and stored its new trigger
    let mut def = h.client.get(id).await.unwrap().unwrap();
    def.set_time_of_day(TimeOfDay::hm(21, 0));
    def.next_trigger_time = Some(millis(2024, 6, 2, 21, 0));
    h.store.update(&def).await.unwrap();

    let report = h.client.sync().await.unwrap();
    assert_eq!(report.realigned, vec![id]);
    assert_eq!(h.backend.armed_at(id), Some(millis(2024, 6, 2, 21, 0)));
}

#[tokio::test]
async fn list_json_uses_legacy_shape() {
    let h = sunday_afternoon();
    h.client
        .set(
            AlarmRequest::new(7, 5)
                .id(3)
                .weekdays(WeekDaySet::from([WeekDay::Monday, WeekDay::Friday]))
                .metadata("label", "gym"),
        )
        .await
        .unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&h.client.list_json().await.unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "alarmItems": [{
                "requestId": 3,
                "hour": 7,
                "minute": 5,
                "weekDays": ["MONDAY", "FRIDAY"],
                "isActive": true,
                "infoPairs": "{\"label\":\"gym\"}"
            }]
        })
    );
}

#[tokio::test]
async fn watch_follows_client_changes() {
    use futures_util::StreamExt;

    let h = sunday_afternoon();
    let mut updates = h.client.watch().expect("sqlite store is observable");
    assert!(updates.next().await.unwrap().is_empty());

    let id = h.client.set(AlarmRequest::new(6, 0)).await.unwrap();
    let mut latest = updates.next().await.unwrap();
    // insert and trigger persistence may be coalesced into one snapshot
    while latest[0].next_trigger_time.is_none() {
        latest = updates.next().await.unwrap();
    }
    assert_eq!(latest[0].id, id);
    assert_eq!(latest[0].next_trigger_time, Some(millis(2024, 6, 3, 6, 0)));
}

#[tokio::test]
async fn next_trigger_preview_stores_nothing() {
    let h = sunday_afternoon();
    let at = h
        .client
        .next_trigger(TimeOfDay::hm(9, 0), &WeekDaySet::every_day())
        .unwrap();
    assert_eq!(at, millis(2024, 6, 3, 9, 0));
    assert!(h.client.list().await.unwrap().is_empty());
}
