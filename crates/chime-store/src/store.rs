use std::sync::Mutex;

use async_trait::async_trait;
use chime_core::{AlarmDefinition, AlarmId, AlarmStore, ObservableAlarmStore};
use futures_util::stream::{BoxStream, StreamExt};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error};

use crate::db::init_db;
use crate::error::Result;
use crate::row::{AlarmRow, SELECT_COLUMNS};

/// SQLite-backed alarm store.
///
/// Thread-safe: wraps the connection in a Mutex, so writes to the same id are
/// serialized and the last one wins. Every mutation republishes the full
/// list to [`ObservableAlarmStore::watch`] subscribers.
pub struct SqliteAlarmStore {
    db: Mutex<Connection>,
    snapshots: watch::Sender<Vec<AlarmDefinition>>,
}

impl SqliteAlarmStore {
    /// Wrap `conn`, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        let initial = load_all(&conn)?;
        let (snapshots, _) = watch::channel(initial);
        Ok(Self {
            db: Mutex::new(conn),
            snapshots,
        })
    }

    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::new(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    fn insert_sync(&self, def: &AlarmDefinition) -> Result<()> {
        let row = AlarmRow::encode(def)?;
        let db = self.db.lock().expect("alarm db poisoned");
        db.execute(
            "INSERT OR REPLACE INTO alarm_definition
             (id, hour, minute, second, millis, weekdays_json, is_active,
              next_trigger_time, metadata_json, notification_channel_json,
              notification_json, notification_targets_json)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
            params![
                row.id,
                row.hour,
                row.minute,
                row.second,
                row.millis,
                row.weekdays_json,
                row.is_active,
                row.next_trigger_time,
                row.metadata_json,
                row.notification_channel_json,
                row.notification_json,
                row.notification_targets_json,
            ],
        )?;
        self.publish(&db);
        Ok(())
    }

    fn update_sync(&self, def: &AlarmDefinition) -> Result<bool> {
        let row = AlarmRow::encode(def)?;
        let db = self.db.lock().expect("alarm db poisoned");
        let n = db.execute(
            "UPDATE alarm_definition SET
                hour=?2, minute=?3, second=?4, millis=?5, weekdays_json=?6,
                is_active=?7, next_trigger_time=?8, metadata_json=?9,
                notification_channel_json=?10, notification_json=?11,
                notification_targets_json=?12
             WHERE id=?1",
            params![
                row.id,
                row.hour,
                row.minute,
                row.second,
                row.millis,
                row.weekdays_json,
                row.is_active,
                row.next_trigger_time,
                row.metadata_json,
                row.notification_channel_json,
                row.notification_json,
                row.notification_targets_json,
            ],
        )?;
        if n > 0 {
            self.publish(&db);
        }
        Ok(n > 0)
    }

    fn delete_sync(&self, id: AlarmId) -> Result<()> {
        let db = self.db.lock().expect("alarm db poisoned");
        let n = db.execute("DELETE FROM alarm_definition WHERE id = ?1", [id])?;
        if n > 0 {
            debug!(alarm_id = id, "alarm definition deleted");
            self.publish(&db);
        }
        Ok(())
    }

    fn get_sync(&self, id: AlarmId) -> Result<Option<AlarmDefinition>> {
        let db = self.db.lock().expect("alarm db poisoned");
        let row = db
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM alarm_definition WHERE id = ?1"),
                [id],
                AlarmRow::read_lenient,
            )
            .optional()?
            .flatten();
        Ok(row.map(AlarmRow::decode))
    }

    fn get_all_sync(&self) -> Result<Vec<AlarmDefinition>> {
        let db = self.db.lock().expect("alarm db poisoned");
        load_all(&db)
    }

    /// Push a fresh snapshot to watchers. Called with the lock held so
    /// snapshots are published in mutation order.
    fn publish(&self, conn: &Connection) {
        match load_all(conn) {
            Ok(all) => {
                self.snapshots.send_replace(all);
            }
            Err(e) => error!(error = %e, "failed to publish alarm snapshot"),
        }
    }
}

fn load_all(conn: &Connection) -> Result<Vec<AlarmDefinition>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM alarm_definition ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([], AlarmRow::read_lenient)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows.into_iter().flatten().map(AlarmRow::decode).collect())
}

#[async_trait]
impl AlarmStore for SqliteAlarmStore {
    async fn insert(&self, definition: &AlarmDefinition) -> chime_core::Result<()> {
        Ok(self.insert_sync(definition)?)
    }

    async fn update(&self, definition: &AlarmDefinition) -> chime_core::Result<bool> {
        Ok(self.update_sync(definition)?)
    }

    async fn delete(&self, id: AlarmId) -> chime_core::Result<()> {
        Ok(self.delete_sync(id)?)
    }

    async fn get(&self, id: AlarmId) -> chime_core::Result<Option<AlarmDefinition>> {
        Ok(self.get_sync(id)?)
    }

    async fn get_all(&self) -> chime_core::Result<Vec<AlarmDefinition>> {
        Ok(self.get_all_sync()?)
    }

    fn as_observable(&self) -> Option<&dyn ObservableAlarmStore> {
        Some(self)
    }
}

impl ObservableAlarmStore for SqliteAlarmStore {
    fn watch(&self) -> BoxStream<'static, Vec<AlarmDefinition>> {
        WatchStream::new(self.snapshots.subscribe()).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::{TimeOfDay, WeekDay, WeekDaySet};

    fn alarm(id: AlarmId) -> AlarmDefinition {
        AlarmDefinition::new(id, TimeOfDay::hm(7, 30), WeekDaySet::from([WeekDay::Monday]))
    }

    #[tokio::test]
    async fn insert_then_get() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        store.insert(&alarm(1)).await.unwrap();

        let got = store.get(1).await.unwrap().expect("alarm 1 missing");
        assert_eq!(got, alarm(1));
        assert!(store.get(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_replaces_same_id() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        store.insert(&alarm(1)).await.unwrap();
        let mut changed = alarm(1);
        changed.hour = 8;
        store.insert(&changed).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].hour, 8);
    }

    #[tokio::test]
    async fn update_reports_missing_rows() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        assert!(!store.update(&alarm(9)).await.unwrap());

        store.insert(&alarm(9)).await.unwrap();
        let mut next = alarm(9);
        next.next_trigger_time = Some(1_717_000_000_000);
        next.is_active = false;
        assert!(store.update(&next).await.unwrap());
        assert_eq!(store.get(9).await.unwrap(), Some(next));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        store.insert(&alarm(3)).await.unwrap();
        store.delete(3).await.unwrap();
        store.delete(3).await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_row_is_skipped_by_get_and_get_all() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        store.insert(&alarm(1)).await.unwrap();
        store.insert(&alarm(2)).await.unwrap();
        store
            .db
            .lock()
            .unwrap()
            .execute("UPDATE alarm_definition SET hour = 300 WHERE id = 2", [])
            .unwrap();

        let ids: Vec<_> = store.get_all().await.unwrap().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(store.get(2).await.unwrap(), None);
        assert_eq!(store.get(1).await.unwrap(), Some(alarm(1)));
    }

    #[tokio::test]
    async fn watch_emits_current_then_changes() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        store.insert(&alarm(1)).await.unwrap();

        let observable = store.as_observable().expect("sqlite store is observable");
        let mut updates = observable.watch();

        let first = updates.next().await.unwrap();
        assert_eq!(first.len(), 1);

        store.insert(&alarm(2)).await.unwrap();
        let second = updates.next().await.unwrap();
        assert_eq!(second.iter().map(|d| d.id).collect::<Vec<_>>(), vec![1, 2]);
    }
}
