use rusqlite::{Connection, Result};

/// Initialise the alarm tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_alarm_definition_table(conn)
}

/// Weekday sets, metadata and notification descriptors are JSON text blobs.
fn create_alarm_definition_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS alarm_definition (
            id                         INTEGER NOT NULL PRIMARY KEY,
            hour                       INTEGER NOT NULL,
            minute                     INTEGER NOT NULL,
            second                     INTEGER NOT NULL DEFAULT 0,
            millis                     INTEGER NOT NULL DEFAULT 0,
            weekdays_json              TEXT    NOT NULL DEFAULT '[]',
            is_active                  INTEGER NOT NULL DEFAULT 1,
            next_trigger_time          INTEGER,            -- epoch millis or NULL
            metadata_json              TEXT    NOT NULL DEFAULT '{}',
            notification_channel_json  TEXT,
            notification_json          TEXT,
            notification_targets_json  TEXT
        );

        -- boot sweep: SELECT … WHERE is_active = 1
        CREATE INDEX IF NOT EXISTS idx_alarm_definition_active
            ON alarm_definition (is_active);",
    )
}
