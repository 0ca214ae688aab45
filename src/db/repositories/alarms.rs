use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::debug;
use rusqlite::{params, Connection, Row};
use tokio::sync::watch;

use crate::db::{
    helpers::{format_time_of_day, parse_datetime, parse_time_of_day, to_color},
    models::alarm::{normalize_label, normalize_tag},
    AlarmDraft, AlarmRecord, Database,
};

const ALARM_COLUMNS: &str = "id, time_of_day, label, tag, color_argb, is_active, \
     is_snooze_enabled, is_vibration_enabled, created_at, updated_at";

fn row_to_alarm(row: &Row) -> Result<AlarmRecord> {
    let time_of_day: String = row.get("time_of_day")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(AlarmRecord {
        id: row.get("id")?,
        time_of_day: parse_time_of_day(&time_of_day)?,
        label: row.get("label")?,
        tag: row.get("tag")?,
        color_argb: to_color(row.get("color_argb")?)?,
        is_active: row.get("is_active")?,
        is_snooze_enabled: row.get("is_snooze_enabled")?,
        is_vibration_enabled: row.get("is_vibration_enabled")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn select_alarm(conn: &Connection, alarm_id: i64) -> Result<Option<AlarmRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {ALARM_COLUMNS} FROM alarms WHERE id = ?1"))?;
    let mut rows = stmt.query(params![alarm_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_alarm(row)?)),
        None => Ok(None),
    }
}

fn query_alarms(conn: &Connection) -> Result<Vec<AlarmRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {ALARM_COLUMNS} FROM alarms ORDER BY id DESC"))?;
    let mut rows = stmt.query([])?;
    let mut alarms = Vec::new();
    while let Some(row) = rows.next()? {
        alarms.push(row_to_alarm(row)?);
    }
    Ok(alarms)
}

impl Database {
    /// All alarms, newest first.
    pub async fn list_alarms(&self) -> Result<Vec<AlarmRecord>> {
        self.execute(|conn| query_alarms(conn)).await
    }

    /// Live view of the alarm list. The receiver observes a fresh list after
    /// every insert, update and delete made through this handle.
    pub async fn subscribe_alarms(&self) -> Result<watch::Receiver<Vec<AlarmRecord>>> {
        self.publish_alarms().await?;
        Ok(self.alarm_feed().subscribe())
    }

    pub async fn get_alarm(&self, alarm_id: i64) -> Result<Option<AlarmRecord>> {
        self.execute(move |conn| select_alarm(conn, alarm_id)).await
    }

    pub async fn get_most_recent_alarm(&self) -> Result<Option<AlarmRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ALARM_COLUMNS} FROM alarms ORDER BY id DESC LIMIT 1"
            ))?;
            let mut rows = stmt.query([])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_alarm(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn insert_alarm(&self, draft: AlarmDraft, is_active: bool) -> Result<AlarmRecord> {
        let alarm = self
            .execute(move |conn| {
                let now = Utc::now().to_rfc3339();
                conn.execute(
                    "INSERT INTO alarms (time_of_day, label, tag, color_argb, is_active,
                                         is_snooze_enabled, is_vibration_enabled, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        format_time_of_day(draft.time_of_day),
                        normalize_label(&draft.label),
                        normalize_tag(draft.tag.as_deref()),
                        draft.color_argb,
                        is_active,
                        draft.is_snooze_enabled,
                        draft.is_vibration_enabled,
                        now,
                        now,
                    ],
                )
                .with_context(|| "failed to insert alarm")?;

                let alarm_id = conn.last_insert_rowid();
                select_alarm(conn, alarm_id)?
                    .ok_or_else(|| anyhow!("alarm {alarm_id} not found after insert"))
            })
            .await?;

        debug!("Inserted alarm {} at {}", alarm.id, alarm.time_of_day);
        self.publish_alarms().await?;
        Ok(alarm)
    }

    /// Overwrite every mutable column of `alarm`. Returns the stored row, or
    /// `None` if the alarm no longer exists.
    pub async fn update_alarm(&self, alarm: &AlarmRecord) -> Result<Option<AlarmRecord>> {
        let record = alarm.clone();
        let updated = self
            .execute(move |conn| {
                let rows_affected = conn
                    .execute(
                        "UPDATE alarms
                         SET time_of_day = ?1,
                             label = ?2,
                             tag = ?3,
                             color_argb = ?4,
                             is_active = ?5,
                             is_snooze_enabled = ?6,
                             is_vibration_enabled = ?7,
                             updated_at = ?8
                         WHERE id = ?9",
                        params![
                            format_time_of_day(record.time_of_day),
                            normalize_label(&record.label),
                            normalize_tag(record.tag.as_deref()),
                            record.color_argb,
                            record.is_active,
                            record.is_snooze_enabled,
                            record.is_vibration_enabled,
                            Utc::now().to_rfc3339(),
                            record.id,
                        ],
                    )
                    .with_context(|| format!("failed to update alarm {}", record.id))?;

                if rows_affected == 0 {
                    return Ok(None);
                }
                select_alarm(conn, record.id)
            })
            .await?;

        if updated.is_some() {
            self.publish_alarms().await?;
        }
        Ok(updated)
    }

    /// Returns whether a row was removed.
    pub async fn delete_alarm(&self, alarm_id: i64) -> Result<bool> {
        let removed = self
            .execute(move |conn| {
                let rows_affected = conn
                    .execute("DELETE FROM alarms WHERE id = ?1", params![alarm_id])
                    .with_context(|| format!("failed to delete alarm {alarm_id}"))?;
                Ok(rows_affected > 0)
            })
            .await?;

        if removed {
            self.publish_alarms().await?;
        }
        Ok(removed)
    }

    /// Reads and sends on the worker thread, so concurrent writers publish in
    /// the order their queries ran and the last send is always current.
    async fn publish_alarms(&self) -> Result<()> {
        let feed = self.alarm_feed();
        self.execute(move |conn| {
            feed.send_replace(query_alarms(conn)?);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &tempfile::TempDir) -> Database {
        Database::new(dir.path().join("alarms.sqlite3")).expect("database")
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_normalizes_fields() {
        let dir = tempdir().expect("tempdir");
        let db = open(&dir);

        let first = db
            .insert_alarm(AlarmDraft::at(7, 30).expect("draft").with_tag("  "), true)
            .await
            .expect("insert");
        let second = db
            .insert_alarm(AlarmDraft::at(8, 0).expect("draft").with_label("Gym"), false)
            .await
            .expect("insert");

        assert!(second.id > first.id);
        assert_eq!(first.label, "Alarm");
        assert_eq!(first.tag, None);
        assert!(first.is_active);
        assert_eq!(second.label, "Gym");
        assert!(!second.is_active);

        let latest = db.get_most_recent_alarm().await.expect("query");
        assert_eq!(latest.map(|alarm| alarm.id), Some(second.id));

        let listed = db.list_alarms().await.expect("list");
        let ids: Vec<i64> = listed.iter().map(|alarm| alarm.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let dir = tempdir().expect("tempdir");
        let db = open(&dir);

        let mut alarm = db
            .insert_alarm(AlarmDraft::at(6, 15).expect("draft"), true)
            .await
            .expect("insert");
        alarm.is_active = false;
        alarm.label = "Early".into();
        let updated = db
            .update_alarm(&alarm)
            .await
            .expect("update")
            .expect("row exists");
        assert!(!updated.is_active);
        assert_eq!(updated.label, "Early");

        assert!(db.delete_alarm(alarm.id).await.expect("delete"));
        assert!(!db.delete_alarm(alarm.id).await.expect("second delete"));
        assert!(db.update_alarm(&alarm).await.expect("update").is_none());
        assert!(db.get_alarm(alarm.id).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn subscribers_see_every_mutation() {
        let dir = tempdir().expect("tempdir");
        let db = open(&dir);
        let mut feed = db.subscribe_alarms().await.expect("subscribe");
        assert!(feed.borrow_and_update().is_empty());

        let alarm = db
            .insert_alarm(AlarmDraft::at(9, 0).expect("draft"), true)
            .await
            .expect("insert");
        feed.changed().await.expect("feed open");
        assert_eq!(feed.borrow_and_update().len(), 1);

        db.delete_alarm(alarm.id).await.expect("delete");
        feed.changed().await.expect("feed open");
        assert!(feed.borrow_and_update().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn feed_settles_on_latest_list_under_concurrent_writes() {
        let dir = tempdir().expect("tempdir");
        let db = open(&dir);
        let feed = db.subscribe_alarms().await.expect("subscribe");

        let writers: Vec<_> = (0..16u32)
            .map(|minute| {
                let db = db.clone();
                tokio::spawn(async move {
                    let alarm = db
                        .insert_alarm(AlarmDraft::at(6, minute).expect("draft"), true)
                        .await
                        .expect("insert");
                    if minute % 2 == 0 {
                        db.delete_alarm(alarm.id).await.expect("delete");
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.await.expect("writer task");
        }

        let listed = db.list_alarms().await.expect("list");
        assert_eq!(listed.len(), 8);
        assert_eq!(*feed.borrow(), listed);
    }

    #[tokio::test]
    async fn alarms_survive_reopen() {
        let dir = tempdir().expect("tempdir");
        let id = {
            let db = open(&dir);
            db.insert_alarm(AlarmDraft::at(5, 45).expect("draft"), true)
                .await
                .expect("insert")
                .id
        };

        let reopened = open(&dir);
        let alarm = reopened
            .get_alarm(id)
            .await
            .expect("get")
            .expect("alarm persisted");
        assert_eq!(alarm.time_of_day.format("%H:%M").to_string(), "05:45");
    }
}
