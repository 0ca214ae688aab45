use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    helpers::{parse_datetime, parse_optional_datetime, parse_outcome},
    Database, RingOutcome, RingSession,
};

fn row_to_ring_session(row: &Row) -> Result<RingSession> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let outcome: String = row.get("outcome")?;

    Ok(RingSession {
        id: row.get("id")?,
        alarm_id: row.get("alarm_id")?,
        label: row.get("label")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        outcome: parse_outcome(&outcome)?,
    })
}

impl Database {
    pub async fn insert_ring_session(&self, session: &RingSession) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO ring_sessions (id, alarm_id, label, started_at, ended_at, outcome)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.alarm_id,
                    record.label,
                    record.started_at.to_rfc3339(),
                    record.ended_at.map(|dt| dt.to_rfc3339()),
                    record.outcome.as_str(),
                ],
            )
            .with_context(|| "failed to insert ring session")?;
            Ok(())
        })
        .await
    }

    pub async fn finish_ring_session(
        &self,
        session_id: &str,
        outcome: RingOutcome,
        ended_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE ring_sessions
                 SET outcome = ?1,
                     ended_at = ?2
                 WHERE id = ?3",
                params![outcome.as_str(), ended_at.to_rfc3339(), session_id],
            )
            .with_context(|| "failed to finish ring session")?;
            Ok(())
        })
        .await
    }

    /// Close sessions left ringing by a previous run. Returns how many were closed.
    pub async fn interrupt_open_ring_sessions(&self, ended_at: DateTime<Utc>) -> Result<usize> {
        self.execute(move |conn| {
            let closed = conn
                .execute(
                    "UPDATE ring_sessions
                     SET outcome = ?1,
                         ended_at = ?2
                     WHERE outcome = ?3",
                    params![
                        RingOutcome::Interrupted.as_str(),
                        ended_at.to_rfc3339(),
                        RingOutcome::Firing.as_str(),
                    ],
                )
                .with_context(|| "failed to interrupt open ring sessions")?;
            Ok(closed)
        })
        .await
    }

    pub async fn recent_ring_sessions(&self, limit: u32) -> Result<Vec<RingSession>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, alarm_id, label, started_at, ended_at, outcome
                 FROM ring_sessions
                 ORDER BY started_at DESC
                 LIMIT ?1",
            )?;
            let mut rows = stmt.query(params![limit])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_ring_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }
}
