use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a ringing occurrence ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RingOutcome {
    Firing,
    Dismissed,
    Snoozed,
    TimedOut,
    Replaced,
    /// The daemon stopped while the session was still ringing.
    Interrupted,
}

impl RingOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RingOutcome::Firing => "Firing",
            RingOutcome::Dismissed => "Dismissed",
            RingOutcome::Snoozed => "Snoozed",
            RingOutcome::TimedOut => "TimedOut",
            RingOutcome::Replaced => "Replaced",
            RingOutcome::Interrupted => "Interrupted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RingSession {
    pub id: String,
    pub alarm_id: i64,
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub outcome: RingOutcome,
}
