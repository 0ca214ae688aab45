use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::alarm::trigger::FiredAlarm;
use crate::db::RingOutcome;
use crate::error::{AlarmError, AlarmResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum RingerStatus {
    #[default]
    Idle,
    Firing,
}

/// What a ringing session needs to know about the alarm that started it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RingRequest {
    pub alarm_id: i64,
    pub label: String,
    pub vibrate: bool,
    pub can_snooze: bool,
}

impl From<FiredAlarm> for RingRequest {
    fn from(fired: FiredAlarm) -> Self {
        Self {
            alarm_id: fired.alarm_id,
            label: fired.label,
            vibrate: fired.vibrate,
            can_snooze: fired.can_snooze,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RingerCommand {
    Start(RingRequest),
    Stop,
    Snooze,
}

/// Outcome of applying a command to the current state.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Begin(RingRequest),
    /// End the current session as `Replaced`, then begin the new one.
    Replace(RingRequest),
    End(RingOutcome),
    Noop,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RingerState {
    pub status: RingerStatus,
    pub session_id: Option<String>,
    pub alarm_id: Option<i64>,
    pub label: Option<String>,
    pub vibrate: bool,
    pub can_snooze: bool,
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub firing_anchor: Option<Instant>,
}

impl RingerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_firing(&self) -> bool {
        self.status == RingerStatus::Firing
    }

    pub fn elapsed(&self) -> Duration {
        match (self.status, self.firing_anchor) {
            (RingerStatus::Firing, Some(anchor)) => anchor.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub fn plan(&self, command: &RingerCommand) -> AlarmResult<Transition> {
        match (command, self.status) {
            (RingerCommand::Start(request), RingerStatus::Idle) => {
                Ok(Transition::Begin(request.clone()))
            }
            (RingerCommand::Start(request), RingerStatus::Firing) => {
                Ok(Transition::Replace(request.clone()))
            }
            (RingerCommand::Stop, RingerStatus::Firing) => {
                Ok(Transition::End(RingOutcome::Dismissed))
            }
            (RingerCommand::Stop, RingerStatus::Idle) => Ok(Transition::Noop),
            (RingerCommand::Snooze, RingerStatus::Firing) => {
                if self.can_snooze {
                    Ok(Transition::End(RingOutcome::Snoozed))
                } else {
                    Err(AlarmError::SnoozeDisabled(self.alarm_id.unwrap_or_default()))
                }
            }
            (RingerCommand::Snooze, RingerStatus::Idle) => Err(AlarmError::NotRinging),
        }
    }

    pub fn begin_session(
        &mut self,
        session_id: String,
        request: &RingRequest,
        started_at: DateTime<Utc>,
        now: Instant,
    ) {
        *self = Self {
            status: RingerStatus::Firing,
            session_id: Some(session_id),
            alarm_id: Some(request.alarm_id),
            label: Some(request.label.clone()),
            vibrate: request.vibrate,
            can_snooze: request.can_snooze,
            started_at: Some(started_at),
            firing_anchor: Some(now),
        };
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
