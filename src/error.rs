use std::fmt;

use thiserror::Error;

/// Which feedback channel of a ringing session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Sound,
    Haptic,
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackKind::Sound => f.write_str("sound"),
            FeedbackKind::Haptic => f.write_str("haptic"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("exact alarm scheduling permission not granted")]
    PermissionDenied,

    #[error("malformed trigger event: {0}")]
    MalformedTriggerEvent(String),

    #[error("{channel} feedback unavailable: {reason}")]
    FeedbackChannelUnavailable {
        channel: FeedbackKind,
        reason: String,
    },

    #[error("alarm {0} not found")]
    RecordNotFound(i64),

    #[error("snooze is disabled for alarm {0}")]
    SnoozeDisabled(i64),

    #[error("no alarm is currently ringing")]
    NotRinging,

    #[error("invalid time of day '{0}', expected HH:MM")]
    InvalidTimeOfDay(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl AlarmError {
    pub fn feedback(channel: FeedbackKind, reason: impl Into<String>) -> Self {
        AlarmError::FeedbackChannelUnavailable {
            channel,
            reason: reason.into(),
        }
    }
}

pub type AlarmResult<T> = std::result::Result<T, AlarmError>;
