//! Alarm definitions as stored in the `alarms` table.

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AlarmError, AlarmResult};

pub const DEFAULT_LABEL: &str = "Alarm";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmRecord {
    pub id: i64,
    pub time_of_day: NaiveTime,
    pub label: String,
    pub tag: Option<String>,
    pub color_argb: u32,
    pub is_active: bool,
    pub is_snooze_enabled: bool,
    pub is_vibration_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlarmRecord {
    /// Apply the user-editable fields of `draft`, keeping identity and activity.
    pub fn apply(&mut self, draft: &AlarmDraft) {
        self.time_of_day = draft.time_of_day;
        self.label = normalize_label(&draft.label);
        self.tag = normalize_tag(draft.tag.as_deref());
        self.color_argb = draft.color_argb;
        self.is_snooze_enabled = draft.is_snooze_enabled;
        self.is_vibration_enabled = draft.is_vibration_enabled;
    }
}

/// User input for creating or editing an alarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmDraft {
    pub time_of_day: NaiveTime,
    pub label: String,
    pub tag: Option<String>,
    pub color_argb: u32,
    pub is_snooze_enabled: bool,
    pub is_vibration_enabled: bool,
}

impl AlarmDraft {
    pub fn at(hour: u32, minute: u32) -> AlarmResult<Self> {
        let time_of_day = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| AlarmError::InvalidTimeOfDay(format!("{hour:02}:{minute:02}")))?;
        Ok(Self {
            time_of_day,
            label: String::new(),
            tag: None,
            color_argb: 0xFF6750A4,
            is_snooze_enabled: true,
            is_vibration_enabled: true,
        })
    }

    /// Parse `HH:MM` as typed by a user.
    pub fn parse(time: &str) -> AlarmResult<Self> {
        let parsed = NaiveTime::parse_from_str(time.trim(), "%H:%M")
            .map_err(|_| AlarmError::InvalidTimeOfDay(time.to_string()))?;
        Self::at(parsed.hour(), parsed.minute())
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_snooze(mut self, enabled: bool) -> Self {
        self.is_snooze_enabled = enabled;
        self
    }

    pub fn with_vibration(mut self, enabled: bool) -> Self {
        self.is_vibration_enabled = enabled;
        self
    }
}

pub fn normalize_label(label: &str) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        DEFAULT_LABEL.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn normalize_tag(tag: Option<&str>) -> Option<String> {
    tag.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
