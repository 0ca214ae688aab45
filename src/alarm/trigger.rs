//! Validation of wake-up deliveries.
//!
//! A delivery arrives as a loosely-typed [`TriggerIntent`]; nothing acts on it
//! until [`TriggerIntent::validate`] has turned it into a [`TriggerEvent`].

use serde::{Deserialize, Serialize};

use crate::alarm::backend::{WakeupKey, WakeupKind};
use crate::db::models::DEFAULT_LABEL;
use crate::error::{AlarmError, AlarmResult};

pub const ACTION_ALARM_TRIGGERED: &str = "ALARM_TRIGGERED";
pub const ACTION_BOOT_COMPLETED: &str = "BOOT_COMPLETED";

const MAX_LABEL_CHARS: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerIntent {
    pub action: Option<String>,
    pub alarm_id: Option<i64>,
    pub kind: Option<WakeupKind>,
    pub label: Option<String>,
    pub vibrate: Option<bool>,
    pub snooze: Option<bool>,
}

impl TriggerIntent {
    pub fn alarm(key: WakeupKey, label: &str, vibrate: bool, snooze: bool) -> Self {
        Self {
            action: Some(ACTION_ALARM_TRIGGERED.to_string()),
            alarm_id: Some(key.alarm_id),
            kind: Some(key.kind),
            label: Some(label.to_string()),
            vibrate: Some(vibrate),
            snooze: Some(snooze),
        }
    }

    pub fn boot_completed() -> Self {
        Self {
            action: Some(ACTION_BOOT_COMPLETED.to_string()),
            ..Self::default()
        }
    }

    /// Decode a raw JSON delivery. Undecodable payloads are malformed events.
    pub fn from_json(payload: &str) -> AlarmResult<Self> {
        serde_json::from_str(payload)
            .map_err(|err| AlarmError::MalformedTriggerEvent(format!("undecodable payload: {err}")))
    }

    pub fn validate(self) -> AlarmResult<TriggerEvent> {
        match self.action.as_deref() {
            Some(ACTION_BOOT_COMPLETED) => Ok(TriggerEvent::BootCompleted),
            Some(ACTION_ALARM_TRIGGERED) => {
                let alarm_id = self
                    .alarm_id
                    .ok_or_else(|| AlarmError::MalformedTriggerEvent("missing alarm id".into()))?;
                if alarm_id <= 0 {
                    return Err(AlarmError::MalformedTriggerEvent(format!(
                        "invalid alarm id {alarm_id}"
                    )));
                }

                Ok(TriggerEvent::Fired(FiredAlarm {
                    alarm_id,
                    kind: self.kind.unwrap_or(WakeupKind::Daily),
                    label: sanitize_label(self.label.as_deref()),
                    vibrate: self.vibrate.unwrap_or(true),
                    can_snooze: self.snooze.unwrap_or(true),
                }))
            }
            Some(other) => Err(AlarmError::MalformedTriggerEvent(format!(
                "unexpected action '{other}'"
            ))),
            None => Err(AlarmError::MalformedTriggerEvent("missing action".into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FiredAlarm {
    pub alarm_id: i64,
    pub kind: WakeupKind,
    pub label: String,
    pub vibrate: bool,
    pub can_snooze: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerEvent {
    Fired(FiredAlarm),
    BootCompleted,
}

/// Labels longer than 50 characters are not trusted and fall back to the
/// default; control whitespace is flattened to spaces.
pub fn sanitize_label(label: Option<&str>) -> String {
    let cleaned = label
        .filter(|raw| raw.chars().count() <= MAX_LABEL_CHARS)
        .map(|raw| raw.replace(['\n', '\r', '\t'], " ").trim().to_string())
        .unwrap_or_default();

    if cleaned.is_empty() {
        DEFAULT_LABEL.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduled_intent_validates_into_fired_alarm() {
        let intent = TriggerIntent::alarm(WakeupKey::snooze(7), "Gym", false, true);
        let event = intent.validate().expect("valid intent");
        assert_eq!(
            event,
            TriggerEvent::Fired(FiredAlarm {
                alarm_id: 7,
                kind: WakeupKind::Snooze,
                label: "Gym".into(),
                vibrate: false,
                can_snooze: true,
            })
        );
    }

    #[test]
    fn missing_id_is_malformed() {
        let intent = TriggerIntent {
            action: Some(ACTION_ALARM_TRIGGERED.into()),
            label: Some("Wake".into()),
            ..TriggerIntent::default()
        };
        assert!(matches!(
            intent.validate(),
            Err(AlarmError::MalformedTriggerEvent(_))
        ));
    }

    #[test]
    fn foreign_or_missing_action_is_malformed() {
        let foreign = TriggerIntent {
            action: Some("SOMETHING_ELSE".into()),
            alarm_id: Some(1),
            ..TriggerIntent::default()
        };
        assert!(matches!(
            foreign.validate(),
            Err(AlarmError::MalformedTriggerEvent(_))
        ));
        assert!(matches!(
            TriggerIntent::default().validate(),
            Err(AlarmError::MalformedTriggerEvent(_))
        ));

        let negative = TriggerIntent {
            action: Some(ACTION_ALARM_TRIGGERED.into()),
            alarm_id: Some(-1),
            ..TriggerIntent::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(AlarmError::MalformedTriggerEvent(_))
        ));
    }

    #[test]
    fn missing_flags_default_to_enabled() {
        let intent = TriggerIntent::from_json(r#"{ "action": "ALARM_TRIGGERED", "alarmId": 4 }"#)
            .expect("decodes");
        match intent.validate().expect("valid") {
            TriggerEvent::Fired(fired) => {
                assert_eq!(fired.kind, WakeupKind::Daily);
                assert_eq!(fired.label, DEFAULT_LABEL);
                assert!(fired.vibrate);
                assert!(fired.can_snooze);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn garbage_payload_is_malformed() {
        assert!(matches!(
            TriggerIntent::from_json("{ nope"),
            Err(AlarmError::MalformedTriggerEvent(_))
        ));
    }

    #[test]
    fn boot_intent_needs_no_id() {
        assert_eq!(
            TriggerIntent::boot_completed().validate().expect("valid"),
            TriggerEvent::BootCompleted
        );
    }

    #[test]
    fn labels_are_sanitized() {
        assert_eq!(sanitize_label(Some("  Take\tpills\n ")), "Take pills");
        assert_eq!(sanitize_label(Some(&"x".repeat(51))), DEFAULT_LABEL);
        assert_eq!(sanitize_label(Some(&"x".repeat(50))), "x".repeat(50));
        assert_eq!(sanitize_label(Some("\n\r")), DEFAULT_LABEL);
        assert_eq!(sanitize_label(None), DEFAULT_LABEL);
    }
}
