use log::info;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AlertAction {
    Dismiss,
    Snooze,
}

/// Persistent, maximum-priority alert shown while an alarm rings.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertNotification {
    pub alarm_id: i64,
    pub title: String,
    pub body: String,
    pub actions: Vec<AlertAction>,
    pub ongoing: bool,
    pub full_screen: bool,
}

impl AlertNotification {
    pub fn ringing(alarm_id: i64, label: &str, can_snooze: bool) -> Self {
        let mut actions = vec![AlertAction::Dismiss];
        if can_snooze {
            actions.push(AlertAction::Snooze);
        }
        Self {
            alarm_id,
            title: "Alarm".to_string(),
            body: label.to_string(),
            actions,
            ongoing: true,
            full_screen: true,
        }
    }
}

/// Where the ringing alert is presented to the user.
pub trait AlertSurface: Send + Sync {
    fn show(&self, alert: &AlertNotification);

    fn update(&self, alarm_id: i64, text: &str);

    fn dismiss(&self, alarm_id: i64);
}

/// Headless surface that reports the alert through the log.
pub struct LogAlertSurface;

impl AlertSurface for LogAlertSurface {
    fn show(&self, alert: &AlertNotification) {
        let payload = serde_json::to_string(alert).unwrap_or_else(|_| alert.body.clone());
        info!("Alert shown: {payload}");
    }

    fn update(&self, alarm_id: i64, text: &str) {
        log::debug!("Alert {alarm_id}: {text}");
    }

    fn dismiss(&self, alarm_id: i64) {
        info!("Alert {alarm_id} dismissed");
    }
}
