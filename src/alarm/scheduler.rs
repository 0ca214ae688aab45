use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use log::{debug, info};

use crate::alarm::backend::{PendingWakeup, WakeupBackend, WakeupKey};
use crate::alarm::next_fire::next_fire_time_local;
use crate::alarm::trigger::TriggerIntent;
use crate::clock::Clock;
use crate::db::AlarmRecord;
use crate::error::{AlarmError, AlarmResult};

pub const SNOOZE_MINUTES: i64 = 10;

pub fn snooze_interval() -> Duration {
    Duration::minutes(SNOOZE_MINUTES)
}

/// Gateway between alarm records and the wake-up backend. Every alarm holds
/// at most one daily registration and at most one snooze registration.
pub struct AlarmScheduler {
    backend: Arc<dyn WakeupBackend>,
    clock: Arc<dyn Clock>,
}

impl AlarmScheduler {
    pub fn new(backend: Arc<dyn WakeupBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    pub fn exact_alarms_permitted(&self) -> bool {
        self.backend.can_schedule_exact()
    }

    /// Register the next daily occurrence of `alarm`, replacing any earlier
    /// daily registration. Returns the local fire time.
    pub fn schedule(&self, alarm: &AlarmRecord) -> AlarmResult<DateTime<Local>> {
        if !self.backend.can_schedule_exact() {
            return Err(AlarmError::PermissionDenied);
        }

        let now = self.clock.now();
        let fire_at = next_fire_time_local(alarm.time_of_day, &now);
        let key = WakeupKey::daily(alarm.id);
        let intent = TriggerIntent::alarm(
            key,
            &alarm.label,
            alarm.is_vibration_enabled,
            alarm.is_snooze_enabled,
        );

        self.backend
            .register(key, fire_at.with_timezone(&Utc), intent)?;
        info!(
            "Alarm {} set for {}",
            alarm.id,
            fire_at.format("%Y-%m-%d %H:%M")
        );
        Ok(fire_at)
    }

    /// Drop both the daily and the snooze registration of `alarm`.
    pub fn cancel(&self, alarm: &AlarmRecord) {
        self.cancel_id(alarm.id);
    }

    pub fn cancel_id(&self, alarm_id: i64) {
        let daily = self.backend.unregister(WakeupKey::daily(alarm_id));
        let snooze = self.backend.unregister(WakeupKey::snooze(alarm_id));
        if daily || snooze {
            info!("Alarm {alarm_id} cancelled");
        }
    }

    pub fn cancel_snooze(&self, alarm_id: i64) -> bool {
        let removed = self.backend.unregister(WakeupKey::snooze(alarm_id));
        if removed {
            debug!("Pending snooze for alarm {alarm_id} dropped");
        }
        removed
    }

    /// Register a one-shot re-ring ten minutes from now. The re-ring may be
    /// snoozed again.
    pub fn schedule_snooze(
        &self,
        alarm_id: i64,
        label: &str,
        vibrate: bool,
    ) -> AlarmResult<DateTime<Local>> {
        if !self.backend.can_schedule_exact() {
            return Err(AlarmError::PermissionDenied);
        }

        let fire_at = self.clock.now() + snooze_interval();
        let key = WakeupKey::snooze(alarm_id);
        let intent = TriggerIntent::alarm(key, label, vibrate, true);

        self.backend
            .register(key, fire_at.with_timezone(&Utc), intent)?;
        info!(
            "Alarm {alarm_id} snoozed until {}",
            fire_at.format("%H:%M")
        );
        Ok(fire_at)
    }

    pub fn is_scheduled(&self, alarm_id: i64) -> bool {
        self.backend
            .pending()
            .iter()
            .any(|wakeup| wakeup.key.alarm_id == alarm_id)
    }

    pub fn pending(&self) -> Vec<PendingWakeup> {
        self.backend.pending()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, TimeZone, Timelike};
    use tokio::runtime::Handle;

    use super::*;
    use crate::alarm::backend::{TokioWakeupBackend, WakeupKind};
    use crate::clock::ManualClock;

    fn record(id: i64, hour: u32, minute: u32) -> AlarmRecord {
        AlarmRecord {
            id,
            time_of_day: NaiveTime::from_hms_opt(hour, minute, 0).expect("time"),
            label: "Wake up".into(),
            tag: None,
            color_argb: 0xFF6750A4,
            is_active: true,
            is_snooze_enabled: true,
            is_vibration_enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    // Far enough ahead that no registration becomes due while a test runs.
    fn clock_at(hour: u32, minute: u32) -> ManualClock {
        ManualClock::new(
            Local
                .with_ymd_and_hms(2030, 6, 12, hour, minute, 0)
                .single()
                .expect("valid local time"),
        )
    }

    fn scheduler(clock: &ManualClock, permitted: bool) -> (AlarmScheduler, Arc<TokioWakeupBackend>) {
        let (backend, _deliveries) = TokioWakeupBackend::new(Handle::current(), permitted);
        let backend = Arc::new(backend);
        let scheduler = AlarmScheduler::new(backend.clone(), Arc::new(clock.clone()));
        (scheduler, backend)
    }

    #[tokio::test]
    async fn schedule_registers_next_occurrence() {
        let clock = clock_at(8, 0);
        let (scheduler, _backend) = scheduler(&clock, true);

        let fire_at = scheduler.schedule(&record(1, 7, 30)).expect("schedule");
        assert_eq!(fire_at.date_naive(), clock.now().date_naive().succ_opt().expect("tomorrow"));
        assert_eq!((fire_at.hour(), fire_at.minute()), (7, 30));

        let pending = scheduler.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key, WakeupKey::daily(1));
        assert_eq!(pending[0].fire_at, fire_at.with_timezone(&Utc));
        assert!(scheduler.is_scheduled(1));
    }

    #[tokio::test]
    async fn rescheduling_replaces_the_daily_registration() {
        let clock = clock_at(6, 0);
        let (scheduler, _backend) = scheduler(&clock, true);

        scheduler.schedule(&record(2, 7, 0)).expect("first");
        scheduler.schedule(&record(2, 9, 15)).expect("second");

        let pending = scheduler.pending();
        assert_eq!(pending.len(), 1);
        let fire_at = pending[0].fire_at.with_timezone(&Local);
        assert_eq!((fire_at.hour(), fire_at.minute()), (9, 15));
    }

    #[tokio::test]
    async fn cancel_clears_daily_and_snooze() {
        let clock = clock_at(6, 0);
        let (scheduler, _backend) = scheduler(&clock, true);
        let alarm = record(3, 7, 0);

        scheduler.schedule(&alarm).expect("schedule");
        scheduler
            .schedule_snooze(alarm.id, &alarm.label, true)
            .expect("snooze");
        assert_eq!(scheduler.pending().len(), 2);

        scheduler.cancel(&alarm);
        assert!(!scheduler.is_scheduled(alarm.id));

        // Cancelling again has nothing left to remove.
        scheduler.cancel(&alarm);
        assert!(scheduler.pending().is_empty());
    }

    #[tokio::test]
    async fn snooze_is_ten_minutes_out_under_its_own_key() {
        let clock = clock_at(7, 30);
        let (scheduler, _backend) = scheduler(&clock, true);

        let fire_at = scheduler
            .schedule_snooze(4, "Wake up", false)
            .expect("snooze");
        assert_eq!(fire_at - clock.now(), Duration::minutes(10));

        let pending = scheduler.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key.kind, WakeupKind::Snooze);

        assert!(scheduler.cancel_snooze(4));
        assert!(!scheduler.cancel_snooze(4));
    }

    #[tokio::test]
    async fn denied_permission_schedules_nothing() {
        let clock = clock_at(6, 0);
        let (scheduler, backend) = scheduler(&clock, false);

        assert!(!scheduler.exact_alarms_permitted());
        assert!(matches!(
            scheduler.schedule(&record(5, 7, 0)),
            Err(AlarmError::PermissionDenied)
        ));
        assert!(matches!(
            scheduler.schedule_snooze(5, "x", true),
            Err(AlarmError::PermissionDenied)
        ));
        assert!(scheduler.pending().is_empty());

        backend.set_exact_permitted(true);
        assert!(scheduler.schedule(&record(5, 7, 0)).is_ok());
    }
}
