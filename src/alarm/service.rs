//! The operations a user (or the wake-up dispatcher) performs on alarms.
//!
//! Every mutation leaves the store and the wake-up table agreeing: an alarm is
//! active exactly when a daily wake-up is registered for it.

use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::Mutex;

use crate::alarm::backend::WakeupKind;
use crate::alarm::scheduler::AlarmScheduler;
use crate::alarm::trigger::{FiredAlarm, TriggerEvent, TriggerIntent};
use crate::db::{AlarmDraft, AlarmRecord, Database};
use crate::error::{AlarmError, AlarmResult};
use crate::ringer::{RingRequest, Ringer, RingerSnapshot};

#[derive(Clone)]
pub struct AlarmService {
    db: Database,
    scheduler: Arc<AlarmScheduler>,
    ringer: Ringer,
    // Held across read, schedule and write so a fire never re-arms from a
    // record that a concurrent toggle already switched off.
    mutation: Arc<Mutex<()>>,
}

impl AlarmService {
    pub fn new(db: Database, scheduler: Arc<AlarmScheduler>, ringer: Ringer) -> Self {
        Self {
            db,
            scheduler,
            ringer,
            mutation: Arc::new(Mutex::new(())),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn scheduler(&self) -> &AlarmScheduler {
        &self.scheduler
    }

    pub fn ringer(&self) -> &Ringer {
        &self.ringer
    }

    /// Save a new alarm and switch it on.
    pub async fn create_alarm(&self, draft: AlarmDraft) -> AlarmResult<AlarmRecord> {
        let _guard = self.mutation.lock().await;
        let record = self.db.insert_alarm(draft, false).await?;
        self.arm(record).await
    }

    pub async fn set_active(&self, alarm_id: i64, active: bool) -> AlarmResult<AlarmRecord> {
        let _guard = self.mutation.lock().await;
        let mut record = self
            .db
            .get_alarm(alarm_id)
            .await?
            .ok_or(AlarmError::RecordNotFound(alarm_id))?;

        if active {
            return self.arm(record).await;
        }

        self.scheduler.cancel(&record);
        record.is_active = false;
        self.db
            .update_alarm(&record)
            .await?
            .ok_or(AlarmError::RecordNotFound(alarm_id))
    }

    /// Replace the editable fields of an alarm. Saving an edit switches the
    /// alarm on and drops any snooze still pending from the old settings.
    pub async fn edit_alarm(&self, alarm_id: i64, draft: AlarmDraft) -> AlarmResult<AlarmRecord> {
        let _guard = self.mutation.lock().await;
        let mut record = self
            .db
            .get_alarm(alarm_id)
            .await?
            .ok_or(AlarmError::RecordNotFound(alarm_id))?;

        record.apply(&draft);
        self.scheduler.cancel_snooze(alarm_id);
        self.arm(record).await
    }

    /// Cancel every wake-up of the alarm, then remove it. Returns whether a
    /// record existed.
    pub async fn delete_alarm(&self, alarm_id: i64) -> AlarmResult<bool> {
        let _guard = self.mutation.lock().await;
        self.scheduler.cancel_id(alarm_id);
        let removed = self.db.delete_alarm(alarm_id).await?;
        if removed {
            info!("Alarm {alarm_id} deleted");
        }
        Ok(removed)
    }

    /// Re-register every active alarm, e.g. after a restart. Returns how many
    /// were scheduled. Alarms that cannot be scheduled are switched off.
    pub async fn reschedule_all(&self) -> AlarmResult<usize> {
        let _guard = self.mutation.lock().await;
        let alarms = self.db.list_alarms().await?;
        let mut scheduled = 0;

        for alarm in alarms.into_iter().filter(|alarm| alarm.is_active) {
            match self.scheduler.schedule(&alarm) {
                Ok(_) => scheduled += 1,
                Err(err) => {
                    let alarm_id = alarm.id;
                    if let Err(persist_err) = self.disarm(alarm, &err).await {
                        error!("Failed to switch off alarm {alarm_id}: {persist_err}");
                    }
                }
            }
        }

        info!("Rescheduled {scheduled} active alarm(s)");
        Ok(scheduled)
    }

    pub async fn stop_ringing(&self) -> AlarmResult<RingerSnapshot> {
        self.ringer.stop().await
    }

    pub async fn snooze_ringing(&self) -> AlarmResult<RingerSnapshot> {
        self.ringer.snooze().await
    }

    /// Act on one wake-up delivery. Malformed deliveries are logged and
    /// dropped.
    pub async fn handle_trigger(&self, intent: TriggerIntent) {
        match intent.validate() {
            Ok(TriggerEvent::BootCompleted) => {
                if let Err(err) = self.reschedule_all().await {
                    error!("Failed to restore alarms: {err}");
                }
            }
            Ok(TriggerEvent::Fired(fired)) => self.on_fired(fired).await,
            Err(err) => warn!("Dropping wake-up: {err}"),
        }
    }

    async fn on_fired(&self, fired: FiredAlarm) {
        let alarm_id = fired.alarm_id;

        {
            let _guard = self.mutation.lock().await;
            match self.db.get_alarm(alarm_id).await {
                Ok(None) => {
                    info!("Alarm {alarm_id} fired after it was deleted; ignoring");
                    return;
                }
                Ok(Some(record)) => {
                    if fired.kind == WakeupKind::Daily {
                        if !record.is_active {
                            info!("Alarm {alarm_id} fired while switched off; ignoring");
                            return;
                        }

                        self.scheduler.cancel_snooze(alarm_id);
                        if let Err(err) = self.scheduler.schedule(&record) {
                            if let Err(persist_err) = self.disarm(record, &err).await {
                                error!("Failed to switch off alarm {alarm_id}: {persist_err}");
                            }
                        }
                    }
                }
                // Ring anyway with what the wake-up carried.
                Err(err) => error!("Failed to load fired alarm {alarm_id}: {err:#}"),
            }
        }

        if let Err(err) = self.ringer.start(RingRequest::from(fired)).await {
            error!("Failed to start ringing for alarm {alarm_id}: {err}");
        }
    }

    /// Caller holds `mutation`.
    async fn arm(&self, record: AlarmRecord) -> AlarmResult<AlarmRecord> {
        let alarm_id = record.id;

        if let Err(err) = self.scheduler.schedule(&record) {
            self.disarm(record, &err).await?;
            return Err(err);
        }

        let mut record = record;
        record.is_active = true;
        match self.db.update_alarm(&record).await {
            Ok(Some(stored)) => Ok(stored),
            Ok(None) => {
                self.scheduler.cancel_id(alarm_id);
                Err(AlarmError::RecordNotFound(alarm_id))
            }
            Err(err) => {
                self.scheduler.cancel_id(alarm_id);
                Err(err.into())
            }
        }
    }

    /// Drop every registration of an alarm that could not be scheduled and
    /// persist it as switched off. Caller holds `mutation`.
    async fn disarm(&self, mut record: AlarmRecord, cause: &AlarmError) -> AlarmResult<()> {
        warn!("Alarm {} switched off: {cause}", record.id);
        self.scheduler.cancel(&record);
        record.is_active = false;
        self.db.update_alarm(&record).await?;
        Ok(())
    }
}
