use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};

use crate::alarm::trigger::TriggerIntent;
use crate::error::{AlarmError, AlarmResult};

/// Upper bound on a single sleep, so wall-clock jumps and suspends are
/// noticed within this delay.
const MAX_SLEEP_SLICE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WakeupKind {
    Daily,
    Snooze,
}

/// Routing key of a wake-up registration. Daily and snooze registrations of
/// the same alarm live side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WakeupKey {
    pub alarm_id: i64,
    pub kind: WakeupKind,
}

impl WakeupKey {
    pub fn daily(alarm_id: i64) -> Self {
        Self {
            alarm_id,
            kind: WakeupKind::Daily,
        }
    }

    pub fn snooze(alarm_id: i64) -> Self {
        Self {
            alarm_id,
            kind: WakeupKind::Snooze,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingWakeup {
    pub key: WakeupKey,
    pub fire_at: DateTime<Utc>,
}

/// Table of exact wake-ups, keyed by [`WakeupKey`].
///
/// Registering an existing key replaces the previous registration; once
/// `unregister` returns, the removed registration never delivers.
pub trait WakeupBackend: Send + Sync {
    fn can_schedule_exact(&self) -> bool;

    fn register(&self, key: WakeupKey, fire_at: DateTime<Utc>, intent: TriggerIntent)
        -> AlarmResult<()>;

    /// Returns whether a registration was removed.
    fn unregister(&self, key: WakeupKey) -> bool;

    fn pending(&self) -> Vec<PendingWakeup>;
}

struct Registration {
    generation: u64,
    fire_at: DateTime<Utc>,
    intent: TriggerIntent,
    task: JoinHandle<()>,
}

type RegistrationTable = Arc<Mutex<HashMap<WakeupKey, Registration>>>;

fn lock_table(table: &Mutex<HashMap<WakeupKey, Registration>>) -> MutexGuard<'_, HashMap<WakeupKey, Registration>> {
    match table.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-process wake-up table: one tokio timer task per registration, with
/// deliveries sent to the receiver returned by [`TokioWakeupBackend::new`].
pub struct TokioWakeupBackend {
    runtime: Handle,
    table: RegistrationTable,
    deliveries: mpsc::UnboundedSender<TriggerIntent>,
    exact_permitted: AtomicBool,
    next_generation: AtomicU64,
}

impl TokioWakeupBackend {
    pub fn new(
        runtime: Handle,
        exact_permitted: bool,
    ) -> (Self, mpsc::UnboundedReceiver<TriggerIntent>) {
        let (deliveries, receiver) = mpsc::unbounded_channel();
        let backend = Self {
            runtime,
            table: Arc::new(Mutex::new(HashMap::new())),
            deliveries,
            exact_permitted: AtomicBool::new(exact_permitted),
            next_generation: AtomicU64::new(1),
        };
        (backend, receiver)
    }

    pub fn set_exact_permitted(&self, permitted: bool) {
        self.exact_permitted.store(permitted, Ordering::SeqCst);
    }

    /// Drop every registration without delivering it.
    pub fn shutdown(&self) {
        let mut table = lock_table(&self.table);
        for (_, registration) in table.drain() {
            registration.task.abort();
        }
    }
}

impl WakeupBackend for TokioWakeupBackend {
    fn can_schedule_exact(&self) -> bool {
        self.exact_permitted.load(Ordering::SeqCst)
    }

    fn register(
        &self,
        key: WakeupKey,
        fire_at: DateTime<Utc>,
        intent: TriggerIntent,
    ) -> AlarmResult<()> {
        if !self.can_schedule_exact() {
            return Err(AlarmError::PermissionDenied);
        }

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let mut table = lock_table(&self.table);

        let task = self.runtime.spawn(deliver_when_due(
            Arc::clone(&self.table),
            key,
            generation,
            fire_at,
            self.deliveries.clone(),
        ));

        let replaced = table.insert(
            key,
            Registration {
                generation,
                fire_at,
                intent,
                task,
            },
        );
        if let Some(previous) = replaced {
            previous.task.abort();
            debug!("Replaced wake-up {key:?} (was due {})", previous.fire_at);
        }
        Ok(())
    }

    fn unregister(&self, key: WakeupKey) -> bool {
        let removed = lock_table(&self.table).remove(&key);
        match removed {
            Some(registration) => {
                registration.task.abort();
                true
            }
            None => false,
        }
    }

    fn pending(&self) -> Vec<PendingWakeup> {
        let mut pending: Vec<PendingWakeup> = lock_table(&self.table)
            .iter()
            .map(|(key, registration)| PendingWakeup {
                key: *key,
                fire_at: registration.fire_at,
            })
            .collect();
        pending.sort_by_key(|wakeup| wakeup.fire_at);
        pending
    }
}

impl Drop for TokioWakeupBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn deliver_when_due(
    table: RegistrationTable,
    key: WakeupKey,
    generation: u64,
    fire_at: DateTime<Utc>,
    deliveries: mpsc::UnboundedSender<TriggerIntent>,
) {
    loop {
        let remaining = match (fire_at - Utc::now()).to_std() {
            Ok(remaining) if !remaining.is_zero() => remaining,
            _ => break,
        };
        tokio::time::sleep(remaining.min(MAX_SLEEP_SLICE)).await;
    }

    // Delivery happens under the table lock so that a concurrent cancel or
    // replace either wins outright or observes the entry already gone.
    let mut table = lock_table(&table);
    let is_current = table
        .get(&key)
        .map(|registration| registration.generation == generation)
        .unwrap_or(false);
    if !is_current {
        return;
    }

    if let Some(registration) = table.remove(&key) {
        debug!("Delivering wake-up {key:?} due {}", registration.fire_at);
        if deliveries.send(registration.intent).is_err() {
            warn!("Wake-up {key:?} fired but no dispatcher is listening");
        }
    }
}
