pub mod backend;
pub mod next_fire;
pub mod scheduler;
pub mod service;
pub mod trigger;

pub use backend::{PendingWakeup, TokioWakeupBackend, WakeupBackend, WakeupKey, WakeupKind};
pub use next_fire::{next_fire_time, next_fire_time_local};
pub use scheduler::{AlarmScheduler, SNOOZE_MINUTES};
pub use service::AlarmService;
pub use trigger::{FiredAlarm, TriggerEvent, TriggerIntent};
