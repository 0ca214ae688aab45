pub mod alarm;
pub mod clock;
pub mod db;
pub mod error;
pub mod ringer;
pub mod settings;

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use log::{debug, info, warn};
use tokio::{runtime::Handle, time};

use alarm::{AlarmScheduler, AlarmService, TokioWakeupBackend, TriggerIntent};
use clock::SystemClock;
use db::Database;
use ringer::{
    audio::AudioEngineHandle,
    feedback::{HapticChannel, NoHapticDevice},
    surface::LogAlertSurface,
    Ringer, RingerConfig,
};
use settings::Settings;

pub use db::{AlarmDraft, AlarmRecord, RingOutcome, RingSession};
pub use error::{AlarmError, AlarmResult, FeedbackKind};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

fn debug_mode() -> bool {
    std::env::var("ALARMD_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Entry point of the daemon: load settings, then serve wake-ups until Ctrl-C.
pub fn run() -> anyhow::Result<()> {
    // Reads RUST_LOG on top of the info default.
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("alarmd starting up...");

    let settings_path = Settings::default_path();
    let settings = Settings::load(&settings_path)?;
    debug!("Loaded settings from {}", settings_path.display());

    // Opening waits on the worker thread's migrations; keep that off the runtime.
    let database = Database::new(settings.database_path.clone())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("alarmd-worker")
        .build()?;

    runtime.block_on(serve(settings, database))
}

async fn serve(settings: Settings, database: Database) -> anyhow::Result<()> {
    // Close ring sessions left open by a crash.
    let interrupted = database.interrupt_open_ring_sessions(Utc::now()).await?;
    if interrupted > 0 {
        warn!("Recovered {interrupted} ring session(s) left open; marked as Interrupted");
    }

    let (backend, mut deliveries) =
        TokioWakeupBackend::new(Handle::current(), settings.exact_alarms_permitted);
    let backend = Arc::new(backend);
    if !settings.exact_alarms_permitted {
        warn!("Exact alarms are not permitted; alarms cannot be switched on");
    }

    let scheduler = Arc::new(AlarmScheduler::new(backend.clone(), Arc::new(SystemClock)));
    let ringer = Ringer::new(
        database.clone(),
        scheduler.clone(),
        Arc::new(AudioEngineHandle::new(settings.tone_hz, settings.ring_volume)),
        Arc::new(HapticChannel::new(NoHapticDevice)),
        Arc::new(LogAlertSurface),
        RingerConfig {
            auto_stop: settings.auto_stop(),
            refresh_interval: settings.refresh_interval(),
        },
    );
    let service = AlarmService::new(database, scheduler.clone(), ringer);

    service.handle_trigger(TriggerIntent::boot_completed()).await;

    let debug = debug_mode();
    let mut heartbeat = time::interval(HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            delivery = deliveries.recv() => match delivery {
                Some(intent) => service.handle_trigger(intent).await,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            _ = heartbeat.tick(), if debug => {
                for wakeup in scheduler.pending() {
                    debug!(
                        "Pending {:?} wake-up for alarm {} at {}",
                        wakeup.key.kind, wakeup.key.alarm_id, wakeup.fire_at
                    );
                }
                info!("Heartbeat: {} pending wake-up(s)", scheduler.pending().len());
            }
        }
    }

    if let Err(err) = service.stop_ringing().await {
        warn!("Failed to stop ringing on shutdown: {err}");
    }
    backend.shutdown();
    info!("alarmd stopped");
    Ok(())
}
