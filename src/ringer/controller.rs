use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use tokio::{
    sync::{Mutex, MutexGuard},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    alarm::scheduler::AlarmScheduler,
    db::{Database, RingOutcome, RingSession},
    error::{AlarmError, AlarmResult},
};

use super::{
    feedback::FeedbackChannel,
    surface::{AlertNotification, AlertSurface},
    RingRequest, RingerCommand, RingerState, Transition,
};

#[derive(Debug, Clone, Copy)]
pub struct RingerConfig {
    pub auto_stop: Duration,
    pub refresh_interval: Duration,
}

impl Default for RingerConfig {
    fn default() -> Self {
        Self {
            auto_stop: Duration::from_secs(10 * 60),
            refresh_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RingerSnapshot {
    pub state: RingerState,
    pub elapsed_ms: u64,
}

struct Ticker {
    token: CancellationToken,
    // Never aborted: the ticker task may itself be ending the session.
    _handle: JoinHandle<()>,
}

/// Owns the single foreground ringing session.
#[derive(Clone)]
pub struct Ringer {
    state: Arc<Mutex<RingerState>>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    sound: Arc<dyn FeedbackChannel>,
    haptics: Arc<dyn FeedbackChannel>,
    surface: Arc<dyn AlertSurface>,
    scheduler: Arc<AlarmScheduler>,
    db: Database,
    config: RingerConfig,
}

impl Ringer {
    pub fn new(
        db: Database,
        scheduler: Arc<AlarmScheduler>,
        sound: Arc<dyn FeedbackChannel>,
        haptics: Arc<dyn FeedbackChannel>,
        surface: Arc<dyn AlertSurface>,
        config: RingerConfig,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(RingerState::new())),
            ticker: Arc::new(Mutex::new(None)),
            sound,
            haptics,
            surface,
            scheduler,
            db,
            config,
        }
    }

    pub async fn snapshot(&self) -> RingerSnapshot {
        let guard = self.state.lock().await;
        snapshot_of(&guard)
    }

    pub async fn start(&self, request: RingRequest) -> AlarmResult<RingerSnapshot> {
        self.dispatch(RingerCommand::Start(request)).await
    }

    pub async fn stop(&self) -> AlarmResult<RingerSnapshot> {
        self.dispatch(RingerCommand::Stop).await
    }

    pub async fn snooze(&self) -> AlarmResult<RingerSnapshot> {
        self.dispatch(RingerCommand::Snooze).await
    }

    /// Apply one command. The state lock is held for the whole transition so
    /// commands never interleave.
    pub async fn dispatch(&self, command: RingerCommand) -> AlarmResult<RingerSnapshot> {
        let mut state = self.state.lock().await;

        match state.plan(&command)? {
            Transition::Begin(request) => {
                self.begin_session(&mut state, request).await;
            }
            Transition::Replace(request) => {
                self.finish_session(&mut state, RingOutcome::Replaced).await;
                self.begin_session(&mut state, request).await;
            }
            Transition::End(RingOutcome::Snoozed) => {
                let alarm_id = state.alarm_id.unwrap_or_default();
                let label = state.label.clone().unwrap_or_default();
                let vibrate = state.vibrate;

                self.finish_session(&mut state, RingOutcome::Snoozed).await;
                self.scheduler.schedule_snooze(alarm_id, &label, vibrate)?;
            }
            Transition::End(outcome) => {
                self.finish_session(&mut state, outcome).await;
            }
            Transition::Noop => {}
        }

        Ok(snapshot_of(&state))
    }

    async fn begin_session(&self, state: &mut MutexGuard<'_, RingerState>, request: RingRequest) {
        let session_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        state.begin_session(session_id.clone(), &request, started_at, Instant::now());
        info!(
            "Alarm {} ringing: \"{}\" (session {session_id})",
            request.alarm_id, request.label
        );

        let session = RingSession {
            id: session_id.clone(),
            alarm_id: request.alarm_id,
            label: request.label.clone(),
            started_at,
            ended_at: None,
            outcome: RingOutcome::Firing,
        };
        if let Err(err) = self.db.insert_ring_session(&session).await {
            error!("Failed to record ring session {session_id}: {err:#}");
        }

        self.start_channel(&self.sound).await;
        if request.vibrate {
            self.start_channel(&self.haptics).await;
        }

        self.surface.show(&AlertNotification::ringing(
            request.alarm_id,
            &request.label,
            request.can_snooze,
        ));

        self.spawn_ticker(session_id).await;
    }

    async fn start_channel(&self, channel: &Arc<dyn FeedbackChannel>) {
        let kind = channel.kind();
        let channel = Arc::clone(channel);
        let result = tokio::task::spawn_blocking(move || channel.start())
            .await
            .unwrap_or_else(|err| Err(AlarmError::feedback(kind, err.to_string())));

        if let Err(err) = result {
            warn!("{err}; continuing without it");
        }
    }

    /// Every way a session ends goes through here.
    async fn finish_session(&self, state: &mut MutexGuard<'_, RingerState>, outcome: RingOutcome) {
        if let Some(ticker) = self.ticker.lock().await.take() {
            ticker.token.cancel();
        }

        self.sound.stop();
        self.haptics.stop();

        let alarm_id = state.alarm_id.unwrap_or_default();
        self.surface.dismiss(alarm_id);

        if let Some(session_id) = state.session_id.clone() {
            if let Err(err) = self
                .db
                .finish_ring_session(&session_id, outcome, Utc::now())
                .await
            {
                error!("Failed to close ring session {session_id}: {err:#}");
            }
        }

        info!(
            "Alarm {alarm_id} stopped ({}) after {}s",
            outcome.as_str(),
            state.elapsed().as_secs()
        );
        state.reset();
    }

    async fn spawn_ticker(&self, session_id: String) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(previous) = ticker_guard.take() {
            previous.token.cancel();
        }

        let token = CancellationToken::new();
        let ringer = self.clone();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(ringer.config.refresh_interval);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let mut guard = ringer.state.lock().await;
                let current = guard.session_id.as_deref() == Some(session_id.as_str());
                if task_token.is_cancelled() || !current {
                    break;
                }

                let elapsed = guard.elapsed();
                let alarm_id = guard.alarm_id.unwrap_or_default();
                if elapsed >= ringer.config.auto_stop {
                    warn!("Alarm {alarm_id} rang for {}s without an answer", elapsed.as_secs());
                    ringer.finish_session(&mut guard, RingOutcome::TimedOut).await;
                    break;
                }

                let label = guard.label.clone().unwrap_or_default();
                ringer
                    .surface
                    .update(alarm_id, &format!("{label} - ringing for {}", format_elapsed(elapsed)));
            }
        });

        *ticker_guard = Some(Ticker {
            token,
            _handle: handle,
        });
    }
}

fn snapshot_of(state: &RingerState) -> RingerSnapshot {
    RingerSnapshot {
        elapsed_ms: state.elapsed().as_millis() as u64,
        state: state.clone(),
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
