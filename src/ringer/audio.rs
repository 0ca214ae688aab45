//! Sound channel backed by a dedicated audio thread.
//!
//! rodio's output stream is not `Send`, so it lives on its own thread and is
//! driven through a command channel.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use crate::error::{AlarmError, AlarmResult, FeedbackKind};
use crate::ringer::feedback::FeedbackChannel;

/// How long `start` waits for the audio thread to open the output device.
const START_TIMEOUT: Duration = Duration::from_secs(3);

enum AudioCommand {
    Start {
        tone_hz: f32,
        volume: f32,
        reply: Sender<Result<(), String>>,
    },
    Stop,
}

pub struct AudioEngineHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    is_playing: Arc<AtomicBool>,
    tone_hz: f32,
    volume: f32,
}

impl AudioEngineHandle {
    pub fn new(tone_hz: f32, volume: f32) -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            is_playing: Arc::new(AtomicBool::new(false)),
            tone_hz,
            volume: volume.clamp(0.0, 1.0),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::SeqCst)
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let is_playing = Arc::clone(&self.is_playing);

        thread::Builder::new()
            .name("alarmd-audio".to_string())
            .spawn(move || run_audio_thread(rx, is_playing))
            .map_err(|e| e.to_string())?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl FeedbackChannel for AudioEngineHandle {
    fn kind(&self) -> FeedbackKind {
        FeedbackKind::Sound
    }

    fn start(&self) -> AlarmResult<()> {
        let unavailable = |reason: String| AlarmError::feedback(FeedbackKind::Sound, reason);

        let tx = self.ensure_thread().map_err(unavailable)?;
        let (reply, response) = mpsc::channel();
        tx.send(AudioCommand::Start {
            tone_hz: self.tone_hz,
            volume: self.volume,
            reply,
        })
        .map_err(|e| unavailable(e.to_string()))?;

        match response.recv_timeout(START_TIMEOUT) {
            Ok(result) => result.map_err(unavailable),
            Err(err) => Err(unavailable(format!("audio thread did not answer: {err}"))),
        }
    }

    fn stop(&self) {
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AudioCommand::Stop);
        }
    }
}

#[cfg(feature = "audio")]
fn run_audio_thread(rx: mpsc::Receiver<AudioCommand>, is_playing: Arc<AtomicBool>) {
    use log::{debug, warn};
    use rodio::{OutputStream, Sink};

    use crate::ringer::tone::AlarmTone;

    let mut _stream: Option<OutputStream> = None;
    let mut sink: Option<Sink> = None;

    fn open_sink(volume: f32) -> Result<(OutputStream, Sink), String> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| format!("failed to open audio output: {e}"))?;
        let sink =
            Sink::try_new(&handle).map_err(|e| format!("failed to create audio sink: {e}"))?;
        sink.set_volume(volume);
        Ok((stream, sink))
    }

    while let Ok(cmd) = rx.recv() {
        match cmd {
            AudioCommand::Start {
                tone_hz,
                volume,
                reply,
            } => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
                _stream = None;

                let result = open_sink(volume).map(|(new_stream, new_sink)| {
                    new_sink.append(AlarmTone::new(tone_hz, 0.6));
                    _stream = Some(new_stream);
                    sink = Some(new_sink);
                });
                is_playing.store(result.is_ok(), Ordering::SeqCst);
                if let Err(err) = &result {
                    warn!("Alarm tone unavailable: {err}");
                } else {
                    debug!("Alarm tone started at {tone_hz} Hz");
                }
                let _ = reply.send(result);
            }
            AudioCommand::Stop => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
                _stream = None;
                is_playing.store(false, Ordering::SeqCst);
            }
        }
    }
}

#[cfg(not(feature = "audio"))]
fn run_audio_thread(rx: mpsc::Receiver<AudioCommand>, is_playing: Arc<AtomicBool>) {
    while let Ok(cmd) = rx.recv() {
        match cmd {
            AudioCommand::Start { reply, .. } => {
                let _ = reply.send(Err("built without audio support".to_string()));
            }
            AudioCommand::Stop => is_playing.store(false, Ordering::SeqCst),
        }
    }
}
