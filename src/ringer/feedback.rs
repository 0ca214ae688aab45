use std::time::Duration;

use crate::error::{AlarmError, AlarmResult, FeedbackKind};

/// One sensory channel of a ringing session.
pub trait FeedbackChannel: Send + Sync {
    fn kind(&self) -> FeedbackKind;

    fn start(&self) -> AlarmResult<()>;

    /// Stopping an idle channel is a no-op.
    fn stop(&self);
}

/// Repeating on/off waveform for a vibration motor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VibrationPattern {
    pub initial_delay: Duration,
    pub on: Duration,
    pub off: Duration,
    pub repeat: bool,
}

impl VibrationPattern {
    pub fn alarm() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            on: Duration::from_millis(1000),
            off: Duration::from_millis(1000),
            repeat: true,
        }
    }
}

pub trait HapticDevice: Send + Sync {
    fn vibrate(&self, pattern: &VibrationPattern) -> Result<(), String>;

    fn cancel(&self);
}

/// Host without a vibration motor.
pub struct NoHapticDevice;

impl HapticDevice for NoHapticDevice {
    fn vibrate(&self, _pattern: &VibrationPattern) -> Result<(), String> {
        Err("no vibration motor".to_string())
    }

    fn cancel(&self) {}
}

pub struct HapticChannel<D> {
    device: D,
    pattern: VibrationPattern,
}

impl<D: HapticDevice> HapticChannel<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            pattern: VibrationPattern::alarm(),
        }
    }
}

impl<D: HapticDevice> FeedbackChannel for HapticChannel<D> {
    fn kind(&self) -> FeedbackKind {
        FeedbackKind::Haptic
    }

    fn start(&self) -> AlarmResult<()> {
        self.device
            .vibrate(&self.pattern)
            .map_err(|reason| AlarmError::feedback(FeedbackKind::Haptic, reason))
    }

    fn stop(&self) {
        self.device.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingMotor {
        patterns: Arc<Mutex<Vec<VibrationPattern>>>,
        cancels: Arc<Mutex<u32>>,
    }

    impl HapticDevice for RecordingMotor {
        fn vibrate(&self, pattern: &VibrationPattern) -> Result<(), String> {
            self.patterns.lock().unwrap().push(pattern.clone());
            Ok(())
        }

        fn cancel(&self) {
            *self.cancels.lock().unwrap() += 1;
        }
    }

    #[test]
    fn haptic_channel_drives_repeating_pattern() {
        let motor = RecordingMotor::default();
        let channel = HapticChannel::new(motor.clone());

        channel.start().expect("start");
        channel.stop();

        let patterns = motor.patterns.lock().unwrap();
        assert_eq!(patterns.as_slice(), &[VibrationPattern::alarm()]);
        assert!(patterns[0].repeat);
        assert_eq!(patterns[0].on, Duration::from_secs(1));
        assert_eq!(*motor.cancels.lock().unwrap(), 1);
    }

    #[test]
    fn missing_motor_reports_unavailable() {
        let channel = HapticChannel::new(NoHapticDevice);
        match channel.start() {
            Err(AlarmError::FeedbackChannelUnavailable { channel, .. }) => {
                assert_eq!(channel, FeedbackKind::Haptic)
            }
            other => panic!("unexpected {other:?}"),
        }
        channel.stop();
    }
}
