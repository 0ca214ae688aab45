use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
const BEEP_MS: u32 = 400;
const PAUSE_MS: u32 = 200;

/// Endless mono alarm tone: a sine beep followed by a short silence.
pub struct AlarmTone {
    frequency: f32,
    amplitude: f32,
    num_sample: u64,
}

impl AlarmTone {
    pub fn new(frequency: f32, amplitude: f32) -> Self {
        Self {
            frequency,
            amplitude: amplitude.clamp(0.0, 1.0),
            num_sample: 0,
        }
    }

    fn cycle_samples() -> u64 {
        u64::from(SAMPLE_RATE * (BEEP_MS + PAUSE_MS) / 1000)
    }

    fn beep_samples() -> u64 {
        u64::from(SAMPLE_RATE * BEEP_MS / 1000)
    }
}

impl Iterator for AlarmTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let position = self.num_sample % Self::cycle_samples();
        self.num_sample = self.num_sample.wrapping_add(1);

        if position >= Self::beep_samples() {
            return Some(0.0);
        }

        let t = position as f32 / SAMPLE_RATE as f32;
        Some((2.0 * PI * self.frequency * t).sin() * self.amplitude)
    }
}

impl Source for AlarmTone {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_alternates_beep_and_silence() {
        let mut tone = AlarmTone::new(880.0, 0.5);
        let beep: Vec<f32> = tone.by_ref().take(AlarmTone::beep_samples() as usize).collect();
        assert!(beep.iter().any(|sample| sample.abs() > 0.1));
        assert!(beep.iter().all(|sample| sample.abs() <= 0.5));

        let pause_len = (AlarmTone::cycle_samples() - AlarmTone::beep_samples()) as usize;
        assert!(tone.by_ref().take(pause_len).all(|sample| sample == 0.0));

        // Next cycle starts sounding again.
        assert!(tone.take(200).any(|sample| sample != 0.0));
    }
}
