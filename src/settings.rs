use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

const DEFAULT_CONFIG_FILE: &str = "alarmd.json";
const CONFIG_ENV: &str = "ALARMD_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_path: PathBuf,
    /// Whether the wake-up backend may register exact alarms.
    pub exact_alarms_permitted: bool,
    pub ring_volume: f32,
    pub tone_hz: f32,
    pub auto_stop_secs: u64,
    pub refresh_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("alarmd.sqlite3"),
            exact_alarms_permitted: true,
            ring_volume: 0.8,
            tone_hz: 880.0,
            auto_stop_secs: 10 * 60,
            refresh_interval_ms: 1_000,
        }
    }
}

impl Settings {
    /// Resolve the config path from `ALARMD_CONFIG`, falling back to
    /// `alarmd.json` in the working directory.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let settings = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<Settings>(&contents) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(
                        "Ignoring invalid settings file {} (line {}, column {}): {err}",
                        path.display(),
                        err.line(),
                        err.column()
                    );
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };

        settings.validated()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, format!("{serialized}\n"))
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    pub fn auto_stop(&self) -> Duration {
        Duration::from_secs(self.auto_stop_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    fn validated(mut self) -> Result<Self> {
        if self.refresh_interval_ms == 0 {
            bail!("refresh_interval_ms must be greater than zero");
        }
        if self.auto_stop_secs == 0 {
            bail!("auto_stop_secs must be greater than zero");
        }
        if !(self.tone_hz.is_finite() && self.tone_hz > 0.0) {
            bail!("tone_hz must be a positive frequency, got {}", self.tone_hz);
        }
        self.ring_volume = if self.ring_volume.is_finite() {
            self.ring_volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
        Ok(self)
    }
}
