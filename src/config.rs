use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::notes::DEFAULT_MIN_DURATION;
use crate::timing::{DEFAULT_BPM, DEFAULT_SMOOTHING, MAX_BPM, MIN_BPM};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    #[default]
    Seconds,
    Beats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverKind {
    #[default]
    Auto,
    Audio,
    Timer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "SyncConfig::default_discontinuity_threshold")]
    pub discontinuity_threshold: u32,
    #[serde(default = "SyncConfig::default_reconcile_epsilon")]
    pub reconcile_epsilon: f64,
    #[serde(default = "SyncConfig::default_min_note_duration")]
    pub min_note_duration: f64,
    #[serde(default = "SyncConfig::default_tempo_smoothing")]
    pub tempo_smoothing: f64,
    #[serde(default = "SyncConfig::default_bpm")]
    pub default_bpm: f64,
    #[serde(default)]
    pub time_unit: TimeUnit,
    #[serde(default)]
    pub driver: DriverKind,
    #[serde(default = "SyncConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "SyncConfig::default_event_capacity")]
    pub event_capacity: usize,
}

impl SyncConfig {
    fn default_discontinuity_threshold() -> u32 {
        100
    }
    fn default_reconcile_epsilon() -> f64 {
        0.001
    }
    fn default_min_note_duration() -> f64 {
        DEFAULT_MIN_DURATION
    }
    fn default_tempo_smoothing() -> f64 {
        DEFAULT_SMOOTHING
    }
    fn default_bpm() -> f64 {
        DEFAULT_BPM
    }
    fn default_poll_interval_ms() -> u64 {
        1
    }
    fn default_event_capacity() -> usize {
        1024
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Unusable tunables are replaced by their defaults.
    pub fn from_ron(content: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str::<Self>(content).map(Self::sanitized)
    }

    fn sanitized(mut self) -> Self {
        if !(self.tempo_smoothing.is_finite() && (0.0..=1.0).contains(&self.tempo_smoothing)) {
            tracing::warn!("tempo_smoothing {} out of range, using default", self.tempo_smoothing);
            self.tempo_smoothing = Self::default_tempo_smoothing();
        }
        if !(self.min_note_duration.is_finite() && self.min_note_duration > 0.0) {
            tracing::warn!("min_note_duration {} must be positive, using default", self.min_note_duration);
            self.min_note_duration = Self::default_min_note_duration();
        }
        if !self.default_bpm.is_finite() {
            tracing::warn!("default_bpm {} is not a number, using default", self.default_bpm);
            self.default_bpm = Self::default_bpm();
        }
        self.default_bpm = self.default_bpm.clamp(MIN_BPM, MAX_BPM);
        if !(self.reconcile_epsilon.is_finite() && self.reconcile_epsilon >= 0.0) {
            tracing::warn!("reconcile_epsilon {} must be non-negative, using default", self.reconcile_epsilon);
            self.reconcile_epsilon = Self::default_reconcile_epsilon();
        }
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            discontinuity_threshold: Self::default_discontinuity_threshold(),
            reconcile_epsilon: Self::default_reconcile_epsilon(),
            min_note_duration: Self::default_min_note_duration(),
            tempo_smoothing: Self::default_tempo_smoothing(),
            default_bpm: Self::default_bpm(),
            time_unit: TimeUnit::default(),
            driver: DriverKind::default(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            event_capacity: Self::default_event_capacity(),
        }
    }
}
