use std::path::Path;

use hitline_domain::{JudgmentWeights, JudgmentWindows};
use hitline_media::SyncSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Visual and session-length tunables for the game clock.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimelineSettings {
    pub base_fall_duration_ms: f64,
    /// Fall duration is divided by this.
    pub note_speed: f64,
    pub pre_roll_ms: f64,
    pub spawn_y: f64,
    pub judge_line_y: f64,
    pub missed_y: f64,
    pub tail_margin_ms: f64,
    pub max_session_ms: f64,
}

impl TimelineSettings {
    /// Fall duration at base tempo after applying note speed.
    pub fn fall_duration_ms(&self) -> f64 {
        let speed = if self.note_speed > 0.0 && self.note_speed.is_finite() {
            self.note_speed
        } else {
            1.0
        };
        if self.base_fall_duration_ms > 0.0 {
            self.base_fall_duration_ms / speed
        } else {
            Self::default().base_fall_duration_ms / speed
        }
    }
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            base_fall_duration_ms: 2000.0,
            note_speed: 1.0,
            pre_roll_ms: 4000.0,
            spawn_y: 0.0,
            judge_line_y: 640.0,
            missed_y: 690.0,
            tail_margin_ms: 5000.0,
            max_session_ms: 300_000.0,
        }
    }
}

/// Parsed with [`EngineConfig::from_yaml`] or [`EngineConfig::from_json`],
/// which validate every field after parsing.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct EngineConfig {
    pub judgment: JudgmentWindows,
    pub hold_release: JudgmentWindows,
    pub weights: JudgmentWeights,
    /// How far past its deadline an unresolved note survives before the clock misses it.
    pub miss_threshold_ms: f64,
    pub timeline: TimelineSettings,
    pub feedback_display_ms: f64,
    pub sync: SyncSettings,
    pub frame_rate_hz: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            judgment: JudgmentWindows::standard(),
            hold_release: JudgmentWindows::hold_release(),
            weights: JudgmentWeights::default(),
            miss_threshold_ms: 135.0,
            timeline: TimelineSettings::default(),
            feedback_display_ms: 800.0,
            sync: SyncSettings::default(),
            frame_rate_hz: 60.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
struct WindowSpec {
    perfect: f64,
    great: f64,
    good: f64,
}

impl WindowSpec {
    fn build(self, field: &str) -> Result<JudgmentWindows, ConfigError> {
        JudgmentWindows::new(self.perfect, self.great, self.good)
            .map_err(|err| ConfigError::Invalid(format!("{field}: {err}")))
    }
}

impl From<JudgmentWindows> for WindowSpec {
    fn from(windows: JudgmentWindows) -> Self {
        Self {
            perfect: windows.perfect(),
            great: windows.great(),
            good: windows.good(),
        }
    }
}

/// On-disk shape of [`EngineConfig`]; windows are checked after parsing.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct ConfigFile {
    judgment: WindowSpec,
    hold_release: WindowSpec,
    weights: JudgmentWeights,
    miss_threshold_ms: f64,
    timeline: TimelineSettings,
    feedback_display_ms: f64,
    sync: SyncSettings,
    frame_rate_hz: f64,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        Self {
            judgment: defaults.judgment.into(),
            hold_release: defaults.hold_release.into(),
            weights: defaults.weights,
            miss_threshold_ms: defaults.miss_threshold_ms,
            timeline: defaults.timeline,
            feedback_display_ms: defaults.feedback_display_ms,
            sync: defaults.sync,
            frame_rate_hz: defaults.frame_rate_hz,
        }
    }
}

impl TryFrom<ConfigFile> for EngineConfig {
    type Error = ConfigError;

    fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
        let config = Self {
            judgment: file.judgment.build("judgment")?,
            hold_release: file.hold_release.build("hold_release")?,
            weights: file.weights,
            miss_threshold_ms: file.miss_threshold_ms,
            timeline: file.timeline,
            feedback_display_ms: file.feedback_display_ms,
            sync: file.sync,
            frame_rate_hz: file.frame_rate_hz,
        };
        config.validate()
    }
}

impl EngineConfig {
    /// Loads YAML (`.yaml`/`.yml`) or JSON (anything else).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            Self::from_yaml(&text)
        } else {
            Self::from_json(&text)
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            serde_yaml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        file.try_into()
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            serde_json::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        file.try_into()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.frame_rate_hz <= 0.0 || !self.frame_rate_hz.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "frame_rate_hz must be positive, got {}",
                self.frame_rate_hz
            )));
        }
        if self.miss_threshold_ms.is_nan() || self.miss_threshold_ms < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "miss_threshold_ms must be non-negative, got {}",
                self.miss_threshold_ms
            )));
        }
        if self.sync.resync_threshold_secs < 0.0 || self.sync.resync_cooldown_ms < 0.0 {
            return Err(ConfigError::Invalid(
                "sync thresholds must be non-negative".into(),
            ));
        }
        Ok(self)
    }

    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.frame_rate_hz)
    }
}
