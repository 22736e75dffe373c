//! Player configuration.
//!
//! Settings are read from an optional JSON file; every field has a default
//! so a partial file (or none at all) is fine. Command-line flags override
//! whatever the file says.

use crate::roll::Rgb;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Roll layout and colors.
///
/// Lengths are in surface units. The defaults suit the terminal canvas,
/// where one unit is half a character cell; [`RollConfig::canvas`] gives
/// the proportions for a pixel surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollConfig {
    /// How far ahead of "now" notes become visible, in seconds.
    pub lookahead_seconds: f64,
    /// Space left, right and below the keyboard, in surface units.
    pub padding: f64,
    /// Narrowest the keyboard gets on a small surface.
    pub min_keyboard_width: f64,
    /// White key height as a multiple of its width.
    pub key_aspect: f64,
    /// Space between the judgement line and the keyboard.
    pub judgement_gap: f64,
    pub background: Rgb,
    pub note: Rgb,
    pub active_key: Rgb,
    pub white_key: Rgb,
    pub black_key: Rgb,
    pub key_outline: Rgb,
}

impl Default for RollConfig {
    fn default() -> Self {
        Self {
            lookahead_seconds: 4.0,
            padding: 1.0,
            // One unit per white key
            min_keyboard_width: 52.0,
            key_aspect: 6.0,
            judgement_gap: 1.0,
            background: Rgb(0x20, 0x20, 0x20),
            note: Rgb(0x00, 0x80, 0xff),
            active_key: Rgb(0x00, 0x80, 0xff),
            white_key: Rgb(0xff, 0xff, 0xff),
            black_key: Rgb(0x00, 0x00, 0x00),
            key_outline: Rgb(0x80, 0x80, 0x80),
        }
    }
}

impl RollConfig {
    /// Proportions for a pixel surface such as a window or an image.
    pub fn canvas() -> Self {
        Self {
            padding: 32.0,
            min_keyboard_width: 100.0,
            judgement_gap: 4.0,
            ..Self::default()
        }
    }
}

/// Playback loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Display refresh rate the animation loop paces itself to.
    pub frames_per_second: u32,
    /// Seconds of silence after the last note before playback stops by itself.
    /// Negative disables auto-stop.
    pub tail_seconds: f64,
    /// Synth output gain.
    pub master_volume: f32,
    /// Multiplies note velocities before they reach the synth.
    pub velocity_scale: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frames_per_second: 60,
            tail_seconds: 1.0,
            master_volume: 0.5,
            velocity_scale: 1.0,
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyfallConfig {
    pub roll: RollConfig,
    pub playback: PlaybackConfig,
}

impl KeyfallConfig {
    /// Loads and validates a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let json = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Io {
            path: path_str.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path_str,
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would make the roll or the loop meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.roll.lookahead_seconds > 0.0 && self.roll.lookahead_seconds.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "lookahead_seconds must be positive, got {}",
                self.roll.lookahead_seconds
            )));
        }
        if self.roll.padding < 0.0 || self.roll.judgement_gap < 0.0 {
            return Err(ConfigError::Invalid(
                "padding and judgement_gap must not be negative".to_string(),
            ));
        }
        if !(self.roll.key_aspect > 0.0 && self.roll.min_keyboard_width > 0.0) {
            return Err(ConfigError::Invalid(
                "key_aspect and min_keyboard_width must be positive".to_string(),
            ));
        }
        if !(self.playback.velocity_scale > 0.0 && self.playback.velocity_scale.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "velocity_scale must be positive, got {}",
                self.playback.velocity_scale
            )));
        }
        if self.playback.frames_per_second == 0 {
            return Err(ConfigError::Invalid(
                "frames_per_second must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
