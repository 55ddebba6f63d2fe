use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_REPETITIONS: u32 = 1;
pub const MAX_REPETITIONS: u32 = 10;
pub const MIN_INTERVAL_MS: u64 = 100;
pub const MAX_INTERVAL_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BellSound {
    RealBell,
    Digital,
    Grave,
    Custom,
}

impl BellSound {
    pub fn token(self) -> &'static str {
        match self {
            BellSound::RealBell => "real-bell",
            BellSound::Digital => "digital",
            BellSound::Grave => "grave",
            BellSound::Custom => "custom",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "real-bell" => Some(BellSound::RealBell),
            "digital" => Some(BellSound::Digital),
            "grave" => Some(BellSound::Grave),
            "custom" => Some(BellSound::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for BellSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct BellSettings {
    pub sound: BellSound,
    /// Cue plays per triggered alarm.
    pub repetitions: u32,
    /// Gap between repeated plays.
    pub interval_ms: u64,
}

impl Default for BellSettings {
    fn default() -> Self {
        Self {
            sound: BellSound::RealBell,
            repetitions: 1,
            interval_ms: 600,
        }
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum SettingsError {
    #[error("repetitions must be between 1 and 10, got {0}")]
    Repetitions(u32),
    #[error("interval must be between 100 and 2000 ms, got {0}")]
    Interval(u64),
}

impl BellSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(MIN_REPETITIONS..=MAX_REPETITIONS).contains(&self.repetitions) {
            return Err(SettingsError::Repetitions(self.repetitions));
        }
        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&self.interval_ms) {
            return Err(SettingsError::Interval(self.interval_ms));
        }
        Ok(())
    }
}

/// A partial settings change. Fields left `None` keep whatever the bell is
/// using when the patch is applied.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct BellPatch {
    pub sound: Option<BellSound>,
    pub repetitions: Option<u32>,
    pub interval_ms: Option<u64>,
}

impl BellPatch {
    pub fn is_empty(&self) -> bool {
        self.sound.is_none() && self.repetitions.is_none() && self.interval_ms.is_none()
    }

    pub fn apply_to(&self, current: BellSettings) -> BellSettings {
        BellSettings {
            sound: self.sound.unwrap_or(current.sound),
            repetitions: self.repetitions.unwrap_or(current.repetitions),
            interval_ms: self.interval_ms.unwrap_or(current.interval_ms),
        }
    }

    /// Range-checks the fields the patch sets.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.apply_to(BellSettings::default()).validate()
    }
}

/// An uploaded audio clip. The bytes are handed to the cue player untouched.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CustomClip {
    pub file_name: String,
    pub data: Vec<u8>,
}

pub fn load_custom_clip(path: &Path) -> Result<CustomClip> {
    let data =
        fs::read(path).with_context(|| format!("unable to read custom clip {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(CustomClip { file_name, data })
}
