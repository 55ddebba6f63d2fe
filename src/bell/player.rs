use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};

use crate::bell::settings::BellSound;

/// Synthesized tone variants.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ToneVariant {
    RealBell,
    Digital,
    Grave,
}

impl ToneVariant {
    pub fn label(self) -> &'static str {
        match self {
            ToneVariant::RealBell => "real-bell",
            ToneVariant::Digital => "digital",
            ToneVariant::Grave => "grave",
        }
    }
}

impl ToneVariant {
    /// The tone for a sound setting. `Custom` has no tone of its own.
    pub fn for_sound(sound: BellSound) -> Option<Self> {
        match sound {
            BellSound::RealBell => Some(ToneVariant::RealBell),
            BellSound::Digital => Some(ToneVariant::Digital),
            BellSound::Grave => Some(ToneVariant::Grave),
            BellSound::Custom => None,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Cue {
    Tone(ToneVariant),
    Clip { file_name: String, data: Arc<[u8]> },
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cue::Tone(variant) => write!(f, "tone:{}", variant.label()),
            Cue::Clip { file_name, data } => write!(f, "clip:{file_name} ({} bytes)", data.len()),
        }
    }
}

/// The audio capability the bell trigger plays through. Calls must return
/// promptly; playback itself happens elsewhere.
pub trait CuePlayer: Send {
    /// Readies the output device. Called when the timer is started or paused.
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    fn play(&mut self, cue: &Cue) -> Result<()>;
}

/// Rings the terminal bell once per cue.
pub struct TerminalCuePlayer;

impl CuePlayer for TerminalCuePlayer {
    fn play(&mut self, _cue: &Cue) -> Result<()> {
        let mut stderr = io::stderr().lock();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}

pub struct SilentCuePlayer;

impl CuePlayer for SilentCuePlayer {
    fn play(&mut self, _cue: &Cue) -> Result<()> {
        Ok(())
    }
}

/// Keeps every played cue in a shared log, for simulation output and tests.
#[derive(Clone, Default)]
pub struct RecordingCuePlayer {
    log: Arc<Mutex<Vec<Cue>>>,
}

impl RecordingCuePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<Cue> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

impl CuePlayer for RecordingCuePlayer {
    fn play(&mut self, cue: &Cue) -> Result<()> {
        self.log
            .lock()
            .map_err(|_| anyhow!("recording player state poisoned"))?
            .push(cue.clone());
        Ok(())
    }
}
