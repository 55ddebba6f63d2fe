use std::sync::Arc;

use tracing::{debug, warn};

use crate::bell::player::{Cue, CuePlayer, ToneVariant};
use crate::bell::settings::{BellSettings, BellSound, CustomClip, SettingsError};
use crate::timer::scheduler::DelayScheduler;

/// How long the ringing indicator stays up after a trigger.
pub const RINGING_CLEAR_MS: u64 = 1_500;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum BellAction {
    PlayCue,
    ClearRinging { generation: u64 },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BellEvent {
    CuePlayed { at_ms: u64, cue: Cue },
    RingingCleared { at_ms: u64 },
}

/// Turns "ring N times" into spaced cue plays plus a transient ringing
/// indicator. Repeated plays and the indicator clear run on the trigger's own
/// scheduler and are never cancelled once queued.
pub struct BellTrigger {
    player: Box<dyn CuePlayer>,
    settings: BellSettings,
    clip: Option<Cue>,
    ringing: u32,
    generation: u64,
    scheduler: DelayScheduler<BellAction>,
}

impl BellTrigger {
    pub fn new(player: Box<dyn CuePlayer>, settings: BellSettings) -> Self {
        Self {
            player,
            settings,
            clip: None,
            ringing: 0,
            generation: 0,
            scheduler: DelayScheduler::new(),
        }
    }

    pub fn settings(&self) -> BellSettings {
        self.settings
    }

    /// Replaces the settings. Plays already queued pick up the new sound.
    pub fn update_settings(&mut self, settings: BellSettings) -> Result<(), SettingsError> {
        settings.validate()?;
        debug!(
            sound = %settings.sound,
            repetitions = settings.repetitions,
            interval_ms = settings.interval_ms,
            "bell settings updated"
        );
        self.settings = settings;
        Ok(())
    }

    pub fn set_custom_clip(&mut self, clip: Option<CustomClip>) {
        self.clip = clip.map(|clip| Cue::Clip {
            file_name: clip.file_name,
            data: Arc::from(clip.data),
        });
    }

    pub fn ringing_count(&self) -> u32 {
        self.ringing
    }

    pub fn next_due_ms(&self) -> Option<u64> {
        self.scheduler.next_due_ms()
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// Readies the audio device. A failure is logged and otherwise ignored.
    pub fn unlock(&mut self) {
        if let Err(err) = self.player.prepare() {
            warn!("audio output unavailable: {err:#}");
        }
    }

    /// The cue for the current settings. Re-evaluated on every play.
    /// `Custom` without a loaded clip has nothing to play.
    pub fn select_cue(&self) -> Option<Cue> {
        match (self.settings.sound, &self.clip) {
            (BellSound::Custom, clip) => clip.clone(),
            (sound, _) => ToneVariant::for_sound(sound).map(Cue::Tone),
        }
    }

    /// Rings `times` cues: one now, the rest `interval_ms` apart.
    pub fn trigger(&mut self, times: u32) -> Vec<BellEvent> {
        if times == 0 {
            return Vec::new();
        }
        debug!(times, at_ms = self.scheduler.now_ms(), "bell triggered");

        self.ringing = times;
        self.generation += 1;
        self.scheduler.schedule(
            RINGING_CLEAR_MS,
            BellAction::ClearRinging {
                generation: self.generation,
            },
        );
        self.scheduler
            .schedule_repeated(times - 1, self.settings.interval_ms, |_| BellAction::PlayCue);

        let now = self.scheduler.now_ms();
        self.play_one(now).into_iter().collect()
    }

    /// Plays the current cue once, for auditioning settings. Leaves the
    /// ringing indicator and any queued repetitions alone.
    pub fn preview(&mut self) -> Option<BellEvent> {
        self.unlock();
        let now = self.scheduler.now_ms();
        debug!(at_ms = now, sound = %self.settings.sound, "bell preview");
        self.play_one(now)
    }

    /// Moves the bell clock to `now_ms`, running every due play and clear.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<BellEvent> {
        let mut events = Vec::new();
        for (at_ms, action) in self.scheduler.advance_to(now_ms) {
            match action {
                BellAction::PlayCue => events.extend(self.play_one(at_ms)),
                BellAction::ClearRinging { generation } => {
                    if generation == self.generation && self.ringing != 0 {
                        self.ringing = 0;
                        events.push(BellEvent::RingingCleared { at_ms });
                    }
                }
            }
        }
        events
    }

    fn play_one(&mut self, at_ms: u64) -> Option<BellEvent> {
        let Some(cue) = self.select_cue() else {
            debug!(at_ms, "custom sound selected but no clip loaded");
            return None;
        };
        match self.player.play(&cue) {
            Ok(()) => Some(BellEvent::CuePlayed { at_ms, cue }),
            Err(err) => {
                warn!(%cue, "cue playback failed: {err:#}");
                None
            }
        }
    }
}
