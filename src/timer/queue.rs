use chrono::Local;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bell::settings::{BellPatch, BellSettings};
use crate::schedule::duration::format_clock;
use crate::schedule::speech::Speech;
use crate::timer::engine::{DebateTimer, TimerEvent, TimerStatus};
use crate::timer::phase::{SpeechPhase, progress_percent};

/// Operator commands, from the keyboard or the local API.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueueCommand {
    Toggle,
    Stop,
    Next,
    Prev,
    Select(usize),
    SetAutoAdvance(bool),
    ToggleAutoAdvance,
    /// Fields to change; the rest keep the bell's settings at apply time.
    PatchBell(BellPatch),
    TestBell,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Timer(TimerEvent),
    Loaded { at_ms: u64, index: usize },
    Rejected { command: QueueCommand, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TimerSnapshot {
    pub index: usize,
    pub total: usize,
    pub speech_id: Option<String>,
    pub title: Option<String>,
    pub status: TimerStatus,
    pub current_time: u32,
    pub display: String,
    pub duration: u32,
    pub protected_seconds: u32,
    pub is_prep: bool,
    pub ringing_count: u32,
    pub last_alarm_mark: Option<u32>,
    pub phase: Option<SpeechPhase>,
    pub progress_percent: f64,
    pub auto_advance: bool,
    pub bell: BellSettings,
    pub is_first: bool,
    pub is_last: bool,
    pub updated_unix_ms: i64,
}

/// The built speech queue plus the cursor that feeds the timer.
pub struct SpeechQueue {
    speeches: Vec<Speech>,
    index: usize,
    timer: DebateTimer,
    auto_advance: bool,
}

impl SpeechQueue {
    pub fn new(speeches: Vec<Speech>, mut timer: DebateTimer) -> Self {
        if let Some(first) = speeches.first() {
            timer.load_speech(first.clone());
        }
        Self {
            speeches,
            index: 0,
            timer,
            auto_advance: false,
        }
    }

    pub fn speeches(&self) -> &[Speech] {
        &self.speeches
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.speeches.len()
    }

    pub fn timer(&self) -> &DebateTimer {
        &self.timer
    }

    pub fn auto_advance(&self) -> bool {
        self.auto_advance
    }

    pub fn set_auto_advance(&mut self, enabled: bool) {
        self.auto_advance = enabled;
    }

    pub fn next(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.load(self.index + 1)
    }

    pub fn prev(&mut self) -> bool {
        if self.is_first() {
            return false;
        }
        self.load(self.index - 1)
    }

    /// Jumps to `index`; out-of-range requests are ignored.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.speeches.len() {
            debug!(index, len = self.speeches.len(), "ignoring out-of-range select");
            return false;
        }
        self.load(index)
    }

    pub fn toggle(&mut self) -> Vec<SessionEvent> {
        let events = self.timer.toggle();
        self.follow_finish(events)
    }

    pub fn stop(&mut self) {
        self.timer.stop();
    }

    /// Feeds elapsed wall time to the timer, moving to the next speech when
    /// one finishes and auto-advance is on.
    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<SessionEvent> {
        let events = self.timer.advance(elapsed_ms);
        self.follow_finish(events)
    }

    pub fn apply(&mut self, command: QueueCommand) -> Vec<SessionEvent> {
        let at_ms = self.timer.now_ms();
        let moved = match command {
            QueueCommand::Toggle => return self.toggle(),
            QueueCommand::Stop => {
                self.stop();
                return Vec::new();
            }
            QueueCommand::Next => self.next(),
            QueueCommand::Prev => self.prev(),
            QueueCommand::Select(index) => self.select(index),
            QueueCommand::SetAutoAdvance(enabled) => {
                self.set_auto_advance(enabled);
                return Vec::new();
            }
            QueueCommand::ToggleAutoAdvance => {
                self.set_auto_advance(!self.auto_advance);
                return Vec::new();
            }
            QueueCommand::PatchBell(patch) => {
                let settings = patch.apply_to(self.timer.bell().settings());
                return match self.timer.bell_mut().update_settings(settings) {
                    Ok(()) => Vec::new(),
                    Err(err) => {
                        warn!("bell settings rejected: {err}");
                        vec![SessionEvent::Rejected {
                            command,
                            reason: err.to_string(),
                        }]
                    }
                };
            }
            QueueCommand::TestBell => {
                return self
                    .timer
                    .preview_bell()
                    .into_iter()
                    .map(SessionEvent::Timer)
                    .collect();
            }
            QueueCommand::Quit => return Vec::new(),
        };
        if moved {
            vec![SessionEvent::Loaded {
                at_ms,
                index: self.index,
            }]
        } else {
            Vec::new()
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let speech = self.timer.speech();
        let current_time = self.timer.current_time();
        let duration = speech.map(|speech| speech.duration).unwrap_or(0);
        TimerSnapshot {
            index: self.index,
            total: self.speeches.len(),
            speech_id: speech.map(|speech| speech.id.clone()),
            title: speech.map(|speech| speech.title.clone()),
            status: self.timer.status(),
            current_time,
            display: format_clock(current_time),
            duration,
            protected_seconds: speech.map(|speech| speech.protected_seconds).unwrap_or(0),
            is_prep: speech.is_some_and(|speech| speech.is_prep),
            ringing_count: self.timer.ringing_count(),
            last_alarm_mark: self.timer.last_alarm_mark(),
            phase: speech.map(|speech| SpeechPhase::of(speech, current_time)),
            progress_percent: progress_percent(duration, current_time),
            auto_advance: self.auto_advance,
            bell: self.timer.bell().settings(),
            is_first: self.is_first(),
            is_last: self.is_last(),
            updated_unix_ms: Local::now().timestamp_millis(),
        }
    }

    fn load(&mut self, index: usize) -> bool {
        let Some(speech) = self.speeches.get(index) else {
            return false;
        };
        info!(index, id = %speech.id, title = %speech.title, "switching speech");
        self.timer.load_speech(speech.clone());
        self.index = index;
        true
    }

    fn follow_finish(&mut self, events: Vec<TimerEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::with_capacity(events.len());
        for event in events {
            let finished_at = match &event {
                TimerEvent::Finished { at_ms } => Some(*at_ms),
                _ => None,
            };
            out.push(SessionEvent::Timer(event));
            if let Some(at_ms) = finished_at
                && self.auto_advance
                && self.next()
            {
                out.push(SessionEvent::Loaded {
                    at_ms,
                    index: self.index,
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bell::player::{Cue, SilentCuePlayer, ToneVariant};
    use crate::bell::settings::BellSound;
    use crate::bell::trigger::{BellEvent, BellTrigger};
    use crate::schedule::builder::{BpConfig, PrepConfig, create_bp_queue};

    fn queue_of(speeches: Vec<Speech>) -> SpeechQueue {
        let bell = BellTrigger::new(Box::new(SilentCuePlayer), BellSettings::default());
        SpeechQueue::new(speeches, DebateTimer::new(bell))
    }

    fn short_speech(id: &str, duration: u32) -> Speech {
        Speech::new(id, id, duration, 0, Vec::new())
    }

    #[test]
    fn new_queue_loads_first_speech() {
        let queue = queue_of(create_bp_queue(&BpConfig::default(), &PrepConfig::default()));
        assert_eq!(queue.index(), 0);
        assert_eq!(queue.timer().current_time(), 420);
        assert_eq!(queue.timer().status(), TimerStatus::Stopped);
        assert!(queue.is_first());
        assert!(!queue.is_last());
    }

    #[test]
    fn navigation_is_clamped_at_both_ends() {
        let mut queue = queue_of(vec![short_speech("a", 10), short_speech("b", 20)]);
        assert!(!queue.prev());
        assert_eq!(queue.index(), 0);

        assert!(queue.next());
        assert_eq!(queue.timer().speech().map(|s| s.id.as_str()), Some("b"));
        assert_eq!(queue.timer().current_time(), 20);
        assert!(queue.is_last());

        assert!(!queue.next());
        assert_eq!(queue.index(), 1);

        assert!(queue.prev());
        assert_eq!(queue.timer().current_time(), 10);
    }

    #[test]
    fn select_ignores_out_of_range_index() {
        let mut queue = queue_of(vec![short_speech("a", 10), short_speech("b", 20)]);
        assert!(!queue.select(5));
        assert_eq!(queue.index(), 0);
        assert!(queue.select(1));
        assert_eq!(queue.index(), 1);
    }

    #[test]
    fn switching_speech_stops_running_timer() {
        let mut queue = queue_of(vec![short_speech("a", 10), short_speech("b", 20)]);
        queue.toggle();
        queue.advance(3_000);
        assert_eq!(queue.timer().current_time(), 7);
        queue.next();
        assert_eq!(queue.timer().status(), TimerStatus::Stopped);
        queue.advance(5_000);
        assert_eq!(queue.timer().current_time(), 20);
    }

    #[test]
    fn empty_queue_is_inert() {
        let mut queue = queue_of(Vec::new());
        assert!(queue.timer().speech().is_none());
        assert!(!queue.next());
        assert!(!queue.prev());
        assert!(queue.toggle().is_empty());
        let snapshot = queue.snapshot();
        assert_eq!(snapshot.total, 0);
        assert!(snapshot.speech_id.is_none());
        assert_eq!(snapshot.display, "00:00");
    }

    #[test]
    fn auto_advance_loads_next_speech_on_finish() {
        let mut queue = queue_of(vec![short_speech("a", 2), short_speech("b", 3)]);
        queue.set_auto_advance(true);
        queue.toggle();
        let events = queue.advance(2_000);
        assert!(events.contains(&SessionEvent::Loaded {
            at_ms: 2_000,
            index: 1
        }));
        assert_eq!(queue.timer().status(), TimerStatus::Stopped);
        assert_eq!(queue.timer().current_time(), 3);

        queue.toggle();
        queue.advance(3_000);
        assert_eq!(queue.timer().status(), TimerStatus::Finished);
        assert_eq!(queue.index(), 1);
    }

    #[test]
    fn without_auto_advance_finished_speech_stays_loaded() {
        let mut queue = queue_of(vec![short_speech("a", 1), short_speech("b", 3)]);
        queue.toggle();
        queue.advance(1_000);
        assert_eq!(queue.index(), 0);
        assert_eq!(queue.timer().status(), TimerStatus::Finished);
    }

    #[test]
    fn commands_drive_the_queue() {
        let mut queue = queue_of(vec![short_speech("a", 10), short_speech("b", 20)]);
        let events = queue.apply(QueueCommand::Next);
        assert_eq!(events, vec![SessionEvent::Loaded { at_ms: 0, index: 1 }]);
        assert!(queue.apply(QueueCommand::Next).is_empty());

        queue.apply(QueueCommand::Toggle);
        assert_eq!(queue.timer().status(), TimerStatus::Running);
        queue.apply(QueueCommand::Stop);
        assert_eq!(queue.timer().status(), TimerStatus::Stopped);

        queue.apply(QueueCommand::ToggleAutoAdvance);
        assert!(queue.auto_advance());
        queue.apply(QueueCommand::SetAutoAdvance(false));
        assert!(!queue.auto_advance());
    }

    #[test]
    fn invalid_bell_update_is_reported() {
        let mut queue = queue_of(vec![short_speech("a", 10)]);
        let bad = BellPatch {
            repetitions: Some(0),
            ..BellPatch::default()
        };
        let events = queue.apply(QueueCommand::PatchBell(bad));
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::Rejected { reason, .. }] if reason.contains("repetitions")
        ));
        assert_eq!(queue.timer().bell().settings(), BellSettings::default());
    }

    #[test]
    fn back_to_back_bell_patches_both_apply() {
        let mut queue = queue_of(vec![short_speech("a", 10)]);
        let sound = BellPatch {
            sound: Some(BellSound::Digital),
            ..BellPatch::default()
        };
        let repetitions = BellPatch {
            repetitions: Some(3),
            ..BellPatch::default()
        };
        assert!(queue.apply(QueueCommand::PatchBell(sound)).is_empty());
        assert!(queue.apply(QueueCommand::PatchBell(repetitions)).is_empty());
        let settings = queue.timer().bell().settings();
        assert_eq!(settings.sound, BellSound::Digital);
        assert_eq!(settings.repetitions, 3);
        assert_eq!(settings.interval_ms, BellSettings::default().interval_ms);
        assert_eq!(queue.snapshot().bell, settings);
    }

    #[test]
    fn test_bell_plays_once_and_leaves_timer_alone() {
        let mut queue = queue_of(vec![short_speech("a", 10)]);
        queue.apply(QueueCommand::PatchBell(BellPatch {
            sound: Some(BellSound::Grave),
            repetitions: Some(4),
            ..BellPatch::default()
        }));
        let events = queue.apply(QueueCommand::TestBell);
        assert_eq!(
            events,
            vec![SessionEvent::Timer(TimerEvent::Bell(BellEvent::CuePlayed {
                at_ms: 0,
                cue: Cue::Tone(ToneVariant::Grave),
            }))]
        );
        assert_eq!(queue.timer().status(), TimerStatus::Stopped);
        assert_eq!(queue.timer().ringing_count(), 0);
        assert!(queue.timer().bell().is_idle());
    }

    #[test]
    fn snapshot_reflects_running_state() {
        let mut queue = queue_of(create_bp_queue(&BpConfig::default(), &PrepConfig::default()));
        queue.toggle();
        queue.advance(90_000);
        let snapshot = queue.snapshot();
        assert_eq!(snapshot.status, TimerStatus::Running);
        assert_eq!(snapshot.current_time, 330);
        assert_eq!(snapshot.display, "05:30");
        assert_eq!(snapshot.phase, Some(SpeechPhase::FirstHalf));
        assert_eq!(snapshot.speech_id.as_deref(), Some("bp-0"));
        let json = serde_json::to_value(&snapshot).expect("serializes");
        assert_eq!(json["status"], "running");
        assert_eq!(json["phase"], "first_half");
    }
}
