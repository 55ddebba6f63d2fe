//! Countdown state machine for the active speech.
//!
//! ```text
//!   load_speech ──► Stopped ──toggle──► Running ──remaining == 0──► Finished
//!                      ▲                 │   ▲
//!                      │ stop            │   │ toggle
//!                      └──────────── Paused ─┘
//! ```
//!
//! Time only moves through [`DebateTimer::tick`] (one second) or
//! [`DebateTimer::advance`] (milliseconds from an external clock). Bells are
//! delegated to the [`BellTrigger`], which shares the same clock.

use serde::Serialize;
use tracing::{debug, info};

use crate::bell::trigger::{BellEvent, BellTrigger};
use crate::schedule::speech::Speech;

pub const TICK_MS: u64 = 1_000;

// Once the countdown is this far from every checkpoint the dedup mark is
// released.
const ALARM_RELEASE_DISTANCE: u32 = 2;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    Stopped,
    Running,
    Paused,
    Finished,
}

impl TimerStatus {
    pub fn label(self) -> &'static str {
        match self {
            TimerStatus::Stopped => "stopped",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TimerEvent {
    Tick { at_ms: u64, remaining: u32 },
    Alarm { at_ms: u64, target: u32 },
    Finished { at_ms: u64 },
    Bell(BellEvent),
}

impl TimerEvent {
    pub fn at_ms(&self) -> u64 {
        match self {
            TimerEvent::Tick { at_ms, .. }
            | TimerEvent::Alarm { at_ms, .. }
            | TimerEvent::Finished { at_ms }
            | TimerEvent::Bell(BellEvent::CuePlayed { at_ms, .. })
            | TimerEvent::Bell(BellEvent::RingingCleared { at_ms }) => *at_ms,
        }
    }
}

pub struct DebateTimer {
    speech: Option<Speech>,
    status: TimerStatus,
    current_time: u32,
    last_alarm_mark: Option<u32>,
    bell: BellTrigger,
    now_ms: u64,
    next_tick_ms: Option<u64>,
}

impl DebateTimer {
    pub fn new(bell: BellTrigger) -> Self {
        Self {
            speech: None,
            status: TimerStatus::Stopped,
            current_time: 0,
            last_alarm_mark: None,
            bell,
            now_ms: 0,
            next_tick_ms: None,
        }
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    /// Remaining seconds of the loaded speech.
    pub fn current_time(&self) -> u32 {
        self.current_time
    }

    pub fn last_alarm_mark(&self) -> Option<u32> {
        self.last_alarm_mark
    }

    pub fn ringing_count(&self) -> u32 {
        self.bell.ringing_count()
    }

    pub fn speech(&self) -> Option<&Speech> {
        self.speech.as_ref()
    }

    pub fn bell(&self) -> &BellTrigger {
        &self.bell
    }

    pub fn bell_mut(&mut self) -> &mut BellTrigger {
        &mut self.bell
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn load_speech(&mut self, speech: Speech) {
        debug!(id = %speech.id, duration = speech.duration, "speech loaded");
        self.current_time = speech.duration;
        self.speech = Some(speech);
        self.status = TimerStatus::Stopped;
        self.last_alarm_mark = None;
        self.next_tick_ms = None;
    }

    /// Running pauses; stopped or paused starts. A finished speech stays
    /// finished until it is stopped or another speech is loaded.
    pub fn toggle(&mut self) -> Vec<TimerEvent> {
        self.bell.unlock();
        match self.status {
            TimerStatus::Running => {
                self.status = TimerStatus::Paused;
                self.next_tick_ms = None;
                debug!(remaining = self.current_time, "timer paused");
                Vec::new()
            }
            TimerStatus::Stopped | TimerStatus::Paused => {
                if self.speech.is_none() {
                    return Vec::new();
                }
                self.status = TimerStatus::Running;
                self.next_tick_ms = Some(self.now_ms.saturating_add(TICK_MS));
                debug!(remaining = self.current_time, "timer running");
                let mut events = self.check_finish();
                events.extend(self.check_alarms());
                events
            }
            TimerStatus::Finished => Vec::new(),
        }
    }

    pub fn stop(&mut self) {
        self.status = TimerStatus::Stopped;
        self.next_tick_ms = None;
        self.last_alarm_mark = None;
        if let Some(speech) = &self.speech {
            self.current_time = speech.duration;
        }
    }

    /// One elapsed second. Does nothing unless running with a speech loaded.
    pub fn tick(&mut self) -> Vec<TimerEvent> {
        if self.status != TimerStatus::Running || self.speech.is_none() {
            return Vec::new();
        }
        self.current_time = self.current_time.saturating_sub(1);
        let mut events = vec![TimerEvent::Tick {
            at_ms: self.now_ms,
            remaining: self.current_time,
        }];
        events.extend(self.check_finish());
        events.extend(self.check_alarms());
        events
    }

    /// Moves the clock forward by `elapsed_ms`, releasing whole-second ticks
    /// (counted from the last start) and due bell actions in time order.
    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<TimerEvent> {
        let target = self.now_ms.saturating_add(elapsed_ms);
        let mut events = Vec::new();
        loop {
            let tick_at = self.next_tick_ms.filter(|at| *at <= target);
            let bell_at = self.bell.next_due_ms().filter(|at| *at <= target);
            match (tick_at, bell_at) {
                (_, Some(bell_at)) if tick_at.is_none_or(|tick_at| bell_at <= tick_at) => {
                    self.now_ms = self.now_ms.max(bell_at);
                    events.extend(self.advance_bell(bell_at));
                }
                (Some(tick_at), _) => {
                    self.now_ms = tick_at;
                    events.extend(self.advance_bell(tick_at));
                    self.next_tick_ms = Some(tick_at.saturating_add(TICK_MS));
                    events.extend(self.tick());
                }
                _ => break,
            }
        }
        self.now_ms = target;
        events.extend(self.advance_bell(target));
        events
    }

    /// Plays the configured cue once, outside any alarm.
    pub fn preview_bell(&mut self) -> Vec<TimerEvent> {
        self.bell.preview().into_iter().map(TimerEvent::Bell).collect()
    }

    fn advance_bell(&mut self, now_ms: u64) -> Vec<TimerEvent> {
        self.bell
            .advance_to(now_ms)
            .into_iter()
            .map(TimerEvent::Bell)
            .collect()
    }

    fn check_finish(&mut self) -> Vec<TimerEvent> {
        if self.status != TimerStatus::Running || self.current_time > 0 {
            return Vec::new();
        }
        self.status = TimerStatus::Finished;
        self.next_tick_ms = None;
        if let Some(speech) = &self.speech {
            info!(id = %speech.id, "speech finished");
            // A checkpoint at zero is rung by the end bell, not on its own.
            if speech.alarm_times.contains(&0) {
                debug!("zero checkpoint folded into the end bell");
                self.last_alarm_mark = Some(0);
            }
        }
        let mut events = vec![TimerEvent::Finished { at_ms: self.now_ms }];
        events.extend(self.ring());
        events
    }

    // Integer seconds make the half-second tolerance an exact match.
    fn check_alarms(&mut self) -> Vec<TimerEvent> {
        if self.status != TimerStatus::Running {
            return Vec::new();
        }
        let Some(speech) = &self.speech else {
            return Vec::new();
        };
        let current = self.current_time;
        let targets = speech.alarm_times.clone();

        let mut events = Vec::new();
        for target in &targets {
            if current == *target && self.last_alarm_mark != Some(*target) {
                info!(target, "alarm checkpoint reached");
                self.last_alarm_mark = Some(*target);
                events.push(TimerEvent::Alarm {
                    at_ms: self.now_ms,
                    target: *target,
                });
                events.extend(self.ring());
            }
        }

        let near_any = targets
            .iter()
            .any(|target| current.abs_diff(*target) < ALARM_RELEASE_DISTANCE);
        if !near_any && self.last_alarm_mark.is_some() {
            self.last_alarm_mark = None;
        }
        events
    }

    fn ring(&mut self) -> Vec<TimerEvent> {
        let times = self.bell.settings().repetitions;
        self.bell
            .trigger(times)
            .into_iter()
            .map(TimerEvent::Bell)
            .collect()
    }
}
