use serde::Serialize;

use crate::schedule::speech::Speech;

/// Where a running speech currently sits relative to its protected windows.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechPhase {
    Preparation,
    ProtectedOpening,
    FirstHalf,
    SecondHalf,
    ProtectedClosing,
}

impl SpeechPhase {
    pub fn of(speech: &Speech, remaining: u32) -> Self {
        if speech.is_prep {
            return SpeechPhase::Preparation;
        }
        let remaining = remaining.min(speech.duration);
        let elapsed = speech.duration - remaining;
        if !speech.skip_initial_bell && elapsed < speech.protected_seconds {
            return SpeechPhase::ProtectedOpening;
        }
        // elapsed < duration / 2 without losing the half second
        if u64::from(elapsed) * 2 < u64::from(speech.duration) {
            return SpeechPhase::FirstHalf;
        }
        if remaining > speech.protected_seconds {
            return SpeechPhase::SecondHalf;
        }
        SpeechPhase::ProtectedClosing
    }

    pub fn label(self) -> &'static str {
        match self {
            SpeechPhase::Preparation => "prep",
            SpeechPhase::ProtectedOpening => "protected",
            SpeechPhase::FirstHalf => "open",
            SpeechPhase::SecondHalf => "closing",
            SpeechPhase::ProtectedClosing => "protected-end",
        }
    }
}

/// Share of the speech already used, 0.0 to 100.0.
pub fn progress_percent(duration: u32, remaining: u32) -> f64 {
    if duration == 0 {
        return 0.0;
    }
    let elapsed = duration.saturating_sub(remaining);
    f64::from(elapsed) * 100.0 / f64::from(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speech(duration: u32, protected_seconds: u32) -> Speech {
        Speech::new("s", "Speech", duration, protected_seconds, Vec::new())
    }

    #[test]
    fn walks_through_phases_of_standard_speech() {
        let speech = speech(480, 60);
        assert_eq!(SpeechPhase::of(&speech, 480), SpeechPhase::ProtectedOpening);
        assert_eq!(SpeechPhase::of(&speech, 421), SpeechPhase::ProtectedOpening);
        assert_eq!(SpeechPhase::of(&speech, 420), SpeechPhase::FirstHalf);
        assert_eq!(SpeechPhase::of(&speech, 241), SpeechPhase::FirstHalf);
        assert_eq!(SpeechPhase::of(&speech, 240), SpeechPhase::SecondHalf);
        assert_eq!(SpeechPhase::of(&speech, 61), SpeechPhase::SecondHalf);
        assert_eq!(SpeechPhase::of(&speech, 60), SpeechPhase::ProtectedClosing);
        assert_eq!(SpeechPhase::of(&speech, 0), SpeechPhase::ProtectedClosing);
    }

    #[test]
    fn skip_initial_bell_starts_in_open_phase() {
        let mut speech = speech(300, 30);
        speech.skip_initial_bell = true;
        assert_eq!(SpeechPhase::of(&speech, 300), SpeechPhase::FirstHalf);
    }

    #[test]
    fn prep_is_always_preparation() {
        let mut speech = speech(900, 0);
        speech.is_prep = true;
        assert_eq!(SpeechPhase::of(&speech, 10), SpeechPhase::Preparation);
    }

    #[test]
    fn progress_handles_empty_speech() {
        assert_eq!(progress_percent(0, 0), 0.0);
        assert_eq!(progress_percent(200, 150), 25.0);
        assert_eq!(progress_percent(200, 0), 100.0);
    }
}
