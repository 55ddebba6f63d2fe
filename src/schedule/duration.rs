use serde::Serialize;

/// A minutes/seconds pair as entered on a configuration form.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct ClockTime {
    pub minutes: u32,
    pub seconds: u32,
}

impl ClockTime {
    pub const fn new(minutes: u32, seconds: u32) -> Self {
        Self { minutes, seconds }
    }

    pub fn total_seconds(self) -> u32 {
        to_seconds(self.minutes, self.seconds)
    }
}

pub fn to_seconds(minutes: u32, seconds: u32) -> u32 {
    minutes.saturating_mul(60).saturating_add(seconds)
}

/// Renders remaining seconds as `MM:SS`; minutes keep growing past 99.
pub fn format_clock(total_seconds: u32) -> String {
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}
