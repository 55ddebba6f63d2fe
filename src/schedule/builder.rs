use crate::schedule::alarms::{compute_protected_alarms, parse_prep_alarms};
use crate::schedule::duration::ClockTime;
use crate::schedule::speech::Speech;

pub const DEFAULT_PROTECTED_SECONDS: u32 = 60;
pub const PREP_SPEECH_ID: &str = "prep-time";
pub const PREP_SPEECH_TITLE: &str = "Preparation Time";

const WSDC_TITLES: [&str; 8] = [
    "Government Opening",
    "Opposition Opening",
    "Government Argument",
    "Opposition Argument",
    "Government Rebuttal",
    "Opposition Rebuttal",
    "Opposition Reply",
    "Government Reply",
];

const BP_TITLES: [&str; 8] = [
    "Prime Minister",
    "Leader of the Opposition",
    "Deputy Prime Minister",
    "Deputy Leader of the Opposition",
    "Member of the Government",
    "Member of the Opposition",
    "Government Whip",
    "Opposition Whip",
];

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PrepConfig {
    pub enabled: bool,
    pub duration: ClockTime,
    /// Comma separated minutes, e.g. `"10, 5, 1"`.
    pub alarms: String,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration: ClockTime::new(15, 0),
            alarms: String::new(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WsdcConfig {
    pub protected_seconds: u32,
    pub opening: ClockTime,
    pub argument: ClockTime,
    pub rebuttal: ClockTime,
    pub reply: ClockTime,
    /// Remaining time at which reply speeches ring, instead of the
    /// protected-window pair.
    pub reply_alarm: ClockTime,
}

impl Default for WsdcConfig {
    fn default() -> Self {
        Self {
            protected_seconds: DEFAULT_PROTECTED_SECONDS,
            opening: ClockTime::new(8, 0),
            argument: ClockTime::new(8, 0),
            rebuttal: ClockTime::new(8, 0),
            reply: ClockTime::new(4, 0),
            reply_alarm: ClockTime::new(1, 0),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BpConfig {
    pub protected_seconds: u32,
    pub speech: ClockTime,
}

impl Default for BpConfig {
    fn default() -> Self {
        Self {
            protected_seconds: DEFAULT_PROTECTED_SECONDS,
            speech: ClockTime::new(7, 0),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CustomSpeechConfig {
    pub title: String,
    pub duration: ClockTime,
    pub skip_initial_bell: bool,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CustomConfig {
    pub protected_seconds: u32,
    pub speeches: Vec<CustomSpeechConfig>,
}

impl Default for CustomConfig {
    fn default() -> Self {
        Self {
            protected_seconds: DEFAULT_PROTECTED_SECONDS,
            speeches: vec![CustomSpeechConfig {
                title: "Speech 1".to_string(),
                duration: ClockTime::new(5, 0),
                skip_initial_bell: false,
            }],
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FormatKind {
    Wsdc,
    Bp,
    Custom,
}

impl FormatKind {
    pub fn label(self) -> &'static str {
        match self {
            FormatKind::Wsdc => "WSDC",
            FormatKind::Bp => "British Parliamentary",
            FormatKind::Custom => "Custom",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DebateFormat {
    Wsdc(WsdcConfig),
    Bp(BpConfig),
    Custom(CustomConfig),
}

impl DebateFormat {
    pub fn default_for(kind: FormatKind) -> Self {
        match kind {
            FormatKind::Wsdc => DebateFormat::Wsdc(WsdcConfig::default()),
            FormatKind::Bp => DebateFormat::Bp(BpConfig::default()),
            FormatKind::Custom => DebateFormat::Custom(CustomConfig::default()),
        }
    }

    pub fn kind(&self) -> FormatKind {
        match self {
            DebateFormat::Wsdc(_) => FormatKind::Wsdc,
            DebateFormat::Bp(_) => FormatKind::Bp,
            DebateFormat::Custom(_) => FormatKind::Custom,
        }
    }
}

/// Resolves a format and its prep settings into the ordered speech queue.
pub fn build_queue(format: &DebateFormat, prep: &PrepConfig) -> Vec<Speech> {
    match format {
        DebateFormat::Wsdc(config) => create_wsdc_queue(config, prep),
        DebateFormat::Bp(config) => create_bp_queue(config, prep),
        DebateFormat::Custom(config) => create_custom_queue(config, prep),
    }
}

pub fn create_wsdc_queue(config: &WsdcConfig, prep: &PrepConfig) -> Vec<Speech> {
    let durations = [
        config.opening.total_seconds(),
        config.opening.total_seconds(),
        config.argument.total_seconds(),
        config.argument.total_seconds(),
        config.rebuttal.total_seconds(),
        config.rebuttal.total_seconds(),
        config.reply.total_seconds(),
        config.reply.total_seconds(),
    ];
    let reply_alarm = config.reply_alarm.total_seconds();

    let speeches = WSDC_TITLES
        .iter()
        .zip(durations)
        .enumerate()
        .map(|(index, (title, duration))| {
            let alarm_times = if index >= 6 {
                vec![reply_alarm]
            } else {
                compute_protected_alarms(duration, config.protected_seconds, false)
            };
            Speech::new(
                format!("wsdc-{}", index + 1),
                *title,
                duration,
                config.protected_seconds,
                alarm_times,
            )
        })
        .collect();

    with_prep(speeches, prep)
}

pub fn create_bp_queue(config: &BpConfig, prep: &PrepConfig) -> Vec<Speech> {
    let duration = config.speech.total_seconds();
    let speeches = BP_TITLES
        .iter()
        .enumerate()
        .map(|(index, title)| {
            Speech::new(
                format!("bp-{index}"),
                *title,
                duration,
                config.protected_seconds,
                compute_protected_alarms(duration, config.protected_seconds, false),
            )
        })
        .collect();

    with_prep(speeches, prep)
}

pub fn create_custom_queue(config: &CustomConfig, prep: &PrepConfig) -> Vec<Speech> {
    let speeches = config
        .speeches
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let duration = entry.duration.total_seconds();
            let mut speech = Speech::new(
                format!("custom-{index}"),
                entry.title.clone(),
                duration,
                config.protected_seconds,
                compute_protected_alarms(
                    duration,
                    config.protected_seconds,
                    entry.skip_initial_bell,
                ),
            );
            speech.skip_initial_bell = entry.skip_initial_bell;
            speech
        })
        .collect();

    with_prep(speeches, prep)
}

/// The preparation block, or `None` when prep is disabled.
pub fn prep_speech(prep: &PrepConfig) -> Option<Speech> {
    if !prep.enabled {
        return None;
    }
    let mut speech = Speech::new(
        PREP_SPEECH_ID,
        PREP_SPEECH_TITLE,
        prep.duration.total_seconds(),
        0,
        parse_prep_alarms(&prep.alarms),
    );
    speech.is_prep = true;
    Some(speech)
}

fn with_prep(mut speeches: Vec<Speech>, prep: &PrepConfig) -> Vec<Speech> {
    if let Some(prep) = prep_speech(prep) {
        speeches.insert(0, prep);
    }
    speeches
}
