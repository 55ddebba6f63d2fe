use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::bell::settings::{BellSettings, BellSound};
use crate::schedule::builder::{
    BpConfig, CustomConfig, CustomSpeechConfig, DEFAULT_PROTECTED_SECONDS, DebateFormat,
    FormatKind, PrepConfig, WsdcConfig,
};
use crate::schedule::duration::ClockTime;
use crate::schedule::speech::Speech;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub bell: BellSettings,
    pub custom_clip: Option<PathBuf>,
    pub auto_advance: bool,
    pub prep: PrepConfig,
    pub format: DebateFormat,
}

impl SessionConfig {
    pub fn default_for(kind: FormatKind) -> Self {
        Self {
            bell: BellSettings::default(),
            custom_clip: None,
            auto_advance: false,
            prep: PrepConfig::default(),
            format: DebateFormat::default_for(kind),
        }
    }

    /// Alarm points are resolved here, once; later settings changes do not
    /// touch an already built queue.
    pub fn build_queue(&self) -> Vec<Speech> {
        crate::schedule::builder::build_queue(&self.format, &self.prep)
    }
}

pub fn load_session_config(path: &Path) -> Result<SessionConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read session file {}", path.display()))?;
    let mut config = parse_session_config_text(&content)?;
    if let Some(clip) = config.custom_clip.take() {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.custom_clip = Some(base.join(clip));
    }
    Ok(config)
}

pub fn parse_session_config_text(content: &str) -> Result<SessionConfig> {
    let raw = serde_json::from_str::<SessionConfigFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    if raw.version != CONFIG_VERSION {
        bail!(
            "unsupported session config version {}; expected version {CONFIG_VERSION}",
            raw.version
        );
    }

    let bell = BellSettings {
        sound: raw.bell.sound,
        repetitions: raw.bell.repetitions,
        interval_ms: raw.bell.interval_ms,
    };
    bell.validate().context("invalid bell settings")?;

    let prep = PrepConfig {
        enabled: raw.prep.enabled,
        duration: clock_time(raw.prep.duration(), "prep")?,
        alarms: raw.prep.alarms,
    };

    let format = match raw.format {
        FormatFile::Wsdc {
            protected_seconds,
            opening,
            argument,
            rebuttal,
            reply,
            reply_alarm,
        } => {
            let defaults = WsdcConfig::default();
            DebateFormat::Wsdc(WsdcConfig {
                protected_seconds,
                opening: clock_time_or(opening, defaults.opening, "opening")?,
                argument: clock_time_or(argument, defaults.argument, "argument")?,
                rebuttal: clock_time_or(rebuttal, defaults.rebuttal, "rebuttal")?,
                reply: clock_time_or(reply, defaults.reply, "reply")?,
                reply_alarm: clock_time_or(reply_alarm, defaults.reply_alarm, "reply_alarm")?,
            })
        }
        FormatFile::Bp {
            protected_seconds,
            speech,
        } => DebateFormat::Bp(BpConfig {
            protected_seconds,
            speech: clock_time_or(speech, BpConfig::default().speech, "speech")?,
        }),
        FormatFile::Custom {
            protected_seconds,
            speeches,
        } => {
            let speeches = match speeches {
                None => CustomConfig::default().speeches,
                Some(entries) => entries
                    .into_iter()
                    .enumerate()
                    .map(|(index, entry)| -> Result<CustomSpeechConfig> {
                        if entry.title.trim().is_empty() {
                            bail!("custom speech {} must have a title", index + 1);
                        }
                        let field = format!("speeches[{index}]");
                        Ok(CustomSpeechConfig {
                            duration: clock_time(entry.duration(), &field)?,
                            title: entry.title,
                            skip_initial_bell: entry.skip_initial_bell,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            };
            DebateFormat::Custom(CustomConfig {
                protected_seconds,
                speeches,
            })
        }
    };

    Ok(SessionConfig {
        bell,
        custom_clip: raw.bell.custom_clip,
        auto_advance: raw.auto_advance,
        prep,
        format,
    })
}

pub fn save_session_config(path: &Path, config: &SessionConfig) -> Result<()> {
    let format = match &config.format {
        DebateFormat::Wsdc(wsdc) => json!({
            "kind": "wsdc",
            "protected_seconds": wsdc.protected_seconds,
            "opening": clock_json(wsdc.opening),
            "argument": clock_json(wsdc.argument),
            "rebuttal": clock_json(wsdc.rebuttal),
            "reply": clock_json(wsdc.reply),
            "reply_alarm": clock_json(wsdc.reply_alarm),
        }),
        DebateFormat::Bp(bp) => json!({
            "kind": "bp",
            "protected_seconds": bp.protected_seconds,
            "speech": clock_json(bp.speech),
        }),
        DebateFormat::Custom(custom) => {
            let speeches = custom
                .speeches
                .iter()
                .map(|speech| {
                    json!({
                        "title": speech.title,
                        "minutes": speech.duration.minutes,
                        "seconds": speech.duration.seconds,
                        "skip_initial_bell": speech.skip_initial_bell,
                    })
                })
                .collect::<Vec<_>>();
            json!({
                "kind": "custom",
                "protected_seconds": custom.protected_seconds,
                "speeches": speeches,
            })
        }
    };

    let custom_clip = config
        .custom_clip
        .as_ref()
        .map(|clip| Value::String(clip.display().to_string()))
        .unwrap_or(Value::Null);

    let payload = json!({
        "version": CONFIG_VERSION,
        "auto_advance": config.auto_advance,
        "bell": {
            "sound": config.bell.sound.token(),
            "repetitions": config.bell.repetitions,
            "interval_ms": config.bell.interval_ms,
            "custom_clip": custom_clip,
        },
        "prep": {
            "enabled": config.prep.enabled,
            "minutes": config.prep.duration.minutes,
            "seconds": config.prep.duration.seconds,
            "alarms": config.prep.alarms,
        },
        "format": format,
    });
    let text = serde_json::to_string_pretty(&payload)?;
    fs::write(path, format!("{text}\n"))
        .with_context(|| format!("unable to write session file {}", path.display()))?;
    Ok(())
}

fn clock_json(time: ClockTime) -> Value {
    json!({ "minutes": time.minutes, "seconds": time.seconds })
}

fn clock_time(raw: ClockTimeFile, field: &str) -> Result<ClockTime> {
    if raw.seconds > 59 {
        bail!(
            "{field}: seconds must be between 0 and 59, got {}",
            raw.seconds
        );
    }
    Ok(ClockTime::new(raw.minutes, raw.seconds))
}

fn clock_time_or(raw: Option<ClockTimeFile>, default: ClockTime, field: &str) -> Result<ClockTime> {
    match raw {
        Some(raw) => clock_time(raw, field),
        None => Ok(default),
    }
}

#[derive(Debug, Deserialize)]
struct SessionConfigFile {
    version: u32,
    #[serde(default)]
    auto_advance: bool,
    #[serde(default)]
    bell: BellSettingsFile,
    #[serde(default)]
    prep: PrepFile,
    format: FormatFile,
}

#[derive(Debug, Deserialize)]
struct BellSettingsFile {
    #[serde(default = "default_sound")]
    sound: BellSound,
    #[serde(default = "default_repetitions")]
    repetitions: u32,
    #[serde(default = "default_interval_ms")]
    interval_ms: u64,
    #[serde(default)]
    custom_clip: Option<PathBuf>,
}

impl Default for BellSettingsFile {
    fn default() -> Self {
        Self {
            sound: default_sound(),
            repetitions: default_repetitions(),
            interval_ms: default_interval_ms(),
            custom_clip: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PrepFile {
    #[serde(default)]
    enabled: bool,
    #[serde(default = "default_prep_minutes")]
    minutes: u32,
    #[serde(default)]
    seconds: u32,
    #[serde(default)]
    alarms: String,
}

impl PrepFile {
    fn duration(&self) -> ClockTimeFile {
        ClockTimeFile {
            minutes: self.minutes,
            seconds: self.seconds,
        }
    }
}

impl Default for PrepFile {
    fn default() -> Self {
        Self {
            enabled: false,
            minutes: default_prep_minutes(),
            seconds: 0,
            alarms: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
struct ClockTimeFile {
    #[serde(default)]
    minutes: u32,
    #[serde(default)]
    seconds: u32,
}

#[derive(Debug, Deserialize)]
struct CustomSpeechFile {
    title: String,
    #[serde(default)]
    minutes: u32,
    #[serde(default)]
    seconds: u32,
    #[serde(default)]
    skip_initial_bell: bool,
}

impl CustomSpeechFile {
    fn duration(&self) -> ClockTimeFile {
        ClockTimeFile {
            minutes: self.minutes,
            seconds: self.seconds,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum FormatFile {
    Wsdc {
        #[serde(default = "default_protected_seconds")]
        protected_seconds: u32,
        #[serde(default)]
        opening: Option<ClockTimeFile>,
        #[serde(default)]
        argument: Option<ClockTimeFile>,
        #[serde(default)]
        rebuttal: Option<ClockTimeFile>,
        #[serde(default)]
        reply: Option<ClockTimeFile>,
        #[serde(default)]
        reply_alarm: Option<ClockTimeFile>,
    },
    Bp {
        #[serde(default = "default_protected_seconds")]
        protected_seconds: u32,
        #[serde(default)]
        speech: Option<ClockTimeFile>,
    },
    Custom {
        #[serde(default = "default_protected_seconds")]
        protected_seconds: u32,
        #[serde(default)]
        speeches: Option<Vec<CustomSpeechFile>>,
    },
}

fn default_sound() -> BellSound {
    BellSound::RealBell
}

fn default_repetitions() -> u32 {
    BellSettings::default().repetitions
}

fn default_interval_ms() -> u64 {
    BellSettings::default().interval_ms
}

fn default_prep_minutes() -> u32 {
    PrepConfig::default().duration.minutes
}

fn default_protected_seconds() -> u32 {
    DEFAULT_PROTECTED_SECONDS
}
