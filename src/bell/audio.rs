//! Speaker output through rodio. Each cue plays on its own short-lived
//! thread so `play` returns immediately.

use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use rodio::source::SineWave;
use rodio::{Decoder, OutputStream, Sink, Source};
use tracing::{debug, warn};

use crate::bell::player::{Cue, CuePlayer, TerminalCuePlayer, ToneVariant};

/// One sine component of a synthesized cue, faded out over its length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partial {
    pub freq_hz: f32,
    pub secs: f32,
    pub gain: f32,
}

const fn partial(freq_hz: f32, secs: f32, gain: f32) -> Partial {
    Partial {
        freq_hz,
        secs,
        gain,
    }
}

const BELL_BASE_HZ: f32 = 500.0;
const BELL_SECS: f32 = 2.5;

const REAL_BELL: [Partial; 4] = [
    partial(BELL_BASE_HZ, BELL_SECS, 0.5),
    partial(BELL_BASE_HZ * 2.1, BELL_SECS * 0.8, 0.3),
    partial(BELL_BASE_HZ * 3.5, BELL_SECS * 0.6, 0.1),
    partial(BELL_BASE_HZ * 4.8, BELL_SECS * 0.5, 0.05),
];

const DIGITAL: [Partial; 2] = [partial(880.0, 0.3, 0.1), partial(1_760.0, 0.3, 0.1)];

const GRAVE: [Partial; 2] = [partial(150.0, 0.5, 0.3), partial(100.0, 0.6, 0.5)];

pub fn partials(variant: ToneVariant) -> &'static [Partial] {
    match variant {
        ToneVariant::RealBell => &REAL_BELL,
        ToneVariant::Digital => &DIGITAL,
        ToneVariant::Grave => &GRAVE,
    }
}

/// Plays tones and clips on the default output device. Without a device it
/// rings the terminal bell instead.
pub struct RodioCuePlayer {
    device_ok: bool,
    fallback: TerminalCuePlayer,
}

impl RodioCuePlayer {
    pub fn new() -> Self {
        let device_ok = OutputStream::try_default().is_ok();
        if !device_ok {
            warn!("no audio output device; falling back to the terminal bell");
        }
        Self {
            device_ok,
            fallback: TerminalCuePlayer,
        }
    }
}

impl CuePlayer for RodioCuePlayer {
    fn prepare(&mut self) -> Result<()> {
        self.device_ok = OutputStream::try_default().is_ok();
        if !self.device_ok {
            bail!("no default audio output device");
        }
        Ok(())
    }

    fn play(&mut self, cue: &Cue) -> Result<()> {
        if !self.device_ok {
            return self.fallback.play(cue);
        }
        if let Cue::Clip { file_name, data } = cue {
            Decoder::new(Cursor::new(Arc::clone(data)))
                .with_context(|| format!("unable to decode clip {file_name}"))?;
        }
        let cue = cue.clone();
        thread::spawn(move || play_blocking(&cue));
        Ok(())
    }
}

fn play_blocking(cue: &Cue) {
    let Ok((_stream, handle)) = OutputStream::try_default() else {
        warn!(%cue, "audio output went away");
        return;
    };
    let sinks: Vec<Sink> = match cue {
        Cue::Tone(variant) => partials(*variant)
            .iter()
            .filter_map(|partial| {
                let sink = Sink::try_new(&handle).ok()?;
                let mut tone = SineWave::new(partial.freq_hz)
                    .take_duration(Duration::from_secs_f32(partial.secs));
                tone.set_filter_fadeout();
                sink.append(tone.amplify(partial.gain));
                Some(sink)
            })
            .collect(),
        Cue::Clip { data, .. } => {
            let Ok(source) = Decoder::new(Cursor::new(Arc::clone(data))) else {
                return;
            };
            let Ok(sink) = Sink::try_new(&handle) else {
                return;
            };
            sink.append(source);
            vec![sink]
        }
    };
    debug!(%cue, sinks = sinks.len(), "cue playing");
    for sink in sinks {
        sink.sleep_until_end();
    }
}
