mod api;
mod bell;
mod clock;
mod config;
mod runner;
mod schedule;
mod timer;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::api::ApiServerConfig;
use crate::bell::player::{CuePlayer, RecordingCuePlayer, SilentCuePlayer};
use crate::bell::settings::load_custom_clip;
use crate::bell::trigger::BellTrigger;
use crate::clock::MonotonicClock;
use crate::config::{SessionConfig, load_session_config, save_session_config};
use crate::runner::{RunOptions, SimulateOptions};
use crate::schedule::builder::FormatKind;
use crate::schedule::duration::format_clock;
use crate::timer::engine::DebateTimer;
use crate::timer::queue::SpeechQueue;

const DEFAULT_CONFIG: &str = "debate-session.json";

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliFormat {
    Wsdc,
    Bp,
    Custom,
}

impl From<CliFormat> for FormatKind {
    fn from(value: CliFormat) -> Self {
        match value {
            CliFormat::Wsdc => FormatKind::Wsdc,
            CliFormat::Bp => FormatKind::Bp,
            CliFormat::Custom => FormatKind::Custom,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "debate-timer",
    version,
    about = "Speech queue timer with protected-time alarms for competitive debate"
)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG).
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a session file with the default settings for a format.
    Init {
        #[arg(long, value_enum, default_value_t = CliFormat::Wsdc)]
        format: CliFormat,

        #[arg(long, default_value = DEFAULT_CONFIG)]
        output: PathBuf,

        #[arg(long)]
        force: bool,
    },
    /// Print the resolved speech queue.
    Queue {
        #[command(flatten)]
        session: SessionArgs,

        #[arg(long)]
        json: bool,
    },
    /// Run speeches on a virtual clock and print every alarm and bell.
    Simulate {
        #[command(flatten)]
        session: SessionArgs,

        /// Queue index to simulate.
        #[arg(long, conflicts_with = "all")]
        speech: Option<usize>,

        /// Continue through the rest of the queue.
        #[arg(long)]
        all: bool,

        /// Pause this many seconds into each speech.
        #[arg(long)]
        pause_at: Option<u32>,

        #[arg(long, default_value_t = 5, requires = "pause_at")]
        resume_after: u32,
    },
    /// Count down in real time, driven from the keyboard or the local API.
    Run {
        #[command(flatten)]
        session: SessionArgs,

        /// Clock rate multiplier.
        #[arg(long, default_value_t = 1.0)]
        speed: f64,

        /// Do not play bell cues.
        #[arg(long)]
        mute: bool,

        /// Serve the local control API.
        #[arg(long)]
        api: bool,

        #[arg(long, default_value = "127.0.0.1")]
        api_bind: String,

        #[arg(long, default_value_t = 8099)]
        api_port: u16,
    },
}

#[derive(Args, Debug)]
struct SessionArgs {
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Init {
            format,
            output,
            force,
        } => init_session(&output, format.into(), force),
        Command::Queue { session, json } => {
            let config = load(&session.config)?;
            print_queue(&config, json)
        }
        Command::Simulate {
            session,
            speech,
            all,
            pause_at,
            resume_after,
        } => {
            let config = load(&session.config)?;
            let recorder = RecordingCuePlayer::new();
            let mut queue = build_session(&config, Box::new(recorder.clone()))?;
            let options = SimulateOptions {
                speech,
                all,
                pause_at,
                resume_after,
            };
            for line in runner::simulate(&mut queue, &options)? {
                println!("{line}");
            }
            println!("{} cues played", recorder.played().len());
            Ok(())
        }
        Command::Run {
            session,
            speed,
            mute,
            api,
            api_bind,
            api_port,
        } => {
            let config = load(&session.config)?;
            let clock = MonotonicClock::new(speed)?;
            let player: Box<dyn CuePlayer> = if mute {
                Box::new(SilentCuePlayer)
            } else {
                speaker()
            };
            let queue = build_session(&config, player)?;
            let api = api.then(|| ApiServerConfig {
                bind_addr: api_bind.clone(),
                port: api_port,
            });
            runner::run_live(queue, Box::new(clock), RunOptions { api }).with_context(|| {
                format!("timer session failed (API at {api_bind}:{api_port})")
            })
        }
    }
}

#[cfg(feature = "audio")]
fn speaker() -> Box<dyn CuePlayer> {
    Box::new(crate::bell::audio::RodioCuePlayer::new())
}

#[cfg(not(feature = "audio"))]
fn speaker() -> Box<dyn CuePlayer> {
    Box::new(crate::bell::player::TerminalCuePlayer)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load(path: &Path) -> Result<SessionConfig> {
    load_session_config(path).with_context(|| format!("failed to load {}", path.display()))
}

fn init_session(output: &Path, kind: FormatKind, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            output.display()
        );
    }
    let config = SessionConfig::default_for(kind);
    save_session_config(output, &config)?;
    println!("wrote {} session to {}", kind.label(), output.display());
    Ok(())
}

fn build_session(config: &SessionConfig, player: Box<dyn CuePlayer>) -> Result<SpeechQueue> {
    let mut bell = BellTrigger::new(player, config.bell);
    if let Some(path) = &config.custom_clip {
        let clip = load_custom_clip(path)?;
        debug!(file = %clip.file_name, bytes = clip.data.len(), "custom clip loaded");
        bell.set_custom_clip(Some(clip));
    }
    let mut queue = SpeechQueue::new(config.build_queue(), DebateTimer::new(bell));
    queue.set_auto_advance(config.auto_advance);
    Ok(queue)
}

fn print_queue(config: &SessionConfig, json: bool) -> Result<()> {
    let speeches = config.build_queue();
    if json {
        println!("{}", serde_json::to_string_pretty(&speeches)?);
        return Ok(());
    }

    println!(
        "{} format, {} speeches",
        config.format.kind().label(),
        speeches.len()
    );
    for (index, speech) in speeches.iter().enumerate() {
        let alarms = speech
            .alarm_times
            .iter()
            .map(|seconds| format_clock(*seconds))
            .collect::<Vec<_>>()
            .join(", ");
        let marker = if speech.is_prep { " (prep)" } else { "" };
        println!(
            "{index:>2}  {:<10} {:<24} {}  alarms: [{alarms}]{marker}",
            speech.id,
            speech.title,
            format_clock(speech.duration)
        );
    }
    Ok(())
}
