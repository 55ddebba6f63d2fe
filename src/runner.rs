//! Drivers that feed time and operator commands into a [`SpeechQueue`].
//!
//! `simulate` runs on a virtual clock and returns the event log. `run_live`
//! owns the queue on the calling thread and serializes keyboard and API
//! commands with the clock through one channel.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::Local;
use tracing::{debug, info, warn};

use crate::api::{ApiServer, ApiServerConfig};
use crate::bell::trigger::BellEvent;
use crate::clock::ClockSource;
use crate::schedule::duration::format_clock;
use crate::timer::engine::{TICK_MS, TimerEvent, TimerStatus};
use crate::timer::queue::{QueueCommand, SessionEvent, SpeechQueue};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Default)]
pub struct SimulateOptions {
    /// Queue index to start from.
    pub speech: Option<usize>,
    /// Keep going through the rest of the queue with auto-advance on.
    pub all: bool,
    /// Seconds into each speech at which to pause.
    pub pause_at: Option<u32>,
    pub resume_after: u32,
}

/// Runs the selected speech (or the rest of the queue) to completion on a
/// virtual clock and returns one line per observable event.
pub fn simulate(queue: &mut SpeechQueue, options: &SimulateOptions) -> Result<Vec<String>> {
    if queue.speeches().is_empty() {
        bail!("the session has no speeches to simulate");
    }
    if let Some(index) = options.speech {
        if index >= queue.speeches().len() {
            bail!(
                "speech index {index} is out of range; the queue has {} speeches",
                queue.speeches().len()
            );
        }
        queue.select(index);
    }
    if options.all {
        queue.set_auto_advance(true);
    }

    let mut lines = Vec::new();
    lines.push(stamp(queue.timer().now_ms(), &describe_load(queue, queue.index())));

    loop {
        let started_ms = queue.timer().now_ms();
        let mut events = queue.toggle();
        lines.push(stamp(started_ms, "start"));
        let mut paused = false;

        while !has_finished(&events) {
            record(queue, &events, &mut lines);
            let now = queue.timer().now_ms();
            if let Some(pause_at) = options.pause_at
                && !paused
                && now - started_ms >= u64::from(pause_at) * 1_000
            {
                paused = true;
                queue.toggle();
                lines.push(stamp(now, "pause"));
                let held = queue.advance(u64::from(options.resume_after) * 1_000);
                record(queue, &held, &mut lines);
                lines.push(stamp(queue.timer().now_ms(), "resume"));
                events = queue.toggle();
                continue;
            }
            events = queue.advance(TICK_MS);
        }
        record(queue, &events, &mut lines);

        let moved_on = events
            .iter()
            .any(|event| matches!(event, SessionEvent::Loaded { .. }));
        if !options.all || !moved_on {
            break;
        }
    }

    // Let queued repetitions and the ringing clear play out.
    while let Some(due) = queue.timer().bell().next_due_ms() {
        let elapsed = due.saturating_sub(queue.timer().now_ms());
        let events = queue.advance(elapsed);
        record(queue, &events, &mut lines);
    }
    Ok(lines)
}

fn has_finished(events: &[SessionEvent]) -> bool {
    events
        .iter()
        .any(|event| matches!(event, SessionEvent::Timer(TimerEvent::Finished { .. })))
}

fn record(queue: &SpeechQueue, events: &[SessionEvent], lines: &mut Vec<String>) {
    for event in events {
        if let Some(text) = describe(queue, event) {
            lines.push(stamp(event_time(event), &text));
        }
    }
}

fn event_time(event: &SessionEvent) -> u64 {
    match event {
        SessionEvent::Timer(event) => event.at_ms(),
        SessionEvent::Loaded { at_ms, .. } => *at_ms,
        SessionEvent::Rejected { .. } => 0,
    }
}

/// Human-readable form of an event. Plain ticks are not reported.
pub fn describe(queue: &SpeechQueue, event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Timer(TimerEvent::Tick { .. }) => None,
        SessionEvent::Timer(TimerEvent::Alarm { target, .. }) => {
            Some(format!("alarm at {} remaining", format_clock(*target)))
        }
        SessionEvent::Timer(TimerEvent::Finished { .. }) => Some("finished".to_string()),
        SessionEvent::Timer(TimerEvent::Bell(BellEvent::CuePlayed { cue, .. })) => {
            Some(format!("cue {cue}"))
        }
        SessionEvent::Timer(TimerEvent::Bell(BellEvent::RingingCleared { .. })) => {
            Some("ringing cleared".to_string())
        }
        SessionEvent::Loaded { index, .. } => Some(describe_load(queue, *index)),
        SessionEvent::Rejected { command, reason } => {
            Some(format!("rejected {command:?}: {reason}"))
        }
    }
}

fn describe_load(queue: &SpeechQueue, index: usize) -> String {
    match queue.speeches().get(index) {
        Some(speech) => format!(
            "load #{index} {:?} {}",
            speech.title,
            format_clock(speech.duration)
        ),
        None => format!("load #{index}"),
    }
}

fn stamp(at_ms: u64, text: &str) -> String {
    let minutes = at_ms / 60_000;
    let seconds = (at_ms / 1_000) % 60;
    let millis = at_ms % 1_000;
    format!("[{minutes:02}:{seconds:02}.{millis:03}] {text}")
}

/// Parses one line of keyboard input.
pub fn parse_key_command(line: &str) -> Option<QueueCommand> {
    let line = line.trim();
    let (key, rest) = match line.split_once(char::is_whitespace) {
        Some((key, rest)) => (key, rest.trim()),
        None => (line, ""),
    };
    match (key, rest) {
        ("p", "") => Some(QueueCommand::Toggle),
        ("s", "") => Some(QueueCommand::Stop),
        ("n", "") => Some(QueueCommand::Next),
        ("b", "") => Some(QueueCommand::Prev),
        ("a", "") => Some(QueueCommand::ToggleAutoAdvance),
        ("t", "") => Some(QueueCommand::TestBell),
        ("q", "") => Some(QueueCommand::Quit),
        ("g", index) => index.parse().ok().map(QueueCommand::Select),
        _ => None,
    }
}

pub struct RunOptions {
    pub api: Option<ApiServerConfig>,
}

pub fn run_live(
    mut queue: SpeechQueue,
    mut clock: Box<dyn ClockSource>,
    options: RunOptions,
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<QueueCommand>();
    let api_server = match options.api {
        Some(config) => Some(ApiServer::start(config, tx.clone())?),
        None => None,
    };
    spawn_keyboard_reader(tx);

    println!(
        "debate timer started {} ({} clock, {} speeches)",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        clock.label(),
        queue.speeches().len()
    );
    println!("keys: p start/pause, s stop, n next, b back, g N select, a auto-advance, t test bell, q quit");
    println!("{}", describe_load(&queue, queue.index()));

    let mut last_shown = None;
    let mut announced_done = false;
    loop {
        let mut events = Vec::new();
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(QueueCommand::Quit) => break,
            Ok(command) => {
                debug!(?command, "operator command");
                let elapsed = clock.elapsed_ms().saturating_sub(queue.timer().now_ms());
                events.extend(queue.advance(elapsed));
                events.extend(queue.apply(command));
            }
            Err(RecvTimeoutError::Timeout) => {}
            // keyboard and API are both gone; count out what is running
            Err(RecvTimeoutError::Disconnected) => {
                let timer = queue.timer();
                if timer.status() != TimerStatus::Running && timer.bell().is_idle() {
                    break;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
        let elapsed = clock.elapsed_ms().saturating_sub(queue.timer().now_ms());
        events.extend(queue.advance(elapsed));

        for event in &events {
            if let Some(text) = describe(&queue, event) {
                println!("{} {text}", Local::now().format("%H:%M:%S"));
            }
        }

        let shown = (
            queue.index(),
            queue.timer().status(),
            queue.timer().current_time(),
        );
        if last_shown != Some(shown) {
            last_shown = Some(shown);
            print_status(&queue);
        }
        if is_done(&queue) && !announced_done {
            announced_done = true;
            println!("all speeches finished");
        }
        if let Some(server) = &api_server {
            server.publish(queue.snapshot());
        }
    }

    info!("timer loop finished");
    Ok(())
}

fn print_status(queue: &SpeechQueue) {
    let snapshot = queue.snapshot();
    let title = snapshot.title.as_deref().unwrap_or("-");
    let phase = snapshot.phase.map(|phase| phase.label()).unwrap_or("-");
    let marker = if snapshot.ringing_count > 0 { " *" } else { "" };
    let auto = if queue.auto_advance() { " auto" } else { "" };
    println!(
        "[{}/{}] {title} {} {} ({phase}){marker}{auto}",
        snapshot.index + 1,
        snapshot.total,
        snapshot.display,
        snapshot.status.label(),
    );
    let _ = io::stdout().flush();
}

fn spawn_keyboard_reader(tx: Sender<QueueCommand>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!("stdin read failed: {err}");
                    break;
                }
            };
            match parse_key_command(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => eprintln!("unknown command {:?}", line.trim()),
            }
        }
        debug!("keyboard input closed");
    });
}

/// True when the queue has nothing left to count.
pub fn is_done(queue: &SpeechQueue) -> bool {
    queue.is_last() && queue.timer().status() == TimerStatus::Finished
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bell::player::RecordingCuePlayer;
    use crate::bell::settings::BellSettings;
    use crate::bell::trigger::BellTrigger;
    use crate::schedule::speech::Speech;
    use crate::timer::engine::DebateTimer;

    fn queue_with(
        speeches: Vec<Speech>,
        settings: BellSettings,
    ) -> (SpeechQueue, RecordingCuePlayer) {
        let recorder = RecordingCuePlayer::new();
        let bell = BellTrigger::new(Box::new(recorder.clone()), settings);
        (SpeechQueue::new(speeches, DebateTimer::new(bell)), recorder)
    }

    #[test]
    fn simulation_reports_alarms_and_finish_in_order() {
        let speech = Speech::new("s-1", "Opening", 10, 3, vec![7, 3]);
        let (mut queue, recorder) = queue_with(vec![speech], BellSettings::default());
        let lines = simulate(&mut queue, &SimulateOptions::default()).expect("simulate");

        assert_eq!(lines[0], "[00:00.000] load #0 \"Opening\" 00:10");
        assert_eq!(lines[1], "[00:00.000] start");
        assert!(lines.contains(&"[00:03.000] alarm at 00:07 remaining".to_string()));
        assert!(lines.contains(&"[00:07.000] alarm at 00:03 remaining".to_string()));
        assert!(lines.contains(&"[00:10.000] finished".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("[00:11.500] ringing cleared"));
        assert_eq!(recorder.played().len(), 3);
    }

    #[test]
    fn finish_rings_configured_repetitions() {
        let speech = Speech::new("s-1", "Reply", 2, 0, Vec::new());
        let settings = BellSettings {
            repetitions: 3,
            interval_ms: 500,
            ..BellSettings::default()
        };
        let (mut queue, recorder) = queue_with(vec![speech], settings);
        let lines = simulate(&mut queue, &SimulateOptions::default()).expect("simulate");
        let cue_lines: Vec<_> = lines.iter().filter(|line| line.contains("cue ")).collect();
        assert_eq!(cue_lines.len(), 3);
        assert!(cue_lines[2].starts_with("[00:03.000]"));
        assert_eq!(recorder.played().len(), 3);
    }

    #[test]
    fn pause_shifts_later_alarms() {
        let speech = Speech::new("s-1", "Opening", 10, 3, vec![7, 3]);
        let (mut queue, _recorder) = queue_with(vec![speech], BellSettings::default());
        let options = SimulateOptions {
            pause_at: Some(5),
            resume_after: 4,
            ..SimulateOptions::default()
        };
        let lines = simulate(&mut queue, &options).expect("simulate");
        assert!(lines.contains(&"[00:05.000] pause".to_string()));
        assert!(lines.contains(&"[00:09.000] resume".to_string()));
        assert!(lines.contains(&"[00:11.000] alarm at 00:03 remaining".to_string()));
        assert!(lines.contains(&"[00:14.000] finished".to_string()));
    }

    #[test]
    fn all_walks_the_whole_queue() {
        let speeches = vec![
            Speech::new("a", "First", 2, 0, Vec::new()),
            Speech::new("b", "Second", 3, 0, Vec::new()),
        ];
        let (mut queue, _recorder) = queue_with(speeches, BellSettings::default());
        let options = SimulateOptions {
            all: true,
            ..SimulateOptions::default()
        };
        let lines = simulate(&mut queue, &options).expect("simulate");
        assert!(lines.contains(&"[00:02.000] load #1 \"Second\" 00:03".to_string()));
        assert!(lines.contains(&"[00:05.000] finished".to_string()));
        assert!(is_done(&queue));
    }

    #[test]
    fn rejects_out_of_range_start() {
        let speech = Speech::new("a", "Only", 5, 0, Vec::new());
        let (mut queue, _recorder) = queue_with(vec![speech], BellSettings::default());
        let options = SimulateOptions {
            speech: Some(3),
            ..SimulateOptions::default()
        };
        let err = simulate(&mut queue, &options).expect_err("index out of range");
        assert!(err.to_string().contains("speech index 3 is out of range"));
    }

    #[test]
    fn empty_queue_is_an_error() {
        let (mut queue, _recorder) = queue_with(Vec::new(), BellSettings::default());
        assert!(simulate(&mut queue, &SimulateOptions::default()).is_err());
    }

    #[test]
    fn parses_keyboard_commands() {
        assert_eq!(parse_key_command("p"), Some(QueueCommand::Toggle));
        assert_eq!(parse_key_command(" s "), Some(QueueCommand::Stop));
        assert_eq!(parse_key_command("g 4"), Some(QueueCommand::Select(4)));
        assert_eq!(parse_key_command("g x"), None);
        assert_eq!(parse_key_command("g"), None);
        assert_eq!(parse_key_command("t"), Some(QueueCommand::TestBell));
        assert_eq!(parse_key_command("q"), Some(QueueCommand::Quit));
        assert_eq!(parse_key_command("p now"), None);
    }

    #[test]
    fn stamps_use_minutes_seconds_and_millis() {
        assert_eq!(stamp(0, "x"), "[00:00.000] x");
        assert_eq!(stamp(61_500, "x"), "[01:01.500] x");
    }
}
