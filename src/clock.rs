use std::time::Instant;

use anyhow::{Result, bail};

/// Milliseconds of session time since the source was created.
pub trait ClockSource: Send {
    fn elapsed_ms(&mut self) -> u64;
    fn label(&self) -> &'static str;
}

/// `Instant`-backed clock, optionally running faster or slower than real time.
pub struct MonotonicClock {
    anchor: Instant,
    speed: f64,
    last_output_ms: u64,
}

impl MonotonicClock {
    pub fn new(speed: f64) -> Result<Self> {
        if !speed.is_finite() || speed <= 0.0 {
            bail!("--speed must be a positive number, got {speed}");
        }
        Ok(Self {
            anchor: Instant::now(),
            speed,
            last_output_ms: 0,
        })
    }
}

impl ClockSource for MonotonicClock {
    fn elapsed_ms(&mut self) -> u64 {
        let scaled = self.anchor.elapsed().as_secs_f64() * 1_000.0 * self.speed;
        self.last_output_ms = clamp_monotonic(self.last_output_ms, scaled as u64);
        self.last_output_ms
    }

    fn label(&self) -> &'static str {
        if self.speed == 1.0 {
            "realtime"
        } else {
            "scaled"
        }
    }
}

fn clamp_monotonic(last: u64, candidate: u64) -> u64 {
    last.max(candidate)
}
