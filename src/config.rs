// SCHEDLAT CONFIGURATION
// PURE-RUST MODULE: ONE IMMUTABLE VALUE PER SAMPLING CONTEXT
// BUILT ONCE BY THE BINARY FROM CLI FLAGS, NEVER MUTATED AFTERWARDS

use std::time::Duration;

use crate::clock::ClockSource;

// INTERVAL ACCUMULATOR SENTINELS (MICROSECONDS)
// ANY REAL SAMPLE REPLACES THEM ON THE FIRST ITERATION OF AN INTERVAL.

pub const MAX_LATENCY_SENTINEL_US: i64 = 1;
pub const MIN_LATENCY_SENTINEL_US: i64 = 5_000_000;

// POST-BIND SETTLING DELAY. LETS THE SCHEDULER MIGRATE THE THREAD
// ONTO THE TARGET CORE BEFORE THE FIRST CLOCK READ.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

pub const DEFAULT_INTERVAL_SECS: u32 = 2;

// HISTOGRAM CAPACITY = FLOOR(1.5 * CALIBRATED SAMPLE COUNT)
pub fn calibrated_capacity(samples: usize) -> usize {
    samples + samples / 2
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    // RUNNING MIN/MAX ONLY. NO HISTOGRAM, NO CALIBRATION.
    MinMax,
    // CALIBRATE, THEN HISTOGRAM EVERY INTERVAL FOR AVERAGE + MEDIAN.
    Average,
}

#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub cpu: usize,
    pub interval_secs: u32,
    pub mode: Mode,
    pub pause_ns: u32,
    pub verbose: bool,
    pub clock: ClockSource,
}

impl Config {
    pub fn new(cpu: usize) -> Self {
        Self {
            cpu,
            interval_secs: DEFAULT_INTERVAL_SECS,
            mode: Mode::MinMax,
            pause_ns: 0,
            verbose: false,
            clock: ClockSource::Realtime,
        }
    }

    // SAME SETTINGS, DIFFERENT CORE. USED BY THE FAN-OUT.
    pub fn for_cpu(&self, cpu: usize) -> Self {
        Self { cpu, ..*self }
    }

    pub fn pause(&self) -> Option<Duration> {
        if self.pause_ns == 0 {
            None
        } else {
            Some(Duration::from_nanos(self.pause_ns as u64))
        }
    }
}
