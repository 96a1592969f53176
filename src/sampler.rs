// SCHEDLAT SAMPLING LOOP
// ONE INSTANCE PER CPU. BUSY-POLLS THE CLOCK; THE GAP BETWEEN TWO READS
// IS HOW LONG THE SCHEDULER KEPT THIS THREAD OFF ITS CORE.
//
// PHASES:
//   MINMAX:      RUNNING MIN/MAX ONLY. REPORT EVERY INTERVAL. NEVER CALIBRATES.
//   CALIBRATING: FIRST INTERVAL OF AVERAGE MODE. COUNTS SAMPLES, REPORTS NOTHING.
//   SAMPLING:    HISTOGRAM SIZED FROM THE CALIBRATION COUNT. FULL REPORT.
//
// NOTHING BLOCKS INSIDE THE MEASURED REGION. REPORT WRITES AND THE
// OPTIONAL PAUSE HAPPEN AT BOUNDARIES, FOLLOWED BY A CLOCK RE-SEED.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};
use thiserror::Error;

use crate::affinity::{self, BindError};
use crate::clock::{self, Clock, SystemClock, Timestamp};
use crate::config::{calibrated_capacity, Config, Mode, SETTLE_DELAY};
use crate::histogram::{Histogram, HistogramError};
use crate::report::Report;
use crate::stats::{self, Accumulator};

pub const EXIT_BIND: i32 = 1;
pub const EXIT_HISTOGRAM: i32 = 2;
pub const EXIT_IO: i32 = 3;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Histogram(#[from] HistogramError),

    #[error("cannot write report: {0}")]
    Io(#[from] std::io::Error),
}

impl SampleError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Bind(_) => EXIT_BIND,
            Self::Histogram(_) => EXIT_HISTOGRAM,
            Self::Io(_) => EXIT_IO,
        }
    }
}

pub enum Phase {
    MinMax { samples: usize },
    Calibrating { samples: usize },
    Sampling { hist: Histogram },
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MinMax { .. } => "MINMAX",
            Self::Calibrating { .. } => "CALIBRATING",
            Self::Sampling { .. } => "SAMPLING",
        }
    }
}

// PER-INTERVAL STATE MACHINE. NO CLOCK, NO I/O.
pub struct Sampler {
    config: Config,
    phase: Phase,
    acc: Accumulator,
    interval_index: u32,
}

impl Sampler {
    pub fn new(config: Config) -> Self {
        let phase = match config.mode {
            Mode::MinMax => Phase::MinMax { samples: 0 },
            Mode::Average => Phase::Calibrating { samples: 0 },
        };
        Self {
            config,
            phase,
            acc: Accumulator::default(),
            interval_index: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn accumulator(&self) -> Accumulator {
        self.acc
    }

    pub fn interval_index(&self) -> u32 {
        self.interval_index
    }

    // HISTOGRAM CAPACITY ONCE CALIBRATED
    pub fn capacity(&self) -> Option<usize> {
        match &self.phase {
            Phase::Sampling { hist } => Some(hist.capacity()),
            _ => None,
        }
    }

    // SAMPLES COUNTED IN THE CURRENT INTERVAL (SINCE THE LAST WRAP WHEN SAMPLING)
    pub fn sample_count(&self) -> usize {
        match &self.phase {
            Phase::MinMax { samples } | Phase::Calibrating { samples } => *samples,
            Phase::Sampling { hist } => hist.len(),
        }
    }

    // ONE LATENCY SAMPLE. MIN/MAX TRACKING IS PHASE-INDEPENDENT.
    #[inline]
    pub fn record(&mut self, diff: i64) {
        self.acc.observe(diff);
        match &mut self.phase {
            Phase::MinMax { samples } | Phase::Calibrating { samples } => *samples += 1,
            Phase::Sampling { hist } => hist.push(diff),
        }
    }

    // INTERVAL BOUNDARY. RETURNS THE REPORT TO EMIT, IF ANY.
    // CALIBRATING -> SAMPLING HAPPENS HERE; ALLOCATION FAILURE IS FATAL.
    pub fn close_interval(&mut self) -> Result<Option<Report>, HistogramError> {
        let cpu = self.config.cpu;
        let interval_index = self.interval_index;
        let acc = self.acc;

        let report = match &mut self.phase {
            Phase::MinMax { samples } => {
                let report = Report {
                    cpu,
                    interval_index,
                    max: acc.max,
                    min: acc.min,
                    average: 0,
                    median: 0,
                    sample_count: *samples,
                    overflow_count: 0,
                };
                *samples = 0;
                Some(report)
            }
            Phase::Calibrating { samples } => {
                // CALIBRATION SAMPLES ARE DISCARDED, ONLY THEIR COUNT SURVIVES
                let capacity = calibrated_capacity(*samples);
                let hist = Histogram::with_capacity(capacity)?;
                if self.config.verbose {
                    info!("[{}] HISTSIZE = {} samples", cpu, capacity);
                }
                self.phase = Phase::Sampling { hist };
                None
            }
            Phase::Sampling { hist } => {
                let average = stats::average(hist.window());
                let sample_count = hist.len();
                let overflow_count = hist.overflows();
                let median = stats::median(hist.window_mut());
                hist.reset();
                Some(Report {
                    cpu,
                    interval_index,
                    max: acc.max,
                    min: acc.min,
                    average,
                    median,
                    sample_count,
                    overflow_count,
                })
            }
        };

        self.acc.reset();
        self.interval_index += self.config.interval_secs;
        Ok(report)
    }
}

// CLOCK-DRIVEN LOOP AROUND A Sampler
pub struct SamplingLoop<C: Clock, W: Write> {
    sampler: Sampler,
    clock: C,
    out: W,
    prev: Timestamp,
    deadline: Timestamp,
}

impl<C: Clock, W: Write> SamplingLoop<C, W> {
    // SEEDS prev WITH ONE CLOCK READ. FIRST DEADLINE IS ONE INTERVAL OUT.
    pub fn start(sampler: Sampler, mut clock: C, out: W) -> Self {
        let prev = clock.now();
        let deadline = prev.plus_secs(sampler.config.interval_secs);
        Self {
            sampler,
            clock,
            out,
            prev,
            deadline,
        }
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    pub fn into_output(self) -> W {
        self.out
    }

    // ONE ITERATION. RETURNS TRUE IF AN INTERVAL BOUNDARY WAS PROCESSED.
    #[inline]
    pub fn tick(&mut self) -> Result<bool, SampleError> {
        let now = self.clock.now();
        // NOT CLAMPED: A BACKWARDS CLOCK STEP SHOWS UP AS A NEGATIVE SAMPLE
        let diff = now.micros_since(&self.prev);
        self.sampler.record(diff);
        self.prev = now;

        if !now.reached(&self.deadline) {
            return Ok(false);
        }

        self.boundary()?;
        Ok(true)
    }

    #[cold]
    fn boundary(&mut self) -> Result<(), SampleError> {
        if let Some(report) = self.sampler.close_interval()? {
            report.emit(&mut self.out)?;
        }
        if let Some(p) = self.sampler.config.pause() {
            clock::pause(p);
        }
        self.deadline = self.deadline.plus_secs(self.sampler.config.interval_secs);
        // RE-SEED: REPORTING AND PAUSING ARE NOT SCHEDULING LATENCY
        self.prev = self.clock.now();
        Ok(())
    }

    // SPINS UNTIL shutdown IS RAISED. NEVER RETURNS Ok OTHERWISE.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), SampleError> {
        while !shutdown.load(Ordering::Relaxed) {
            self.tick()?;
        }
        Ok(())
    }
}

// FULL LIFECYCLE OF ONE CPU CONTEXT: BIND, SETTLE, SAMPLE FOREVER.
pub fn run_cpu<W: Write>(config: Config, out: W, shutdown: &AtomicBool) -> Result<(), SampleError> {
    affinity::bind(config.cpu)?;

    // ALLOW THE THREAD TO MIGRATE
    clock::pause(SETTLE_DELAY);

    match affinity::current_cpu() {
        Some(cpu) if cpu != config.cpu => {
            warn!("[{}] still running on cpu {} after settle delay", config.cpu, cpu);
        }
        _ => {}
    }

    if config.verbose {
        info!(
            "[{}] time control loop starting ({} clock, {}s interval)",
            config.cpu,
            config.clock.label(),
            config.interval_secs
        );
    }

    let clock = SystemClock::new(config.clock);
    let mut sampling = SamplingLoop::start(Sampler::new(config), clock, out);
    sampling.run(shutdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MAX_LATENCY_SENTINEL_US, MIN_LATENCY_SENTINEL_US};

    fn average_config() -> Config {
        Config {
            mode: Mode::Average,
            ..Config::new(0)
        }
    }

    #[test]
    fn new_phase_follows_mode() {
        assert_eq!(Sampler::new(Config::new(0)).phase().label(), "MINMAX");
        assert_eq!(Sampler::new(average_config()).phase().label(), "CALIBRATING");
    }

    #[test]
    fn calibration_sizes_histogram_and_reports_nothing() {
        let mut s = Sampler::new(average_config());
        for d in [10, 20, 10, 30, 15] {
            s.record(d);
        }
        assert_eq!(s.sample_count(), 5);
        assert!(s.close_interval().unwrap().is_none());
        assert_eq!(s.capacity(), Some(7));
        assert_eq!(s.sample_count(), 0);
        assert_eq!(s.phase().label(), "SAMPLING");
    }

    #[test]
    fn minmax_mode_never_calibrates() {
        let mut s = Sampler::new(Config::new(2));
        for d in [3, 9, 4] {
            s.record(d);
        }
        let r = s.close_interval().unwrap().unwrap();
        assert_eq!(r.cpu, 2);
        assert_eq!(r.interval_index, 0);
        assert_eq!((r.max, r.min), (9, 3));
        assert_eq!((r.average, r.median, r.overflow_count), (0, 0, 0));
        assert_eq!(r.sample_count, 3);
        assert_eq!(s.capacity(), None);
        assert_eq!(s.interval_index(), 2);
    }

    #[test]
    fn boundary_resets_accumulator() {
        let mut s = Sampler::new(Config::new(0));
        s.record(42);
        s.close_interval().unwrap();
        let acc = s.accumulator();
        assert_eq!(acc.max, MAX_LATENCY_SENTINEL_US);
        assert_eq!(acc.min, MIN_LATENCY_SENTINEL_US);
    }

    #[test]
    fn zero_sample_calibration_is_fatal() {
        let mut s = Sampler::new(average_config());
        let err = SampleError::from(s.close_interval().unwrap_err());
        assert_eq!(err.exit_code(), EXIT_HISTOGRAM);
    }
}
