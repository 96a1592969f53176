// SCHEDLAT -- PER-CPU SCHEDULING LATENCY SAMPLER
// ONE PINNED BUSY-POLL THREAD PER ONLINE CPU. EACH THREAD OWNS ITS
// HISTOGRAM AND COUNTERS; NOTHING MUTABLE IS SHARED BETWEEN THEM.
//
// RUST USERSPACE ONLY: CONFIGURATION, TOPOLOGY, FAN-OUT, REPORTING

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use schedlat::clock::ClockSource;
use schedlat::config::{Config, Mode, DEFAULT_INTERVAL_SECS};
use schedlat::report::FORMAT_HELP;
use schedlat::sampler::{self, SampleError};
use schedlat::topology;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser)]
#[command(name = "schedlat", version)]
#[command(about = "SCHEDLAT -- PER-CPU SCHEDULING LATENCY MEASUREMENT")]
#[command(after_help = FORMAT_HELP)]
struct Cli {
    /// Print diagnostics (cpu count, loop start, calibrated histogram size)
    #[arg(short, long)]
    verbose: bool,

    /// Reporting interval in seconds
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_SECS,
          value_parser = clap::value_parser!(u32).range(1..))]
    interval: u32,

    /// Compute average and median (calibrates a histogram first)
    #[arg(short, long, overrides_with = "minmax")]
    average: bool,

    /// Do not compute average and median (default)
    #[arg(short, long, overrides_with = "average")]
    minmax: bool,

    /// Nanosleep NS between intervals
    #[arg(short, long, default_value_t = 0,
          value_parser = clap::value_parser!(u32).range(0..1_000_000_000))]
    pause: u32,

    /// Sample CLOCK_MONOTONIC instead of the wall clock.
    /// Immune to clock steps, but not the same measurement as the default
    #[arg(long)]
    monotonic: bool,

    /// Sysfs mount point for cpu topology
    #[arg(long, default_value = "/sys")]
    sysfs: PathBuf,

    /// Sample only this cpu (default: all online cpus)
    cpu: Option<usize>,
}

impl Cli {
    fn config(&self, cpu: usize) -> Config {
        Config {
            cpu,
            interval_secs: self.interval,
            mode: if self.average && !self.minmax { Mode::Average } else { Mode::MinMax },
            pause_ns: self.pause,
            verbose: self.verbose,
            clock: if self.monotonic { ClockSource::Monotonic } else { ClockSource::Realtime },
        }
    }
}

fn report_failure(cpu: usize, err: &SampleError) -> i32 {
    eprintln!("Error: [{}] {}", cpu, err);
    err.exit_code()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "info" } else { "warn" }),
    )
    .target(env_logger::Target::Stdout)
    .init();

    ctrlc::set_handler(move || {
        SHUTDOWN.store(true, Ordering::Relaxed);
    })?;

    // DETECT TOPOLOGY
    let cpus = topology::online_cpus(&cli.sysfs).with_context(|| {
        format!("Cannot read number of CPUs in system from {:?}", cli.sysfs)
    })?;
    info!("Number of CPUS in system: {}", cpus.len());

    // SINGLE CPU: RUN ON THIS THREAD, EXIT WITH ITS STATUS
    if let Some(cpu) = cli.cpu {
        if !cpus.contains(&cpu) {
            warn!("cpu {} is not listed as online", cpu);
        }
        if let Err(e) = sampler::run_cpu(cli.config(cpu), std::io::stdout(), &SHUTDOWN) {
            std::process::exit(report_failure(cpu, &e));
        }
        return Ok(());
    }

    // FAN-OUT: ONE ISOLATED SAMPLING THREAD PER ONLINE CPU
    let mut workers = Vec::with_capacity(cpus.len());
    for &cpu in &cpus {
        let config = cli.config(cpu);
        let handle = thread::Builder::new()
            .name(format!("schedlat-cpu{}", cpu))
            .spawn(move || match sampler::run_cpu(config, std::io::stdout(), &SHUTDOWN) {
                Ok(()) => 0,
                Err(e) => report_failure(cpu, &e),
            })
            .with_context(|| format!("cannot spawn sampler for cpu {}", cpu))?;
        workers.push((cpu, handle));
    }

    // IDLE UNTIL EVERY CONTEXT HAS ENDED (SHUTDOWN OR FAILURE)
    let mut status = 0;
    for (cpu, handle) in workers {
        let code = handle.join().unwrap_or_else(|_| {
            eprintln!("Error: [{}] sampler thread panicked", cpu);
            101
        });
        status = status.max(code);
    }

    if status != 0 {
        std::process::exit(status);
    }
    Ok(())
}
