//! Benchmarking PDC: connects to a PMU, receives one minute's worth of
//! frames at the expected rate, and writes a per-run log with elapsed time
//! and error counts.

use std::fs;
use std::io::Write;
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use clap::Parser;

use synchrophasor::error::PdcError;
use synchrophasor::pdc::{ConfigRequest, Pdc};
use synchrophasor::transport::Method;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "bench_pdc",
    version,
    about = "Benchmark a PMU by receiving one minute of frames.\n\
             Example: bench_pdc -i 511 --ip 127.0.0.1 -p 1995 -r 30 -j 4"
)]
struct Opt {
    /// PDC ID code.
    #[arg(short, long, default_value_t = 7734)]
    id: u16,

    /// PMU IP.
    #[arg(long)]
    ip: String,

    /// PMU port.
    #[arg(short, long)]
    port: u16,

    /// Data reporting rate of the PMU.
    #[arg(short = 'r', long, default_value_t = 30)]
    data_rate: i16,

    /// How many parallel jobs.
    #[arg(short, long, default_value_t = 1)]
    jobs: u32,

    /// Transmission method, tcp or udp.
    #[arg(short, long, default_value = "tcp", value_parser = Method::from_str)]
    method: Method,

    /// Socket buffer size in bytes.
    #[arg(short, long, default_value_t = 2048)]
    buffer: usize,

    /// Log level filter, e.g. info or debug.
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

struct JobResult {
    received: u64,
    errors: u64,
    elapsed: Duration,
}

fn main() {
    let opt = Opt::parse();
    env_logger::Builder::new()
        .parse_filters(&opt.log_level)
        .init();

    let handles: Vec<_> = (0..opt.jobs.max(1))
        .map(|job| {
            let opt = opt.clone();
            thread::spawn(move || run_job(job, &opt))
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap_or_else(|_| Err(PdcError::NotConnected)))
        .collect();

    if let Err(err) = write_results(&opt, &results) {
        eprintln!("Could not write the result log: {err}");
        std::process::exit(1)
    }
}

fn run_job(job: u32, opt: &Opt) -> Result<JobResult, PdcError> {
    let mut pdc = Pdc::new(opt.id, &opt.ip, opt.port, opt.method).with_buffer_size(opt.buffer);
    pdc.connect()?;
    pdc.get_header()?;
    pdc.get_config(ConfigRequest::Cfg2)?;
    pdc.start()?;

    // The ideal number of measurements in 60 seconds.
    let target = 60 * opt.data_rate.max(1) as u64;
    let mut received = 0;
    let mut errors = 0;
    let started = Instant::now();
    while received < target {
        match pdc.get() {
            Ok(_) => received += 1,
            Err(PdcError::Frame(err)) => {
                log::debug!("[job {job}] - frame error: {err}");
                errors += 1;
            }
            Err(err) => {
                log::warn!("[job {job}] - receive failed: {err}");
                break;
            }
        }
    }
    let elapsed = started.elapsed();
    pdc.quit();
    Ok(JobResult {
        received,
        errors,
        elapsed,
    })
}

fn write_results(opt: &Opt, results: &[Result<JobResult, PdcError>]) -> std::io::Result<()> {
    fs::create_dir_all("results")?;
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let path = format!(
        "results/result_{}_{}_{}_{stamp}.log",
        opt.data_rate, opt.jobs, opt.id
    );
    let mut file = fs::File::create(&path)?;
    writeln!(file, "PDC ID: {}", opt.id)?;
    for (job, result) in results.iter().enumerate() {
        match result {
            Ok(result) => {
                let seconds = result.elapsed.as_secs_f64();
                let rate = if seconds > 0.0 {
                    result.received as f64 / seconds
                } else {
                    0.0
                };
                writeln!(
                    file,
                    "Job {job}: received {} frames in {seconds:.3} s ({rate:.1} fps), {} errors",
                    result.received, result.errors
                )?;
            }
            Err(err) => writeln!(file, "Job {job}: failed: {err}")?,
        }
    }
    log::info!("results written to {path}");
    Ok(())
}
