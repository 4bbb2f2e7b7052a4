//! PMU simulator: listens for PDC connections and streams the fixed
//! IEEE C37.118.2 Annex D sample measurement to every client that asked to
//! start.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;

use synchrophasor::frame::Frame;
use synchrophasor::pmu::{ieee_cfg2_sample, ieee_data_sample, Pmu};
use synchrophasor::transport::Method;

#[derive(Debug, Parser)]
#[command(
    name = "pmu",
    version,
    about = "PMU simulator sending a constant sample measurement.\n\
             Example: pmu -i 511 --ip 127.0.0.1 -p 1995 -r 30"
)]
struct Opt {
    /// PMU ID code.
    #[arg(short, long, default_value_t = 7734)]
    id: u16,

    /// Listener IP.
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,

    /// Listener port.
    #[arg(short, long, default_value_t = 4712)]
    port: u16,

    /// Data reporting rate: frames per second, or seconds per frame if
    /// negative.
    #[arg(short = 'r', long, default_value_t = 30)]
    data_rate: i16,

    /// Stamp every outgoing frame with the current time.
    #[arg(short, long)]
    timestamp: bool,

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

fn main() {
    let opt = Opt::parse();
    env_logger::Builder::new()
        .parse_filters(&opt.log_level)
        .init();

    let pmu = match Pmu::new(opt.id, opt.data_rate, &opt.ip, opt.port, opt.method) {
        Ok(pmu) => pmu
            .with_buffer_size(opt.buffer)
            .with_timestamping(opt.timestamp),
        Err(err) => {
            eprintln!("Invalid PMU parameters: {err}");
            std::process::exit(1)
        }
    };

    let cfg = match ieee_cfg2_sample(opt.id) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("Could not build the sample configuration: {err}");
            std::process::exit(1)
        }
    };
    let sample = match ieee_data_sample(opt.id) {
        Ok(sample) => sample,
        Err(err) => {
            eprintln!("Could not build the sample data frame: {err}");
            std::process::exit(1)
        }
    };

    let mut pmu = pmu;
    let started = pmu
        .set_configuration(cfg)
        .and_then(|_| pmu.set_data_rate(opt.data_rate))
        .and_then(|_| pmu.set_header_text("Hello I'm tinyPMU!"));
    if let Err(err) = started.and_then(|_| pmu.run()) {
        eprintln!("Could not start the PMU: {err}");
        std::process::exit(1)
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        if let Err(err) = ctrlc::set_handler(move || running.store(false, Ordering::SeqCst)) {
            log::warn!("could not install the Ctrl-C handler: {err}");
        }
    }

    let delay = if opt.data_rate > 0 {
        Duration::from_secs_f64(1.0 / opt.data_rate as f64)
    } else if opt.data_rate < 0 {
        Duration::from_secs(-(opt.data_rate as i64) as u64)
    } else {
        Duration::from_millis(100)
    };

    while running.load(Ordering::SeqCst) {
        if pmu.connected_clients() > 0 {
            if let Err(err) = pmu.send(Frame::Data(sample.clone())) {
                log::error!("could not enqueue the sample frame: {err}");
            }
        }
        thread::sleep(delay);
    }
    log::info!("shutting down");
}
