//! Stream splitter launcher: replicates one PMU/PDC data stream to every
//! connected downstream PDC.

use std::str::FromStr;

use clap::Parser;

use synchrophasor::splitter::StreamSplitter;
use synchrophasor::transport::Method;

#[derive(Debug, Parser)]
#[command(
    name = "splitter",
    version,
    about = "Replicates a synchrophasor data stream to many PDCs.\n\
             Example: splitter --sip 10.0.0.1 --sp 4712 --lip 0.0.0.0 --lp 1410"
)]
struct Opt {
    /// Data stream source IP.
    #[arg(long = "source-ip", alias = "sip")]
    source_ip: String,

    /// Data stream source port.
    #[arg(long = "source-port", alias = "sp")]
    source_port: u16,

    /// Listen IP for downstream connections.
    #[arg(long = "listen-ip", alias = "lip")]
    listen_ip: String,

    /// Listen port for downstream connections.
    #[arg(long = "listen-port", alias = "lp")]
    listen_port: u16,

    /// ID code used towards the source.
    #[arg(short, long, default_value_t = 1)]
    id: u16,

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

    log::info!(
        "connecting to {}:{} with id {}",
        opt.source_ip,
        opt.source_port,
        opt.id
    );
    log::info!(
        "listening on {}:{} for incoming connections",
        opt.listen_ip,
        opt.listen_port
    );

    let mut splitter = StreamSplitter::new(
        &opt.source_ip,
        opt.source_port,
        &opt.listen_ip,
        opt.listen_port,
        opt.id,
        opt.method,
    )
    .with_buffer_size(opt.buffer);

    if let Err(err) = splitter.run() {
        eprintln!("Splitter failed: {err}");
        std::process::exit(1)
    }
}
