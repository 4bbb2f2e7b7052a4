//! The PMU session server.
//!
//! One acceptor thread listens for PDC connections; every client gets its own
//! handler thread, a bounded outbound queue with a drop-oldest overflow
//! policy, and a sending-enabled flag driven by the command protocol.
//! `send`/`send_data` fan a frame out to every queue; configuration setters
//! additionally broadcast the new cfg2 (or header) so connected PDCs stay in
//! sync.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;

use crate::error::{FrameError, PmuError};
use crate::frame::{
    timestamp_now, AnalogType, AnalogUnit, AnalogValue, Command, ConfigFrame, ConfigVersion,
    DataFormat, DataFrame, DigitalUnit, Frame, FreqValue, Frasec, HeaderFrame, NominalFreq,
    PhasorUnit, PhasorValue, PmuData, Stat, StreamConfig,
};
use crate::transport::{FrameAccumulator, Method, DEFAULT_BUFFER_SIZE};

/// Per-client outbound queue depth; the oldest entry is dropped on overflow.
const QUEUE_CAPACITY: usize = 1024;

/// A value queued for one client. Configuration and header updates travel
/// typed so the handler can refresh its captured reply copies on the way out.
#[derive(Clone)]
enum Outbound {
    Raw(Vec<u8>),
    Config(ConfigFrame),
    Header(HeaderFrame),
}

struct ClientSlot {
    tx: Sender<Outbound>,
    rx: Receiver<Outbound>,
    addr: SocketAddr,
    enabled: Arc<AtomicBool>,
}

/// Server-side session state, rewritten only by the owning application
/// thread and snapshotted by handlers at spawn time.
struct ServerState {
    pmu_id: u16,
    data_rate: i16,
    set_timestamp: bool,
    cfg2: Option<ConfigFrame>,
    cfg3: Option<Vec<u8>>,
    header: HeaderFrame,
}

/// Reply copies captured when a handler starts. Updates arrive as typed
/// [`Outbound`] items through the client queue.
#[derive(Clone)]
struct HandlerContext {
    pmu_id: u16,
    cfg2: Option<ConfigFrame>,
    cfg3: Option<Vec<u8>>,
    header: HeaderFrame,
    delay: Duration,
    set_timestamp: bool,
    pace: bool,
}

/// Measurement input for [`Pmu::send_data`], one per configured stream, in
/// engineering units. Phasor tuples are (magnitude, angle-in-radians) for
/// polar formats and (real, imaginary) for rectangular ones.
#[derive(Debug, Clone, Default)]
pub struct StreamSample {
    pub stat: Stat,
    pub phasors: Vec<(f64, f64)>,
    pub freq: f64,
    pub dfreq: f64,
    pub analogs: Vec<f64>,
    pub digitals: Vec<u16>,
}

pub struct Pmu {
    ip: String,
    port: u16,
    method: Method,
    buffer_size: usize,
    pace: bool,
    state: Arc<Mutex<ServerState>>,
    clients: Arc<Mutex<Vec<ClientSlot>>>,
    listener: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Pmu {
    pub fn new(
        pmu_id: u16,
        data_rate: i16,
        ip: &str,
        port: u16,
        method: Method,
    ) -> Result<Pmu, FrameError> {
        let header = HeaderFrame::new(pmu_id, "Hello I'm tinyPMU!")?;
        Ok(Pmu {
            ip: ip.to_owned(),
            port,
            method,
            buffer_size: DEFAULT_BUFFER_SIZE,
            pace: true,
            state: Arc::new(Mutex::new(ServerState {
                pmu_id,
                data_rate,
                set_timestamp: false,
                cfg2: None,
                cfg3: None,
                header,
            })),
            clients: Arc::new(Mutex::new(Vec::new())),
            listener: None,
            local_addr: None,
        })
    }

    /// Socket read/write chunk size.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Pmu {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// When enabled, outgoing frames get a fresh timestamp as they are sent
    /// or served as a request-response reply.
    pub fn with_timestamping(self, set_timestamp: bool) -> Pmu {
        self.state.lock().set_timestamp = set_timestamp;
        self
    }

    /// Disables the per-frame pacing delay in client handlers. Used by the
    /// stream splitter, whose upstream already paces the data.
    pub fn with_pacing(mut self, pace: bool) -> Pmu {
        self.pace = pace;
        self
    }

    /// Installs `cfg` as the served configuration and broadcasts it to all
    /// connected clients. The frame is stored retagged as cfg2; the PMU id
    /// and data rate follow the frame.
    pub fn set_configuration(&self, cfg: ConfigFrame) -> Result<(), PmuError> {
        let cfg2 = cfg.retagged(ConfigVersion::Cfg2);
        {
            let mut state = self.state.lock();
            state.pmu_id = cfg2.id_code();
            state.data_rate = cfg2.data_rate();
            state.cfg2 = Some(cfg2.clone());
        }
        self.broadcast(Outbound::Config(self.stamped_cfg(cfg2)));
        log::info!("[{}] - PMU configuration changed", self.pmu_id());
        Ok(())
    }

    /// Replaces the header frame and broadcasts it.
    pub fn set_header(&self, header: HeaderFrame) {
        let header = {
            let mut state = self.state.lock();
            state.header = header;
            state.header.clone()
        };
        self.broadcast(Outbound::Header(self.stamped_header(header)));
        log::info!("[{}] - PMU header changed", self.pmu_id());
    }

    /// Rewrites the header text in place and broadcasts the result.
    pub fn set_header_text(&self, text: &str) -> Result<(), PmuError> {
        let header = {
            let mut state = self.state.lock();
            state.header.set_text(text)?;
            state.header.clone()
        };
        self.broadcast(Outbound::Header(self.stamped_header(header)));
        log::info!("[{}] - PMU header changed", self.pmu_id());
        Ok(())
    }

    /// Changes the data stream id and broadcasts the updated cfg2.
    pub fn set_id(&self, pmu_id: u16) -> Result<(), PmuError> {
        let cfg2 = {
            let mut state = self.state.lock();
            let mut cfg2 = state.cfg2.clone().ok_or(PmuError::NoConfiguration)?;
            cfg2.set_id_code(pmu_id)?;
            state.cfg2 = Some(cfg2.clone());
            state.pmu_id = pmu_id;
            cfg2
        };
        self.broadcast(Outbound::Config(self.stamped_cfg(cfg2)));
        log::info!("[{pmu_id}] - PMU id changed");
        Ok(())
    }

    /// Changes the reporting rate and broadcasts the updated cfg2. Running
    /// handlers pick the new pacing up when the broadcast passes through
    /// their queue.
    pub fn set_data_rate(&self, data_rate: i16) -> Result<(), PmuError> {
        let cfg2 = {
            let mut state = self.state.lock();
            let mut cfg2 = state.cfg2.clone().ok_or(PmuError::NoConfiguration)?;
            cfg2.set_data_rate(data_rate)?;
            state.cfg2 = Some(cfg2.clone());
            state.data_rate = data_rate;
            cfg2
        };
        self.broadcast(Outbound::Config(self.stamped_cfg(cfg2)));
        log::info!("[{}] - PMU reporting data rate changed", self.pmu_id());
        Ok(())
    }

    /// Changes the per-stream data formats (one entry per configured stream)
    /// and broadcasts the updated cfg2.
    pub fn set_data_format(&self, formats: &[DataFormat]) -> Result<(), PmuError> {
        let cfg2 = {
            let mut state = self.state.lock();
            let mut cfg2 = state.cfg2.clone().ok_or(PmuError::NoConfiguration)?;
            if formats.len() != cfg2.num_pmu() {
                return Err(FrameError::ShapeMismatch { field: "FORMAT" }.into());
            }
            for (stream, &format) in cfg2.streams_mut().iter_mut().zip(formats) {
                stream.set_format(format);
            }
            state.cfg2 = Some(cfg2.clone());
            cfg2
        };
        self.broadcast(Outbound::Config(self.stamped_cfg(cfg2)));
        log::info!("[{}] - PMU data format changed", self.pmu_id());
        Ok(())
    }

    /// Installs raw configuration-3 bytes to be served on cfg3 requests.
    /// There is no typed representation; the bytes pass through verbatim.
    pub fn set_raw_cfg3(&self, bytes: Vec<u8>) {
        self.state.lock().cfg3 = Some(bytes);
    }

    pub fn pmu_id(&self) -> u16 {
        self.state.lock().pmu_id
    }

    pub fn data_rate(&self) -> i16 {
        self.state.lock().data_rate
    }

    pub fn configuration(&self) -> Option<ConfigFrame> {
        self.state.lock().cfg2.clone()
    }

    /// Number of currently connected clients.
    pub fn connected_clients(&self) -> usize {
        self.clients.lock().len()
    }

    /// Address the server is bound to; useful when the requested port was 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Binds the socket and starts the acceptor thread. Fails with
    /// `NoConfiguration` until a configuration is set.
    pub fn run(&mut self) -> Result<(), PmuError> {
        if self.state.lock().cfg2.is_none() {
            return Err(PmuError::NoConfiguration);
        }
        match self.method {
            Method::Tcp => {
                let listener = TcpListener::bind((self.ip.as_str(), self.port))
                    .map_err(crate::error::TransportError::from)?;
                self.local_addr = listener.local_addr().ok();
                let state = self.state.clone();
                let clients = self.clients.clone();
                let buffer_size = self.buffer_size;
                let pace = self.pace;
                self.listener = Some(thread::spawn(move || {
                    tcp_acceptor(listener, state, clients, buffer_size, pace);
                }));
            }
            Method::Udp => {
                let socket = UdpSocket::bind((self.ip.as_str(), self.port))
                    .map_err(crate::error::TransportError::from)?;
                self.local_addr = socket.local_addr().ok();
                let state = self.state.clone();
                let clients = self.clients.clone();
                let pace = self.pace;
                self.listener = Some(thread::spawn(move || {
                    udp_acceptor(socket, state, clients, pace);
                }));
            }
        }
        log::info!(
            "[{}] - listening on {}:{}",
            self.pmu_id(),
            self.ip,
            self.local_addr.map(|a| a.port()).unwrap_or(self.port)
        );
        Ok(())
    }

    /// Blocks until the acceptor thread exits.
    pub fn join(&mut self) {
        if let Some(handle) = self.listener.take() {
            let _ = handle.join();
        }
    }

    /// Encodes a typed frame (data frames against the current cfg2) and
    /// enqueues the bytes to every connected client.
    pub fn send(&self, frame: Frame) -> Result<(), PmuError> {
        let bytes = {
            let state = self.state.lock();
            let mut frame = frame;
            if state.set_timestamp {
                let (soc, frasec) = timestamp_now();
                frame.set_time(soc, frasec);
            }
            frame.encode(state.cfg2.as_ref())?
        };
        self.broadcast(Outbound::Raw(bytes));
        Ok(())
    }

    /// Enqueues already-encoded frame bytes to every connected client.
    pub fn send_raw(&self, bytes: Vec<u8>) {
        self.broadcast(Outbound::Raw(bytes));
    }

    /// Builds a data frame from engineering-unit samples and fans it out.
    ///
    /// Where the configured FORMAT selects integer encodings the values are
    /// coerced: phasor magnitudes divide by PHUNIT * 1e-5, polar angles
    /// multiply by 1e4, analogs divide by the ANUNIT scale. Float formats
    /// pass through. `time` overrides the frame timestamp.
    pub fn send_data(
        &self,
        samples: Vec<StreamSample>,
        time: Option<(u32, Frasec)>,
    ) -> Result<(), PmuError> {
        let bytes = {
            let state = self.state.lock();
            let cfg = state.cfg2.as_ref().ok_or(PmuError::NoConfiguration)?;
            if samples.len() != cfg.num_pmu() {
                return Err(FrameError::ShapeMismatch { field: "NUM_PMU" }.into());
            }
            let streams = samples
                .iter()
                .zip(cfg.streams())
                .map(|(sample, stream_cfg)| coerce_sample(sample, stream_cfg))
                .collect::<Result<Vec<_>, _>>()?;
            let mut frame = DataFrame::new(state.pmu_id, streams)?;
            if let Some((soc, frasec)) = time {
                frame.set_time(soc, frasec);
            }
            frame.encode(cfg)?
        };
        self.broadcast(Outbound::Raw(bytes));
        Ok(())
    }

    fn stamped_cfg(&self, mut cfg: ConfigFrame) -> ConfigFrame {
        if self.state.lock().set_timestamp {
            let (soc, frasec) = timestamp_now();
            cfg.set_time(soc, frasec);
        }
        cfg
    }

    fn stamped_header(&self, mut header: HeaderFrame) -> HeaderFrame {
        if self.state.lock().set_timestamp {
            let (soc, frasec) = timestamp_now();
            header.set_time(soc, frasec);
        }
        header
    }

    fn broadcast(&self, item: Outbound) {
        let clients = self.clients.lock();
        for slot in clients.iter() {
            push_drop_oldest(slot, item.clone());
        }
    }
}

/// Enqueues into a bounded client queue, dropping the oldest pending entry
/// when the queue is full.
fn push_drop_oldest(slot: &ClientSlot, item: Outbound) {
    let mut item = item;
    loop {
        match slot.tx.try_send(item) {
            Ok(()) => return,
            Err(TrySendError::Full(back)) => {
                let _ = slot.rx.try_recv();
                item = back;
            }
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
}

/// Delay between outbound data frames for the given DATA_RATE.
fn pacing_delay(data_rate: i16) -> Duration {
    if data_rate > 0 {
        Duration::from_secs_f64(1.0 / data_rate as f64)
    } else if data_rate < 0 {
        Duration::from_secs(-(data_rate as i64) as u64)
    } else {
        Duration::ZERO
    }
}

fn capture_context(state: &Mutex<ServerState>, pace: bool) -> HandlerContext {
    let state = state.lock();
    HandlerContext {
        pmu_id: state.pmu_id,
        cfg2: state.cfg2.clone(),
        cfg3: state.cfg3.clone(),
        header: state.header.clone(),
        delay: if pace {
            pacing_delay(state.data_rate)
        } else {
            Duration::ZERO
        },
        set_timestamp: state.set_timestamp,
        pace,
    }
}

fn tcp_acceptor(
    listener: TcpListener,
    state: Arc<Mutex<ServerState>>,
    clients: Arc<Mutex<Vec<ClientSlot>>>,
    buffer_size: usize,
    pace: bool,
) {
    loop {
        let (stream, addr) = match listener.accept() {
            Ok(conn) => conn,
            Err(err) => {
                log::error!("accept failed: {err}");
                continue;
            }
        };
        let (tx, rx) = bounded(QUEUE_CAPACITY);
        let enabled = Arc::new(AtomicBool::new(false));
        clients.lock().push(ClientSlot {
            tx,
            rx: rx.clone(),
            addr,
            enabled: enabled.clone(),
        });
        let ctx = capture_context(&state, pace);
        let clients = clients.clone();
        thread::spawn(move || {
            client_handler(stream, addr, rx, enabled, ctx, buffer_size);
            clients.lock().retain(|slot| slot.addr != addr);
        });
    }
}

/// Serves one TCP client: polls for inbound command frames without blocking
/// the paced outbound stream, answers request-response commands directly,
/// and forwards queued frames while sending is enabled.
fn client_handler(
    mut stream: TcpStream,
    addr: SocketAddr,
    rx: Receiver<Outbound>,
    enabled: Arc<AtomicBool>,
    mut ctx: HandlerContext,
    buffer_size: usize,
) {
    log::info!("[{}] - connection from {addr}", ctx.pmu_id);
    if let Err(err) = stream.set_read_timeout(Some(Duration::from_millis(1))) {
        log::error!("[{}] - cannot configure socket: {err}", ctx.pmu_id);
        return;
    }
    let mut acc = FrameAccumulator::new();
    let mut chunk = vec![0u8; buffer_size];

    'session: loop {
        // Drain whatever bytes have arrived.
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break 'session,
                Ok(n) => acc.push(&chunk[..n]),
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock
                        || err.kind() == ErrorKind::TimedOut =>
                {
                    break
                }
                Err(err) => {
                    log::warn!("[{}] - read error from {addr}: {err}", ctx.pmu_id);
                    break 'session;
                }
            }
        }

        let mut idle = true;
        while let Some(frame) = acc.next_frame() {
            idle = false;
            if !handle_inbound(&mut stream, &frame, &ctx, &enabled, addr) {
                break 'session;
            }
        }

        if enabled.load(Ordering::Relaxed) {
            match rx.try_recv() {
                Ok(item) => {
                    idle = false;
                    if !ctx.delay.is_zero() {
                        thread::sleep(ctx.delay);
                    }
                    let bytes = match realize_outbound(item, &mut ctx) {
                        Ok(bytes) => bytes,
                        Err(err) => {
                            log::warn!("[{}] - cannot encode outbound frame: {err}", ctx.pmu_id);
                            continue;
                        }
                    };
                    if let Err(err) = stream.write_all(&bytes) {
                        log::info!("[{}] - write to {addr} failed: {err}", ctx.pmu_id);
                        break 'session;
                    }
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => break 'session,
            }
        }

        if idle {
            thread::sleep(Duration::from_millis(1));
        }
    }
    log::info!("[{}] - connection from {addr} closed", ctx.pmu_id);
}

/// Turns a queued item into wire bytes, refreshing the handler's captured
/// reply copies for configuration and header updates.
fn realize_outbound(item: Outbound, ctx: &mut HandlerContext) -> Result<Vec<u8>, FrameError> {
    match item {
        Outbound::Raw(bytes) => Ok(bytes),
        Outbound::Config(cfg) => {
            let bytes = cfg.encode()?;
            if ctx.pace {
                ctx.delay = pacing_delay(cfg.data_rate());
            }
            ctx.cfg2 = Some(cfg);
            Ok(bytes)
        }
        Outbound::Header(header) => {
            let bytes = header.encode()?;
            ctx.header = header;
            Ok(bytes)
        }
    }
}

/// Decodes one inbound frame and dispatches it. Returns `false` when the
/// session should end.
fn handle_inbound(
    stream: &mut TcpStream,
    frame: &[u8],
    ctx: &HandlerContext,
    enabled: &AtomicBool,
    addr: SocketAddr,
) -> bool {
    let command = match Frame::decode(frame, ctx.cfg2.as_ref()) {
        Ok(Frame::Command(cmd)) => cmd.command(),
        Ok(other) => {
            log::debug!(
                "[{}] - ignoring {:?} frame from {addr}",
                ctx.pmu_id,
                other.kind()
            );
            return true;
        }
        Err(err) => {
            log::warn!("[{}] - undecodable frame from {addr}: {err}", ctx.pmu_id);
            return true;
        }
    };
    log::info!("[{}] - received command {command:?} from {addr}", ctx.pmu_id);
    match command {
        Command::Start => {
            enabled.store(true, Ordering::Relaxed);
            log::info!("[{}] - start sending to {addr}", ctx.pmu_id);
        }
        Command::Stop => {
            enabled.store(false, Ordering::Relaxed);
            log::info!("[{}] - stop sending to {addr}", ctx.pmu_id);
        }
        Command::SendHeader => {
            let mut header = ctx.header.clone();
            if ctx.set_timestamp {
                let (soc, frasec) = timestamp_now();
                header.set_time(soc, frasec);
            }
            return write_reply(stream, header.encode(), ctx.pmu_id, addr, "header");
        }
        Command::SendCfg1 => {
            if let Some(cfg2) = &ctx.cfg2 {
                let mut cfg1 = cfg2.retagged(ConfigVersion::Cfg1);
                if ctx.set_timestamp {
                    let (soc, frasec) = timestamp_now();
                    cfg1.set_time(soc, frasec);
                }
                return write_reply(stream, cfg1.encode(), ctx.pmu_id, addr, "cfg1");
            }
        }
        Command::SendCfg2 => {
            if let Some(cfg2) = &ctx.cfg2 {
                let mut cfg2 = cfg2.clone();
                if ctx.set_timestamp {
                    let (soc, frasec) = timestamp_now();
                    cfg2.set_time(soc, frasec);
                }
                return write_reply(stream, cfg2.encode(), ctx.pmu_id, addr, "cfg2");
            }
        }
        Command::SendCfg3 => match &ctx.cfg3 {
            Some(bytes) => {
                return write_reply(stream, Ok(bytes.clone()), ctx.pmu_id, addr, "cfg3");
            }
            None => log::warn!("[{}] - no cfg3 to serve to {addr}", ctx.pmu_id),
        },
        Command::Extended | Command::Custom(_) => {
            log::debug!("[{}] - ignoring command {command:?} from {addr}", ctx.pmu_id);
        }
    }
    true
}

fn write_reply(
    stream: &mut TcpStream,
    bytes: Result<Vec<u8>, FrameError>,
    pmu_id: u16,
    addr: SocketAddr,
    what: &str,
) -> bool {
    let bytes = match bytes {
        Ok(bytes) => bytes,
        Err(err) => {
            log::error!("[{pmu_id}] - cannot encode {what} reply: {err}");
            return true;
        }
    };
    match stream.write_all(&bytes) {
        Ok(()) => {
            log::info!("[{pmu_id}] - requested {what} frame sent to {addr}");
            true
        }
        Err(err) => {
            log::info!("[{pmu_id}] - write to {addr} failed: {err}");
            false
        }
    }
}

/// UDP front: clients are keyed by source address and registered on their
/// first command. Request-response replies go straight back; streamed data
/// is paced by a per-client sender thread over the same bounded queue.
fn udp_acceptor(
    socket: UdpSocket,
    state: Arc<Mutex<ServerState>>,
    clients: Arc<Mutex<Vec<ClientSlot>>>,
    pace: bool,
) {
    let mut buf = vec![0u8; u16::MAX as usize];
    loop {
        let (len, addr) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err) => {
                log::error!("udp receive failed: {err}");
                continue;
            }
        };
        let frame = &buf[..len];
        let ctx = capture_context(&state, pace);

        let enabled = {
            let mut clients = clients.lock();
            match clients.iter().find(|slot| slot.addr == addr) {
                Some(slot) => slot.enabled.clone(),
                None => {
                    let (tx, rx) = bounded(QUEUE_CAPACITY);
                    let enabled = Arc::new(AtomicBool::new(false));
                    clients.push(ClientSlot {
                        tx,
                        rx: rx.clone(),
                        addr,
                        enabled: enabled.clone(),
                    });
                    match socket.try_clone() {
                        Ok(socket) => {
                            let ctx = ctx.clone();
                            let enabled = enabled.clone();
                            thread::spawn(move || udp_sender(socket, addr, rx, enabled, ctx));
                        }
                        Err(err) => log::error!("cannot clone udp socket: {err}"),
                    }
                    log::info!("[{}] - new udp client {addr}", ctx.pmu_id);
                    enabled
                }
            }
        };

        let command = match Frame::decode(frame, ctx.cfg2.as_ref()) {
            Ok(Frame::Command(cmd)) => cmd.command(),
            Ok(other) => {
                log::debug!("[{}] - ignoring {:?} from {addr}", ctx.pmu_id, other.kind());
                continue;
            }
            Err(err) => {
                log::warn!("[{}] - undecodable datagram from {addr}: {err}", ctx.pmu_id);
                continue;
            }
        };
        log::info!("[{}] - received command {command:?} from {addr}", ctx.pmu_id);
        match command {
            Command::Start => enabled.store(true, Ordering::Relaxed),
            Command::Stop => enabled.store(false, Ordering::Relaxed),
            Command::SendHeader => {
                let mut header = ctx.header.clone();
                if ctx.set_timestamp {
                    let (soc, frasec) = timestamp_now();
                    header.set_time(soc, frasec);
                }
                send_datagram(&socket, addr, header.encode(), ctx.pmu_id, "header");
            }
            Command::SendCfg1 => {
                if let Some(cfg2) = &ctx.cfg2 {
                    send_datagram(
                        &socket,
                        addr,
                        cfg2.retagged(ConfigVersion::Cfg1).encode(),
                        ctx.pmu_id,
                        "cfg1",
                    );
                }
            }
            Command::SendCfg2 => {
                if let Some(cfg2) = &ctx.cfg2 {
                    send_datagram(&socket, addr, cfg2.encode(), ctx.pmu_id, "cfg2");
                }
            }
            Command::SendCfg3 => match &ctx.cfg3 {
                Some(bytes) => send_datagram(&socket, addr, Ok(bytes.clone()), ctx.pmu_id, "cfg3"),
                None => log::warn!("[{}] - no cfg3 to serve to {addr}", ctx.pmu_id),
            },
            Command::Extended | Command::Custom(_) => {
                log::debug!("[{}] - ignoring command {command:?} from {addr}", ctx.pmu_id);
            }
        }
    }
}

fn udp_sender(
    socket: UdpSocket,
    addr: SocketAddr,
    rx: Receiver<Outbound>,
    enabled: Arc<AtomicBool>,
    mut ctx: HandlerContext,
) {
    while let Ok(item) = rx.recv() {
        if !enabled.load(Ordering::Relaxed) {
            // Not streaming; discard instead of bursting stale data later.
            continue;
        }
        if !ctx.delay.is_zero() {
            thread::sleep(ctx.delay);
        }
        match realize_outbound(item, &mut ctx) {
            Ok(bytes) => {
                if let Err(err) = socket.send_to(&bytes, addr) {
                    log::warn!("[{}] - udp send to {addr} failed: {err}", ctx.pmu_id);
                }
            }
            Err(err) => log::warn!("[{}] - cannot encode outbound frame: {err}", ctx.pmu_id),
        }
    }
}

fn send_datagram(
    socket: &UdpSocket,
    addr: SocketAddr,
    bytes: Result<Vec<u8>, FrameError>,
    pmu_id: u16,
    what: &str,
) {
    match bytes {
        Ok(bytes) => {
            if let Err(err) = socket.send_to(&bytes, addr) {
                log::warn!("[{pmu_id}] - udp send to {addr} failed: {err}");
            } else {
                log::info!("[{pmu_id}] - requested {what} frame sent to {addr}");
            }
        }
        Err(err) => log::error!("[{pmu_id}] - cannot encode {what} reply: {err}"),
    }
}

/// Converts one engineering-unit sample into the wire representation the
/// stream's FORMAT selects.
fn coerce_sample(sample: &StreamSample, cfg: &StreamConfig) -> Result<PmuData, FrameError> {
    let format = cfg.format();
    if sample.phasors.len() != cfg.phasor_count() {
        return Err(FrameError::ShapeMismatch { field: "PHASORS" });
    }
    if sample.analogs.len() != cfg.analog_count() {
        return Err(FrameError::ShapeMismatch { field: "ANALOG" });
    }
    if sample.digitals.len() != cfg.digital_count() {
        return Err(FrameError::ShapeMismatch { field: "DIGITAL" });
    }

    let phasors = sample
        .phasors
        .iter()
        .zip(cfg.phasor_units())
        .map(|(&(first, second), unit)| {
            if format.float_phasors {
                if format.polar_phasors {
                    PhasorValue::FloatPolar {
                        magnitude: first as f32,
                        angle: second as f32,
                    }
                } else {
                    PhasorValue::FloatRect {
                        re: first as f32,
                        im: second as f32,
                    }
                }
            } else {
                let scale = match unit.scale() {
                    0 => 1.0,
                    scale => scale as f64 * 1e-5,
                };
                if format.polar_phasors {
                    PhasorValue::IntPolar {
                        magnitude: (first / scale).round() as u16,
                        angle: (second * 1e4).round() as i16,
                    }
                } else {
                    PhasorValue::IntRect {
                        re: (first / scale).round() as i16,
                        im: (second / scale).round() as i16,
                    }
                }
            }
        })
        .collect();

    let analogs = sample
        .analogs
        .iter()
        .zip(cfg.analog_units())
        .map(|(&value, unit)| {
            if format.float_analogs {
                AnalogValue::Float(value as f32)
            } else {
                let scale = match unit.scale() {
                    0 => 1.0,
                    scale => scale as f64,
                };
                AnalogValue::Int((value / scale).round() as i16)
            }
        })
        .collect();

    let (freq, dfreq) = if format.float_freq {
        (
            FreqValue::Float(sample.freq as f32),
            FreqValue::Float(sample.dfreq as f32),
        )
    } else {
        (
            FreqValue::Int(sample.freq.round() as i16),
            FreqValue::Int(sample.dfreq.round() as i16),
        )
    };

    Ok(PmuData {
        stat: sample.stat,
        phasors,
        freq,
        dfreq,
        analogs,
        digitals: sample.digitals.clone(),
    })
}

/// The sample configuration from IEEE C37.118.2 Annex D (Table D.2): one
/// stream, four phasors, three analogs, one digital word, float analogs and
/// integer everything else, 30 frames per second.
pub fn ieee_cfg2_sample(pmu_id: u16) -> Result<ConfigFrame, FrameError> {
    let format = DataFormat {
        float_analogs: true,
        ..DataFormat::default()
    };
    let stream = StreamConfig::new(
        "Station A",
        pmu_id,
        format,
        &[
            "VA",
            "VB",
            "VC",
            "I1",
            "ANALOG1",
            "ANALOG2",
            "ANALOG3",
            "BREAKER 1 STATUS",
            "BREAKER 2 STATUS",
            "BREAKER 3 STATUS",
            "BREAKER 4 STATUS",
            "BREAKER 5 STATUS",
            "BREAKER 6 STATUS",
            "BREAKER 7 STATUS",
            "BREAKER 8 STATUS",
            "BREAKER 9 STATUS",
            "BREAKER A STATUS",
            "BREAKER B STATUS",
            "BREAKER C STATUS",
            "BREAKER D STATUS",
            "BREAKER E STATUS",
            "BREAKER F STATUS",
            "BREAKER G STATUS",
        ],
        vec![
            PhasorUnit::voltage(915_527)?,
            PhasorUnit::voltage(915_527)?,
            PhasorUnit::voltage(915_527)?,
            PhasorUnit::current(45_776)?,
        ],
        vec![
            AnalogUnit::new(AnalogType::Pow, 1)?,
            AnalogUnit::new(AnalogType::Rms, 1)?,
            AnalogUnit::new(AnalogType::Peak, 1)?,
        ],
        vec![DigitalUnit::new(0x0000, 0xffff)],
        NominalFreq::Hz60,
        22,
    )?;
    ConfigFrame::new(ConfigVersion::Cfg2, pmu_id, 1_000_000, vec![stream], 30)
}

/// The sample measurement from IEEE C37.118.2 Annex D (Table D.1), matching
/// [`ieee_cfg2_sample`].
pub fn ieee_data_sample(pmu_id: u16) -> Result<DataFrame, FrameError> {
    DataFrame::new(
        pmu_id,
        vec![PmuData {
            stat: Stat::default(),
            phasors: vec![
                PhasorValue::IntRect { re: 14635, im: 0 },
                PhasorValue::IntRect {
                    re: -7318,
                    im: -12676,
                },
                PhasorValue::IntRect {
                    re: -7318,
                    im: 12675,
                },
                PhasorValue::IntRect { re: 1092, im: 0 },
            ],
            freq: FreqValue::Int(2500),
            dfreq: FreqValue::Int(0),
            analogs: vec![
                AnalogValue::Float(100.0),
                AnalogValue::Float(1000.0),
                AnalogValue::Float(10000.0),
            ],
            digitals: vec![0x3c12],
        }],
    )
}
