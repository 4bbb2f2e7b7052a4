//! The PDC client: connects to a PMU, drives the command protocol, and
//! decodes the received frames against the cached configuration.

use std::io::Write;
use std::net::{SocketAddr, TcpStream, UdpSocket};

use crate::error::{PdcError, TransportError};
use crate::frame::{
    Command, CommandFrame, ConfigFrame, ConfigVersion, Frame, FrameKind, HeaderFrame,
};
use crate::transport::{read_frame, FrameAccumulator, Method, DEFAULT_BUFFER_SIZE};

/// Which configuration version a [`Pdc::get_config`] request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigRequest {
    Cfg1,
    Cfg2,
    Cfg3,
}

impl ConfigRequest {
    fn command(self) -> Command {
        match self {
            ConfigRequest::Cfg1 => Command::SendCfg1,
            ConfigRequest::Cfg2 => Command::SendCfg2,
            ConfigRequest::Cfg3 => Command::SendCfg3,
        }
    }
}

enum Connection {
    Tcp {
        stream: TcpStream,
        acc: FrameAccumulator,
    },
    Udp {
        socket: UdpSocket,
        peer: SocketAddr,
    },
}

pub struct Pdc {
    pdc_id: u16,
    pmu_ip: String,
    pmu_port: u16,
    method: Method,
    buffer_size: usize,
    connection: Option<Connection>,
    cfg1: Option<ConfigFrame>,
    cfg2: Option<ConfigFrame>,
    header: Option<HeaderFrame>,
}

impl Pdc {
    pub fn new(pdc_id: u16, pmu_ip: &str, pmu_port: u16, method: Method) -> Pdc {
        Pdc {
            pdc_id,
            pmu_ip: pmu_ip.to_owned(),
            pmu_port,
            method,
            buffer_size: DEFAULT_BUFFER_SIZE,
            connection: None,
            cfg1: None,
            cfg2: None,
            header: None,
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Pdc {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// Seeds the configuration cache, e.g. from a previously stored cfg2.
    pub fn set_config(&mut self, cfg: ConfigFrame) {
        match cfg.kind() {
            ConfigVersion::Cfg1 => self.cfg1 = Some(cfg),
            ConfigVersion::Cfg2 => self.cfg2 = Some(cfg),
        }
    }

    /// The cached cfg2, if any request has fetched one yet.
    pub fn config(&self) -> Option<&ConfigFrame> {
        self.cfg2.as_ref()
    }

    /// The cached cfg1, if one has been requested.
    pub fn config1(&self) -> Option<&ConfigFrame> {
        self.cfg1.as_ref()
    }

    /// The cached header, if one has been requested.
    pub fn header(&self) -> Option<&HeaderFrame> {
        self.header.as_ref()
    }

    /// Connects to the PMU. A UDP "connection" binds an ephemeral local port
    /// and remembers the peer address.
    pub fn connect(&mut self) -> Result<(), PdcError> {
        if self.connection.is_some() {
            log::info!(
                "[{}] - already connected to PMU ({}:{})",
                self.pdc_id,
                self.pmu_ip,
                self.pmu_port
            );
            return Ok(());
        }
        let connection = match self.method {
            Method::Tcp => {
                let stream = TcpStream::connect((self.pmu_ip.as_str(), self.pmu_port))
                    .map_err(TransportError::from)?;
                Connection::Tcp {
                    stream,
                    acc: FrameAccumulator::new(),
                }
            }
            Method::Udp => {
                let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(TransportError::from)?;
                let peer = (self.pmu_ip.as_str(), self.pmu_port);
                let peer = std::net::ToSocketAddrs::to_socket_addrs(&peer)
                    .map_err(TransportError::from)?
                    .next()
                    .ok_or(PdcError::NotConnected)?;
                Connection::Udp { socket, peer }
            }
        };
        self.connection = Some(connection);
        log::info!(
            "[{}] - connected to PMU ({}:{})",
            self.pdc_id,
            self.pmu_ip,
            self.pmu_port
        );
        Ok(())
    }

    /// Requests the PMU to start sending measurements.
    pub fn start(&mut self) -> Result<(), PdcError> {
        self.send_command(Command::Start)?;
        log::info!(
            "[{}] - requested start from PMU ({}:{})",
            self.pdc_id,
            self.pmu_ip,
            self.pmu_port
        );
        Ok(())
    }

    /// Requests the PMU to stop sending measurements.
    pub fn stop(&mut self) -> Result<(), PdcError> {
        self.send_command(Command::Stop)?;
        log::info!(
            "[{}] - requested stop from PMU ({}:{})",
            self.pdc_id,
            self.pmu_ip,
            self.pmu_port
        );
        Ok(())
    }

    /// Requests and returns the header frame, caching it.
    pub fn get_header(&mut self) -> Result<HeaderFrame, PdcError> {
        self.send_command(Command::SendHeader)?;
        match self.get()? {
            Frame::Header(header) => {
                self.header = Some(header.clone());
                Ok(header)
            }
            other => Err(PdcError::InvalidResponse {
                expected: "header",
                got: kind_name(other.kind()),
            }),
        }
    }

    /// Requests a configuration frame and caches it by version. Data frames
    /// received afterwards decode against the cached cfg2.
    pub fn get_config(&mut self, request: ConfigRequest) -> Result<ConfigFrame, PdcError> {
        self.send_command(request.command())?;
        match self.get()? {
            Frame::Config(cfg) => {
                self.set_config(cfg.clone());
                Ok(cfg)
            }
            other => Err(PdcError::InvalidResponse {
                expected: "configuration",
                got: kind_name(other.kind()),
            }),
        }
    }

    /// Receives one framed message and decodes it. Data frames need a prior
    /// [`get_config`](Pdc::get_config) (or [`set_config`](Pdc::set_config));
    /// without one they fail with `MissingConfig`.
    pub fn get(&mut self) -> Result<Frame, PdcError> {
        let bytes = self.get_bytes()?;
        let frame = Frame::decode(&bytes, self.cfg2.as_ref())?;
        // A configuration pushed by the PMU replaces the cache right away.
        if let Frame::Config(cfg) = &frame {
            self.set_config(cfg.clone());
        }
        Ok(frame)
    }

    /// Receives one framed message and returns the raw bytes without
    /// decoding. The splitter forwards these verbatim.
    pub fn get_bytes(&mut self) -> Result<Vec<u8>, PdcError> {
        let buffer_size = self.buffer_size;
        match self.connection.as_mut().ok_or(PdcError::NotConnected)? {
            Connection::Tcp { stream, acc } => {
                Ok(read_frame(stream, acc, buffer_size).map_err(map_closed)?)
            }
            Connection::Udp { socket, .. } => {
                let mut buf = vec![0u8; u16::MAX as usize];
                let (len, _) = socket.recv_from(&mut buf).map_err(TransportError::from)?;
                buf.truncate(len);
                Ok(buf)
            }
        }
    }

    /// Closes the connection to the PMU. Any in-flight receive on another
    /// thread fails with `ConnectionClosed`.
    pub fn quit(&mut self) {
        if let Some(connection) = self.connection.take() {
            if let Connection::Tcp { stream, .. } = connection {
                let _ = stream.shutdown(std::net::Shutdown::Both);
            }
            log::info!(
                "[{}] - connection to PMU closed ({}:{})",
                self.pdc_id,
                self.pmu_ip,
                self.pmu_port
            );
        }
    }

    fn send_command(&mut self, command: Command) -> Result<(), PdcError> {
        let bytes = CommandFrame::new(self.pdc_id, command)?.encode()?;
        match self.connection.as_mut().ok_or(PdcError::NotConnected)? {
            Connection::Tcp { stream, .. } => {
                stream.write_all(&bytes).map_err(TransportError::from)?;
            }
            Connection::Udp { socket, peer } => {
                socket.send_to(&bytes, *peer).map_err(TransportError::from)?;
            }
        }
        Ok(())
    }
}

/// An in-flight read on a socket we shut down surfaces as an io error;
/// report it as the connection closing.
fn map_closed(err: TransportError) -> TransportError {
    match err {
        TransportError::Io(io)
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
            ) =>
        {
            TransportError::ConnectionClosed
        }
        other => other,
    }
}

fn kind_name(kind: FrameKind) -> &'static str {
    match kind {
        FrameKind::Data => "data",
        FrameKind::Header => "header",
        FrameKind::Cfg1 => "cfg1",
        FrameKind::Cfg2 => "cfg2",
        FrameKind::Cfg3 => "cfg3",
        FrameKind::Command => "command",
    }
}
