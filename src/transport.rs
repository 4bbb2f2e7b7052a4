//! Framed byte transport: reassembles length-prefixed frames from a stream
//! of arbitrary read chunks.
//!
//! A frame's total length sits in bytes 2..4 of its envelope, so reassembly
//! has two phases: buffer until the first four bytes are in, then buffer
//! until FRAMESIZE bytes are in. Datagram transports deliver one complete
//! frame per datagram and skip this module's accumulator.

use std::io::Read;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder};

use crate::error::TransportError;

/// Default socket read chunk size.
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Transport flavor for a PMU/PDC session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// Connection-oriented; frames need reassembly from the byte stream.
    #[default]
    Tcp,
    /// One complete frame per datagram.
    Udp,
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Method::Tcp),
            "udp" => Ok(Method::Udp),
            other => Err(format!("unknown transport method {other:?}, expected tcp or udp")),
        }
    }
}

/// Incremental frame reassembly over arbitrary byte chunks.
///
/// Feed chunks with [`push`](FrameAccumulator::push), drain complete frames
/// with [`next_frame`](FrameAccumulator::next_frame). Bytes beyond a frame
/// boundary are kept for the next frame.
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    buf: Vec<u8>,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        FrameAccumulator::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pops the next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        if self.buf.len() < 4 {
            return None;
        }
        let framesize = BigEndian::read_u16(&self.buf[2..4]) as usize;
        // A framesize below the envelope minimum can never complete; let the
        // decoder report it instead of stalling the stream.
        let framesize = framesize.max(4);
        if self.buf.len() < framesize {
            return None;
        }
        let rest = self.buf.split_off(framesize);
        Some(std::mem::replace(&mut self.buf, rest))
    }

    /// Bytes currently buffered, complete or not.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Reads one complete frame from a blocking byte stream, buffering through
/// `acc`. A zero-length read means the peer closed the connection.
pub fn read_frame<R: Read>(
    reader: &mut R,
    acc: &mut FrameAccumulator,
    buffer_size: usize,
) -> Result<Vec<u8>, TransportError> {
    let mut chunk = vec![0u8; buffer_size.max(1)];
    loop {
        if let Some(frame) = acc.next_frame() {
            return Ok(frame);
        }
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Err(TransportError::ConnectionClosed);
        }
        acc.push(&chunk[..n]);
    }
}
