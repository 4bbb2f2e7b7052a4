//! Typed frames and the shared wire envelope.
//!
//! Every frame starts with the same 14-byte envelope (SYNC, FRAMESIZE,
//! IDCODE, SOC, FRASEC) and ends with a CRC-16/XMODEM word. The SYNC second
//! byte carries the frame type in its high nibble and the protocol version in
//! its low nibble.

mod command;
mod config;
mod cursor;
mod data;
mod format;
mod header;
mod stat;
mod time;

pub use command::{Command, CommandFrame, MAX_EXTENDED_LEN};
pub use config::{
    AnalogType, AnalogUnit, ConfigFrame, ConfigVersion, DigitalUnit, NominalFreq, PhasorType,
    PhasorUnit, StreamConfig,
};
pub use data::{
    AnalogValue, DataFrame, FreqValue, Measurements, PhasorValue, PmuData, StreamMeasurements,
};
pub use format::DataFormat;
pub use header::HeaderFrame;
pub use stat::{MeasurementStatus, Stat, UnlockedTime};
pub use time::{timestamp_now, Frasec, LeapDirection};

use crate::crc::{crc16_xmodem, verify_crc};
use crate::error::FrameError;
use cursor::FrameCursor;

/// The frame families, by SYNC type nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Data,
    Header,
    Cfg1,
    Cfg2,
    Command,
    Cfg3,
}

impl FrameKind {
    pub fn type_code(self) -> u8 {
        match self {
            FrameKind::Data => 0,
            FrameKind::Header => 1,
            FrameKind::Cfg1 => 2,
            FrameKind::Cfg2 => 3,
            FrameKind::Command => 4,
            FrameKind::Cfg3 => 5,
        }
    }

    pub fn from_type_code(code: u8) -> Result<Self, FrameError> {
        match code {
            0 => Ok(FrameKind::Data),
            1 => Ok(FrameKind::Header),
            2 => Ok(FrameKind::Cfg1),
            3 => Ok(FrameKind::Cfg2),
            4 => Ok(FrameKind::Command),
            5 => Ok(FrameKind::Cfg3),
            other => Err(FrameError::BadFrameType(other)),
        }
    }
}

/// Classifies a complete frame without building its typed fields.
///
/// The CRC is verified first, so a frame accepted here is safe to forward
/// verbatim. This is the splitter's fast path.
pub fn extract_frame_kind(bytes: &[u8]) -> Result<FrameKind, FrameError> {
    verify_crc(bytes)?;
    if bytes[0] != 0xaa {
        return Err(FrameError::BadSync(bytes[0]));
    }
    FrameKind::from_type_code(bytes[1] >> 4)
}

/// Any typed frame. Config v1 and v2 share one representation; config v3 has
/// no typed form and fails decoding with `BadFrameType`.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Data(DataFrame),
    Header(HeaderFrame),
    Config(ConfigFrame),
    Command(CommandFrame),
}

impl Frame {
    /// Decodes a complete frame. Data frames are layout-dependent and need
    /// the governing configuration; without one they fail with
    /// `MissingConfig`.
    pub fn decode(bytes: &[u8], cfg: Option<&ConfigFrame>) -> Result<Frame, FrameError> {
        verify_crc(bytes)?;
        if bytes[0] != 0xaa {
            return Err(FrameError::BadSync(bytes[0]));
        }
        match FrameKind::from_type_code(bytes[1] >> 4)? {
            FrameKind::Data => {
                let cfg = cfg.ok_or(FrameError::MissingConfig)?;
                Ok(Frame::Data(DataFrame::decode(bytes, cfg)?))
            }
            FrameKind::Header => Ok(Frame::Header(HeaderFrame::decode(bytes)?)),
            FrameKind::Cfg1 | FrameKind::Cfg2 => Ok(Frame::Config(ConfigFrame::decode(bytes)?)),
            FrameKind::Command => Ok(Frame::Command(CommandFrame::decode(bytes)?)),
            FrameKind::Cfg3 => Err(FrameError::BadFrameType(FrameKind::Cfg3.type_code())),
        }
    }

    /// Encodes the frame; data frames need the governing configuration.
    pub fn encode(&self, cfg: Option<&ConfigFrame>) -> Result<Vec<u8>, FrameError> {
        match self {
            Frame::Data(frame) => frame.encode(cfg.ok_or(FrameError::MissingConfig)?),
            Frame::Header(frame) => frame.encode(),
            Frame::Config(frame) => frame.encode(),
            Frame::Command(frame) => frame.encode(),
        }
    }

    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Data(_) => FrameKind::Data,
            Frame::Header(_) => FrameKind::Header,
            Frame::Config(frame) => match frame.kind() {
                ConfigVersion::Cfg1 => FrameKind::Cfg1,
                ConfigVersion::Cfg2 => FrameKind::Cfg2,
            },
            Frame::Command(_) => FrameKind::Command,
        }
    }

    pub fn id_code(&self) -> u16 {
        match self {
            Frame::Data(frame) => frame.id_code(),
            Frame::Header(frame) => frame.id_code(),
            Frame::Config(frame) => frame.id_code(),
            Frame::Command(frame) => frame.id_code(),
        }
    }

    pub fn set_time(&mut self, soc: u32, frasec: Frasec) {
        match self {
            Frame::Data(frame) => frame.set_time(soc, frasec),
            Frame::Header(frame) => frame.set_time(soc, frasec),
            Frame::Config(frame) => frame.set_time(soc, frasec),
            Frame::Command(frame) => frame.set_time(soc, frasec),
        }
    }
}

pub(crate) struct Envelope {
    pub type_code: u8,
    pub version: u8,
    pub id_code: u16,
    pub soc: u32,
    pub frasec: Frasec,
}

/// Verifies CRC and SYNC, parses the envelope, and returns it together with
/// the payload slice (everything between FRASEC and the CRC word).
pub(crate) fn decode_envelope(bytes: &[u8]) -> Result<(Envelope, &[u8]), FrameError> {
    verify_crc(bytes)?;
    if bytes.len() < 16 {
        return Err(FrameError::Truncated {
            needed: 16,
            have: bytes.len(),
        });
    }
    if bytes[0] != 0xaa {
        return Err(FrameError::BadSync(bytes[0]));
    }
    let mut cur = FrameCursor::new(&bytes[2..14]);
    let framesize = cur.read_u16()? as usize;
    if framesize != bytes.len() {
        return Err(FrameError::FieldOutOfRange {
            field: "FRAMESIZE",
            value: framesize as i64,
        });
    }
    let id_code = cur.read_u16()?;
    let soc = cur.read_u32()?;
    let frasec = Frasec::from_word(cur.read_u32()?);
    let envelope = Envelope {
        type_code: bytes[1] >> 4,
        version: bytes[1] & 0x0f,
        id_code,
        soc,
        frasec,
    };
    Ok((envelope, &bytes[14..bytes.len() - 2]))
}

/// Assembles a complete frame around `payload`: envelope in front, CRC at
/// the back. FRAMESIZE counts every byte including the CRC.
pub(crate) fn encode_frame(
    type_code: u8,
    version: u8,
    id_code: u16,
    soc: u32,
    frasec: Frasec,
    payload: &[u8],
) -> Result<Vec<u8>, FrameError> {
    let framesize = 16 + payload.len();
    if framesize > u16::MAX as usize {
        return Err(FrameError::FieldOutOfRange {
            field: "FRAMESIZE",
            value: framesize as i64,
        });
    }
    let mut out = Vec::with_capacity(framesize);
    out.push(0xaa);
    out.push(type_code << 4 | version & 0x0f);
    out.extend_from_slice(&(framesize as u16).to_be_bytes());
    out.extend_from_slice(&id_code.to_be_bytes());
    out.extend_from_slice(&soc.to_be_bytes());
    out.extend_from_slice(&frasec.to_word().to_be_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&crc16_xmodem(&out).to_be_bytes());
    Ok(out)
}

pub(crate) fn validate_id_code(field: &'static str, id_code: u16) -> Result<(), FrameError> {
    if id_code == 0 || id_code == u16::MAX {
        return Err(FrameError::FieldOutOfRange {
            field,
            value: id_code as i64,
        });
    }
    Ok(())
}

/// Truncates to 16 characters and right-pads with spaces, the fixed name
/// cell used for station and channel names.
pub(crate) fn pad16(field: &'static str, name: &str) -> Result<String, FrameError> {
    if !name.is_ascii() {
        return Err(FrameError::NotAscii { field });
    }
    let mut cell = name.as_bytes()[..name.len().min(16)].to_vec();
    cell.resize(16, b' ');
    Ok(String::from_utf8_lossy(&cell).into_owned())
}
