//! Command frames: the PDC-to-PMU control channel.

use crate::error::FrameError;
use crate::frame::cursor::FrameCursor;
use crate::frame::time::{timestamp_now, Frasec};
use crate::frame::{decode_envelope, encode_frame, validate_id_code, FrameKind};

/// Maximum byte length of an extended command payload.
pub const MAX_EXTENDED_LEN: usize = 65_518;

/// The designated command codes. Codes outside the designated set pass
/// through as [`Command::Custom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Turn off transmission (code 1).
    Stop,
    /// Turn on transmission (code 2).
    Start,
    /// Send the header frame (code 3).
    SendHeader,
    /// Send configuration frame 1 (code 4).
    SendCfg1,
    /// Send configuration frame 2 (code 5).
    SendCfg2,
    /// Send configuration frame 3 (code 6).
    SendCfg3,
    /// Extended frame with an opaque payload (code 8).
    Extended,
    /// User-designated command word.
    Custom(u16),
}

impl Command {
    pub fn code(self) -> u16 {
        match self {
            Command::Stop => 1,
            Command::Start => 2,
            Command::SendHeader => 3,
            Command::SendCfg1 => 4,
            Command::SendCfg2 => 5,
            Command::SendCfg3 => 6,
            Command::Extended => 8,
            Command::Custom(code) => code,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Command::Stop,
            2 => Command::Start,
            3 => Command::SendHeader,
            4 => Command::SendCfg1,
            5 => Command::SendCfg2,
            6 => Command::SendCfg3,
            8 => Command::Extended,
            other => Command::Custom(other),
        }
    }
}

/// A command frame. The extended payload is only present for
/// [`Command::Extended`].
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFrame {
    version: u8,
    id_code: u16,
    soc: u32,
    frasec: Frasec,
    command: Command,
    extended_data: Vec<u8>,
}

impl CommandFrame {
    /// Builds a command frame addressed to data stream `id_code`, stamped
    /// with the current wall-clock time.
    pub fn new(id_code: u16, command: Command) -> Result<Self, FrameError> {
        validate_id_code("IDCODE", id_code)?;
        let (soc, frasec) = timestamp_now();
        Ok(CommandFrame {
            version: 1,
            id_code,
            soc,
            frasec,
            command,
            extended_data: Vec::new(),
        })
    }

    /// Builds an extended command frame carrying `payload` opaque bytes.
    pub fn new_extended(id_code: u16, payload: Vec<u8>) -> Result<Self, FrameError> {
        if payload.len() > MAX_EXTENDED_LEN {
            return Err(FrameError::FieldOutOfRange {
                field: "EXTFRAME length",
                value: payload.len() as i64,
            });
        }
        let mut frame = CommandFrame::new(id_code, Command::Extended)?;
        frame.extended_data = payload;
        Ok(frame)
    }

    pub fn id_code(&self) -> u16 {
        self.id_code
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn extended_data(&self) -> &[u8] {
        &self.extended_data
    }

    pub fn soc(&self) -> u32 {
        self.soc
    }

    pub fn frasec(&self) -> Frasec {
        self.frasec
    }

    pub fn set_time(&mut self, soc: u32, frasec: Frasec) {
        self.soc = soc;
        self.frasec = frasec;
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let mut payload = Vec::with_capacity(2 + self.extended_data.len());
        payload.extend_from_slice(&self.command.code().to_be_bytes());
        if self.command == Command::Extended {
            payload.extend_from_slice(&self.extended_data);
        }
        encode_frame(
            FrameKind::Command.type_code(),
            self.version,
            self.id_code,
            self.soc,
            self.frasec,
            &payload,
        )
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let (envelope, payload) = decode_envelope(bytes)?;
        if envelope.type_code != FrameKind::Command.type_code() {
            return Err(FrameError::BadFrameType(envelope.type_code));
        }
        let mut cur = FrameCursor::new(payload);
        let command = Command::from_code(cur.read_u16()?);
        let extended_data = if command == Command::Extended {
            cur.read_bytes(cur.remaining())?.to_vec()
        } else {
            if cur.remaining() != 0 {
                return Err(FrameError::ShapeMismatch {
                    field: "FRAMESIZE",
                });
            }
            Vec::new()
        };
        Ok(CommandFrame {
            version: envelope.version,
            id_code: envelope.id_code,
            soc: envelope.soc,
            frasec: envelope.frasec,
            command,
            extended_data,
        })
    }
}
