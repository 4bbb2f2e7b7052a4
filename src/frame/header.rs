//! Header frames: free-form ASCII description of the data stream.

use crate::error::FrameError;
use crate::frame::cursor::FrameCursor;
use crate::frame::time::{timestamp_now, Frasec};
use crate::frame::{decode_envelope, encode_frame, validate_id_code, FrameKind};

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderFrame {
    version: u8,
    id_code: u16,
    soc: u32,
    frasec: Frasec,
    text: String,
}

impl HeaderFrame {
    pub fn new(id_code: u16, text: &str) -> Result<Self, FrameError> {
        validate_id_code("IDCODE", id_code)?;
        let (soc, frasec) = timestamp_now();
        let mut frame = HeaderFrame {
            version: 1,
            id_code,
            soc,
            frasec,
            text: String::new(),
        };
        frame.set_text(text)?;
        Ok(frame)
    }

    pub fn id_code(&self) -> u16 {
        self.id_code
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str) -> Result<(), FrameError> {
        if !text.is_ascii() {
            return Err(FrameError::NotAscii { field: "HEADER" });
        }
        if text.len() > u16::MAX as usize - 16 {
            return Err(FrameError::FieldOutOfRange {
                field: "HEADER length",
                value: text.len() as i64,
            });
        }
        self.text = text.to_owned();
        Ok(())
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
        encode_frame(
            FrameKind::Header.type_code(),
            self.version,
            self.id_code,
            self.soc,
            self.frasec,
            self.text.as_bytes(),
        )
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let (envelope, payload) = decode_envelope(bytes)?;
        if envelope.type_code != FrameKind::Header.type_code() {
            return Err(FrameError::BadFrameType(envelope.type_code));
        }
        let mut cur = FrameCursor::new(payload);
        let raw = cur.read_bytes(cur.remaining())?;
        if !raw.is_ascii() {
            return Err(FrameError::NotAscii { field: "HEADER" });
        }
        Ok(HeaderFrame {
            version: envelope.version,
            id_code: envelope.id_code,
            soc: envelope.soc,
            frasec: envelope.frasec,
            text: String::from_utf8_lossy(raw).into_owned(),
        })
    }
}
