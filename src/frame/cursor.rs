//! Bounds-checked big-endian reads over a frame byte slice.

use byteorder::{BigEndian, ByteOrder};

use crate::error::FrameError;

pub(crate) struct FrameCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        FrameCursor { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FrameError> {
        if self.buf.len() - self.pos < n {
            return Err(FrameError::Truncated {
                needed: self.pos + n,
                have: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u16(&mut self) -> Result<u16, FrameError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16, FrameError> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, FrameError> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_f32(&mut self) -> Result<f32, FrameError> {
        Ok(BigEndian::read_f32(self.take(4)?))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], FrameError> {
        self.take(n)
    }

    /// Reads a fixed 16-byte ASCII name cell, returned verbatim (right padding
    /// included).
    pub fn read_name(&mut self, field: &'static str) -> Result<String, FrameError> {
        let raw = self.take(16)?;
        if !raw.is_ascii() {
            return Err(FrameError::NotAscii { field });
        }
        // Safe: just checked the bytes are ASCII.
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}
