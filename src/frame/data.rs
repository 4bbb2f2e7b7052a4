//! Data frames. A data frame has no self-describing layout: the configuration
//! frame that announced the stream decides field widths and encodings, so both
//! `encode` and `decode` take the governing [`ConfigFrame`].

use crate::error::FrameError;
use crate::frame::config::{ConfigFrame, StreamConfig};
use crate::frame::cursor::FrameCursor;
use crate::frame::format::DataFormat;
use crate::frame::stat::{MeasurementStatus, Stat};
use crate::frame::time::Frasec;
use crate::frame::{decode_envelope, encode_frame, validate_id_code, FrameKind};

/// One phasor, in the representation the stream's FORMAT word selects.
///
/// Integer polar angles are in units of 1e-4 radians; float polar angles are
/// in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhasorValue {
    IntRect { re: i16, im: i16 },
    IntPolar { magnitude: u16, angle: i16 },
    FloatRect { re: f32, im: f32 },
    FloatPolar { magnitude: f32, angle: f32 },
}

impl PhasorValue {
    fn matches(&self, format: DataFormat) -> bool {
        matches!(
            (self, format.float_phasors, format.polar_phasors),
            (PhasorValue::IntRect { .. }, false, false)
                | (PhasorValue::IntPolar { .. }, false, true)
                | (PhasorValue::FloatRect { .. }, true, false)
                | (PhasorValue::FloatPolar { .. }, true, true)
        )
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<(), FrameError> {
        match *self {
            PhasorValue::IntRect { re, im } => {
                for value in [re, im] {
                    if value == i16::MIN {
                        return Err(FrameError::FieldOutOfRange {
                            field: "PHASOR component",
                            value: value as i64,
                        });
                    }
                }
                out.extend_from_slice(&re.to_be_bytes());
                out.extend_from_slice(&im.to_be_bytes());
            }
            PhasorValue::IntPolar { magnitude, angle } => {
                if !(-31_416..=31_416).contains(&angle) {
                    return Err(FrameError::FieldOutOfRange {
                        field: "PHASOR angle",
                        value: angle as i64,
                    });
                }
                out.extend_from_slice(&magnitude.to_be_bytes());
                out.extend_from_slice(&angle.to_be_bytes());
            }
            PhasorValue::FloatRect { re, im } => {
                out.extend_from_slice(&re.to_be_bytes());
                out.extend_from_slice(&im.to_be_bytes());
            }
            PhasorValue::FloatPolar { magnitude, angle } => {
                if !(-3.142..=3.142).contains(&angle) {
                    return Err(FrameError::FieldOutOfRange {
                        field: "PHASOR angle",
                        value: angle as i64,
                    });
                }
                out.extend_from_slice(&magnitude.to_be_bytes());
                out.extend_from_slice(&angle.to_be_bytes());
            }
        }
        Ok(())
    }

    fn decode(cur: &mut FrameCursor, format: DataFormat) -> Result<Self, FrameError> {
        Ok(match (format.float_phasors, format.polar_phasors) {
            (false, false) => PhasorValue::IntRect {
                re: cur.read_i16()?,
                im: cur.read_i16()?,
            },
            (false, true) => PhasorValue::IntPolar {
                magnitude: cur.read_u16()?,
                angle: cur.read_i16()?,
            },
            (true, false) => PhasorValue::FloatRect {
                re: cur.read_f32()?,
                im: cur.read_f32()?,
            },
            (true, true) => PhasorValue::FloatPolar {
                magnitude: cur.read_f32()?,
                angle: cur.read_f32()?,
            },
        })
    }
}

/// FREQ or DFREQ in the representation the FORMAT word selects. The integer
/// FREQ form is the deviation from FNOM in millihertz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FreqValue {
    Int(i16),
    Float(f32),
}

impl Default for FreqValue {
    fn default() -> Self {
        FreqValue::Int(0)
    }
}

impl FreqValue {
    fn matches(&self, format: DataFormat) -> bool {
        matches!(
            (self, format.float_freq),
            (FreqValue::Int(_), false) | (FreqValue::Float(_), true)
        )
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<(), FrameError> {
        match *self {
            FreqValue::Int(value) => {
                if value == i16::MIN {
                    return Err(FrameError::FieldOutOfRange {
                        field: "FREQ",
                        value: value as i64,
                    });
                }
                out.extend_from_slice(&value.to_be_bytes());
            }
            FreqValue::Float(value) => out.extend_from_slice(&value.to_be_bytes()),
        }
        Ok(())
    }

    fn decode(cur: &mut FrameCursor, format: DataFormat) -> Result<Self, FrameError> {
        Ok(if format.float_freq {
            FreqValue::Float(cur.read_f32()?)
        } else {
            FreqValue::Int(cur.read_i16()?)
        })
    }
}

/// One analog value in the representation the FORMAT word selects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnalogValue {
    Int(i16),
    Float(f32),
}

impl AnalogValue {
    fn matches(&self, format: DataFormat) -> bool {
        matches!(
            (self, format.float_analogs),
            (AnalogValue::Int(_), false) | (AnalogValue::Float(_), true)
        )
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<(), FrameError> {
        match *self {
            AnalogValue::Int(value) => {
                if value == i16::MIN {
                    return Err(FrameError::FieldOutOfRange {
                        field: "ANALOG",
                        value: value as i64,
                    });
                }
                out.extend_from_slice(&value.to_be_bytes());
            }
            AnalogValue::Float(value) => out.extend_from_slice(&value.to_be_bytes()),
        }
        Ok(())
    }

    fn decode(cur: &mut FrameCursor, format: DataFormat) -> Result<Self, FrameError> {
        Ok(if format.float_analogs {
            AnalogValue::Float(cur.read_f32()?)
        } else {
            AnalogValue::Int(cur.read_i16()?)
        })
    }
}

/// One data frame sub-record: the measurements of a single stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PmuData {
    pub stat: Stat,
    pub phasors: Vec<PhasorValue>,
    pub freq: FreqValue,
    pub dfreq: FreqValue,
    pub analogs: Vec<AnalogValue>,
    pub digitals: Vec<u16>,
}

impl PmuData {
    fn encode_block(&self, out: &mut Vec<u8>, cfg: &StreamConfig) -> Result<(), FrameError> {
        let format = cfg.format();
        if self.phasors.len() != cfg.phasor_count() {
            return Err(FrameError::ShapeMismatch { field: "PHASORS" });
        }
        if self.analogs.len() != cfg.analog_count() {
            return Err(FrameError::ShapeMismatch { field: "ANALOG" });
        }
        if self.digitals.len() != cfg.digital_count() {
            return Err(FrameError::ShapeMismatch { field: "DIGITAL" });
        }
        if !self.freq.matches(format) || !self.dfreq.matches(format) {
            return Err(FrameError::ShapeMismatch { field: "FREQ format" });
        }
        out.extend_from_slice(&self.stat.to_word().to_be_bytes());
        for phasor in &self.phasors {
            if !phasor.matches(format) {
                return Err(FrameError::ShapeMismatch {
                    field: "PHASOR format",
                });
            }
            phasor.encode(out)?;
        }
        self.freq.encode(out)?;
        self.dfreq.encode(out)?;
        for analog in &self.analogs {
            if !analog.matches(format) {
                return Err(FrameError::ShapeMismatch {
                    field: "ANALOG format",
                });
            }
            analog.encode(out)?;
        }
        for digital in &self.digitals {
            out.extend_from_slice(&digital.to_be_bytes());
        }
        Ok(())
    }

    fn decode_block(cur: &mut FrameCursor, cfg: &StreamConfig) -> Result<Self, FrameError> {
        let format = cfg.format();
        let stat = Stat::from_word(cur.read_u16()?);
        let mut phasors = Vec::with_capacity(cfg.phasor_count());
        for _ in 0..cfg.phasor_count() {
            phasors.push(PhasorValue::decode(cur, format)?);
        }
        let freq = FreqValue::decode(cur, format)?;
        let dfreq = FreqValue::decode(cur, format)?;
        let mut analogs = Vec::with_capacity(cfg.analog_count());
        for _ in 0..cfg.analog_count() {
            analogs.push(AnalogValue::decode(cur, format)?);
        }
        let mut digitals = Vec::with_capacity(cfg.digital_count());
        for _ in 0..cfg.digital_count() {
            digitals.push(cur.read_u16()?);
        }
        Ok(PmuData {
            stat,
            phasors,
            freq,
            dfreq,
            analogs,
            digitals,
        })
    }
}

/// A decoded data frame: one [`PmuData`] per stream of the governing
/// configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    version: u8,
    id_code: u16,
    soc: u32,
    frasec: Frasec,
    streams: Vec<PmuData>,
}

impl DataFrame {
    pub fn new(id_code: u16, streams: Vec<PmuData>) -> Result<Self, FrameError> {
        validate_id_code("IDCODE", id_code)?;
        if streams.is_empty() {
            return Err(FrameError::ShapeMismatch { field: "NUM_PMU" });
        }
        let (soc, frasec) = crate::frame::time::timestamp_now();
        Ok(DataFrame {
            version: 1,
            id_code,
            soc,
            frasec,
            streams,
        })
    }

    pub fn id_code(&self) -> u16 {
        self.id_code
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

    pub fn streams(&self) -> &[PmuData] {
        &self.streams
    }

    pub fn encode(&self, cfg: &ConfigFrame) -> Result<Vec<u8>, FrameError> {
        if self.streams.len() != cfg.num_pmu() {
            return Err(FrameError::ShapeMismatch { field: "NUM_PMU" });
        }
        let mut payload = Vec::new();
        for (data, stream_cfg) in self.streams.iter().zip(cfg.streams()) {
            data.encode_block(&mut payload, stream_cfg)?;
        }
        encode_frame(
            FrameKind::Data.type_code(),
            self.version,
            self.id_code,
            self.soc,
            self.frasec,
            &payload,
        )
    }

    /// Decodes a complete data frame (CRC included) against `cfg`.
    pub fn decode(bytes: &[u8], cfg: &ConfigFrame) -> Result<Self, FrameError> {
        let (envelope, payload) = decode_envelope(bytes)?;
        if envelope.type_code != FrameKind::Data.type_code() {
            return Err(FrameError::BadFrameType(envelope.type_code));
        }
        let mut cur = FrameCursor::new(payload);
        let mut streams = Vec::with_capacity(cfg.num_pmu());
        for stream_cfg in cfg.streams() {
            streams.push(PmuData::decode_block(&mut cur, stream_cfg)?);
        }
        if cur.remaining() != 0 {
            return Err(FrameError::ShapeMismatch {
                field: "FRAMESIZE",
            });
        }
        Ok(DataFrame {
            version: envelope.version,
            id_code: envelope.id_code,
            soc: envelope.soc,
            frasec: envelope.frasec,
            streams,
        })
    }

    /// Converts the raw stream values into engineering units using `cfg`:
    /// integer phasors scale by PHUNIT * 1e-5 (angles by 1e-4 rad),
    /// rectangular phasors convert to polar, and integer FREQ becomes
    /// FNOM + freq/1000 Hz.
    pub fn measurements(&self, cfg: &ConfigFrame) -> Result<Measurements, FrameError> {
        if self.streams.len() != cfg.num_pmu() {
            return Err(FrameError::ShapeMismatch { field: "NUM_PMU" });
        }
        let mut streams = Vec::with_capacity(self.streams.len());
        for (data, stream_cfg) in self.streams.iter().zip(cfg.streams()) {
            if data.phasors.len() != stream_cfg.phasor_count() {
                return Err(FrameError::ShapeMismatch { field: "PHASORS" });
            }
            let mut phasors = Vec::with_capacity(data.phasors.len());
            for (phasor, unit) in data.phasors.iter().zip(stream_cfg.phasor_units()) {
                let scale = unit.scale() as f64 * 1e-5;
                phasors.push(match *phasor {
                    PhasorValue::IntRect { re, im } => {
                        let (re, im) = (re as f64 * scale, im as f64 * scale);
                        ((re * re + im * im).sqrt(), im.atan2(re))
                    }
                    PhasorValue::IntPolar { magnitude, angle } => {
                        (magnitude as f64 * scale, angle as f64 * 1e-4)
                    }
                    PhasorValue::FloatRect { re, im } => {
                        ((re as f64).hypot(im as f64), (im as f64).atan2(re as f64))
                    }
                    PhasorValue::FloatPolar { magnitude, angle } => {
                        (magnitude as f64, angle as f64)
                    }
                });
            }
            let frequency = match data.freq {
                FreqValue::Int(mhz) => stream_cfg.nominal_freq().hertz() + mhz as f64 / 1000.0,
                FreqValue::Float(hz) => hz as f64,
            };
            let rocof = match data.dfreq {
                FreqValue::Int(raw) => raw as f64,
                FreqValue::Float(value) => value as f64,
            };
            let analogs = data
                .analogs
                .iter()
                .map(|analog| match *analog {
                    AnalogValue::Int(value) => value as f64,
                    AnalogValue::Float(value) => value as f64,
                })
                .collect();
            streams.push(StreamMeasurements {
                stream_id: stream_cfg.id_code(),
                status: data.stat.status,
                phasors,
                analogs,
                digitals: data.digitals.clone(),
                frequency,
                rocof,
            });
        }
        Ok(Measurements {
            pmu_id: self.id_code,
            time: self.soc as f64 + self.frasec.fraction() as f64 / cfg.time_base() as f64,
            streams,
        })
    }
}

/// Engineering-unit view of one stream of a data frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMeasurements {
    pub stream_id: u16,
    pub status: MeasurementStatus,
    /// (magnitude, angle in radians) per phasor channel.
    pub phasors: Vec<(f64, f64)>,
    pub analogs: Vec<f64>,
    pub digitals: Vec<u16>,
    /// Frequency in Hz.
    pub frequency: f64,
    /// Rate of change of frequency, as transmitted.
    pub rocof: f64,
}

/// Engineering-unit view of a whole data frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurements {
    pub pmu_id: u16,
    /// Frame timestamp in seconds: SOC plus the fractional part.
    pub time: f64,
    pub streams: Vec<StreamMeasurements>,
}
