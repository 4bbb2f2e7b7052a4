//! Configuration frames (versions 1 and 2). The two versions share an
//! identical byte layout and differ only in the SYNC type nibble, so both are
//! represented by [`ConfigFrame`] tagged with a [`ConfigVersion`].

use crate::error::FrameError;
use crate::frame::cursor::FrameCursor;
use crate::frame::format::DataFormat;
use crate::frame::time::Frasec;
use crate::frame::{decode_envelope, encode_frame, pad16, validate_id_code, FrameKind};

/// Phasor channel type, carried in the PHUNIT high byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhasorType {
    Voltage,
    Current,
}

/// Conversion factor for one phasor channel: an unsigned 24-bit scale in
/// units of 1e-5 V (or A) per bit, applied to 16-bit integer data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhasorUnit {
    kind: PhasorType,
    scale: u32,
}

impl PhasorUnit {
    pub fn new(kind: PhasorType, scale: u32) -> Result<Self, FrameError> {
        if scale > 0x00ff_ffff {
            return Err(FrameError::FieldOutOfRange {
                field: "PHUNIT scale",
                value: scale as i64,
            });
        }
        Ok(PhasorUnit { kind, scale })
    }

    pub fn voltage(scale: u32) -> Result<Self, FrameError> {
        PhasorUnit::new(PhasorType::Voltage, scale)
    }

    pub fn current(scale: u32) -> Result<Self, FrameError> {
        PhasorUnit::new(PhasorType::Current, scale)
    }

    pub fn kind(&self) -> PhasorType {
        self.kind
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    fn to_word(self) -> u32 {
        let kind = match self.kind {
            PhasorType::Voltage => 0,
            PhasorType::Current => 1,
        };
        kind << 24 | self.scale
    }

    fn from_word(word: u32) -> Result<Self, FrameError> {
        let kind = match word >> 24 {
            0 => PhasorType::Voltage,
            1 => PhasorType::Current,
            other => {
                return Err(FrameError::FieldOutOfRange {
                    field: "PHUNIT type",
                    value: other as i64,
                })
            }
        };
        Ok(PhasorUnit {
            kind,
            scale: word & 0x00ff_ffff,
        })
    }
}

/// Analog channel type, carried in the ANUNIT high byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogType {
    /// Single point on wave.
    Pow,
    Rms,
    Peak,
}

/// Conversion factor for one analog channel: a signed 24-bit user-defined
/// scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogUnit {
    kind: AnalogType,
    scale: i32,
}

impl AnalogUnit {
    pub fn new(kind: AnalogType, scale: i32) -> Result<Self, FrameError> {
        if !(-8_388_608..=8_388_607).contains(&scale) {
            return Err(FrameError::FieldOutOfRange {
                field: "ANUNIT scale",
                value: scale as i64,
            });
        }
        Ok(AnalogUnit { kind, scale })
    }

    pub fn kind(&self) -> AnalogType {
        self.kind
    }

    pub fn scale(&self) -> i32 {
        self.scale
    }

    fn to_word(self) -> u32 {
        let kind: u32 = match self.kind {
            AnalogType::Pow => 0,
            AnalogType::Rms => 1,
            AnalogType::Peak => 2,
        };
        kind << 24 | (self.scale as u32 & 0x00ff_ffff)
    }

    fn from_word(word: u32) -> Result<Self, FrameError> {
        let kind = match word >> 24 {
            0 => AnalogType::Pow,
            1 => AnalogType::Rms,
            2 => AnalogType::Peak,
            other => {
                return Err(FrameError::FieldOutOfRange {
                    field: "ANUNIT type",
                    value: other as i64,
                })
            }
        };
        // Sign-extend the low 24 bits.
        let scale = (word << 8) as i32 >> 8;
        Ok(AnalogUnit { kind, scale })
    }
}

/// Mask words for one digital status word: the normal status of the inputs
/// and the set of inputs that are currently valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitalUnit {
    pub normal_status: u16,
    pub valid_inputs: u16,
}

impl DigitalUnit {
    pub fn new(normal_status: u16, valid_inputs: u16) -> Self {
        DigitalUnit {
            normal_status,
            valid_inputs,
        }
    }

    fn to_word(self) -> u32 {
        (self.normal_status as u32) << 16 | self.valid_inputs as u32
    }

    fn from_word(word: u32) -> Self {
        DigitalUnit {
            normal_status: (word >> 16) as u16,
            valid_inputs: word as u16,
        }
    }
}

/// Nominal line frequency. On the wire only bit 0 is used: 1 for 50 Hz,
/// 0 for 60 Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NominalFreq {
    Hz50,
    #[default]
    Hz60,
}

impl NominalFreq {
    pub fn hertz(self) -> f64 {
        match self {
            NominalFreq::Hz50 => 50.0,
            NominalFreq::Hz60 => 60.0,
        }
    }

    fn to_word(self) -> u16 {
        match self {
            NominalFreq::Hz50 => 1,
            NominalFreq::Hz60 => 0,
        }
    }

    fn from_word(word: u16) -> Result<Self, FrameError> {
        match word {
            0 => Ok(NominalFreq::Hz60),
            1 => Ok(NominalFreq::Hz50),
            other => Err(FrameError::FieldOutOfRange {
                field: "FNOM",
                value: other as i64,
            }),
        }
    }
}

/// Configuration of a single measurement stream: one sub-block of a
/// configuration frame, repeated NUM_PMU times on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    station_name: String,
    id_code: u16,
    format: DataFormat,
    channel_names: Vec<String>,
    phasor_units: Vec<PhasorUnit>,
    analog_units: Vec<AnalogUnit>,
    digital_units: Vec<DigitalUnit>,
    nominal_freq: NominalFreq,
    config_count: u16,
}

impl StreamConfig {
    /// Builds a stream configuration. Station and channel names are truncated
    /// to 16 characters and right-padded with spaces; the number of channel
    /// names must equal PHNMR + ANNMR + 16 * DGNMR.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        station_name: &str,
        id_code: u16,
        format: DataFormat,
        channel_names: &[&str],
        phasor_units: Vec<PhasorUnit>,
        analog_units: Vec<AnalogUnit>,
        digital_units: Vec<DigitalUnit>,
        nominal_freq: NominalFreq,
        config_count: u16,
    ) -> Result<Self, FrameError> {
        validate_id_code("ID_CODE", id_code)?;
        let expected = phasor_units.len() + analog_units.len() + 16 * digital_units.len();
        if channel_names.len() != expected {
            return Err(FrameError::ShapeMismatch {
                field: "CHNAM",
            });
        }
        if phasor_units.len() > u16::MAX as usize
            || analog_units.len() > u16::MAX as usize
            || digital_units.len() > u16::MAX as usize
        {
            return Err(FrameError::ShapeMismatch { field: "channel counts" });
        }
        let channel_names = channel_names
            .iter()
            .map(|name| pad16("CHNAM", name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StreamConfig {
            station_name: pad16("STN", station_name)?,
            id_code,
            format,
            channel_names,
            phasor_units,
            analog_units,
            digital_units,
            nominal_freq,
            config_count,
        })
    }

    /// Station name as stored on the wire: 16 ASCII characters, space padded.
    pub fn station_name(&self) -> &str {
        &self.station_name
    }

    pub fn set_station_name(&mut self, name: &str) -> Result<(), FrameError> {
        self.station_name = pad16("STN", name)?;
        Ok(())
    }

    pub fn id_code(&self) -> u16 {
        self.id_code
    }

    pub fn set_id_code(&mut self, id_code: u16) -> Result<(), FrameError> {
        validate_id_code("ID_CODE", id_code)?;
        self.id_code = id_code;
        Ok(())
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn set_format(&mut self, format: DataFormat) {
        self.format = format;
    }

    pub fn phasor_count(&self) -> usize {
        self.phasor_units.len()
    }

    pub fn analog_count(&self) -> usize {
        self.analog_units.len()
    }

    pub fn digital_count(&self) -> usize {
        self.digital_units.len()
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    pub fn phasor_units(&self) -> &[PhasorUnit] {
        &self.phasor_units
    }

    pub fn analog_units(&self) -> &[AnalogUnit] {
        &self.analog_units
    }

    pub fn digital_units(&self) -> &[DigitalUnit] {
        &self.digital_units
    }

    pub fn nominal_freq(&self) -> NominalFreq {
        self.nominal_freq
    }

    pub fn config_count(&self) -> u16 {
        self.config_count
    }

    fn encode_block(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.station_name.as_bytes());
        out.extend_from_slice(&self.id_code.to_be_bytes());
        out.extend_from_slice(&self.format.to_word().to_be_bytes());
        out.extend_from_slice(&(self.phasor_units.len() as u16).to_be_bytes());
        out.extend_from_slice(&(self.analog_units.len() as u16).to_be_bytes());
        out.extend_from_slice(&(self.digital_units.len() as u16).to_be_bytes());
        for name in &self.channel_names {
            out.extend_from_slice(name.as_bytes());
        }
        for unit in &self.phasor_units {
            out.extend_from_slice(&unit.to_word().to_be_bytes());
        }
        for unit in &self.analog_units {
            out.extend_from_slice(&unit.to_word().to_be_bytes());
        }
        for unit in &self.digital_units {
            out.extend_from_slice(&unit.to_word().to_be_bytes());
        }
        out.extend_from_slice(&self.nominal_freq.to_word().to_be_bytes());
        out.extend_from_slice(&self.config_count.to_be_bytes());
    }

    fn decode_block(cur: &mut FrameCursor) -> Result<Self, FrameError> {
        let station_name = cur.read_name("STN")?;
        let id_code = cur.read_u16()?;
        validate_id_code("ID_CODE", id_code)?;
        let format = DataFormat::from_word(cur.read_u16()?);
        let phasor_count = cur.read_u16()? as usize;
        let analog_count = cur.read_u16()? as usize;
        let digital_count = cur.read_u16()? as usize;

        let name_count = phasor_count + analog_count + 16 * digital_count;
        let mut channel_names = Vec::with_capacity(name_count);
        for _ in 0..name_count {
            channel_names.push(cur.read_name("CHNAM")?);
        }

        let mut phasor_units = Vec::with_capacity(phasor_count);
        for _ in 0..phasor_count {
            phasor_units.push(PhasorUnit::from_word(cur.read_u32()?)?);
        }
        let mut analog_units = Vec::with_capacity(analog_count);
        for _ in 0..analog_count {
            analog_units.push(AnalogUnit::from_word(cur.read_u32()?)?);
        }
        let mut digital_units = Vec::with_capacity(digital_count);
        for _ in 0..digital_count {
            digital_units.push(DigitalUnit::from_word(cur.read_u32()?));
        }

        let nominal_freq = NominalFreq::from_word(cur.read_u16()?)?;
        let config_count = cur.read_u16()?;

        Ok(StreamConfig {
            station_name,
            id_code,
            format,
            channel_names,
            phasor_units,
            analog_units,
            digital_units,
            nominal_freq,
            config_count,
        })
    }
}

/// Which of the two layout-identical configuration versions a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigVersion {
    Cfg1,
    Cfg2,
}

impl ConfigVersion {
    fn type_code(self) -> u8 {
        match self {
            ConfigVersion::Cfg1 => FrameKind::Cfg1.type_code(),
            ConfigVersion::Cfg2 => FrameKind::Cfg2.type_code(),
        }
    }
}

/// A configuration frame: TIME_BASE, one [`StreamConfig`] per measurement
/// stream, and the trailing DATA_RATE.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFrame {
    kind: ConfigVersion,
    version: u8,
    id_code: u16,
    soc: u32,
    frasec: Frasec,
    time_base: u32,
    streams: Vec<StreamConfig>,
    data_rate: i16,
}

impl ConfigFrame {
    /// Builds a configuration frame stamped with the current wall-clock
    /// time; use [`set_time`](ConfigFrame::set_time) to override.
    pub fn new(
        kind: ConfigVersion,
        id_code: u16,
        time_base: u32,
        streams: Vec<StreamConfig>,
        data_rate: i16,
    ) -> Result<Self, FrameError> {
        validate_id_code("IDCODE", id_code)?;
        if time_base == 0 || time_base > 0x00ff_ffff {
            return Err(FrameError::FieldOutOfRange {
                field: "TIME_BASE",
                value: time_base as i64,
            });
        }
        if streams.is_empty() || streams.len() > u16::MAX as usize {
            return Err(FrameError::ShapeMismatch { field: "NUM_PMU" });
        }
        if data_rate == i16::MIN {
            return Err(FrameError::FieldOutOfRange {
                field: "DATA_RATE",
                value: data_rate as i64,
            });
        }
        let (soc, frasec) = crate::frame::time::timestamp_now();
        Ok(ConfigFrame {
            kind,
            version: 1,
            id_code,
            soc,
            frasec,
            time_base,
            streams,
            data_rate,
        })
    }

    pub fn kind(&self) -> ConfigVersion {
        self.kind
    }

    /// A layout-identical copy tagged with the other version, used to answer
    /// cfg1 requests from the cfg2 the server holds.
    pub fn retagged(&self, kind: ConfigVersion) -> ConfigFrame {
        let mut cfg = self.clone();
        cfg.kind = kind;
        cfg
    }

    pub fn id_code(&self) -> u16 {
        self.id_code
    }

    pub fn set_id_code(&mut self, id_code: u16) -> Result<(), FrameError> {
        validate_id_code("IDCODE", id_code)?;
        self.id_code = id_code;
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

    pub fn time_base(&self) -> u32 {
        self.time_base
    }

    pub fn num_pmu(&self) -> usize {
        self.streams.len()
    }

    pub fn streams(&self) -> &[StreamConfig] {
        &self.streams
    }

    pub fn streams_mut(&mut self) -> &mut [StreamConfig] {
        &mut self.streams
    }

    pub fn data_rate(&self) -> i16 {
        self.data_rate
    }

    pub fn set_data_rate(&mut self, data_rate: i16) -> Result<(), FrameError> {
        if data_rate == i16::MIN {
            return Err(FrameError::FieldOutOfRange {
                field: "DATA_RATE",
                value: data_rate as i64,
            });
        }
        self.data_rate = data_rate;
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&self.time_base.to_be_bytes());
        payload.extend_from_slice(&(self.streams.len() as u16).to_be_bytes());
        for stream in &self.streams {
            stream.encode_block(&mut payload);
        }
        payload.extend_from_slice(&self.data_rate.to_be_bytes());
        encode_frame(
            self.kind.type_code(),
            self.version,
            self.id_code,
            self.soc,
            self.frasec,
            &payload,
        )
    }

    /// Decodes a complete configuration frame, CRC included. The version tag
    /// is taken from the SYNC type nibble.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let (envelope, payload) = decode_envelope(bytes)?;
        let kind = match envelope.type_code {
            code if code == FrameKind::Cfg1.type_code() => ConfigVersion::Cfg1,
            code if code == FrameKind::Cfg2.type_code() => ConfigVersion::Cfg2,
            other => return Err(FrameError::BadFrameType(other)),
        };

        let mut cur = FrameCursor::new(payload);
        let time_base = cur.read_u32()? & 0x00ff_ffff;
        if time_base == 0 {
            return Err(FrameError::FieldOutOfRange {
                field: "TIME_BASE",
                value: 0,
            });
        }
        let num_pmu = cur.read_u16()? as usize;
        if num_pmu == 0 {
            return Err(FrameError::FieldOutOfRange {
                field: "NUM_PMU",
                value: 0,
            });
        }
        let mut streams = Vec::with_capacity(num_pmu);
        for _ in 0..num_pmu {
            streams.push(StreamConfig::decode_block(&mut cur)?);
        }
        let data_rate = cur.read_i16()?;
        if cur.remaining() != 0 {
            return Err(FrameError::ShapeMismatch {
                field: "FRAMESIZE",
            });
        }

        Ok(ConfigFrame {
            kind,
            version: envelope.version,
            id_code: envelope.id_code,
            soc: envelope.soc,
            frasec: envelope.frasec,
            time_base,
            streams,
            data_rate,
        })
    }
}
