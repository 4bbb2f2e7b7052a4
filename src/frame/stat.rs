//! The STAT word carried at the head of every data frame sub-record.

/// Overall measurement status (STAT bits 15-14).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeasurementStatus {
    #[default]
    Ok,
    Error,
    Test,
    VError,
}

impl MeasurementStatus {
    fn from_bits(bits: u16) -> Self {
        match bits & 0x3 {
            0 => MeasurementStatus::Ok,
            1 => MeasurementStatus::Error,
            2 => MeasurementStatus::Test,
            _ => MeasurementStatus::VError,
        }
    }

    fn to_bits(self) -> u16 {
        match self {
            MeasurementStatus::Ok => 0,
            MeasurementStatus::Error => 1,
            MeasurementStatus::Test => 2,
            MeasurementStatus::VError => 3,
        }
    }
}

/// Time since the PMU lost clock lock (STAT bits 5-4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnlockedTime {
    #[default]
    Under10s,
    Under100s,
    Under1000s,
    Over1000s,
}

impl UnlockedTime {
    fn from_bits(bits: u16) -> Self {
        match bits & 0x3 {
            0 => UnlockedTime::Under10s,
            1 => UnlockedTime::Under100s,
            2 => UnlockedTime::Under1000s,
            _ => UnlockedTime::Over1000s,
        }
    }

    fn to_bits(self) -> u16 {
        match self {
            UnlockedTime::Under10s => 0,
            UnlockedTime::Under100s => 1,
            UnlockedTime::Under1000s => 2,
            UnlockedTime::Over1000s => 3,
        }
    }
}

/// Decoded STAT word. Layout, high to low:
/// 2 bits measurement status, 1 bit sync error, 1 bit sorted-by-arrival,
/// 1 bit trigger detected, 1 bit configuration change, 1 bit data modified,
/// 3 bits time quality, 2 bits unlocked time, 4 bits trigger reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stat {
    pub status: MeasurementStatus,
    /// Set when the PMU is not time-synchronized.
    pub sync_error: bool,
    /// Set when data is sorted by arrival rather than by timestamp.
    pub sorted_by_arrival: bool,
    pub trigger: bool,
    pub config_change: bool,
    pub data_modified: bool,
    /// 3-bit message time quality code.
    pub time_quality: u8,
    pub unlocked_time: UnlockedTime,
    /// 4-bit trigger reason code.
    pub trigger_reason: u8,
}

impl Stat {
    pub fn to_word(self) -> u16 {
        self.status.to_bits() << 14
            | (self.sync_error as u16) << 13
            | (self.sorted_by_arrival as u16) << 12
            | (self.trigger as u16) << 11
            | (self.config_change as u16) << 10
            | (self.data_modified as u16) << 9
            | ((self.time_quality & 0x7) as u16) << 6
            | self.unlocked_time.to_bits() << 4
            | (self.trigger_reason & 0xf) as u16
    }

    pub fn from_word(word: u16) -> Self {
        Stat {
            status: MeasurementStatus::from_bits(word >> 14),
            sync_error: word & 1 << 13 != 0,
            sorted_by_arrival: word & 1 << 12 != 0,
            trigger: word & 1 << 11 != 0,
            config_change: word & 1 << 10 != 0,
            data_modified: word & 1 << 9 != 0,
            time_quality: (word >> 6 & 0x7) as u8,
            unlocked_time: UnlockedTime::from_bits(word >> 4),
            trigger_reason: (word & 0xf) as u8,
        }
    }
}
