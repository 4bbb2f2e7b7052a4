use thiserror::Error;

/// Errors raised while building or decoding individual frames.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("CRC check failed: computed {computed:#06x}, frame carries {expected:#06x}")]
    CrcMismatch { computed: u16, expected: u16 },

    #[error("invalid sync byte {0:#04x}, expected 0xaa")]
    BadSync(u8),

    #[error("unknown frame type code {0}")]
    BadFrameType(u8),

    #[error("{field} out of range: {value}")]
    FieldOutOfRange { field: &'static str, value: i64 },

    #[error("{field} does not match the configured counts")]
    ShapeMismatch { field: &'static str },

    #[error("frame truncated: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    #[error("{field} contains non-ASCII bytes")]
    NotAscii { field: &'static str },

    #[error("cannot decode a data frame without a configuration")]
    MissingConfig,
}

/// Errors raised by the framed byte transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the PMU session server.
#[derive(Debug, Error)]
pub enum PmuError {
    #[error("cannot run PMU without a configuration")]
    NoConfiguration,

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors raised by the PDC client.
#[derive(Debug, Error)]
pub enum PdcError {
    #[error("unexpected {got} frame in response to a {expected} request")]
    InvalidResponse {
        expected: &'static str,
        got: &'static str,
    },

    #[error("not connected to a PMU")]
    NotConnected,

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors raised by the stream splitter.
#[derive(Debug, Error)]
pub enum SplitterError {
    #[error(transparent)]
    Pdc(#[from] PdcError),

    #[error(transparent)]
    Pmu(#[from] PmuError),
}
