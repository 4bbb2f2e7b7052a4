//! IEEE C37.118.2-2011 synchrophasor data transfer.
//!
//! The crate has three layers:
//!
//! * [`frame`] - a strict, bit-exact codec for the data, configuration,
//!   command and header frame families, CRC-16/XMODEM included.
//! * [`transport`] - length-prefix reassembly of frames from TCP byte
//!   streams; datagrams carry one frame each.
//! * Sessions - a multi-client [`pmu::Pmu`] server, a [`pdc::Pdc`] client,
//!   and a [`splitter::StreamSplitter`] that replicates one upstream session
//!   to many downstream subscribers.

pub mod crc;
pub mod error;
pub mod frame;
pub mod pdc;
pub mod pmu;
pub mod splitter;
pub mod transport;

pub use error::{FrameError, PdcError, PmuError, SplitterError, TransportError};
pub use frame::{extract_frame_kind, Frame, FrameKind};
