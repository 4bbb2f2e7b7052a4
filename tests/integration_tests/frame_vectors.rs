//! Bit-exact scenario vectors: every encoder output is compared against the
//! reference hex images, and every image decodes back to the typed value.

use synchrophasor::crc::crc16_xmodem;
use synchrophasor::error::FrameError;
use synchrophasor::frame::{
    extract_frame_kind, Command, CommandFrame, ConfigFrame, DataFrame, Frame, FrameKind, Frasec,
    HeaderFrame, LeapDirection,
};

use crate::fixtures::{
    cfg_1pmu, cfg_2pmus, data_1pmu, data_2pmus, CFG2_1PMU_HEX, CFG2_2PMUS_HEX, COMMAND_START_HEX,
    DATA_1PMU_HEX, DATA_2PMUS_HEX, HEADER_HEX,
};
use crate::{from_hex, to_hex};

fn command_frasec() -> Frasec {
    Frasec::new(770_000, LeapDirection::Add, false, false, 15).unwrap()
}

#[test]
fn command_start_vector() {
    let mut frame = CommandFrame::new(7734, Command::Start).unwrap();
    frame.set_time(1_149_591_600, command_frasec());
    assert_eq!(to_hex(&frame.encode().unwrap()), COMMAND_START_HEX);

    let decoded = CommandFrame::decode(&from_hex(COMMAND_START_HEX)).unwrap();
    assert_eq!(decoded, frame);
    assert_eq!(decoded.command(), Command::Start);
}

#[test]
fn header_vector() {
    let mut frame = HeaderFrame::new(7734, "Hello I'm Header Frame.").unwrap();
    frame.set_time(1_149_591_600, command_frasec());
    assert_eq!(to_hex(&frame.encode().unwrap()), HEADER_HEX);

    let decoded = HeaderFrame::decode(&from_hex(HEADER_HEX)).unwrap();
    assert_eq!(decoded, frame);
    assert_eq!(decoded.text(), "Hello I'm Header Frame.");
}

#[test]
fn cfg2_single_pmu_vector() {
    let bytes = cfg_1pmu().encode().unwrap();
    assert_eq!(bytes.len(), 454);
    assert_eq!(to_hex(&bytes), CFG2_1PMU_HEX);

    let decoded = ConfigFrame::decode(&from_hex(CFG2_1PMU_HEX)).unwrap();
    assert_eq!(decoded, cfg_1pmu());
}

#[test]
fn cfg2_two_pmus_vector() {
    let bytes = cfg_2pmus().encode().unwrap();
    assert_eq!(bytes.len(), 884);
    assert_eq!(&bytes[bytes.len() - 2..], &[0x20, 0xe8]);
    assert_eq!(to_hex(&bytes), CFG2_2PMUS_HEX);

    let decoded = ConfigFrame::decode(&from_hex(CFG2_2PMUS_HEX)).unwrap();
    assert_eq!(decoded, cfg_2pmus());
}

#[test]
fn data_single_pmu_vector() {
    let cfg = cfg_1pmu();
    let bytes = data_1pmu().encode(&cfg).unwrap();
    assert_eq!(to_hex(&bytes), DATA_1PMU_HEX);

    let decoded = DataFrame::decode(&from_hex(DATA_1PMU_HEX), &cfg).unwrap();
    assert_eq!(decoded, data_1pmu());
}

#[test]
fn data_two_pmus_vector() {
    let cfg = cfg_2pmus();
    let bytes = data_2pmus().encode(&cfg).unwrap();
    assert_eq!(bytes.len(), 88);
    assert_eq!(&bytes[bytes.len() - 2..], &[0xbd, 0x52]);
    assert_eq!(to_hex(&bytes), DATA_2PMUS_HEX);

    let decoded = DataFrame::decode(&from_hex(DATA_2PMUS_HEX), &cfg).unwrap();
    assert_eq!(decoded, data_2pmus());
}

#[test]
fn framesize_and_crc_invariants() {
    for hex in [
        COMMAND_START_HEX,
        HEADER_HEX,
        CFG2_1PMU_HEX,
        CFG2_2PMUS_HEX,
        DATA_1PMU_HEX,
        DATA_2PMUS_HEX,
    ] {
        let bytes = from_hex(hex);
        let framesize = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        assert_eq!(framesize, bytes.len());
        let crc = u16::from_be_bytes([bytes[bytes.len() - 2], bytes[bytes.len() - 1]]);
        assert_eq!(crc16_xmodem(&bytes[..bytes.len() - 2]), crc);
    }
}

#[test]
fn byte_exact_reencode() {
    let cfg = cfg_1pmu();
    for hex in [COMMAND_START_HEX, HEADER_HEX, CFG2_1PMU_HEX, DATA_1PMU_HEX] {
        let bytes = from_hex(hex);
        let frame = Frame::decode(&bytes, Some(&cfg)).unwrap();
        assert_eq!(frame.encode(Some(&cfg)).unwrap(), bytes);
    }
}

#[test]
fn sniffer_classifies_and_enforces_crc() {
    assert_eq!(
        extract_frame_kind(&from_hex(COMMAND_START_HEX)).unwrap(),
        FrameKind::Command
    );
    assert_eq!(
        extract_frame_kind(&from_hex(HEADER_HEX)).unwrap(),
        FrameKind::Header
    );
    assert_eq!(
        extract_frame_kind(&from_hex(CFG2_1PMU_HEX)).unwrap(),
        FrameKind::Cfg2
    );
    assert_eq!(
        extract_frame_kind(&from_hex(DATA_1PMU_HEX)).unwrap(),
        FrameKind::Data
    );

    let mut corrupted = from_hex(HEADER_HEX);
    corrupted[10] ^= 0x40;
    assert!(matches!(
        extract_frame_kind(&corrupted),
        Err(FrameError::CrcMismatch { .. })
    ));
}

#[test]
fn single_bit_corruption_always_fails_crc() {
    let cfg = cfg_1pmu();
    for hex in [COMMAND_START_HEX, DATA_1PMU_HEX, CFG2_1PMU_HEX] {
        let bytes = from_hex(hex);
        for byte_index in 0..bytes.len() {
            for bit in 0..8 {
                let mut corrupted = bytes.clone();
                corrupted[byte_index] ^= 1 << bit;
                assert!(
                    matches!(
                        Frame::decode(&corrupted, Some(&cfg)),
                        Err(FrameError::CrcMismatch { .. })
                    ),
                    "flip of bit {bit} in byte {byte_index} went undetected"
                );
            }
        }
    }
}

#[test]
fn data_frame_needs_a_configuration() {
    assert!(matches!(
        Frame::decode(&from_hex(DATA_1PMU_HEX), None),
        Err(FrameError::MissingConfig)
    ));
}

#[test]
fn measurements_convert_to_engineering_units() {
    let cfg = cfg_1pmu();
    let measurements = data_1pmu().measurements(&cfg).unwrap();
    assert_eq!(measurements.pmu_id, 7734);
    assert_eq!(measurements.streams.len(), 1);

    let stream = &measurements.streams[0];
    assert_eq!(stream.stream_id, 7734);
    // Integer frequency deviation: 60 Hz nominal + 2500 mHz.
    assert!((stream.frequency - 62.5).abs() < 1e-9);
    // First phasor: (14635, 0) scaled by 915527e-5, zero angle.
    assert!((stream.phasors[0].0 - 14635.0 * 9.15527).abs() < 1e-6);
    assert!(stream.phasors[0].1.abs() < 1e-12);
    // Second phasor is in the third quadrant.
    assert!(stream.phasors[1].1 < -std::f64::consts::FRAC_PI_2);
    assert_eq!(stream.analogs, vec![100.0, 1000.0, 10000.0]);
    assert_eq!(stream.digitals, vec![0x3c12]);
    // SOC plus fraction over TIME_BASE.
    assert!((measurements.time - (1_149_580_800.0 + 16_817.0 / 1_000_000.0)).abs() < 1e-9);
}
