//! Framed-transport properties: a frame fed in arbitrary pieces comes out
//! exactly once, and back-to-back frames separate cleanly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use synchrophasor::transport::{read_frame, FrameAccumulator};

use crate::fixtures::{CFG2_1PMU_HEX, COMMAND_START_HEX, DATA_1PMU_HEX, HEADER_HEX};
use crate::from_hex;

#[test]
fn bytewise_chunks_yield_the_frame_once() {
    let frame = from_hex(CFG2_1PMU_HEX);
    let mut acc = FrameAccumulator::new();
    for &byte in frame.iter().take(frame.len() - 1) {
        acc.push(&[byte]);
        assert!(acc.next_frame().is_none());
    }
    acc.push(&[frame[frame.len() - 1]]);
    assert_eq!(acc.next_frame().as_deref(), Some(frame.as_slice()));
    assert!(acc.next_frame().is_none());
    assert_eq!(acc.pending(), 0);
}

#[test]
fn random_chunking_reassembles_exactly() {
    let mut rng = StdRng::seed_from_u64(0xacc);
    let frame = from_hex(DATA_1PMU_HEX);
    for _ in 0..100 {
        let mut acc = FrameAccumulator::new();
        let mut offset = 0;
        let mut yielded = Vec::new();
        while offset < frame.len() {
            let chunk = rng.gen_range(1..=9).min(frame.len() - offset);
            acc.push(&frame[offset..offset + chunk]);
            offset += chunk;
            while let Some(out) = acc.next_frame() {
                yielded.push(out);
            }
        }
        assert_eq!(yielded, vec![frame.clone()]);
    }
}

#[test]
fn interleaved_stream_of_frames_splits_on_boundaries() {
    let frames = [
        from_hex(COMMAND_START_HEX),
        from_hex(HEADER_HEX),
        from_hex(DATA_1PMU_HEX),
        from_hex(CFG2_1PMU_HEX),
    ];
    let joined: Vec<u8> = frames.iter().flatten().copied().collect();

    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..50 {
        let mut acc = FrameAccumulator::new();
        let mut offset = 0;
        let mut yielded = Vec::new();
        while offset < joined.len() {
            let chunk = rng.gen_range(1..=33).min(joined.len() - offset);
            acc.push(&joined[offset..offset + chunk]);
            offset += chunk;
            while let Some(out) = acc.next_frame() {
                yielded.push(out);
            }
        }
        assert_eq!(yielded.len(), frames.len());
        for (got, want) in yielded.iter().zip(&frames) {
            assert_eq!(got, want);
        }
    }
}

#[test]
fn blocking_reader_returns_one_frame_per_call() {
    let first = from_hex(COMMAND_START_HEX);
    let second = from_hex(HEADER_HEX);
    let joined = [first.clone(), second.clone()].concat();
    let mut reader: &[u8] = &joined;
    let mut acc = FrameAccumulator::new();
    assert_eq!(read_frame(&mut reader, &mut acc, 5).unwrap(), first);
    assert_eq!(read_frame(&mut reader, &mut acc, 5).unwrap(), second);
}
