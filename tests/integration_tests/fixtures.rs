//! Reference frames and their expected wire images, taken from the
//! IEEE C37.118.2 Annex D examples.

use synchrophasor::frame::{
    AnalogValue, ConfigFrame, ConfigVersion, DataFrame, Frasec, FreqValue, LeapDirection,
    PhasorValue, PmuData, Stat,
};
use synchrophasor::pmu::{ieee_cfg2_sample, ieee_data_sample};

pub const COMMAND_START_HEX: &str = "aa4100121e36448560300f0bbfd00002ce00";

pub const HEADER_HEX: &str =
    "aa1100271e36448560300f0bbfd048656c6c6f2049276d20486561646572204672616d652e17cc";

pub const CFG2_1PMU_HEX: &str = concat!(
    "aa3101c61e36448527f056071098000f4240000153746174696f6e2041202020",
    "202020201e360004000400030001564120202020202020202020202020205642",
    "2020202020202020202020202020564320202020202020202020202020204931",
    "2020202020202020202020202020414e414c4f4731202020202020202020414e",
    "414c4f4732202020202020202020414e414c4f47332020202020202020204252",
    "45414b4552203120535441545553425245414b45522032205354415455534252",
    "45414b4552203320535441545553425245414b45522034205354415455534252",
    "45414b4552203520535441545553425245414b45522036205354415455534252",
    "45414b4552203720535441545553425245414b45522038205354415455534252",
    "45414b4552203920535441545553425245414b45522041205354415455534252",
    "45414b4552204220535441545553425245414b45522043205354415455534252",
    "45414b4552204420535441545553425245414b45522045205354415455534252",
    "45414b4552204620535441545553425245414b4552204720535441545553000d",
    "f847000df847000df8470100b2d00000000101000001020000010000ffff0000",
    "0016001ed5d1",
);

pub const CFG2_2PMUS_HEX: &str = concat!(
    "aa3103741e36448527f056071098000f4240000253746174696f6e2041202020",
    "202020201e360004000400030001564120202020202020202020202020205642",
    "2020202020202020202020202020564320202020202020202020202020204931",
    "2020202020202020202020202020414e414c4f4731202020202020202020414e",
    "414c4f4732202020202020202020414e414c4f47332020202020202020204252",
    "45414b4552203120535441545553425245414b45522032205354415455534252",
    "45414b4552203320535441545553425245414b45522034205354415455534252",
    "45414b4552203520535441545553425245414b45522036205354415455534252",
    "45414b4552203720535441545553425245414b45522038205354415455534252",
    "45414b4552203920535441545553425245414b45522041205354415455534252",
    "45414b4552204220535441545553425245414b45522043205354415455534252",
    "45414b4552204420535441545553425245414b45522045205354415455534252",
    "45414b4552204620535441545553425245414b4552204720535441545553000d",
    "f847000df847000df8470100b2d00000000101000001020000010000ffff0000",
    "001653746174696f6e2041202020202020201e36000400040003000156412020",
    "2020202020202020202020205642202020202020202020202020202056432020",
    "20202020202020202020202049312020202020202020202020202020414e414c",
    "4f4731202020202020202020414e414c4f4732202020202020202020414e414c",
    "4f4733202020202020202020425245414b455220312053544154555342524541",
    "4b4552203220535441545553425245414b455220332053544154555342524541",
    "4b4552203420535441545553425245414b455220352053544154555342524541",
    "4b4552203620535441545553425245414b455220372053544154555342524541",
    "4b4552203820535441545553425245414b455220392053544154555342524541",
    "4b4552204120535441545553425245414b455220422053544154555342524541",
    "4b4552204320535441545553425245414b455220442053544154555342524541",
    "4b4552204520535441545553425245414b455220462053544154555342524541",
    "4b4552204720535441545553000df847000df847000df8470100b2d000000001",
    "01000001020000010000ffff00000016001e20e8",
);

pub const DATA_1PMU_HEX: &str = concat!(
    "aa0100341e3644853600000041b10000392b0000e36ace7ce36a318304440000",
    "09c4000042c80000447a0000461c40003c12d43f",
);

pub const DATA_2PMUS_HEX: &str = concat!(
    "aa0100581e3644853600000041b10000392b0000e36ace7ce36a318304440000",
    "09c4000042c80000447a0000461c40003c120000392b0000e36ace7ce36a3183",
    "0444000009c4000042c80000447a0000461c40003c12bd52",
);

pub fn cfg_frasec() -> Frasec {
    Frasec::new(463_000, LeapDirection::Delete, false, true, 6).unwrap()
}

pub fn cfg_1pmu() -> ConfigFrame {
    let mut cfg = ieee_cfg2_sample(7734).unwrap();
    cfg.set_time(1_149_577_200, cfg_frasec());
    cfg
}

pub fn cfg_2pmus() -> ConfigFrame {
    let stream = cfg_1pmu().streams()[0].clone();
    let mut cfg = ConfigFrame::new(
        ConfigVersion::Cfg2,
        7734,
        1_000_000,
        vec![stream.clone(), stream],
        30,
    )
    .unwrap();
    cfg.set_time(1_149_577_200, cfg_frasec());
    cfg
}

pub fn data_substream() -> PmuData {
    PmuData {
        stat: Stat::default(),
        phasors: vec![
            PhasorValue::IntRect { re: 14635, im: 0 },
            PhasorValue::IntRect {
                re: -7318,
                im: -12676,
            },
            PhasorValue::IntRect {
                re: -7318,
                im: 12675,
            },
            PhasorValue::IntRect { re: 1092, im: 0 },
        ],
        freq: FreqValue::Int(2500),
        dfreq: FreqValue::Int(0),
        analogs: vec![
            AnalogValue::Float(100.0),
            AnalogValue::Float(1000.0),
            AnalogValue::Float(10000.0),
        ],
        digitals: vec![0x3c12],
    }
}

pub fn data_1pmu() -> DataFrame {
    let mut frame = ieee_data_sample(7734).unwrap();
    frame.set_time(1_149_580_800, Frasec::from_fraction(16_817).unwrap());
    frame
}

pub fn data_2pmus() -> DataFrame {
    let mut frame = DataFrame::new(7734, vec![data_substream(), data_substream()]).unwrap();
    frame.set_time(1_149_580_800, Frasec::from_fraction(16_817).unwrap());
    frame
}
