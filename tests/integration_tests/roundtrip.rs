//! Randomized round-trip properties: any value that passes setter validation
//! survives encode-then-decode unchanged, across the whole FORMAT matrix.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use synchrophasor::frame::{
    AnalogType, AnalogUnit, AnalogValue, ConfigFrame, ConfigVersion, DataFormat, DataFrame,
    DigitalUnit, Frasec, FreqValue, LeapDirection, NominalFreq, PhasorType, PhasorUnit,
    PhasorValue, PmuData, Stat, StreamConfig,
};

fn random_frasec(rng: &mut StdRng) -> Frasec {
    let quality = *[0u8, 1, 2, 5, 7, 10, 11, 15]
        .get(rng.gen_range(0..8))
        .unwrap();
    Frasec::new(
        rng.gen_range(0..1 << 24),
        if rng.gen_bool(0.5) {
            LeapDirection::Add
        } else {
            LeapDirection::Delete
        },
        rng.gen_bool(0.2),
        rng.gen_bool(0.2),
        quality,
    )
    .unwrap()
}

fn random_stream(rng: &mut StdRng, format: DataFormat) -> StreamConfig {
    let phasor_count = rng.gen_range(0..=4);
    let analog_count = rng.gen_range(0..=3);
    let digital_count = rng.gen_range(0..=2);

    let phasor_units = (0..phasor_count)
        .map(|_| {
            let kind = if rng.gen_bool(0.5) {
                PhasorType::Voltage
            } else {
                PhasorType::Current
            };
            PhasorUnit::new(kind, rng.gen_range(0..1 << 24)).unwrap()
        })
        .collect::<Vec<_>>();
    let analog_units = (0..analog_count)
        .map(|_| {
            let kind = match rng.gen_range(0..3) {
                0 => AnalogType::Pow,
                1 => AnalogType::Rms,
                _ => AnalogType::Peak,
            };
            AnalogUnit::new(kind, rng.gen_range(-8_388_608..=8_388_607)).unwrap()
        })
        .collect::<Vec<_>>();
    let digital_units = (0..digital_count)
        .map(|_| DigitalUnit::new(rng.gen(), rng.gen()))
        .collect::<Vec<_>>();

    let names: Vec<String> = (0..phasor_count + analog_count + 16 * digital_count)
        .map(|i| format!("CHANNEL {i}"))
        .collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();

    StreamConfig::new(
        "RANDOM STATION",
        rng.gen_range(1..=65_534),
        format,
        &names,
        phasor_units,
        analog_units,
        digital_units,
        if rng.gen_bool(0.5) {
            NominalFreq::Hz50
        } else {
            NominalFreq::Hz60
        },
        rng.gen(),
    )
    .unwrap()
}

fn random_config(rng: &mut StdRng) -> ConfigFrame {
    let num_pmu = rng.gen_range(1..=3);
    let streams = (0..num_pmu)
        .map(|_| {
            let format = DataFormat::from_word(rng.gen_range(0..16));
            random_stream(rng, format)
        })
        .collect();
    let data_rate = loop {
        let rate = rng.gen_range(-32_767i16..=32_767);
        if rate != 0 {
            break rate;
        }
    };
    let mut cfg = ConfigFrame::new(
        if rng.gen_bool(0.5) {
            ConfigVersion::Cfg1
        } else {
            ConfigVersion::Cfg2
        },
        rng.gen_range(1..=65_534),
        rng.gen_range(1..1 << 24),
        streams,
        data_rate,
    )
    .unwrap();
    cfg.set_time(rng.gen(), random_frasec(rng));
    cfg
}

fn random_phasor(rng: &mut StdRng, format: DataFormat) -> PhasorValue {
    match (format.float_phasors, format.polar_phasors) {
        (false, false) => PhasorValue::IntRect {
            re: rng.gen_range(-32_767..=32_767),
            im: rng.gen_range(-32_767..=32_767),
        },
        (false, true) => PhasorValue::IntPolar {
            magnitude: rng.gen(),
            angle: rng.gen_range(-31_416..=31_416),
        },
        (true, false) => PhasorValue::FloatRect {
            re: rng.gen_range(-1.0e4f32..1.0e4),
            im: rng.gen_range(-1.0e4f32..1.0e4),
        },
        (true, true) => PhasorValue::FloatPolar {
            magnitude: rng.gen_range(0.0f32..1.0e4),
            angle: rng.gen_range(-3.142f32..=3.142),
        },
    }
}

fn random_freq(rng: &mut StdRng, format: DataFormat) -> FreqValue {
    if format.float_freq {
        FreqValue::Float(rng.gen_range(45.0f32..75.0))
    } else {
        FreqValue::Int(rng.gen_range(-32_767..=32_767))
    }
}

fn random_data(rng: &mut StdRng, cfg: &ConfigFrame) -> DataFrame {
    let mut streams = Vec::with_capacity(cfg.num_pmu());
    for stream_cfg in cfg.streams() {
        let format = stream_cfg.format();
        let stat = Stat::from_word(rng.gen());
        let phasors = (0..stream_cfg.phasor_count())
            .map(|_| random_phasor(rng, format))
            .collect();
        let freq = random_freq(rng, format);
        let dfreq = random_freq(rng, format);
        let analogs = (0..stream_cfg.analog_count())
            .map(|_| {
                if format.float_analogs {
                    AnalogValue::Float(rng.gen_range(-1.0e4f32..1.0e4))
                } else {
                    AnalogValue::Int(rng.gen_range(-32_767..=32_767))
                }
            })
            .collect();
        let digitals = (0..stream_cfg.digital_count()).map(|_| rng.gen()).collect();
        streams.push(PmuData {
            stat,
            phasors,
            freq,
            dfreq,
            analogs,
            digitals,
        });
    }
    let mut frame = DataFrame::new(cfg.id_code(), streams).unwrap();
    frame.set_time(rng.gen(), random_frasec(rng));
    frame
}

#[test]
fn random_configs_roundtrip() {
    let mut rng = StdRng::seed_from_u64(0xc37_118);
    for _ in 0..50 {
        let cfg = random_config(&mut rng);
        let bytes = cfg.encode().unwrap();
        let decoded = ConfigFrame::decode(&bytes).unwrap();
        assert_eq!(decoded, cfg);
        // Byte-exact in the other direction too.
        assert_eq!(decoded.encode().unwrap(), bytes);
    }
}

#[test]
fn format_matrix_data_roundtrip() {
    let mut rng = StdRng::seed_from_u64(0x2011);
    for word in 0..16u16 {
        let format = DataFormat::from_word(word);
        for _ in 0..8 {
            let stream = random_stream(&mut rng, format);
            let mut cfg =
                ConfigFrame::new(ConfigVersion::Cfg2, 7734, 1_000_000, vec![stream], 30).unwrap();
            cfg.set_time(rng.gen(), random_frasec(&mut rng));

            let data = random_data(&mut rng, &cfg);
            let bytes = data.encode(&cfg).unwrap();
            let decoded = DataFrame::decode(&bytes, &cfg).unwrap();
            assert_eq!(decoded, data, "format word {word}");
            assert_eq!(decoded.encode(&cfg).unwrap(), bytes);
        }
    }
}

#[test]
fn multistream_data_roundtrip() {
    let mut rng = StdRng::seed_from_u64(0x7734);
    for _ in 0..20 {
        let cfg = random_config(&mut rng);
        let data = random_data(&mut rng, &cfg);
        let bytes = data.encode(&cfg).unwrap();
        assert_eq!(
            u16::from_be_bytes([bytes[2], bytes[3]]) as usize,
            bytes.len()
        );
        assert_eq!(DataFrame::decode(&bytes, &cfg).unwrap(), data);
    }
}
