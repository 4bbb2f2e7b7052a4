//! Live localhost sessions: a PMU served over TCP, driven by a PDC, and a
//! splitter replicating the stream.

use std::thread;
use std::time::Duration;

use synchrophasor::frame::Frame;
use synchrophasor::pdc::{ConfigRequest, Pdc};
use synchrophasor::pmu::{ieee_cfg2_sample, ieee_data_sample, Pmu};
use synchrophasor::splitter::StreamSplitter;
use synchrophasor::transport::Method;
use synchrophasor::PmuError;

fn sample_pmu(port: u16) -> Pmu {
    let mut pmu = Pmu::new(7734, 200, "127.0.0.1", port, Method::Tcp)
        .unwrap()
        .with_timestamping(true);
    pmu.set_configuration(ieee_cfg2_sample(7734).unwrap())
        .unwrap();
    // A fast rate keeps the paced handler from slowing the test down.
    pmu.set_data_rate(200).unwrap();
    pmu.run().unwrap();
    pmu
}

#[test]
fn run_without_configuration_fails() {
    let mut pmu = Pmu::new(7734, 30, "127.0.0.1", 0, Method::Tcp).unwrap();
    assert!(matches!(pmu.run(), Err(PmuError::NoConfiguration)));
}

#[test]
fn tcp_session_end_to_end() {
    let pmu = sample_pmu(0);
    let port = pmu.local_addr().unwrap().port();

    let mut pdc = Pdc::new(1, "127.0.0.1", port, Method::Tcp);
    pdc.connect().unwrap();

    let header = pdc.get_header().unwrap();
    assert_eq!(header.text(), "Hello I'm tinyPMU!");

    let cfg = pdc.get_config(ConfigRequest::Cfg2).unwrap();
    assert_eq!(cfg.num_pmu(), 1);
    assert_eq!(cfg.data_rate(), 200);

    pdc.start().unwrap();
    let sample = ieee_data_sample(7734).unwrap();
    for _ in 0..5 {
        pmu.send(Frame::Data(sample.clone())).unwrap();
    }

    let mut data_frames = 0;
    while data_frames < 5 {
        match pdc.get().unwrap() {
            Frame::Data(frame) => {
                let measurements = frame.measurements(&cfg).unwrap();
                assert_eq!(measurements.streams.len(), 1);
                assert!((measurements.streams[0].frequency - 62.5).abs() < 1e-9);
                data_frames += 1;
            }
            // Configuration or header broadcasts may interleave.
            _ => {}
        }
    }
    pdc.quit();
}

#[test]
fn configuration_change_reaches_the_client() {
    let pmu = sample_pmu(0);
    let port = pmu.local_addr().unwrap().port();

    let mut pdc = Pdc::new(1, "127.0.0.1", port, Method::Tcp);
    pdc.connect().unwrap();
    pdc.get_config(ConfigRequest::Cfg2).unwrap();
    pdc.start().unwrap();

    // Give the handler a moment to process the start command, then change
    // the stream id; the server must broadcast the new cfg2 on its own.
    thread::sleep(Duration::from_millis(50));
    pmu.set_id(991).unwrap();

    loop {
        match pdc.get().unwrap() {
            Frame::Config(cfg) => {
                assert_eq!(cfg.id_code(), 991);
                break;
            }
            _ => {}
        }
    }
    pdc.quit();
}

#[test]
fn udp_session_round_trip() {
    let mut pmu = Pmu::new(7734, 200, "127.0.0.1", 0, Method::Udp)
        .unwrap()
        .with_timestamping(true);
    pmu.set_configuration(ieee_cfg2_sample(7734).unwrap())
        .unwrap();
    pmu.run().unwrap();
    let port = pmu.local_addr().unwrap().port();

    let mut pdc = Pdc::new(1, "127.0.0.1", port, Method::Udp);
    pdc.connect().unwrap();

    let cfg = pdc.get_config(ConfigRequest::Cfg2).unwrap();
    assert_eq!(cfg.num_pmu(), 1);

    pdc.start().unwrap();
    // The start command races the first sends, so keep pumping frames from a
    // background thread while the blocking receive waits.
    let sample = ieee_data_sample(7734).unwrap();
    thread::spawn(move || {
        for _ in 0..500 {
            let _ = pmu.send(Frame::Data(sample.clone()));
            thread::sleep(Duration::from_millis(10));
        }
    });

    match pdc.get().unwrap() {
        Frame::Data(frame) => {
            assert_eq!(frame.streams().len(), 1);
        }
        other => panic!("expected a data frame, got {:?}", other.kind()),
    }
    pdc.quit();
}

#[test]
fn splitter_replicates_the_stream() {
    let pmu = sample_pmu(0);
    let upstream_port = pmu.local_addr().unwrap().port();

    // The splitter binds its own listener; use a fixed port well away from
    // the ephemeral range used by the other tests.
    let listen_port = 24_713;
    thread::spawn(move || {
        let mut splitter =
            StreamSplitter::new("127.0.0.1", upstream_port, "127.0.0.1", listen_port, 1, Method::Tcp);
        let _ = splitter.run();
    });

    // Wait for the splitter to come up.
    let mut pdc = Pdc::new(2, "127.0.0.1", listen_port, Method::Tcp);
    let mut connected = false;
    for _ in 0..100 {
        if pdc.connect().is_ok() {
            connected = true;
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert!(connected, "could not reach the splitter");

    let header = pdc.get_header().unwrap();
    assert_eq!(header.text(), "Hello I'm tinyPMU!");
    let cfg = pdc.get_config(ConfigRequest::Cfg2).unwrap();
    assert_eq!(cfg.num_pmu(), 1);

    pdc.start().unwrap();
    let sample = ieee_data_sample(7734).unwrap();
    thread::spawn(move || {
        for _ in 0..500 {
            let _ = pmu.send(Frame::Data(sample.clone()));
            thread::sleep(Duration::from_millis(10));
        }
    });

    let mut data_frames = 0;
    for _ in 0..20 {
        if let Frame::Data(frame) = pdc.get().unwrap() {
            assert_eq!(frame.streams().len(), 1);
            data_frames += 1;
            if data_frames >= 3 {
                break;
            }
        }
    }
    assert!(data_frames >= 3, "no data frames made it through the splitter");
    pdc.quit();
}
