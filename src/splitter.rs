//! The stream splitter: an internal PDC facing the upstream PMU wired to an
//! internal PMU facing downstream subscribers.
//!
//! After CRC validation, upstream frames are forwarded to every downstream
//! client as raw bytes; only header and configuration frames get decoded, so
//! the downstream PMU always answers requests with the latest copies.

use crate::error::SplitterError;
use crate::frame::{extract_frame_kind, ConfigFrame, FrameKind, HeaderFrame};
use crate::pdc::{ConfigRequest, Pdc};
use crate::pmu::Pmu;
use crate::transport::{Method, DEFAULT_BUFFER_SIZE};

pub struct StreamSplitter {
    source_ip: String,
    source_port: u16,
    listen_ip: String,
    listen_port: u16,
    pdc_id: u16,
    method: Method,
    buffer_size: usize,
}

impl StreamSplitter {
    pub fn new(
        source_ip: &str,
        source_port: u16,
        listen_ip: &str,
        listen_port: u16,
        pdc_id: u16,
        method: Method,
    ) -> StreamSplitter {
        StreamSplitter {
            source_ip: source_ip.to_owned(),
            source_port,
            listen_ip: listen_ip.to_owned(),
            listen_port,
            pdc_id,
            method,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> StreamSplitter {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// Connects upstream, mirrors the source header and cfg2 into a
    /// downstream PMU, starts the upstream data stream, and then replicates
    /// every upstream frame to all downstream clients until the source
    /// disconnects.
    pub fn run(&mut self) -> Result<(), SplitterError> {
        let mut pdc = Pdc::new(self.pdc_id, &self.source_ip, self.source_port, self.method)
            .with_buffer_size(self.buffer_size);
        pdc.connect()?;

        log::info!(
            "splitter - requesting header and cfg2 from {}:{}",
            self.source_ip,
            self.source_port
        );
        let header = pdc.get_header()?;
        let cfg2 = pdc.get_config(ConfigRequest::Cfg2)?;

        let mut pmu = Pmu::new(
            cfg2.id_code(),
            cfg2.data_rate(),
            &self.listen_ip,
            self.listen_port,
            self.method,
        )
        .map_err(crate::error::PmuError::from)?
        .with_buffer_size(self.buffer_size)
        .with_pacing(false);
        pmu.set_configuration(cfg2)?;
        pmu.set_header(header);
        pmu.run()?;
        log::info!(
            "splitter - listening on {}:{} for downstream connections",
            self.listen_ip,
            self.listen_port
        );

        pdc.start()?;

        loop {
            let bytes = match pdc.get_bytes() {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::info!("splitter - upstream connection ended: {err}");
                    return Ok(());
                }
            };
            match extract_frame_kind(&bytes) {
                Ok(FrameKind::Header) => match HeaderFrame::decode(&bytes) {
                    Ok(header) => {
                        log::info!("splitter - upstream header updated");
                        pmu.set_header(header);
                    }
                    Err(err) => log::warn!("splitter - bad upstream header frame: {err}"),
                },
                Ok(FrameKind::Cfg2) => match ConfigFrame::decode(&bytes) {
                    Ok(cfg) => {
                        log::info!("splitter - upstream configuration updated");
                        pmu.set_configuration(cfg)?;
                    }
                    Err(err) => log::warn!("splitter - bad upstream cfg2 frame: {err}"),
                },
                Ok(FrameKind::Cfg3) => {
                    log::info!("splitter - upstream cfg3 stored");
                    pmu.set_raw_cfg3(bytes.clone());
                    pmu.send_raw(bytes);
                }
                Ok(_) => pmu.send_raw(bytes),
                Err(err) => {
                    log::warn!("splitter - dropping invalid upstream frame: {err}");
                }
            }
        }
    }
}
