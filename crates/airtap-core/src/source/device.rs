use std::time::Duration;

use log::debug;
use pcap::{Active, Capture};
use pcap_parser::Linktype;

use crate::config::LiveOptions;
use crate::source::{BatchWriter, PacketBoundary, Placement, Reader, ReaderStats, SourceError};

/// Packet that did not fit in the previous batch.
struct HeldPacket {
    data: Vec<u8>,
    timestamp: Duration,
    orig_len: u32,
}

/// Non-blocking batch reader over a libpcap capture handle.
pub struct DeviceReader {
    cap: Option<Capture<Active>>,
    device: String,
    linktype: Linktype,
    snaplen: usize,
    held: Option<HeldPacket>,
}

impl From<pcap::Error> for SourceError {
    fn from(value: pcap::Error) -> Self {
        SourceError::Device(value.to_string())
    }
}

impl DeviceReader {
    /// Open `device` in non-blocking mode, optionally in monitor mode and
    /// with a BPF filter attached.
    pub fn open(device: &str, options: &LiveOptions) -> Result<Self, SourceError> {
        let mut cap = Capture::from_device(device)?
            .rfmon(options.monitor)
            .promisc(options.promisc)
            .snaplen(clamp_i32(options.snap_len))
            .buffer_size(clamp_i32(options.buffer_size))
            .timeout(clamp_i32(options.timeout_ms as usize))
            .open()?
            .setnonblock()?;
        if !options.filter.is_empty() {
            cap.filter(&options.filter, true)?;
        }
        let linktype = Linktype(cap.get_datalink().0);
        debug!(
            "opened device {device} (linktype {}, snaplen {}, monitor {})",
            linktype.0, options.snap_len, options.monitor
        );
        Ok(Self {
            cap: Some(cap),
            device: device.to_string(),
            linktype,
            snaplen: options.snap_len,
            held: None,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

impl Reader for DeviceReader {
    fn dispatch(
        &mut self,
        max_packets: usize,
        buffer: &mut [u8],
        on_packet: &mut dyn FnMut(PacketBoundary),
    ) -> Result<usize, SourceError> {
        let Some(cap) = self.cap.as_mut() else {
            return Ok(0);
        };
        let mut batch = BatchWriter::new(buffer, self.snaplen);
        let mut count = 0;

        if let Some(held) = self.held.take() {
            match batch.place(&held.data, held.timestamp, held.orig_len) {
                Placement::Placed(boundary) => {
                    on_packet(boundary);
                    count += 1;
                }
                Placement::Skipped => {}
                Placement::Full => {
                    self.held = Some(held);
                    return Ok(0);
                }
            }
        }

        while count < max_packets {
            let packet = match cap.next_packet() {
                Ok(packet) => packet,
                Err(pcap::Error::TimeoutExpired | pcap::Error::NoMorePackets) => break,
                Err(e) => return Err(e.into()),
            };
            let timestamp = timeval_to_duration(
                packet.header.ts.tv_sec as i64,
                packet.header.ts.tv_usec as i64,
            );
            let orig_len = packet.header.len;
            match batch.place(packet.data, timestamp, orig_len) {
                Placement::Placed(boundary) => {
                    on_packet(boundary);
                    count += 1;
                }
                Placement::Skipped => {}
                Placement::Full => {
                    self.held = Some(HeldPacket {
                        data: packet.data.to_vec(),
                        timestamp,
                        orig_len,
                    });
                    break;
                }
            }
        }
        Ok(count)
    }

    fn datalink(&self) -> Linktype {
        self.linktype
    }

    fn snapshot_length(&self) -> usize {
        self.snaplen
    }

    fn stats(&mut self) -> Result<ReaderStats, SourceError> {
        let cap = self
            .cap
            .as_mut()
            .ok_or(SourceError::Unsupported("statistics after close"))?;
        let stat = cap.stats()?;
        Ok(ReaderStats {
            received: u64::from(stat.received),
            dropped: u64::from(stat.dropped),
            if_dropped: u64::from(stat.if_dropped),
        })
    }

    fn close(&mut self) {
        self.held = None;
        if self.cap.take().is_some() {
            debug!("closed device {}", self.device);
        }
    }
}

fn clamp_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn timeval_to_duration(sec: i64, usec: i64) -> Duration {
    let sec = u64::try_from(sec).unwrap_or(0);
    let usec = u64::try_from(usec).unwrap_or(0);
    Duration::from_secs(sec) + Duration::from_micros(usec)
}
