//! Packet readers feeding the capture engine.
//!
//! A [`Reader`] fills a caller-owned buffer with up to `max_packets` packets
//! per dispatch and reports each packet boundary as it goes. Readers keep a
//! packet that no longer fits in the remaining space for the next dispatch
//! instead of dropping it.

#[cfg(feature = "live")]
mod device;
mod file;

#[cfg(feature = "live")]
pub use device::DeviceReader;
pub use file::PcapFileReader;

use std::time::Duration;

use pcap_parser::Linktype;
use serde::Serialize;
use thiserror::Error;

/// End of one packet inside the dispatch buffer, plus its capture metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketBoundary {
    /// Offset one past the packet's last byte.
    pub offset: usize,
    /// Capture time since the Unix epoch.
    pub timestamp: Duration,
    /// Length of the packet on the wire, before any truncation.
    pub orig_len: u32,
    /// The packet did not fit in the buffer and was cut short.
    pub buffer_overflow: bool,
    /// The packet exceeded the snapshot length and was cut short.
    pub packet_overflow: bool,
}

/// Counters reported by a live capture device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReaderStats {
    pub received: u64,
    pub dropped: u64,
    pub if_dropped: u64,
}

/// Batch-oriented packet source.
pub trait Reader {
    /// Copy up to `max_packets` packets into `buffer`, back to back from
    /// offset 0, calling `on_packet` once per packet in capture order.
    ///
    /// Returns the number of packets reported. The dispatch never yields
    /// partway through a batch.
    fn dispatch(
        &mut self,
        max_packets: usize,
        buffer: &mut [u8],
        on_packet: &mut dyn FnMut(PacketBoundary),
    ) -> Result<usize, SourceError>;

    fn datalink(&self) -> Linktype;

    /// Largest number of bytes a single packet can occupy.
    fn snapshot_length(&self) -> usize;

    fn stats(&mut self) -> Result<ReaderStats, SourceError> {
        Err(SourceError::Unsupported("statistics"))
    }

    /// Release the underlying handle. Dispatching afterwards yields nothing.
    fn close(&mut self);
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP parse error: {0}")]
    Pcap(String),
    #[error("capture device error: {0}")]
    Device(String),
    #[error("operation not supported by this reader: {0}")]
    Unsupported(&'static str),
}

impl From<file::error::FileError> for SourceError {
    fn from(value: file::error::FileError) -> Self {
        match value {
            file::error::FileError::Io(err) => SourceError::Io(err),
            malformed @ file::error::FileError::Malformed { .. } => {
                SourceError::Pcap(malformed.to_string())
            }
        }
    }
}

pub(crate) enum Placement {
    Placed(PacketBoundary),
    /// Nothing to place (empty packet).
    Skipped,
    /// The packet does not fit after the packets already placed.
    Full,
}

/// Packs packets back to back into a dispatch buffer.
pub(crate) struct BatchWriter<'b> {
    buffer: &'b mut [u8],
    written: usize,
    snaplen: usize,
}

impl<'b> BatchWriter<'b> {
    pub(crate) fn new(buffer: &'b mut [u8], snaplen: usize) -> Self {
        Self {
            buffer,
            written: 0,
            snaplen,
        }
    }

    pub(crate) fn place(&mut self, data: &[u8], timestamp: Duration, orig_len: u32) -> Placement {
        let packet_overflow = data.len() > self.snaplen;
        let data = &data[..data.len().min(self.snaplen)];
        if data.is_empty() {
            return Placement::Skipped;
        }

        let room = self.buffer.len() - self.written;
        let (data, buffer_overflow) = if data.len() <= room {
            (data, false)
        } else if self.written == 0 {
            // Larger than the whole buffer: keep what fits.
            (&data[..room], true)
        } else {
            return Placement::Full;
        };
        if data.is_empty() {
            return Placement::Skipped;
        }

        let end = self.written + data.len();
        self.buffer[self.written..end].copy_from_slice(data);
        self.written = end;
        Placement::Placed(PacketBoundary {
            offset: end,
            timestamp,
            orig_len,
            buffer_overflow,
            packet_overflow,
        })
    }
}
