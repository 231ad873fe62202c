use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use log::debug;
use pcap_file::DataLink;
use pcap_file::pcap::{PcapHeader, PcapPacket, PcapWriter};
use pcap_parser::Linktype;

use super::{SinkError, Writer};

/// Legacy pcap file writer (microsecond timestamps, native endianness).
pub struct PcapFileWriter {
    inner: Option<PcapWriter<BufWriter<File>>>,
}

impl PcapFileWriter {
    pub fn create(path: &Path, linktype: Linktype, snaplen: usize) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        let header = PcapHeader {
            snaplen: u32::try_from(snaplen).unwrap_or(u32::MAX),
            datalink: DataLink::from(linktype.0 as u32),
            ..Default::default()
        };
        let writer = PcapWriter::with_header(BufWriter::new(file), header)
            .map_err(|e| SinkError::Pcap(e.to_string()))?;
        debug!(
            "created capture file {} (linktype {}, snaplen {})",
            path.display(),
            linktype.0,
            snaplen
        );
        Ok(Self {
            inner: Some(writer),
        })
    }
}

impl Writer for PcapFileWriter {
    fn write_packet(
        &mut self,
        data: &[u8],
        timestamp: Duration,
        orig_len: u32,
    ) -> Result<(), SinkError> {
        let writer = self.inner.as_mut().ok_or(SinkError::Finished)?;
        let packet = PcapPacket::new(timestamp, orig_len, data);
        writer
            .write_packet(&packet)
            .map_err(|e| SinkError::Pcap(e.to_string()))?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if let Some(writer) = self.inner.take() {
            writer.into_writer().flush()?;
        }
        Ok(())
    }
}
