//! Saving packets to capture files.
//!
//! [`Save`] owns a [`Writer`] and enforces the sink's lifecycle: packets are
//! truncated to the configured snapshot length, the writer is closed exactly
//! once, and a sink dropped without [`Save::finish`] finishes itself.

mod file;

pub use file::PcapFileWriter;

use std::path::Path;
use std::time::Duration;

use log::{debug, error};
use pcap_parser::Linktype;
use thiserror::Error;

use crate::config::SaveOptions;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP write error: {0}")]
    Pcap(String),
    #[error("sink already finished")]
    Finished,
}

/// Destination for saved packets.
pub trait Writer {
    /// Append one packet. `data` is already truncated to the snapshot length.
    fn write_packet(
        &mut self,
        data: &[u8],
        timestamp: Duration,
        orig_len: u32,
    ) -> Result<(), SinkError>;

    /// Flush and release the destination.
    fn close(&mut self) -> Result<(), SinkError>;
}

pub struct Save<W: Writer> {
    writer: W,
    snaplen: usize,
    written: u64,
    finished: bool,
}

impl Save<PcapFileWriter> {
    /// Create a pcap file at `path` for packets of the given data-link type.
    ///
    /// # Errors
    /// Returns `SinkError` when the file cannot be created or the header
    /// cannot be written.
    pub fn create(
        path: impl AsRef<Path>,
        linktype: Linktype,
        options: &SaveOptions,
    ) -> Result<Self, SinkError> {
        let writer = PcapFileWriter::create(path.as_ref(), linktype, options.snap_len)?;
        Ok(Self::new(writer, options))
    }
}

impl<W: Writer> Save<W> {
    pub fn new(writer: W, options: &SaveOptions) -> Self {
        Self {
            writer,
            snaplen: options.snap_len,
            written: 0,
            finished: false,
        }
    }

    /// Write one packet, truncated to the snapshot length.
    ///
    /// # Errors
    /// [`SinkError::Finished`] after [`finish`](Self::finish), or the
    /// writer's error.
    pub fn write(&mut self, data: &[u8], timestamp: Duration, orig_len: u32) -> Result<(), SinkError> {
        if self.finished {
            return Err(SinkError::Finished);
        }
        let captured = &data[..data.len().min(self.snaplen)];
        let orig_len = orig_len.max(u32::try_from(data.len()).unwrap_or(u32::MAX));
        self.writer.write_packet(captured, timestamp, orig_len)?;
        self.written += 1;
        Ok(())
    }

    /// Flush and close the writer. Later calls do nothing.
    pub fn finish(&mut self) -> Result<(), SinkError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        debug!("finishing save after {} packets", self.written);
        self.writer.close()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn packets_written(&self) -> u64 {
        self.written
    }

    pub fn snapshot_length(&self) -> usize {
        self.snaplen
    }
}

impl<W: Writer> Drop for Save<W> {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            error!("failed to finish save: {err}");
        }
    }
}
