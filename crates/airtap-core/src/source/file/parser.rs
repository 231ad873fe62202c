use std::fs::File;
use std::path::Path;

use log::debug;
use pcap_parser::{
    Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapError, PcapNGReader,
    traits::PcapReaderIterator,
};

use crate::source::{BatchWriter, PacketBoundary, Placement, Reader, SourceError};

use super::error::{FileError, Stage};
use super::layout;
use super::reader::{
    Interface, captured_bytes, effective_snaplen, interface_for_packet, is_pcapng_magic,
    legacy_ts, read_magic_and_rewind,
};

/// Batch reader over a saved PCAP or PCAPNG capture.
///
/// The data-link type and snapshot length come from the file header (the
/// first interface description for PCAPNG). PCAPNG packets captured on an
/// interface with a different data-link type are skipped. Timestamps follow
/// the file's precision: the nanosecond magic for legacy files, each
/// interface's `if_tsresol`/`if_tsoffset` for PCAPNG.
pub struct PcapFileReader {
    inner: Option<BlockStream>,
    linktype: Linktype,
    snaplen: usize,
}

struct BlockStream {
    reader: Box<dyn PcapReaderIterator>,
    interfaces: Vec<Interface>,
    /// Legacy file written with the nanosecond magic.
    nanosecond: bool,
    /// Set after a refill; a second `Incomplete` without progress means the
    /// file ends in the middle of a block.
    refilled: bool,
}

enum Step {
    Packet(PacketBoundary),
    Skipped,
    Full,
    Eof,
}

impl PcapFileReader {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(SourceError::from)?;
        let mut inner = create_stream(file).map_err(SourceError::from)?;
        let (linktype, snaplen) = inner.read_header().map_err(SourceError::from)?;
        debug!(
            "opened capture file {} (linktype {}, snaplen {})",
            path.display(),
            linktype.0,
            snaplen
        );
        Ok(Self {
            inner: Some(inner),
            linktype,
            snaplen: effective_snaplen(snaplen),
        })
    }
}

impl Reader for PcapFileReader {
    fn dispatch(
        &mut self,
        max_packets: usize,
        buffer: &mut [u8],
        on_packet: &mut dyn FnMut(PacketBoundary),
    ) -> Result<usize, SourceError> {
        let Some(stream) = self.inner.as_mut() else {
            return Ok(0);
        };
        let mut batch = BatchWriter::new(buffer, self.snaplen);
        let mut count = 0;
        while count < max_packets {
            match stream.step(&mut batch, self.linktype)? {
                Step::Packet(boundary) => {
                    on_packet(boundary);
                    count += 1;
                }
                Step::Skipped => {}
                Step::Full | Step::Eof => break,
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

    fn close(&mut self) {
        if self.inner.take().is_some() {
            debug!("closed capture file");
        }
    }
}

fn create_stream(file: File) -> Result<BlockStream, FileError> {
    let mut file = file;
    let magic = read_magic_and_rewind(&mut file)?;

    let reader: Box<dyn PcapReaderIterator> = if is_pcapng_magic(&magic) {
        Box::new(
            PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file)
                .map_err(|e| FileError::malformed(Stage::Opening, e.to_string()))?,
        )
    } else {
        Box::new(
            LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file)
                .map_err(|e| FileError::malformed(Stage::Opening, e.to_string()))?,
        )
    };
    Ok(BlockStream {
        reader,
        interfaces: Vec::new(),
        nanosecond: false,
        refilled: false,
    })
}

impl BlockStream {
    /// Consume blocks up to the legacy header or the first interface
    /// description and return its linktype and declared snapshot length.
    fn read_header(&mut self) -> Result<(Linktype, u32), FileError> {
        loop {
            match self.reader.next() {
                Ok((offset, block)) => {
                    self.refilled = false;
                    let header = match block {
                        PcapBlockOwned::LegacyHeader(header) => {
                            self.nanosecond = header.is_nanosecond_precision();
                            Some((header.network, header.snaplen))
                        }
                        PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                            self.interfaces.push(Interface::from_block(&intf));
                            Some((intf.linktype, intf.snaplen))
                        }
                        PcapBlockOwned::NG(Block::SectionHeader(_)) => None,
                        _ => {
                            return Err(FileError::malformed(
                                Stage::Header,
                                "packet data before interface description",
                            ));
                        }
                    };
                    self.reader.consume(offset);
                    if let Some(header) = header {
                        return Ok(header);
                    }
                }
                Err(PcapError::Eof) => {
                    return Err(FileError::malformed(
                        Stage::Header,
                        "no interface described before end of file",
                    ));
                }
                Err(PcapError::Incomplete(_)) => self.refill(Stage::Header)?,
                Err(e) => return Err(FileError::malformed(Stage::Header, e.to_string())),
            }
        }
    }

    /// Handle one block. A packet that does not fit is left unconsumed so the
    /// next dispatch starts with it.
    fn step(
        &mut self,
        batch: &mut BatchWriter<'_>,
        linktype: Linktype,
    ) -> Result<Step, FileError> {
        match self.reader.next() {
            Ok((offset, block)) => {
                self.refilled = false;
                let placement = match block {
                    PcapBlockOwned::Legacy(packet) => Some(batch.place(
                        captured_bytes(packet.data, packet.caplen),
                        legacy_ts(packet.ts_sec, packet.ts_usec, self.nanosecond),
                        packet.origlen,
                    )),
                    PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                        self.interfaces.push(Interface::from_block(&intf));
                        None
                    }
                    PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => {
                        match interface_for_packet(&self.interfaces, packet.if_id) {
                            Some(interface) if interface.linktype == linktype => {
                                Some(batch.place(
                                    captured_bytes(packet.data, packet.caplen),
                                    interface.timestamp(packet.ts_high, packet.ts_low),
                                    packet.origlen,
                                ))
                            }
                            _ => {
                                debug!("skipping packet from interface {}", packet.if_id);
                                None
                            }
                        }
                    }
                    PcapBlockOwned::NG(Block::SimplePacket(packet)) => Some(batch.place(
                        captured_bytes(packet.data, packet.origlen),
                        Default::default(),
                        packet.origlen,
                    )),
                    _ => None,
                };
                let step = match placement {
                    Some(Placement::Placed(boundary)) => Step::Packet(boundary),
                    Some(Placement::Full) => return Ok(Step::Full),
                    Some(Placement::Skipped) | None => Step::Skipped,
                };
                self.reader.consume(offset);
                Ok(step)
            }
            Err(PcapError::Eof) => Ok(Step::Eof),
            Err(PcapError::Incomplete(_)) => {
                self.refill(Stage::Packets)?;
                Ok(Step::Skipped)
            }
            Err(e) => Err(FileError::malformed(Stage::Packets, e.to_string())),
        }
    }

    fn refill(&mut self, stage: Stage) -> Result<(), FileError> {
        if self.refilled {
            return Err(FileError::malformed(stage, "truncated block at end of file"));
        }
        self.reader
            .refill()
            .map_err(|e| FileError::malformed(stage, e.to_string()))?;
        self.refilled = true;
        Ok(())
    }
}
