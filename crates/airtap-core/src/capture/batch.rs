use std::time::Duration;

use super::error::CaptureError;
use crate::source::PacketBoundary;

/// Handle to one packet of a batch in the capture buffer.
///
/// A view does not borrow the buffer. Resolve it with
/// [`Capture::packet_data`](super::Capture::packet_data), which fails once a
/// later fetch has reused the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketView {
    pub(crate) generation: u64,
    pub(crate) start: usize,
    pub(crate) end: usize,
    timestamp: Duration,
    orig_len: u32,
}

impl PacketView {
    /// Number of captured bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Capture time since the Unix epoch.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Length on the wire; larger than [`len`](Self::len) for truncated packets.
    pub fn orig_len(&self) -> u32 {
        self.orig_len
    }

    /// Fetch that produced this view.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy)]
struct PacketMeta {
    timestamp: Duration,
    orig_len: u32,
}

/// Offsets and metadata of the packets in the current batch.
///
/// `offsets` always starts with 0 and is strictly increasing, so it holds
/// one more entry than there are packets.
#[derive(Debug)]
pub(crate) struct Batch {
    generation: u64,
    offsets: Vec<usize>,
    meta: Vec<PacketMeta>,
    cursor: usize,
}

impl Batch {
    pub(crate) fn new() -> Self {
        Self {
            generation: 0,
            offsets: vec![0],
            meta: Vec::new(),
            cursor: 0,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn reset(&mut self) {
        self.generation += 1;
        self.offsets.clear();
        self.offsets.push(0);
        self.meta.clear();
        self.cursor = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub(crate) fn pending(&self) -> usize {
        self.len() - self.cursor
    }

    pub(crate) fn has_packet(&self) -> bool {
        self.cursor + 1 < self.offsets.len()
    }

    pub(crate) fn last_offset(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    /// Record a boundary reported by the reader.
    pub(crate) fn push(
        &mut self,
        boundary: &PacketBoundary,
        buffer_len: usize,
    ) -> Result<(), CaptureError> {
        let previous = self.last_offset();
        if boundary.offset <= previous || boundary.offset > buffer_len {
            return Err(CaptureError::InvalidBoundary {
                offset: boundary.offset,
                previous,
                buffer_len,
            });
        }
        self.offsets.push(boundary.offset);
        self.meta.push(PacketMeta {
            timestamp: boundary.timestamp,
            orig_len: boundary.orig_len,
        });
        Ok(())
    }

    pub(crate) fn next_view(&mut self) -> Option<PacketView> {
        if !self.has_packet() {
            return None;
        }
        let meta = self.meta[self.cursor];
        let view = PacketView {
            generation: self.generation,
            start: self.offsets[self.cursor],
            end: self.offsets[self.cursor + 1],
            timestamp: meta.timestamp,
            orig_len: meta.orig_len,
        };
        self.cursor += 1;
        Some(view)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Batch;
    use crate::capture::error::CaptureError;
    use crate::source::PacketBoundary;

    fn boundary(offset: usize) -> PacketBoundary {
        PacketBoundary {
            offset,
            timestamp: Duration::from_secs(1),
            orig_len: offset as u32,
            buffer_overflow: false,
            packet_overflow: false,
        }
    }

    #[test]
    fn views_follow_offsets() {
        let mut batch = Batch::new();
        batch.reset();
        batch.push(&boundary(4), 16).unwrap();
        batch.push(&boundary(10), 16).unwrap();
        assert_eq!(batch.len(), 2);

        let first = batch.next_view().unwrap();
        assert_eq!((first.start, first.end), (0, 4));
        let second = batch.next_view().unwrap();
        assert_eq!((second.start, second.end), (4, 10));
        assert_eq!(second.len(), 6);
        assert!(batch.next_view().is_none());
        assert_eq!(batch.pending(), 0);
    }

    #[test]
    fn rejects_non_increasing_boundary() {
        let mut batch = Batch::new();
        batch.push(&boundary(4), 16).unwrap();
        let err = batch.push(&boundary(4), 16).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::InvalidBoundary {
                offset: 4,
                previous: 4,
                ..
            }
        ));
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn rejects_boundary_past_buffer() {
        let mut batch = Batch::new();
        assert!(batch.push(&boundary(17), 16).is_err());
        assert!(!batch.has_packet());
    }

    #[test]
    fn reset_bumps_generation_and_clears() {
        let mut batch = Batch::new();
        batch.push(&boundary(3), 16).unwrap();
        batch.reset();
        assert_eq!(batch.generation(), 1);
        assert_eq!(batch.len(), 0);
        assert_eq!(batch.last_offset(), 0);
    }
}
