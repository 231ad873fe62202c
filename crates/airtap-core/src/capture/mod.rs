//! Capture engine: turns batched reader dispatches into a pull-based stream
//! of packet views over one reused buffer.
//!
//! Each [`Capture::fetch`] resets the batch, lets the reader fill the buffer
//! and records the packet boundaries it reports. Consumers then drain the
//! batch with [`Capture::get_packet`] (or [`Capture::read`], which fetches on
//! demand) before the next fetch overwrites the buffer.
//!
//! Problems found while fetching do not abort the stream. They are queued
//! as [`CaptureEvent::Error`] alongside [`CaptureEvent::Fetch`] reports and
//! the final [`CaptureEvent::End`], and are logged when queued.

mod batch;
mod error;
#[cfg(feature = "live")]
mod live;
mod replay;

use std::collections::VecDeque;
use std::time::Duration;

use log::{debug, error, trace, warn};
use pcap_parser::Linktype;
use serde::Serialize;

use crate::source::{PacketBoundary, Reader, ReaderStats};

pub use batch::PacketView;
pub use error::CaptureError;
#[cfg(feature = "live")]
pub use live::{Live, live};
pub use replay::{Replay, replay};

/// Oldest events are dropped once this many are queued.
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// What [`Capture::read`] does when a fetch returns no packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullPolicy {
    /// Wait `backoff` and fetch again. Used for live devices, where an empty
    /// fetch only means nothing arrived yet.
    Retry { backoff: Duration },
    /// Treat the empty fetch as end of data and close.
    CloseOnEmpty,
}

/// Summary of one completed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FetchReport {
    pub packets: usize,
    /// Packets obtained relative to the batch size.
    pub batch_fill: f64,
    /// Bytes used relative to the buffer length.
    pub buffer_fill: f64,
}

#[derive(Debug)]
pub enum CaptureEvent {
    /// A fetch completed. `None` when the capture was already closed.
    Fetch(Option<FetchReport>),
    Error(CaptureError),
    /// The capture closed. Queued exactly once.
    End,
}

#[derive(Debug, Default)]
struct EventQueue {
    events: VecDeque<CaptureEvent>,
}

impl EventQueue {
    fn push(&mut self, event: CaptureEvent) {
        match &event {
            CaptureEvent::Fetch(Some(report)) => trace!(
                "fetched {} packets (batch {:.2}, buffer {:.2})",
                report.packets, report.batch_fill, report.buffer_fill
            ),
            CaptureEvent::Fetch(None) => trace!("fetch on closed capture"),
            CaptureEvent::Error(err @ CaptureError::Source(_)) => error!("{err}"),
            CaptureEvent::Error(err) => warn!("{err}"),
            CaptureEvent::End => debug!("capture ended"),
        }
        if self.events.len() == EVENT_QUEUE_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Pull-based packet stream over a [`Reader`].
pub struct Capture<R: Reader> {
    reader: R,
    buffer: Box<[u8]>,
    batch: batch::Batch,
    batch_size: usize,
    policy: PullPolicy,
    closed: bool,
    events: EventQueue,
}

impl<R: Reader> Capture<R> {
    /// Wrap a configured reader.
    ///
    /// # Errors
    /// [`CaptureError::BufferTooSmall`] when `buffer_size` is zero or smaller
    /// than the reader's snapshot length, [`CaptureError::InvalidBatchSize`]
    /// when `batch_size` is zero.
    pub fn new(
        reader: R,
        buffer_size: usize,
        batch_size: usize,
        policy: PullPolicy,
    ) -> Result<Self, CaptureError> {
        let snaplen = reader.snapshot_length();
        if buffer_size == 0 || buffer_size < snaplen {
            return Err(CaptureError::BufferTooSmall {
                buffer_len: buffer_size,
                snaplen,
            });
        }
        if batch_size == 0 {
            return Err(CaptureError::InvalidBatchSize);
        }
        Ok(Self {
            reader,
            buffer: vec![0u8; buffer_size].into_boxed_slice(),
            batch: batch::Batch::new(),
            batch_size,
            policy,
            closed: false,
            events: EventQueue::default(),
        })
    }

    pub fn has_packet(&self) -> bool {
        self.batch.has_packet()
    }

    /// Next packet of the current batch, or `None` once it is drained.
    pub fn get_packet(&mut self) -> Option<PacketView> {
        self.batch.next_view()
    }

    /// Bytes of `view`.
    ///
    /// # Errors
    /// [`CaptureError::StaleView`] if a fetch has happened since the view was
    /// taken.
    pub fn packet_data(&self, view: &PacketView) -> Result<&[u8], CaptureError> {
        let current = self.batch.generation();
        if view.generation != current {
            return Err(CaptureError::StaleView {
                view: view.generation,
                current,
            });
        }
        Ok(&self.buffer[view.start..view.end])
    }

    /// Fill the buffer with the next batch and return the packet count.
    ///
    /// Yields to the runtime once, then dispatches the whole batch without
    /// suspending.
    pub async fn fetch(&mut self) -> usize {
        tokio::task::yield_now().await;
        self.dispatch_batch()
    }

    fn dispatch_batch(&mut self) -> usize {
        if self.batch.has_packet() {
            self.events
                .push(CaptureEvent::Error(CaptureError::PreemptiveFetch {
                    pending: self.batch.pending(),
                }));
        }
        if self.closed {
            self.events.push(CaptureEvent::Fetch(None));
            return 0;
        }

        self.batch.reset();
        let buffer_len = self.buffer.len();
        let batch = &mut self.batch;
        let events = &mut self.events;
        let result = self.reader.dispatch(
            self.batch_size,
            &mut self.buffer,
            &mut |boundary: PacketBoundary| {
                if let Err(err) = batch.push(&boundary, buffer_len) {
                    events.push(CaptureEvent::Error(err));
                    return;
                }
                if boundary.buffer_overflow || boundary.packet_overflow {
                    events.push(CaptureEvent::Error(CaptureError::Overflow {
                        packet: batch.len() - 1,
                        buffer_overflow: boundary.buffer_overflow,
                        packet_overflow: boundary.packet_overflow,
                    }));
                }
            },
        );
        if let Err(err) = result {
            self.events.push(CaptureEvent::Error(err.into()));
        }

        let packets = self.batch.len();
        self.events.push(CaptureEvent::Fetch(Some(FetchReport {
            packets,
            batch_fill: packets as f64 / self.batch_size as f64,
            buffer_fill: self.batch.last_offset() as f64 / buffer_len as f64,
        })));
        packets
    }

    /// Next packet, fetching as needed. `None` once the capture is closed.
    pub async fn read(&mut self) -> Option<PacketView> {
        loop {
            if self.closed {
                return None;
            }
            if let Some(view) = self.get_packet() {
                return Some(view);
            }
            if self.fetch().await > 0 {
                continue;
            }
            match self.policy {
                PullPolicy::CloseOnEmpty => self.close(),
                PullPolicy::Retry { backoff } => {
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
    }

    /// Close the capture and release the reader. Later calls do nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.reader.close();
        self.events.push(CaptureEvent::End);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn datalink(&self) -> Linktype {
        self.reader.datalink()
    }

    pub fn snapshot_length(&self) -> usize {
        self.reader.snapshot_length()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn policy(&self) -> PullPolicy {
        self.policy
    }

    /// Reader counters, for readers that keep them.
    pub fn stats(&mut self) -> Result<ReaderStats, CaptureError> {
        Ok(self.reader.stats()?)
    }

    /// Oldest queued event.
    pub fn next_event(&mut self) -> Option<CaptureEvent> {
        self.events.events.pop_front()
    }

    pub fn drain_events(&mut self) -> Vec<CaptureEvent> {
        self.events.events.drain(..).collect()
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }
}

impl<R: Reader> Drop for Capture<R> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.reader.close();
        }
    }
}
