use thiserror::Error;

use crate::source::SourceError;

/// Errors reported by the capture engine.
///
/// Construction errors are returned directly. Errors that happen during a
/// fetch are queued as [`CaptureEvent::Error`](super::CaptureEvent::Error)
/// and the fetch still completes.
///
/// # Examples
/// ```
/// use airtap_core::capture::CaptureError;
///
/// let err = CaptureError::BufferTooSmall { buffer_len: 64, snaplen: 65535 };
/// assert!(err.to_string().contains("65535"));
/// ```
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("buffer of {buffer_len} bytes is smaller than the snapshot length {snaplen}")]
    BufferTooSmall { buffer_len: usize, snaplen: usize },
    #[error("batch size must be at least 1")]
    InvalidBatchSize,
    #[error(
        "packet {packet} overflowed (buffer overflow: {buffer_overflow}, packet overflow: {packet_overflow})"
    )]
    Overflow {
        packet: usize,
        buffer_overflow: bool,
        packet_overflow: bool,
    },
    #[error("fetch started with {pending} undrained packets")]
    PreemptiveFetch { pending: usize },
    #[error("invalid packet boundary {offset} (previous {previous}, buffer {buffer_len})")]
    InvalidBoundary {
        offset: usize,
        previous: usize,
        buffer_len: usize,
    },
    #[error("packet view from batch {view} used after batch {current} was fetched")]
    StaleView { view: u64, current: u64 },
    #[error(transparent)]
    Source(#[from] SourceError),
}
