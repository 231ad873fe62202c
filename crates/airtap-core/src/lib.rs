//! airtap core library: wireless packet capture and frame decoding.
//!
//! Packets come from a [`source::Reader`], either a saved pcap/pcapng file
//! or (with the `live` feature) a libpcap device. The [`capture`] engine
//! fetches them in batches into one reused buffer and hands them out one
//! [`capture::PacketView`] at a time. Views can be decoded with
//! [`protocols::decode_frame`] and saved with [`sink::Save`].
//!
//! Decoders are byte-oriented and side-effect free; all I/O is isolated in
//! `source` and `sink`.
//!
//! Invariants:
//! - The capture buffer is never smaller than the reader's snapshot length.
//! - A view from an earlier batch never resolves to a later batch's bytes.
//! - A capture releases its reader and reports its end exactly once.
//!
//! # Examples
//! ```no_run
//! use airtap_core::capture::Replay;
//! use airtap_core::config::ReplayOptions;
//! use airtap_core::protocols::decode_frame;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut capture = Replay::open("capture.pcap", &ReplayOptions::default())?;
//! while let Some(view) = capture.read().await {
//!     let data = capture.packet_data(&view)?;
//!     println!("{:?}", decode_frame(capture.datalink(), data));
//! }
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod protocols;
pub mod sink;
pub mod source;

pub use capture::{Capture, CaptureError, CaptureEvent, FetchReport, PacketView, PullPolicy};
pub use config::{LiveOptions, ReplayOptions, SaveOptions};
pub use protocols::{DecodeError, Decoded, decode_frame};
pub use sink::{Save, SinkError};
pub use source::{Reader, SourceError};

/// Data-link type of a capture, as stored in pcap headers.
pub use pcap_parser::Linktype;
