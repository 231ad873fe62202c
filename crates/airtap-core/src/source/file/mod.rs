//! PCAP/PCAPNG file reader.
//!
//! This module provides a batch [`Reader`](crate::source::Reader) backed by
//! PCAP or PCAPNG files. It handles file I/O and block parsing; packets are
//! copied straight from the parser's read-ahead buffer into the dispatch
//! buffer.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::PcapFileReader;
