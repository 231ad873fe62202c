//! Radiotap header decoding.
//!
//! Radiotap is self-describing: a fixed 8-byte preamble declares the total
//! header length, followed by a chain of present bitmask words. Only the
//! preamble is modeled; the bitmask chain is validated against the declared
//! length and everything past the header is handed back as the body.
pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use error::RadiotapError;
pub use parser::{RadiotapHeader, decode_radiotap};
