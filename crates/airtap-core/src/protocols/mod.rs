//! Frame decoding modules.
//!
//! Each protocol follows a layered structure:
//! - `layout`: byte offsets, ranges and bit masks (source of truth)
//! - `reader`: bounds-checked byte access and protocol conventions
//! - `parser`: domain-level decoding into records
//! - `error`: explicit, actionable errors
//!
//! Decoders are pure and contain no I/O. They borrow from the input where
//! possible, so a record decoded from a packet view lives no longer than the
//! batch it came from.

pub(crate) mod common;
pub mod ieee80211;
pub mod radiotap;

use pcap_parser::Linktype;
use serde::Serialize;
use thiserror::Error;

pub use ieee80211::{Ieee80211Error, Ieee80211Frame, decode_ieee80211};
pub use radiotap::{RadiotapError, RadiotapHeader, decode_radiotap};

/// A frame decoded according to its capture's data-link type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decoded<'a> {
    Ieee80211(Ieee80211Frame),
    Radiotap(RadiotapHeader<'a>),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("802.11 decode error: {0}")]
    Ieee80211(#[from] Ieee80211Error),
    #[error("radiotap decode error: {0}")]
    Radiotap(#[from] RadiotapError),
    #[error("unsupported data-link type: {0}")]
    UnsupportedLinktype(i32),
}

/// Decode `data` according to `linktype`.
///
/// # Examples
/// ```
/// use airtap_core::protocols::{Decoded, decode_frame};
/// use pcap_parser::Linktype;
///
/// let ack = [0xd4, 0x00, 0x00, 0x00, 0x60, 0x6c, 0x66, 0x8f, 0xf5, 0xe3];
/// match decode_frame(Linktype::IEEE802_11, &ack)? {
///     Decoded::Ieee80211(frame) => assert_eq!(frame.ra, "60:6c:66:8f:f5:e3"),
///     Decoded::Radiotap(_) => unreachable!(),
/// }
/// # Ok::<(), airtap_core::protocols::DecodeError>(())
/// ```
pub fn decode_frame(linktype: Linktype, data: &[u8]) -> Result<Decoded<'_>, DecodeError> {
    match linktype {
        Linktype::IEEE802_11 => Ok(Decoded::Ieee80211(decode_ieee80211(data)?)),
        Linktype::IEEE802_11_RADIOTAP => Ok(Decoded::Radiotap(decode_radiotap(data)?)),
        other => Err(DecodeError::UnsupportedLinktype(other.0)),
    }
}
