use thiserror::Error;

use super::parser::FrameType;

/// Errors returned by 802.11 MAC header decoding.
///
/// Note: this error type lives in an internal module; the example is
/// illustrative and not compiled as a public doctest.
///
/// # Examples
/// ```text
/// use airtap_core::protocols::ieee80211::error::Ieee80211Error;
///
/// let err = Ieee80211Error::FourAddress;
/// assert!(err.to_string().contains("four-address"));
/// ```
#[derive(Debug, Error)]
pub enum Ieee80211Error {
    #[error("frame too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("extension frames (type 3) are not supported")]
    ExtensionFrame,
    #[error("reserved {frame_type:?} subtype: {subtype}")]
    ReservedSubtype { frame_type: FrameType, subtype: u8 },
    #[error("four-address data frames (toDs=1, fromDs=1) are not supported")]
    FourAddress,
}
