use serde::Serialize;

use super::error::RadiotapError;
use super::layout;
use super::reader::RadiotapReader;
use crate::protocols::common::reader::serialize_hex;

/// Radiotap preamble plus the bytes that follow the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadiotapHeader<'a> {
    pub header_revision: u8,
    pub header_pad: u8,
    pub header_length: u16,
    /// Everything after the declared header length, usually an 802.11 frame.
    #[serde(serialize_with = "serialize_hex")]
    pub body: &'a [u8],
}

/// Decode a radiotap header from the start of `data`.
///
/// # Errors
/// Fails when the declared header length is smaller than the fixed preamble,
/// larger than `data`, or too short to hold the present bitmask chain.
pub fn decode_radiotap(data: &[u8]) -> Result<RadiotapHeader<'_>, RadiotapError> {
    let reader = RadiotapReader::new(data);
    reader.require_len(layout::FIXED_HEADER_LEN)?;

    let header_revision = reader.read_u8(layout::REVISION_OFFSET)?;
    if header_revision != layout::SUPPORTED_REVISION {
        return Err(RadiotapError::UnsupportedRevision {
            revision: header_revision,
        });
    }
    let header_pad = reader.read_u8(layout::PAD_OFFSET)?;
    let header_length = reader.read_u16_le(layout::LENGTH_RANGE)?;

    if (header_length as usize) < layout::FIXED_HEADER_LEN {
        return Err(RadiotapError::HeaderTooShort {
            length: header_length,
        });
    }
    if header_length as usize > data.len() {
        return Err(RadiotapError::LengthExceedsInput {
            length: header_length,
            actual: data.len(),
        });
    }
    reader.count_present_words(header_length)?;

    let body = reader.read_slice(header_length as usize..data.len())?;
    Ok(RadiotapHeader {
        header_revision,
        header_pad,
        header_length,
        body,
    })
}
