use thiserror::Error;

/// Errors returned by radiotap header decoding.
#[derive(Debug, Error)]
pub enum RadiotapError {
    #[error("input too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("unsupported radiotap revision: {revision}")]
    UnsupportedRevision { revision: u8 },
    #[error("declared header length {length} is below the fixed header size")]
    HeaderTooShort { length: u16 },
    #[error("declared header length {length} exceeds input length {actual}")]
    LengthExceedsInput { length: u16, actual: usize },
    #[error("present bitmask runs past the declared header length {length}")]
    PresentWordsOverrun { length: u16 },
}
