pub const REVISION_OFFSET: usize = 0;
pub const PAD_OFFSET: usize = 1;
pub const LENGTH_RANGE: std::ops::Range<usize> = 2..4;
pub const PRESENT_OFFSET: usize = 4;

pub const PRESENT_WORD_LEN: usize = 4;
/// Bit 31 of a present word announces another present word.
pub const PRESENT_EXT_BIT: u32 = 1 << 31;

/// Revision, pad, length and the first present word.
pub const FIXED_HEADER_LEN: usize = 8;
pub const SUPPORTED_REVISION: u8 = 0;
