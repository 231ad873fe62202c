pub const FRAME_CONTROL_RANGE: std::ops::Range<usize> = 0..2;
pub const DURATION_RANGE: std::ops::Range<usize> = 2..4;
pub const ADDR1_RANGE: std::ops::Range<usize> = 4..10;
pub const ADDR2_RANGE: std::ops::Range<usize> = 10..16;
pub const ADDR3_RANGE: std::ops::Range<usize> = 16..22;

pub const MAC_LEN: usize = 6;

// Frame control, first byte.
pub const VERSION_MASK: u8 = 0b0000_0011;
pub const TYPE_MASK: u8 = 0b0000_1100;
pub const TYPE_SHIFT: u32 = 2;
pub const SUBTYPE_SHIFT: u32 = 4;

// Frame control, second byte.
pub const FLAG_TO_DS: u8 = 0b0000_0001;
pub const FLAG_FROM_DS: u8 = 0b0000_0010;

pub const TYPE_MGMT: u8 = 0;
pub const TYPE_CTRL: u8 = 1;
pub const TYPE_DATA: u8 = 2;
pub const TYPE_EXTENSION: u8 = 3;
