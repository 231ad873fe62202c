use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use super::error::FileError;
use super::layout;
use pcap_parser::{InterfaceDescriptionBlock, Linktype};

/// Read the magic bytes and rewind the reader to the start.
///
/// # Examples
/// This helper is part of an internal module, so the example is marked as
/// text example.
/// ```text
/// use airtap_core::source::file::reader::read_magic_and_rewind;
/// use std::io::Cursor;
///
/// let bytes = [0x0a, 0x0d, 0x0d, 0x0a, 0x01];
/// let mut cursor = Cursor::new(bytes);
/// let magic = read_magic_and_rewind(&mut cursor).unwrap();
/// assert_eq!(magic, [0x0a, 0x0d, 0x0d, 0x0a]);
/// ```
///
/// # Errors
/// Returns `FileError` when the reader cannot be read or rewound.
pub fn read_magic_and_rewind<R: Read + Seek>(reader: &mut R) -> Result<[u8; 4], FileError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(magic)
}

/// Check whether the magic bytes match PCAPNG.
pub fn is_pcapng_magic(magic: &[u8; 4]) -> bool {
    magic == &layout::PCAPNG_MAGIC
}

/// Capture interface declared by a PCAPNG interface description block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interface {
    pub linktype: Linktype,
    /// Raw `if_tsresol` value: bit 7 selects a power of two, otherwise a
    /// power of ten, units per second.
    pub ts_resol: u8,
    /// `if_tsoffset`, in seconds, added to every timestamp.
    pub ts_offset: i64,
}

impl Interface {
    pub fn from_block(intf: &InterfaceDescriptionBlock<'_>) -> Self {
        Self {
            linktype: intf.linktype,
            ts_resol: intf.if_tsresol,
            ts_offset: intf.if_tsoffset as i64,
        }
    }

    /// Convert an enhanced packet block's high/low timestamp.
    pub fn timestamp(&self, ts_high: u32, ts_low: u32) -> Duration {
        let ticks = ((ts_high as u64) << 32) | (ts_low as u64);
        let units = resolution_units(self.ts_resol).unwrap_or(layout::MICROS_PER_SEC);
        let since_offset = ticks_to_duration(ticks, units);
        if self.ts_offset >= 0 {
            since_offset.saturating_add(Duration::from_secs(self.ts_offset as u64))
        } else {
            since_offset.saturating_sub(Duration::from_secs(self.ts_offset.unsigned_abs()))
        }
    }
}

/// Resolve the interface a PCAPNG packet was captured on.
///
/// Returns `None` for packets referencing an interface that was never
/// described.
pub fn interface_for_packet(interfaces: &[Interface], if_id: u32) -> Option<&Interface> {
    interfaces.get(if_id as usize)
}

/// Units per second encoded by an `if_tsresol` value, or `None` when the
/// resolution does not fit in 64 bits.
pub fn resolution_units(ts_resol: u8) -> Option<u64> {
    let exponent = u32::from(ts_resol & 0x7f);
    if ts_resol & 0x80 == 0 {
        10u64.checked_pow(exponent)
    } else {
        1u64.checked_shl(exponent)
    }
}

fn ticks_to_duration(ticks: u64, units: u64) -> Duration {
    let secs = ticks / units;
    let fraction = u128::from(ticks % units);
    let nanos = fraction * 1_000_000_000 / u128::from(units);
    Duration::new(secs, nanos as u32)
}

/// Snapshot length declared by a file header; 0 means unlimited.
pub fn effective_snaplen(declared: u32) -> usize {
    if declared == 0 {
        layout::MAX_SNAPLEN as usize
    } else {
        declared as usize
    }
}

/// Slice the captured bytes out of a block's data, dropping any padding.
pub fn captured_bytes(data: &[u8], caplen: u32) -> &[u8] {
    &data[..data.len().min(caplen as usize)]
}

/// Convert a legacy PCAP timestamp. The fractional field holds nanoseconds
/// when the file uses the nanosecond magic, microseconds otherwise.
pub fn legacy_ts(ts_sec: u32, ts_fraction: u32, nanosecond: bool) -> Duration {
    let fraction = if nanosecond {
        Duration::from_nanos(ts_fraction as u64)
    } else {
        Duration::from_micros(ts_fraction as u64)
    };
    Duration::from_secs(ts_sec as u64) + fraction
}

#[cfg(test)]
mod tests {
    use super::{
        Interface, captured_bytes, effective_snaplen, interface_for_packet, is_pcapng_magic,
        legacy_ts, read_magic_and_rewind, resolution_units,
    };
    use crate::source::file::error::FileError;
    use pcap_parser::Linktype;
    use std::io::Cursor;
    use std::io::Read;
    use std::time::Duration;

    #[test]
    fn detect_pcapng_magic() {
        let data = super::layout::PCAPNG_MAGIC;
        assert!(is_pcapng_magic(&data));
    }

    #[test]
    fn read_magic_rewinds() {
        let bytes = [0x0a, 0x0d, 0x0d, 0x0a, 0x01];
        let mut cursor = Cursor::new(bytes);
        let magic = read_magic_and_rewind(&mut cursor).unwrap();
        assert_eq!(magic, [0x0a, 0x0d, 0x0d, 0x0a]);
        let mut buf = [0u8; 1];
        cursor.read_exact(&mut buf).unwrap();
        assert_eq!(buf[0], 0x0a);
    }

    #[test]
    fn read_magic_too_short() {
        let bytes = [0x0a, 0x0d, 0x0d];
        let mut cursor = Cursor::new(bytes);
        let err = read_magic_and_rewind(&mut cursor).unwrap_err();
        assert!(matches!(err, FileError::Io(_)));
    }

    fn radiotap(ts_resol: u8, ts_offset: i64) -> Interface {
        Interface {
            linktype: Linktype::IEEE802_11_RADIOTAP,
            ts_resol,
            ts_offset,
        }
    }

    #[test]
    fn interface_missing_when_never_described() {
        let interfaces = [radiotap(6, 0)];
        assert_eq!(
            interface_for_packet(&interfaces, 0).map(|i| i.linktype),
            Some(Linktype::IEEE802_11_RADIOTAP)
        );
        assert!(interface_for_packet(&interfaces, 1).is_none());
    }

    #[test]
    fn unlimited_snaplen() {
        assert_eq!(effective_snaplen(0), 262_144);
        assert_eq!(effective_snaplen(65535), 65535);
    }

    #[test]
    fn captured_bytes_drops_padding() {
        assert_eq!(captured_bytes(&[1, 2, 3, 0], 3), &[1, 2, 3]);
        assert_eq!(captured_bytes(&[1, 2], 5), &[1, 2]);
    }

    #[test]
    fn legacy_ts_follows_file_precision() {
        assert_eq!(legacy_ts(2, 500_000, false), Duration::from_millis(2500));
        assert_eq!(legacy_ts(10, 500_000_000, true), Duration::from_millis(10_500));
    }

    #[test]
    fn resolution_powers_of_ten_and_two() {
        assert_eq!(resolution_units(6), Some(1_000_000));
        assert_eq!(resolution_units(9), Some(1_000_000_000));
        assert_eq!(resolution_units(0x8a), Some(1024));
        assert_eq!(resolution_units(20), None);
    }

    #[test]
    fn interface_timestamp_uses_resolution() {
        assert_eq!(radiotap(6, 0).timestamp(0, 1_500_000), Duration::from_millis(1500));
        assert_eq!(
            radiotap(9, 0).timestamp(0, 1_500_000_000),
            Duration::from_millis(1500)
        );
        assert_eq!(radiotap(0x81, 0).timestamp(0, 3), Duration::from_millis(1500));
    }

    #[test]
    fn interface_timestamp_applies_offset() {
        assert_eq!(radiotap(6, 100).timestamp(0, 500_000), Duration::from_millis(100_500));
        assert_eq!(radiotap(6, -1).timestamp(0, 2_500_000), Duration::from_millis(1500));
    }
}
