pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

/// Read-ahead buffer of the block parser. Must hold the largest block,
/// i.e. a maximal snapshot plus block framing.
pub const PCAP_READER_BUFFER_SIZE: usize = 512 * 1024;

/// Snapshot length assumed when a file declares 0 (unlimited).
pub const MAX_SNAPLEN: u32 = 262_144;

/// PCAPNG timestamp units per second when an interface declares no
/// `if_tsresol`.
pub const MICROS_PER_SEC: u64 = 1_000_000;
