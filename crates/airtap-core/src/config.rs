//! Capture and save options.
//!
//! Every struct deserializes with missing fields filled from its `Default`,
//! so an options file only needs the values it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default snapshot length for live capture and saving.
pub const DEFAULT_SNAP_LEN: usize = 65535;
/// Default shared buffer size (1 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;
/// Default packet-count ceiling per fetch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Options for capturing from a network device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveOptions {
    /// Put the interface in monitor (rfmon) mode.
    pub monitor: bool,
    pub promisc: bool,
    /// BPF filter expression; empty means no filter.
    pub filter: String,
    pub snap_len: usize,
    pub buffer_size: usize,
    pub batch_size: usize,
    /// Device read timeout in milliseconds.
    pub timeout_ms: u64,
    /// Pause between fetches that return no packets.
    pub idle_backoff_ms: u64,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            monitor: false,
            promisc: false,
            filter: String::new(),
            snap_len: DEFAULT_SNAP_LEN,
            buffer_size: DEFAULT_BUFFER_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_ms: 1000,
            idle_backoff_ms: 10,
        }
    }
}

impl LiveOptions {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

/// Options for replaying a capture file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayOptions {
    pub buffer_size: usize,
    pub batch_size: usize,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Options for saving packets to a capture file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    pub snap_len: usize,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            snap_len: DEFAULT_SNAP_LEN,
        }
    }
}
