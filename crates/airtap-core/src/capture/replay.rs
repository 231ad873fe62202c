use std::path::Path;

use super::{Capture, CaptureError, PullPolicy};
use crate::config::ReplayOptions;
use crate::source::PcapFileReader;

/// Capture over a saved file; closes itself at end of data.
pub type Replay = Capture<PcapFileReader>;

impl Capture<PcapFileReader> {
    /// Open a pcap or pcapng file for replay.
    ///
    /// # Errors
    /// [`CaptureError::Source`] when the file cannot be opened or has no
    /// usable header, or a construction error from the options.
    pub fn open(path: impl AsRef<Path>, options: &ReplayOptions) -> Result<Self, CaptureError> {
        let reader = PcapFileReader::open(path.as_ref())?;
        Capture::new(
            reader,
            options.buffer_size,
            options.batch_size,
            PullPolicy::CloseOnEmpty,
        )
    }
}

/// Shorthand for [`Replay::open`].
pub fn replay(path: impl AsRef<Path>, options: &ReplayOptions) -> Result<Replay, CaptureError> {
    Replay::open(path, options)
}
