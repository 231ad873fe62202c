use super::{Capture, CaptureError, PullPolicy};
use crate::config::LiveOptions;
use crate::source::DeviceReader;

/// Capture on a network device; empty fetches are retried after the idle
/// backoff.
pub type Live = Capture<DeviceReader>;

impl Capture<DeviceReader> {
    /// Configure and activate `device`.
    ///
    /// # Errors
    /// [`CaptureError::Source`] when libpcap rejects the device, an option
    /// or the filter, or a construction error from the options.
    pub fn open(device: &str, options: &LiveOptions) -> Result<Self, CaptureError> {
        let reader = DeviceReader::open(device, options)?;
        Capture::new(
            reader,
            options.buffer_size,
            options.batch_size,
            PullPolicy::Retry {
                backoff: options.idle_backoff(),
            },
        )
    }
}

/// Shorthand for [`Live::open`].
pub fn live(device: &str, options: &LiveOptions) -> Result<Live, CaptureError> {
    Live::open(device, options)
}
