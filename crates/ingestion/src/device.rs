//! Sample device trait
//!
//! The platform sensor API seen from the bus: something that can be acquired,
//! polled for readings and released. [`PolledSource`](crate::PolledSource)
//! drives a device on a dedicated producer thread.

use std::time::Duration;

use contracts::{ContractError, Sample};

/// Outcome of one device poll
#[derive(Debug, Clone, PartialEq)]
pub enum DevicePoll {
    /// A reading is available
    Sample(Sample),
    /// Nothing new this time
    Idle,
    /// The device went away; the message becomes the terminal error
    Lost(String),
}

/// Hardware / platform sensor handle
pub trait SampleDevice: Send + 'static {
    /// Acquire the device
    ///
    /// # Errors
    /// Any error here is reported to the caller of `start` as
    /// `DeviceUnavailable`.
    fn open(&mut self) -> Result<(), ContractError>;

    /// Read the next sample
    ///
    /// # Errors
    /// An error is treated like [`DevicePoll::Lost`] with the error's
    /// message.
    fn poll(&mut self) -> Result<DevicePoll, ContractError>;

    /// Release the device. Called exactly once after a successful `open`.
    fn close(&mut self) {}

    /// Delay between polls
    fn poll_interval(&self) -> Duration;
}
