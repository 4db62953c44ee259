//! Audio subsystem module

pub mod buffer;
pub mod capture;
pub mod device;
pub mod frame;
pub mod playback;

pub use buffer::JitterBuffer;
pub use capture::CaptureStream;
pub use device::{list_devices, AudioDeviceInfo, DeviceSelector};
pub use frame::AudioFrame;
pub use playback::PlaybackStream;

use crate::error::DeviceError;

/// A running platform audio endpoint (capture or playback stream).
///
/// The platform layer invokes its callback on a real-time clock; the
/// endpoint's only obligation toward the core is bounded, non-blocking work
/// inside that callback. Implementations report asynchronous stream errors
/// through [`AudioEndpoint::take_error`].
pub trait AudioEndpoint: Send {
    /// Stop the underlying stream and release the device. Idempotent.
    fn stop(&mut self);

    /// Drain one pending asynchronous device error, if any.
    fn take_error(&self) -> Option<DeviceError>;
}
