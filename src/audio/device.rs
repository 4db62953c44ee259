//! Audio device enumeration and selection

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};

use crate::error::DeviceError;

/// How a session picks its capture or playback device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceSelector {
    /// Platform default input/output device
    #[default]
    Default,
    /// Exact device name as reported by [`list_devices`]
    Name(String),
    /// Run the session without a device; the caller drives the frame
    /// endpoints itself
    Disabled,
}

/// Device description handed to the front end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_input: bool,
    pub is_output: bool,
    pub is_default: bool,
}

/// List all available audio devices
pub fn list_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let default_input_name = host.default_input_device().and_then(|d| d.name().ok());
    let default_output_name = host.default_output_device().and_then(|d| d.name().ok());

    if let Ok(input_devices) = host.input_devices() {
        for device in input_devices {
            if let Ok(name) = device.name() {
                let is_default = default_input_name.as_ref() == Some(&name);
                devices.push(AudioDeviceInfo {
                    name,
                    is_input: true,
                    is_output: false,
                    is_default,
                });
            }
        }
    }

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let Ok(name) = device.name() {
                let is_default = default_output_name.as_ref() == Some(&name);
                if let Some(existing) = devices.iter_mut().find(|d| d.name == name) {
                    existing.is_output = true;
                    existing.is_default |= is_default;
                } else {
                    devices.push(AudioDeviceInfo {
                        name,
                        is_input: false,
                        is_output: true,
                        is_default,
                    });
                }
            }
        }
    }

    devices
}

/// Resolve a selector to a concrete input device
pub fn resolve_input(selector: &DeviceSelector) -> Result<cpal::Device, DeviceError> {
    let host = cpal::default_host();
    match selector {
        DeviceSelector::Default => host
            .default_input_device()
            .ok_or_else(|| DeviceError::NotFound("no default input device".into())),
        DeviceSelector::Name(name) => find_by_name(host.input_devices(), name),
        DeviceSelector::Disabled => Err(DeviceError::NotFound("device disabled".into())),
    }
}

/// Resolve a selector to a concrete output device
pub fn resolve_output(selector: &DeviceSelector) -> Result<cpal::Device, DeviceError> {
    let host = cpal::default_host();
    match selector {
        DeviceSelector::Default => host
            .default_output_device()
            .ok_or_else(|| DeviceError::NotFound("no default output device".into())),
        DeviceSelector::Name(name) => find_by_name(host.output_devices(), name),
        DeviceSelector::Disabled => Err(DeviceError::NotFound("device disabled".into())),
    }
}

fn find_by_name<I>(
    devices: Result<I, cpal::DevicesError>,
    name: &str,
) -> Result<cpal::Device, DeviceError>
where
    I: Iterator<Item = cpal::Device>,
{
    let devices = devices.map_err(|e| DeviceError::NotFound(e.to_string()))?;
    for device in devices {
        if device.name().map(|n| n == name).unwrap_or(false) {
            return Ok(device);
        }
    }
    Err(DeviceError::NotFound(name.to_string()))
}
