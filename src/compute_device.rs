//! Provides a representation for one or many ready to use compute devices.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::error::Result;
use super::hardware::{Addressing, Hardware, HardwareKind};
use super::memory::DeviceBuffer;
use super::stream::Stream;

/// Identifies one device within the platform: the owning service plus the device's index
/// within it. Replica dictionaries are keyed by this.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DeviceKey {
    pub service: usize,
    pub device: usize,
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.service, self.device)
    }
}

/// A device capable of processing data.
///
/// Devices create byte buffers and command streams. All blocking waits against work queued for
/// this device inherit [`timeout`](#method.timeout); `None` means wait forever by policy.
#[derive(Debug)]
pub struct Device {
    service_id: usize,
    device_id: usize,
    name: String,
    kind: HardwareKind,
    addressing: Addressing,
    timeout: Option<Duration>,
}

impl Device {

    /// Activates a piece of enumerated hardware as device `device_id` of service `service_id`.
    pub fn activate(
        service_id: usize,
        device_id: usize,
        hardware: &Hardware,
        timeout: Option<Duration>) -> Device {

        Device {
            service_id,
            device_id,
            name: hardware.name.clone(),
            kind: hardware.kind,
            addressing: hardware.addressing,
            timeout,
        }
    }

    pub fn key(&self) -> DeviceKey {
        DeviceKey { service: self.service_id, device: self.device_id }
    }

    pub fn service_id(&self) -> usize {
        self.service_id
    }

    pub fn device_id(&self) -> usize {
        self.device_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> HardwareKind {
        self.kind
    }

    pub fn addressing(&self) -> Addressing {
        self.addressing
    }

    /// The deadline applied to blocking waits against this device's work.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Allocates a byte region of the requested `size` on this device.
    pub fn allocate(self: &Arc<Device>, size: usize) -> Result<Arc<DeviceBuffer>> {
        DeviceBuffer::allocate(self.clone(), size).map(Arc::new)
    }

    /// Creates a command stream bound to this device.
    pub fn stream(self: &Arc<Device>) -> Result<Stream> {
        Stream::open(self.clone())
    }
}
