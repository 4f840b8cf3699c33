//! Emulated accelerator islands.
//!
//! Each island opens as one service whose devices use discrete addressing but are backed by
//! ordinary host allocations. Buffers still move only through the copy primitives, so the
//! runtime exercises the same migration routes a real accelerator would: host-to-device,
//! device-to-host, peer within an island, and host-staged between islands.

use std::sync::Arc;
use std::time::Duration;

use super::super::compute_device::Device;
use super::super::error::{Error, ErrorKind, Result};
use super::super::framework::Framework;
use super::super::hardware::{Addressing, Hardware, HardwareKind};
use super::super::platform::Service;

/// Blocking waits against emulated devices are bugs, not latency; keep the deadline short
/// enough that a wedged test fails instead of hanging.
const WAIT_DEADLINE: Duration = Duration::from_secs(10);

/// An island of discrete-addressing devices backed by host memory.
#[derive(Clone, Debug)]
pub struct Emulated {
    hardware: Vec<Hardware>,
}

impl Emulated {

    /// Enumerates an island of `device_count` devices.
    pub fn new(device_count: usize) -> Result<Emulated> {
        if device_count == 0 {
            return Err(Error::new(ErrorKind::DeviceUnavailable, "an island needs a device"));
        }

        let hardware = (0..device_count)
            .map(|id| Hardware {
                id,
                framework: "emulated",
                kind: HardwareKind::Accelerator,
                name: format!("Emulated accelerator {}", id),
                compute_units: 1,
                addressing: Addressing::Discrete,
            })
            .collect();

        Ok(Emulated { hardware })
    }
}

impl Framework for Emulated {

    fn name(&self) -> &'static str {
        "emulated"
    }

    fn hardware(&self) -> &[Hardware] {
        &self.hardware
    }

    fn open(&self, service_id: usize) -> Result<Service> {
        let devices = self.hardware.iter()
            .map(|h| Arc::new(Device::activate(service_id, h.id, h, Some(WAIT_DEADLINE))))
            .collect();

        Ok(Service::new(service_id, self.name(), devices))
    }
}
