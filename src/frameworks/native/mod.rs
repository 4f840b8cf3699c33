//! The native host CPU framework.

use std::sync::Arc;
use std::thread;

use super::super::compute_device::Device;
use super::super::error::Result;
use super::super::framework::Framework;
use super::super::hardware::{Addressing, Hardware, HardwareKind};
use super::super::platform::Service;

/// The host CPU, exposed as a single unified-addressing device.
///
/// This framework is guaranteed to open: the host is the fallback of every selection walk and
/// the staging point of cross-service transfers.
#[derive(Clone, Debug)]
pub struct Native {
    hardware: Vec<Hardware>,
}

impl Native {

    pub fn new() -> Result<Native> {
        let compute_units = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);

        let hardware = vec![Hardware {
            id: 0,
            framework: "native",
            kind: HardwareKind::CPU,
            name: String::from("Host CPU"),
            compute_units,
            addressing: Addressing::Unified,
        }];

        Ok(Native { hardware })
    }
}

impl Framework for Native {

    fn name(&self) -> &'static str {
        "native"
    }

    fn hardware(&self) -> &[Hardware] {
        &self.hardware
    }

    fn open(&self, service_id: usize) -> Result<Service> {
        let devices = self.hardware.iter()
            .map(|h| Arc::new(Device::activate(service_id, h.id, h, None)))
            .collect();

        Ok(Service::new(service_id, self.name(), devices))
    }
}
