//! The process-wide platform: enumerated services, opened devices, and default selection.
//!
//! The platform is a passive registry. Streams and storages own their concurrency; the
//! singleton only hands out device handles, so there is nothing to tear down at exit beyond
//! the drops user code already performs.

use std::sync::Arc;

use super::compute_device::{Device, DeviceKey};
use super::error::{Error, ErrorKind, Result};
use super::framework::Framework;
use super::frameworks::Native;

#[cfg(feature = "emulated")]
use super::frameworks::Emulated;

lazy_static! {
    static ref GLOBAL: Platform = Platform::initialize();
}

/// A group of devices opened from one framework, sharing one address-translation domain.
///
/// Peer copies are legal within a service; between services, transfers stage through the host.
#[derive(Debug)]
pub struct Service {
    id: usize,
    framework: &'static str,
    devices: Vec<Arc<Device>>,
}

impl Service {

    pub(crate) fn new(id: usize, framework: &'static str, devices: Vec<Arc<Device>>) -> Service {
        Service { id, framework, devices }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// The name of the framework that opened this service.
    pub fn framework(&self) -> &'static str {
        self.framework
    }

    pub fn devices(&self) -> &[Arc<Device>] {
        &self.devices
    }
}

/// The selection policy the default-device walk follows.
#[derive(Clone, Debug)]
pub struct Configuration {
    /// Framework names in preference order.
    pub service_priority: Vec<&'static str>,
    /// Device indices in preference order; only the first entry participates in the walk.
    pub device_id_priority: Vec<usize>,
}

impl Default for Configuration {

    fn default() -> Configuration {
        Configuration {
            service_priority: vec!["emulated", "native"],
            device_id_priority: vec![0],
        }
    }
}

/// The process-wide platform.
pub struct Platform {
    services: Vec<Service>,
    configuration: Configuration,
}

impl Platform {

    /// Returns the process-wide platform, enumerating services on first use.
    pub fn global() -> &'static Platform {
        &GLOBAL
    }

    fn initialize() -> Platform {
        let mut services = Vec::new();

        let native = Native::new().expect("the host CPU must enumerate");
        services.push(native.open(services.len()).expect("the host CPU must open"));

        #[cfg(feature = "emulated")]
        {
            // Two islands: one with a peer pair, one lone device, so every migration route
            // (peer within a service, host-staged between services) is reachable.
            for &device_count in &[2usize, 1] {
                match Emulated::new(device_count).and_then(|f| f.open(services.len())) {
                    Ok(service) => services.push(service),
                    Err(error) => warn!("skipping an emulated island: {}", error),
                }
            }
        }

        info!(
            "[XYLEM] Platform initialized with {} service(s): {}",
            services.len(),
            services.iter()
                .map(|s| format!("{}#{}({})", s.framework(), s.id(), s.devices().len()))
                .collect::<Vec<_>>()
                .join(", "));

        Platform { services, configuration: Configuration::default() }
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// The first service opened by the framework with the provided `name`.
    pub fn service_named(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.framework() == name)
    }

    /// Resolves a device key, failing with `DeviceUnavailable` when absent.
    pub fn device(&self, key: DeviceKey) -> Result<Arc<Device>> {
        self.services.get(key.service)
            .and_then(|s| s.devices().get(key.device))
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::DeviceUnavailable, format!("no device {}", key)))
    }

    /// The host CPU device, guaranteed to exist.
    pub fn host_device(&self) -> Arc<Device> {
        self.service_named("native")
            .and_then(|s| s.devices().first())
            .cloned()
            .expect("the host CPU is always enumerated")
    }

    /// Walks `service_priority` in order; for each matching service, returns the device at
    /// `device_id_priority[0]` if present, else that index modulo the device count. Falls back
    /// to the host CPU.
    pub fn default_device(&self) -> Arc<Device> {
        let preferred = self.configuration.device_id_priority.first().copied().unwrap_or(0);

        for name in &self.configuration.service_priority {
            let service = match self.service_named(name) {
                Some(service) if !service.devices().is_empty() => service,
                _ => continue,
            };

            let devices = service.devices();
            let device = devices.get(preferred)
                .unwrap_or_else(|| &devices[preferred % devices.len()]);
            return device.clone();
        }

        self.host_device()
    }

    /// Opens a service on a remote machine addressed by a URL.
    ///
    /// Remote services are resolved by the enclosing platform shell; the core always refuses.
    pub fn open_remote(&self, url: &str) -> Result<Service> {
        let message = format!("remote services are resolved by the platform shell: {}", url);
        Err(Error::new(ErrorKind::DeviceUnavailable, message))
    }
}
