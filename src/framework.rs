//! Provides the generic functionality of a hardware-supporting framework such as the native host
//! CPU or an emulated accelerator island.
//!
//! A framework enumerates hardware and opens it as a [`Service`]: a group of devices sharing one
//! address-translation domain. The platform owns the opened services; user code reaches devices
//! through the platform rather than through frameworks directly.
//!
//! [`Service`]: ../platform/struct.Service.html

use super::error::{Error, ErrorKind, Result};
use super::hardware::Hardware;
use super::platform::Service;

/// A trait implemented for all frameworks. `Framework`s contain a list of all available
/// hardware as well as other objects specific to the implementor.
pub trait Framework: Send + Sync + 'static {
    /// Returns the name of the framework, which is mainly used for the purposes of debugging
    /// and reporting errors.
    fn name(&self) -> &'static str;
    /// Returns the cached and available hardware.
    fn hardware(&self) -> &[Hardware];
    /// Opens the enumerated hardware as a service with the provided platform-wide id.
    fn open(&self, service_id: usize) -> Result<Service>;
    /// Opens a service on a remote machine addressed by a URL.
    ///
    /// Remote services are resolved by the enclosing platform shell, not by the runtime core.
    fn open_remote(&self, service_id: usize, url: &str) -> Result<Service> {
        let _ = (service_id, url);
        let message = format!("`{}` does not resolve remote services", self.name());
        Err(Error::new(ErrorKind::DeviceUnavailable, message))
    }
}
