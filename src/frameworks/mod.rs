//! Built-in frameworks.
//!
//! The native host CPU is always present. The emulated accelerator islands are host-memory
//! stand-ins with discrete addressing; they exist so the peer and host-staged migration routes
//! can run without a driver plugged into the platform shell.

pub use self::native::Native;

#[cfg(feature = "emulated")]
pub use self::emulated::Emulated;

mod native;

#[cfg(feature = "emulated")]
mod emulated;
