//! A convenience module re-exporting the commonly used surface.
//!
//! ```
//! use xylem::prelude::*;
//! ```

pub use super::compute_device::{Device, DeviceKey};
pub use super::element::{Composite, Element, ElementKind, Rgb, Rgba, ScalarKind, Stereo};
pub use super::error::{Error, ErrorKind, Result};
pub use super::framework::Framework;
pub use super::hardware::{Addressing, Hardware, HardwareKind};
pub use super::memory::DeviceBuffer;
pub use super::platform::{Platform, Service};
pub use super::stream::{Event, Stream};
pub use super::tensor::{
    decode, encode, MemoryLayout, PadPair, Padding, Storage, Tensor, TensorShape,
};
pub use super::tensor::Traversal;
