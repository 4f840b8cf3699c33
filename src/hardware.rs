//! Hardware can be GPUs, multi-core CPUs or DSPs, or whatever else a framework enumerates. The
//! struct holds all important information about the hardware. To execute code on hardware, the
//! platform turns it into a [`Device`].
//!
//! [`Device`]: ../compute_device/struct.Device.html

/// Representation for hardware across frameworks.
#[derive(Clone, Debug)]
pub struct Hardware {
    /// The unique ID of the hardware within its framework.
    pub id: usize,
    /// Framework marker
    pub framework: &'static str,
    /// The type of compute device, such as a CPU or a GPU.
    pub kind: HardwareKind,
    /// The name.
    pub name: String,
    /// The number of compute units.
    ///
    /// A compute unit is the fundamental unit of computation. A compute device usually has
    /// multiple compute units.
    pub compute_units: usize,
    /// How the hardware addresses memory relative to the host.
    pub addressing: Addressing,
}

/// General classes for devices, used to identify the type of a device.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum HardwareKind {
    /// Used for accelerators. Accelerators can communicate with the host processor using a
    /// peripheral interconnect such as PCIe.
    Accelerator,
    /// Used for devices that are host processors. The host processor runs the implementations
    /// and is a single or multi-core CPU.
    CPU,
    /// Used for GPU devices.
    GPU,
    /// Used for anything else.
    Unknown,
}

/// How a device addresses memory.
///
/// A unified device shares the host address space, so a host buffer can be handed to it without
/// a copy. A discrete device owns a separate address space and is reached only through explicit
/// transfers.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Addressing {
    Unified,
    Discrete,
}
