//! Xylem is a tensor runtime core. It owns element storage, replicates it lazily across
//! heterogeneous compute devices, schedules asynchronous work on per-device command streams, and
//! presents shape-aware tensor views with copy-on-write semantics.
//!
//! The runtime is built from three tightly coupled pieces:
//!
//! * A multi-master replica cache (`Storage`) that maps one logical tensor to a set of
//!   per-device byte buffers, keeps them consistent through versioning, and chooses between
//!   zero-copy, host-staged, peer, and same-address-space transfers.
//! * An asynchronous per-device command stream (`Stream`) with event-based cross-stream
//!   synchronization, in-order FIFO execution, and per-tensor write-completion barriers, so user
//!   code never observes torn or premature reads.
//! * A tensor view algebra (`Tensor`, `TensorShape`) whose iterators convert n-dimensional
//!   coordinates into buffer offsets under normal, padded, and broadcast-repeated traversal
//!   without materializing intermediate storage.
//!
//! # Example
//!
//! ```
//! use xylem::prelude::*;
//!
//! let device = Platform::global().host_device();
//! let stream = device.stream().unwrap();
//!
//! let m = Tensor::<f32>::matrix(3, 2, vec![0., 1., 2., 3., 4., 5.]).unwrap();
//! assert_eq!(m.value(&[1, 1]).unwrap(), 3.0);
//! assert_eq!(m.to_vec(&stream).unwrap(), vec![0., 1., 2., 3., 4., 5.]);
//! ```

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod compute_device;
pub mod element;
pub mod error;
pub mod framework;
pub mod frameworks;
pub mod hardware;
pub mod memory;
pub mod platform;
pub mod prelude;
pub mod stream;
pub mod tensor;
