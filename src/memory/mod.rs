//! Provides a unified representation of memory across devices.
//!
//! A [`DeviceBuffer`] is one contiguous byte region on one device, together with the replica
//! version it last satisfied. All copy primitives are asynchronous (they enqueue onto a stream)
//! except [`copy_to_host`], which drains the stream and is therefore a synchronous boundary.
//! Copies never advance versions; versioning is controlled by the owning storage.
//!
//! [`DeviceBuffer`]: ./struct.DeviceBuffer.html
//! [`copy_to_host`]: ./struct.DeviceBuffer.html#method.copy_to_host

use std::alloc;
use std::ptr::{self, NonNull};
use std::slice;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use super::compute_device::Device;
use super::element::Element;
use super::error::{Error, ErrorKind, Result};
use super::stream::Stream;

/// The version carried by a replica that has never been written.
pub const UNINITIALIZED: i64 = -1;

/// Every region is aligned generously enough for the widest element kind, so a buffer can be
/// reinterpreted as any element type without a realignment copy.
const ALIGNMENT: usize = 16;

/// A raw, fixed-size, aligned byte region.
///
/// Regions are zero-filled on allocation: a replica of a never-written storage is a valid zero
/// initializer, so reads must not observe garbage.
pub(crate) struct Bytes {
    ptr: NonNull<u8>,
    size: usize,
}

// The region is plain host memory; synchronized access is the stream/event discipline's job.
unsafe impl Send for Bytes { }
unsafe impl Sync for Bytes { }

impl Bytes {

    fn allocate(size: usize) -> Result<Bytes> {
        if size == 0 {
            return Ok(Bytes { ptr: NonNull::new(ALIGNMENT as *mut u8).unwrap(), size: 0 });
        }

        let layout = alloc::Layout::from_size_align(size, ALIGNMENT)
            .map_err(|e| Error::new(ErrorKind::MemoryAllocationFailed, e.to_string()))?;

        match NonNull::new(unsafe { alloc::alloc_zeroed(layout) }) {
            Some(ptr) => Ok(Bytes { ptr, size }),
            _ => Err(ErrorKind::MemoryAllocationFailed.into()),
        }
    }

    pub(crate) unsafe fn slice(&self) -> &[u8] {
        slice::from_raw_parts(self.ptr.as_ptr(), self.size)
    }

    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slice_mut(&self) -> &mut [u8] {
        slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size)
    }
}

impl Drop for Bytes {

    fn drop(&mut self) {
        if self.size > 0 {
            let layout = alloc::Layout::from_size_align(self.size, ALIGNMENT).unwrap();
            unsafe { alloc::dealloc(self.ptr.as_ptr(), layout) }
        }
    }
}

/// A contiguous byte region on one device.
pub struct DeviceBuffer {
    device: Arc<Device>,
    bytes: Arc<Bytes>,
    /// The storage `master_version` this replica last satisfied; [`UNINITIALIZED`] until then.
    version: AtomicI64,
}

impl DeviceBuffer {

    pub(crate) fn allocate(device: Arc<Device>, size: usize) -> Result<DeviceBuffer> {
        let bytes = Arc::new(Bytes::allocate(size)?);
        Ok(DeviceBuffer { device, bytes, version: AtomicI64::new(UNINITIALIZED) })
    }

    /// A zero-copy alias of `source` presented as a buffer of `device`.
    ///
    /// Legal only between devices sharing the host address space (unified addressing on both
    /// sides); the alias shares the underlying region and carries its own version.
    pub(crate) fn alias(device: Arc<Device>, source: &DeviceBuffer) -> DeviceBuffer {
        DeviceBuffer {
            device,
            bytes: source.bytes.clone(),
            version: AtomicI64::new(UNINITIALIZED),
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn size(&self) -> usize {
        self.bytes.size
    }

    pub fn version(&self) -> i64 {
        self.version.load(Ordering::Acquire)
    }

    pub(crate) fn set_version(&self, version: i64) {
        self.version.store(version, Ordering::Release)
    }

    /// Returns `true` if `self` and `other` are windows onto the same region (a unified-unified
    /// alias rather than a copy).
    pub fn shares_region_with(&self, other: &DeviceBuffer) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }

    /// Views the raw bytes.
    ///
    /// # Safety
    ///
    /// The caller must hold the ordering guarantees for this region: either the owning stream
    /// has drained, or the call happens inside a closure on the stream all writers enqueue to.
    pub unsafe fn bytes(&self) -> &[u8] {
        self.bytes.slice()
    }

    /// Views the raw bytes mutably. Same contract as [`bytes`](#method.bytes), for writers.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn bytes_mut(&self) -> &mut [u8] {
        self.bytes.slice_mut()
    }

    /// Views the region as a slice of elements. Same contract as [`bytes`](#method.bytes).
    pub unsafe fn as_slice<T: Element>(&self) -> &[T] {
        let size = T::KIND.size();
        debug_assert_eq!(self.bytes.size % size, 0);
        slice::from_raw_parts(self.bytes.ptr.as_ptr() as *const T, self.bytes.size / size)
    }

    /// Views the region as a mutable slice of elements. Same contract as
    /// [`bytes_mut`](#method.bytes_mut).
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn as_mut_slice<T: Element>(&self) -> &mut [T] {
        let size = T::KIND.size();
        debug_assert_eq!(self.bytes.size % size, 0);
        slice::from_raw_parts_mut(self.bytes.ptr.as_ptr() as *mut T, self.bytes.size / size)
    }

    /// Enqueues an asynchronous clear of the whole region.
    pub fn zero(&self, stream: &Stream) -> Result {
        let bytes = self.bytes.clone();
        stream.enqueue(move || {
            unsafe { ptr::write_bytes(bytes.ptr.as_ptr(), 0, bytes.size) }
            Ok(())
        })
    }

    /// Enqueues an asynchronous copy of `source` into this region.
    ///
    /// Valid only when both buffers live on the same service; the semantics are a peer copy.
    pub fn copy_from_device(&self, source: &DeviceBuffer, stream: &Stream) -> Result {
        if self.device.service_id() != source.device.service_id() {
            let message = format!(
                "peer copies require a shared service ({} vs {})",
                source.device.key(), self.device.key());
            return Err(Error::new(ErrorKind::DeviceUnavailable, message));
        }
        self.schedule_copy(source, stream)
    }

    /// Enqueues an asynchronous host-to-device copy of `source` into this region.
    pub fn copy_from_host(&self, source: Vec<u8>, stream: &Stream) -> Result {
        if source.len() != self.bytes.size {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        let bytes = self.bytes.clone();
        stream.enqueue(move || {
            unsafe { bytes.slice_mut().copy_from_slice(&source) }
            Ok(())
        })
    }

    /// Copies the region out to host memory: enqueues the transfer and waits for the stream to
    /// drain. This is a synchronous boundary.
    pub fn copy_to_host(&self, destination: &mut [u8], stream: &Stream) -> Result {
        if destination.len() != self.bytes.size {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        stream.block_until_idle()?;
        destination.copy_from_slice(unsafe { self.bytes.slice() });
        Ok(())
    }

    // Shared by the peer and host-staged routes; `source` and `self` may live anywhere since
    // the backing regions are host allocations either way.
    pub(crate) fn schedule_copy(&self, source: &DeviceBuffer, stream: &Stream) -> Result {
        if source.bytes.size != self.bytes.size {
            return Err(ErrorKind::IncompatibleShape.into());
        }
        if Arc::ptr_eq(&source.bytes, &self.bytes) {
            // Aliased regions already agree.
            return Ok(());
        }

        let from = source.bytes.clone();
        let to = self.bytes.clone();
        stream.enqueue(move || {
            unsafe { to.slice_mut().copy_from_slice(from.slice()) }
            Ok(())
        })
    }
}

impl std::fmt::Debug for DeviceBuffer {

    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("device", &self.device.key())
            .field("size", &self.bytes.size)
            .field("version", &self.version())
            .finish()
    }
}
