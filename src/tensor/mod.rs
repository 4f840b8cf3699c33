//! Tensor views over replicated storage.
//!
//! A [`Tensor`] is a cheap shape-and-offset aperture into a [`Storage`]: copying a view clones
//! the struct and bumps the shared-owner count on the storage. Many views share one storage; a
//! storage never outlives its last view and drains its queued writes before the replicas are
//! freed.
//!
//! Mutation goes through [`read_write`], which is where copy-on-write happens: a non-shared
//! view whose storage has other owners detaches onto a freshly copied storage first, so sibling
//! views keep observing the old contents. Views created as references (`is_shared`) opt out and
//! alias deliberately.
//!
//! [`Tensor`]: ./struct.Tensor.html
//! [`Storage`]: ./struct.Storage.html
//! [`read_write`]: ./struct.Tensor.html#method.read_write

pub use self::codec::{decode, encode};
pub use self::index::{ExtentBounds, IndexEntry, PaddedIndexIter, TensorIndexIter};
pub use self::shape::{MemoryLayout, PadPair, Padding, TensorShape};
pub use self::storage::Storage;
pub use self::values::{ValueSequence, ValueSequenceMut};

pub mod index;

mod codec;
mod shape;
mod storage;
mod values;

use std::sync::Arc;

use super::element::{Composite, Element};
use super::error::{ErrorKind, Result};
use super::memory::DeviceBuffer;
use super::stream::Stream;

/// The rule mapping view coordinates to data offsets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Traversal {
    /// Strides apply directly.
    Normal,
    /// Coordinates wrap by the data extent after an alignment shift (broadcast repetition).
    Repeated,
}

/// A shared-ownership view: shape, offset, optional padding, traversal rule.
#[derive(Clone, Debug)]
pub struct Tensor<T: Element> {
    storage: Arc<Storage>,
    view_shape: TensorShape,
    /// Differs from `view_shape` under broadcast repetition; equal otherwise.
    data_shape: TensorShape,
    /// In element units, from the start of the storage.
    offset: usize,
    padding: Option<Padding>,
    pad_value: T,
    /// Per-axis repetition alignment; empty means zero everywhere.
    align: Vec<usize>,
    traversal: Traversal,
    shared: bool,
}

impl<T: Element> Tensor<T> {

    fn over(
        storage: Arc<Storage>,
        view_shape: TensorShape,
        data_shape: TensorShape,
        offset: usize,
        shared: bool) -> Result<Tensor<T>> {

        let capacity = storage.capacity_for(T::KIND).ok_or(ErrorKind::IncompatibleShape)?;
        if offset + data_shape.span_count() > capacity {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        let traversal = match view_shape.extents() == data_shape.extents() {
            true => Traversal::Normal,
            _ => Traversal::Repeated,
        };

        Ok(Tensor {
            storage,
            view_shape,
            data_shape,
            offset,
            padding: None,
            pad_value: T::ZERO,
            align: Vec::new(),
            traversal,
            shared,
        })
    }

    // --- construction ---

    /// A tensor of `shape` over freshly allocated host storage initialized with `data`.
    ///
    /// Fails with `IncompatibleShape` when the scalar count disagrees with the element count.
    pub fn new<S: Into<TensorShape>>(shape: S, data: Vec<T>) -> Result<Tensor<T>> {
        let shape = shape.into();
        if shape.element_count() != data.len() {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        let storage = Arc::new(Storage::with(&data)?);
        Self::over(storage, shape.clone(), shape, 0, false)
    }

    /// A single-element tensor.
    pub fn scalar(value: T) -> Result<Tensor<T>> {
        Self::new(1usize, vec![value])
    }

    pub fn vector(data: Vec<T>) -> Result<Tensor<T>> {
        Self::new(data.len(), data)
    }

    pub fn matrix(rows: usize, columns: usize, data: Vec<T>) -> Result<Tensor<T>> {
        Self::new((rows, columns), data)
    }

    /// A matrix over `data` laid out in the provided order; iteration order is row-major
    /// either way.
    pub fn matrix_with_layout(
        rows: usize,
        columns: usize,
        data: Vec<T>,
        layout: MemoryLayout) -> Result<Tensor<T>> {

        match layout {
            MemoryLayout::RowMajor => Self::matrix(rows, columns, data),
            MemoryLayout::ColumnMajor => {
                let shape = TensorShape::column_major(vec![rows, columns]);
                if shape.element_count() != data.len() {
                    return Err(ErrorKind::IncompatibleShape.into());
                }
                let storage = Arc::new(Storage::with(&data)?);
                Self::over(storage, shape.clone(), shape, 0, false)
            }
        }
    }

    pub fn volume(depth: usize, rows: usize, columns: usize, data: Vec<T>) -> Result<Tensor<T>> {
        Self::new((depth, rows, columns), data)
    }

    pub fn nchw(n: usize, c: usize, h: usize, w: usize, data: Vec<T>) -> Result<Tensor<T>> {
        Self::new((n, c, h, w), data)
    }

    pub fn nhwc(n: usize, h: usize, w: usize, c: usize, data: Vec<T>) -> Result<Tensor<T>> {
        Self::new((n, h, w, c), data)
    }

    /// A tensor of `shape` with every element set to `value`.
    pub fn filled<S: Into<TensorShape>>(shape: S, value: T) -> Result<Tensor<T>> {
        let shape = shape.into();
        let data = vec![value; shape.element_count()];
        let storage = Arc::new(Storage::with(&data)?);
        Self::over(storage, shape.clone(), shape, 0, false)
    }

    /// A zero-filled tensor of `shape`.
    pub fn zeroed<S: Into<TensorShape>>(shape: S) -> Result<Tensor<T>> {
        Self::filled(shape, T::ZERO)
    }

    /// A tensor over a read-only copy of external contents: reads succeed everywhere, but
    /// `read_write` fails with `ReadOnlyViolation`.
    pub fn read_only_from<S: Into<TensorShape>>(shape: S, data: Vec<T>) -> Result<Tensor<T>> {
        let shape = shape.into();
        if shape.element_count() != data.len() {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        let storage = Arc::new(Storage::read_only_with(&data)?);
        Self::over(storage, shape.clone(), shape, 0, false)
    }

    /// A tensor imported from external read-write contents, behaving as a reference: the view
    /// is marked shared, so writes alias the imported storage instead of detaching.
    pub fn reference_from<S: Into<TensorShape>>(shape: S, data: Vec<T>) -> Result<Tensor<T>> {
        let shape = shape.into();
        if shape.element_count() != data.len() {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        let storage = Arc::new(Storage::with(&data)?);
        Self::over(storage, shape.clone(), shape, 0, true)
    }

    /// A broadcast view: `extents` becomes the view shape while `source`'s shape keeps
    /// describing the data; coordinates wrap by the source extents. No data is copied.
    pub fn repeating(extents: Vec<usize>, source: &Tensor<T>) -> Result<Tensor<T>> {
        Self::repeating_aligned(extents, source, Vec::new())
    }

    /// Like [`repeating`](#method.repeating), with a per-axis alignment shift applied before
    /// the wrap.
    pub fn repeating_aligned(
        extents: Vec<usize>,
        source: &Tensor<T>,
        align: Vec<usize>) -> Result<Tensor<T>> {

        let rank = source.view_shape.rank();
        if extents.len() != rank || (!align.is_empty() && align.len() != rank) {
            return Err(ErrorKind::IncompatibleShape.into());
        }
        if source.traversal == Traversal::Repeated || source.padding.is_some() {
            return Err(ErrorKind::IncompatibleShape.into());
        }
        // A nonempty repetition of an empty axis has nothing to wrap onto.
        let starved = extents.iter()
            .zip(source.view_shape.extents())
            .any(|(&target, &data)| target > 0 && data == 0);
        if starved {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        let view_shape = TensorShape::with_strides(
            extents, source.view_shape.strides().to_vec())?;

        let mut view = Self::over(
            source.storage.clone(),
            view_shape,
            source.view_shape.clone(),
            source.offset,
            source.shared)?;
        view.align = align;
        view.traversal = Traversal::Repeated;
        Ok(view)
    }

    // --- metadata ---

    pub fn shape(&self) -> &TensorShape {
        &self.view_shape
    }

    pub fn data_shape(&self) -> &TensorShape {
        &self.data_shape
    }

    pub fn rank(&self) -> usize {
        self.view_shape.rank()
    }

    /// The logical element count of the view, padding excluded.
    pub fn element_count(&self) -> usize {
        self.view_shape.element_count()
    }

    /// The element count a traversal visits, padding included.
    pub fn padded_element_count(&self) -> usize {
        match self.padding {
            Some(ref padding) => self.view_shape.padded(padding).element_count(),
            _ => self.view_shape.element_count(),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn padding(&self) -> Option<&Padding> {
        self.padding.as_ref()
    }

    pub fn pad_value(&self) -> T {
        self.pad_value
    }

    pub fn traversal(&self) -> Traversal {
        self.traversal
    }

    /// Whether this view is a deliberate alias that skips copy-on-write.
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// The traversal of this view as `(view_offset, data_offset, is_pad)` entries.
    pub fn index_iter(&self) -> TensorIndexIter {
        index::build(&self.view_shape, &self.data_shape, &self.align, self.padding.as_ref())
    }

    // --- derivations ---

    /// A window of `extents` elements starting at `offsets`, borrowing the parent's strides so
    /// the result remains a view. `is_reference` marks the sub-view as a deliberate alias so
    /// writes through it skip copy-on-write.
    pub fn sub_view(
        &self,
        offsets: &[usize],
        extents: &[usize],
        is_reference: bool) -> Result<Tensor<T>> {

        let rank = self.view_shape.rank();
        if offsets.len() != rank || extents.len() != rank {
            return Err(ErrorKind::IncompatibleShape.into());
        }
        if self.traversal == Traversal::Repeated || self.padding.is_some() {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        let inside = offsets.iter()
            .zip(extents)
            .zip(self.view_shape.extents())
            .all(|((&o, &e), &parent)| o + e <= parent);
        if !inside {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        let origin: usize = offsets.iter()
            .zip(self.view_shape.strides())
            .map(|(&o, &s)| o * s)
            .sum();
        let shape = TensorShape::with_strides(
            extents.to_vec(), self.view_shape.strides().to_vec())?;

        Self::over(
            self.storage.clone(),
            shape.clone(),
            shape,
            self.offset + origin,
            self.shared || is_reference)
    }

    /// Swaps the two inner axes of the view (and, under repetition, of the data region).
    pub fn transposed(&self) -> Result<Tensor<T>> {
        let mut view = self.clone();
        view.view_shape = self.view_shape.transposed()?;
        view.data_shape = self.data_shape.transposed()?;
        if view.align.len() >= 2 {
            let n = view.align.len();
            view.align.swap(n - 2, n - 1);
        }
        if let Some(Padding::PerAxis(ref mut pairs)) = view.padding {
            let n = pairs.len();
            pairs.swap(n - 2, n - 1);
        }
        Ok(view)
    }

    /// Collapses the axes above `axis` into it; legal only for contiguous, unpadded, normal
    /// traversal.
    pub fn flattened(&self, axis: usize) -> Result<Tensor<T>> {
        if self.traversal == Traversal::Repeated || self.padding.is_some() {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        let shape = self.view_shape.flattened(axis)?;
        let mut view = self.clone();
        view.view_shape = shape.clone();
        view.data_shape = shape;
        Ok(view)
    }

    /// A padded rendition of this view: each axis extends by its `(before, after)` pair, the
    /// padded positions read back `pad_value`, and writes to them are dropped.
    pub fn padded(&self, padding: Padding, pad_value: T) -> Result<Tensor<T>> {
        if !padding.compatible_with(self.view_shape.rank()) {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        let mut view = self.clone();
        view.padding = Some(padding);
        view.pad_value = pad_value;
        Ok(view)
    }

    /// Changes the shape without touching the data; the element counts must agree and the view
    /// must be contiguous, unpadded, normal traversal.
    pub fn reshape<S: Into<TensorShape>>(&mut self, shape: S) -> Result {
        let shape = shape.into();
        if shape.element_count() != self.view_shape.element_count()
            || self.traversal == Traversal::Repeated
            || self.padding.is_some()
            || !self.view_shape.is_contiguous() {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        self.view_shape = shape.clone();
        self.data_shape = shape;
        Ok(())
    }

    /// An alias of this view that deliberately shares the storage for writing.
    ///
    /// The storage is made unique up front (copy-on-write now rather than at the next write),
    /// and both this view and the returned alias are marked shared so later writes from either
    /// side land in the same replicas.
    pub fn reference(&mut self, stream: &Stream) -> Result<Tensor<T>> {
        self.ensure_unique(stream)?;
        self.shared = true;
        let mut alias = self.clone();
        alias.shared = true;
        Ok(alias)
    }

    // --- storage access ---

    /// Resolves a read-only replica of the backing storage on the stream's device.
    pub fn read(&self, stream: &Stream) -> Result<Arc<DeviceBuffer>> {
        self.storage.read(stream)
    }

    /// Resolves the writable master replica on the stream's device, detaching first when the
    /// storage has other (non-reference) owners.
    pub fn read_write(&mut self, stream: &Stream) -> Result<Arc<DeviceBuffer>> {
        self.ensure_unique(stream)?;
        self.storage.read_write(stream)
    }

    /// Like [`read_write`](#method.read_write) but skips the migration; the caller promises to
    /// overwrite every element.
    pub fn write_only(&mut self, stream: &Stream) -> Result<Arc<DeviceBuffer>> {
        self.ensure_unique(stream)?;
        self.storage.write_only(stream)
    }

    fn ensure_unique(&mut self, stream: &Stream) -> Result {
        if self.shared || Arc::strong_count(&self.storage) == 1 {
            return Ok(());
        }

        debug!("copy-on-write detach of {} element(s)", self.storage.count());
        let duplicate = self.storage.duplicate(stream)?;
        duplicate.mark_mutated();
        self.storage = Arc::new(duplicate);
        Ok(())
    }

    // --- host-side access ---

    /// The value at `coord` (padded coordinates included), fetched through the host replica.
    ///
    /// This is the blocking host-fetch path: the caller thread waits for the writer stream.
    pub fn value(&self, coord: &[usize]) -> Result<T> {
        match self.locate(coord)? {
            None => Ok(self.pad_value),
            Some(data_offset) => {
                let replica = self.storage.read_host()?;
                // `read_host` drained the writer; the region is quiescent.
                Ok(unsafe { replica.as_slice::<T>()[self.offset + data_offset] })
            }
        }
    }

    /// Writes the value at `coord`, bumping the master version. Writes to padded coordinates
    /// are dropped.
    pub fn set(&mut self, coord: &[usize], value: T, stream: &Stream) -> Result {
        match self.locate(coord)? {
            None => Ok(()),
            Some(data_offset) => {
                let replica = self.read_write(stream)?;
                stream.block_until_idle()?;
                unsafe { replica.as_mut_slice::<T>()[self.offset + data_offset] = value }
                Ok(())
            }
        }
    }

    /// Maps a coordinate of the (padded) view to a data offset; `None` marks a padded
    /// position.
    fn locate(&self, coord: &[usize]) -> Result<Option<usize>> {
        let rank = self.view_shape.rank();
        if coord.len() != rank {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        let mut offset = 0;
        for axis in 0..rank {
            let pair = self.padding.as_ref().map(|p| p.pair(axis)).unwrap_or_default();
            let extent = self.view_shape.extents()[axis];

            let c = coord[axis];
            if c >= pair.before + extent + pair.after {
                return Err(ErrorKind::IncompatibleShape.into());
            }
            if c < pair.before || c >= pair.before + extent {
                return Ok(None);
            }

            let inner = c - pair.before;
            let data_extent = self.data_shape.extents()[axis].max(1);
            let align = self.align.get(axis).copied().unwrap_or(0);
            offset += ((inner + align) % data_extent) * self.data_shape.strides()[axis];
        }
        Ok(Some(offset))
    }

    /// Migrates to the stream's device and adapts the traversal to the replica as a read-only
    /// value sequence. Drains the stream first so host-side reads are ordered.
    pub fn values(&self, stream: &Stream) -> Result<ValueSequence<T>> {
        let buffer = self.storage.read(stream)?;
        stream.block_until_idle()?;
        Ok(ValueSequence::new(buffer, self.index_iter(), self.offset, self.pad_value))
    }

    /// The writable counterpart of [`values`](#method.values); detaches non-shared views with
    /// other owners first.
    pub fn mutable_values(&mut self, stream: &Stream) -> Result<ValueSequenceMut<T>> {
        let buffer = self.read_write(stream)?;
        stream.block_until_idle()?;
        Ok(ValueSequenceMut::new(buffer, self.index_iter(), self.offset, self.pad_value))
    }

    /// Collects the traversal (padding included) into a host vector.
    pub fn to_vec(&self, stream: &Stream) -> Result<Vec<T>> {
        Ok(self.values(stream)?.collect())
    }

    /// Overwrites the view from an iterator in traversal order; values landing on padded
    /// positions are dropped.
    pub fn assign<I>(&mut self, values: I, stream: &Stream) -> Result
        where I: IntoIterator<Item = T> {

        let mut sequence = self.mutable_values(stream)?;
        sequence.assign(values);
        Ok(())
    }
}

impl<T: Composite> Tensor<T> {

    /// Reinterprets a composite tensor as a tensor of its scalar components: a zero-copy
    /// reshape appending one axis of `COMPONENTS`. Legal for unpadded, normal traversal.
    pub fn components(&self) -> Result<Tensor<T::Component>> {
        if self.traversal == Traversal::Repeated || self.padding.is_some() {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        let parts = T::COMPONENTS;
        let mut extents = self.view_shape.extents().to_vec();
        let mut strides: Vec<usize> = self.view_shape.strides().iter().map(|s| s * parts).collect();
        extents.push(parts);
        strides.push(1);

        let shape = TensorShape::with_strides(extents, strides)?;
        Tensor::over(
            self.storage.clone(),
            shape.clone(),
            shape,
            self.offset * parts,
            self.shared)
    }
}
