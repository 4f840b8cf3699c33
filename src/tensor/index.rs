//! Index iterators: convert a linear visit of a logical view into buffer offsets.
//!
//! Every entry is a `(view_offset, data_offset, is_pad)` triple. The rank-specialized iterators
//! cover unpadded scalar/vector/matrix/volume traversal; the general iterator handles any rank
//! plus padding. Both families support broadcast repetition by wrapping coordinates with
//! `(coord + align) % data_extent`, and both reposition in O(rank) with repeated `div_rem`
//! rather than stepping.

use num::integer::div_rem;

use super::shape::{default_strides, Padding, TensorShape};

/// One visited position of a traversal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IndexEntry {
    /// The linear visit position within the (padded) view.
    pub view_offset: usize,
    /// The element offset within the data region; meaningless when `is_pad` is set.
    pub data_offset: usize,
    /// Set for synthesized padding positions.
    pub is_pad: bool,
}

/// Per-axis traversal bounds.
#[derive(Clone, Copy, Debug)]
pub struct ExtentBounds {
    pub align: usize,
    pub view_extent: usize,
    pub view_stride: usize,
    pub data_extent: usize,
    pub data_stride: usize,
}

impl ExtentBounds {

    fn data_position(&self, coord: usize) -> usize {
        ((coord + self.align) % self.data_extent) * self.data_stride
    }
}

macro_rules! ranked_index_iter {
    ($(#[$doc:meta])* $name:ident, $rank:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug)]
        pub struct $name {
            bounds: [ExtentBounds; $rank],
            coords: [usize; $rank],
            index: usize,
            count: usize,
        }

        impl $name {

            pub fn new(bounds: [ExtentBounds; $rank]) -> $name {
                let count = bounds.iter().map(|b| b.view_extent).product();
                $name { bounds, coords: [0; $rank], index: 0, count }
            }

            pub fn len(&self) -> usize {
                self.count
            }

            pub fn is_empty(&self) -> bool {
                self.count == 0
            }

            /// The entry at an absolute visit position, independent of the cursor.
            pub fn entry_at(&self, index: usize) -> Option<IndexEntry> {
                if index >= self.count {
                    return None;
                }

                let mut remaining = index;
                let mut data_offset = 0;
                for axis in (0..$rank).rev() {
                    let (rest, coord) = div_rem(remaining, self.bounds[axis].view_extent);
                    data_offset += self.bounds[axis].data_position(coord);
                    remaining = rest;
                }
                Some(IndexEntry { view_offset: index, data_offset, is_pad: false })
            }

            /// Repositions the cursor `by` entries forward using per-axis `div_rem` instead of
            /// stepping.
            pub fn advance(&mut self, by: usize) {
                self.index = (self.index + by).min(self.count);
                if self.count == 0 {
                    return;
                }

                let mut remaining = self.index.min(self.count - 1);
                for axis in (0..$rank).rev() {
                    let (rest, coord) = div_rem(remaining, self.bounds[axis].view_extent);
                    self.coords[axis] = coord;
                    remaining = rest;
                }
            }

            pub fn advanced(mut self, by: usize) -> $name {
                self.advance(by);
                self
            }

            fn current(&self) -> IndexEntry {
                let mut view_offset = 0;
                let mut data_offset = 0;
                for axis in 0..$rank {
                    view_offset += self.coords[axis] * self.bounds[axis].view_stride;
                    data_offset += self.bounds[axis].data_position(self.coords[axis]);
                }
                IndexEntry { view_offset, data_offset, is_pad: false }
            }

            fn step(&mut self) {
                for axis in (0..$rank).rev() {
                    self.coords[axis] += 1;
                    if self.coords[axis] < self.bounds[axis].view_extent {
                        return;
                    }
                    self.coords[axis] = 0;
                }
            }
        }

        impl Iterator for $name {
            type Item = IndexEntry;

            fn next(&mut self) -> Option<IndexEntry> {
                if self.index >= self.count {
                    return None;
                }

                let entry = self.current();
                self.step();
                self.index += 1;
                Some(entry)
            }

            fn nth(&mut self, n: usize) -> Option<IndexEntry> {
                self.advance(n);
                self.next()
            }

            fn size_hint(&self) -> (usize, Option<usize>) {
                let remaining = self.count - self.index;
                (remaining, Some(remaining))
            }
        }

        impl ExactSizeIterator for $name { }
    }
}

ranked_index_iter!(
    /// Traversal of a single position.
    ScalarIndexIter, 1);
ranked_index_iter!(
    /// Rank-1 traversal.
    VectorIndexIter, 1);
ranked_index_iter!(
    /// Rank-2 traversal.
    MatrixIndexIter, 2);
ranked_index_iter!(
    /// Rank-3 traversal.
    VolumeIndexIter, 3);

#[derive(Clone, Debug)]
struct ExtentPosition {
    /// The padded traversal extent: `before + view_extent + after`.
    extent: usize,
    pad_before: usize,
    /// Where the after-padding begins: `before + view_extent`.
    pad_end: usize,
    data_extent: usize,
    data_stride: usize,
    align: usize,
    coord: usize,
    /// This axis's current term of the data offset; zero while padded.
    contribution: usize,
    /// Whether this axis is padded at `coord`, including the parent cascade.
    is_pad: bool,
}

/// General n-dimensional traversal with padding.
///
/// When the coordinate of an axis falls inside its before- or after-padding, the axis and every
/// inner axis are padded (the parent flag cascades inward). Data coordinates wrap by
/// `data_extent`, which is what makes broadcast repetition work under the same iterator.
#[derive(Clone, Debug)]
pub struct PaddedIndexIter {
    axes: Vec<ExtentPosition>,
    index: usize,
    count: usize,
    data_offset: usize,
}

impl PaddedIndexIter {

    pub fn new(bounds: Vec<ExtentBounds>, padding: Option<&Padding>) -> PaddedIndexIter {
        let axes: Vec<ExtentPosition> = bounds.iter()
            .enumerate()
            .map(|(axis, b)| {
                let pair = padding.map(|p| p.pair(axis)).unwrap_or_default();
                ExtentPosition {
                    extent: pair.before + b.view_extent + pair.after,
                    pad_before: pair.before,
                    pad_end: pair.before + b.view_extent,
                    data_extent: b.data_extent.max(1),
                    data_stride: b.data_stride,
                    align: b.align,
                    coord: 0,
                    contribution: 0,
                    is_pad: false,
                }
            })
            .collect();

        let count = match axes.len() {
            0 => 0,
            _ => axes.iter().map(|a| a.extent).product(),
        };

        let mut iter = PaddedIndexIter { axes, index: 0, count, data_offset: 0 };
        if iter.count > 0 {
            iter.refresh_from(0);
        }
        iter
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Re-derives pad flags and offset contributions for `from` and every inner axis, after
    /// their coordinates changed.
    fn refresh_from(&mut self, from: usize) {
        let mut parent_pad = match from {
            0 => false,
            f => self.axes[f - 1].is_pad,
        };

        for axis in from..self.axes.len() {
            let position = &mut self.axes[axis];
            let in_pad = parent_pad
                || position.coord < position.pad_before
                || position.coord >= position.pad_end;

            let contribution = match in_pad {
                true => 0,
                _ => {
                    let inner = position.coord - position.pad_before;
                    ((inner + position.align) % position.data_extent) * position.data_stride
                }
            };

            self.data_offset = self.data_offset - position.contribution + contribution;
            position.contribution = contribution;
            position.is_pad = in_pad;
            parent_pad = in_pad;
        }
    }

    fn step(&mut self) {
        let rank = self.axes.len();
        let mut lowest = 0;
        for axis in (0..rank).rev() {
            self.axes[axis].coord += 1;
            lowest = axis;
            if self.axes[axis].coord < self.axes[axis].extent {
                break;
            }
            self.axes[axis].coord = 0;
        }
        self.refresh_from(lowest);
    }

    fn current(&self) -> IndexEntry {
        let is_pad = self.axes.last().map(|a| a.is_pad).unwrap_or(false);
        IndexEntry { view_offset: self.index, data_offset: self.data_offset, is_pad }
    }

    /// The entry at an absolute visit position, independent of the cursor.
    pub fn entry_at(&self, index: usize) -> Option<IndexEntry> {
        if index >= self.count {
            return None;
        }

        let rank = self.axes.len();
        let mut coords = vec![0; rank];
        let mut remaining = index;
        for axis in (0..rank).rev() {
            let (rest, coord) = div_rem(remaining, self.axes[axis].extent);
            coords[axis] = coord;
            remaining = rest;
        }

        let mut parent_pad = false;
        let mut data_offset = 0;
        for (axis, position) in self.axes.iter().enumerate() {
            let in_pad = parent_pad
                || coords[axis] < position.pad_before
                || coords[axis] >= position.pad_end;
            if !in_pad {
                let inner = coords[axis] - position.pad_before;
                data_offset +=
                    ((inner + position.align) % position.data_extent) * position.data_stride;
            }
            parent_pad = in_pad;
        }

        Some(IndexEntry { view_offset: index, data_offset, is_pad: parent_pad })
    }

    /// Repositions the cursor `by` entries forward using per-axis `div_rem` instead of
    /// stepping.
    pub fn advance(&mut self, by: usize) {
        self.index = (self.index + by).min(self.count);
        if self.count == 0 {
            return;
        }

        let mut remaining = self.index.min(self.count - 1);
        for axis in (0..self.axes.len()).rev() {
            let (rest, coord) = div_rem(remaining, self.axes[axis].extent);
            self.axes[axis].coord = coord;
            self.axes[axis].contribution = 0;
            remaining = rest;
        }
        self.data_offset = 0;
        self.refresh_from(0);
    }

    pub fn advanced(mut self, by: usize) -> PaddedIndexIter {
        self.advance(by);
        self
    }
}

impl Iterator for PaddedIndexIter {
    type Item = IndexEntry;

    fn next(&mut self) -> Option<IndexEntry> {
        if self.index >= self.count {
            return None;
        }

        let entry = self.current();
        self.step();
        self.index += 1;
        Some(entry)
    }

    fn nth(&mut self, n: usize) -> Option<IndexEntry> {
        self.advance(n);
        self.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PaddedIndexIter { }

/// The traversal of one view, rank-specialized where possible.
#[derive(Clone, Debug)]
pub enum TensorIndexIter {
    Scalar(ScalarIndexIter),
    Vector(VectorIndexIter),
    Matrix(MatrixIndexIter),
    Volume(VolumeIndexIter),
    General(PaddedIndexIter),
}

impl TensorIndexIter {

    pub fn len(&self) -> usize {
        match *self {
            TensorIndexIter::Scalar(ref i) => i.len(),
            TensorIndexIter::Vector(ref i) => i.len(),
            TensorIndexIter::Matrix(ref i) => i.len(),
            TensorIndexIter::Volume(ref i) => i.len(),
            TensorIndexIter::General(ref i) => i.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entry_at(&self, index: usize) -> Option<IndexEntry> {
        match *self {
            TensorIndexIter::Scalar(ref i) => i.entry_at(index),
            TensorIndexIter::Vector(ref i) => i.entry_at(index),
            TensorIndexIter::Matrix(ref i) => i.entry_at(index),
            TensorIndexIter::Volume(ref i) => i.entry_at(index),
            TensorIndexIter::General(ref i) => i.entry_at(index),
        }
    }

    pub fn advance(&mut self, by: usize) {
        match *self {
            TensorIndexIter::Scalar(ref mut i) => i.advance(by),
            TensorIndexIter::Vector(ref mut i) => i.advance(by),
            TensorIndexIter::Matrix(ref mut i) => i.advance(by),
            TensorIndexIter::Volume(ref mut i) => i.advance(by),
            TensorIndexIter::General(ref mut i) => i.advance(by),
        }
    }

    pub fn advanced(mut self, by: usize) -> TensorIndexIter {
        self.advance(by);
        self
    }
}

impl Iterator for TensorIndexIter {
    type Item = IndexEntry;

    fn next(&mut self) -> Option<IndexEntry> {
        match *self {
            TensorIndexIter::Scalar(ref mut i) => i.next(),
            TensorIndexIter::Vector(ref mut i) => i.next(),
            TensorIndexIter::Matrix(ref mut i) => i.next(),
            TensorIndexIter::Volume(ref mut i) => i.next(),
            TensorIndexIter::General(ref mut i) => i.next(),
        }
    }

    fn nth(&mut self, n: usize) -> Option<IndexEntry> {
        self.advance(n);
        self.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match *self {
            TensorIndexIter::Scalar(ref i) => i.size_hint(),
            TensorIndexIter::Vector(ref i) => i.size_hint(),
            TensorIndexIter::Matrix(ref i) => i.size_hint(),
            TensorIndexIter::Volume(ref i) => i.size_hint(),
            TensorIndexIter::General(ref i) => i.size_hint(),
        }
    }
}

impl ExactSizeIterator for TensorIndexIter { }

/// Builds the traversal of a view: `view` supplies the visit order, `data` the offsets (the two
/// differ under broadcast repetition), `align` the repetition alignment shift.
pub(crate) fn build(
    view: &TensorShape,
    data: &TensorShape,
    align: &[usize],
    padding: Option<&Padding>) -> TensorIndexIter {

    let rank = view.rank();
    let weights = default_strides(view.extents());
    let bounds: Vec<ExtentBounds> = (0..rank)
        .map(|axis| ExtentBounds {
            align: align.get(axis).copied().unwrap_or(0),
            view_extent: view.extents()[axis],
            view_stride: weights[axis],
            data_extent: data.extents()[axis].max(1),
            data_stride: data.strides()[axis],
        })
        .collect();

    let padded = padding.map(|p| p.is_active()).unwrap_or(false);
    if padded || rank == 0 || rank > 3 {
        return TensorIndexIter::General(PaddedIndexIter::new(bounds, padding));
    }

    match rank {
        1 if view.element_count() == 1 =>
            TensorIndexIter::Scalar(ScalarIndexIter::new([bounds[0]])),
        1 => TensorIndexIter::Vector(VectorIndexIter::new([bounds[0]])),
        2 => TensorIndexIter::Matrix(MatrixIndexIter::new([bounds[0], bounds[1]])),
        _ => TensorIndexIter::Volume(VolumeIndexIter::new([bounds[0], bounds[1], bounds[2]])),
    }
}

#[cfg(test)]
mod test {
    use super::super::shape::{Padding, TensorShape};
    use super::{build, ExtentBounds, IndexEntry, MatrixIndexIter, PaddedIndexIter};

    fn bounds(view_extent: usize, view_stride: usize, data_stride: usize) -> ExtentBounds {
        ExtentBounds {
            align: 0,
            view_extent,
            view_stride,
            data_extent: view_extent,
            data_stride,
        }
    }

    #[test]
    fn it_visits_a_matrix_in_row_major_order() {
        let iter = MatrixIndexIter::new([bounds(2, 3, 3), bounds(3, 1, 1)]);
        let offsets: Vec<usize> = iter.map(|e| e.data_offset).collect();
        assert_eq!(offsets, [0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn it_wraps_repeated_axes_by_the_data_extent() {
        // A (1, 3) row broadcast to (2, 3).
        let row = ExtentBounds { align: 0, view_extent: 2, view_stride: 3, data_extent: 1, data_stride: 3 };
        let col = ExtentBounds { align: 0, view_extent: 3, view_stride: 1, data_extent: 3, data_stride: 1 };
        let iter = MatrixIndexIter::new([row, col]);
        let offsets: Vec<usize> = iter.map(|e| e.data_offset).collect();
        assert_eq!(offsets, [0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn it_shifts_repeated_axes_by_the_alignment() {
        let axis = ExtentBounds { align: 1, view_extent: 4, view_stride: 1, data_extent: 3, data_stride: 1 };
        let iter = PaddedIndexIter::new(vec![axis], None);
        let offsets: Vec<usize> = iter.map(|e| e.data_offset).collect();
        assert_eq!(offsets, [1, 2, 0, 1]);
    }

    #[test]
    fn it_flags_padded_positions() {
        // A [1, 2, 3] vector padded (before=1, after=2).
        let axis = bounds(3, 1, 1);
        let entries: Vec<IndexEntry> =
            PaddedIndexIter::new(vec![axis], Some(&Padding::uniform(1, 2))).collect();

        assert_eq!(entries.len(), 6);
        let pads: Vec<bool> = entries.iter().map(|e| e.is_pad).collect();
        assert_eq!(pads, [true, false, false, false, true, true]);
        assert_eq!(entries[1].data_offset, 0);
        assert_eq!(entries[2].data_offset, 1);
        assert_eq!(entries[3].data_offset, 2);
        assert_eq!(entries[1].view_offset, 1);
    }

    #[test]
    fn it_cascades_padding_to_inner_axes() {
        let shape = TensorShape::from((2, 2));
        let padding = Padding::per_axis(vec![
            super::super::shape::PadPair::new(1, 0),
            super::super::shape::PadPair::new(0, 0),
        ]);
        let iter = build(&shape, &shape, &[], Some(&padding));

        // The first padded row covers every column beneath it.
        let pads: Vec<bool> = iter.map(|e| e.is_pad).collect();
        assert_eq!(pads, [true, true, false, false, false, false]);
    }

    #[test]
    fn it_advances_with_divmod() {
        let shape = TensorShape::from((3, 4));
        let mut stepped = build(&shape, &shape, &[], None);
        let jumped = build(&shape, &shape, &[], None).advanced(7);

        for _ in 0..7 {
            stepped.next();
        }
        let a: Vec<_> = stepped.collect();
        let b: Vec<_> = jumped.collect();
        assert_eq!(a, b);
    }

    #[test]
    fn it_advances_a_padded_traversal_with_divmod() {
        let shape = TensorShape::from((2, 2));
        let padding = Padding::uniform(1, 1);
        let mut stepped = build(&shape, &shape, &[], Some(&padding));
        let jumped = build(&shape, &shape, &[], Some(&padding)).advanced(9);

        for _ in 0..9 {
            stepped.next();
        }
        assert_eq!(stepped.collect::<Vec<_>>(), jumped.collect::<Vec<_>>());
    }

    #[test]
    fn it_exposes_random_access_entries() {
        let shape = TensorShape::from((3, 4));
        let iter = build(&shape, &shape, &[], None);
        assert_eq!(iter.entry_at(5).unwrap().data_offset, 5);
        assert_eq!(iter.entry_at(11).unwrap().data_offset, 11);
        assert!(iter.entry_at(12).is_none());
    }
}
