//! Shape and stride algebra: extents, strides, padding, transposition, flattening.

use super::super::error::{ErrorKind, Result};

/// Row-major strides for the provided extents: `strides[i] = prod(extents[i+1..])`.
pub(crate) fn default_strides(extents: &[usize]) -> Vec<usize> {
    let mut strides: Vec<usize> = Vec::with_capacity(extents.len());
    match extents.len() {
        0 => strides,
        1 => {
            strides.push(1);
            strides
        }
        n => {
            let inner = &extents[1..n];
            for i in 0..inner.len() {
                strides.push(inner[i..].iter().product());
            }
            strides.push(1);
            strides
        }
    }
}

/// The extents and strides of a tensor region.
///
/// `element_count` is the logical number of positions; `span_count` is the size of the physical
/// range the positions touch. The two agree exactly when the region is contiguous.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TensorShape {
    extents: Vec<usize>,
    strides: Vec<usize>,
}

impl TensorShape {

    /// A shape with default (row-major) strides.
    pub fn new(extents: Vec<usize>) -> TensorShape {
        let strides = default_strides(&extents);
        TensorShape { extents, strides }
    }

    /// A shape with explicit strides, one per axis.
    pub fn with_strides(extents: Vec<usize>, strides: Vec<usize>) -> Result<TensorShape> {
        if extents.len() != strides.len() {
            return Err(ErrorKind::IncompatibleShape.into());
        }
        Ok(TensorShape { extents, strides })
    }

    /// A shape whose two inner axes are stored column-major: the inner extents are swapped, the
    /// default strides computed, and the extents swapped back.
    pub fn column_major(extents: Vec<usize>) -> TensorShape {
        let n = extents.len();
        if n < 2 {
            return TensorShape::new(extents);
        }

        let mut swapped = extents.clone();
        swapped.swap(n - 2, n - 1);
        let mut strides = default_strides(&swapped);
        strides.swap(n - 2, n - 1);
        TensorShape { extents, strides }
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// The logical number of positions. An empty extent list has no positions.
    pub fn element_count(&self) -> usize {
        match self.extents.len() {
            0 => 0,
            _ => self.extents.iter().product(),
        }
    }

    /// The size of the physical range: `1 + sum((extents[i] - 1) * strides[i])`.
    pub fn span_count(&self) -> usize {
        match self.element_count() {
            0 => 0,
            _ => 1 + self.extents.iter().zip(&self.strides).map(|(&e, &s)| (e - 1) * s).sum::<usize>(),
        }
    }

    pub fn is_contiguous(&self) -> bool {
        self.element_count() == self.span_count()
    }

    /// The physical offset of `coord`: `sum(coord[i] * strides[i])`.
    ///
    /// Undefined when `coord` is outside the extents (asserted in debug builds).
    pub fn linear_index(&self, coord: &[usize]) -> usize {
        debug_assert_eq!(coord.len(), self.rank());
        debug_assert!(coord.iter().zip(&self.extents).all(|(&c, &e)| c < e));
        coord.iter().zip(&self.strides).map(|(&c, &s)| c * s).sum()
    }

    /// Expands each extent by its padding pair. Strides propagate unchanged: they keep
    /// describing offsets of the *data* region, not of the synthesized padding.
    pub fn padded(&self, padding: &Padding) -> TensorShape {
        let extents = self.extents.iter()
            .enumerate()
            .map(|(axis, &e)| {
                let pair = padding.pair(axis);
                pair.before + e + pair.after
            })
            .collect();
        TensorShape { extents, strides: self.strides.clone() }
    }

    /// Swaps the two inner axes of both extents and strides.
    pub fn transposed(&self) -> Result<TensorShape> {
        let n = self.rank();
        if n < 2 {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        let mut extents = self.extents.clone();
        let mut strides = self.strides.clone();
        extents.swap(n - 2, n - 1);
        strides.swap(n - 2, n - 1);
        Ok(TensorShape { extents, strides })
    }

    /// Collapses the axes strictly above `axis` to 1 and multiplies the extent at `axis` by
    /// their product. Legal only when the tail region is contiguous.
    pub fn flattened(&self, axis: usize) -> Result<TensorShape> {
        let n = self.rank();
        if axis >= n {
            return Err(ErrorKind::IncompatibleShape.into());
        }

        for j in axis..n - 1 {
            if self.strides[j] != self.strides[j + 1] * self.extents[j + 1] {
                return Err(ErrorKind::IncompatibleShape.into());
            }
        }

        let tail: usize = self.extents[axis + 1..].iter().product();
        let unit = self.strides[n - 1];

        let mut extents = self.extents.clone();
        let mut strides = self.strides.clone();
        extents[axis] *= tail;
        strides[axis] = unit;
        for j in axis + 1..n {
            extents[j] = 1;
            strides[j] = unit;
        }
        Ok(TensorShape { extents, strides })
    }
}

impl From<Vec<usize>> for TensorShape {

    fn from(extents: Vec<usize>) -> TensorShape {
        TensorShape::new(extents)
    }
}

impl<'a> From<&'a [usize]> for TensorShape {

    fn from(extents: &[usize]) -> TensorShape {
        TensorShape::new(extents.to_vec())
    }
}

impl From<usize> for TensorShape {

    fn from(length: usize) -> TensorShape {
        TensorShape::new(vec![length])
    }
}

impl From<(usize, usize)> for TensorShape {

    fn from((a, b): (usize, usize)) -> TensorShape {
        TensorShape::new(vec![a, b])
    }
}

impl From<(usize, usize, usize)> for TensorShape {

    fn from((a, b, c): (usize, usize, usize)) -> TensorShape {
        TensorShape::new(vec![a, b, c])
    }
}

impl From<(usize, usize, usize, usize)> for TensorShape {

    fn from((a, b, c, d): (usize, usize, usize, usize)) -> TensorShape {
        TensorShape::new(vec![a, b, c, d])
    }
}

macro_rules! impl_tensor_shape_from_array {
    ($($N:expr)+) => {
        $(
            impl From<[usize; $N]> for TensorShape {

                fn from(extents: [usize; $N]) -> TensorShape {
                    TensorShape::new(extents.to_vec())
                }
            }
        )+
    }
}

impl_tensor_shape_from_array!(1 2 3 4 5 6);

/// How imported elements are laid out in memory.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MemoryLayout {
    RowMajor,
    ColumnMajor,
}

/// A non-negative `(before, after)` padding pair for one axis.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PadPair {
    pub before: usize,
    pub after: usize,
}

impl PadPair {

    pub fn new(before: usize, after: usize) -> PadPair {
        PadPair { before, after }
    }

    pub fn total(&self) -> usize {
        self.before + self.after
    }
}

/// Per-axis padding: either one pair applied to every axis, or one pair per axis.
///
/// Padded positions synthesize the view's pad value on read and silently absorb writes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Padding {
    Uniform(PadPair),
    PerAxis(Vec<PadPair>),
}

impl Padding {

    pub fn uniform(before: usize, after: usize) -> Padding {
        Padding::Uniform(PadPair::new(before, after))
    }

    pub fn per_axis(pairs: Vec<PadPair>) -> Padding {
        Padding::PerAxis(pairs)
    }

    /// The pair for `axis`; a uniform padding reuses the same pair for every axis.
    pub fn pair(&self, axis: usize) -> PadPair {
        match *self {
            Padding::Uniform(pair) => pair,
            Padding::PerAxis(ref pairs) => pairs[axis],
        }
    }

    /// Returns `true` when any axis has a nonzero pair.
    pub fn is_active(&self) -> bool {
        match *self {
            Padding::Uniform(pair) => pair.total() > 0,
            Padding::PerAxis(ref pairs) => pairs.iter().any(|p| p.total() > 0),
        }
    }

    /// Per-axis pair lists must match the shape's rank.
    pub fn compatible_with(&self, rank: usize) -> bool {
        match *self {
            Padding::Uniform(..) => true,
            Padding::PerAxis(ref pairs) => pairs.len() == rank,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Padding, TensorShape};

    #[test]
    fn it_computes_row_major_strides() {
        let shape = TensorShape::from((2, 3, 4));
        assert_eq!(shape.strides(), &[12, 4, 1]);
        assert_eq!(shape.element_count(), 24);
        assert_eq!(shape.span_count(), 24);
        assert!(shape.is_contiguous());
    }

    #[test]
    fn it_treats_an_empty_extent_list_as_empty() {
        let shape = TensorShape::new(vec![]);
        assert_eq!(shape.element_count(), 0);
        assert_eq!(shape.span_count(), 0);
    }

    #[test]
    fn it_computes_column_major_strides() {
        let shape = TensorShape::column_major(vec![3, 2]);
        assert_eq!(shape.extents(), &[3, 2]);
        assert_eq!(shape.strides(), &[1, 3]);
        assert!(shape.is_contiguous());
        assert_eq!(shape.linear_index(&[1, 1]), 4);
    }

    #[test]
    fn it_transposes_the_two_inner_axes() {
        let shape = TensorShape::from((2, 3, 4));
        let t = shape.transposed().unwrap();
        assert_eq!(t.extents(), &[2, 4, 3]);
        assert_eq!(t.strides(), &[12, 1, 4]);
        assert_eq!(t.transposed().unwrap(), shape);
        assert!(TensorShape::from(5usize).transposed().is_err());
    }

    #[test]
    fn it_flattens_a_contiguous_tail() {
        let shape = TensorShape::from((2, 3, 4));
        let flat = shape.flattened(1).unwrap();
        assert_eq!(flat.extents(), &[2, 12, 1]);
        assert_eq!(flat.element_count(), 24);
        assert_eq!(flat.linear_index(&[1, 7, 0]), 19);
    }

    #[test]
    fn it_refuses_to_flatten_a_strided_tail() {
        let transposed = TensorShape::from((2, 3, 4)).transposed().unwrap();
        assert!(transposed.flattened(1).is_err());
        assert!(transposed.flattened(0).is_err());
    }

    #[test]
    fn it_expands_extents_under_padding() {
        let shape = TensorShape::from(3usize);
        let padded = shape.padded(&Padding::uniform(1, 2));
        assert_eq!(padded.extents(), &[6]);
        assert_eq!(padded.strides(), shape.strides());
    }

    #[test]
    fn it_keeps_the_span_of_a_strided_region() {
        let transposed = TensorShape::from((3, 2)).transposed().unwrap();
        assert_eq!(transposed.element_count(), 6);
        assert_eq!(transposed.span_count(), 6);
        let sub = TensorShape::with_strides(vec![2, 2], vec![2, 1]).unwrap();
        assert_eq!(sub.element_count(), 4);
        assert_eq!(sub.span_count(), 4);
    }
}
