//! The closed set of element kinds a tensor can carry.
//!
//! Storage is untyped at rest (a replica is a byte region); views are parameterized over an
//! [`Element`] so that iteration and host access are typed. The set is closed on purpose: every
//! kind has one canonical fixed size, which is what makes replica sizing, the codec, and
//! zero-copy reinterpretation between a composite and its components possible.
//!
//! [`Element`]: ./trait.Element.html

use std::fmt;

use byteorder::ByteOrder;
use half::f16;

/// A scalar element kind with a canonical fixed size.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ScalarKind {
    U8,
    U16,
    I16,
    I32,
    I64,
    U64,
    F16,
    F32,
    F64,
    Bool,
}

impl ScalarKind {

    /// Returns the canonical size of the scalar in bytes.
    pub fn size(&self) -> usize {
        use self::ScalarKind::*;

        match *self {
            U8 | Bool => 1,
            U16 | I16 | F16 => 2,
            I32 | F32 => 4,
            I64 | U64 | F64 => 8,
        }
    }

    /// Returns the wire tag used by the tensor codec.
    pub fn code(&self) -> u8 {
        use self::ScalarKind::*;

        match *self {
            U8 => 0, U16 => 1, I16 => 2, I32 => 3, I64 => 4,
            U64 => 5, F16 => 6, F32 => 7, F64 => 8, Bool => 9,
        }
    }

    /// The inverse of [`code`](#method.code).
    pub fn from_code(code: u8) -> Option<ScalarKind> {
        use self::ScalarKind::*;

        match code {
            0 => Some(U8), 1 => Some(U16), 2 => Some(I16), 3 => Some(I32), 4 => Some(I64),
            5 => Some(U64), 6 => Some(F16), 7 => Some(F32), 8 => Some(F64), 9 => Some(Bool),
            _ => None,
        }
    }
}

/// The kind of element a storage or view carries.
///
/// A composite is a fixed-size vector of scalar components laid out consecutively in memory, so
/// reinterpreting a composite tensor as a tensor of its components is a pure shape reshaping.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ElementKind {
    Scalar(ScalarKind),
    Composite { scalar: ScalarKind, components: usize },
}

impl ElementKind {

    /// The scalar kind of the element (the component kind for composites).
    pub fn scalar(&self) -> ScalarKind {
        match *self {
            ElementKind::Scalar(s) => s,
            ElementKind::Composite { scalar, .. } => scalar,
        }
    }

    /// The number of scalar components per element.
    pub fn components(&self) -> usize {
        match *self {
            ElementKind::Scalar(..) => 1,
            ElementKind::Composite { components, .. } => components,
        }
    }

    /// The canonical size of one element in bytes.
    pub fn size(&self) -> usize {
        self.scalar().size() * self.components()
    }
}

/// An element a tensor view can be parameterized over.
///
/// The codec hooks read and write exactly `KIND.size()` bytes; the byte order is chosen by the
/// caller (the persisted layout is little-endian).
pub trait Element: Copy + PartialEq + Send + Sync + fmt::Debug + 'static {
    const KIND: ElementKind;
    const ZERO: Self;

    fn encode<B: ByteOrder>(&self, buffer: &mut [u8]);
    fn decode<B: ByteOrder>(buffer: &[u8]) -> Self;
}

macro_rules! impl_scalar_element {
    ($t:ty, $kind:ident, $zero:expr, $write:ident, $read:ident) => {
        impl Element for $t {
            const KIND: ElementKind = ElementKind::Scalar(ScalarKind::$kind);
            const ZERO: $t = $zero;

            fn encode<B: ByteOrder>(&self, buffer: &mut [u8]) {
                B::$write(buffer, *self);
            }

            fn decode<B: ByteOrder>(buffer: &[u8]) -> $t {
                B::$read(buffer)
            }
        }
    }
}

impl_scalar_element!(u16, U16, 0, write_u16, read_u16);
impl_scalar_element!(i16, I16, 0, write_i16, read_i16);
impl_scalar_element!(i32, I32, 0, write_i32, read_i32);
impl_scalar_element!(i64, I64, 0, write_i64, read_i64);
impl_scalar_element!(u64, U64, 0, write_u64, read_u64);
impl_scalar_element!(f32, F32, 0.0, write_f32, read_f32);
impl_scalar_element!(f64, F64, 0.0, write_f64, read_f64);

impl Element for u8 {
    const KIND: ElementKind = ElementKind::Scalar(ScalarKind::U8);
    const ZERO: u8 = 0;

    fn encode<B: ByteOrder>(&self, buffer: &mut [u8]) {
        buffer[0] = *self;
    }

    fn decode<B: ByteOrder>(buffer: &[u8]) -> u8 {
        buffer[0]
    }
}

impl Element for bool {
    const KIND: ElementKind = ElementKind::Scalar(ScalarKind::Bool);
    const ZERO: bool = false;

    fn encode<B: ByteOrder>(&self, buffer: &mut [u8]) {
        buffer[0] = *self as u8;
    }

    fn decode<B: ByteOrder>(buffer: &[u8]) -> bool {
        buffer[0] != 0
    }
}

impl Element for f16 {
    const KIND: ElementKind = ElementKind::Scalar(ScalarKind::F16);
    const ZERO: f16 = f16::from_bits(0);

    fn encode<B: ByteOrder>(&self, buffer: &mut [u8]) {
        B::write_u16(buffer, self.to_bits());
    }

    fn decode<B: ByteOrder>(buffer: &[u8]) -> f16 {
        f16::from_bits(B::read_u16(buffer))
    }
}

/// A fixed-size vector element whose components are laid out consecutively.
pub trait Composite: Element {
    type Component: Element;
    const COMPONENTS: usize;
}

/// A three-channel color sample.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgb<T> {
    pub r: T,
    pub g: T,
    pub b: T,
}

/// A four-channel color sample.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba<T> {
    pub r: T,
    pub g: T,
    pub b: T,
    pub a: T,
}

/// A two-channel audio frame.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stereo<T> {
    pub left: T,
    pub right: T,
}

macro_rules! impl_composite_element {
    ($name:ident, $components:expr, [$($field:ident),+]) => {
        impl<T: Element> Element for $name<T> {
            const KIND: ElementKind = ElementKind::Composite {
                scalar: match T::KIND {
                    ElementKind::Scalar(s) => s,
                    // Nested composites are not part of the element set.
                    ElementKind::Composite { scalar, .. } => scalar,
                },
                components: $components,
            };
            const ZERO: $name<T> = $name { $($field: T::ZERO),+ };

            fn encode<B: ByteOrder>(&self, buffer: &mut [u8]) {
                let step = T::KIND.size();
                let mut at = 0;
                $(
                    self.$field.encode::<B>(&mut buffer[at..at + step]);
                    at += step;
                )+
                let _ = at;
            }

            fn decode<B: ByteOrder>(buffer: &[u8]) -> $name<T> {
                let step = T::KIND.size();
                let mut at = 0;
                $(
                    let $field = T::decode::<B>(&buffer[at..at + step]);
                    at += step;
                )+
                let _ = at;
                $name { $($field),+ }
            }
        }

        impl<T: Element> Composite for $name<T> {
            type Component = T;
            const COMPONENTS: usize = $components;
        }
    }
}

impl_composite_element!(Rgb, 3, [r, g, b]);
impl_composite_element!(Rgba, 4, [r, g, b, a]);
impl_composite_element!(Stereo, 2, [left, right]);

#[cfg(test)]
mod test {
    use byteorder::LittleEndian;
    use super::{Element, ElementKind, Rgb, ScalarKind};

    #[test]
    fn it_reports_canonical_sizes() {
        assert_eq!(ElementKind::Scalar(ScalarKind::F64).size(), 8);
        assert_eq!(ElementKind::Scalar(ScalarKind::Bool).size(), 1);
        assert_eq!(<Rgb<u8> as Element>::KIND.size(), 3);
        assert_eq!(<Rgb<f32> as Element>::KIND.size(), 12);
    }

    #[test]
    fn it_round_trips_through_the_codec_hooks() {
        let mut buffer = [0u8; 12];
        let value = Rgb { r: 1.0f32, g: -2.5, b: 3.25 };
        value.encode::<LittleEndian>(&mut buffer);
        assert_eq!(Rgb::<f32>::decode::<LittleEndian>(&buffer), value);
    }

    #[test]
    fn it_maps_scalar_codes_both_ways() {
        for code in 0..10 {
            assert_eq!(ScalarKind::from_code(code).unwrap().code(), code);
        }
        assert!(ScalarKind::from_code(10).is_none());
    }
}
