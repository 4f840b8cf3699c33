//! The persisted tensor layout: a name plus a contiguous sequence of elements.
//!
//! The wire format is little-endian: name length (`u32`) and bytes, the scalar kind code and
//! component count, the element count (`u64`), then the elements themselves. Decoding builds a
//! fresh rank-1 tensor over new storage initialized from the decoded sequence.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::super::element::{Element, ScalarKind};
use super::super::error::{Error, ErrorKind, Result};
use super::super::stream::Stream;
use super::Tensor;

fn io_failure(error: std::io::Error) -> Error {
    Error::new(ErrorKind::Other, error)
}

/// Encodes `tensor`'s traversal (padding included) under `name`.
pub fn encode<T, W>(name: &str, tensor: &Tensor<T>, stream: &Stream, writer: &mut W) -> Result
    where T: Element,
          W: Write {

    writer.write_u32::<LittleEndian>(name.len() as u32).map_err(io_failure)?;
    writer.write_all(name.as_bytes()).map_err(io_failure)?;

    let kind = T::KIND;
    writer.write_u8(kind.scalar().code()).map_err(io_failure)?;
    writer.write_u8(kind.components() as u8).map_err(io_failure)?;

    let values = tensor.to_vec(stream)?;
    writer.write_u64::<LittleEndian>(values.len() as u64).map_err(io_failure)?;

    let mut scratch = vec![0u8; kind.size()];
    for value in &values {
        value.encode::<LittleEndian>(&mut scratch);
        writer.write_all(&scratch).map_err(io_failure)?;
    }
    Ok(())
}

/// Decodes a `(name, tensor)` pair previously written by [`encode`](./fn.encode.html).
///
/// The element kind on the wire must match `T`.
pub fn decode<T, R>(reader: &mut R) -> Result<(String, Tensor<T>)>
    where T: Element,
          R: Read {

    let name_length = reader.read_u32::<LittleEndian>().map_err(io_failure)? as usize;
    let mut name = vec![0u8; name_length];
    reader.read_exact(&mut name).map_err(io_failure)?;
    let name = String::from_utf8(name)
        .map_err(|e| Error::new(ErrorKind::Other, e))?;

    let scalar = reader.read_u8().map_err(io_failure)?;
    let scalar = ScalarKind::from_code(scalar)
        .ok_or_else(|| Error::new(ErrorKind::Other, "unknown element kind code"))?;
    let components = reader.read_u8().map_err(io_failure)? as usize;

    let kind = T::KIND;
    if scalar != kind.scalar() || components != kind.components() {
        return Err(ErrorKind::IncompatibleShape.into());
    }

    let count = reader.read_u64::<LittleEndian>().map_err(io_failure)? as usize;
    let mut scratch = vec![0u8; kind.size()];
    let mut data = Vec::with_capacity(count);
    for _ in 0..count {
        reader.read_exact(&mut scratch).map_err(io_failure)?;
        data.push(T::decode::<LittleEndian>(&scratch));
    }

    Ok((name, Tensor::vector(data)?))
}
