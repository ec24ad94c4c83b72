//! Binary record format for one [`LocalDescriptorSet`].
//!
//! Layout, little-endian, no padding:
//!
//! ```text
//! N == 0:  [i64 N]
//! N  > 0:  [i64 N][i64 D][u8 datatype tag][N x (f64 x, f64 y, f64 radius, f64 angle)][N*D elements]
//! ```
//!
//! Records carry their own length, so many of them can be concatenated in a
//! single blob and walked with [`predict_read_bytes`].

use crate::descriptors::{Datatype, LocalDescriptorSet};
use crate::error::{DecodeError, DecodeResult};
use crate::types::Keypoint;

const COUNT_BYTES: usize = 8;
const HEADER_BYTES: usize = 2 * COUNT_BYTES + 1;
const KEYPOINT_BYTES: usize = 4 * 8;

/// Parsed record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub num_descriptors: usize,
    pub dimension: usize,
    pub datatype: Datatype,
}

impl RecordHeader {
    /// Total record length in bytes, header included.
    pub fn record_len(&self) -> DecodeResult<usize> {
        if self.num_descriptors == 0 {
            return Ok(COUNT_BYTES);
        }
        let overflow = || DecodeError::SizeOverflow {
            num_descriptors: self.num_descriptors as u64,
            dimension: self.dimension as u64,
        };
        let keypoints = self
            .num_descriptors
            .checked_mul(KEYPOINT_BYTES)
            .ok_or_else(overflow)?;
        let vectors = self
            .num_descriptors
            .checked_mul(self.dimension)
            .and_then(|n| n.checked_mul(self.datatype.size_of()))
            .ok_or_else(overflow)?;
        HEADER_BYTES
            .checked_add(keypoints)
            .and_then(|n| n.checked_add(vectors))
            .ok_or_else(overflow)
    }
}

/// Number of bytes [`serialize`] writes for `set`.
pub fn size_of(set: &LocalDescriptorSet) -> usize {
    if set.is_empty() {
        return COUNT_BYTES;
    }
    let (keypoints, vectors) = set.raw_parts();
    HEADER_BYTES + keypoints.len() * KEYPOINT_BYTES + vectors.len()
}

/// Append the record for `set` to `out`, returning the bytes written.
pub fn serialize(set: &LocalDescriptorSet, out: &mut Vec<u8>) -> usize {
    let start = out.len();
    out.reserve(size_of(set));
    out.extend_from_slice(&(set.len() as i64).to_le_bytes());
    if set.is_empty() {
        return out.len() - start;
    }
    out.extend_from_slice(&(set.dimension() as i64).to_le_bytes());
    out.push(set.datatype().tag());
    let (keypoints, vectors) = set.raw_parts();
    for kp in keypoints {
        for value in [kp.x, kp.y, kp.radius, kp.angle] {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out.extend_from_slice(vectors);
    out.len() - start
}

/// Encode `set` into a fresh buffer.
pub fn to_bytes(set: &LocalDescriptorSet) -> Vec<u8> {
    let mut out = Vec::with_capacity(size_of(set));
    serialize(set, &mut out);
    out
}

fn read_i64(buf: &[u8], offset: usize) -> DecodeResult<i64> {
    let bytes = buf
        .get(offset..offset + 8)
        .ok_or(DecodeError::Truncated {
            needed: offset + 8,
            available: buf.len(),
        })?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(i64::from_le_bytes(raw))
}

fn read_count(buf: &[u8], offset: usize, field: &'static str) -> DecodeResult<usize> {
    let value = read_i64(buf, offset)?;
    usize::try_from(value).map_err(|_| {
        if value < 0 {
            DecodeError::NegativeCount { field, value }
        } else {
            DecodeError::SizeOverflow {
                num_descriptors: value as u64,
                dimension: 0,
            }
        }
    })
}

/// Read only the header at the start of `buf`.
pub fn read_header(buf: &[u8]) -> DecodeResult<RecordHeader> {
    let num_descriptors = read_count(buf, 0, "descriptor count")?;
    if num_descriptors == 0 {
        return Ok(RecordHeader {
            num_descriptors: 0,
            dimension: 0,
            datatype: Datatype::default(),
        });
    }
    let dimension = read_count(buf, COUNT_BYTES, "dimension")?;
    let tag = *buf.get(2 * COUNT_BYTES).ok_or(DecodeError::Truncated {
        needed: HEADER_BYTES,
        available: buf.len(),
    })?;
    let datatype = Datatype::from_tag(tag).ok_or(DecodeError::UnknownDatatype(tag))?;
    Ok(RecordHeader {
        num_descriptors,
        dimension,
        datatype,
    })
}

/// Bytes the next [`deserialize`] on `buf` will consume, from the header alone.
pub fn predict_read_bytes(buf: &[u8]) -> DecodeResult<usize> {
    read_header(buf)?.record_len()
}

/// Decode the record at the start of `buf` into `out`, reshaping it.
///
/// Returns the number of bytes consumed. On error `out` is left unchanged.
pub fn deserialize(buf: &[u8], out: &mut LocalDescriptorSet) -> DecodeResult<usize> {
    let header = read_header(buf)?;
    let total = header.record_len()?;
    if buf.len() < total {
        return Err(DecodeError::Truncated {
            needed: total,
            available: buf.len(),
        });
    }
    if header.num_descriptors == 0 {
        out.redefine_shape(Datatype::default(), 0, 0);
        return Ok(total);
    }

    out.redefine_shape(header.datatype, header.dimension, header.num_descriptors);
    let keypoint_end = HEADER_BYTES + header.num_descriptors * KEYPOINT_BYTES;
    let (keypoints, vectors) = out.raw_parts_mut();
    for (kp, chunk) in keypoints
        .iter_mut()
        .zip(buf[HEADER_BYTES..keypoint_end].chunks_exact(KEYPOINT_BYTES))
    {
        let mut fields = [0.0f64; 4];
        for (field, b) in fields.iter_mut().zip(chunk.chunks_exact(8)) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(b);
            *field = f64::from_le_bytes(raw);
        }
        let [x, y, radius, angle] = fields;
        *kp = Keypoint::new(x, y, radius, angle);
    }
    vectors.copy_from_slice(&buf[keypoint_end..total]);
    Ok(total)
}

/// Decode one record into a new set, returning it with the bytes consumed.
pub fn decode(buf: &[u8]) -> DecodeResult<(LocalDescriptorSet, usize)> {
    let mut set = LocalDescriptorSet::empty();
    let consumed = deserialize(buf, &mut set)?;
    Ok((set, consumed))
}

/// Decode a blob of back-to-back records; the blob must be consumed exactly.
pub fn decode_all(buf: &[u8]) -> DecodeResult<Vec<LocalDescriptorSet>> {
    let mut sets = Vec::new();
    let mut position = 0;
    while position < buf.len() {
        let rest = &buf[position..];
        let expected = predict_read_bytes(rest)?;
        if expected > rest.len() {
            return Err(DecodeError::TrailingBytes {
                position,
                size: buf.len(),
            });
        }
        let (set, consumed) = decode(rest)?;
        debug_assert_eq!(consumed, expected);
        sets.push(set);
        position += consumed;
    }
    Ok(sets)
}
