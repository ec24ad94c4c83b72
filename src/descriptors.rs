//! Local descriptor sets: keypoints plus one fixed-dimension feature vector
//! per keypoint, all vectors sharing one numeric element type.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::ConfigError;
use crate::types::Keypoint;

/// Numeric element type shared by every vector of a set.
///
/// The one-byte tags are the ones written in the binary record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Datatype {
    #[default]
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl Datatype {
    pub const ALL: [Datatype; 10] = [
        Datatype::Int8,
        Datatype::Int16,
        Datatype::Int32,
        Datatype::Int64,
        Datatype::UInt8,
        Datatype::UInt16,
        Datatype::UInt32,
        Datatype::UInt64,
        Datatype::Float32,
        Datatype::Float64,
    ];

    /// Size in bytes of one element.
    pub fn size_of(self) -> usize {
        match self {
            Datatype::Int8 | Datatype::UInt8 => 1,
            Datatype::Int16 | Datatype::UInt16 => 2,
            Datatype::Int32 | Datatype::UInt32 | Datatype::Float32 => 4,
            Datatype::Int64 | Datatype::UInt64 | Datatype::Float64 => 8,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            Datatype::Int8 => b'A',
            Datatype::Int16 => b'B',
            Datatype::Int32 => b'C',
            Datatype::Int64 => b'D',
            Datatype::UInt8 => b'I',
            Datatype::UInt16 => b'J',
            Datatype::UInt32 => b'K',
            Datatype::UInt64 => b'L',
            Datatype::Float32 => b'U',
            Datatype::Float64 => b'V',
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.tag() == tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            Datatype::Int8 => "INT8",
            Datatype::Int16 => "INT16",
            Datatype::Int32 => "INT32",
            Datatype::Int64 => "INT64",
            Datatype::UInt8 => "UINT8",
            Datatype::UInt16 => "UINT16",
            Datatype::UInt32 => "UINT32",
            Datatype::UInt64 => "UINT64",
            Datatype::Float32 => "FLOAT32",
            Datatype::Float64 => "FLOAT64",
        }
    }

    /// Decode one little-endian element as `f64`.
    ///
    /// `bytes` must hold exactly [`Datatype::size_of`] bytes.
    pub fn decode_f64(self, bytes: &[u8]) -> f64 {
        macro_rules! read {
            ($t:ty) => {{
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_le_bytes(raw) as f64
            }};
        }
        match self {
            Datatype::Int8 => read!(i8),
            Datatype::Int16 => read!(i16),
            Datatype::Int32 => read!(i32),
            Datatype::Int64 => read!(i64),
            Datatype::UInt8 => read!(u8),
            Datatype::UInt16 => read!(u16),
            Datatype::UInt32 => read!(u32),
            Datatype::UInt64 => read!(u64),
            Datatype::Float32 => read!(f32),
            Datatype::Float64 => read!(f64),
        }
    }

    /// Encode `value` as one little-endian element, saturating on integer
    /// overflow.
    pub fn encode_f64(self, value: f64, out: &mut [u8]) {
        macro_rules! write {
            ($t:ty) => {
                out.copy_from_slice(&(value as $t).to_le_bytes())
            };
        }
        match self {
            Datatype::Int8 => write!(i8),
            Datatype::Int16 => write!(i16),
            Datatype::Int32 => write!(i32),
            Datatype::Int64 => write!(i64),
            Datatype::UInt8 => write!(u8),
            Datatype::UInt16 => write!(u16),
            Datatype::UInt32 => write!(u32),
            Datatype::UInt64 => write!(u64),
            Datatype::Float32 => write!(f32),
            Datatype::Float64 => write!(f64),
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Datatype {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownDatatype(s.to_string()))
    }
}

/// Rust scalar that can be stored as a vector element.
pub trait Element: Copy {
    const DATATYPE: Datatype;

    fn write_le(self, out: &mut [u8]);
}

macro_rules! impl_element {
    ($($t:ty => $d:ident),* $(,)?) => {
        $(
            impl Element for $t {
                const DATATYPE: Datatype = Datatype::$d;

                fn write_le(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_element!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
);

/// Keypoints and their feature vectors.
///
/// Invariant: `keypoints.len() == len()` and the vector buffer holds exactly
/// `len() * dimension * datatype.size_of()` bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalDescriptorSet {
    datatype: Datatype,
    dimension: usize,
    keypoints: Vec<Keypoint>,
    vectors: Vec<u8>,
}

impl LocalDescriptorSet {
    /// Set of `num_descriptors` zeroed keypoints and vectors.
    pub fn new(num_descriptors: usize, datatype: Datatype, dimension: usize) -> Self {
        let mut set = Self::default();
        set.redefine_shape(datatype, dimension, num_descriptors);
        set
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Bytes taken by one vector.
    pub fn vector_size_bytes(&self) -> usize {
        self.dimension * self.datatype.size_of()
    }

    /// Change element type and dimension; contents are reset to zero.
    pub fn redefine_shape(&mut self, datatype: Datatype, dimension: usize, num_descriptors: usize) {
        self.datatype = datatype;
        self.dimension = dimension;
        self.keypoints.clear();
        self.vectors.clear();
        self.redefine_len(num_descriptors);
    }

    /// Grow or shrink the number of descriptors, keeping the shape.
    pub fn redefine_len(&mut self, num_descriptors: usize) {
        let bytes = num_descriptors * self.vector_size_bytes();
        self.keypoints.resize(num_descriptors, Keypoint::default());
        self.vectors.resize(bytes, 0);
    }

    /// # Panics
    /// If `pos >= len()`.
    pub fn set_keypoint(&mut self, pos: usize, keypoint: Keypoint) {
        if keypoint.radius < 0.0 {
            debug!(radius = keypoint.radius, pos, "invalid keypoint radius");
        }
        if !(-std::f64::consts::PI..=std::f64::consts::PI).contains(&keypoint.angle) {
            debug!(angle = keypoint.angle, pos, "keypoint angle outside [-pi, pi]");
        }
        self.keypoints[pos] = keypoint;
    }

    pub fn keypoint(&self, pos: usize) -> Option<&Keypoint> {
        self.keypoints.get(pos)
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Store one vector.
    ///
    /// # Panics
    /// If `pos >= len()`, if `T` does not match the set's datatype or if
    /// `values.len() != dimension()`.
    pub fn set_vector<T: Element>(&mut self, pos: usize, values: &[T]) {
        assert_eq!(T::DATATYPE, self.datatype, "vector element type mismatch");
        assert_eq!(values.len(), self.dimension, "vector dimension mismatch");
        let size = self.datatype.size_of();
        let out = self.vector_bytes_mut(pos);
        for (value, chunk) in values.iter().zip(out.chunks_exact_mut(size)) {
            value.write_le(chunk);
        }
    }

    /// Raw little-endian bytes of one vector.
    ///
    /// # Panics
    /// If `pos >= len()`.
    pub fn vector_bytes(&self, pos: usize) -> &[u8] {
        let size = self.vector_size_bytes();
        &self.vectors[pos * size..(pos + 1) * size]
    }

    fn vector_bytes_mut(&mut self, pos: usize) -> &mut [u8] {
        let size = self.vector_size_bytes();
        &mut self.vectors[pos * size..(pos + 1) * size]
    }

    /// One vector converted to `f64`.
    pub fn vector_f64(&self, pos: usize) -> Vec<f64> {
        let size = self.datatype.size_of();
        self.vector_bytes(pos)
            .chunks_exact(size)
            .map(|chunk| self.datatype.decode_f64(chunk))
            .collect()
    }

    /// Every vector converted to `f64`, row-major.
    pub fn vectors_f64(&self) -> Vec<f64> {
        let size = self.datatype.size_of();
        self.vectors
            .chunks_exact(size)
            .map(|chunk| self.datatype.decode_f64(chunk))
            .collect()
    }

    /// Whole keypoint buffer and whole vector buffer, for serialization.
    pub(crate) fn raw_parts(&self) -> (&[Keypoint], &[u8]) {
        (&self.keypoints, &self.vectors)
    }

    pub(crate) fn raw_parts_mut(&mut self) -> (&mut [Keypoint], &mut [u8]) {
        (&mut self.keypoints, &mut self.vectors)
    }

    /// Convert every element to `new_datatype`, multiplying by `scale`.
    pub fn convert_datatype(&mut self, scale: f64, new_datatype: Datatype) {
        if self.datatype == new_datatype && scale == 1.0 {
            return;
        }
        let values = self.vectors_f64();
        let size = new_datatype.size_of();
        let mut converted = vec![0u8; values.len() * size];
        for (value, chunk) in values.iter().zip(converted.chunks_exact_mut(size)) {
            new_datatype.encode_f64(value * scale, chunk);
        }
        self.datatype = new_datatype;
        self.vectors = converted;
    }

    /// Map keypoints from a processed frame size back to the original frame
    /// size.
    pub fn rescale_keypoints(
        &mut self,
        processed_width: usize,
        processed_height: usize,
        new_width: usize,
        new_height: usize,
    ) {
        if processed_width == new_width && processed_height == new_height {
            return;
        }
        if processed_width == 0 || processed_height == 0 {
            return;
        }
        let scale_x = new_width as f64 / processed_width as f64;
        let scale_y = new_height as f64 / processed_height as f64;
        let scale_avg = (scale_x + scale_y) / 2.0;
        let max_x = new_width.saturating_sub(1) as f64;
        let max_y = new_height.saturating_sub(1) as f64;
        for kp in &mut self.keypoints {
            if kp.x < 0.0 || kp.x > processed_width as f64 || kp.y < 0.0 || kp.y > processed_height as f64 {
                debug!(
                    x = kp.x,
                    y = kp.y,
                    processed_width,
                    processed_height,
                    "keypoint out of processed frame"
                );
            }
            kp.x = (kp.x * scale_x).min(max_x);
            kp.y = (kp.y * scale_y).min(max_y);
            kp.radius *= scale_avg;
        }
    }
}

impl fmt::Display for LocalDescriptorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.len())?;
        for (pos, kp) in self.keypoints.iter().enumerate() {
            write!(
                f,
                "\n {:.2}\t{:.2}\t{:.2}\t{:.3}\t",
                kp.x, kp.y, kp.radius, kp.angle
            )?;
            let values = self.vector_f64(pos);
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{v}")?;
            }
        }
        Ok(())
    }
}
