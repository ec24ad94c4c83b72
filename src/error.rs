//! Error types for localmatch.
//!
//! Configuration and decode failures surface to the caller. Per-trial and
//! per-correspondence conditions (degenerate samples, empty inputs) never
//! become errors; they only show up as zero counts.

use thiserror::Error;

/// Invalid construction string or settings value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("empty parameters, expected format {expected}")]
    Empty { expected: &'static str },

    #[error("missing value for {0}")]
    MissingValue(&'static str),

    #[error("invalid number {token:?} for {field}")]
    InvalidNumber { field: &'static str, token: String },

    #[error("unexpected token {0:?}")]
    UnexpectedToken(String),

    #[error("unknown transformation model {0}, expected 1..5")]
    UnknownModel(i64),

    #[error("unknown distance {0:?}")]
    UnknownDistance(String),

    #[error("unknown datatype {0:?}")]
    UnknownDatatype(String),

    #[error("unknown pair matcher {0:?}, expected MATCH,... or RANSAC,...")]
    UnknownMatcher(String),

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Corrupt or truncated descriptor record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated record: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("negative {field} in record header: {value}")]
    NegativeCount { field: &'static str, value: i64 },

    #[error("unknown datatype tag 0x{0:02x}")]
    UnknownDatatype(u8),

    #[error("record size overflows: {num_descriptors} descriptors of dimension {dimension}")]
    SizeOverflow { num_descriptors: u64, dimension: u64 },

    #[error("record blob of {size} bytes not consumed exactly (stopped at {position})")]
    TrailingBytes { position: usize, size: usize },
}

/// Failure while reading or writing a descriptor store on disk.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error in {id}: {source}")]
    Decode {
        id: String,
        #[source]
        source: DecodeError,
    },

    #[error("malformed index line {line}: {message}")]
    IndexFormat { line: usize, message: String },

    #[error("unknown id {0:?}")]
    UnknownId(String),
}

/// Misuse of a matcher's reference binding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("a reference set is already bound, unset it before binding another")]
    ReferenceAlreadyBound,

    #[error("no reference set bound")]
    NoReference,

    #[error("query vectors have dimension {query}, reference vectors {reference}")]
    DimensionMismatch { query: usize, reference: usize },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type MatchResult<T> = std::result::Result<T, MatchError>;
