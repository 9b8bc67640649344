//! Error types for miniSEED parsing, decompression, and trace assembly.

use thiserror::Error;

use crate::types::EncodingFormat;

#[derive(Debug, Error)]
pub enum MseedError {
    #[error("record too short: expected at least {expected} bytes, got {actual}")]
    RecordTooShort { expected: usize, actual: usize },

    #[error("unrecognized record format")]
    UnrecognizedFormat,

    #[error("invalid fixed header: {0}")]
    InvalidHeader(String),

    #[error("invalid v3 header: {0}")]
    InvalidV3Header(String),

    #[error("blockette 1000 not found")]
    MissingBlockette1000,

    #[error("unsupported encoding format: {0}")]
    UnsupportedEncoding(u8),

    #[error("{0} payload does not contain numeric samples")]
    NonNumericEncoding(EncodingFormat),

    #[error("payload length {actual} bytes inconsistent with {num_samples} samples of {encoding}")]
    PayloadLength {
        encoding: EncodingFormat,
        num_samples: usize,
        actual: usize,
    },

    #[error("CRC-32C mismatch: stored {stored:#010X}, computed {computed:#010X}")]
    CrcMismatch { stored: u32, computed: u32 },

    #[error("steim decode error: {0}")]
    SteimDecode(String),

    #[error("reverse integration constant mismatch: header {expected}, last sample {actual}")]
    IntegrationConstant { expected: i32, actual: i32 },

    #[error("sample count mismatch: header says {expected}, decoded {actual}")]
    SampleCountMismatch { expected: usize, actual: usize },

    #[error("invalid source identifier: {0}")]
    InvalidSourceId(String),

    #[error("invalid time: {0}")]
    InvalidTime(String),

    #[error("invalid extra headers: {0}")]
    ExtraHeaders(#[from] serde_json::Error),

    #[error("encode error: {0}")]
    EncodeError(String),

    #[error("trace must contain at least one segment")]
    EmptyTrace,

    #[error("cannot combine segments: {0}")]
    IncompatibleSegment(String),

    #[error("trace is not contiguous, {0} segments")]
    NotContiguous(usize),

    #[error("cannot merge {first} samples with {other} samples")]
    MixedSampleWidths {
        first: &'static str,
        other: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, MseedError>;
