//! Shared types: [`ByteOrder`], [`EncodingFormat`], and [`FormatVersion`].

use std::fmt;

use crate::{MseedError, Result};

/// miniSEED format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    /// miniSEED v2 (SEED Manual, 48-byte fixed header + blockettes).
    V2,
    /// miniSEED v3 (FDSN, 40-byte fixed header, little-endian).
    V3,
}

impl FormatVersion {
    /// The numeric format version as written in a v3 header.
    pub fn number(self) -> u8 {
        match self {
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V2 => write!(f, "miniSEED v2"),
            Self::V3 => write!(f, "miniSEED v3"),
        }
    }
}

/// Byte order for multi-byte fields in a miniSEED record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

/// Encoding of the data payload of a record.
///
/// The numeric codes are shared by v2 (Blockette 1000) and v3 (fixed header
/// byte 15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingFormat {
    /// Text, UTF-8 or ASCII (code 0).
    Text,
    /// 16-bit signed integer (code 1).
    Int16,
    /// 32-bit signed integer (code 3).
    Int32,
    /// 32-bit IEEE float (code 4).
    Float32,
    /// 64-bit IEEE double (code 5).
    Float64,
    /// Steim-1 compressed integers (code 10).
    Steim1,
    /// Steim-2 compressed integers (code 11).
    Steim2,
}

impl EncodingFormat {
    /// Convert a raw encoding code to an `EncodingFormat`.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Text),
            1 => Ok(Self::Int16),
            3 => Ok(Self::Int32),
            4 => Ok(Self::Float32),
            5 => Ok(Self::Float64),
            10 => Ok(Self::Steim1),
            11 => Ok(Self::Steim2),
            _ => Err(MseedError::UnsupportedEncoding(code)),
        }
    }

    /// Convert to the raw encoding code.
    pub fn to_code(self) -> u8 {
        match self {
            Self::Text => 0,
            Self::Int16 => 1,
            Self::Int32 => 3,
            Self::Float32 => 4,
            Self::Float64 => 5,
            Self::Steim1 => 10,
            Self::Steim2 => 11,
        }
    }

    /// Bytes per sample for the fixed-width encodings, `None` otherwise.
    pub fn sample_width(self) -> Option<usize> {
        match self {
            Self::Int16 => Some(2),
            Self::Int32 | Self::Float32 => Some(4),
            Self::Float64 => Some(8),
            Self::Text | Self::Steim1 | Self::Steim2 => None,
        }
    }

    pub fn is_steim(self) -> bool {
        matches!(self, Self::Steim1 | Self::Steim2)
    }

    /// Descriptive name used in record text renderings.
    pub fn description(self) -> &'static str {
        match self {
            Self::Text => "Text, UTF-8 allowed, use ASCII for maximum portability",
            Self::Int16 => "16-bit integer",
            Self::Int32 => "32-bit integer",
            Self::Float32 => "32-bit float (IEEE single)",
            Self::Float64 => "64-bit float (IEEE double)",
            Self::Steim1 => "STEIM-1 integer compression",
            Self::Steim2 => "STEIM-2 integer compression",
        }
    }
}

impl fmt::Display for EncodingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "TEXT"),
            Self::Int16 => write!(f, "INT16"),
            Self::Int32 => write!(f, "INT32"),
            Self::Float32 => write!(f, "FLOAT32"),
            Self::Float64 => write!(f, "FLOAT64"),
            Self::Steim1 => write!(f, "Steim1"),
            Self::Steim2 => write!(f, "Steim2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_codes_roundtrip() {
        for code in [0u8, 1, 3, 4, 5, 10, 11] {
            let enc = EncodingFormat::from_code(code).unwrap();
            assert_eq!(enc.to_code(), code);
        }
    }

    #[test]
    fn test_unknown_encoding_names_code() {
        match EncodingFormat::from_code(19) {
            Err(MseedError::UnsupportedEncoding(19)) => {}
            other => panic!("expected UnsupportedEncoding(19), got {other:?}"),
        }
        let err = EncodingFormat::from_code(2).unwrap_err();
        assert_eq!(err.to_string(), "unsupported encoding format: 2");
    }

    #[test]
    fn test_sample_width() {
        assert_eq!(EncodingFormat::Int16.sample_width(), Some(2));
        assert_eq!(EncodingFormat::Float64.sample_width(), Some(8));
        assert_eq!(EncodingFormat::Steim2.sample_width(), None);
    }
}
