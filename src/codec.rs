//! Codec registry: payload bytes to typed samples and back.
//!
//! [`decode`] dispatches on [`EncodingFormat`] to the fixed-width readers or
//! the Steim decoders. Integrity problems that are not structural (a Steim
//! reverse integration constant that disagrees with the last sample) are
//! reported through [`Decoded::warnings`] unless strict decoding is
//! requested.

use tracing::warn;

use crate::buffer::ByteView;
use crate::options::DecodeOptions;
use crate::samples::Samples;
use crate::steim::{self, SteimKind};
use crate::types::{ByteOrder, EncodingFormat};
use crate::{MseedError, Result};

/// A non-fatal integrity problem noticed while parsing or decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityWarning {
    /// The stored CRC of a v3 record differs from the computed value.
    CrcMismatch { stored: u32, computed: u32 },
    /// The Steim reverse integration constant differs from the last sample.
    ReverseIntegration { expected: i32, actual: i32 },
}

/// Result of decoding one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub samples: Samples,
    pub warnings: Vec<IntegrityWarning>,
}

/// Decode `num_samples` values from a payload.
pub fn decode(
    payload: &[u8],
    encoding: EncodingFormat,
    num_samples: usize,
    byte_order: ByteOrder,
    options: &DecodeOptions,
) -> Result<Decoded> {
    let view = ByteView::new(payload, byte_order);
    let samples = match encoding {
        EncodingFormat::Text => return Err(MseedError::NonNumericEncoding(encoding)),
        EncodingFormat::Int16 => {
            Samples::Int(read_strided(&view, encoding, num_samples, |v, o| {
                v.i16(o).map(i32::from)
            })?)
        }
        EncodingFormat::Int32 => {
            Samples::Int(read_strided(&view, encoding, num_samples, |v, o| v.i32(o))?)
        }
        EncodingFormat::Float32 => {
            Samples::Float(read_strided(&view, encoding, num_samples, |v, o| v.f32(o))?)
        }
        EncodingFormat::Float64 => {
            Samples::Double(read_strided(&view, encoding, num_samples, |v, o| v.f64(o))?)
        }
        EncodingFormat::Steim1 | EncodingFormat::Steim2 => {
            return decode_steim(payload, encoding, num_samples, byte_order, options);
        }
    };
    Ok(Decoded {
        samples,
        warnings: Vec::new(),
    })
}

/// Check that a payload of `len` bytes can hold `num_samples` values.
///
/// Fixed-width encodings need `num_samples * width` bytes, exactly that
/// many when `exact` is set. Steim payloads need at least one frame, whole
/// frames when `exact` is set, and enough words for the declared count.
pub fn check_payload_length(
    encoding: EncodingFormat,
    num_samples: usize,
    len: usize,
    exact: bool,
) -> Result<()> {
    let mismatch = MseedError::PayloadLength {
        encoding,
        num_samples,
        actual: len,
    };
    match encoding {
        EncodingFormat::Text => Ok(()),
        EncodingFormat::Steim1 | EncodingFormat::Steim2 => {
            if num_samples == 0 {
                return Ok(());
            }
            let frames = len / steim::FRAME_SIZE;
            if frames == 0 || (exact && len % steim::FRAME_SIZE != 0) {
                return Err(mismatch);
            }
            let per_word = if encoding == EncodingFormat::Steim1 { 4 } else { 7 };
            // frame 0 spends two words on the integration constants
            let capacity = (frames * 15 - 2) * per_word;
            if num_samples > capacity {
                return Err(mismatch);
            }
            Ok(())
        }
        _ => {
            let width = encoding.sample_width().unwrap_or(1);
            match num_samples.checked_mul(width) {
                Some(needed) if needed == len || (!exact && needed < len) => Ok(()),
                _ => Err(mismatch),
            }
        }
    }
}

fn read_strided<T>(
    view: &ByteView<'_>,
    encoding: EncodingFormat,
    num_samples: usize,
    read: impl Fn(&ByteView<'_>, usize) -> Result<T>,
) -> Result<Vec<T>> {
    let width = encoding.sample_width().unwrap_or(1);
    let needed = num_samples.checked_mul(width);
    if needed.is_none_or(|needed| needed > view.len()) {
        return Err(MseedError::PayloadLength {
            encoding,
            num_samples,
            actual: view.len(),
        });
    }
    (0..num_samples).map(|i| read(view, i * width)).collect()
}

fn decode_steim(
    payload: &[u8],
    encoding: EncodingFormat,
    num_samples: usize,
    byte_order: ByteOrder,
    options: &DecodeOptions,
) -> Result<Decoded> {
    if num_samples == 0 {
        return Ok(Decoded {
            samples: Samples::Int(Vec::new()),
            warnings: Vec::new(),
        });
    }
    let kind = match encoding {
        EncodingFormat::Steim1 => SteimKind::Steim1,
        _ => SteimKind::Steim2,
    };
    let decoded = steim::decode(kind, payload, num_samples, byte_order)?;
    let mut warnings = Vec::new();
    if let Some((expected, actual)) = decoded.reverse_mismatch() {
        if options.strict_integration_constant {
            return Err(MseedError::IntegrationConstant { expected, actual });
        }
        warn!(expected, actual, "steim reverse integration constant mismatch");
        warnings.push(IntegrityWarning::ReverseIntegration { expected, actual });
    }
    Ok(Decoded {
        samples: Samples::Int(decoded.samples),
        warnings,
    })
}

/// Encode samples into payload bytes.
///
/// Integer encodings and Steim require [`Samples::Int`]; `Int16` fails on
/// values outside the 16-bit range. Float encodings accept any width and
/// convert.
pub fn encode(samples: &Samples, encoding: EncodingFormat, byte_order: ByteOrder) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(samples.len() * encoding.sample_width().unwrap_or(4));
    match encoding {
        EncodingFormat::Text => return Err(MseedError::NonNumericEncoding(encoding)),
        EncodingFormat::Int16 => {
            for &value in require_int(samples, encoding)? {
                let short = i16::try_from(value).map_err(|_| {
                    MseedError::EncodeError(format!("{value} does not fit INT16"))
                })?;
                put(&mut out, byte_order, short.to_be_bytes(), short.to_le_bytes());
            }
        }
        EncodingFormat::Int32 => {
            for &value in require_int(samples, encoding)? {
                put(&mut out, byte_order, value.to_be_bytes(), value.to_le_bytes());
            }
        }
        EncodingFormat::Float32 => {
            for value in samples.iter_f64() {
                let single = value as f32;
                put(&mut out, byte_order, single.to_be_bytes(), single.to_le_bytes());
            }
        }
        EncodingFormat::Float64 => {
            for value in samples.iter_f64() {
                put(&mut out, byte_order, value.to_be_bytes(), value.to_le_bytes());
            }
        }
        EncodingFormat::Steim1 => {
            out = steim::encode_steim1(require_int(samples, encoding)?, byte_order)?;
        }
        EncodingFormat::Steim2 => {
            out = steim::encode_steim2(require_int(samples, encoding)?, byte_order)?;
        }
    }
    Ok(out)
}

fn require_int(samples: &Samples, encoding: EncodingFormat) -> Result<&[i32]> {
    match samples {
        Samples::Int(v) => Ok(v),
        other => Err(MseedError::EncodeError(format!(
            "{encoding} encoding requires integer samples, got {}",
            other.kind()
        ))),
    }
}

fn put<const N: usize>(out: &mut Vec<u8>, byte_order: ByteOrder, be: [u8; N], le: [u8; N]) {
    match byte_order {
        ByteOrder::Big => out.extend_from_slice(&be),
        ByteOrder::Little => out.extend_from_slice(&le),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip(samples: &Samples, encoding: EncodingFormat, order: ByteOrder) -> Samples {
        let bytes = encode(samples, encoding, order).unwrap();
        decode(&bytes, encoding, samples.len(), order, &DecodeOptions::default())
            .unwrap()
            .samples
    }

    #[test]
    fn test_payload_too_short() {
        let bytes = [0u8; 7];
        match decode(&bytes, EncodingFormat::Int32, 2, ByteOrder::Big, &DecodeOptions::default()) {
            Err(MseedError::PayloadLength {
                num_samples: 2,
                actual: 7,
                ..
            }) => {}
            other => panic!("expected PayloadLength, got {other:?}"),
        }
    }

    #[test]
    fn test_check_payload_length() {
        assert!(check_payload_length(EncodingFormat::Int32, 3, 12, true).is_ok());
        assert!(check_payload_length(EncodingFormat::Int32, 3, 16, true).is_err());
        assert!(check_payload_length(EncodingFormat::Int32, 3, 16, false).is_ok());
        assert!(check_payload_length(EncodingFormat::Float64, 2, 15, false).is_err());

        assert!(check_payload_length(EncodingFormat::Steim2, 6, 64, true).is_ok());
        assert!(check_payload_length(EncodingFormat::Steim2, 6, 0, false).is_err());
        assert!(check_payload_length(EncodingFormat::Steim2, 6, 100, true).is_err());
        assert!(check_payload_length(EncodingFormat::Steim1, 53, 64, true).is_err());
        assert!(check_payload_length(EncodingFormat::Steim1, 0, 0, true).is_ok());
    }

    #[test]
    fn test_text_is_not_numeric() {
        let err = decode(b"hello", EncodingFormat::Text, 5, ByteOrder::Big, &DecodeOptions::default())
            .unwrap_err();
        assert!(matches!(err, MseedError::NonNumericEncoding(EncodingFormat::Text)));
    }

    #[test]
    fn test_int16_big_endian_layout() {
        let decoded = decode(
            &[0xFF, 0xFE, 0x00, 0x07],
            EncodingFormat::Int16,
            2,
            ByteOrder::Big,
            &DecodeOptions::default(),
        )
        .unwrap();
        assert_eq!(decoded.samples, Samples::Int(vec![-2, 7]));
    }

    #[test]
    fn test_int16_encode_range_check() {
        assert!(encode(&Samples::Int(vec![40_000]), EncodingFormat::Int16, ByteOrder::Big).is_err());
    }

    #[test]
    fn test_steim_requires_int_samples() {
        assert!(encode(&Samples::Double(vec![1.0]), EncodingFormat::Steim2, ByteOrder::Big).is_err());
    }

    #[test]
    fn test_reverse_constant_warning_and_strict_mode() {
        let mut bytes = encode(&Samples::Int(vec![1, 2, 3]), EncodingFormat::Steim2, ByteOrder::Big)
            .unwrap();
        // overwrite Xₙ
        bytes[8..12].copy_from_slice(&100i32.to_be_bytes());

        let lenient = decode(&bytes, EncodingFormat::Steim2, 3, ByteOrder::Big, &DecodeOptions::default())
            .unwrap();
        assert_eq!(lenient.samples, Samples::Int(vec![1, 2, 3]));
        assert_eq!(
            lenient.warnings,
            vec![IntegrityWarning::ReverseIntegration {
                expected: 100,
                actual: 3
            }]
        );

        let strict = DecodeOptions::new().with_strict_integration_constant(true);
        assert!(matches!(
            decode(&bytes, EncodingFormat::Steim2, 3, ByteOrder::Big, &strict),
            Err(MseedError::IntegrationConstant {
                expected: 100,
                actual: 3
            })
        ));
    }

    proptest! {
        #[test]
        fn int16_roundtrip(v in prop::collection::vec(any::<i16>(), 0..64), big in any::<bool>()) {
            let order = if big { ByteOrder::Big } else { ByteOrder::Little };
            let samples = Samples::Int(v.into_iter().map(i32::from).collect());
            prop_assert_eq!(roundtrip(&samples, EncodingFormat::Int16, order), samples);
        }

        #[test]
        fn int32_roundtrip(v in prop::collection::vec(any::<i32>(), 0..64), big in any::<bool>()) {
            let order = if big { ByteOrder::Big } else { ByteOrder::Little };
            let samples = Samples::Int(v);
            prop_assert_eq!(roundtrip(&samples, EncodingFormat::Int32, order), samples);
        }

        #[test]
        fn float32_roundtrip(v in prop::collection::vec(-1.0e30f32..1.0e30f32, 0..64), big in any::<bool>()) {
            let order = if big { ByteOrder::Big } else { ByteOrder::Little };
            let samples = Samples::Float(v);
            prop_assert_eq!(roundtrip(&samples, EncodingFormat::Float32, order), samples);
        }

        #[test]
        fn float64_roundtrip(v in prop::collection::vec(-1.0e300f64..1.0e300f64, 0..64), big in any::<bool>()) {
            let order = if big { ByteOrder::Big } else { ByteOrder::Little };
            let samples = Samples::Double(v);
            prop_assert_eq!(roundtrip(&samples, EncodingFormat::Float64, order), samples);
        }
    }
}
