//! Steim1 and Steim2 compression and decompression.
//!
//! These are differential integer compression schemes used in seismological
//! data (SEED/miniSEED format). See Appendix B of the SEED Manual v2.4.
//!
//! Data is organised in 64-byte frames of sixteen 32-bit words. Word 0 of
//! each frame holds sixteen 2-bit nibbles describing how each word is
//! packed. In frame 0, word 1 is the forward integration constant X₀ (the
//! first sample) and word 2 the reverse integration constant Xₙ (the last
//! sample).

use tracing::debug;

use crate::buffer::ByteView;
use crate::types::ByteOrder;
use crate::{MseedError, Result};

pub const FRAME_SIZE: usize = 64;
const WORDS_PER_FRAME: usize = 16;

/// Which Steim variant a frame sequence uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteimKind {
    Steim1,
    Steim2,
}

/// Samples recovered from Steim frames, with the reverse integration
/// constant found in the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SteimDecoded {
    pub samples: Vec<i32>,
    pub reverse_constant: i32,
}

impl SteimDecoded {
    /// `(Xₙ, last sample)` when the last sample disagrees with Xₙ.
    pub fn reverse_mismatch(&self) -> Option<(i32, i32)> {
        match self.samples.last() {
            Some(&last) if last != self.reverse_constant => Some((self.reverse_constant, last)),
            _ => None,
        }
    }
}

fn nibble(control_word: u32, word_index: usize) -> u8 {
    ((control_word >> (30 - word_index * 2)) & 0x03) as u8
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    (value as i32).wrapping_shl(shift).wrapping_shr(shift)
}

/// Up to seven differences unpacked from one data word.
struct Diffs {
    values: [i32; 7],
    len: usize,
}

impl Diffs {
    fn none() -> Self {
        Self {
            values: [0; 7],
            len: 0,
        }
    }

    /// `count` fields of `bits` each, the first starting at bit `top`.
    fn fields(word: u32, count: usize, bits: u32, top: u32) -> Self {
        let mut out = Self::none();
        let mask = if bits == 32 { u32::MAX } else { (1u32 << bits) - 1 };
        for i in 0..count {
            let shift = top - i as u32 * bits;
            out.values[i] = sign_extend((word >> shift) & mask, bits);
        }
        out.len = count;
        out
    }

    fn as_slice(&self) -> &[i32] {
        &self.values[..self.len]
    }
}

fn unpack_word(kind: SteimKind, word: u32, nib: u8) -> Result<Diffs> {
    let dnib = ((word >> 30) & 0x03) as u8;
    let diffs = match (kind, nib) {
        (_, 0b00) => Diffs::none(),
        (_, 0b01) => Diffs::fields(word, 4, 8, 24),
        (SteimKind::Steim1, 0b10) => Diffs::fields(word, 2, 16, 16),
        (SteimKind::Steim1, _) => Diffs::fields(word, 1, 32, 0),
        (SteimKind::Steim2, 0b10) => match dnib {
            0b01 => Diffs::fields(word, 1, 30, 0),
            0b10 => Diffs::fields(word, 2, 15, 15),
            0b11 => Diffs::fields(word, 3, 10, 20),
            _ => {
                return Err(MseedError::SteimDecode(format!(
                    "steim2 nibble=10 invalid dnib={dnib}"
                )));
            }
        },
        (SteimKind::Steim2, _) => match dnib {
            0b00 => Diffs::fields(word, 5, 6, 24),
            0b01 => Diffs::fields(word, 6, 5, 25),
            0b10 => Diffs::fields(word, 7, 4, 24),
            _ => {
                return Err(MseedError::SteimDecode(format!(
                    "steim2 nibble=11 invalid dnib={dnib}"
                )));
            }
        },
    };
    Ok(diffs)
}

/// Decode Steim frames into `num_samples` integers.
///
/// The first difference is relative to the previous record and is ignored:
/// the first sample is X₀. Decoding stops once `num_samples` values exist,
/// so trailing padding frames are never read.
pub fn decode(
    kind: SteimKind,
    data: &[u8],
    num_samples: usize,
    byte_order: ByteOrder,
) -> Result<SteimDecoded> {
    let num_frames = data.len() / FRAME_SIZE;
    if num_frames == 0 {
        return Err(MseedError::SteimDecode(format!(
            "payload of {} bytes holds no complete frame",
            data.len()
        )));
    }
    if !data.len().is_multiple_of(FRAME_SIZE) {
        debug!(
            trailing = data.len() % FRAME_SIZE,
            "ignoring bytes after last complete steim frame"
        );
    }

    let view = ByteView::new(data, byte_order);
    let x0 = view.i32(4)?;
    let xn = view.i32(8)?;

    let mut samples = Vec::with_capacity(num_samples);
    let mut acc = x0;

    'frames: for frame_idx in 0..num_frames {
        if samples.len() >= num_samples {
            break;
        }
        let frame_offset = frame_idx * FRAME_SIZE;
        let control_word = view.u32(frame_offset)?;

        for word_idx in 1..WORDS_PER_FRAME {
            // X₀ and Xₙ occupy words 1 and 2 of frame 0
            if frame_idx == 0 && word_idx < 3 {
                continue;
            }
            let word = view.u32(frame_offset + word_idx * 4)?;
            let diffs = unpack_word(kind, word, nibble(control_word, word_idx))?;
            for &diff in diffs.as_slice() {
                if samples.len() >= num_samples {
                    break 'frames;
                }
                if samples.is_empty() {
                    samples.push(x0);
                } else {
                    acc = acc.wrapping_add(diff);
                    samples.push(acc);
                }
            }
        }
    }

    if samples.len() != num_samples {
        return Err(MseedError::SampleCountMismatch {
            expected: num_samples,
            actual: samples.len(),
        });
    }

    Ok(SteimDecoded {
        samples,
        reverse_constant: xn,
    })
}

/// Decode Steim1 compressed data into i32 samples.
pub fn decode_steim1(data: &[u8], num_samples: usize, byte_order: ByteOrder) -> Result<SteimDecoded> {
    decode(SteimKind::Steim1, data, num_samples, byte_order)
}

/// Decode Steim2 compressed data into i32 samples.
pub fn decode_steim2(data: &[u8], num_samples: usize, byte_order: ByteOrder) -> Result<SteimDecoded> {
    decode(SteimKind::Steim2, data, num_samples, byte_order)
}

/// Encode i32 samples as Steim frames.
///
/// The first difference is written as zero, X₀ and Xₙ are the first and
/// last samples.
pub fn encode(kind: SteimKind, samples: &[i32], byte_order: ByteOrder) -> Result<Vec<u8>> {
    let (Some(&x0), Some(&xn)) = (samples.first(), samples.last()) else {
        return Err(MseedError::EncodeError("no samples to encode".into()));
    };

    let mut diffs = Vec::with_capacity(samples.len());
    diffs.push(0i32);
    diffs.extend(samples.windows(2).map(|w| w[1].wrapping_sub(w[0])));

    let mut frames: Vec<[u32; WORDS_PER_FRAME]> = Vec::new();
    let mut diff_idx = 0;

    while diff_idx < diffs.len() {
        let mut frame = [0u32; WORDS_PER_FRAME];
        let mut control: u32 = 0;

        let start_word = if frames.is_empty() {
            frame[1] = x0 as u32;
            frame[2] = xn as u32;
            3
        } else {
            1
        };

        for word_idx in start_word..WORDS_PER_FRAME {
            if diff_idx >= diffs.len() {
                break;
            }
            let (packed_word, nib, consumed) = match kind {
                SteimKind::Steim1 => steim1_pack(&diffs[diff_idx..]),
                SteimKind::Steim2 => steim2_pack(&diffs[diff_idx..])?,
            };
            frame[word_idx] = packed_word;
            control |= (nib as u32) << (30 - word_idx * 2);
            diff_idx += consumed;
        }

        frame[0] = control;
        frames.push(frame);
    }

    let mut output = Vec::with_capacity(frames.len() * FRAME_SIZE);
    for word in frames.iter().flatten() {
        match byte_order {
            ByteOrder::Big => output.extend_from_slice(&word.to_be_bytes()),
            ByteOrder::Little => output.extend_from_slice(&word.to_le_bytes()),
        }
    }
    Ok(output)
}

/// Encode i32 samples using Steim1 compression.
pub fn encode_steim1(samples: &[i32], byte_order: ByteOrder) -> Result<Vec<u8>> {
    encode(SteimKind::Steim1, samples, byte_order)
}

/// Encode i32 samples using Steim2 compression.
pub fn encode_steim2(samples: &[i32], byte_order: ByteOrder) -> Result<Vec<u8>> {
    encode(SteimKind::Steim2, samples, byte_order)
}

fn fits(diffs: &[i32], count: usize, bits: u32) -> bool {
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    diffs.len() >= count
        && diffs[..count]
            .iter()
            .all(|&d| (min..=max).contains(&(d as i64)))
}

fn pack_fields(diffs: &[i32], count: usize, bits: u32, top: u32) -> u32 {
    let mask = (1u32 << bits) - 1;
    diffs[..count]
        .iter()
        .enumerate()
        .fold(0u32, |word, (i, &d)| {
            word | (((d as u32) & mask) << (top - i as u32 * bits))
        })
}

/// Pack consecutive diffs into a single Steim1 word.
/// Returns (packed_word, nibble, num_consumed).
fn steim1_pack(diffs: &[i32]) -> (u32, u8, usize) {
    if fits(diffs, 4, 8) {
        return (pack_fields(diffs, 4, 8, 24), 0b01, 4);
    }
    if fits(diffs, 2, 16) {
        return (pack_fields(diffs, 2, 16, 16), 0b10, 2);
    }
    (diffs[0] as u32, 0b11, 1)
}

/// Pack consecutive diffs into a single Steim2 word.
fn steim2_pack(diffs: &[i32]) -> Result<(u32, u8, usize)> {
    if fits(diffs, 7, 4) {
        return Ok(((0b10 << 30) | pack_fields(diffs, 7, 4, 24), 0b11, 7));
    }
    if fits(diffs, 6, 5) {
        return Ok(((0b01 << 30) | pack_fields(diffs, 6, 5, 25), 0b11, 6));
    }
    if fits(diffs, 5, 6) {
        return Ok((pack_fields(diffs, 5, 6, 24), 0b11, 5));
    }
    if fits(diffs, 4, 8) {
        return Ok((pack_fields(diffs, 4, 8, 24), 0b01, 4));
    }
    if fits(diffs, 3, 10) {
        return Ok(((0b11 << 30) | pack_fields(diffs, 3, 10, 20), 0b10, 3));
    }
    if fits(diffs, 2, 15) {
        return Ok(((0b10 << 30) | pack_fields(diffs, 2, 15, 15), 0b10, 2));
    }
    if fits(diffs, 1, 30) {
        return Ok(((0b01 << 30) | pack_fields(diffs, 1, 30, 0), 0b10, 1));
    }
    Err(MseedError::EncodeError(format!(
        "difference {} exceeds the 30-bit steim2 range",
        diffs[0]
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: [i32; 6] = [-7, -50, -58, -46, -31, 17];

    /// Hand-packed Steim1 frame: X₀=-7, Xₙ=17, one word of four 8-bit
    /// diffs [0,-43,-8,12] and one of two 16-bit diffs [15,48].
    fn steim1_fixture_frame() -> Vec<u8> {
        let mut words = [0u32; 16];
        words[0] = (0b01 << (30 - 6)) | (0b10 << (30 - 8));
        words[1] = -7i32 as u32;
        words[2] = 17u32;
        words[3] = u32::from_be_bytes([0, (-43i8) as u8, (-8i8) as u8, 12]);
        words[4] = (15u32 << 16) | 48;
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn test_steim1_hand_packed_frame() {
        let decoded = decode_steim1(&steim1_fixture_frame(), 6, ByteOrder::Big).unwrap();
        assert_eq!(decoded.samples, FIXTURE);
        assert_eq!(decoded.reverse_constant, 17);
        assert_eq!(decoded.reverse_mismatch(), None);
    }

    #[test]
    fn test_first_difference_is_ignored() {
        // A non-zero first diff refers to the previous record and must not
        // shift the first sample away from X₀.
        let mut frame = steim1_fixture_frame();
        frame[12] = 99;
        let decoded = decode_steim1(&frame, 6, ByteOrder::Big).unwrap();
        assert_eq!(decoded.samples, FIXTURE);
    }

    #[test]
    fn test_stops_at_num_samples() {
        let decoded = decode_steim1(&steim1_fixture_frame(), 3, ByteOrder::Big).unwrap();
        assert_eq!(decoded.samples, vec![-7, -50, -58]);
        // Xₙ refers to the full record, so a short read reports a mismatch
        assert_eq!(decoded.reverse_mismatch(), Some((17, -58)));
    }

    #[test]
    fn test_too_few_samples_in_frames() {
        match decode_steim1(&steim1_fixture_frame(), 7, ByteOrder::Big) {
            Err(MseedError::SampleCountMismatch {
                expected: 7,
                actual: 6,
            }) => {}
            other => panic!("expected SampleCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_short_payload_is_error() {
        assert!(matches!(
            decode_steim2(&[0u8; 40], 1, ByteOrder::Big),
            Err(MseedError::SteimDecode(_))
        ));
    }

    #[test]
    fn test_steim2_invalid_dnib() {
        let mut words = [0u32; 16];
        words[0] = 0b10 << (30 - 6);
        words[3] = 0; // nibble 10 with dnib 00 is reserved
        let frame: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        assert!(matches!(
            decode_steim2(&frame, 2, ByteOrder::Big),
            Err(MseedError::SteimDecode(_))
        ));
    }

    #[test]
    fn test_steim1_roundtrip() {
        let samples: Vec<i32> = (0..100).collect();
        let encoded = encode_steim1(&samples, ByteOrder::Big).unwrap();
        assert!(encoded.len().is_multiple_of(FRAME_SIZE));
        let decoded = decode_steim1(&encoded, samples.len(), ByteOrder::Big).unwrap();
        assert_eq!(decoded.samples, samples);
    }

    #[test]
    fn test_steim2_roundtrip_fixture() {
        let encoded = encode_steim2(&FIXTURE, ByteOrder::Big).unwrap();
        assert_eq!(encoded.len(), FRAME_SIZE);
        let decoded = decode_steim2(&encoded, FIXTURE.len(), ByteOrder::Big).unwrap();
        assert_eq!(decoded.samples, FIXTURE);
    }

    #[test]
    fn test_steim_roundtrip_random() {
        let mut rng_state: u32 = 42;
        let mut samples = Vec::with_capacity(500);
        let mut val: i32 = 0;
        for i in 0..500 {
            rng_state = rng_state.wrapping_mul(1103515245).wrapping_add(12345);
            // mix small and large differences to exercise every packing
            let spread = [8, 30, 500, 20_000, 400_000][i % 5];
            let diff = ((rng_state >> 8) as i32 % spread) - spread / 2;
            val = val.wrapping_add(diff);
            samples.push(val);
        }

        for kind in [SteimKind::Steim1, SteimKind::Steim2] {
            let encoded = encode(kind, &samples, ByteOrder::Big).unwrap();
            let decoded = decode(kind, &encoded, samples.len(), ByteOrder::Big).unwrap();
            assert_eq!(decoded.samples, samples, "{kind:?}");
            assert_eq!(decoded.reverse_mismatch(), None);
        }
    }

    #[test]
    fn test_steim2_rejects_oversized_difference() {
        let samples = [0, 1 << 30];
        assert!(matches!(
            encode_steim2(&samples, ByteOrder::Big),
            Err(MseedError::EncodeError(_))
        ));
        // steim1 carries full 32-bit differences
        let encoded = encode_steim1(&samples, ByteOrder::Big).unwrap();
        let decoded = decode_steim1(&encoded, 2, ByteOrder::Big).unwrap();
        assert_eq!(decoded.samples, samples);
    }

    #[test]
    fn test_empty_encode_is_error() {
        assert!(encode_steim1(&[], ByteOrder::Big).is_err());
    }
}
