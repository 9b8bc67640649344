//! miniSEED v2 data records.
//!
//! A v2 record is a 48-byte fixed section followed by a chain of blockettes
//! and the data payload. Blockette 1000 is required: it carries the payload
//! encoding, the payload word order and the record length. Blockette 100
//! overrides the nominal sample rate and Blockette 1001 adds microseconds
//! to the start time. Other blockettes are skipped.

use std::fmt;

use time::OffsetDateTime;
use tracing::{debug, trace};

use crate::buffer::ByteView;
use crate::codec;
use crate::options::{DecodeOptions, ParseOptions};
use crate::sid::SourceId;
use crate::time::{BTime, NanoTime, checked_end_time, format_iso};
use crate::types::{ByteOrder, EncodingFormat};
use crate::{MseedError, Result};

/// Size of the fixed section of the header.
pub const FIXED_HEADER_SIZE: usize = 48;

const MIN_RECORD_LENGTH_EXP: u8 = 7;
const MAX_RECORD_LENGTH_EXP: u8 = 20;

/// Activity flag bit 1: the time correction is already applied.
const TIME_CORRECTION_APPLIED: u8 = 0x02;

/// The fixed section of a v2 record header.
#[derive(Debug, Clone, PartialEq)]
pub struct DataHeader {
    pub sequence_number: String,
    pub quality: char,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub network: String,
    pub start: BTime,
    pub num_samples: u16,
    pub sample_rate_factor: i16,
    pub sample_rate_multiplier: i16,
    pub activity_flags: u8,
    pub io_flags: u8,
    pub quality_flags: u8,
    pub num_blockettes: u8,
    /// 0.0001 second units.
    pub time_correction: i32,
    pub data_offset: u16,
    pub first_blockette: u16,
    /// Byte order of the header fields, detected from the start year.
    pub byte_order: ByteOrder,
}

impl DataHeader {
    /// Read the fixed section, detecting its byte order.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FIXED_HEADER_SIZE {
            return Err(MseedError::RecordTooShort {
                expected: FIXED_HEADER_SIZE,
                actual: data.len(),
            });
        }
        let byte_order = detect_byte_order(data)?;
        let v = ByteView::new(&data[..FIXED_HEADER_SIZE], byte_order);

        let quality = v.u8(6)? as char;
        let start = BTime {
            year: v.u16(20)?,
            day: v.u16(22)?,
            hour: v.u8(24)?,
            minute: v.u8(25)?,
            second: v.u8(26)?,
            // byte 27 is unused
            fract: v.u16(28)?,
        };
        if start.fract > 9999 {
            return Err(MseedError::InvalidHeader(format!(
                "BTIME fraction {} exceeds 9999",
                start.fract
            )));
        }

        Ok(Self {
            sequence_number: v.padded_str(0, 6)?,
            quality,
            station: v.padded_str(8, 5)?,
            location: v.padded_str(13, 2)?,
            channel: v.padded_str(15, 3)?,
            network: v.padded_str(18, 2)?,
            start,
            num_samples: v.u16(30)?,
            sample_rate_factor: v.i16(32)?,
            sample_rate_multiplier: v.i16(34)?,
            activity_flags: v.u8(36)?,
            io_flags: v.u8(37)?,
            quality_flags: v.u8(38)?,
            num_blockettes: v.u8(39)?,
            time_correction: v.i32(40)?,
            data_offset: v.u16(44)?,
            first_blockette: v.u16(46)?,
            byte_order,
        })
    }

    /// Nominal rate from the factor and multiplier fields.
    pub fn nominal_sample_rate(&self) -> f64 {
        compute_sample_rate(self.sample_rate_factor, self.sample_rate_multiplier)
    }

    pub fn nslc(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

/// A blockette from the chain following the fixed section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Blockette {
    /// Actual sample rate.
    B100 { sample_rate: f32 },
    /// Data-only SEED blockette.
    B1000 {
        encoding: u8,
        word_order: u8,
        record_length_exp: u8,
    },
    /// Data extension blockette.
    B1001 {
        timing_quality: u8,
        microseconds: i8,
        frame_count: u8,
    },
    Unknown { kind: u16, offset: usize },
}

impl Blockette {
    pub fn kind(&self) -> u16 {
        match self {
            Blockette::B100 { .. } => 100,
            Blockette::B1000 { .. } => 1000,
            Blockette::B1001 { .. } => 1001,
            Blockette::Unknown { kind, .. } => *kind,
        }
    }
}

/// Whether `data` starts with something shaped like a v2 fixed header.
pub fn looks_like_v2(data: &[u8]) -> bool {
    if data.len() < FIXED_HEADER_SIZE {
        return false;
    }
    let sequence_ok = data[..6]
        .iter()
        .all(|&b| b.is_ascii_digit() || b == b' ' || b == 0);
    sequence_ok
        && matches!(data[6], b'D' | b'R' | b'Q' | b'M')
        && matches!(data[7], b' ' | 0)
        && data[24] <= 23
        && data[25] <= 59
        && data[26] <= 60
}

/// Total length of the record at the start of `data`, from Blockette 1000.
pub fn record_length(data: &[u8]) -> Result<usize> {
    let header = DataHeader::parse(data)?;
    let blockettes = read_blockettes(data, &header)?;
    let (_, _, exp) = find_b1000(&blockettes)?;
    length_from_exp(exp)
}

/// A parsed v2 record borrowing its payload from the input buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord<'a> {
    header: DataHeader,
    blockettes: Vec<Blockette>,
    source_id: SourceId,
    start: OffsetDateTime,
    sample_rate: f64,
    encoding: EncodingFormat,
    payload_order: ByteOrder,
    record_length: usize,
    payload: &'a [u8],
    decode_options: DecodeOptions,
}

impl<'a> DataRecord<'a> {
    /// Parse with default options.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        Self::parse_with(data, &ParseOptions::default())
    }

    /// Parse the record at the start of `data`. Trailing bytes beyond the
    /// record length are ignored. v2 records carry no CRC, so only the
    /// decode options are kept.
    pub fn parse_with(data: &'a [u8], options: &ParseOptions) -> Result<Self> {
        let header = DataHeader::parse(data)?;
        let blockettes = read_blockettes(data, &header)?;
        let (code, word_order, exp) = find_b1000(&blockettes)?;
        let record_length = length_from_exp(exp)?;
        if data.len() < record_length {
            return Err(MseedError::RecordTooShort {
                expected: record_length,
                actual: data.len(),
            });
        }
        let encoding = EncodingFormat::from_code(code)?;
        let payload_order = if word_order == 0 {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        };

        let num_samples = header.num_samples as usize;
        let data_offset = header.data_offset as usize;
        let payload = if data_offset == 0 && num_samples == 0 {
            &data[..0]
        } else if data_offset < FIXED_HEADER_SIZE || data_offset > record_length {
            return Err(MseedError::InvalidHeader(format!(
                "data offset {data_offset} outside record of {record_length} bytes"
            )));
        } else {
            &data[data_offset..record_length]
        };
        codec::check_payload_length(encoding, num_samples, payload.len(), false)?;

        let source_id = SourceId::from_nslc(
            &header.network,
            &header.station,
            &header.location,
            &header.channel,
        )?;
        let start = start_time(&header, &blockettes)?;
        let sample_rate = blockettes
            .iter()
            .find_map(|b| match b {
                Blockette::B100 { sample_rate } => Some(*sample_rate as f64),
                _ => None,
            })
            .unwrap_or_else(|| header.nominal_sample_rate());
        checked_end_time(start, num_samples, sample_rate)?;

        trace!(
            nslc = %header.nslc(),
            record_length,
            num_samples,
            %encoding,
            "parsed v2 record"
        );

        Ok(Self {
            header,
            blockettes,
            source_id,
            start,
            sample_rate,
            encoding,
            payload_order,
            record_length,
            payload,
            decode_options: options.decode,
        })
    }

    pub fn header(&self) -> &DataHeader {
        &self.header
    }

    pub fn blockettes(&self) -> &[Blockette] {
        &self.blockettes
    }

    /// Identifier synthesized from the NSLC codes.
    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// Start time with the time correction and Blockette 1001 applied.
    pub fn start_time(&self) -> OffsetDateTime {
        self.start
    }

    /// Blockette 100 rate if present, else the nominal rate.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn num_samples(&self) -> usize {
        self.header.num_samples as usize
    }

    pub fn encoding(&self) -> EncodingFormat {
        self.encoding
    }

    /// Word order of the payload, from Blockette 1000.
    pub fn payload_byte_order(&self) -> ByteOrder {
        self.payload_order
    }

    pub fn record_length(&self) -> usize {
        self.record_length
    }

    /// Payload bytes from the data offset to the end of the record.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Options the payload is decompressed with.
    pub fn decode_options(&self) -> DecodeOptions {
        self.decode_options
    }
}

impl fmt::Display for DataRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        writeln!(
            f,
            "{}, {}, {}, {} bytes (format: 2)",
            self.source_id, h.sequence_number, h.quality, self.record_length
        )?;
        writeln!(f, "             start time: {}", format_iso(self.start))?;
        writeln!(f, "      number of samples: {}", h.num_samples)?;
        writeln!(f, "       sample rate (Hz): {}", self.sample_rate)?;
        writeln!(f, "   number of blockettes: {}", h.num_blockettes)?;
        writeln!(f, "        time correction: {}", h.time_correction)?;
        writeln!(f, "            data offset: {}", h.data_offset)?;
        write!(
            f,
            "       payload encoding: {} (val: {})",
            self.encoding.description(),
            self.encoding.to_code()
        )
    }
}

/// The year of a valid header lies in 1900..=2100 when read in the right
/// byte order.
fn detect_byte_order(data: &[u8]) -> Result<ByteOrder> {
    let year = |order| ByteView::new(data, order).u16(20);
    let plausible = |y: u16| (1900..=2100).contains(&y);
    if plausible(year(ByteOrder::Big)?) {
        Ok(ByteOrder::Big)
    } else if plausible(year(ByteOrder::Little)?) {
        Ok(ByteOrder::Little)
    } else {
        Err(MseedError::InvalidHeader(format!(
            "start year {} not plausible in either byte order",
            year(ByteOrder::Big)?
        )))
    }
}

fn read_blockettes(data: &[u8], header: &DataHeader) -> Result<Vec<Blockette>> {
    let v = ByteView::new(data, header.byte_order);
    let mut blockettes = Vec::new();
    let mut offset = header.first_blockette as usize;
    while offset != 0 {
        if offset < FIXED_HEADER_SIZE {
            return Err(MseedError::InvalidHeader(format!(
                "blockette offset {offset} inside fixed header"
            )));
        }
        let kind = v.u16(offset)?;
        let next = v.u16(offset + 2)? as usize;
        let blockette = match kind {
            100 => Blockette::B100 {
                sample_rate: v.f32(offset + 4)?,
            },
            1000 => Blockette::B1000 {
                encoding: v.u8(offset + 4)?,
                word_order: v.u8(offset + 5)?,
                record_length_exp: v.u8(offset + 6)?,
            },
            1001 => Blockette::B1001 {
                timing_quality: v.u8(offset + 4)?,
                microseconds: v.u8(offset + 5)? as i8,
                frame_count: v.u8(offset + 7)?,
            },
            _ => {
                debug!(kind, offset, "skipping unknown blockette");
                Blockette::Unknown { kind, offset }
            }
        };
        blockettes.push(blockette);
        // the chain only moves forward
        if next != 0 && next <= offset {
            return Err(MseedError::InvalidHeader(format!(
                "blockette at {offset} points back to {next}"
            )));
        }
        offset = next;
    }
    Ok(blockettes)
}

fn find_b1000(blockettes: &[Blockette]) -> Result<(u8, u8, u8)> {
    blockettes
        .iter()
        .find_map(|b| match *b {
            Blockette::B1000 {
                encoding,
                word_order,
                record_length_exp,
            } => Some((encoding, word_order, record_length_exp)),
            _ => None,
        })
        .ok_or(MseedError::MissingBlockette1000)
}

fn length_from_exp(exp: u8) -> Result<usize> {
    if !(MIN_RECORD_LENGTH_EXP..=MAX_RECORD_LENGTH_EXP).contains(&exp) {
        return Err(MseedError::InvalidHeader(format!(
            "record length exponent {exp} out of range"
        )));
    }
    Ok(1usize << exp)
}

fn start_time(header: &DataHeader, blockettes: &[Blockette]) -> Result<OffsetDateTime> {
    let mut start = NanoTime::from_btime(&header.start).to_datetime()?;
    if header.activity_flags & TIME_CORRECTION_APPLIED == 0 && header.time_correction != 0 {
        start += time::Duration::microseconds(header.time_correction as i64 * 100);
    }
    if let Some(us) = blockettes.iter().find_map(|b| match b {
        Blockette::B1001 { microseconds, .. } => Some(*microseconds),
        _ => None,
    }) {
        start += time::Duration::microseconds(us as i64);
    }
    Ok(start)
}

/// Sample rate in Hz from the SEED factor and multiplier.
///
/// Positive values are multipliers, negative values are divisors. A zero
/// factor or multiplier means no rate.
pub fn compute_sample_rate(factor: i16, multiplier: i16) -> f64 {
    if factor == 0 || multiplier == 0 {
        return 0.0;
    }
    let f = factor as f64;
    let m = multiplier as f64;
    match (factor > 0, multiplier > 0) {
        (true, true) => f * m,
        (true, false) => -f / m,
        (false, true) => -m / f,
        (false, false) => 1.0 / (f * m),
    }
}
