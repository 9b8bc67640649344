//! miniSEED v3 records.
//!
//! The v3 format uses a 40-byte fixed header (little-endian), followed by
//! the variable-length Source Identifier, optional JSON extra headers, and
//! the data payload. The header carries a CRC-32C of the whole record,
//! computed with the CRC field zeroed.

use std::fmt;

use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{debug, trace, warn};

use crate::buffer::ByteView;
use crate::codec::{self, IntegrityWarning};
use crate::crc::{self, CrcStatus};
use crate::options::{DecodeOptions, ParseOptions};
use crate::sid::SourceId;
use crate::time::{NanoTime, checked_end_time, format_iso};
use crate::types::{ByteOrder, EncodingFormat};
use crate::{MseedError, Result};

/// Size of the fixed header.
pub const FIXED_HEADER_SIZE: usize = 40;

/// `M`, `S`, format version 3.
pub const MAGIC: [u8; 3] = [b'M', b'S', 3];

/// The fixed header of a v3 record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MSeed3Header {
    pub flags: u8,
    pub start: NanoTime,
    pub encoding_code: u8,
    /// Positive: rate in Hz. Negative: `-period` in seconds.
    pub sample_rate_period: f64,
    pub num_samples: u32,
    pub crc: u32,
    pub publication_version: u8,
    pub identifier_length: u8,
    pub extra_headers_length: u16,
    pub data_length: u32,
}

impl MSeed3Header {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FIXED_HEADER_SIZE {
            return Err(MseedError::RecordTooShort {
                expected: FIXED_HEADER_SIZE,
                actual: data.len(),
            });
        }
        if data[..3] != MAGIC {
            return Err(MseedError::InvalidV3Header(
                "missing 'MS' magic or version != 3".into(),
            ));
        }
        let v = ByteView::new(data, ByteOrder::Little);
        Ok(Self {
            flags: v.u8(3)?,
            start: NanoTime {
                nanosecond: v.u32(4)?,
                year: v.u16(8)?,
                day: v.u16(10)?,
                hour: v.u8(12)?,
                minute: v.u8(13)?,
                second: v.u8(14)?,
            },
            encoding_code: v.u8(15)?,
            sample_rate_period: v.f64(16)?,
            num_samples: v.u32(24)?,
            crc: v.u32(28)?,
            publication_version: v.u8(32)?,
            identifier_length: v.u8(33)?,
            extra_headers_length: v.u16(34)?,
            data_length: v.u32(36)?,
        })
    }

    /// Total record length declared by the header.
    pub fn record_length(&self) -> usize {
        FIXED_HEADER_SIZE
            + self.identifier_length as usize
            + self.extra_headers_length as usize
            + self.data_length as usize
    }

    /// Sample rate in Hz. Zero when the record has no rate.
    pub fn sample_rate(&self) -> f64 {
        rate_from_rate_or_period(self.sample_rate_period)
    }
}

/// Reconcile the header rate-or-period value into Hz.
pub fn rate_from_rate_or_period(value: f64) -> f64 {
    if value < 0.0 { -1.0 / value } else { value }
}

/// Whether `data` starts with the v3 magic.
pub fn looks_like_v3(data: &[u8]) -> bool {
    data.len() >= MAGIC.len() && data[..3] == MAGIC
}

/// Total length of the record at the start of `data`.
pub fn record_length(data: &[u8]) -> Result<usize> {
    Ok(MSeed3Header::parse(data)?.record_length())
}

/// A parsed v3 record borrowing from the input buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct MSeed3Record<'a> {
    header: MSeed3Header,
    source_id: SourceId,
    identifier: &'a str,
    extra_headers: &'a str,
    encoding: EncodingFormat,
    start: OffsetDateTime,
    crc_status: CrcStatus,
    raw: &'a [u8],
    payload: &'a [u8],
    decode_options: DecodeOptions,
}

impl<'a> MSeed3Record<'a> {
    /// Parse with default options.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        Self::parse_with(data, &ParseOptions::default())
    }

    /// Parse the record at the start of `data`. Trailing bytes beyond the
    /// declared length are ignored.
    pub fn parse_with(data: &'a [u8], options: &ParseOptions) -> Result<Self> {
        let header = MSeed3Header::parse(data)?;
        let total = header.record_length();
        let raw = data.get(..total).ok_or(MseedError::RecordTooShort {
            expected: total,
            actual: data.len(),
        })?;

        let crc_status = if options.verify_crc {
            crc::verify_v3_crc(raw)
        } else {
            CrcStatus::NotChecked
        };
        if let CrcStatus::Mismatch { stored, computed } = crc_status {
            if options.reject_crc_mismatch {
                return Err(MseedError::CrcMismatch { stored, computed });
            }
            warn!(stored, computed, "v3 record CRC mismatch");
        }

        let v = ByteView::new(raw, ByteOrder::Little);
        let sid_len = header.identifier_length as usize;
        let extra_len = header.extra_headers_length as usize;
        let identifier = v
            .utf8(FIXED_HEADER_SIZE, sid_len)
            .map_err(|_| MseedError::InvalidV3Header("invalid UTF-8 in identifier".into()))?;
        let extra_headers = v
            .utf8(FIXED_HEADER_SIZE + sid_len, extra_len)
            .map_err(|_| MseedError::InvalidV3Header("invalid UTF-8 in extra headers".into()))?;
        let payload = v.bytes(
            FIXED_HEADER_SIZE + sid_len + extra_len,
            header.data_length as usize,
        )?;

        let encoding = EncodingFormat::from_code(header.encoding_code)?;
        codec::check_payload_length(encoding, header.num_samples as usize, payload.len(), true)?;

        let source_id = SourceId::from_identifier(identifier);
        if !source_id.is_fdsn() {
            debug!(sid = identifier, "identifier is not an FDSN source id, keeping it opaque");
        }
        let start = header.start.to_datetime()?;
        checked_end_time(start, header.num_samples as usize, header.sample_rate())?;

        trace!(
            sid = identifier,
            record_length = total,
            num_samples = header.num_samples,
            %encoding,
            "parsed v3 record"
        );

        Ok(Self {
            header,
            source_id,
            identifier,
            extra_headers,
            encoding,
            start,
            crc_status,
            raw,
            payload,
            decode_options: options.decode,
        })
    }

    pub fn header(&self) -> &MSeed3Header {
        &self.header
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// The identifier exactly as stored.
    pub fn identifier(&self) -> &'a str {
        self.identifier
    }

    pub fn start_time(&self) -> OffsetDateTime {
        self.start
    }

    pub fn sample_rate(&self) -> f64 {
        self.header.sample_rate()
    }

    pub fn num_samples(&self) -> usize {
        self.header.num_samples as usize
    }

    pub fn encoding(&self) -> EncodingFormat {
        self.encoding
    }

    /// Steim payloads are big-endian, everything else little-endian.
    pub fn payload_byte_order(&self) -> ByteOrder {
        if self.encoding.is_steim() {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn record_length(&self) -> usize {
        self.raw.len()
    }

    /// The complete serialized record.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Options the payload is decompressed with.
    pub fn decode_options(&self) -> DecodeOptions {
        self.decode_options
    }

    pub fn crc_status(&self) -> CrcStatus {
        self.crc_status
    }

    pub fn integrity_warnings(&self) -> Vec<IntegrityWarning> {
        match self.crc_status {
            CrcStatus::Mismatch { stored, computed } => {
                vec![IntegrityWarning::CrcMismatch { stored, computed }]
            }
            _ => Vec::new(),
        }
    }

    /// The raw extra-header text.
    pub fn extra_headers_text(&self) -> &'a str {
        self.extra_headers
    }

    /// Extra headers as a JSON object. Absent or empty headers give an
    /// empty map.
    pub fn extra_headers(&self) -> Result<Map<String, Value>> {
        parse_extra_headers(self.extra_headers)
    }
}

/// Parse extra-header text into a JSON object.
pub fn parse_extra_headers(text: &str) -> Result<Map<String, Value>> {
    if text.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        other => Err(MseedError::InvalidV3Header(format!(
            "extra headers must be a JSON object, got {other}"
        ))),
    }
}

impl fmt::Display for MSeed3Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        writeln!(
            f,
            "{}, version {}, {} bytes (format: 3)",
            self.identifier,
            h.publication_version,
            self.record_length()
        )?;
        writeln!(f, "             start time: {}", format_iso(self.start))?;
        writeln!(f, "      number of samples: {}", h.num_samples)?;
        writeln!(f, "       sample rate (Hz): {}", self.sample_rate())?;
        writeln!(f, "                  flags: [{:08b}] 8 bits", h.flags)?;
        writeln!(f, "                    CRC: {:#010X}", h.crc)?;
        writeln!(f, "    extra header length: {} bytes", h.extra_headers_length)?;
        writeln!(f, "    data payload length: {} bytes", h.data_length)?;
        write!(
            f,
            "       payload encoding: {} (val: {})",
            self.encoding.description(),
            h.encoding_code
        )
    }
}
