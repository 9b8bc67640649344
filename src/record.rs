//! Unified record type for v2 and v3.
//!
//! [`Record`] wraps either version behind one set of accessors. Parsing
//! never decompresses: the payload stays a borrowed byte range until
//! [`Record::decompress`] is called. [`EncodedPayload`] is the owned form
//! of that byte range, kept by segments that defer decoding.

use std::borrow::Cow;
use std::fmt;

use time::OffsetDateTime;

use crate::codec::{self, Decoded, IntegrityWarning};
use crate::mseed2::{self, DataRecord};
use crate::mseed3::{self, MSeed3Record};
use crate::options::{DecodeOptions, ParseOptions};
use crate::samples::Samples;
use crate::sid::SourceId;
use crate::time::TimeWindow;
use crate::types::{ByteOrder, EncodingFormat, FormatVersion};
use crate::{MseedError, Result};

/// A parsed miniSEED record (v2 or v3).
#[derive(Debug, Clone, PartialEq)]
pub enum Record<'a> {
    V2(DataRecord<'a>),
    V3(MSeed3Record<'a>),
}

impl<'a> Record<'a> {
    /// Identify the format of the record at the start of `data`.
    pub fn detect(data: &[u8]) -> Result<FormatVersion> {
        if mseed3::looks_like_v3(data) {
            Ok(FormatVersion::V3)
        } else if mseed2::looks_like_v2(data) {
            Ok(FormatVersion::V2)
        } else if data.len() < mseed2::FIXED_HEADER_SIZE {
            Err(MseedError::RecordTooShort {
                expected: mseed2::FIXED_HEADER_SIZE,
                actual: data.len(),
            })
        } else {
            Err(MseedError::UnrecognizedFormat)
        }
    }

    /// Total length of the record at the start of `data`, read from its
    /// header without parsing the rest.
    pub fn length(data: &[u8]) -> Result<usize> {
        match Self::detect(data)? {
            FormatVersion::V2 => mseed2::record_length(data),
            FormatVersion::V3 => mseed3::record_length(data),
        }
    }

    pub fn parse(data: &[u8]) -> Result<Record<'_>> {
        Record::parse_with(data, &ParseOptions::default())
    }

    /// Parse the record at the start of `data`.
    pub fn parse_with(data: &'a [u8], options: &ParseOptions) -> Result<Self> {
        match Self::detect(data)? {
            FormatVersion::V2 => DataRecord::parse_with(data, options).map(Record::V2),
            FormatVersion::V3 => MSeed3Record::parse_with(data, options).map(Record::V3),
        }
    }

    pub fn format_version(&self) -> FormatVersion {
        match self {
            Record::V2(_) => FormatVersion::V2,
            Record::V3(_) => FormatVersion::V3,
        }
    }

    pub fn source_id(&self) -> &SourceId {
        match self {
            Record::V2(r) => r.source_id(),
            Record::V3(r) => r.source_id(),
        }
    }

    pub fn start_time(&self) -> OffsetDateTime {
        match self {
            Record::V2(r) => r.start_time(),
            Record::V3(r) => r.start_time(),
        }
    }

    /// Time of the last sample. Equal to the start without a rate or
    /// samples.
    pub fn end_time(&self) -> OffsetDateTime {
        crate::time::sample_time(
            self.start_time(),
            self.num_samples().saturating_sub(1),
            self.sample_rate(),
        )
    }

    pub fn time_window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time(), self.end_time())
    }

    pub fn sample_rate(&self) -> f64 {
        match self {
            Record::V2(r) => r.sample_rate(),
            Record::V3(r) => r.sample_rate(),
        }
    }

    pub fn num_samples(&self) -> usize {
        match self {
            Record::V2(r) => r.num_samples(),
            Record::V3(r) => r.num_samples(),
        }
    }

    pub fn encoding(&self) -> EncodingFormat {
        match self {
            Record::V2(r) => r.encoding(),
            Record::V3(r) => r.encoding(),
        }
    }

    pub fn payload_byte_order(&self) -> ByteOrder {
        match self {
            Record::V2(r) => r.payload_byte_order(),
            Record::V3(r) => r.payload_byte_order(),
        }
    }

    pub fn payload(&self) -> &'a [u8] {
        match self {
            Record::V2(r) => r.payload(),
            Record::V3(r) => r.payload(),
        }
    }

    pub fn record_length(&self) -> usize {
        match self {
            Record::V2(r) => r.record_length(),
            Record::V3(r) => r.record_length(),
        }
    }

    /// Integrity problems found while parsing (v3 CRC mismatch).
    pub fn integrity_warnings(&self) -> Vec<IntegrityWarning> {
        match self {
            Record::V2(_) => Vec::new(),
            Record::V3(r) => r.integrity_warnings(),
        }
    }

    /// Decode options given when the record was parsed.
    pub fn decode_options(&self) -> DecodeOptions {
        match self {
            Record::V2(r) => r.decode_options(),
            Record::V3(r) => r.decode_options(),
        }
    }

    /// Decode the payload with the options given at parse time.
    pub fn decompress(&self) -> Result<Samples> {
        Ok(self.decompress_with(&self.decode_options())?.samples)
    }

    /// Decode the payload. The returned warnings include those found while
    /// parsing.
    pub fn decompress_with(&self, options: &DecodeOptions) -> Result<Decoded> {
        let mut decoded = codec::decode(
            self.payload(),
            self.encoding(),
            self.num_samples(),
            self.payload_byte_order(),
            options,
        )?;
        let mut warnings = self.integrity_warnings();
        warnings.append(&mut decoded.warnings);
        decoded.warnings = warnings;
        Ok(decoded)
    }

    /// The payload of a text record, without trailing padding.
    pub fn text(&self) -> Option<Cow<'a, str>> {
        if self.encoding() != EncodingFormat::Text {
            return None;
        }
        let payload = self.payload();
        let end = payload
            .iter()
            .rposition(|&b| b != 0 && b != b' ')
            .map_or(0, |i| i + 1);
        Some(String::from_utf8_lossy(&payload[..end]))
    }

    /// An owned copy of the payload for deferred decoding.
    pub fn to_encoded_payload(&self) -> EncodedPayload {
        EncodedPayload {
            encoding: self.encoding(),
            byte_order: self.payload_byte_order(),
            num_samples: self.num_samples(),
            data: self.payload().to_vec(),
            warnings: self.integrity_warnings(),
        }
    }
}

impl fmt::Display for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::V2(r) => fmt::Display::fmt(r, f),
            Record::V3(r) => fmt::Display::fmt(r, f),
        }
    }
}

/// A record payload held for later decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedPayload {
    pub encoding: EncodingFormat,
    pub byte_order: ByteOrder,
    pub num_samples: usize,
    pub data: Vec<u8>,
    /// Warnings raised while parsing the source record.
    pub warnings: Vec<IntegrityWarning>,
}

impl EncodedPayload {
    pub fn new(encoding: EncodingFormat, byte_order: ByteOrder, num_samples: usize, data: Vec<u8>) -> Self {
        Self {
            encoding,
            byte_order,
            num_samples,
            data,
            warnings: Vec::new(),
        }
    }

    pub fn decode(&self, options: &DecodeOptions) -> Result<Decoded> {
        let mut decoded = codec::decode(
            &self.data,
            self.encoding,
            self.num_samples,
            self.byte_order,
            options,
        )?;
        let mut warnings = self.warnings.clone();
        warnings.append(&mut decoded.warnings);
        decoded.warnings = warnings;
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RecordBuilder;
    use time::macros::datetime;

    fn sid() -> SourceId {
        SourceId::from_nslc("XX", "TEST", "00", "BHZ").unwrap()
    }

    #[test]
    fn test_detect() {
        let v2 = RecordBuilder::new(sid()).samples(Samples::Int(vec![1])).build_v2().unwrap();
        let v3 = RecordBuilder::new(sid()).samples(Samples::Int(vec![1])).build_v3().unwrap();
        assert_eq!(Record::detect(&v2).unwrap(), FormatVersion::V2);
        assert_eq!(Record::detect(&v3).unwrap(), FormatVersion::V3);
        assert!(matches!(Record::detect(&[0u8; 64]), Err(MseedError::UnrecognizedFormat)));
        assert!(matches!(Record::detect(&[0u8; 10]), Err(MseedError::RecordTooShort { .. })));
    }

    #[test]
    fn test_v2_and_v3_decode_same_steim_samples() {
        let values = vec![-7, -50, -58, -46, -31, 17];
        for encoding in [EncodingFormat::Steim1, EncodingFormat::Steim2] {
            let builder = RecordBuilder::new(sid())
                .encoding(encoding)
                .samples(Samples::Int(values.clone()));
            let v2 = builder.clone().build_v2().unwrap();
            let v3 = builder.build_v3().unwrap();
            let a = Record::parse(&v2).unwrap().decompress().unwrap();
            let b = Record::parse(&v3).unwrap().decompress().unwrap();
            assert_eq!(a, Samples::Int(values.clone()));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_end_time() {
        let bytes = RecordBuilder::new(sid())
            .start_time(datetime!(2020-01-01 00:00 UTC))
            .sample_rate(4.0)
            .samples(Samples::Int(vec![0; 9]))
            .build_v3()
            .unwrap();
        let rec = Record::parse(&bytes).unwrap();
        assert_eq!(rec.end_time(), datetime!(2020-01-01 00:00:02 UTC));
        assert_eq!(rec.time_window().duration(), time::Duration::seconds(2));
    }

    #[test]
    fn test_leap_second_past_last_instant_is_rejected() {
        let mut bytes = RecordBuilder::new(sid())
            .samples(Samples::Int(vec![1]))
            .build_v3()
            .unwrap();
        bytes[8..10].copy_from_slice(&9999u16.to_le_bytes());
        bytes[10..12].copy_from_slice(&365u16.to_le_bytes());
        bytes[12] = 23;
        bytes[13] = 59;
        bytes[14] = 60;
        crate::crc::compute_v3_crc(&mut bytes);
        assert!(matches!(Record::parse(&bytes), Err(MseedError::InvalidTime(_))));
    }

    #[test]
    fn test_samples_past_last_instant_are_rejected() {
        let builder = RecordBuilder::new(sid())
            .start_time(datetime!(9999-12-31 23:59:59 UTC))
            .sample_rate(1.0);
        let last = builder
            .clone()
            .samples(Samples::Int(vec![1]))
            .build_v3()
            .unwrap();
        let rec = Record::parse(&last).unwrap();
        assert_eq!(rec.end_time(), rec.start_time());

        let overflowing = builder.samples(Samples::Int(vec![1, 2, 3])).build_v3().unwrap();
        assert!(matches!(
            Record::parse(&overflowing),
            Err(MseedError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_text_record() {
        let bytes = RecordBuilder::new(sid())
            .text("station log entry")
            .build_v2()
            .unwrap();
        let rec = Record::parse(&bytes).unwrap();
        assert_eq!(rec.encoding(), EncodingFormat::Text);
        assert_eq!(rec.text().as_deref(), Some("station log entry"));
        assert!(matches!(
            rec.decompress(),
            Err(MseedError::NonNumericEncoding(EncodingFormat::Text))
        ));
    }

    #[test]
    fn test_encoded_payload_carries_crc_warning() {
        let mut bytes = RecordBuilder::new(sid())
            .samples(Samples::Int(vec![3, 4]))
            .build_v3()
            .unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x10;
        let rec = Record::parse(&bytes).unwrap();
        let payload = rec.to_encoded_payload();
        let decoded = payload.decode(&DecodeOptions::default()).unwrap();
        assert_eq!(decoded.samples.len(), 2);
        assert!(matches!(
            decoded.warnings.as_slice(),
            [IntegrityWarning::CrcMismatch { .. }]
        ));
    }
}
