//! Serialize samples into v2 or v3 record bytes.
//!
//! [`RecordBuilder`] collects identity, timing and samples with `with`-style
//! setters, then writes either format. v2 records have a fixed power-of-two
//! length (512 bytes by default) and carry Blockette 1000, plus Blockette
//! 1001 for sub-100 µs start times and Blockette 100 for rates the
//! factor/multiplier pair cannot represent. v3 records are exactly as long
//! as their contents and carry a computed CRC.

use time::OffsetDateTime;

use crate::buffer::write_padded;
use crate::codec;
use crate::crc;
use crate::mseed2::{self, compute_sample_rate};
use crate::mseed3;
use crate::samples::Samples;
use crate::sid::SourceId;
use crate::time::NanoTime;
use crate::types::{ByteOrder, EncodingFormat};
use crate::{MseedError, Result};

const B1000_SIZE: usize = 8;
const B1001_SIZE: usize = 8;
const B100_SIZE: usize = 12;

/// Builder for serialized records.
///
/// # Example
///
/// ```
/// use miniseed_trace::{EncodingFormat, Record, RecordBuilder, Samples, SourceId};
///
/// let sid = SourceId::from_nslc("XX", "TEST", "00", "BHZ").unwrap();
/// let bytes = RecordBuilder::new(sid)
///     .sample_rate(20.0)
///     .encoding(EncodingFormat::Steim2)
///     .samples(Samples::Int(vec![1, 2, 3]))
///     .build_v3()
///     .unwrap();
///
/// let record = Record::parse(&bytes).unwrap();
/// assert_eq!(record.decompress().unwrap(), Samples::Int(vec![1, 2, 3]));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBuilder {
    source_id: SourceId,
    start_time: OffsetDateTime,
    sample_rate: f64,
    encoding: EncodingFormat,
    samples: Samples,
    text: Option<String>,
    // v2
    sequence_number: String,
    quality: char,
    byte_order: ByteOrder,
    record_length_exp: u8,
    // v3
    flags: u8,
    publication_version: u8,
    extra_headers: String,
}

impl RecordBuilder {
    /// Defaults: epoch start, 1 Hz, INT32, no samples, 512-byte big-endian
    /// v2 records, publication version 1.
    pub fn new(source_id: SourceId) -> Self {
        Self {
            source_id,
            start_time: OffsetDateTime::UNIX_EPOCH,
            sample_rate: 1.0,
            encoding: EncodingFormat::Int32,
            samples: Samples::Int(Vec::new()),
            text: None,
            sequence_number: "000001".into(),
            quality: 'D',
            byte_order: ByteOrder::Big,
            record_length_exp: 9,
            flags: 0,
            publication_version: 1,
            extra_headers: String::new(),
        }
    }

    pub fn start_time(mut self, start: OffsetDateTime) -> Self {
        self.start_time = start;
        self
    }

    /// Sample rate in Hz. Zero means no rate.
    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn encoding(mut self, encoding: EncodingFormat) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn samples(mut self, samples: Samples) -> Self {
        self.samples = samples;
        self.text = None;
        self
    }

    /// A text payload; switches the encoding to [`EncodingFormat::Text`].
    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self.encoding = EncodingFormat::Text;
        self
    }

    pub fn sequence_number(mut self, sequence: &str) -> Self {
        self.sequence_number = sequence.to_string();
        self
    }

    /// v2 data quality indicator, one of `D`, `R`, `Q` or `M`.
    pub fn quality(mut self, quality: char) -> Result<Self> {
        if !matches!(quality, 'D' | 'R' | 'Q' | 'M') {
            return Err(MseedError::EncodeError(format!(
                "data quality {quality:?} is not one of D, R, Q, M"
            )));
        }
        self.quality = quality;
        Ok(self)
    }

    /// Payload word order of v2 records. v3 fixes its own.
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    /// v2 record length as a power of two.
    pub fn record_length_exp(mut self, exp: u8) -> Self {
        self.record_length_exp = exp;
        self
    }

    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub fn publication_version(mut self, version: u8) -> Self {
        self.publication_version = version;
        self
    }

    /// v3 extra headers as JSON object text.
    pub fn extra_headers(mut self, json: &str) -> Self {
        self.extra_headers = json.to_string();
        self
    }

    fn payload(&self, order: ByteOrder) -> Result<(Vec<u8>, usize)> {
        match (&self.text, self.encoding) {
            (Some(text), EncodingFormat::Text) => Ok((text.as_bytes().to_vec(), text.len())),
            (_, encoding) if encoding.is_steim() && self.samples.is_empty() => Ok((Vec::new(), 0)),
            _ => Ok((
                codec::encode(&self.samples, self.encoding, order)?,
                self.samples.len(),
            )),
        }
    }

    /// Serialize a miniSEED v2 record.
    pub fn build_v2(&self) -> Result<Vec<u8>> {
        if self.record_length_exp < 7 || self.record_length_exp > 20 {
            return Err(MseedError::EncodeError(format!(
                "record length exponent {} out of range",
                self.record_length_exp
            )));
        }
        let rec_len = 1usize << self.record_length_exp;
        let channel = self.source_id.channel_code();
        let codes = [
            (self.source_id.station(), 5, "station"),
            (self.source_id.location(), 2, "location"),
            (channel.as_str(), 3, "channel"),
            (self.source_id.network(), 2, "network"),
        ];
        for (code, width, name) in codes {
            if code.len() > width {
                return Err(MseedError::EncodeError(format!(
                    "{name} code {code:?} longer than {width} characters"
                )));
            }
        }

        let (payload, num_samples) = self.payload(self.byte_order)?;
        let num_samples = u16::try_from(num_samples).map_err(|_| {
            MseedError::EncodeError(format!("{num_samples} samples exceed a v2 record"))
        })?;

        let nano = NanoTime::from_datetime(self.start_time)?;
        let btime = nano.to_btime();
        let microseconds = ((nano.nanosecond % 100_000) / 1000) as i8;
        let (factor, multiplier) = decompose_sample_rate(self.sample_rate)?;
        let needs_b100 = compute_sample_rate(factor, multiplier) != self.sample_rate;

        let mut buf = vec![0u8; rec_len];

        // --- Fixed header (48 bytes, big-endian) ---
        write_padded(&mut buf[0..6], &self.sequence_number);
        buf[6] = self.quality as u8;
        buf[7] = b' ';
        write_padded(&mut buf[8..13], self.source_id.station());
        write_padded(&mut buf[13..15], self.source_id.location());
        write_padded(&mut buf[15..18], &channel);
        write_padded(&mut buf[18..20], self.source_id.network());

        buf[20..22].copy_from_slice(&btime.year.to_be_bytes());
        buf[22..24].copy_from_slice(&btime.day.to_be_bytes());
        buf[24] = btime.hour;
        buf[25] = btime.minute;
        buf[26] = btime.second;
        buf[28..30].copy_from_slice(&btime.fract.to_be_bytes());

        buf[30..32].copy_from_slice(&num_samples.to_be_bytes());
        buf[32..34].copy_from_slice(&factor.to_be_bytes());
        buf[34..36].copy_from_slice(&multiplier.to_be_bytes());
        // activity, I/O and quality flags (36-38) and time correction
        // (40-43) stay zero
        buf[46..48].copy_from_slice(&(mseed2::FIXED_HEADER_SIZE as u16).to_be_bytes());

        // --- Blockettes ---
        let mut offset = mseed2::FIXED_HEADER_SIZE;
        let mut chain: Vec<(u16, usize)> = vec![(1000, B1000_SIZE)];
        if microseconds != 0 {
            chain.push((1001, B1001_SIZE));
        }
        if needs_b100 {
            chain.push((100, B100_SIZE));
        }
        buf[39] = chain.len() as u8;
        for (i, &(kind, size)) in chain.iter().enumerate() {
            let next = if i + 1 < chain.len() { offset + size } else { 0 };
            buf[offset..offset + 2].copy_from_slice(&kind.to_be_bytes());
            buf[offset + 2..offset + 4].copy_from_slice(&(next as u16).to_be_bytes());
            match kind {
                1000 => {
                    buf[offset + 4] = self.encoding.to_code();
                    buf[offset + 5] = match self.byte_order {
                        ByteOrder::Big => 1,
                        ByteOrder::Little => 0,
                    };
                    buf[offset + 6] = self.record_length_exp;
                }
                1001 => buf[offset + 5] = microseconds as u8,
                _ => buf[offset + 4..offset + 8]
                    .copy_from_slice(&(self.sample_rate as f32).to_be_bytes()),
            }
            offset += size;
        }

        // Steim data starts on a frame boundary
        let data_offset = if self.encoding.is_steim() {
            offset.next_multiple_of(64)
        } else {
            offset
        };
        buf[44..46].copy_from_slice(&(data_offset as u16).to_be_bytes());

        if data_offset + payload.len() > rec_len {
            return Err(MseedError::EncodeError(format!(
                "encoded data ({} bytes) exceeds record capacity ({} bytes from offset {})",
                payload.len(),
                rec_len - data_offset,
                data_offset,
            )));
        }
        buf[data_offset..data_offset + payload.len()].copy_from_slice(&payload);
        Ok(buf)
    }

    /// Serialize a miniSEED v3 record.
    pub fn build_v3(&self) -> Result<Vec<u8>> {
        let order = if self.encoding.is_steim() {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        };
        let (payload, num_samples) = self.payload(order)?;

        let sid = self.source_id.to_string();
        let sid_len = u8::try_from(sid.len()).map_err(|_| {
            MseedError::EncodeError(format!("SID too long: {} bytes (max 255)", sid.len()))
        })?;
        mseed3::parse_extra_headers(&self.extra_headers)?;
        let extra_len = u16::try_from(self.extra_headers.len()).map_err(|_| {
            MseedError::EncodeError(format!(
                "extra headers too long: {} bytes (max {})",
                self.extra_headers.len(),
                u16::MAX
            ))
        })?;
        let data_len = u32::try_from(payload.len())
            .map_err(|_| MseedError::EncodeError("data payload exceeds 4 GiB".into()))?;
        let num_samples = u32::try_from(num_samples)
            .map_err(|_| MseedError::EncodeError(format!("{num_samples} samples exceed a record")))?;
        if self.sample_rate < 0.0 {
            return Err(MseedError::EncodeError("sample rate must not be negative".into()));
        }
        let rate_or_period = match 1.0 / self.sample_rate {
            period if self.sample_rate > 0.0 && self.sample_rate < 1.0 && period.fract() == 0.0 => {
                -period
            }
            _ => self.sample_rate,
        };

        let nano = NanoTime::from_datetime(self.start_time)?;
        let header_len = mseed3::FIXED_HEADER_SIZE;
        let mut buf = Vec::with_capacity(header_len + sid.len() + self.extra_headers.len() + payload.len());

        // --- Fixed header (40 bytes, little-endian) ---
        buf.extend_from_slice(&mseed3::MAGIC);
        buf.push(self.flags);
        buf.extend_from_slice(&nano.nanosecond.to_le_bytes());
        buf.extend_from_slice(&nano.year.to_le_bytes());
        buf.extend_from_slice(&nano.day.to_le_bytes());
        buf.extend_from_slice(&[nano.hour, nano.minute, nano.second]);
        buf.push(self.encoding.to_code());
        buf.extend_from_slice(&rate_or_period.to_le_bytes());
        buf.extend_from_slice(&num_samples.to_le_bytes());
        // CRC, computed last
        buf.extend_from_slice(&[0; 4]);
        buf.push(self.publication_version);
        buf.push(sid_len);
        buf.extend_from_slice(&extra_len.to_le_bytes());
        buf.extend_from_slice(&data_len.to_le_bytes());
        debug_assert_eq!(buf.len(), header_len);

        buf.extend_from_slice(sid.as_bytes());
        buf.extend_from_slice(self.extra_headers.as_bytes());
        buf.extend_from_slice(&payload);

        crc::compute_v3_crc(&mut buf);
        Ok(buf)
    }
}

/// Decompose a sample rate (Hz) into a (factor, multiplier) pair.
///
/// Rates that are neither whole Hz nor a whole-second period are rounded;
/// the builder then adds Blockette 100 with the exact value.
fn decompose_sample_rate(rate: f64) -> Result<(i16, i16)> {
    if rate < 0.0 || !rate.is_finite() {
        return Err(MseedError::EncodeError(format!(
            "sample rate {rate} must be finite and not negative"
        )));
    }
    if rate == 0.0 {
        return Ok((0, 0));
    }
    if rate >= 1.0 {
        let f = rate.round().min(i16::MAX as f64) as i16;
        Ok((f, 1))
    } else {
        // factor < 0, multiplier > 0: rate = -multiplier / factor
        let period = (1.0 / rate).round().min(i16::MAX as f64) as i16;
        Ok((-period, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mseed2::{Blockette, DataRecord};
    use crate::mseed3::MSeed3Record;
    use time::macros::datetime;

    fn sid() -> SourceId {
        SourceId::from_nslc("XX", "TEST", "00", "BHZ").unwrap()
    }

    #[test]
    fn test_decompose_sample_rate() {
        assert_eq!(decompose_sample_rate(20.0).unwrap(), (20, 1));
        assert_eq!(decompose_sample_rate(0.1).unwrap(), (-10, 1));
        assert_eq!(decompose_sample_rate(0.0).unwrap(), (0, 0));
        assert!(decompose_sample_rate(-1.0).is_err());
    }

    #[test]
    fn test_v2_layout() {
        let bytes = RecordBuilder::new(sid())
            .start_time(datetime!(2025-04-10 12:30:45.1234 UTC))
            .sample_rate(20.0)
            .samples(Samples::Int(vec![1, -2, 3, -4, 100000, -100000]))
            .build_v2()
            .unwrap();
        assert_eq!(bytes.len(), 512);
        assert_eq!(&bytes[0..8], b"000001D ");
        assert_eq!(&bytes[8..20], b"TEST 00BHZXX");
        assert_eq!(u16::from_be_bytes([bytes[44], bytes[45]]), 56);

        let rec = DataRecord::parse(&bytes).unwrap();
        assert_eq!(rec.header().start.fract, 1234);
        assert_eq!(rec.header().start.day, 100);
        assert_eq!(rec.blockettes().len(), 1);
    }

    #[test]
    fn test_v2_microseconds_and_odd_rate_blockettes() {
        let start = datetime!(2025-04-10 12:30:45.123456 UTC);
        let bytes = RecordBuilder::new(sid())
            .start_time(start)
            .sample_rate(2.5)
            .encoding(EncodingFormat::Steim1)
            .samples(Samples::Int(vec![10, 20, 30]))
            .build_v2()
            .unwrap();
        let rec = DataRecord::parse(&bytes).unwrap();
        let kinds: Vec<u16> = rec.blockettes().iter().map(Blockette::kind).collect();
        assert_eq!(kinds, vec![1000, 1001, 100]);
        assert_eq!(rec.start_time(), start);
        assert_eq!(rec.sample_rate(), 2.5);
        // blockettes end at 76, so the first frame starts at 128
        assert_eq!(rec.header().data_offset, 128);
    }

    #[test]
    fn test_v2_capacity_exceeded() {
        let err = RecordBuilder::new(sid())
            .samples(Samples::Int(vec![0; 200]))
            .build_v2()
            .unwrap_err();
        assert!(matches!(err, MseedError::EncodeError(_)));

        let ok = RecordBuilder::new(sid())
            .samples(Samples::Int(vec![0; 200]))
            .record_length_exp(12)
            .build_v2()
            .unwrap();
        assert_eq!(ok.len(), 4096);
    }

    #[test]
    fn test_quality_indicator() {
        let bytes = RecordBuilder::new(sid())
            .quality('Q')
            .unwrap()
            .samples(Samples::Int(vec![1]))
            .build_v2()
            .unwrap();
        assert_eq!(bytes[6], b'Q');
        assert_eq!(DataRecord::parse(&bytes).unwrap().header().quality, 'Q');

        for bad in ['X', 'd', 'é'] {
            assert!(matches!(
                RecordBuilder::new(sid()).quality(bad),
                Err(MseedError::EncodeError(_))
            ));
        }
    }

    #[test]
    fn test_v2_rejects_long_codes() {
        let long = SourceId::parse("FDSN:XX_STATION__B_H_Z").unwrap();
        assert!(RecordBuilder::new(long).build_v2().is_err());
    }

    #[test]
    fn test_v3_period_rate() {
        let bytes = RecordBuilder::new(sid())
            .sample_rate(0.1)
            .samples(Samples::Int(vec![1]))
            .build_v3()
            .unwrap();
        let rec = MSeed3Record::parse(&bytes).unwrap();
        assert_eq!(rec.header().sample_rate_period, -10.0);
        assert_eq!(rec.sample_rate(), 0.1);
    }

    #[test]
    fn test_v3_rejects_invalid_extra_headers() {
        let err = RecordBuilder::new(sid())
            .extra_headers("not json")
            .build_v3()
            .unwrap_err();
        assert!(matches!(err, MseedError::ExtraHeaders(_)));
    }

    #[test]
    fn test_float_payloads() {
        for encoding in [EncodingFormat::Float32, EncodingFormat::Float64] {
            let samples = Samples::Double(vec![0.5, -1.25, 3.0]);
            let bytes = RecordBuilder::new(sid())
                .encoding(encoding)
                .samples(samples.clone())
                .build_v3()
                .unwrap();
            let rec = MSeed3Record::parse(&bytes).unwrap();
            assert_eq!(rec.payload().len(), 3 * encoding.sample_width().unwrap());
        }
    }
}
