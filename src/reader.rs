//! Iterator-based reader for back-to-back records.
//!
//! Use [`RecordReader`] to walk concatenated v2 and v3 records in a byte
//! slice. Each record's declared length gives the offset of the next one,
//! so a record that fails to parse after its length is known is reported
//! and skipped. A failure before the length is known ends iteration.

use tracing::warn;

use crate::options::ParseOptions;
use crate::record::Record;
use crate::{MseedError, Result};

/// Iterator over the records in a byte slice.
///
/// # Example
///
/// ```
/// use miniseed_trace::{RecordBuilder, RecordReader, Samples, SourceId};
///
/// let sid = SourceId::from_nslc("XX", "TEST", "00", "BHZ").unwrap();
/// let mut data = RecordBuilder::new(sid.clone())
///     .samples(Samples::Int(vec![1, 2, 3]))
///     .build_v2()
///     .unwrap();
/// data.extend(RecordBuilder::new(sid).samples(Samples::Int(vec![4])).build_v3().unwrap());
///
/// let records: Vec<_> = RecordReader::new(&data)
///     .collect::<Result<Vec<_>, _>>()
///     .unwrap();
/// assert_eq!(records.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct RecordReader<'a> {
    data: &'a [u8],
    offset: usize,
    options: ParseOptions,
    done: bool,
}

impl<'a> RecordReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_options(data, ParseOptions::default())
    }

    pub fn with_options(data: &'a [u8], options: ParseOptions) -> Self {
        Self {
            data,
            offset: 0,
            options,
            done: false,
        }
    }

    /// Byte offset of the next record.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for RecordReader<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.data.len() {
            return None;
        }
        let remaining = &self.data[self.offset..];

        let length = match Record::length(remaining) {
            Ok(length) => length,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if remaining.len() < length {
            self.done = true;
            return Some(Err(MseedError::RecordTooShort {
                expected: length,
                actual: remaining.len(),
            }));
        }

        let result = Record::parse_with(&remaining[..length], &self.options);
        if let Err(e) = &result {
            warn!(offset = self.offset, length, error = %e, "skipping malformed record");
        }
        self.offset += length;
        Some(result)
    }
}

/// Parse every record in `data`, failing on the first error.
pub fn parse(data: &[u8]) -> Result<Vec<Record<'_>>> {
    parse_with(data, &ParseOptions::default())
}

pub fn parse_with<'a>(data: &'a [u8], options: &ParseOptions) -> Result<Vec<Record<'a>>> {
    RecordReader::with_options(data, *options).collect()
}

/// Parse every record that can be parsed, collecting the errors of those
/// that cannot.
pub fn parse_lenient<'a>(data: &'a [u8], options: &ParseOptions) -> (Vec<Record<'a>>, Vec<MseedError>) {
    let mut records = Vec::new();
    let mut errors = Vec::new();
    for result in RecordReader::with_options(data, *options) {
        match result {
            Ok(record) => records.push(record),
            Err(e) => errors.push(e),
        }
    }
    (records, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RecordBuilder;
    use crate::samples::Samples;
    use crate::sid::SourceId;
    use crate::types::FormatVersion;

    fn record(station: &str, samples: Vec<i32>) -> RecordBuilder {
        RecordBuilder::new(SourceId::from_nslc("XX", station, "00", "BHZ").unwrap())
            .samples(Samples::Int(samples))
    }

    #[test]
    fn test_reader_multiple_records() {
        let mut data = Vec::new();
        data.extend(record("STA1", vec![1, 2, 3]).build_v2().unwrap());
        data.extend(record("STA2", vec![4, 5, 6]).build_v3().unwrap());
        data.extend(record("STA3", vec![7, 8, 9]).build_v2().unwrap());

        let records = parse(&data).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].source_id().station(), "STA1");
        assert_eq!(records[1].format_version(), FormatVersion::V3);
        assert_eq!(records[2].decompress().unwrap(), Samples::Int(vec![7, 8, 9]));
    }

    #[test]
    fn test_reader_empty() {
        assert_eq!(RecordReader::new(&[]).count(), 0);
    }

    #[test]
    fn test_malformed_record_with_known_length_is_skipped() {
        let mut bad = record("BAD", vec![1, 2]).build_v3().unwrap();
        // unsupported encoding; the length is still readable
        bad[15] = 99;
        let good = record("GOOD", vec![3]).build_v3().unwrap();

        let mut data = bad;
        data.extend(&good);
        let results: Vec<_> = RecordReader::new(&data).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(MseedError::UnsupportedEncoding(99))));
        assert!(results[1].is_ok());

        let (records, errors) = parse_lenient(&data, &ParseOptions::default());
        assert_eq!(records.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(parse(&data).is_err());
    }

    #[test]
    fn test_unknown_bytes_stop_iteration() {
        let mut data = record("STA1", vec![1]).build_v2().unwrap();
        data.extend([0u8; 64]);
        data.extend(record("STA2", vec![2]).build_v2().unwrap());

        let mut reader = RecordReader::new(&data);
        assert!(reader.next().unwrap().is_ok());
        assert!(matches!(reader.next(), Some(Err(MseedError::UnrecognizedFormat))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_truncated_final_record() {
        let mut data = record("STA1", vec![1]).build_v2().unwrap();
        let second = record("STA2", vec![2]).build_v2().unwrap();
        data.extend(&second[..300]);

        let results: Vec<_> = RecordReader::new(&data).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[1],
            Err(MseedError::RecordTooShort { expected: 512, actual: 300 })
        ));
    }
}
