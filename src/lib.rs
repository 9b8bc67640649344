//! Pure Rust miniSEED v2 and v3 parsing and gappy waveform traces.
//!
//! Zero `unsafe`, zero C dependencies. Parses back-to-back v2 and v3
//! records from a borrowed buffer, verifies v3 CRC-32C checksums, decodes
//! Steim1/2, INT16/32 and FLOAT32/64 payloads on demand, and assembles
//! records into [`Segment`]s and [`Trace`]s that can be cut, trimmed,
//! merged and summarized.
//!
//! Integrity problems that do not make a record unreadable (a CRC mismatch,
//! a Steim reverse integration constant that disagrees with the last
//! sample) are logged with [`tracing`] and reported as
//! [`IntegrityWarning`]s. [`ParseOptions`] and [`DecodeOptions`] turn them
//! into errors.
//!
//! # Reading records
//!
//! ```
//! use miniseed_trace::{EncodingFormat, RecordBuilder, Samples, SourceId, reader};
//!
//! let sid = SourceId::from_nslc("IU", "ANMO", "00", "BHZ").unwrap();
//! let mut data = RecordBuilder::new(sid.clone())
//!     .sample_rate(20.0)
//!     .encoding(EncodingFormat::Steim2)
//!     .samples(Samples::Int(vec![100, 200, 300]))
//!     .build_v2()
//!     .unwrap();
//! data.extend(RecordBuilder::new(sid).samples(Samples::Int(vec![4, 5])).build_v3().unwrap());
//!
//! let records = reader::parse(&data).unwrap();
//! assert_eq!(records.len(), 2);
//! assert_eq!(records[0].source_id().station(), "ANMO");
//! assert_eq!(records[0].decompress().unwrap(), Samples::Int(vec![100, 200, 300]));
//! ```
//!
//! # Building traces
//!
//! ```
//! use miniseed_trace::{RecordBuilder, Samples, SourceId, TimeWindow, reader, traces_per_channel};
//! use time::Duration;
//! use time::macros::datetime;
//!
//! let sid = SourceId::from_nslc("IU", "ANMO", "00", "BHZ").unwrap();
//! let start = datetime!(2024-01-15 10:00 UTC);
//! let mut data = Vec::new();
//! for (i, chunk) in [[1, 2, 3, 4], [5, 6, 7, 8]].iter().enumerate() {
//!     let bytes = RecordBuilder::new(sid.clone())
//!         .start_time(start + Duration::seconds(4 * i as i64))
//!         .samples(Samples::Int(chunk.to_vec()))
//!         .build_v2()
//!         .unwrap();
//!     data.extend(bytes);
//! }
//!
//! let records = reader::parse(&data).unwrap();
//! let mut traces = traces_per_channel(&records).unwrap();
//! let trace = &mut traces[0];
//! assert!(trace.is_contiguous());
//! assert_eq!(trace.num_points(), 8);
//!
//! let window = TimeWindow::new(start + Duration::seconds(2), start + Duration::seconds(5));
//! let mut cut = trace.cut(&window).unwrap().unwrap();
//! assert_eq!(cut.y().unwrap(), &Samples::Int(vec![3, 4, 5, 6]));
//! ```

pub mod buffer;
pub mod builder;
pub mod codec;
pub mod crc;
pub mod display;
pub mod error;
pub mod mseed2;
pub mod mseed3;
pub mod options;
pub mod reader;
pub mod record;
pub mod samples;
pub mod segment;
pub mod sid;
pub mod steim;
pub mod time;
pub mod trace;
pub mod types;

pub use builder::RecordBuilder;
pub use codec::{Decoded, IntegrityWarning};
pub use crc::{CrcStatus, crc32c};
pub use display::{ChannelMeta, DisplayData};
pub use error::{MseedError, Result};
pub use mseed2::DataRecord;
pub use mseed3::MSeed3Record;
pub use options::{DecodeOptions, ParseOptions};
pub use reader::RecordReader;
pub use record::{EncodedPayload, Record};
pub use samples::{MinMax, Samples, Stats};
pub use segment::{SampleStore, Segment};
pub use sid::SourceId;
pub use crate::time::{BTime, NanoTime, TimeWindow};
pub use trace::{Trace, traces_per_channel};
pub use types::{ByteOrder, EncodingFormat, FormatVersion};
