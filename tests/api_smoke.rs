//! Top-level re-exports and an end-to-end read of a mixed v2/v3 stream.

use miniseed_trace::{
    BTime, ByteOrder, CrcStatus, DecodeOptions, DisplayData, EncodingFormat, FormatVersion,
    MseedError, NanoTime, ParseOptions, Record, RecordBuilder, RecordReader, Result, Samples,
    SourceId, Trace, crc32c, traces_per_channel,
};
use time::macros::datetime;

#[test]
fn top_level_imports_compile() {
    let _: fn(&[u8]) -> Result<Record<'_>> = Record::parse;
    let _: fn(&[Record<'_>]) -> Result<Vec<Trace>> = traces_per_channel;

    let _bo = ByteOrder::Big;
    let _s = Samples::Int(vec![]);
    let bt = BTime {
        year: 2025,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
        fract: 0,
    };
    assert_eq!(NanoTime::from_btime(&bt).year, 2025);
    let _enc = EncodingFormat::Steim1;
    let _fv = FormatVersion::V2;
    let _opts = ParseOptions::new().with_decode(DecodeOptions::new());

    let _e: Option<MseedError> = None;
}

#[test]
fn crc32c_check_value() {
    assert_eq!(crc32c(b"123456789"), 0xE306_9283);
}

#[test]
fn mixed_stream_to_display() {
    let sid = SourceId::parse("FDSN:XX_TEST_00_H_H_Z").unwrap();
    let start = datetime!(2023-06-01 12:00 UTC);

    let mut data = RecordBuilder::new(sid.clone())
        .start_time(start)
        .sample_rate(10.0)
        .encoding(EncodingFormat::Steim1)
        .samples(Samples::Int((0..20).collect()))
        .build_v2()
        .unwrap();
    data.extend(
        RecordBuilder::new(sid.clone())
            .start_time(datetime!(2023-06-01 12:00:02 UTC))
            .sample_rate(10.0)
            .encoding(EncodingFormat::Steim2)
            .samples(Samples::Int((20..40).collect()))
            .build_v3()
            .unwrap(),
    );

    let records: Vec<_> = RecordReader::new(&data)
        .collect::<Result<Vec<_>>>()
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].format_version(), FormatVersion::V2);
    assert_eq!(records[1].format_version(), FormatVersion::V3);
    if let Record::V3(v3) = &records[1] {
        assert!(matches!(v3.crc_status(), CrcStatus::Valid(_)));
    }

    let traces = traces_per_channel(&records).unwrap();
    assert_eq!(traces.len(), 1);
    let trace = traces.into_iter().next().unwrap();
    assert!(trace.is_encoded());
    assert_eq!(trace.segments().len(), 1);
    assert_eq!(trace.codes(), "XX.TEST.00.HHZ");

    let mut display = DisplayData::from_trace(trace);
    assert_eq!(display.min().unwrap(), Some(0.0));
    assert_eq!(display.max().unwrap(), Some(39.0));
    assert_eq!(display.mean().unwrap(), Some(19.5));
    assert_eq!(display.time_window().start, start);
}
