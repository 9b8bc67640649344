//! A single run of evenly spaced samples.
//!
//! A [`Segment`] holds either decoded samples or the encoded payloads of the
//! records it was built from, never both. Decoding is a one-way transition
//! performed at most once: [`Segment::decode`] replaces the payloads with
//! the decoded array.

use std::cell::Cell;
use std::fmt;

use time::{Duration, OffsetDateTime};

use crate::builder::RecordBuilder;
use crate::codec::IntegrityWarning;
use crate::options::DecodeOptions;
use crate::record::{EncodedPayload, Record};
use crate::samples::{MinMax, Samples};
use crate::sid::SourceId;
use crate::time::{TimeWindow, format_iso};
use crate::types::EncodingFormat;
use crate::{MseedError, Result};

/// Sample storage of a segment.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleStore {
    /// Payloads in time order, not yet decoded.
    Encoded(Vec<EncodedPayload>),
    Decoded(Samples),
}

impl SampleStore {
    pub fn len(&self) -> usize {
        match self {
            SampleStore::Encoded(payloads) => payloads.iter().map(|p| p.num_samples).sum(),
            SampleStore::Decoded(samples) => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A contiguous run of samples for one channel.
#[derive(Debug, Clone)]
pub struct Segment {
    source_id: SourceId,
    unit: Option<String>,
    sample_rate: f64,
    start: OffsetDateTime,
    store: SampleStore,
    decode_options: DecodeOptions,
    warnings: Vec<IntegrityWarning>,
    end_cache: Cell<Option<OffsetDateTime>>,
}

impl Segment {
    /// A segment of already decoded samples.
    pub fn new(
        source_id: SourceId,
        samples: impl Into<Samples>,
        sample_rate: f64,
        start: OffsetDateTime,
    ) -> Self {
        Self::with_store(source_id, SampleStore::Decoded(samples.into()), sample_rate, start)
    }

    /// A segment whose payloads are decoded on first use.
    pub fn from_encoded(
        source_id: SourceId,
        payloads: Vec<EncodedPayload>,
        sample_rate: f64,
        start: OffsetDateTime,
    ) -> Self {
        Self::with_store(source_id, SampleStore::Encoded(payloads), sample_rate, start)
    }

    /// A segment holding the undecoded payload of one record, decoded with
    /// the options the record was parsed with.
    pub fn from_record(record: &Record<'_>) -> Self {
        Self::from_encoded(
            record.source_id().clone(),
            vec![record.to_encoded_payload()],
            record.sample_rate(),
            record.start_time(),
        )
        .with_decode_options(record.decode_options())
    }

    fn with_store(
        source_id: SourceId,
        store: SampleStore,
        sample_rate: f64,
        start: OffsetDateTime,
    ) -> Self {
        Self {
            source_id,
            unit: None,
            sample_rate,
            start,
            store,
            decode_options: DecodeOptions::default(),
            warnings: Vec::new(),
            end_cache: Cell::new(None),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_decode_options(mut self, options: DecodeOptions) -> Self {
        self.decode_options = options;
        self
    }

    /// Same identity, rate and start with new samples.
    pub fn clone_with_samples(&self, samples: Samples) -> Segment {
        Segment {
            source_id: self.source_id.clone(),
            unit: self.unit.clone(),
            sample_rate: self.sample_rate,
            start: self.start,
            store: SampleStore::Decoded(samples),
            decode_options: self.decode_options,
            warnings: Vec::new(),
            end_cache: Cell::new(None),
        }
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    pub fn network_code(&self) -> &str {
        self.source_id.network()
    }

    pub fn station_code(&self) -> &str {
        self.source_id.station()
    }

    pub fn location_code(&self) -> &str {
        self.source_id.location()
    }

    pub fn channel_code(&self) -> String {
        self.source_id.channel_code()
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Seconds between samples; zero without a rate.
    pub fn sample_period(&self) -> f64 {
        if self.sample_rate > 0.0 {
            1.0 / self.sample_rate
        } else {
            0.0
        }
    }

    pub fn set_sample_rate(&mut self, rate: f64) {
        self.sample_rate = rate;
        self.end_cache.set(None);
    }

    pub fn start_time(&self) -> OffsetDateTime {
        self.start
    }

    pub fn set_start_time(&mut self, start: OffsetDateTime) {
        self.start = start;
        self.end_cache.set(None);
    }

    /// Time of the last sample, `start + (n - 1) / rate`.
    pub fn end_time(&self) -> OffsetDateTime {
        if let Some(end) = self.end_cache.get() {
            return end;
        }
        let end = self.time_of_sample(self.num_points().saturating_sub(1));
        self.end_cache.set(Some(end));
        end
    }

    pub fn time_window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end_time())
    }

    pub fn num_points(&self) -> usize {
        self.store.len()
    }

    pub fn is_encoded(&self) -> bool {
        matches!(self.store, SampleStore::Encoded(_))
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    /// The decoded samples, if decoding already happened.
    pub fn samples(&self) -> Option<&Samples> {
        match &self.store {
            SampleStore::Decoded(samples) => Some(samples),
            SampleStore::Encoded(_) => None,
        }
    }

    /// Replace the samples, dropping any encoded payloads.
    pub fn set_samples(&mut self, samples: Samples) {
        self.store = SampleStore::Decoded(samples);
        self.end_cache.set(None);
    }

    /// Integrity warnings collected while decoding.
    pub fn warnings(&self) -> &[IntegrityWarning] {
        &self.warnings
    }

    /// Decode the payloads if still encoded and return the samples.
    ///
    /// The payloads are decoded in order and concatenated; all of them must
    /// decode to the same numeric width. On error the segment stays
    /// encoded.
    pub fn decode(&mut self) -> Result<&Samples> {
        if let SampleStore::Encoded(payloads) = &self.store {
            let mut warnings = Vec::new();
            let mut decoded: Option<Samples> = None;
            for payload in payloads {
                let mut part = payload.decode(&self.decode_options)?;
                warnings.append(&mut part.warnings);
                decoded = Some(match decoded.take() {
                    Some(mut samples) => {
                        samples.extend(&part.samples)?;
                        samples
                    }
                    None => part.samples,
                });
            }
            self.warnings.extend(warnings);
            self.store = SampleStore::Decoded(decoded.unwrap_or(Samples::Int(Vec::new())));
            self.end_cache.set(None);
        }
        match &self.store {
            SampleStore::Decoded(samples) => Ok(samples),
            SampleStore::Encoded(_) => unreachable!(),
        }
    }

    /// Time of sample `index`, clamped to the last representable instant.
    pub fn time_of_sample(&self, index: usize) -> OffsetDateTime {
        crate::time::sample_time(self.start, index, self.sample_rate)
    }

    /// Index of the sample at or before `t`, `floor(elapsed * rate)`.
    /// Negative before the start.
    pub fn index_of_time(&self, t: OffsetDateTime) -> i64 {
        let elapsed = (t - self.start).whole_nanoseconds() as f64 / 1e9;
        (elapsed * self.sample_rate).floor() as i64
    }

    /// Whether any sample time can fall in `window`.
    pub fn overlaps(&self, window: &TimeWindow) -> bool {
        self.time_window().overlaps(window)
    }

    /// A new segment with the samples whose time lies in `window`, or
    /// `None` when there are none. Decodes this segment.
    pub fn cut(&mut self, window: &TimeWindow) -> Result<Option<Segment>> {
        if !self.overlaps(window) || self.num_points() == 0 {
            return Ok(None);
        }
        self.decode()?;
        let Some(samples) = self.samples() else {
            return Ok(None);
        };
        let n = samples.len();
        if self.sample_rate <= 0.0 {
            // every sample sits at the start time
            return Ok(window
                .contains(self.start)
                .then(|| self.clone_with_samples(samples.clone())));
        }

        // the float estimate can be one sample off either way
        let mut first = (self.index_of_time(window.start).max(0) as usize).min(n);
        while first > 0 && self.time_of_sample(first - 1) >= window.start {
            first -= 1;
        }
        while first < n && self.time_of_sample(first) < window.start {
            first += 1;
        }
        let mut last = self.index_of_time(window.end).min(n as i64 - 1);
        while last + 1 < n as i64 && self.time_of_sample((last + 1) as usize) <= window.end {
            last += 1;
        }
        while last >= first as i64 && self.time_of_sample(last as usize) > window.end {
            last -= 1;
        }
        if first >= n || last < first as i64 {
            return Ok(None);
        }
        let last = last as usize;

        let mut out = self.clone_with_samples(samples.slice(first..last + 1));
        out.start = self.time_of_sample(first);
        Ok(Some(out))
    }

    /// Fold this segment's extrema into `acc`. Decodes this segment.
    pub fn find_min_max(&mut self, acc: Option<MinMax>) -> Result<Option<MinMax>> {
        Ok(self.decode()?.find_min_max(acc))
    }

    /// Mean sample value, `None` when empty. Decodes this segment.
    pub fn mean(&mut self) -> Result<Option<f64>> {
        Ok(self.decode()?.mean())
    }

    /// Serialize as one miniSEED v3 record. Integer samples are stored as
    /// INT32, float samples with their own width.
    pub fn to_mseed3(&mut self) -> Result<Vec<u8>> {
        let samples = self.decode()?.clone();
        let encoding = match samples {
            Samples::Int(_) => EncodingFormat::Int32,
            Samples::Float(_) => EncodingFormat::Float32,
            Samples::Double(_) => EncodingFormat::Float64,
        };
        RecordBuilder::new(self.source_id.clone())
            .start_time(self.start)
            .sample_rate(self.sample_rate)
            .encoding(encoding)
            .samples(samples)
            .build_v3()
    }

    /// Check that `other` can share a trace with this segment.
    pub(crate) fn check_compatible(&self, other: &Segment) -> Result<()> {
        if self.source_id != other.source_id {
            return Err(MseedError::IncompatibleSegment(format!(
                "source id {} != {}",
                other.source_id, self.source_id
            )));
        }
        if self.sample_rate != other.sample_rate {
            return Err(MseedError::IncompatibleSegment(format!(
                "sample rate {} != {} for {}",
                other.sample_rate, self.sample_rate, self.source_id
            )));
        }
        if self.unit != other.unit {
            return Err(MseedError::IncompatibleSegment(format!(
                "unit {:?} != {:?} for {}",
                other.unit, self.unit, self.source_id
            )));
        }
        Ok(())
    }

    pub(crate) fn push_payload(&mut self, payload: EncodedPayload) -> Result<()> {
        match &mut self.store {
            SampleStore::Encoded(payloads) => {
                payloads.push(payload);
                self.end_cache.set(None);
                Ok(())
            }
            SampleStore::Decoded(_) => Err(MseedError::IncompatibleSegment(
                "cannot add an encoded payload to decoded samples".into(),
            )),
        }
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.source_id == other.source_id
            && self.unit == other.unit
            && self.sample_rate == other.sample_rate
            && self.start == other.start
            && self.store == other.store
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} - {} {} Hz, {} samples",
            self.source_id,
            format_iso(self.start),
            format_iso(self.end_time()),
            self.sample_rate,
            self.num_points()
        )
    }
}

/// `next` starts after `prev_end` by less than 1.5 sample periods.
///
/// A zero gap counts as not following; this matches the contiguity rule of
/// existing waveform tools and is kept for compatibility.
pub(crate) fn follows(prev_end: OffsetDateTime, sample_rate: f64, next_start: OffsetDateTime) -> bool {
    if sample_rate <= 0.0 {
        return false;
    }
    let tolerance = crate::time::seconds(1.5 / sample_rate);
    prev_end < next_start && prev_end.saturating_add(tolerance) > next_start
}

/// Half-open window `[start, start + duration)` expressed as a closed one.
pub(crate) fn half_open(start: OffsetDateTime, duration: Duration) -> TimeWindow {
    TimeWindow::new(start, start.saturating_add(duration - Duration::NANOSECOND))
}
