//! Ordered collections of segments for one channel.
//!
//! A [`Trace`] keeps its segments in the order they were added. All
//! segments share a source identifier, sample rate and unit; adding one
//! that does not is a programming error reported as
//! [`MseedError::IncompatibleSegment`].

use std::collections::BTreeMap;
use std::fmt;

use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::codec::IntegrityWarning;
use crate::record::Record;
use crate::samples::{MinMax, Samples};
use crate::segment::{self, Segment};
use crate::sid::SourceId;
use crate::time::{TimeWindow, format_iso};
use crate::{MseedError, Result};

/// A possibly gappy series of segments for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    segments: Vec<Segment>,
    start: OffsetDateTime,
    end: OffsetDateTime,
}

impl Trace {
    /// Build a trace; fails on zero segments or mixed identity.
    pub fn new(segments: Vec<Segment>) -> Result<Self> {
        let mut iter = segments.into_iter();
        let first = iter.next().ok_or(MseedError::EmptyTrace)?;
        let mut trace = Trace::from_segment(first);
        for seg in iter {
            trace.append_segment(seg)?;
        }
        Ok(trace)
    }

    pub fn from_segment(segment: Segment) -> Self {
        Self {
            start: segment.start_time(),
            end: segment.end_time(),
            segments: vec![segment],
        }
    }

    /// A single-segment trace from decoded samples.
    pub fn from_contiguous_data(
        source_id: SourceId,
        samples: impl Into<Samples>,
        sample_rate: f64,
        start: OffsetDateTime,
    ) -> Self {
        Self::from_segment(Segment::new(source_id, samples, sample_rate, start))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    fn first(&self) -> &Segment {
        &self.segments[0]
    }

    pub fn source_id(&self) -> &SourceId {
        self.first().source_id()
    }

    pub fn network_code(&self) -> &str {
        self.first().network_code()
    }

    pub fn station_code(&self) -> &str {
        self.first().station_code()
    }

    pub fn location_code(&self) -> &str {
        self.first().location_code()
    }

    pub fn channel_code(&self) -> String {
        self.first().channel_code()
    }

    /// `NET.STA.LOC.CHA`
    pub fn codes(&self) -> String {
        self.source_id().nslc()
    }

    pub fn sample_rate(&self) -> f64 {
        self.first().sample_rate()
    }

    pub fn unit(&self) -> Option<&str> {
        self.first().unit()
    }

    /// Earliest segment start.
    pub fn start_time(&self) -> OffsetDateTime {
        self.start
    }

    /// Latest segment end.
    pub fn end_time(&self) -> OffsetDateTime {
        self.end
    }

    pub fn time_window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }

    /// Total samples across segments.
    pub fn num_points(&self) -> usize {
        self.segments.iter().map(Segment::num_points).sum()
    }

    /// Whether any segment still holds encoded payloads.
    pub fn is_encoded(&self) -> bool {
        self.segments.iter().any(Segment::is_encoded)
    }

    pub fn warnings(&self) -> Vec<IntegrityWarning> {
        self.segments
            .iter()
            .flat_map(|s| s.warnings().iter().copied())
            .collect()
    }

    /// Add a segment with the same identity, rate and unit.
    pub fn append_segment(&mut self, segment: Segment) -> Result<()> {
        self.first().check_compatible(&segment)?;
        self.start = self.start.min(segment.start_time());
        self.end = self.end.max(segment.end_time());
        self.segments.push(segment);
        Ok(())
    }

    /// Add every segment of `other`.
    pub fn append_trace(&mut self, other: Trace) -> Result<()> {
        // validate first so a failure leaves self untouched
        for seg in &other.segments {
            self.first().check_compatible(seg)?;
        }
        for seg in other.segments {
            self.append_segment(seg)?;
        }
        Ok(())
    }

    /// One segment, or every adjacent pair separated by a gap greater than
    /// zero and less than 1.5 sample periods.
    pub fn is_contiguous(&self) -> bool {
        self.segments.windows(2).all(|pair| {
            segment::follows(pair[0].end_time(), self.sample_rate(), pair[1].start_time())
        })
    }

    /// Gaps between adjacent segments that do not follow one another.
    pub fn gaps(&self) -> Vec<TimeWindow> {
        self.segments
            .windows(2)
            .filter(|pair| {
                !segment::follows(pair[0].end_time(), self.sample_rate(), pair[1].start_time())
                    && pair[0].end_time() < pair[1].start_time()
            })
            .map(|pair| TimeWindow::new(pair[0].end_time(), pair[1].start_time()))
            .collect()
    }

    /// Decode every segment.
    pub fn decode_all(&mut self) -> Result<()> {
        for seg in &mut self.segments {
            seg.decode()?;
        }
        Ok(())
    }

    /// Concatenate all samples into one array with the width of the first
    /// segment. The trace must be contiguous.
    pub fn merge(&mut self) -> Result<Samples> {
        if !self.is_contiguous() {
            return Err(MseedError::NotContiguous(self.segments.len()));
        }
        self.decode_all()?;
        let parts = self.segments.iter().filter_map(Segment::samples);
        Ok(Samples::concat(parts)?.unwrap_or(Samples::Int(Vec::new())))
    }

    /// The samples of a contiguous trace, merging its segments into one.
    pub fn y(&mut self) -> Result<&Samples> {
        if self.segments.len() > 1 {
            let merged = self.merge()?;
            let seg = self.first().clone_with_samples(merged);
            self.segments = vec![seg];
        }
        self.segments[0].decode()
    }

    /// Segments overlapping `window`, uncut. `None` when none overlap.
    pub fn trim(&self, window: &TimeWindow) -> Option<Trace> {
        let kept: Vec<Segment> = self
            .segments
            .iter()
            .filter(|s| s.overlaps(window))
            .cloned()
            .collect();
        Trace::new(kept).ok()
    }

    /// Samples whose time lies in `window`. `None` when there are none.
    pub fn cut(&mut self, window: &TimeWindow) -> Result<Option<Trace>> {
        let mut cut = Vec::new();
        for seg in &mut self.segments {
            if let Some(piece) = seg.cut(window)? {
                cut.push(piece);
            }
        }
        if cut.is_empty() {
            return Ok(None);
        }
        Trace::new(cut).map(Some)
    }

    /// Split the segments in place at multiples of `duration` after the
    /// trace start. Each piece covers `[k * duration, (k + 1) * duration)`.
    ///
    /// Only windows holding samples are visited, so the work is bounded by
    /// the number of samples however short `duration` is.
    pub fn break_into(&mut self, duration: Duration) -> Result<()> {
        if !duration.is_positive() {
            return Ok(());
        }
        let origin = self.start;
        let step = duration.whole_nanoseconds();
        let mut pieces: Vec<(i128, Segment)> = Vec::new();
        for seg in &mut self.segments {
            let n = seg.decode()?.len();
            let mut next = 0;
            while next < n {
                let k = (seg.time_of_sample(next) - origin).whole_nanoseconds().div_euclid(step);
                let offset = i64::try_from(k * step).map_err(|_| {
                    MseedError::InvalidTime(format!("break window {k} out of range"))
                })?;
                let window = segment::half_open(
                    origin.saturating_add(Duration::nanoseconds(offset)),
                    duration,
                );
                match seg.cut(&window)? {
                    Some(piece) => {
                        next += piece.num_points();
                        pieces.push((k, piece));
                    }
                    None => break,
                }
            }
        }
        // window order, segment order within a window
        pieces.sort_by_key(|(k, _)| *k);
        debug!(
            codes = %self.codes(),
            before = self.segments.len(),
            after = pieces.len(),
            "broke trace into pieces"
        );
        if !pieces.is_empty() {
            self.segments = pieces.into_iter().map(|(_, piece)| piece).collect();
        }
        Ok(())
    }

    /// Fold the extrema of every segment into `acc`.
    pub fn find_min_max(&mut self, acc: Option<MinMax>) -> Result<Option<MinMax>> {
        let mut acc = acc;
        for seg in &mut self.segments {
            acc = seg.find_min_max(acc)?;
        }
        Ok(acc)
    }

    /// Mean over all samples, weighting each segment by its length.
    pub fn mean(&mut self) -> Result<Option<f64>> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for seg in &mut self.segments {
            let samples = seg.decode()?;
            sum += samples.sum();
            count += samples.len();
        }
        Ok((count > 0).then(|| sum / count as f64))
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} - {} {} segments, {} samples",
            self.source_id(),
            format_iso(self.start),
            format_iso(self.end),
            self.segments.len(),
            self.num_points()
        )
    }
}

/// Group records into one trace per source identifier.
///
/// Records are ordered by start time. A record that starts within 1.5
/// sample periods after the end of the previous one extends the same
/// segment; payloads stay encoded until the samples are needed. Traces are
/// returned in source identifier order.
pub fn traces_per_channel(records: &[Record<'_>]) -> Result<Vec<Trace>> {
    let mut by_channel: BTreeMap<&SourceId, Vec<&Record<'_>>> = BTreeMap::new();
    for record in records {
        by_channel.entry(record.source_id()).or_default().push(record);
    }

    let mut traces = Vec::with_capacity(by_channel.len());
    for (sid, mut group) in by_channel {
        group.sort_by_key(|r| r.start_time());
        let mut segments: Vec<Segment> = Vec::new();
        for record in group {
            let joins = segments.last().is_some_and(|last| {
                last.sample_rate() == record.sample_rate()
                    && segment::follows(last.end_time(), record.sample_rate(), record.start_time())
            });
            if joins {
                if let Some(last) = segments.last_mut() {
                    last.push_payload(record.to_encoded_payload())?;
                    continue;
                }
            }
            segments.push(Segment::from_record(record));
        }
        debug!(%sid, segments = segments.len(), "grouped records");
        traces.push(Trace::new(segments)?);
    }
    Ok(traces)
}
