//! Traces prepared for display.
//!
//! [`DisplayData`] couples an optional [`Trace`] with the time window a
//! plot wants to show and the channel it came from. Sample statistics are
//! computed on first request and dropped whenever the trace is replaced.

use crate::Result;
use crate::samples::Stats;
use crate::sid::SourceId;
use crate::time::TimeWindow;
use crate::trace::Trace;

/// Station and channel metadata for a displayed trace.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMeta {
    pub source_id: SourceId,
    pub latitude: f64,
    pub longitude: f64,
    /// Metres above sea level.
    pub elevation: f64,
    /// Metres below the surface.
    pub depth: f64,
    /// Degrees clockwise from north.
    pub azimuth: f64,
    /// Degrees down from horizontal.
    pub dip: f64,
    pub sample_rate: f64,
    /// Input unit of the instrument response, e.g. `m/s`.
    pub input_unit: Option<String>,
}

impl ChannelMeta {
    pub fn new(source_id: SourceId) -> Self {
        Self {
            source_id,
            latitude: 0.0,
            longitude: 0.0,
            elevation: 0.0,
            depth: 0.0,
            azimuth: 0.0,
            dip: 0.0,
            sample_rate: 0.0,
            input_unit: None,
        }
    }
}

/// A trace, the window to show it in, and cached statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayData {
    trace: Option<Trace>,
    time_window: TimeWindow,
    channel: Option<ChannelMeta>,
    stats: Option<Stats>,
}

impl DisplayData {
    /// An empty display for `time_window`, waiting for data.
    pub fn new(time_window: TimeWindow) -> Self {
        Self {
            trace: None,
            time_window,
            channel: None,
            stats: None,
        }
    }

    /// A display covering the whole trace.
    pub fn from_trace(trace: Trace) -> Self {
        Self::new(trace.time_window()).with_trace(trace)
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.set_trace(Some(trace));
        self
    }

    pub fn with_channel(mut self, channel: ChannelMeta) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    /// Replace the trace, invalidating cached statistics.
    pub fn set_trace(&mut self, trace: Option<Trace>) {
        self.trace = trace;
        self.stats = None;
    }

    pub fn has_data(&self) -> bool {
        self.trace.is_some()
    }

    pub fn time_window(&self) -> &TimeWindow {
        &self.time_window
    }

    pub fn set_time_window(&mut self, window: TimeWindow) {
        self.time_window = window;
    }

    pub fn channel(&self) -> Option<&ChannelMeta> {
        self.channel.as_ref()
    }

    /// `NET.STA.LOC.CHA` from the trace, else from the channel.
    pub fn codes(&self) -> Option<String> {
        match (&self.trace, &self.channel) {
            (Some(trace), _) => Some(trace.codes()),
            (None, Some(channel)) => Some(channel.source_id.nslc()),
            (None, None) => None,
        }
    }

    /// Min, max and mean of the trace samples. `None` without samples.
    pub fn stats(&mut self) -> Result<Option<Stats>> {
        if self.stats.is_none() {
            if let Some(trace) = self.trace.as_mut() {
                let extrema = trace.find_min_max(None)?;
                let mean = trace.mean()?;
                self.stats = extrema.zip(mean).map(|(mm, mean)| Stats {
                    min: mm.min,
                    max: mm.max,
                    mean,
                });
            }
        }
        Ok(self.stats)
    }

    pub fn min(&mut self) -> Result<Option<f64>> {
        Ok(self.stats()?.map(|s| s.min))
    }

    pub fn max(&mut self) -> Result<Option<f64>> {
        Ok(self.stats()?.map(|s| s.max))
    }

    pub fn mean(&mut self) -> Result<Option<f64>> {
        Ok(self.stats()?.map(|s| s.mean))
    }

    /// A display of the samples inside `window`, keeping the channel.
    pub fn cut(&mut self, window: &TimeWindow) -> Result<DisplayData> {
        let trace = match self.trace.as_mut() {
            Some(trace) => trace.cut(window)?,
            None => None,
        };
        Ok(DisplayData {
            trace,
            time_window: *window,
            channel: self.channel.clone(),
            stats: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::Samples;
    use crate::segment::Segment;
    use time::Duration;
    use time::macros::datetime;

    fn sid() -> SourceId {
        SourceId::from_nslc("CO", "JSC", "00", "HHZ").unwrap()
    }

    fn trace(values: Vec<i32>) -> Trace {
        Trace::from_contiguous_data(sid(), values, 1.0, datetime!(2020-01-01 00:00 UTC))
    }

    #[test]
    fn test_stats_are_lazy_and_invalidated() {
        let mut dd = DisplayData::from_trace(trace(vec![1, 5, 3]));
        assert_eq!(dd.min().unwrap(), Some(1.0));
        assert_eq!(dd.max().unwrap(), Some(5.0));
        assert_eq!(dd.mean().unwrap(), Some(3.0));

        dd.set_trace(Some(trace(vec![-2, 2])));
        assert_eq!(dd.stats().unwrap(), Some(Stats { min: -2.0, max: 2.0, mean: 0.0 }));

        dd.set_trace(None);
        assert_eq!(dd.stats().unwrap(), None);
    }

    #[test]
    fn test_codes_fall_back_to_channel() {
        let window = TimeWindow::after(datetime!(2020-01-01 00:00 UTC), Duration::hours(1));
        let dd = DisplayData::new(window);
        assert_eq!(dd.codes(), None);
        let dd = dd.with_channel(ChannelMeta::new(sid()));
        assert_eq!(dd.codes().as_deref(), Some("CO.JSC.00.HHZ"));
        assert!(!dd.has_data());
    }

    #[test]
    fn test_cut_keeps_channel() {
        let mut dd = DisplayData::from_trace(trace((0..60).collect()))
            .with_channel(ChannelMeta::new(sid()));
        let window = TimeWindow::after(datetime!(2020-01-01 00:00:10 UTC), Duration::seconds(9));
        let mut cut = dd.cut(&window).unwrap();
        assert_eq!(cut.time_window(), &window);
        assert!(cut.channel().is_some());
        assert_eq!(cut.trace().map(Trace::num_points), Some(10));
        assert_eq!(cut.min().unwrap(), Some(10.0));

        let outside = TimeWindow::after(datetime!(2021-01-01 00:00 UTC), Duration::seconds(1));
        assert!(!dd.cut(&outside).unwrap().has_data());
    }

    #[test]
    fn test_encoded_trace_decodes_on_stats() {
        use crate::codec;
        use crate::record::EncodedPayload;
        use crate::types::{ByteOrder, EncodingFormat};

        let samples = Samples::Int(vec![7, 8, 9]);
        let data = codec::encode(&samples, EncodingFormat::Steim1, ByteOrder::Big).unwrap();
        let payload = EncodedPayload::new(EncodingFormat::Steim1, ByteOrder::Big, 3, data);
        let seg = Segment::from_encoded(sid(), vec![payload], 1.0, datetime!(2020-01-01 00:00 UTC));
        let mut dd = DisplayData::from_trace(Trace::from_segment(seg));
        assert!(dd.trace().is_some_and(Trace::is_encoded));
        assert_eq!(dd.mean().unwrap(), Some(8.0));
        assert!(!dd.trace().is_some_and(Trace::is_encoded));
    }
}
