//! Decoded sample arrays and simple statistics over them.
//!
//! [`Samples`] is a sum type over the numeric widths a payload can decode
//! to. 16-bit integer payloads widen into [`Samples::Int`] without loss.
//! Statistics are accumulated in `f64`, which is exact for every `i32` and
//! `f32` value.

use std::ops::Range;

use crate::{MseedError, Result};

/// Decoded sample data.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Int(v) => v.len(),
            Samples::Float(v) => v.len(),
            Samples::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the numeric width.
    pub fn kind(&self) -> &'static str {
        match self {
            Samples::Int(_) => "int32",
            Samples::Float(_) => "float32",
            Samples::Double(_) => "float64",
        }
    }

    /// An empty array of the same numeric width.
    pub fn empty_like(&self) -> Samples {
        match self {
            Samples::Int(_) => Samples::Int(Vec::new()),
            Samples::Float(_) => Samples::Float(Vec::new()),
            Samples::Double(_) => Samples::Double(Vec::new()),
        }
    }

    /// Value at `index` widened to `f64`.
    pub fn get(&self, index: usize) -> Option<f64> {
        match self {
            Samples::Int(v) => v.get(index).map(|&x| x as f64),
            Samples::Float(v) => v.get(index).map(|&x| x as f64),
            Samples::Double(v) => v.get(index).copied(),
        }
    }

    /// Iterate over all values widened to `f64`.
    pub fn iter_f64(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match self {
            Samples::Int(v) => Box::new(v.iter().map(|&x| x as f64)),
            Samples::Float(v) => Box::new(v.iter().map(|&x| x as f64)),
            Samples::Double(v) => Box::new(v.iter().copied()),
        }
    }

    /// Copy of the samples in `range`, same numeric width.
    ///
    /// The range is clamped to the available samples.
    pub fn slice(&self, range: Range<usize>) -> Samples {
        let len = self.len();
        let end = range.end.min(len);
        let start = range.start.min(end);
        match self {
            Samples::Int(v) => Samples::Int(v[start..end].to_vec()),
            Samples::Float(v) => Samples::Float(v[start..end].to_vec()),
            Samples::Double(v) => Samples::Double(v[start..end].to_vec()),
        }
    }

    /// Append `other`, which must have the same numeric width.
    pub fn extend(&mut self, other: &Samples) -> Result<()> {
        match (self, other) {
            (Samples::Int(a), Samples::Int(b)) => a.extend_from_slice(b),
            (Samples::Float(a), Samples::Float(b)) => a.extend_from_slice(b),
            (Samples::Double(a), Samples::Double(b)) => a.extend_from_slice(b),
            (a, b) => {
                return Err(MseedError::MixedSampleWidths {
                    first: a.kind(),
                    other: b.kind(),
                });
            }
        }
        Ok(())
    }

    /// Concatenate arrays into one with the width of the first.
    pub fn concat<'a, I>(parts: I) -> Result<Option<Samples>>
    where
        I: IntoIterator<Item = &'a Samples>,
    {
        let mut iter = parts.into_iter();
        let Some(first) = iter.next() else {
            return Ok(None);
        };
        let mut out = first.clone();
        for part in iter {
            out.extend(part)?;
        }
        Ok(Some(out))
    }

    /// Sum of all values.
    pub fn sum(&self) -> f64 {
        self.iter_f64().sum()
    }

    /// Arithmetic mean, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.sum() / self.len() as f64)
        }
    }

    /// Fold the extrema of these samples into `acc`.
    ///
    /// Returns `acc` unchanged when there are no samples.
    pub fn find_min_max(&self, acc: Option<MinMax>) -> Option<MinMax> {
        self.iter_f64().fold(acc, |acc, value| match acc {
            None => Some(MinMax::new(value)),
            Some(mm) => Some(mm.including(value)),
        })
    }
}

impl From<Vec<i32>> for Samples {
    fn from(v: Vec<i32>) -> Self {
        Samples::Int(v)
    }
}

impl From<Vec<f32>> for Samples {
    fn from(v: Vec<f32>) -> Self {
        Samples::Float(v)
    }
}

impl From<Vec<f64>> for Samples {
    fn from(v: Vec<f64>) -> Self {
        Samples::Double(v)
    }
}

/// Running minimum and maximum, used to stream extrema across many arrays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    pub fn new(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn including(self, value: f64) -> Self {
        Self {
            min: self.min.min(value),
            max: self.max.max(value),
        }
    }

    pub fn merge(self, other: MinMax) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Sample statistics over a trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_slice_clamps() {
        let s = Samples::Int(vec![1, 2, 3, 4]);
        assert_eq!(s.slice(1..3), Samples::Int(vec![2, 3]));
        assert_eq!(s.slice(3..10), Samples::Int(vec![4]));
        assert_eq!(s.slice(8..10), Samples::Int(vec![]));
    }

    #[test]
    fn test_extend_rejects_mixed_widths() {
        let mut a = Samples::Int(vec![1]);
        let err = a.extend(&Samples::Double(vec![1.0])).unwrap_err();
        assert!(matches!(
            err,
            MseedError::MixedSampleWidths {
                first: "int32",
                other: "float64"
            }
        ));
    }

    #[test]
    fn test_concat_keeps_first_width() {
        let a = Samples::Float(vec![1.0]);
        let b = Samples::Float(vec![2.0, 3.0]);
        let out = Samples::concat([&a, &b]).unwrap().unwrap();
        assert_eq!(out, Samples::Float(vec![1.0, 2.0, 3.0]));
        assert_eq!(Samples::concat(std::iter::empty()).unwrap(), None);
    }

    #[test]
    fn test_mean_and_min_max() {
        let s = Samples::Int(vec![-7, -50, -58, -46, -31, 17]);
        assert_eq!(s.mean(), Some(-175.0 / 6.0));
        let mm = s.find_min_max(None).unwrap();
        assert_eq!(mm, MinMax { min: -58.0, max: 17.0 });
        assert_eq!(Samples::Double(vec![]).mean(), None);
        assert_eq!(Samples::Double(vec![]).find_min_max(None), None);
    }

    proptest! {
        #[test]
        fn min_max_accumulates_across_chunks(
            chunks in prop::collection::vec(prop::collection::vec(any::<i32>(), 0..20), 1..8)
        ) {
            let mut acc = None;
            for chunk in &chunks {
                acc = Samples::Int(chunk.clone()).find_min_max(acc);
            }
            let all: Vec<i32> = chunks.concat();
            prop_assert_eq!(acc, Samples::Int(all).find_min_max(None));
        }
    }
}
