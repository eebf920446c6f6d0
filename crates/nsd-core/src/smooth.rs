//! Log-Space Smoothing
//!
//! Re-bins an NSD onto geometrically spaced frequencies so every decade gets
//! the same number of points. Dense linear-frequency estimates are noisy at
//! high frequencies where thousands of bins crowd into the last decade;
//! aggregating them per log-spaced bin gives a readable curve.
//!
//! ```text
//! edges:   e0        e1         e2            e3                 e4
//!          |---------|----------|-------------|------------------|
//! source:  ..........................................................
//!              bin 1      bin 2       bin 3            bin 4
//! ```
//!
//! Walking the edges from the second one on, a cursor advances through the
//! source while its frequency is below the edge. The samples from the
//! previous cursor position up to and including the current one form a bin:
//! the output frequency is their mean, the output amplitude is the chosen
//! [`Aggregator`] applied to their amplitudes. `output_bins` edges therefore
//! give `output_bins - 1` points, and neighbouring bins share their boundary
//! sample.
//!
//! When the source is sparser than the edges near the low end, several edges
//! can land on the same source sample and repeat a point.
//!
//! ## Example
//!
//! ```rust
//! use nsd_core::smooth::{smooth, Aggregate};
//! use nsd_core::types::SpectralEstimate;
//!
//! let f: Vec<f64> = (1..=10_000).map(|k| k as f64).collect();
//! let a: Vec<f64> = f.iter().map(|f| 1.0 / f.sqrt()).collect();
//! let est = SpectralEstimate::new(f, a).unwrap();
//!
//! let smoothed = smooth(&est, 32, &Aggregate::Median).unwrap();
//! assert_eq!(smoothed.len(), 31);
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{NsdError, NsdResult, SpectralEstimate};

/// Default number of geometric edges.
pub const DEFAULT_SMOOTH_BINS: usize = 64;

/// Reduction applied to the amplitudes of one smoothing bin.
///
/// Any `Fn(&[f64]) -> f64` works as an aggregator.
pub trait Aggregator {
    /// Reduce a non-empty slice to one value.
    fn aggregate(&self, values: &[f64]) -> f64;
}

impl<F> Aggregator for F
where
    F: Fn(&[f64]) -> f64,
{
    fn aggregate(&self, values: &[f64]) -> f64 {
        self(values)
    }
}

/// Built-in aggregators, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    #[default]
    Mean,
    Median,
    Min,
    Max,
}

impl Aggregate {
    pub fn name(&self) -> &'static str {
        match self {
            Aggregate::Mean => "mean",
            Aggregate::Median => "median",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }
}

impl FromStr for Aggregate {
    type Err = NsdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(Aggregate::Mean),
            "median" => Ok(Aggregate::Median),
            "min" => Ok(Aggregate::Min),
            "max" => Ok(Aggregate::Max),
            _ => Err(NsdError::Unsupported {
                kind: "aggregate",
                value: s.to_string(),
            }),
        }
    }
}

impl Aggregator for Aggregate {
    fn aggregate(&self, values: &[f64]) -> f64 {
        match self {
            Aggregate::Mean => mean(values),
            Aggregate::Median => median(values),
            Aggregate::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregate::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// `count` geometrically spaced values from `start` to `stop`, both included.
pub fn geomspace(start: f64, stop: f64, count: usize) -> NsdResult<Vec<f64>> {
    if !(start > 0.0 && stop > 0.0 && start.is_finite() && stop.is_finite()) {
        return Err(NsdError::Domain(format!(
            "geometric spacing needs positive finite bounds, got [{}, {}]",
            start, stop
        )));
    }
    Ok(match count {
        0 => vec![],
        1 => vec![start],
        _ => {
            let ratio = (stop / start).ln() / (count - 1) as f64;
            let mut edges: Vec<f64> = (0..count)
                .map(|i| start * (ratio * i as f64).exp())
                .collect();
            edges[count - 1] = stop;
            edges
        }
    })
}

/// Re-bin `estimate` onto `output_bins` geometric edges.
///
/// Frequencies must be ascending with a positive first value (crop away the
/// DC bin first). Returns `output_bins - 1` points.
pub fn smooth<A>(
    estimate: &SpectralEstimate,
    output_bins: usize,
    aggregator: &A,
) -> NsdResult<SpectralEstimate>
where
    A: Aggregator + ?Sized,
{
    if output_bins < 2 {
        return Err(NsdError::Config(format!(
            "smoothing needs at least 2 output bins, got {}",
            output_bins
        )));
    }
    estimate.require_sorted(2)?;

    let f = estimate.frequencies();
    let a = estimate.amplitudes();
    let last = f.len() - 1;
    let edges = geomspace(f[0], f[last], output_bins)?;

    let mut frequencies = Vec::with_capacity(output_bins - 1);
    let mut amplitudes = Vec::with_capacity(output_bins - 1);
    let mut cursor = 0;
    for &edge in &edges[1..] {
        let start = cursor;
        while cursor < last && f[cursor] < edge {
            cursor += 1;
        }
        frequencies.push(mean(&f[start..=cursor]));
        amplitudes.push(aggregator.aggregate(&a[start..=cursor]));
    }

    debug!(
        source = f.len(),
        points = frequencies.len(),
        "smoothed spectral estimate"
    );
    SpectralEstimate::new(frequencies, amplitudes)
}
