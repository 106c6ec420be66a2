//! Descriptive statistics shared by the analyses.
//!
//! Quantiles use linear interpolation between closest ranks:
//! for `q` in [0, 1] over sorted values `v[0..n]`, the position is
//! `q * (n - 1)` and fractional positions interpolate between neighbours.

use serde::Serialize;

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Quantile of already-sorted values, `None` for an empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Quantile of unsorted values.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let sorted = sorted_copy(values);
    quantile_sorted(&sorted, q)
}

/// Median of unsorted values.
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Min-max normalize to [0, 1].
///
/// When every value is equal the range is zero and every output is 0.
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if values.is_empty() || range <= 0.0 || !range.is_finite() {
        return vec![0.0; values.len()];
    }

    values.iter().map(|v| (v - min) / range).collect()
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Five-number summary plus mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub mean: f64,
}

impl DistributionSummary {
    /// Summarize values, `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let sorted = sorted_copy(values);
        Some(Self {
            min: *sorted.first()?,
            q1: quantile_sorted(&sorted, 0.25)?,
            median: quantile_sorted(&sorted, 0.5)?,
            q3: quantile_sorted(&sorted, 0.75)?,
            max: *sorted.last()?,
            mean: mean(&sorted)?,
        })
    }

    /// Apply a unit conversion (e.g. seconds to hours) to every field.
    pub fn scaled(&self, divisor: f64) -> Self {
        Self {
            min: self.min / divisor,
            q1: self.q1 / divisor,
            median: self.median / divisor,
            q3: self.q3 / divisor,
            max: self.max / divisor,
            mean: self.mean / divisor,
        }
    }
}

/// A histogram bucket `[lower, upper)`; the last bucket also includes `upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Equal-width histogram over the values' own range.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // A single distinct value gets one unit-wide range around it
    let (min, max) = if max > min {
        (min, max)
    } else {
        (min - 0.5, max + 0.5)
    };
    let width = (max - min) / bins as f64;

    let mut counts = vec![0usize; bins];
    for value in values {
        let idx = (((value - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: min + width * i as f64,
            upper: min + width * (i + 1) as f64,
            count,
        })
        .collect()
}
