//! Moving-average smoothing
//!
//! Each output point is the mean of a sample and the `window` samples before
//! it. The mean is updated incrementally, one subtraction and one addition per
//! output point, rather than recomputed over the whole window.

use crate::error::PositionFault;
use crate::types::{validate_positions, SmoothedSeries};

/// Smoother for converting one raw series into its moving average
pub struct Smoother;

impl Smoother {
    /// Smooth `raw` with `window` trailing samples per point.
    ///
    /// A window of 0 returns `raw` unchanged. Otherwise the result has
    /// `raw.len() - window` points, or none when `raw` holds fewer than
    /// `window + 1` samples.
    pub fn smooth(raw: &[f64], window: usize) -> Vec<f64> {
        if window == 0 {
            return raw.to_vec();
        }
        let span = window + 1;
        if raw.len() < span {
            return Vec::new();
        }

        let denom = span as f64;
        let mut smoothed = Vec::with_capacity(raw.len() - window);
        let mut current = raw[..span].iter().sum::<f64>() / denom;
        smoothed.push(current);
        for i in 1..raw.len() - window {
            current -= (raw[i - 1] - raw[i + window]) / denom;
            smoothed.push(current);
        }
        smoothed
    }

    /// Smooth a series together with its positions.
    ///
    /// The first `window` positions are dropped so each smoothed value sits at
    /// the position of the newest sample in its window. Positions must match
    /// `raw` in length and never decrease.
    pub fn smooth_series(
        raw: &[f64],
        positions: &[f64],
        window: usize,
    ) -> Result<SmoothedSeries, PositionFault> {
        validate_positions(raw.len(), positions)?;
        let values = Self::smooth(raw, window);
        if values.is_empty() {
            return Ok(SmoothedSeries::empty());
        }
        Ok(SmoothedSeries::from_validated(positions[window..].to_vec(), values))
    }
}
