//! Core types for the learning-curve engine
//!
//! This module defines the data structures that flow through each stage of the
//! engine: raw runs and groups from ingestion, smoothed series, and the combined
//! curve handed to rendering.

use crate::config::CurveConfig;
use crate::error::PositionFault;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One run's raw samples as produced by ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Display label (usually the source file name)
    pub label: String,
    /// Ordered samples, e.g. per-episode returns
    pub values: Vec<f64>,
    /// Optional cumulative positions, one per sample
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<f64>>,
}

impl Run {
    /// Run positioned by sample index
    pub fn new(label: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            values,
            positions: None,
        }
    }

    /// Run with externally supplied cumulative positions
    pub fn with_positions(label: impl Into<String>, values: Vec<f64>, positions: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            values,
            positions: Some(positions),
        }
    }
}

/// A set of runs averaged into one reported curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub runs: Vec<Run>,
}

impl Group {
    pub fn new(name: impl Into<String>, runs: Vec<Run>) -> Self {
        Self {
            name: name.into(),
            runs,
        }
    }
}

/// Check that a position sequence matches its samples and never decreases.
///
/// NaN positions are reported as [`PositionFault::Decreasing`] since they
/// cannot be ordered.
pub fn validate_positions(values_len: usize, positions: &[f64]) -> Result<(), PositionFault> {
    if positions.len() != values_len {
        return Err(PositionFault::LengthMismatch {
            values: values_len,
            positions: positions.len(),
        });
    }
    if let Some(first) = positions.first() {
        if first.is_nan() {
            return Err(PositionFault::Decreasing { index: 0 });
        }
    }
    for (i, pair) in positions.windows(2).enumerate() {
        match pair[0].partial_cmp(&pair[1]) {
            Some(Ordering::Less | Ordering::Equal) => {}
            Some(Ordering::Greater) | None => {
                return Err(PositionFault::Decreasing { index: i + 1 });
            }
        }
    }
    Ok(())
}

/// A smoothed series paired with its (possibly truncated) positions.
///
/// Both sequences always have the same length and positions never decrease.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeriesParts")]
pub struct SmoothedSeries {
    positions: Vec<f64>,
    values: Vec<f64>,
}

/// Unchecked wire form of [`SmoothedSeries`]
#[derive(Deserialize)]
struct SeriesParts {
    positions: Vec<f64>,
    values: Vec<f64>,
}

impl TryFrom<SeriesParts> for SmoothedSeries {
    type Error = PositionFault;

    fn try_from(parts: SeriesParts) -> Result<Self, Self::Error> {
        Self::new(parts.positions, parts.values)
    }
}

impl SmoothedSeries {
    /// Pair positions with values, rejecting misaligned or decreasing positions
    pub fn new(positions: Vec<f64>, values: Vec<f64>) -> Result<Self, PositionFault> {
        validate_positions(values.len(), &positions)?;
        Ok(Self { positions, values })
    }

    /// Pair positions that were already checked with [`validate_positions`]
    pub(crate) fn from_validated(positions: Vec<f64>, values: Vec<f64>) -> Self {
        debug_assert_eq!(positions.len(), values.len());
        Self { positions, values }
    }

    /// Series whose positions are the sample indices `offset..offset + len`
    pub fn indexed(values: Vec<f64>, offset: usize) -> Self {
        let positions = (offset..offset + values.len()).map(|i| i as f64).collect();
        Self { positions, values }
    }

    /// Series for a member that was too short to smooth
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One point of a combined curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinedPoint {
    pub x: f64,
    pub y: f64,
    /// Number of member series contributing to this point
    pub support: usize,
}

/// Standard-error band around a combined point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandPoint {
    pub x: f64,
    pub low: f64,
    pub high: f64,
}

/// A maximal run of combined points sharing the same support count.
///
/// `start` is inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletenessSegment {
    pub start: usize,
    pub end: usize,
    pub support: usize,
    /// `support / total_members`, the input to confidence shading
    pub fraction: f64,
}

impl CompletenessSegment {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// The merged curve of one group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombinedCurve {
    pub points: Vec<CombinedPoint>,
    /// Present only when dispersion was requested; same x-domain as `points`
    pub band: Option<Vec<BandPoint>>,
    pub segments: Vec<CompletenessSegment>,
    /// Members in the group, including those that contributed nothing
    pub total_members: usize,
}

impl CombinedCurve {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn xs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }

    pub fn supports(&self) -> Vec<usize> {
        self.points.iter().map(|p| p.support).collect()
    }

    /// Points covered by one completeness segment
    pub fn segment_points(&self, segment: &CompletenessSegment) -> &[CombinedPoint] {
        &self.points[segment.start..segment.end]
    }
}

/// How a member fared in smoothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Contributing,
    /// Shorter than the smoothing window; omitted from the average
    InsufficientData,
}

/// Per-member bookkeeping reported next to the combined curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub label: String,
    /// Raw sample count
    pub samples: usize,
    /// Last position of the run (total steps in cumulative mode)
    pub final_position: Option<f64>,
    pub smoothed_len: usize,
    pub status: MemberStatus,
}

/// Everything the engine reports for one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCurve {
    pub group: String,
    pub curve: CombinedCurve,
    pub members: Vec<MemberSummary>,
}

/// Producer metadata embedded in every payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Serialized form of one group's result, handed to rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePayload {
    pub format_version: String,
    pub producer: CurveProducer,
    pub computed_at_utc: String,
    pub group: String,
    /// Label of the data column this curve was built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel: Option<String>,
    pub config: CurveConfig,
    pub total_members: usize,
    pub curve: Vec<CombinedPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band: Option<Vec<BandPoint>>,
    pub segments: Vec<CompletenessSegment>,
    pub members: Vec<MemberSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positions_accepts_ties() {
        assert!(validate_positions(4, &[0.0, 5.0, 5.0, 9.0]).is_ok());
        assert!(validate_positions(0, &[]).is_ok());
    }

    #[test]
    fn test_validate_positions_length_mismatch() {
        assert_eq!(
            validate_positions(3, &[1.0, 2.0]),
            Err(PositionFault::LengthMismatch {
                values: 3,
                positions: 2
            })
        );
    }

    #[test]
    fn test_validate_positions_decreasing_and_nan() {
        assert_eq!(
            validate_positions(3, &[1.0, 3.0, 2.0]),
            Err(PositionFault::Decreasing { index: 2 })
        );
        assert_eq!(
            validate_positions(2, &[f64::NAN, 2.0]),
            Err(PositionFault::Decreasing { index: 0 })
        );
        assert_eq!(
            validate_positions(2, &[1.0, f64::NAN]),
            Err(PositionFault::Decreasing { index: 1 })
        );
    }

    #[test]
    fn test_indexed_series_offsets_positions() {
        let s = SmoothedSeries::indexed(vec![1.0, 2.0, 3.0], 2);
        assert_eq!(s.positions(), &[2.0, 3.0, 4.0]);
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn test_smoothed_series_deserialization_validates() {
        let ok: SmoothedSeries =
            serde_json::from_str(r#"{"positions": [1.0, 1.0, 4.0], "values": [2.0, 3.0, 5.0]}"#)
                .unwrap();
        assert_eq!(ok.positions(), &[1.0, 1.0, 4.0]);

        let decreasing = serde_json::from_str::<SmoothedSeries>(
            r#"{"positions": [3.0, 1.0], "values": [2.0, 3.0]}"#,
        );
        assert!(decreasing.is_err());

        let misaligned =
            serde_json::from_str::<SmoothedSeries>(r#"{"positions": [1.0], "values": []}"#);
        assert!(misaligned.is_err());
    }

    #[test]
    fn test_run_deserializes_without_positions() {
        let run: Run = serde_json::from_str(r#"{"label": "a", "values": [1.0, 2.0]}"#).unwrap();
        assert_eq!(run, Run::new("a", vec![1.0, 2.0]));
    }
}
