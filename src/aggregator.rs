//! Multi-series aggregation
//!
//! Merges the smoothed members of one group into a single curve with a k-way
//! merge keyed on position. Members whose next positions coincide are folded
//! into one output point. Every point records how many members contributed,
//! and the curve is cut into completeness segments of constant support.

use crate::config::{CurveConfig, JoinPolicy};
use crate::error::CurveError;
use crate::stats::RunningStats;
use crate::types::{BandPoint, CombinedCurve, CombinedPoint, CompletenessSegment, SmoothedSeries};

/// One step of the merge: the x it was emitted at and the contributing samples
#[derive(Debug, Clone, Copy)]
pub struct MergeStep {
    pub x: f64,
    pub stats: RunningStats,
}

impl MergeStep {
    pub fn support(&self) -> usize {
        self.stats.count()
    }
}

/// Streaming k-way merge over a group's members.
///
/// Each member has one cursor. A member is exhausted once its cursor passes
/// its last sample and never contributes again; the merge is done when every
/// member is exhausted.
pub struct Merge<'a> {
    members: &'a [SmoothedSeries],
    cursors: Vec<usize>,
    join: JoinPolicy,
}

impl<'a> Merge<'a> {
    pub fn new(members: &'a [SmoothedSeries], join: JoinPolicy) -> Self {
        Self {
            members,
            cursors: vec![0; members.len()],
            join,
        }
    }

    /// Number of members that still have samples
    pub fn active(&self) -> usize {
        self.members
            .iter()
            .zip(&self.cursors)
            .filter(|(member, &cursor)| cursor < member.len())
            .count()
    }

    pub fn is_done(&self) -> bool {
        self.active() == 0
    }

    fn next_x(&self) -> Option<f64> {
        self.members
            .iter()
            .zip(&self.cursors)
            .filter_map(|(member, &cursor)| member.positions().get(cursor).copied())
            .reduce(f64::min)
    }
}

impl Iterator for Merge<'_> {
    type Item = MergeStep;

    fn next(&mut self) -> Option<MergeStep> {
        let x = self.next_x()?;
        let mut stats = RunningStats::new();

        for (member, cursor) in self.members.iter().zip(self.cursors.iter_mut()) {
            let positions = member.positions();
            let Some(&next) = positions.get(*cursor) else {
                continue;
            };
            // repeated positions inside one member count once, latest sample wins
            let mut last = *cursor;
            while positions.get(last + 1) == Some(&next) {
                last += 1;
            }
            if next == x {
                stats.push(member.values()[last]);
                *cursor = last + 1;
            } else if self.join == JoinPolicy::Pending {
                stats.push(member.values()[last]);
            }
        }

        Some(MergeStep { x, stats })
    }
}

/// Aggregator for combining one group's smoothed members
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    dispersion: bool,
    join: JoinPolicy,
}

impl Aggregator {
    pub fn new(dispersion: bool, join: JoinPolicy) -> Self {
        Self { dispersion, join }
    }

    pub fn from_config(config: &CurveConfig) -> Self {
        Self::new(config.dispersion, config.join)
    }

    /// Merge `members` into one combined curve.
    ///
    /// Empty members are allowed and contribute nothing. A group without any
    /// member is rejected with [`CurveError::InvalidGroup`].
    pub fn combine(
        &self,
        group: &str,
        members: &[SmoothedSeries],
    ) -> Result<CombinedCurve, CurveError> {
        if members.is_empty() {
            return Err(CurveError::InvalidGroup {
                group: group.to_string(),
            });
        }

        let capacity = members.iter().map(SmoothedSeries::len).max().unwrap_or(0);
        let mut points = Vec::with_capacity(capacity);
        let mut band = self.dispersion.then(|| Vec::with_capacity(capacity));

        for step in Merge::new(members, self.join) {
            let Some(y) = step.stats.mean() else {
                continue;
            };
            points.push(CombinedPoint {
                x: step.x,
                y,
                support: step.support(),
            });
            if let (Some(band), Some((low, high))) = (band.as_mut(), step.stats.error_band()) {
                band.push(BandPoint {
                    x: step.x,
                    low,
                    high,
                });
            }
        }

        let segments = completeness_segments(&points, members.len());

        Ok(CombinedCurve {
            points,
            band,
            segments,
            total_members: members.len(),
        })
    }
}

/// Cut a curve into maximal runs of equal support.
///
/// The segments are contiguous and together cover every point exactly once.
pub fn completeness_segments(
    points: &[CombinedPoint],
    total_members: usize,
) -> Vec<CompletenessSegment> {
    let fraction = |support: usize| {
        if total_members == 0 {
            0.0
        } else {
            support as f64 / total_members as f64
        }
    };

    let mut segments: Vec<CompletenessSegment> = Vec::new();
    for (i, point) in points.iter().enumerate() {
        match segments.last_mut() {
            Some(segment) if segment.support == point.support => segment.end = i + 1,
            _ => segments.push(CompletenessSegment {
                start: i,
                end: i + 1,
                support: point.support,
                fraction: fraction(point.support),
            }),
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PositionMode;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn series(positions: &[f64], values: &[f64]) -> SmoothedSeries {
        SmoothedSeries::new(positions.to_vec(), values.to_vec()).unwrap()
    }

    #[test]
    fn test_tie_collapse() {
        let members = vec![
            series(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0]),
            series(&[1.0, 2.0, 3.0], &[12.0, 18.0, 33.0]),
        ];
        let curve = Aggregator::default().combine("g", &members).unwrap();
        assert_eq!(curve.xs(), vec![1.0, 2.0, 3.0]);
        assert_eq!(curve.ys(), vec![11.0, 19.0, 31.5]);
        assert_eq!(curve.supports(), vec![2, 2, 2]);
        assert_eq!(curve.band, None);
    }

    #[test]
    fn test_ragged_members() {
        let members = vec![
            SmoothedSeries::indexed(vec![1.0, 2.0, 3.0], 0),
            SmoothedSeries::indexed(vec![1.0, 2.0, 3.0, 4.0, 5.0], 0),
        ];
        let curve = Aggregator::default().combine("g", &members).unwrap();
        assert_eq!(curve.xs(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(curve.ys(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(curve.supports(), vec![2, 2, 2, 1, 1]);
        assert_eq!(
            curve.segments,
            vec![
                CompletenessSegment {
                    start: 0,
                    end: 3,
                    support: 2,
                    fraction: 1.0
                },
                CompletenessSegment {
                    start: 3,
                    end: 5,
                    support: 1,
                    fraction: 0.5
                },
            ]
        );
    }

    #[test]
    fn test_dispersion_band() {
        let members = vec![series(&[5.0], &[8.0]), series(&[5.0], &[12.0])];
        let curve = Aggregator::new(true, JoinPolicy::Coincident)
            .combine("g", &members)
            .unwrap();
        assert_eq!(curve.ys(), vec![10.0]);
        let band = curve.band.unwrap();
        assert_eq!(band.len(), 1);
        assert_eq!(band[0].x, 5.0);
        assert!((band[0].low - 8.0).abs() < 1e-12);
        assert!((band[0].high - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_support_band_is_zero_width() {
        let members = vec![series(&[0.0, 1.0], &[3.0, 4.0]), series(&[0.0], &[5.0])];
        let curve = Aggregator::new(true, JoinPolicy::Coincident)
            .combine("g", &members)
            .unwrap();
        let band = curve.band.unwrap();
        assert_eq!(band[1], BandPoint { x: 1.0, low: 4.0, high: 4.0 });
    }

    #[test]
    fn test_empty_group_rejected() {
        let err = Aggregator::default().combine("lonely", &[]).unwrap_err();
        assert!(matches!(err, CurveError::InvalidGroup { ref group } if group == "lonely"));
    }

    #[test]
    fn test_empty_members_contribute_nothing() {
        let members = vec![
            SmoothedSeries::empty(),
            SmoothedSeries::indexed(vec![4.0, 6.0], 3),
            SmoothedSeries::empty(),
        ];
        let curve = Aggregator::default().combine("g", &members).unwrap();
        assert_eq!(curve.xs(), vec![3.0, 4.0]);
        assert_eq!(curve.supports(), vec![1, 1]);
        assert_eq!(curve.segments.len(), 1);
        assert_eq!(curve.segments[0].fraction, 1.0 / 3.0);
        assert_eq!(curve.total_members, 3);
    }

    #[test]
    fn test_all_members_empty() {
        let members = vec![SmoothedSeries::empty(), SmoothedSeries::empty()];
        let curve = Aggregator::new(true, JoinPolicy::Coincident)
            .combine("g", &members)
            .unwrap();
        assert!(curve.is_empty());
        assert!(curve.segments.is_empty());
        assert_eq!(curve.band, Some(vec![]));
    }

    #[test]
    fn test_interleaved_positions_coincident() {
        let members = vec![
            series(&[100.0, 300.0], &[1.0, 3.0]),
            series(&[200.0, 300.0], &[2.0, 5.0]),
        ];
        let curve = Aggregator::new(false, JoinPolicy::Coincident)
            .combine("g", &members)
            .unwrap();
        assert_eq!(curve.xs(), vec![100.0, 200.0, 300.0]);
        assert_eq!(curve.ys(), vec![1.0, 2.0, 4.0]);
        assert_eq!(curve.supports(), vec![1, 1, 2]);
    }

    #[test]
    fn test_interleaved_positions_pending() {
        let members = vec![
            series(&[100.0, 300.0], &[1.0, 3.0]),
            series(&[200.0, 300.0, 400.0], &[2.0, 5.0, 7.0]),
        ];
        let curve = Aggregator::new(false, JoinPolicy::Pending)
            .combine("g", &members)
            .unwrap();
        assert_eq!(curve.xs(), vec![100.0, 200.0, 300.0, 400.0]);
        // at x=100 the second member contributes its pending sample at 200
        assert_eq!(curve.ys(), vec![1.5, 2.5, 4.0, 7.0]);
        assert_eq!(curve.supports(), vec![2, 2, 2, 1]);
    }

    #[test]
    fn test_default_join_averages_irregular_steps() {
        let members = vec![
            series(&[100.0, 200.0, 300.0], &[1.0, 2.0, 3.0]),
            series(&[150.0, 250.0, 350.0], &[5.0, 6.0, 7.0]),
        ];
        let curve = Aggregator::default().combine("g", &members).unwrap();
        assert_eq!(
            curve.xs(),
            vec![100.0, 150.0, 200.0, 250.0, 300.0, 350.0]
        );
        assert_eq!(curve.ys(), vec![3.0, 3.5, 4.0, 4.5, 5.0, 7.0]);
        assert_eq!(curve.supports(), vec![2, 2, 2, 2, 2, 1]);
    }

    #[test]
    fn test_pending_sample_is_last_at_repeated_position() {
        let members = vec![
            series(&[10.0, 30.0], &[1.0, 1.0]),
            series(&[15.0, 15.0, 30.0], &[2.0, 5.0, 9.0]),
        ];
        let curve = Aggregator::new(false, JoinPolicy::Pending)
            .combine("g", &members)
            .unwrap();
        assert_eq!(curve.xs(), vec![10.0, 15.0, 30.0]);
        // the second member offers 5.0 at x=10, the same sample it gives at x=15
        assert_eq!(curve.ys(), vec![3.0, 3.0, 5.0]);
        assert_eq!(curve.supports(), vec![2, 2, 2]);
    }

    #[test]
    fn test_repeated_positions_within_member_collapse() {
        let members = vec![series(&[10.0, 20.0, 20.0, 30.0], &[1.0, 2.0, 3.0, 4.0])];
        let curve = Aggregator::default().combine("g", &members).unwrap();
        assert_eq!(curve.xs(), vec![10.0, 20.0, 30.0]);
        assert_eq!(curve.ys(), vec![1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_merge_reports_active_members() {
        let members = vec![
            SmoothedSeries::indexed(vec![1.0], 0),
            SmoothedSeries::indexed(vec![1.0, 2.0], 0),
        ];
        let mut merge = Merge::new(&members, JoinPolicy::Coincident);
        assert_eq!(merge.active(), 2);
        merge.next();
        assert_eq!(merge.active(), 1);
        merge.next();
        assert!(merge.is_done());
        assert!(merge.next().is_none());
    }

    #[test]
    fn test_segments_of_empty_curve() {
        assert!(completeness_segments(&[], 3).is_empty());
    }

    fn indexed_group() -> impl Strategy<Value = Vec<SmoothedSeries>> {
        (
            prop::collection::vec(prop::collection::vec(-100.0_f64..100.0, 0..40), 1..6),
            0_usize..5,
        )
            .prop_map(|(members, offset)| {
                members
                    .into_iter()
                    .map(|values| SmoothedSeries::indexed(values, offset))
                    .collect()
            })
    }

    fn stepped_group() -> impl Strategy<Value = Vec<SmoothedSeries>> {
        prop::collection::vec(prop::collection::vec((0_u32..5, -10.0_f64..10.0), 0..30), 1..6)
            .prop_map(|members| {
                members
                    .into_iter()
                    .map(|samples| {
                        let mut total = 0.0;
                        let (positions, values): (Vec<f64>, Vec<f64>) = samples
                            .into_iter()
                            .map(|(step, value)| {
                                total += f64::from(step);
                                (total, value)
                            })
                            .unzip();
                        SmoothedSeries::new(positions, values).unwrap()
                    })
                    .collect()
            })
    }

    fn assert_partition(curve: &CombinedCurve) -> Result<(), TestCaseError> {
        let mut next = 0;
        for segment in &curve.segments {
            prop_assert_eq!(segment.start, next);
            prop_assert!(segment.end > segment.start);
            prop_assert!(curve
                .segment_points(segment)
                .iter()
                .all(|p| p.support == segment.support));
            next = segment.end;
        }
        prop_assert_eq!(next, curve.len());
        for pair in curve.segments.windows(2) {
            prop_assert_ne!(pair[0].support, pair[1].support);
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_x_strictly_increasing(members in stepped_group(), pending in any::<bool>()) {
            let join = if pending { JoinPolicy::Pending } else { JoinPolicy::Coincident };
            let curve = Aggregator::new(true, join).combine("g", &members).unwrap();
            for pair in curve.points.windows(2) {
                prop_assert!(pair[0].x < pair[1].x);
            }
            prop_assert_eq!(curve.band.as_ref().map(Vec::len), Some(curve.len()));
            assert_partition(&curve)?;
        }

        #[test]
        fn prop_support_non_increasing_for_indexed_members(members in indexed_group()) {
            let curve = Aggregator::default().combine("g", &members).unwrap();
            for pair in curve.points.windows(2) {
                prop_assert!(pair[0].support >= pair[1].support);
            }
            assert_partition(&curve)?;
        }

        #[test]
        fn prop_support_non_increasing_by_default(members in stepped_group()) {
            let config = CurveConfig {
                position_mode: PositionMode::Cumulative,
                ..CurveConfig::default()
            };
            let curve = Aggregator::from_config(&config).combine("g", &members).unwrap();
            for pair in curve.points.windows(2) {
                prop_assert!(pair[0].support >= pair[1].support);
            }
            assert_partition(&curve)?;
        }

        #[test]
        fn prop_single_member_identity(values in prop::collection::vec(-1.0e3_f64..1.0e3, 0..50)) {
            let member = SmoothedSeries::indexed(values.clone(), 2);
            let curve = Aggregator::default().combine("g", &[member.clone()]).unwrap();
            prop_assert_eq!(curve.xs(), member.positions().to_vec());
            prop_assert_eq!(curve.ys(), values);
            prop_assert!(curve.points.iter().all(|p| p.support == 1));
            prop_assert!(curve.segments.len() <= 1);
        }
    }
}
