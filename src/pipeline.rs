//! Pipeline orchestration
//!
//! This module provides the public API of the engine. It takes groups of raw
//! runs through position resolution, smoothing and aggregation, and encodes
//! the result for rendering.

use crate::aggregator::Aggregator;
use crate::config::{CurveConfig, PositionMode};
use crate::encoder::CurveEncoder;
use crate::error::{CurveError, PositionFault};
use crate::smoother::Smoother;
use crate::types::{
    CurvePayload, Group, GroupCurve, MemberStatus, MemberSummary, Run, SmoothedSeries,
};
use rayon::prelude::*;
use std::borrow::Cow;
use tracing::{debug, warn};

/// Smooth and aggregate one group.
///
/// Pipeline stages:
/// 1. Reject a group without runs
/// 2. Resolve and validate each run's positions
/// 3. Smooth every run (too-short runs become empty members)
/// 4. Merge the members into the combined curve
///
/// # Example
/// ```
/// use learning_curve::{aggregate_group, CurveConfig, Group, Run};
///
/// let group = Group::new(
///     "demo",
///     vec![Run::new("a", vec![1.0, 2.0, 3.0]), Run::new("b", vec![3.0, 4.0])],
/// );
/// let result = aggregate_group(&group, &CurveConfig::default()).unwrap();
/// assert_eq!(result.curve.ys(), vec![2.0, 3.0, 3.0]);
/// ```
pub fn aggregate_group(group: &Group, config: &CurveConfig) -> Result<GroupCurve, CurveError> {
    // Stage 1: a group needs at least one member
    if group.runs.is_empty() {
        return Err(CurveError::InvalidGroup {
            group: group.name.clone(),
        });
    }

    let mut members = Vec::with_capacity(group.runs.len());
    let mut summaries = Vec::with_capacity(group.runs.len());

    for run in &group.runs {
        // Stages 2 and 3: positions, then smoothing
        let (smoothed, final_position) = smooth_run(&group.name, run, config)?;

        let status = if smoothed.is_empty() {
            warn!(
                group = %group.name,
                member = %run.label,
                samples = run.values.len(),
                window = config.window,
                "run too short for smoothing window, omitted from average"
            );
            MemberStatus::InsufficientData
        } else {
            MemberStatus::Contributing
        };

        summaries.push(MemberSummary {
            label: run.label.clone(),
            samples: run.values.len(),
            final_position,
            smoothed_len: smoothed.len(),
            status,
        });
        members.push(smoothed);
    }

    // Stage 4: merge
    let curve = Aggregator::from_config(config).combine(&group.name, &members)?;

    debug!(
        group = %group.name,
        members = members.len(),
        contributing = members.iter().filter(|m| !m.is_empty()).count(),
        points = curve.len(),
        segments = curve.segments.len(),
        "group aggregated"
    );

    Ok(GroupCurve {
        group: group.name.clone(),
        curve,
        members: summaries,
    })
}

/// Aggregate independent groups in parallel.
///
/// Results keep the order of `groups`; a failing group does not affect the
/// others.
pub fn aggregate_groups(
    groups: &[Group],
    config: &CurveConfig,
) -> Vec<Result<GroupCurve, CurveError>> {
    groups
        .par_iter()
        .map(|group| {
            let result = aggregate_group(group, config);
            if let Err(e) = &result {
                warn!(group = %group.name, error = %e, "group rejected");
            }
            result
        })
        .collect()
}

/// Positions used for merging a run under the active mode
fn resolve_positions(run: &Run, mode: PositionMode) -> Result<Cow<'_, [f64]>, PositionFault> {
    match mode {
        PositionMode::Index => Ok(Cow::Owned(
            (0..run.values.len()).map(|i| i as f64).collect(),
        )),
        PositionMode::Cumulative => match &run.positions {
            Some(positions) => Ok(Cow::Borrowed(positions.as_slice())),
            None => Err(PositionFault::Missing),
        },
    }
}

/// Smooth one run, returning the series and the run's last position
fn smooth_run(
    group: &str,
    run: &Run,
    config: &CurveConfig,
) -> Result<(SmoothedSeries, Option<f64>), CurveError> {
    let malformed = |fault| CurveError::MalformedPosition {
        group: group.to_string(),
        member: run.label.clone(),
        fault,
    };
    let positions = resolve_positions(run, config.position_mode).map_err(malformed)?;
    let smoothed =
        Smoother::smooth_series(&run.values, &positions, config.window).map_err(malformed)?;
    Ok((smoothed, positions.last().copied()))
}

/// Processor bundling a configuration with an encoder.
///
/// Use this when several batches of groups share one configuration and their
/// payloads should carry the same producer instance id.
pub struct CurveProcessor {
    config: CurveConfig,
    encoder: CurveEncoder,
}

impl Default for CurveProcessor {
    fn default() -> Self {
        Self::new(CurveConfig::default())
    }
}

impl CurveProcessor {
    pub fn new(config: CurveConfig) -> Self {
        Self {
            config,
            encoder: CurveEncoder::new(),
        }
    }

    /// Create a processor from a JSON configuration
    pub fn from_config_json(json: &str) -> Result<Self, CurveError> {
        Ok(Self::new(CurveConfig::from_json(json)?))
    }

    pub fn config(&self) -> &CurveConfig {
        &self.config
    }

    /// Aggregate groups without encoding
    pub fn aggregate(&self, groups: &[Group]) -> Vec<Result<GroupCurve, CurveError>> {
        aggregate_groups(groups, &self.config)
    }

    /// Aggregate groups and encode each result, labelled with an optional panel
    pub fn process(
        &self,
        groups: &[Group],
        panel: Option<&str>,
    ) -> Vec<Result<CurvePayload, CurveError>> {
        self.aggregate(groups)
            .into_iter()
            .map(|result| result.map(|curve| self.encoder.encode(&curve, &self.config, panel)))
            .collect()
    }

    /// Parse a JSON array of groups and return one JSON payload per group.
    ///
    /// Only malformed input fails the whole call; group-level failures are
    /// reported in place.
    pub fn process_json(
        &self,
        groups_json: &str,
    ) -> Result<Vec<Result<String, CurveError>>, CurveError> {
        let groups: Vec<Group> = serde_json::from_str(groups_json)?;
        Ok(self
            .process(&groups, None)
            .into_iter()
            .map(|result| result.and_then(|payload| self.encoder.to_json(&payload)))
            .collect())
    }
}

/// Members of a group after smoothing, without merging.
///
/// Exposed for renderers that draw individual runs next to the average.
pub fn smooth_group(group: &Group, config: &CurveConfig) -> Result<Vec<SmoothedSeries>, CurveError> {
    group
        .runs
        .iter()
        .map(|run| smooth_run(&group.name, run, config).map(|(smoothed, _)| smoothed))
        .collect()
}
