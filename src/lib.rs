//! Learning Curve - smoothing and aggregation engine for learning curves
//!
//! Turns per-run score sequences (e.g. reinforcement-learning episode returns)
//! into smoothed curves averaged across runs through a deterministic pipeline:
//! position resolution → moving-average smoothing → k-way merge → encoding.
//!
//! ## Modules
//!
//! - **Smoother**: incremental trailing moving average per run
//! - **Aggregator**: merges a group's runs by position, tracking how many runs
//!   support each point and cutting the curve into completeness segments
//! - **Schema**: reads whitespace-delimited run tables into groups

pub mod aggregator;
pub mod config;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod smoother;
pub mod stats;
pub mod types;

pub use aggregator::{completeness_segments, Aggregator, Merge};
pub use config::{CurveConfig, JoinPolicy, PositionMode};
pub use error::{CurveError, PositionFault};
pub use pipeline::{aggregate_group, aggregate_groups, smooth_group, CurveProcessor};
pub use smoother::Smoother;
pub use types::{
    BandPoint, CombinedCurve, CombinedPoint, CompletenessSegment, CurvePayload, Group, GroupCurve,
    MemberStatus, MemberSummary, Run, SmoothedSeries,
};

// Schema exports
pub use schema::{ColumnSpec, RunTable, RunTableAdapter, TableSpec};

/// Version embedded in all payloads
pub const CURVE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for payloads
pub const PRODUCER_NAME: &str = "learning-curve";
