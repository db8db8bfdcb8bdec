//! Engine configuration
//!
//! The three knobs every caller chooses (smoothing window, positioning mode,
//! dispersion) plus the join policy used when member positions do not line up.

use crate::error::CurveError;
use serde::{Deserialize, Serialize};

/// How x-coordinates are assigned to samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    /// 0-based sample index
    #[default]
    Index,
    /// Externally supplied cumulative quantity, e.g. total environment steps
    Cumulative,
}

/// Which members contribute to a combined point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Every member that still has samples contributes its pending sample
    #[default]
    Pending,
    /// Only members whose next position equals the step's x
    Coincident,
}

/// Configuration shared by every group of one invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CurveConfig {
    /// Trailing samples averaged with each point; 0 disables smoothing
    pub window: usize,
    pub position_mode: PositionMode,
    /// Emit a standard-error band around the mean
    pub dispersion: bool,
    pub join: JoinPolicy,
}

impl CurveConfig {
    /// Build a config from a window size in samples (1 means no smoothing)
    pub fn with_window_size(samples: usize) -> Self {
        Self {
            window: samples.saturating_sub(1),
            ..Self::default()
        }
    }

    /// Load a config from JSON
    pub fn from_json(json: &str) -> Result<Self, CurveError> {
        serde_json::from_str(json).map_err(|e| CurveError::InvalidConfig(e.to_string()))
    }

    /// Serialize the config to JSON
    pub fn to_json(&self) -> Result<String, CurveError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = CurveConfig::default();
        assert_eq!(config.window, 0);
        assert_eq!(config.position_mode, PositionMode::Index);
        assert!(!config.dispersion);
        assert_eq!(config.join, JoinPolicy::Pending);
    }

    #[test]
    fn test_window_size_in_samples() {
        assert_eq!(CurveConfig::with_window_size(1).window, 0);
        assert_eq!(CurveConfig::with_window_size(0).window, 0);
        assert_eq!(CurveConfig::with_window_size(10).window, 9);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            CurveConfig::from_json(r#"{"window": 4, "position_mode": "cumulative"}"#).unwrap();
        assert_eq!(
            config,
            CurveConfig {
                window: 4,
                position_mode: PositionMode::Cumulative,
                dispersion: false,
                join: JoinPolicy::Pending,
            }
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = CurveConfig::from_json(r#"{"smoothing": 4}"#);
        assert!(matches!(result, Err(CurveError::InvalidConfig(_))));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = CurveConfig {
            window: 9,
            position_mode: PositionMode::Cumulative,
            dispersion: true,
            join: JoinPolicy::Coincident,
        };
        let restored = CurveConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(restored, config);
    }
}
