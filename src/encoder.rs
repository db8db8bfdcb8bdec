//! Payload encoding
//!
//! This module turns a group's combined curve into the serializable payload
//! consumed by renderers: the curve, the optional band, completeness segments
//! and per-member bookkeeping, stamped with producer metadata.

use crate::config::CurveConfig;
use crate::error::CurveError;
use crate::types::{CurvePayload, CurveProducer, GroupCurve};
use crate::{CURVE_VERSION, PRODUCER_NAME};
use chrono::Utc;
use uuid::Uuid;

/// Current payload format version
pub const FORMAT_VERSION: &str = "1.0.0";

/// Encoder for producing curve payloads
pub struct CurveEncoder {
    instance_id: String,
}

impl Default for CurveEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CurveEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode one group's result
    pub fn encode(
        &self,
        result: &GroupCurve,
        config: &CurveConfig,
        panel: Option<&str>,
    ) -> CurvePayload {
        let producer = CurveProducer {
            name: PRODUCER_NAME.to_string(),
            version: CURVE_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        };

        CurvePayload {
            format_version: FORMAT_VERSION.to_string(),
            producer,
            computed_at_utc: Utc::now().to_rfc3339(),
            group: result.group.clone(),
            panel: panel.map(str::to_string),
            config: config.clone(),
            total_members: result.curve.total_members,
            curve: result.curve.points.clone(),
            band: result.curve.band.clone(),
            segments: result.curve.segments.clone(),
            members: result.members.clone(),
        }
    }

    /// Serialize a payload to compact JSON
    pub fn to_json(&self, payload: &CurvePayload) -> Result<String, CurveError> {
        serde_json::to_string(payload).map_err(CurveError::JsonError)
    }

    /// Encode straight to pretty-printed JSON
    pub fn encode_to_json(
        &self,
        result: &GroupCurve,
        config: &CurveConfig,
        panel: Option<&str>,
    ) -> Result<String, CurveError> {
        let payload = self.encode(result, config, panel);
        serde_json::to_string_pretty(&payload).map_err(CurveError::JsonError)
    }
}
