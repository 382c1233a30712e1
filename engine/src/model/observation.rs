//! Observation metadata, bundle, and overlay-detection result types.
//!
//! Widget and semantics trees are represented as opaque `serde_json::Value`
//! trees rather than typed structs — the upstream schema is not stable and
//! the engine only persists and filters them (spec design note).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonTree;

fn default_schema_version() -> String {
    "1.0.0".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityStatus {
    Unknown,
    Stable,
    Unstable,
}

/// `meta.json` contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationMetadata {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(rename = "scene")]
    pub scene_name: String,
    #[serde(rename = "checkpoint")]
    pub checkpoint_name: String,
    pub timestamp: DateTime<Utc>,
    pub overlay_present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reload_id: Option<u64>,
    pub device_id: String,
    pub stability_status: StabilityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten, skip_serializing_if = "serde_json::Map::is_empty", default)]
    pub extensions: serde_json::Map<String, JsonTree>,
}

/// One rectangular region where framework and device frames disagree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiffRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Output of the Overlay Detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayDetectionResult {
    pub overlay_present: bool,
    pub confidence: f64,
    pub diff_percentage: f64,
    pub diff_regions: Vec<DiffRegion>,
    pub reason: String,
}

/// The full set of artifacts captured at a checkpoint.
#[derive(Debug, Clone)]
pub struct ObservationBundle {
    pub scene_name: String,
    pub checkpoint_name: String,
    pub device_screenshot: Option<Vec<u8>>,
    pub framework_screenshot: Option<Vec<u8>>,
    pub widget_tree: Option<JsonTree>,
    pub semantics_tree: Option<JsonTree>,
    pub logs: Vec<String>,
    pub metadata: ObservationMetadata,
    pub overlay: Option<OverlayDetectionResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_round_trips_modulo_absent_optionals() {
        let metadata = ObservationMetadata {
            schema_version: "1.0.0".to_string(),
            scene_name: "login".to_string(),
            checkpoint_name: "after_tap".to_string(),
            timestamp: Utc::now(),
            overlay_present: false,
            reload_id: None,
            device_id: "emulator-5554".to_string(),
            stability_status: StabilityStatus::Stable,
            description: None,
            extensions: serde_json::Map::new(),
        };

        let json = serde_json::to_value(&metadata).unwrap();
        assert!(json.get("reload_id").is_none());
        assert!(json.get("description").is_none());

        let round_tripped: ObservationMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(round_tripped.scene_name, metadata.scene_name);
        assert_eq!(round_tripped.checkpoint_name, metadata.checkpoint_name);
        assert_eq!(round_tripped.stability_status, metadata.stability_status);
        assert_eq!(round_tripped.overlay_present, metadata.overlay_present);
    }
}
