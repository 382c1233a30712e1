//! Observation Bundle Assembler: collects the artifacts captured at a
//! checkpoint, runs overlay detection, and persists them to a directory
//! layout that mirrors the scene/checkpoint hierarchy.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::model::{
    ObservationBundle, ObservationMetadata, OverlayDetectionResult, StabilityStatus,
};
use crate::overlay;

/// Builder-shaped accumulator for a single checkpoint's artifacts.
pub struct ObservationBuilder {
    scene_name: String,
    checkpoint_name: String,
    device_id: String,
    device_screenshot: Option<Vec<u8>>,
    framework_screenshot: Option<Vec<u8>>,
    widget_tree: Option<Value>,
    semantics_tree: Option<Value>,
    logs: Vec<String>,
    reload_id: Option<u64>,
    stability_status: StabilityStatus,
    description: Option<String>,
}

impl ObservationBuilder {
    pub fn new(
        scene_name: impl Into<String>,
        checkpoint_name: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            scene_name: scene_name.into(),
            checkpoint_name: checkpoint_name.into(),
            device_id: device_id.into(),
            device_screenshot: None,
            framework_screenshot: None,
            widget_tree: None,
            semantics_tree: None,
            logs: Vec::new(),
            reload_id: None,
            stability_status: StabilityStatus::Unknown,
            description: None,
        }
    }

    pub fn device_screenshot(mut self, data: Vec<u8>) -> Self {
        self.device_screenshot = Some(data);
        self
    }

    pub fn framework_screenshot(mut self, data: Vec<u8>) -> Self {
        self.framework_screenshot = Some(data);
        self
    }

    pub fn widget_tree(mut self, tree: Value) -> Self {
        self.widget_tree = Some(tree);
        self
    }

    pub fn semantics_tree(mut self, tree: Value) -> Self {
        self.semantics_tree = Some(tree);
        self
    }

    /// Appends to any logs already accumulated, rather than replacing them.
    pub fn logs(mut self, lines: Vec<String>) -> Self {
        self.logs.extend(lines);
        self
    }

    pub fn reload_id(mut self, id: u64) -> Self {
        self.reload_id = Some(id);
        self
    }

    pub fn stability_status(mut self, status: StabilityStatus) -> Self {
        self.stability_status = status;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Runs overlay detection when both screenshots are present, stamps the
    /// timestamp, and returns the finished, immutable bundle.
    pub fn build(self) -> ObservationBundle {
        let overlay = match (&self.device_screenshot, &self.framework_screenshot) {
            (Some(device), Some(framework)) => Some(overlay::detect(device, framework)),
            _ => None,
        };
        let overlay_present = overlay.as_ref().is_some_and(|o| o.overlay_present);

        let metadata = ObservationMetadata {
            schema_version: "1.0.0".to_string(),
            scene_name: self.scene_name.clone(),
            checkpoint_name: self.checkpoint_name.clone(),
            timestamp: Utc::now(),
            overlay_present,
            reload_id: self.reload_id,
            device_id: self.device_id,
            stability_status: self.stability_status,
            description: self.description,
            extensions: serde_json::Map::new(),
        };

        ObservationBundle {
            scene_name: self.scene_name,
            checkpoint_name: self.checkpoint_name,
            device_screenshot: self.device_screenshot,
            framework_screenshot: self.framework_screenshot,
            widget_tree: self.widget_tree,
            semantics_tree: self.semantics_tree,
            logs: self.logs,
            metadata,
            overlay,
        }
    }
}

fn bundle_dir(output_dir: &Path, scene_name: &str, checkpoint_name: &str) -> PathBuf {
    output_dir.join(scene_name).join(checkpoint_name)
}

/// Writes a bundle's artifacts under `<output_dir>/<scene>/<checkpoint>/`.
/// `meta.json` is always written; every other file is written only if the
/// corresponding artifact is present. `diff.png` is written additionally
/// when overlay detection reported a positive match.
pub async fn write(bundle: &ObservationBundle, output_dir: &Path) -> Result<PathBuf> {
    let dir = bundle_dir(output_dir, &bundle.scene_name, &bundle.checkpoint_name);
    tokio::fs::create_dir_all(&dir).await?;

    let meta_json = serde_json::to_vec_pretty(&bundle.metadata)?;

    let device_write = async {
        if let Some(data) = &bundle.device_screenshot {
            tokio::fs::write(dir.join("device.png"), data).await?;
        }
        Ok::<(), crate::error::EngineError>(())
    };
    let framework_write = async {
        if let Some(data) = &bundle.framework_screenshot {
            tokio::fs::write(dir.join("flutter.png"), data).await?;
        }
        Ok::<(), crate::error::EngineError>(())
    };
    let widget_write = async {
        if let Some(tree) = &bundle.widget_tree {
            let json = serde_json::to_vec_pretty(tree)?;
            tokio::fs::write(dir.join("widget_tree.json"), json).await?;
        }
        Ok::<(), crate::error::EngineError>(())
    };
    let semantics_write = async {
        if let Some(tree) = &bundle.semantics_tree {
            let json = serde_json::to_vec_pretty(tree)?;
            tokio::fs::write(dir.join("semantics.json"), json).await?;
        }
        Ok::<(), crate::error::EngineError>(())
    };
    let logs_write = async {
        if !bundle.logs.is_empty() {
            tokio::fs::write(dir.join("logs.txt"), bundle.logs.join("\n")).await?;
        }
        Ok::<(), crate::error::EngineError>(())
    };
    let meta_write = async { tokio::fs::write(dir.join("meta.json"), &meta_json).await.map_err(Into::into) };

    tokio::try_join!(
        device_write,
        framework_write,
        widget_write,
        semantics_write,
        logs_write,
        meta_write,
    )?;

    if bundle.metadata.overlay_present {
        if let (Some(device), Some(framework)) = (&bundle.device_screenshot, &bundle.framework_screenshot) {
            match overlay::generate_diff_image(device, framework) {
                Ok(diff_png) => {
                    tokio::fs::write(dir.join("diff.png"), diff_png).await?;
                }
                Err(e) => warn!(error = %e, "failed to render diff.png"),
            }
        }
    }

    Ok(dir)
}

/// Reads a previously written bundle back. `meta.json`'s `overlay_present`
/// flag is advisory; when both images are present, overlay detection is
/// re-run and its result is authoritative.
pub async fn read(directory: &Path) -> Result<ObservationBundle> {
    let meta_bytes = tokio::fs::read(directory.join("meta.json")).await?;
    let mut metadata: ObservationMetadata = serde_json::from_slice(&meta_bytes)?;

    let device_screenshot = read_optional(directory.join("device.png")).await?;
    let framework_screenshot = read_optional(directory.join("flutter.png")).await?;
    let widget_tree = read_optional_json(directory.join("widget_tree.json")).await?;
    let semantics_tree = read_optional_json(directory.join("semantics.json")).await?;
    let logs = match read_optional(directory.join("logs.txt")).await? {
        Some(bytes) => String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect(),
        None => Vec::new(),
    };

    let overlay: Option<OverlayDetectionResult> =
        match (&device_screenshot, &framework_screenshot) {
            (Some(device), Some(framework)) => {
                let result = overlay::detect(device, framework);
                metadata.overlay_present = result.overlay_present;
                Some(result)
            }
            _ => None,
        };

    Ok(ObservationBundle {
        scene_name: metadata.scene_name.clone(),
        checkpoint_name: metadata.checkpoint_name.clone(),
        device_screenshot,
        framework_screenshot,
        widget_tree,
        semantics_tree,
        logs,
        metadata,
        overlay,
    })
}

async fn read_optional(path: PathBuf) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn read_optional_json(path: PathBuf) -> Result<Option<Value>> {
    match read_optional(path).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_without_screenshots_has_no_overlay_result() {
        let bundle = ObservationBuilder::new("scene", "checkpoint", "emulator-5554").build();
        assert!(bundle.overlay.is_none());
        assert!(!bundle.metadata.overlay_present);
    }

    #[tokio::test]
    async fn write_then_read_round_trips_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle = ObservationBuilder::new("login", "after_submit", "emulator-5554")
            .logs(vec!["line one".to_string(), "line two".to_string()])
            .description("post-submit state")
            .build();

        let dir = write(&bundle, tmp.path()).await.unwrap();
        assert!(dir.ends_with("login/after_submit"));
        assert!(dir.join("meta.json").exists());
        assert!(!dir.join("device.png").exists());

        let read_back = read(&dir).await.unwrap();
        assert_eq!(read_back.scene_name, "login");
        assert_eq!(read_back.checkpoint_name, "after_submit");
        assert_eq!(read_back.logs, vec!["line one", "line two"]);
        assert_eq!(read_back.metadata.description.as_deref(), Some("post-submit state"));
    }

    #[tokio::test]
    async fn write_emits_diff_png_only_when_overlay_detected() {
        use image::{DynamicImage, Rgba, RgbaImage};

        let tmp = tempfile::tempdir().unwrap();
        let device = crate::image::encode_png(&DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            32, 32, Rgba([0, 0, 0, 255]),
        )))
        .unwrap();
        let framework = crate::image::encode_png(&DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            32, 32, Rgba([255, 255, 255, 255]),
        )))
        .unwrap();

        let bundle = ObservationBuilder::new("scene", "checkpoint", "emulator-5554")
            .device_screenshot(device)
            .framework_screenshot(framework)
            .build();
        assert!(bundle.metadata.overlay_present);

        let dir = write(&bundle, tmp.path()).await.unwrap();
        assert!(dir.join("diff.png").exists());
    }
}
