//! Scene-file loading: turns a YAML file on disk into the engine's
//! language-neutral `Scene` value. Parsing lives here rather than in the
//! engine crate because the wire format (YAML vs. anything else) is a CLI
//! concern, not a core one.

use std::path::Path;

use anyhow::{Context, Result};
use scenectl_engine::model::Scene;

pub fn load(path: &Path) -> Result<Scene> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading scene file {}", path.display()))?;
    let scene: Scene = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing scene file {}", path.display()))?;
    scene
        .validate()
        .with_context(|| format!("scene {} failed validation", path.display()))?;
    Ok(scene)
}
