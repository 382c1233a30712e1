//! Scene value: the language-neutral script the Scene Executor interprets.
//!
//! Scene *file* parsing (YAML ingestion) is external to the engine; this
//! module only defines the value the executor consumes and validates it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::barrier::BarrierConfig;
use super::interaction::{is_namespaced_label, Interaction};
use crate::error::{EngineError, Result};

fn default_true() -> bool {
    true
}

/// A point in a scene at which an observation bundle is captured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub device_screenshot: bool,
    #[serde(default = "default_true")]
    pub framework_screenshot: bool,
    #[serde(default = "default_true")]
    pub widget_tree: bool,
    #[serde(default = "default_true")]
    pub semantics_tree: bool,
    #[serde(default = "default_true")]
    pub logs: bool,
}

impl Checkpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            device_screenshot: true,
            framework_screenshot: true,
            widget_tree: true,
            semantics_tree: true,
            logs: true,
        }
    }
}

/// Setup performed before the first step of a scene runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneSetup {
    #[serde(default)]
    pub hot_restart: bool,
    #[serde(default)]
    pub navigate_to: Option<String>,
    #[serde(default)]
    pub setup_delay_ms: Option<u64>,
}

/// A single entry in the ordered step list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Checkpoint(Checkpoint),
    Interaction(Interaction),
}

/// The declarative scene a Scene Executor runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub setup: SceneSetup,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub barriers: HashMap<String, BarrierConfig>,
}

impl Scene {
    /// Validate the invariants that must hold before any step runs:
    /// a non-empty name, unique checkpoint names, and namespaced labels on
    /// every `tap_by_label` step.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::SceneValidation(
                "scene name must not be empty".to_string(),
            ));
        }

        let mut seen_checkpoints = std::collections::HashSet::new();
        for step in &self.steps {
            match step {
                Step::Checkpoint(checkpoint) => {
                    if !seen_checkpoints.insert(checkpoint.name.clone()) {
                        return Err(EngineError::SceneValidation(format!(
                            "duplicate checkpoint name: {}",
                            checkpoint.name
                        )));
                    }
                }
                Step::Interaction(Interaction::TapByLabel { label, .. }) => {
                    if !is_namespaced_label(label) {
                        return Err(EngineError::SceneValidation(format!(
                            "tap_by_label target {label:?} is not a namespaced semantic id \
                             (must contain '.' or start with 'screen:'); use tap_by_text instead"
                        )));
                    }
                }
                Step::Interaction(_) => {}
            }
        }

        Ok(())
    }

    /// Barrier config for a named barrier, falling back to defaults when the
    /// scene's barrier map has no entry for it.
    pub fn barrier_config(&self, name: &str) -> BarrierConfig {
        self.barriers.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_scene(steps: Vec<Step>) -> Scene {
        Scene {
            name: "min".to_string(),
            description: None,
            setup: SceneSetup::default(),
            steps,
            barriers: HashMap::new(),
        }
    }

    #[test]
    fn empty_name_rejected() {
        let mut scene = minimal_scene(vec![]);
        scene.name = "   ".to_string();
        assert!(scene.validate().is_err());
    }

    #[test]
    fn duplicate_checkpoint_names_rejected() {
        let scene = minimal_scene(vec![
            Step::Checkpoint(Checkpoint::new("a")),
            Step::Checkpoint(Checkpoint::new("a")),
        ]);
        assert!(scene.validate().is_err());
    }

    #[test]
    fn non_namespaced_label_rejected() {
        let scene = minimal_scene(vec![Step::Interaction(Interaction::TapByLabel {
            label: "Login".to_string(),
            occurrence: None,
            within: None,
        })]);
        let err = scene.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("namespaced semantic id"));
        assert!(message.contains("tap_by_text"));
    }

    #[test]
    fn namespaced_label_accepted() {
        let scene = minimal_scene(vec![Step::Interaction(Interaction::TapByLabel {
            label: "login.submit".to_string(),
            occurrence: None,
            within: None,
        })]);
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn barrier_config_defaults_when_absent() {
        let scene = minimal_scene(vec![]);
        let config = scene.barrier_config("visual_stability");
        assert_eq!(config.consecutive_matches, 3);
    }
}
