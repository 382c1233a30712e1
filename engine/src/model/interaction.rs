//! Interaction variants the Interaction Controller and Scene Executor dispatch on.

use serde::{Deserialize, Serialize};

fn default_swipe_duration_ms() -> u64 {
    300
}

/// Named key-code synonyms accepted in place of a raw integer.
pub fn resolve_key_code(name: &str) -> Option<i32> {
    match name {
        "back" => Some(4),
        "home" => Some(3),
        "tab" => Some(61),
        "enter" => Some(66),
        "escape" => Some(111),
        _ => None,
    }
}

/// A single interaction step. `wait_for_barrier`, `tap_by_label` and
/// `tap_by_text` are resolved by the Scene Executor; everything else is
/// handed to the Interaction Controller unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interaction {
    Tap {
        x: i32,
        y: i32,
    },
    Text {
        text: String,
    },
    Key {
        key_code: i32,
    },
    Swipe {
        start_x: i32,
        start_y: i32,
        end_x: i32,
        end_y: i32,
        #[serde(default = "default_swipe_duration_ms")]
        duration_ms: u64,
    },
    WaitForBarrier {
        barrier_type: String,
        timeout_override_ms: Option<u64>,
    },
    TapByLabel {
        label: String,
        #[serde(default)]
        occurrence: Option<usize>,
        within: Option<String>,
    },
    TapByText {
        text: String,
        #[serde(default)]
        occurrence: Option<usize>,
        within: Option<String>,
    },
}

impl Interaction {
    /// A human-readable label used in event streams and error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Interaction::Tap { .. } => "tap",
            Interaction::Text { .. } => "text",
            Interaction::Key { .. } => "key",
            Interaction::Swipe { .. } => "swipe",
            Interaction::WaitForBarrier { .. } => "wait_for_barrier",
            Interaction::TapByLabel { .. } => "tap_by_label",
            Interaction::TapByText { .. } => "tap_by_text",
        }
    }
}

/// A namespaced semantic identifier contains a `.` or begins with `screen:`.
pub fn is_namespaced_label(label: &str) -> bool {
    label.contains('.') || label.starts_with("screen:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_synonyms_match_spec_values() {
        assert_eq!(resolve_key_code("back"), Some(4));
        assert_eq!(resolve_key_code("home"), Some(3));
        assert_eq!(resolve_key_code("tab"), Some(61));
        assert_eq!(resolve_key_code("enter"), Some(66));
        assert_eq!(resolve_key_code("escape"), Some(111));
        assert_eq!(resolve_key_code("nonsense"), None);
    }

    #[test]
    fn namespace_predicate() {
        assert!(is_namespaced_label("login.submit_button"));
        assert!(is_namespaced_label("screen:home"));
        assert!(!is_namespaced_label("Login"));
    }

    #[test]
    fn swipe_default_duration() {
        let json = serde_json::json!({
            "kind": "swipe",
            "start_x": 0, "start_y": 0, "end_x": 100, "end_y": 100
        });
        let interaction: Interaction = serde_json::from_value(json).unwrap();
        match interaction {
            Interaction::Swipe { duration_ms, .. } => assert_eq!(duration_ms, 300),
            _ => panic!("expected swipe"),
        }
    }
}
