//! Resolves `tap_by_label` / `tap_by_text` interactions against the
//! semantics tree returned by the Framework Camera. The tree's shape is
//! treated as opaque JSON everywhere else in the engine; this module is
//! the one place that reaches into it, and only for the handful of fields
//! (`label`, `rect`, `children`) every framework inspector tree carries.

use serde_json::Value;

/// A resolved node: its label (for diagnostics) and its bounds in
/// absolute screen-space coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Bounds {
    pub fn center(&self) -> (i32, i32) {
        (
            ((self.left + self.right) / 2.0).round() as i32,
            ((self.top + self.bottom) / 2.0).round() as i32,
        )
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub label: String,
    pub bounds: Bounds,
}

fn node_label(node: &Value) -> Option<&str> {
    node.get("label")
        .or_else(|| node.get("value"))
        .or_else(|| node.get("hint"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn node_bounds(node: &Value) -> Option<Bounds> {
    let rect = node.get("rect")?;
    if let Some(arr) = rect.as_array() {
        if arr.len() >= 4 {
            return Some(Bounds {
                left: arr[0].as_f64()?,
                top: arr[1].as_f64()?,
                right: arr[2].as_f64()?,
                bottom: arr[3].as_f64()?,
            });
        }
        return None;
    }
    Some(Bounds {
        left: rect.get("left")?.as_f64()?,
        top: rect.get("top")?.as_f64()?,
        right: rect.get("right")?.as_f64()?,
        bottom: rect.get("bottom")?.as_f64()?,
    })
}

fn node_children(node: &Value) -> &[Value] {
    node.get("children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Depth-first walk collecting every node whose label matches `predicate`.
fn walk_collect<'a>(node: &'a Value, predicate: &dyn Fn(&str) -> bool, out: &mut Vec<&'a Value>) {
    if let Some(label) = node_label(node) {
        if predicate(label) {
            out.push(node);
        }
    }
    for child in node_children(node) {
        walk_collect(child, predicate, out);
    }
}

/// Depth-first search for the first node whose label matches exactly.
fn find_first<'a>(node: &'a Value, target: &str) -> Option<&'a Value> {
    if node_label(node) == Some(target) {
        return Some(node);
    }
    for child in node_children(node) {
        if let Some(found) = find_first(child, target) {
            return Some(found);
        }
    }
    None
}

/// Finds every on-screen node under `tree` (optionally scoped to the
/// subtree rooted at the node whose label exactly equals `within`) whose
/// label matches `label` either exactly or as a substring.
pub fn resolve(
    tree: &Value,
    label: &str,
    exact: bool,
    within: Option<&str>,
    screen_width: i32,
    screen_height: i32,
) -> Result<Vec<Candidate>, String> {
    let root = match within {
        Some(scope) => find_first(tree, scope)
            .ok_or_else(|| format!("within-scope node '{scope}' not found in semantics tree"))?,
        None => tree,
    };

    let predicate: Box<dyn Fn(&str) -> bool> = if exact {
        let label = label.to_string();
        Box::new(move |candidate: &str| candidate == label)
    } else {
        let label = label.to_lowercase();
        Box::new(move |candidate: &str| candidate.to_lowercase().contains(&label))
    };

    let mut matches = Vec::new();
    walk_collect(root, predicate.as_ref(), &mut matches);

    let candidates = matches
        .into_iter()
        .filter_map(|node| {
            let bounds = node_bounds(node)?;
            let (x, y) = bounds.center();
            if x < 0 || y < 0 || x > screen_width || y > screen_height {
                return None;
            }
            Some(Candidate {
                label: node_label(node).unwrap_or_default().to_string(),
                bounds,
            })
        })
        .collect();

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tree() -> Value {
        json!({
            "label": "root",
            "rect": {"left": 0.0, "top": 0.0, "right": 1080.0, "bottom": 1920.0},
            "children": [
                {
                    "label": "screen:home",
                    "rect": {"left": 0.0, "top": 0.0, "right": 1080.0, "bottom": 1920.0},
                    "children": [
                        {"label": "login.submit_button", "rect": {"left": 100.0, "top": 200.0, "right": 300.0, "bottom": 260.0}, "children": []},
                        {"label": "Submit now", "rect": {"left": 400.0, "top": 900.0, "right": 700.0, "bottom": 960.0}, "children": []},
                        {"label": "off_screen_node", "rect": {"left": -50.0, "top": -50.0, "right": -10.0, "bottom": -10.0}, "children": []}
                    ]
                }
            ]
        })
    }

    #[test]
    fn exact_match_finds_one_node() {
        let tree = sample_tree();
        let result = resolve(&tree, "login.submit_button", true, None, 1080, 1920).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].bounds.center(), (200, 230));
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        let tree = sample_tree();
        let result = resolve(&tree, "submit", false, None, 1080, 1920).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn off_screen_nodes_are_filtered_out() {
        let tree = sample_tree();
        let result = resolve(&tree, "off_screen_node", true, None, 1080, 1920).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn within_scope_missing_is_an_error() {
        let tree = sample_tree();
        let err = resolve(&tree, "submit", false, Some("screen:settings"), 1080, 1920).unwrap_err();
        assert!(err.contains("not found"));
    }

    #[test]
    fn within_scope_narrows_the_search() {
        let tree = sample_tree();
        let result = resolve(&tree, "submit", false, Some("screen:home"), 1080, 1920).unwrap();
        assert_eq!(result.len(), 2);
    }
}
