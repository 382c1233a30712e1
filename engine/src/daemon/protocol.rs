//! Wire protocol for the UI-framework's machine-mode daemon: newline-delimited
//! JSON on stdout, classified into responses, events, and unstructured logs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only JSON-RPC version the daemon protocol speaks.
const JSONRPC_VERSION: &str = "2.0";

/// A request sent to the daemon over stdin.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonRequest {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: u64,
}

impl DaemonRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
            id,
        }
    }
}

/// One line of daemon stdout, classified by shape.
#[derive(Debug, Clone)]
pub enum DaemonMessage {
    /// `{"id": N, "result": ...}` or `{"id": N, "error": ...}`
    Response(DaemonResponse),
    /// `{"event": "...", "params": ...}`
    Event(DaemonEvent),
    /// A line that parsed as JSON but matched neither shape, or didn't
    /// parse as JSON at all (the daemon interleaves plain text logs).
    Log(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonResponse {
    pub id: u64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonEvent {
    pub event: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLine {
    Response(DaemonResponse),
    Event(DaemonEvent),
    Other(Value),
}

/// Classify a single line of daemon stdout. The UI-framework daemon wraps
/// each JSON payload in a single-element array; bare objects are accepted
/// too since this keeps the parser resilient to upstream wrapping changes.
pub fn classify_line(line: &str) -> DaemonMessage {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return DaemonMessage::Log(String::new());
    }

    let unwrapped = unwrap_array(trimmed);

    match serde_json::from_str::<RawLine>(unwrapped) {
        Ok(RawLine::Response(response)) => DaemonMessage::Response(response),
        Ok(RawLine::Event(event)) => DaemonMessage::Event(event),
        Ok(RawLine::Other(_)) | Err(_) => DaemonMessage::Log(line.to_string()),
    }
}

fn unwrap_array(line: &str) -> &str {
    if let Some(inner) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        inner.trim()
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_wrapped_response() {
        let line = r#"[{"id":3,"result":{"ok":true}}]"#;
        match classify_line(line) {
            DaemonMessage::Response(response) => {
                assert_eq!(response.id, 3);
                assert!(response.result.is_some());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn classifies_bare_event() {
        let line = r#"{"event":"app.started","params":{"appId":"com.example"}}"#;
        match classify_line(line) {
            DaemonMessage::Event(event) => assert_eq!(event.event, "app.started"),
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn non_json_lines_are_logs() {
        match classify_line("Launching lib/main.dart on Pixel 7...") {
            DaemonMessage::Log(text) => assert!(text.contains("Launching")),
            other => panic!("expected log, got {other:?}"),
        }
    }

    #[test]
    fn error_response_is_still_a_response() {
        let line = r#"[{"id":1,"error":"compile failed"}]"#;
        match classify_line(line) {
            DaemonMessage::Response(response) => {
                assert_eq!(response.id, 1);
                assert!(response.error.is_some());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }
}
