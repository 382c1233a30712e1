use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use crate::error::{EngineError, Result};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// A VM service isolate, as returned by `getVM`.
#[derive(Debug, Clone)]
pub struct Isolate {
    pub id: String,
    pub name: String,
}

/// A connected WebSocket JSON-RPC client to a framework VM service.
pub struct VmInspectionClient {
    sink: WsSink,
    next_id: AtomicU64,
    pending: PendingMap,
}

impl VmInspectionClient {
    /// Connects to `ws_uri` (as reported by the daemon's `app.debugPort`
    /// event) and starts the background response-dispatch task.
    pub async fn connect(ws_uri: &str) -> Result<Self> {
        let url = Url::parse(ws_uri)
            .map_err(|e| EngineError::VmService(format!("invalid VM service URI: {e}")))?;

        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| EngineError::VmService(format!("websocket connect failed: {e}")))?;

        let (sink, stream) = stream.split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        spawn_reader(stream, pending.clone());

        Ok(Self {
            sink,
            // Ids are 1-based per client, per the VM service's JSON-RPC contract.
            next_id: AtomicU64::new(1),
            pending,
        })
    }

    async fn call_with_timeout(
        &mut self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        if let Err(e) = self.sink.send(Message::Text(request.to_string())).await {
            self.pending.lock().await.remove(&id);
            return Err(EngineError::VmService(format!("send failed: {e}")));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(EngineError::VmService(
                "connection closed while awaiting response".to_string(),
            )),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(EngineError::VmService(format!(
                    "call `{method}` timed out after {timeout:?}"
                )))
            }
        }
    }

    async fn call(&mut self, method: &str, params: Value) -> Result<Value> {
        self.call_with_timeout(method, params, DEFAULT_CALL_TIMEOUT)
            .await
    }

    /// `getVM`, listing every isolate. Prefers isolates named "main" or
    /// "root" when the caller needs to pick one to operate against.
    pub async fn list_isolates(&mut self) -> Result<Vec<Isolate>> {
        let response = self.call("getVM", json!({})).await?;
        let isolates = response
            .get("isolates")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(isolates
            .into_iter()
            .filter_map(|entry| {
                let id = entry.get("id")?.as_str()?.to_string();
                let name = entry
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Some(Isolate { id, name })
            })
            .collect())
    }

    /// Picks the isolate to target: the one named "main" or "root" if
    /// present, otherwise the first one reported.
    pub async fn main_isolate(&mut self) -> Result<Isolate> {
        let isolates = self.list_isolates().await?;
        isolates
            .iter()
            .find(|i| i.name == "main" || i.name == "root")
            .or_else(|| isolates.first())
            .cloned()
            .ok_or_else(|| EngineError::VmService("VM reports no isolates".to_string()))
    }

    /// Calls a framework-registered service extension, e.g.
    /// `ext.flutter.debugDumpRenderTree`.
    pub async fn call_service_extension(
        &mut self,
        isolate_id: &str,
        extension: &str,
        args: Value,
    ) -> Result<Value> {
        let mut params = args;
        if let Some(object) = params.as_object_mut() {
            object.insert("isolateId".to_string(), json!(isolate_id));
        }
        self.call(extension, params).await
    }

    /// `summary` trades a full widget dump for the framework's condensed
    /// summary tree, which is what most callers want.
    pub async fn get_widget_tree(&mut self, isolate_id: &str, summary: bool) -> Result<Value> {
        if summary {
            self.call_service_extension(
                isolate_id,
                "ext.flutter.inspector.getRootWidgetSummaryTree",
                json!({"groupName": "scenectl"}),
            )
            .await
        } else {
            self.call_service_extension(
                isolate_id,
                "ext.flutter.inspector.getRootWidget",
                json!({"groupName": "scenectl"}),
            )
            .await
        }
    }

    pub async fn get_semantics_tree(&mut self, isolate_id: &str) -> Result<Value> {
        self.call_service_extension(
            isolate_id,
            "ext.flutter.debugSemantics",
            json!({"enabled": "true"}),
        )
        .await?;

        self.call_service_extension(
            isolate_id,
            "ext.flutter.inspector.getSemanticsTree",
            json!({"groupName": "scenectl"}),
        )
        .await
    }

    /// Takes a framework-rendered screenshot and returns decoded PNG bytes.
    pub async fn take_screenshot(&mut self, isolate_id: &str) -> Result<Vec<u8>> {
        let response = self
            .call_service_extension(isolate_id, "ext.flutter.screenshot", json!({}))
            .await?;

        let encoded = response
            .get("screenshot")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::VmService("screenshot response had no data".to_string()))?;

        BASE64
            .decode(encoded)
            .map_err(|e| EngineError::VmService(format!("screenshot base64 decode failed: {e}")))
    }

    pub async fn evaluate(&mut self, isolate_id: &str, expression: &str) -> Result<Value> {
        self.call(
            "evaluateInFrame",
            json!({"isolateId": isolate_id, "frameIndex": 0, "expression": expression}),
        )
        .await
    }

    pub async fn list_extensions(&mut self, isolate_id: &str) -> Result<Vec<String>> {
        let response = self
            .call("getIsolate", json!({"isolateId": isolate_id}))
            .await?;
        Ok(response
            .get("extensionRPCs")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn spawn_reader(
    mut stream: SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    pending: PendingMap,
) {
    tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            let message = match message {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, "VM service websocket error");
                    break;
                }
            };

            let Message::Text(text) = message else {
                continue;
            };

            let Ok(value) = serde_json::from_str::<Value>(&text) else {
                debug!("VM service sent non-JSON text frame");
                continue;
            };

            let Some(id) = value.get("id").and_then(Value::as_u64) else {
                continue;
            };

            let outcome = if let Some(error) = value.get("error") {
                Err(EngineError::VmService(error.to_string()))
            } else {
                Ok(value.get("result").cloned().unwrap_or(Value::Null))
            };

            if let Some(sender) = pending.lock().await.remove(&id) {
                let _ = sender.send(outcome);
            }
        }
    });
}
