//! Subprocess-owning client for the UI-framework's machine-mode daemon.
//!
//! Spawns the child, owns its stdin/stdout for its entire lifetime, and
//! runs a background task that classifies each stdout line and either
//! completes a pending request or forwards an event.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, trace, warn};

use super::protocol::{classify_line, DaemonEvent, DaemonMessage, DaemonRequest};
use crate::error::{EngineError, Result};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// A running machine-mode daemon process.
pub struct DaemonClient {
    child: Child,
    stdin: ChildStdin,
    next_id: AtomicU64,
    pending: PendingMap,
}

impl DaemonClient {
    /// Spawns `command` in machine mode under `working_directory`, returning
    /// the client and a channel of events the background reader forwards.
    pub async fn spawn(
        command: &str,
        args: &[String],
        working_directory: Option<&Path>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<DaemonEvent>)> {
        let mut cmd = Command::new(command);
        cmd.args(args);
        if let Some(dir) = working_directory {
            cmd.current_dir(dir);
        }
        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        let mut child = cmd.spawn().map_err(EngineError::Io)?;

        let stdin = child.stdin.take().ok_or_else(|| {
            EngineError::Transport("daemon child has no stdin pipe".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            EngineError::Transport("daemon child has no stdout pipe".to_string())
        })?;
        let stderr = child.stderr.take();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let reader_pending = pending.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match classify_line(&line) {
                        DaemonMessage::Response(response) => {
                            let mut pending = reader_pending.lock().await;
                            if let Some(sender) = pending.remove(&response.id) {
                                let outcome = match response.error {
                                    Some(error) => Err(EngineError::Protocol(error.to_string())),
                                    None => Ok(response.result.unwrap_or(Value::Null)),
                                };
                                let _ = sender.send(outcome);
                            }
                        }
                        DaemonMessage::Event(event) => {
                            let _ = event_tx.send(event);
                        }
                        DaemonMessage::Log(text) => {
                            if !text.is_empty() {
                                trace!(daemon_log = %text);
                            }
                        }
                    },
                    Ok(None) => {
                        debug!("daemon stdout closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "error reading daemon stdout");
                        break;
                    }
                }
            }
        });

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    trace!(daemon_stderr = %line);
                }
            });
        }

        Ok((
            Self {
                child,
                stdin,
                // Ids are 1-based per client, per the daemon's JSON-RPC contract.
                next_id: AtomicU64::new(1),
                pending,
            },
            event_rx,
        ))
    }

    /// Sends `method`/`params` and waits up to `timeout` for a response.
    pub async fn call_with_timeout(
        &mut self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = DaemonRequest::new(id, method, params);
        let mut line = serde_json::to_vec(&[&request]).map_err(EngineError::Json)?;
        line.push(b'\n');

        if let Err(e) = self.stdin.write_all(&line).await {
            self.pending.lock().await.remove(&id);
            return Err(EngineError::Io(e));
        }
        if let Err(e) = self.stdin.flush().await {
            self.pending.lock().await.remove(&id);
            return Err(EngineError::Io(e));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(EngineError::Protocol(
                "daemon closed the pending-response channel".to_string(),
            )),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(EngineError::Transport(format!(
                    "daemon call `{method}` timed out after {timeout:?}"
                )))
            }
        }
    }

    pub async fn call(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        self.call_with_timeout(method, params, DEFAULT_CALL_TIMEOUT)
            .await
    }

    /// Attempts a graceful `app.stop`/process exit, then kills the process
    /// if it hasn't exited within [`GRACEFUL_SHUTDOWN_TIMEOUT`]. Returns the
    /// child's exit code when one is available (a killed process has none).
    pub async fn shutdown(mut self) -> Result<Option<i32>> {
        let _ = self
            .call_with_timeout("app.stop", None, GRACEFUL_SHUTDOWN_TIMEOUT)
            .await;

        match tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, self.child.wait()).await {
            Ok(status) => Ok(status.map_err(EngineError::Io)?.code()),
            Err(_) => {
                warn!("daemon did not exit gracefully, killing process");
                self.child.kill().await.map_err(EngineError::Io)?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawns_and_calls_echo_like_shell() {
        // `cat` never writes a response, so the call must time out rather
        // than hang forever.
        let (mut client, _events) = DaemonClient::spawn("cat", &[], None).await.unwrap();
        let result = client
            .call_with_timeout("noop", None, Duration::from_millis(50))
            .await;
        assert!(result.is_err());
        let _ = client.shutdown().await;
    }
}
