//! UI-framework Session: owns one running app process end to end, from
//! spawning the machine-mode daemon through to a clean stop.

use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::barrier::{AppReadyBarrier, HotReloadBarrier, VmServiceReadyBarrier};
use crate::daemon::{DaemonClient, DaemonEvent};
use crate::error::{EngineError, Result};
use crate::model::{AppInfo, BarrierConfig, SessionState};

/// A running session against one app on one device.
pub struct Session {
    state: SessionState,
    client: DaemonClient,
    events: mpsc::UnboundedReceiver<DaemonEvent>,
    info: AppInfo,
    reload_count: u64,
}

impl Session {
    /// Spawns the app in machine mode and waits for `app.started`. Fails
    /// fast if `project_directory` is missing a manifest the framework
    /// expects (the one precondition cheap enough to check before the
    /// subprocess is even spawned).
    pub async fn start(
        flutter_path: &str,
        app_id: &str,
        device_id: &str,
        project_directory: &Path,
        ready_timeout: Duration,
    ) -> Result<Self> {
        let manifest = project_directory.join("pubspec.yaml");
        if !manifest.exists() {
            return Err(EngineError::SessionInvariant(format!(
                "{} has no pubspec.yaml, not a recognizable project root",
                project_directory.display()
            )));
        }

        let args = vec![
            "run".to_string(),
            "--machine".to_string(),
            "-d".to_string(),
            device_id.to_string(),
        ];

        let (client, events) = DaemonClient::spawn(flutter_path, &args, Some(project_directory)).await?;

        let mut session = Self {
            state: SessionState::Starting,
            client,
            events,
            info: AppInfo {
                app_id: app_id.to_string(),
                device_id: device_id.to_string(),
                project_directory: Some(project_directory.to_path_buf()),
                supports_restart: true,
                vm_service_uri: None,
            },
            reload_count: 0,
        };

        session.await_ready(ready_timeout).await?;
        Ok(session)
    }

    async fn await_ready(&mut self, timeout: Duration) -> Result<()> {
        let barrier = AppReadyBarrier::new(&mut self.events);
        let config = BarrierConfig {
            timeout_ms: crate::model::FlexDuration(timeout.as_millis() as u64),
            ..BarrierConfig::default()
        };

        match barrier.wait(&config).await {
            crate::model::BarrierResult::Success { .. } => {
                self.transition(SessionState::Running)?;
                info!(app_id = %self.info.app_id, "session reached Running");
                Ok(())
            }
            crate::model::BarrierResult::Timeout { diagnostics, .. } => {
                self.transition(SessionState::Error)?;
                Err(EngineError::SessionInvariant(format!(
                    "app did not start within timeout: {diagnostics}"
                )))
            }
            crate::model::BarrierResult::Failure { error, .. } => {
                self.transition(SessionState::Error)?;
                Err(EngineError::SessionInvariant(error))
            }
        }
    }

    fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(EngineError::SessionInvariant(format!(
                "illegal session transition {:?} -> {:?}",
                self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn info(&self) -> &AppInfo {
        &self.info
    }

    /// Number of hot reloads/restarts completed so far this session.
    pub fn reload_count(&self) -> u64 {
        self.reload_count
    }

    fn require_running(&self) -> Result<()> {
        if self.state != SessionState::Running {
            return Err(EngineError::SessionInvariant(format!(
                "operation requires Running, session is {:?}",
                self.state
            )));
        }
        Ok(())
    }

    /// Requests a hot reload and waits for the daemon to report it finished.
    pub async fn hot_reload(&mut self, timeout: Duration) -> Result<()> {
        self.require_running()?;
        self.client.call("app.restart", Some(serde_json::json!({"fullRestart": false}))).await?;
        self.await_reload(timeout).await?;
        self.reload_count += 1;
        Ok(())
    }

    /// Requests a hot restart (full VM reload) and waits for completion.
    pub async fn hot_restart(&mut self, timeout: Duration) -> Result<()> {
        self.require_running()?;
        if !self.info.supports_restart {
            return Err(EngineError::SessionInvariant(
                "this app does not support restart".to_string(),
            ));
        }
        self.client.call("app.restart", Some(serde_json::json!({"fullRestart": true}))).await?;
        self.await_reload(timeout).await?;
        self.reload_count += 1;
        Ok(())
    }

    async fn await_reload(&mut self, timeout: Duration) -> Result<()> {
        let barrier = HotReloadBarrier::new(&mut self.events);
        let config = BarrierConfig {
            timeout_ms: crate::model::FlexDuration(timeout.as_millis() as u64),
            ..BarrierConfig::default()
        };

        match barrier.wait(&config).await {
            crate::model::BarrierResult::Success { .. } => Ok(()),
            crate::model::BarrierResult::Timeout { diagnostics, .. } => {
                Err(EngineError::SessionInvariant(format!("reload timed out: {diagnostics}")))
            }
            crate::model::BarrierResult::Failure { error, .. } => {
                Err(EngineError::SessionInvariant(error))
            }
        }
    }

    /// Waits for the daemon to report the VM service URI and records it.
    pub async fn await_vm_service(&mut self, timeout: Duration) -> Result<String> {
        let barrier = VmServiceReadyBarrier::new(&mut self.events);
        let config = BarrierConfig {
            timeout_ms: crate::model::FlexDuration(timeout.as_millis() as u64),
            ..BarrierConfig::default()
        };

        match barrier.wait(&config).await {
            crate::model::BarrierResult::Success { value: Some(uri), .. } => {
                self.info.vm_service_uri = Some(uri.clone());
                Ok(uri)
            }
            crate::model::BarrierResult::Success { value: None, .. } => Err(
                EngineError::SessionInvariant("VM service ready with no URI".to_string()),
            ),
            crate::model::BarrierResult::Timeout { diagnostics, .. } => Err(
                EngineError::VmService(format!("VM service not ready in time: {diagnostics}")),
            ),
            crate::model::BarrierResult::Failure { error, .. } => Err(EngineError::VmService(error)),
        }
    }

    pub async fn call_service_extension(
        &mut self,
        extension: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.require_running()?;
        self.client.call(extension, Some(params)).await
    }

    /// Stops the app gracefully, falling back to a process kill. Returns the
    /// child's exit code when the daemon process reported one.
    pub async fn stop(mut self) -> Result<Option<i32>> {
        if self.state == SessionState::Running {
            self.transition(SessionState::Stopping)?;
        }
        let exit_code = match self.client.shutdown().await {
            Ok(code) => code,
            Err(e) => {
                warn!(error = %e, "error during session shutdown");
                None
            }
        };
        let _ = self.transition(SessionState::Stopped);
        Ok(exit_code)
    }
}
