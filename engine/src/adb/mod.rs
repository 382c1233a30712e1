//! ADB Client: every interaction with a device goes through this module.
//!
//! Every invocation is wrapped in [`run_with_timeout`], which owns the
//! child process for its entire lifetime and kills it if the timeout
//! elapses before the process exits on its own.

mod activity;
mod input;
mod png_guard;
mod screenshot;
mod shell;

pub use activity::{get_current_activity, wait_for_activity};
pub use input::{key_event, swipe, tap, text};
pub use png_guard::{strip_text_prefix, validate_png, PngError, PngInfo};
pub use screenshot::{capture_screenshot, ScreenshotResult};
pub use shell::ShellOutput;

use std::process::{ExitStatus, Output};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::warn;

use crate::error::{EngineError, Result};
use crate::model::{Device, DeviceState};

/// Default timeout applied to every ADB invocation unless overridden.
pub const DEFAULT_ADB_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs `command`, killing the child if it has not exited within `timeout`.
///
/// Unlike `Child::wait_with_output`, this keeps the `Child` handle alive for
/// the whole call so the timeout branch can explicitly kill it rather than
/// merely dropping it (which does not, on its own, terminate the process).
pub async fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<Output> {
    let mut child = command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(EngineError::Io)?;

    let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr was piped");

    let drain = async {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let (status, _, _) = tokio::join!(
            child.wait(),
            stdout_pipe.read_to_end(&mut stdout),
            stderr_pipe.read_to_end(&mut stderr),
        );
        status.map(|status: ExitStatus| (status, stdout, stderr))
    };

    match tokio::time::timeout(timeout, drain).await {
        Ok(Ok((status, stdout, stderr))) => Ok(Output { status, stdout, stderr }),
        Ok(Err(e)) => Err(EngineError::Io(e)),
        Err(_) => {
            warn!("adb invocation exceeded {:?}, killing child", timeout);
            let _ = child.kill().await;
            Err(EngineError::Transport(format!(
                "adb command timed out after {:?}",
                timeout
            )))
        }
    }
}

/// A thin, stateful handle to one `adb` binary, scoped to no particular device.
#[derive(Debug, Clone)]
pub struct AdbClient {
    adb_path: String,
    timeout: Duration,
}

impl AdbClient {
    pub fn new(adb_path: impl Into<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            timeout: DEFAULT_ADB_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self) -> Command {
        Command::new(&self.adb_path)
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        self.run_with(args, self.timeout).await
    }

    async fn run_with(&self, args: &[&str], timeout: Duration) -> Result<Output> {
        let mut command = self.command();
        command.args(args);
        run_with_timeout(command, timeout).await
    }

    /// `adb devices -l`, parsed into [`Device`] values.
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        let output = self.run(&["devices", "-l"]).await?;
        if !output.status.success() {
            return Err(EngineError::Transport(format!(
                "adb devices failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(Device::parse_list(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Resolve a device id, auto-selecting when exactly one is connected.
    pub async fn resolve_device(&self, requested: Option<&str>) -> Result<String> {
        if let Some(id) = requested {
            return Ok(id.to_string());
        }

        let ready: Vec<Device> = self
            .list_devices()
            .await?
            .into_iter()
            .filter(Device::is_ready)
            .collect();

        match ready.len() {
            0 => Err(EngineError::SessionInvariant(
                "no ready devices connected".to_string(),
            )),
            1 => Ok(ready[0].identity.clone()),
            n => Err(EngineError::Ambiguity(format!(
                "{n} ready devices connected, specify one: {:?}",
                ready.iter().map(|d| &d.identity).collect::<Vec<_>>()
            ))),
        }
    }

    pub async fn shell(&self, device: &str, command: &str) -> Result<ShellOutput> {
        shell::shell(self, device, command).await
    }

    pub async fn exec_out(&self, device: &str, command: &str) -> Result<Vec<u8>> {
        shell::exec_out(self, device, command).await
    }

    pub async fn tap(&self, device: &str, x: i32, y: i32) -> Result<()> {
        input::tap(self, device, x, y).await
    }

    pub async fn swipe(
        &self,
        device: &str,
        start_x: i32,
        start_y: i32,
        end_x: i32,
        end_y: i32,
        duration_ms: u64,
    ) -> Result<()> {
        input::swipe(self, device, start_x, start_y, end_x, end_y, duration_ms).await
    }

    pub async fn input_text(&self, device: &str, text_value: &str) -> Result<()> {
        input::text(self, device, text_value).await
    }

    pub async fn key_event(&self, device: &str, key_code: i32) -> Result<()> {
        input::key_event(self, device, key_code).await
    }

    pub async fn screenshot(&self, device: &str) -> Result<ScreenshotResult> {
        screenshot::capture_screenshot(self, device).await
    }

    pub async fn current_activity(&self, device: &str) -> Result<String> {
        activity::get_current_activity(self, device).await
    }

    pub async fn wait_for_activity(
        &self,
        device: &str,
        pattern: &str,
        timeout: Duration,
    ) -> Result<bool> {
        activity::wait_for_activity(self, device, pattern, timeout).await
    }

    /// `adb shell getprop sys.boot_completed` equals `"1"`. Never errors:
    /// a shell failure (device mid-boot, transport hiccup) maps to `false`
    /// rather than propagating, since callers poll this in a loop.
    pub async fn boot_completed(&self, device: &str) -> Result<bool> {
        match self.shell(device, "getprop sys.boot_completed").await {
            Ok(output) => Ok(output.stdout.trim() == "1"),
            Err(_) => Ok(false),
        }
    }

    /// Parses `adb shell wm size`'s `Physical size: WxH` line.
    pub async fn screen_resolution(&self, device: &str) -> Result<(u32, u32)> {
        let output = self.shell(device, "wm size").await?;
        parse_wm_size(&output.stdout).ok_or_else(|| {
            EngineError::Protocol(format!("could not parse `wm size` output: {}", output.stdout))
        })
    }

    /// `adb logcat -d`, a single non-blocking dump of the buffer so far.
    pub async fn logcat_dump(&self, device: &str) -> Result<String> {
        let output = self.run(&["-s", device, "logcat", "-d"]).await?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn parse_wm_size(output: &str) -> Option<(u32, u32)> {
    let line = output
        .lines()
        .find(|l| l.contains("Physical size:"))
        .unwrap_or(output);
    let dims = line.split(':').next_back()?.trim();
    let (w, h) = dims.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

pub(crate) fn device_state_is_ready(state: DeviceState) -> bool {
    state == DeviceState::Ready
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_physical_size_line() {
        let output = "Physical size: 1080x2340\n";
        assert_eq!(parse_wm_size(output), Some((1080, 2340)));
    }

    #[test]
    fn missing_size_line_yields_none() {
        assert_eq!(parse_wm_size("nonsense"), None);
    }
}
