use std::cell::Cell;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use super::{poll_until, wait_for_event};
use crate::adb::AdbClient;
use crate::daemon::DaemonEvent;
use crate::image;
use crate::model::{BarrierConfig, BarrierResult};
use crate::vm::VmInspectionClient;

/// Waits for a device identity to appear in `adb devices -l`, in any state.
pub struct DeviceConnectedBarrier<'a> {
    adb: &'a AdbClient,
    device_id: String,
}

impl<'a> DeviceConnectedBarrier<'a> {
    pub fn new(adb: &'a AdbClient, device_id: impl Into<String>) -> Self {
        Self {
            adb,
            device_id: device_id.into(),
        }
    }

    pub async fn wait(&self, config: &BarrierConfig) -> BarrierResult<()> {
        poll_until(
            config.timeout_ms.as_duration(),
            config.polling_interval_ms.as_duration(),
            || async {
                let devices = self.adb.list_devices().await.map_err(|e| e.to_string())?;
                Ok(devices
                    .iter()
                    .any(|d| d.identity == self.device_id)
                    .then_some(()))
            },
            || async {
                match self.adb.list_devices().await {
                    Ok(devices) if devices.is_empty() => {
                        "no devices are connected".to_string()
                    }
                    Ok(devices) => {
                        let listing = devices
                            .iter()
                            .map(|d| format!("{} ({:?})", d.identity, d.state))
                            .collect::<Vec<_>>()
                            .join(", ");
                        format!("`{}` never appeared; connected devices: {listing}", self.device_id)
                    }
                    Err(e) => format!("`{}` never appeared; `adb devices -l` also failed: {e}", self.device_id),
                }
            },
        )
        .await
    }
}

/// Waits for a device to report the `device` (ready) state and for the
/// Android boot animation to finish.
pub struct DeviceReadyBarrier<'a> {
    adb: &'a AdbClient,
    device_id: String,
}

impl<'a> DeviceReadyBarrier<'a> {
    pub fn new(adb: &'a AdbClient, device_id: impl Into<String>) -> Self {
        Self {
            adb,
            device_id: device_id.into(),
        }
    }

    pub async fn wait(&self, config: &BarrierConfig) -> BarrierResult<()> {
        poll_until(
            config.timeout_ms.as_duration(),
            config.polling_interval_ms.as_duration(),
            || async {
                let ready = self
                    .adb
                    .boot_completed(&self.device_id)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(ready.then_some(()))
            },
            || async { self.boot_diagnostics().await },
        )
        .await
    }

    async fn boot_diagnostics(&self) -> String {
        let boot_completed = self
            .adb
            .shell(&self.device_id, "getprop sys.boot_completed")
            .await
            .map(|o| o.stdout.trim().to_string())
            .unwrap_or_else(|e| format!("<error: {e}>"));
        let bootanim = self
            .adb
            .shell(&self.device_id, "getprop init.svc.bootanim")
            .await
            .map(|o| o.stdout.trim().to_string())
            .unwrap_or_else(|e| format!("<error: {e}>"));
        let uptime = self
            .adb
            .shell(&self.device_id, "cat /proc/uptime")
            .await
            .map(|o| o.stdout.trim().to_string())
            .unwrap_or_else(|e| format!("<error: {e}>"));
        format!(
            "device not ready: sys.boot_completed={boot_completed} init.svc.bootanim={bootanim} uptime={uptime}"
        )
    }
}

/// Waits for the daemon to emit an `app.started` event for our app.
///
/// Borrows the session's event receiver rather than owning it, since a
/// session waits on the same channel repeatedly over its lifetime (start,
/// then every subsequent reload/restart, then VM service readiness).
pub struct AppReadyBarrier<'a> {
    receiver: &'a mut mpsc::UnboundedReceiver<DaemonEvent>,
}

impl<'a> AppReadyBarrier<'a> {
    pub fn new(receiver: &'a mut mpsc::UnboundedReceiver<DaemonEvent>) -> Self {
        Self { receiver }
    }

    pub async fn wait(self, config: &BarrierConfig) -> BarrierResult<DaemonEvent> {
        wait_for_event(self.receiver, config.timeout_ms.as_duration(), |event| {
            event.event == "app.started"
        })
        .await
    }
}

/// Waits for the daemon to emit an `app.progress` event whose `finished`
/// field is `true`, following a hot reload or hot restart request.
pub struct HotReloadBarrier<'a> {
    receiver: &'a mut mpsc::UnboundedReceiver<DaemonEvent>,
}

impl<'a> HotReloadBarrier<'a> {
    pub fn new(receiver: &'a mut mpsc::UnboundedReceiver<DaemonEvent>) -> Self {
        Self { receiver }
    }

    pub async fn wait(self, config: &BarrierConfig) -> BarrierResult<DaemonEvent> {
        wait_for_event(self.receiver, config.timeout_ms.as_duration(), |event| {
            event.event == "app.progress"
                && event
                    .params
                    .get("finished")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false)
                && event
                    .params
                    .get("progressId")
                    .and_then(serde_json::Value::as_str)
                    .map(|s| s.contains("reload") || s.contains("restart"))
                    .unwrap_or(false)
        })
        .await
    }
}

/// Waits for the daemon to report a usable VM service URI via
/// `app.debugPort`.
pub struct VmServiceReadyBarrier<'a> {
    receiver: &'a mut mpsc::UnboundedReceiver<DaemonEvent>,
}

impl<'a> VmServiceReadyBarrier<'a> {
    pub fn new(receiver: &'a mut mpsc::UnboundedReceiver<DaemonEvent>) -> Self {
        Self { receiver }
    }

    pub async fn wait(self, config: &BarrierConfig) -> BarrierResult<String> {
        let result = wait_for_event(self.receiver, config.timeout_ms.as_duration(), |event| {
            event.event == "app.debugPort"
        })
        .await;

        match result {
            BarrierResult::Success {
                value: Some(event), ..
            } => {
                let uri = event
                    .params
                    .get("wsUri")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string);
                match uri {
                    Some(uri) => BarrierResult::Success {
                        value: Some(uri),
                        elapsed: Duration::ZERO,
                    },
                    None => BarrierResult::Failure {
                        elapsed: Duration::ZERO,
                        error: "app.debugPort event had no wsUri".to_string(),
                        diagnostics: event.params.to_string(),
                    },
                }
            }
            BarrierResult::Success { value: None, elapsed } => BarrierResult::Failure {
                elapsed,
                error: "app.debugPort event missing".to_string(),
                diagnostics: String::new(),
            },
            BarrierResult::Timeout { elapsed, diagnostics } => {
                BarrierResult::Timeout { elapsed, diagnostics }
            }
            BarrierResult::Failure { elapsed, error, diagnostics } => {
                BarrierResult::Failure { elapsed, error, diagnostics }
            }
        }
    }
}

/// Waits for consecutive device screenshots to stop changing, using the
/// cheap content hash rather than a full pixel compare between polls.
pub struct VisualStabilityBarrier<'a> {
    adb: &'a AdbClient,
    device_id: String,
}

impl<'a> VisualStabilityBarrier<'a> {
    pub fn new(adb: &'a AdbClient, device_id: impl Into<String>) -> Self {
        Self {
            adb,
            device_id: device_id.into(),
        }
    }

    /// Succeeds with the last captured frame once `consecutive_matches`
    /// identical hashes are seen in a row, so a caller that only wants the
    /// hash-stable frame bytes doesn't have to capture again itself.
    pub async fn wait(&self, config: &BarrierConfig) -> BarrierResult<Vec<u8>> {
        let mut last_hash: Option<u32> = None;
        let mut last_frame: Option<Vec<u8>> = None;
        let consecutive = Cell::new(0u32);
        let frames_checked = Cell::new(0u32);

        poll_until(
            config.timeout_ms.as_duration(),
            config.polling_interval_ms.as_duration(),
            || async {
                let capture = self
                    .adb
                    .screenshot(&self.device_id)
                    .await
                    .map_err(|e| e.to_string())?;
                let hash = image::cheap_content_hash(&capture.data);
                frames_checked.set(frames_checked.get() + 1);

                if Some(hash) == last_hash {
                    consecutive.set(consecutive.get() + 1);
                } else {
                    consecutive.set(1);
                    last_hash = Some(hash);
                }
                last_frame = Some(capture.data);

                debug!(
                    consecutive = consecutive.get(),
                    target = config.consecutive_matches,
                    "visual stability poll"
                );
                Ok((consecutive.get() >= config.consecutive_matches).then(|| last_frame.clone().unwrap_or_default()))
            },
            || async {
                format!(
                    "visual stability not reached: {} frame(s) checked, current match streak {} (need {})",
                    frames_checked.get(),
                    consecutive.get(),
                    config.consecutive_matches
                )
            },
        )
        .await
    }
}

/// Waits for consecutive device *and* framework screenshots to both stop
/// changing, at the same polling cadence. Stricter than a single-camera
/// stability check: a framework frame can be static while a device frame
/// keeps showing an animating overlay, or vice versa.
pub struct DualCameraStabilityBarrier<'a> {
    adb: &'a AdbClient,
    device_id: String,
    vm: &'a mut VmInspectionClient,
    isolate_id: String,
}

impl<'a> DualCameraStabilityBarrier<'a> {
    pub fn new(
        adb: &'a AdbClient,
        device_id: impl Into<String>,
        vm: &'a mut VmInspectionClient,
        isolate_id: impl Into<String>,
    ) -> Self {
        Self {
            adb,
            device_id: device_id.into(),
            vm,
            isolate_id: isolate_id.into(),
        }
    }

    pub async fn wait(&mut self, config: &BarrierConfig) -> BarrierResult<()> {
        let mut last_device_hash: Option<u32> = None;
        let mut last_framework_hash: Option<u32> = None;
        let mut consecutive = 0u32;

        let start = std::time::Instant::now();
        loop {
            let device = self.adb.screenshot(&self.device_id).await;
            let framework = self.vm.take_screenshot(&self.isolate_id).await;

            match (device, framework) {
                (Ok(device), Ok(framework_bytes)) => {
                    let device_hash = image::cheap_content_hash(&device.data);
                    let framework_hash = image::cheap_content_hash(&framework_bytes);

                    if Some(device_hash) == last_device_hash
                        && Some(framework_hash) == last_framework_hash
                    {
                        consecutive += 1;
                    } else {
                        consecutive = 1;
                        last_device_hash = Some(device_hash);
                        last_framework_hash = Some(framework_hash);
                    }

                    if consecutive >= config.consecutive_matches {
                        return BarrierResult::Success {
                            value: Some(()),
                            elapsed: start.elapsed(),
                        };
                    }
                }
                (Err(e), _) | (_, Err(e)) => {
                    return BarrierResult::Failure {
                        elapsed: start.elapsed(),
                        error: e.to_string(),
                        diagnostics: "one camera failed mid-poll".to_string(),
                    };
                }
            }

            if start.elapsed() >= config.timeout_ms.as_duration() {
                return BarrierResult::Timeout {
                    elapsed: start.elapsed(),
                    diagnostics: format!(
                        "dual-camera stability not reached within {:?}",
                        config.timeout_ms.as_duration()
                    ),
                };
            }

            tokio::time::sleep(config.polling_interval_ms.as_duration()).await;
        }
    }
}
