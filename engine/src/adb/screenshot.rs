use tracing::{debug, info, warn};

use super::png_guard::{strip_text_prefix, validate_png, PngError, PngInfo};
use super::AdbClient;
use crate::error::{EngineError, Result};

#[derive(Debug)]
pub struct ScreenshotResult {
    pub data: Vec<u8>,
    pub info: PngInfo,
}

const STORAGE_CAPTURE_PATH: &str = "/sdcard/.scenectl_screenshot.png";

/// Captures a device screenshot, trying the fast exec-out path first and
/// falling back to a capture-to-storage-then-pull path when it fails.
pub(super) async fn capture_screenshot(client: &AdbClient, device: &str) -> Result<ScreenshotResult> {
    info!(device, "capturing device screenshot");

    match capture_direct(client, device).await {
        Ok(result) => return Ok(result),
        Err(e) => warn!(device, error = %e, "direct screenshot capture failed, trying fallback"),
    }

    capture_via_storage(client, device).await
}

async fn capture_direct(client: &AdbClient, device: &str) -> Result<ScreenshotResult> {
    debug!("attempting direct capture via exec-out");
    let data = client.exec_out(device, "screencap -p").await?;

    match validate_png(&data) {
        Ok(info) => {
            debug!(width = info.width, height = info.height, "direct capture successful");
            Ok(ScreenshotResult { data, info })
        }
        Err(PngError::TextPrefix(text)) => {
            warn!(text, "stripping text prefix from captured PNG");
            let stripped = strip_text_prefix(&data).ok_or_else(|| {
                EngineError::Transport("direct capture produced invalid PNG".to_string())
            })?;
            let stripped_data = stripped.to_vec();
            let info = validate_png(&stripped_data)
                .map_err(|e| EngineError::Transport(format!("PNG invalid after stripping: {e}")))?;
            Ok(ScreenshotResult {
                data: stripped_data,
                info,
            })
        }
        Err(e) => Err(EngineError::Transport(format!("invalid screenshot PNG: {e}"))),
    }
}

async fn capture_via_storage(client: &AdbClient, device: &str) -> Result<ScreenshotResult> {
    debug!("attempting capture via device storage");

    let output = client
        .shell(device, &format!("screencap -p {STORAGE_CAPTURE_PATH}"))
        .await?;
    if output.exit_code != 0 {
        return Err(EngineError::Transport(format!(
            "screencap to storage failed: {}",
            output.stderr
        )));
    }

    let data = client
        .exec_out(device, &format!("cat {STORAGE_CAPTURE_PATH}"))
        .await?;

    let _ = client
        .shell(device, &format!("rm -f {STORAGE_CAPTURE_PATH}"))
        .await;

    let info = validate_png(&data)
        .map_err(|e| EngineError::Transport(format!("storage screenshot invalid: {e}")))?;

    debug!(width = info.width, height = info.height, bytes = info.size, "storage capture successful");
    Ok(ScreenshotResult { data, info })
}
