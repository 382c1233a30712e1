use std::time::{Duration, Instant};

use super::AdbClient;
use crate::error::Result;

pub(super) async fn get_current_activity(client: &AdbClient, device: &str) -> Result<String> {
    let output = client
        .shell(
            device,
            "dumpsys activity activities | grep -E mResumedActivity",
        )
        .await?;

    if !output.stdout.trim().is_empty() {
        return Ok(output.stdout.trim().to_string());
    }

    let fallback = client.shell(device, "dumpsys activity activities").await?;
    for line in fallback.stdout.lines() {
        if line.contains("mResumedActivity") || line.contains("mCurrentFocus") {
            return Ok(line.trim().to_string());
        }
    }

    Ok(fallback.stdout.trim().to_string())
}

pub(super) async fn wait_for_activity(
    client: &AdbClient,
    device: &str,
    pattern: &str,
    timeout: Duration,
) -> Result<bool> {
    let start = Instant::now();

    while start.elapsed() < timeout {
        let current = get_current_activity(client, device).await?;
        if current.contains(pattern) {
            return Ok(true);
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    Ok(false)
}
