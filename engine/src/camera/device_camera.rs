use std::path::Path;

use tracing::debug;

use crate::adb::AdbClient;
use crate::error::Result;
use crate::image;

/// Captures raw device frames via the ADB Client.
pub struct DeviceCamera<'a> {
    adb: &'a AdbClient,
    device_id: String,
}

impl<'a> DeviceCamera<'a> {
    pub fn new(adb: &'a AdbClient, device_id: impl Into<String>) -> Self {
        Self {
            adb,
            device_id: device_id.into(),
        }
    }

    /// Raw PNG bytes straight off the device, unresized.
    pub async fn capture(&self) -> Result<Vec<u8>> {
        let result = self.adb.screenshot(&self.device_id).await?;
        Ok(result.data)
    }

    /// Captures and resizes to fit within `max_width`x`max_height`.
    pub async fn capture_resized(&self, max_width: u32, max_height: u32) -> Result<Vec<u8>> {
        let raw = self.capture().await?;
        let decoded = image::decode_png(&raw)?;
        let resized = image::resize_bounded(&decoded, max_width, max_height);
        image::encode_png(&resized)
    }

    pub async fn capture_to_file(&self, path: &Path) -> Result<()> {
        let data = self.capture().await?;
        debug!(path = %path.display(), bytes = data.len(), "writing device capture to disk");
        tokio::fs::write(path, &data).await?;
        Ok(())
    }
}
