//! Cheap structural PNG validation, run on every raw capture before the
//! heavier decode in the Image Utilities module. Catches the two failure
//! modes `adb exec-out` is prone to: truncated transfers and stray text
//! (usually an ADB warning) prepended to the binary stream.

use thiserror::Error;

const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone)]
pub struct PngInfo {
    pub width: u32,
    pub height: u32,
    pub size: usize,
}

#[derive(Debug, Error)]
pub enum PngError {
    #[error("invalid PNG header, data may be corrupted or not a PNG")]
    InvalidHeader,
    #[error("PNG data too small ({0} bytes), capture may have failed")]
    TooSmall(usize),
    #[error("PNG missing IEND chunk, file is truncated")]
    MissingIend,
    #[error("failed to parse IHDR chunk: {0}")]
    InvalidIhdr(String),
    #[error("PNG data starts with text, not binary, likely an adb warning: {0}")]
    TextPrefix(String),
}

pub fn validate_png(data: &[u8]) -> Result<PngInfo, PngError> {
    if !data.is_empty() && data[0].is_ascii() && data[0] != 0x89 {
        let preview: String = data
            .iter()
            .take(100)
            .take_while(|&&b| b != 0x89)
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
            .collect();
        return Err(PngError::TextPrefix(preview));
    }

    if data.len() < 8 {
        return Err(PngError::TooSmall(data.len()));
    }

    if data[0..8] != PNG_HEADER {
        return Err(PngError::InvalidHeader);
    }

    if data.len() < 1000 {
        return Err(PngError::TooSmall(data.len()));
    }

    let has_iend = data.windows(4).rev().take(20).any(|w| w == b"IEND");
    if !has_iend {
        return Err(PngError::MissingIend);
    }

    let (width, height) = parse_ihdr(data)?;
    Ok(PngInfo {
        width,
        height,
        size: data.len(),
    })
}

fn parse_ihdr(data: &[u8]) -> Result<(u32, u32), PngError> {
    if data.len() < 24 {
        return Err(PngError::InvalidIhdr("data too short".to_string()));
    }
    if &data[12..16] != b"IHDR" {
        return Err(PngError::InvalidIhdr(
            "IHDR chunk not found at expected position".to_string(),
        ));
    }

    let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);

    if width == 0 || height == 0 || width > 10_000 || height > 20_000 {
        return Err(PngError::InvalidIhdr(format!(
            "implausible dimensions: {width}x{height}"
        )));
    }

    Ok((width, height))
}

/// Finds the real PNG header inside a buffer an ADB warning was prepended to.
pub fn strip_text_prefix(data: &[u8]) -> Option<&[u8]> {
    data.windows(8)
        .position(|w| w == PNG_HEADER)
        .map(|pos| &data[pos..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_png(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&PNG_HEADER);
        data.extend_from_slice(&[0, 0, 0, 13]);
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[8, 6, 0, 0, 0]);
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.resize(2000, 0);
        data.extend_from_slice(b"IEND");
        data.extend_from_slice(&[0xAE, 0x42, 0x60, 0x82]);
        data
    }

    #[test]
    fn validates_well_formed_png() {
        let data = fake_png(256, 512);
        let info = validate_png(&data).unwrap();
        assert_eq!(info.width, 256);
        assert_eq!(info.height, 512);
    }

    #[test]
    fn detects_text_prefix() {
        let data = b"adb warning: some message\x89PNG\r\n\x1a\n...";
        assert!(matches!(validate_png(data), Err(PngError::TextPrefix(_))));
    }

    #[test]
    fn strips_text_prefix() {
        let data = b"adb warning\x89PNG\r\n\x1a\nrest".to_vec();
        let stripped = strip_text_prefix(&data).unwrap();
        assert_eq!(&stripped[0..8], PNG_HEADER);
    }

    #[test]
    fn rejects_truncated_data() {
        assert!(matches!(validate_png(&[0x89, 0x50]), Err(PngError::TooSmall(_))));
    }
}
