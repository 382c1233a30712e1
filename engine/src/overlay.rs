//! Overlay Detector: compares a device frame against a framework frame to
//! decide whether something outside the framework's own rendering (a
//! system permission dialog, an IME, a notification shade) is on screen.

use image::{DynamicImage, Rgba, RgbaImage};

use crate::image as img;
use crate::model::{DiffRegion, OverlayDetectionResult};

/// Tunable knobs for the comparison. The exclusion fractions trim the
/// status bar and navigation bar — framework-invisible, device-visible —
/// out of the comparison band; they are parameters rather than fixed
/// constants because status/nav bar height varies across devices and
/// Android versions.
#[derive(Debug, Clone, Copy)]
pub struct OverlayConfig {
    pub exclude_top_fraction: f64,
    pub exclude_bottom_fraction: f64,
    /// Per-channel mismatch threshold, as a fraction of the 0-255 range.
    pub channel_threshold: f64,
    /// Minimum mismatching-pixel fraction for `overlay_present` to be true.
    pub min_diff_percentage: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            exclude_top_fraction: 0.05,
            exclude_bottom_fraction: 0.12,
            channel_threshold: 0.01,
            min_diff_percentage: 0.05,
        }
    }
}

/// Compares a device screenshot against a framework screenshot using
/// [`OverlayConfig::default`].
pub fn detect(device_png: &[u8], framework_png: &[u8]) -> OverlayDetectionResult {
    detect_with_config(device_png, framework_png, &OverlayConfig::default())
}

pub fn detect_with_config(
    device_png: &[u8],
    framework_png: &[u8],
    config: &OverlayConfig,
) -> OverlayDetectionResult {
    let (device_image, framework_image) = match (img::decode_png(device_png), img::decode_png(framework_png)) {
        (Ok(d), Ok(f)) => (d, f),
        _ => {
            return OverlayDetectionResult {
                overlay_present: true,
                confidence: 0.0,
                diff_percentage: 1.0,
                diff_regions: Vec::new(),
                reason: "decode failed".to_string(),
            };
        }
    };

    if device_image.dimensions() != framework_image.dimensions() {
        return OverlayDetectionResult {
            overlay_present: true,
            confidence: 0.5,
            diff_percentage: 1.0,
            diff_regions: Vec::new(),
            reason: format!(
                "dimension mismatch: device {:?} vs framework {:?}",
                device_image.dimensions(),
                framework_image.dimensions()
            ),
        };
    }

    let device_rgba = device_image.to_rgba8();
    let framework_rgba = framework_image.to_rgba8();
    let (width, height) = device_rgba.dimensions();

    let y_start = (height as f64 * config.exclude_top_fraction).round() as u32;
    let y_end = (height as f64 * (1.0 - config.exclude_bottom_fraction)).round() as u32;
    let y_end = y_end.min(height);
    let threshold = (config.channel_threshold * 255.0).round() as i32;

    let mut compared: u64 = 0;
    let mut mismatching: u64 = 0;
    let mut bbox: Option<(u32, u32, u32, u32)> = None;

    for y in y_start..y_end {
        for x in 0..width {
            let a = device_rgba.get_pixel(x, y);
            let b = framework_rgba.get_pixel(x, y);
            compared += 1;

            let dr = (a[0] as i32 - b[0] as i32).abs();
            let dg = (a[1] as i32 - b[1] as i32).abs();
            let db = (a[2] as i32 - b[2] as i32).abs();
            if dr.max(dg).max(db) > threshold {
                mismatching += 1;
                bbox = Some(match bbox {
                    None => (x, y, x, y),
                    Some((left, top, right, bottom)) => {
                        (left.min(x), top.min(y), right.max(x), bottom.max(y))
                    }
                });
            }
        }
    }

    let diff_percentage = if compared > 0 {
        mismatching as f64 / compared as f64
    } else {
        0.0
    };
    let overlay_present = diff_percentage > config.min_diff_percentage;

    let bbox_area = bbox
        .map(|(left, top, right, bottom)| {
            ((right - left + 1) as u64) * ((bottom - top + 1) as u64)
        })
        .unwrap_or(0);

    let concentration = if bbox_area > 0 {
        mismatching as f64 / bbox_area as f64
    } else {
        0.0
    };
    let confidence = if overlay_present {
        concentration
    } else {
        1.0 - concentration
    };

    let diff_regions = bbox
        .map(|(left, top, right, bottom)| {
            vec![DiffRegion {
                x: left,
                y: top,
                width: right - left + 1,
                height: bottom - top + 1,
            }]
        })
        .unwrap_or_default();

    OverlayDetectionResult {
        overlay_present,
        confidence,
        diff_percentage,
        diff_regions,
        reason: if overlay_present {
            format!("{:.2}% of compared pixels differ beyond tolerance", diff_percentage * 100.0)
        } else {
            "device and framework frames agree within tolerance".to_string()
        },
    }
}

/// Renders the comparison band for human inspection: matching pixels at
/// 50% grayscale opacity, mismatching pixels red at full opacity, and the
/// excluded top/bottom bands at 25% grayscale opacity.
pub fn generate_diff_image(device_png: &[u8], framework_png: &[u8]) -> crate::error::Result<Vec<u8>> {
    generate_diff_image_with_config(device_png, framework_png, &OverlayConfig::default())
}

pub fn generate_diff_image_with_config(
    device_png: &[u8],
    framework_png: &[u8],
    config: &OverlayConfig,
) -> crate::error::Result<Vec<u8>> {
    let device_image = img::decode_png(device_png)?;
    let framework_image = img::decode_png(framework_png)?;
    let (device_canon, framework_canon) = img::canonicalize_pair(&device_image, &framework_image);
    let device_rgba = device_canon.to_rgba8();
    let framework_rgba = framework_canon.to_rgba8();
    let (width, height) = device_rgba.dimensions();

    let y_start = (height as f64 * config.exclude_top_fraction).round() as u32;
    let y_end = ((height as f64 * (1.0 - config.exclude_bottom_fraction)).round() as u32).min(height);
    let threshold = (config.channel_threshold * 255.0).round() as i32;

    let mut canvas = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let a = device_rgba.get_pixel(x, y);
            let gray = ((a[0] as u32 + a[1] as u32 + a[2] as u32) / 3) as u8;

            let out = if y < y_start || y >= y_end {
                blend_gray(gray, 0.25)
            } else {
                let b = framework_rgba.get_pixel(x, y);
                let dr = (a[0] as i32 - b[0] as i32).abs();
                let dg = (a[1] as i32 - b[1] as i32).abs();
                let db = (a[2] as i32 - b[2] as i32).abs();
                if dr.max(dg).max(db) > threshold {
                    Rgba([255, 0, 0, 255])
                } else {
                    blend_gray(gray, 0.5)
                }
            };
            canvas.put_pixel(x, y, out);
        }
    }

    img::encode_png(&DynamicImage::ImageRgba8(canvas))
}

/// Blends a grayscale value at `opacity` over a white backdrop.
fn blend_gray(gray: u8, opacity: f64) -> Rgba<u8> {
    let blended = (gray as f64 * opacity + 255.0 * (1.0 - opacity)).round() as u8;
    Rgba([blended, blended, blended, 255])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn solid_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)));
        img::encode_png(&image).unwrap()
    }

    #[test]
    fn identical_frames_report_no_overlay() {
        let device = solid_png(64, 128, [10, 10, 10, 255]);
        let framework = solid_png(64, 128, [10, 10, 10, 255]);
        let result = detect(&device, &framework);
        assert!(!result.overlay_present);
        assert_eq!(result.diff_percentage, 0.0);
        assert!(result.diff_regions.is_empty());
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn large_difference_reports_overlay_with_one_region() {
        let device = solid_png(64, 128, [0, 0, 0, 255]);
        let framework = solid_png(64, 128, [255, 255, 255, 255]);
        let result = detect(&device, &framework);
        assert!(result.overlay_present);
        assert_eq!(result.diff_regions.len(), 1);
        assert!(result.confidence > 0.5);
    }

    #[test]
    fn undecodable_input_is_conservatively_an_overlay() {
        let result = detect(b"not a png", b"also not a png");
        assert!(result.overlay_present);
        assert_eq!(result.diff_percentage, 1.0);
        assert_eq!(result.confidence, 0.0);
        assert!(result.reason.contains("decode failed"));
    }

    #[test]
    fn dimension_mismatch_is_conservatively_an_overlay() {
        let device = solid_png(64, 128, [5, 5, 5, 255]);
        let framework = solid_png(32, 64, [5, 5, 5, 255]);
        let result = detect(&device, &framework);
        assert!(result.overlay_present);
        assert_eq!(result.diff_percentage, 1.0);
        assert_eq!(result.confidence, 0.5);
        assert!(result.reason.contains("dimension mismatch"));
    }
}
