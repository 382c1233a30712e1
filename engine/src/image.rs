//! Image Utilities: decode, resize and compare screenshots.
//!
//! Capture validity (is this actually a PNG) is checked up front by
//! [`crate::adb::validate_png`]; this module is concerned with the decoded
//! pixel data that the Overlay Detector and barrier framework operate on.

use image::{imageops::FilterType, DynamicImage, ImageFormat};

use crate::error::{EngineError, Result};

/// Decodes a PNG byte buffer into an in-memory RGBA image.
pub fn decode_png(data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory_with_format(data, ImageFormat::Png)
        .map_err(|e| EngineError::Protocol(format!("failed to decode PNG: {e}")))
}

/// Encodes an image back to PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| EngineError::Protocol(format!("failed to encode PNG: {e}")))?;
    Ok(buffer)
}

/// Resizes an image to fit within `max_width`x`max_height`, preserving
/// aspect ratio. A no-op if the image already fits.
pub fn resize_bounded(image: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if image.width() <= max_width && image.height() <= max_height {
        return image.clone();
    }
    image.resize(max_width, max_height, FilterType::Lanczos3)
}

/// Resizes two images to a common canonical size (the smaller of the two
/// widths and heights) so that per-pixel comparisons are well defined even
/// when the two capture paths report slightly different resolutions.
pub fn canonicalize_pair(a: &DynamicImage, b: &DynamicImage) -> (DynamicImage, DynamicImage) {
    let width = a.width().min(b.width());
    let height = a.height().min(b.height());

    let a_canon = if a.width() == width && a.height() == height {
        a.clone()
    } else {
        a.resize_exact(width, height, FilterType::Triangle)
    };
    let b_canon = if b.width() == width && b.height() == height {
        b.clone()
    } else {
        b.resize_exact(width, height, FilterType::Triangle)
    };

    (a_canon, b_canon)
}

/// Whether two images are byte-for-byte identical once decoded (dimensions
/// and every RGBA sample match).
pub fn images_equal_exact(a: &DynamicImage, b: &DynamicImage) -> bool {
    if a.dimensions() != b.dimensions() {
        return false;
    }
    a.to_rgba8().as_raw() == b.to_rgba8().as_raw()
}

/// Fraction of differing pixels between two equally-sized images, using a
/// per-channel tolerance before a pixel counts as "different".
///
/// Returns `None` if the two images don't share dimensions; callers should
/// canonicalize first via [`canonicalize_pair`] when that's expected.
pub fn pixel_diff_fraction(a: &DynamicImage, b: &DynamicImage, channel_tolerance: u8) -> Option<f64> {
    if a.dimensions() != b.dimensions() {
        return None;
    }

    let a_pixels = a.to_rgba8();
    let b_pixels = b.to_rgba8();
    let total = a_pixels.as_raw().len() / 4;
    if total == 0 {
        return Some(0.0);
    }

    let mut differing = 0usize;
    for (pa, pb) in a_pixels.pixels().zip(b_pixels.pixels()) {
        let differs = pa
            .0
            .iter()
            .zip(pb.0.iter())
            .any(|(ca, cb)| ca.abs_diff(*cb) > channel_tolerance);
        if differs {
            differing += 1;
        }
    }

    Some(differing as f64 / total as f64)
}

/// Whether two images are equal within `channel_tolerance` per channel and
/// an overall differing-pixel fraction below `max_diff_fraction`.
pub fn images_equal_tolerant(
    a: &DynamicImage,
    b: &DynamicImage,
    channel_tolerance: u8,
    max_diff_fraction: f64,
) -> bool {
    match pixel_diff_fraction(a, b, channel_tolerance) {
        Some(fraction) => fraction <= max_diff_fraction,
        None => false,
    }
}

/// A cheap, non-cryptographic content hash used by stability barriers to
/// cut comparison cost: every 100th byte of the raw buffer is folded into a
/// 31-bit accumulator (Java `String.hashCode`-style), not the full image.
pub fn cheap_content_hash(raw_bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0;
    for (i, byte) in raw_bytes.iter().enumerate().step_by(100) {
        hash = hash.wrapping_mul(31).wrapping_add(*byte as u32);
        let _ = i;
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    #[test]
    fn exact_equality_requires_matching_dimensions_and_pixels() {
        let a = solid(4, 4, [10, 20, 30, 255]);
        let b = solid(4, 4, [10, 20, 30, 255]);
        let c = solid(4, 4, [10, 20, 31, 255]);
        assert!(images_equal_exact(&a, &b));
        assert!(!images_equal_exact(&a, &c));
    }

    #[test]
    fn pixel_diff_fraction_counts_differing_pixels() {
        let mut image = RgbaImage::from_pixel(10, 1, Rgba([0, 0, 0, 255]));
        for x in 0..3 {
            image.put_pixel(x, 0, Rgba([255, 255, 255, 255]));
        }
        let a = DynamicImage::ImageRgba8(image);
        let b = solid(10, 1, [0, 0, 0, 255]);

        let fraction = pixel_diff_fraction(&a, &b, 0).unwrap();
        assert!((fraction - 0.3).abs() < 1e-9);
    }

    #[test]
    fn tolerant_equality_respects_thresholds() {
        let a = solid(4, 4, [100, 100, 100, 255]);
        let b = solid(4, 4, [102, 102, 102, 255]);
        assert!(images_equal_tolerant(&a, &b, 5, 0.0));
        assert!(!images_equal_tolerant(&a, &b, 1, 0.0));
    }

    #[test]
    fn canonicalize_pair_shrinks_to_smaller_dimensions() {
        let a = solid(100, 200, [1, 2, 3, 255]);
        let b = solid(50, 50, [1, 2, 3, 255]);
        let (a_canon, b_canon) = canonicalize_pair(&a, &b);
        assert_eq!(a_canon.dimensions(), (50, 50));
        assert_eq!(b_canon.dimensions(), (50, 50));
    }

    #[test]
    fn cheap_hash_is_deterministic_and_sensitive_to_sampled_bytes() {
        let buf_a = vec![1u8; 500];
        let mut buf_b = vec![1u8; 500];
        buf_b[100] = 2;
        assert_eq!(cheap_content_hash(&buf_a), cheap_content_hash(&buf_a));
        assert_ne!(cheap_content_hash(&buf_a), cheap_content_hash(&buf_b));
    }
}
