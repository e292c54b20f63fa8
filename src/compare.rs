//! Pixel comparison between two screenshots of the same page.

use crate::Result;
use image::{GenericImageView, Pixel, Rgba};
use tracing::debug;

/// Per-channel difference tolerated before a pixel counts as changed
/// (anti-aliasing, compositor noise).
const CHANNEL_TOLERANCE: i32 = 5;

/// Outcome of comparing two screenshots.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelDiff {
    /// Number of differing pixels.
    pub diff_pixels: u64,
    /// Pixels covered by either image (union of both areas).
    pub total_pixels: u64,
    /// Share of differing pixels, in percent.
    pub diff_percent: f64,
    /// Whether both images have the same dimensions.
    pub same_size: bool,
}

impl PixelDiff {
    /// Whether the difference stays within `threshold` percent.
    pub fn within(&self, threshold: f64) -> bool {
        self.same_size && self.diff_percent <= threshold
    }
}

/// Compare two PNG-encoded screenshots pixel by pixel.
///
/// Pixels covered by only one of two differently sized images count as
/// different.
pub fn diff_png(before: &[u8], after: &[u8]) -> Result<PixelDiff> {
    let before = image::load_from_memory(before)?;
    let after = image::load_from_memory(after)?;

    let (bw, bh) = before.dimensions();
    let (aw, ah) = after.dimensions();
    let (ow, oh) = (bw.min(aw), bh.min(ah));
    let overlap = (ow as u64) * (oh as u64);
    let total_pixels = (bw as u64) * (bh as u64) + (aw as u64) * (ah as u64) - overlap;
    if total_pixels == 0 {
        return Ok(PixelDiff {
            diff_pixels: 0,
            total_pixels: 0,
            diff_percent: 0.0,
            same_size: (bw, bh) == (aw, ah),
        });
    }

    let before = before.to_rgba8();
    let after = after.to_rgba8();

    let mut diff_pixels = 0u64;
    for y in 0..oh {
        for x in 0..ow {
            if pixels_differ(before.get_pixel(x, y), after.get_pixel(x, y)) {
                diff_pixels += 1;
            }
        }
    }
    diff_pixels += total_pixels - overlap;

    let diff_percent = diff_pixels as f64 / total_pixels as f64 * 100.0;
    debug!(
        "Pixel diff: {}/{} ({:.3}%), {}x{} vs {}x{}",
        diff_pixels, total_pixels, diff_percent, bw, bh, aw, ah
    );

    Ok(PixelDiff {
        diff_pixels,
        total_pixels,
        diff_percent,
        same_size: (bw, bh) == (aw, ah),
    })
}

fn pixels_differ(a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(x, y)| (*x as i32 - *y as i32).abs() > CHANNEL_TOLERANCE)
}
