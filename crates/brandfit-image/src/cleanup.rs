//! Background cleanup pass for letterboxed splash screens.
//!
//! Dark photographic backdrops and stray dark framing are forced to the
//! canvas color with a fixed two-tier brightness rule. The rewrite is lossy
//! and ignores what is actually foreground.

use brandfit_core::CANVAS_BACKGROUND;
use image::{Rgb, RgbImage};

/// Width of the border frame, in pixels.
pub const EDGE_THRESHOLD: u32 = 50;

/// Inside the border frame, anything darker than this becomes white.
pub const EDGE_BRIGHTNESS_CUTOFF: u32 = 240;

/// Outside the frame only near-black pixels are rewritten.
pub const DARK_BRIGHTNESS_CUTOFF: u32 = 30;

/// Whether (`x`, `y`) falls in the border frame of a `width` x `height` canvas.
///
/// The right and bottom bands use a strict comparison, so they are one pixel
/// narrower than the left and top bands.
pub fn is_near_edge(x: u32, y: u32, width: u32, height: u32) -> bool {
    x < EDGE_THRESHOLD
        || x as i64 > width as i64 - EDGE_THRESHOLD as i64
        || y < EDGE_THRESHOLD
        || y as i64 > height as i64 - EDGE_THRESHOLD as i64
}

/// Sum of the three channels; a mean below `cutoff` is a sum below `3 * cutoff`.
pub fn channel_sum(pixel: &Rgb<u8>) -> u32 {
    pixel.0.iter().map(|&c| c as u32).sum()
}

/// Rewrite edge and near-black pixels to white in one pass; returns how many changed.
pub fn cleanup_background(canvas: &mut RgbImage) -> usize {
    let (width, height) = canvas.dimensions();
    let mut rewritten = 0usize;
    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        let cutoff = if is_near_edge(x, y, width, height) {
            EDGE_BRIGHTNESS_CUTOFF
        } else {
            DARK_BRIGHTNESS_CUTOFF
        };
        if channel_sum(pixel) < cutoff * 3 {
            *pixel = Rgb(CANVAS_BACKGROUND);
            rewritten += 1;
        }
    }
    tracing::debug!(rewritten, width, height, "background cleanup pass");
    rewritten
}
