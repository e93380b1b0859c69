//! Canvas creation and pasting resampled images onto it.

use brandfit_core::{ImageSize, CANVAS_BACKGROUND};
use image::{Rgb, RgbImage, RgbaImage};

/// Opaque white canvas of exactly `size`.
pub fn blank_canvas(size: ImageSize) -> RgbImage {
    RgbImage::from_pixel(size.width, size.height, Rgb(CANVAS_BACKGROUND))
}

/// Paste `top` over `base` at (`x`, `y`), replacing pixels. Out-of-bounds parts are dropped.
pub fn paste(base: &mut RgbImage, top: &RgbImage, x: u32, y: u32) {
    image::imageops::replace(base, top, x as i64, y as i64);
}

/// Composite `top` onto `base` using `top`'s own alpha as the mask.
///
/// Fully transparent pixels leave the canvas untouched, fully opaque ones
/// replace it. The result is always opaque RGB.
pub fn composite(base: &mut RgbImage, top: &RgbaImage, x: u32, y: u32) {
    for (dx, dy, pixel) in top.enumerate_pixels() {
        let (target_x, target_y) = (x + dx, y + dy);
        if target_x >= base.width() || target_y >= base.height() {
            continue;
        }
        let alpha = pixel[3];
        match alpha {
            0 => {}
            255 => base.put_pixel(target_x, target_y, Rgb([pixel[0], pixel[1], pixel[2]])),
            _ => {
                let bg = base.get_pixel(target_x, target_y);
                let blended = blend_channel_triplet(bg, pixel, alpha);
                base.put_pixel(target_x, target_y, blended);
            }
        }
    }
}

fn blend_channel_triplet(bg: &Rgb<u8>, fg: &image::Rgba<u8>, alpha: u8) -> Rgb<u8> {
    let a = alpha as u32;
    let inv = 255 - a;
    let mix = |f: u8, b: u8| ((f as u32 * a + b as u32 * inv + 127) / 255) as u8;
    Rgb([mix(fg[0], bg[0]), mix(fg[1], bg[1]), mix(fg[2], bg[2])])
}
