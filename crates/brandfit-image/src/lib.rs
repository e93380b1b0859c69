//! Raster side of brandfit: fit geometry, resampling, compositing,
//! background cleanup and PNG encoding.

pub mod cleanup;
pub mod compose;
pub mod geometry;

use brandfit_core::{FitGeometry, FitPolicy, ImageSize, Region};
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::{self, FilterType};
use image::{
    DynamicImage, ExtendedColorType, GenericImageView, ImageBuffer, ImageEncoder, ImageError,
    ImageReader, Pixel, RgbImage,
};
use thiserror::Error;

pub use cleanup::{cleanup_background, is_near_edge};
pub use compose::{blank_canvas, composite, paste};
pub use geometry::{cover_source_window, fit_geometry};

/// Resampling filter used for every resize.
pub const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

#[derive(Debug, Error)]
pub enum ImageOpError {
    #[error("source image has no pixels ({0})")]
    EmptySource(ImageSize),
    #[error("target size has no pixels ({0})")]
    EmptyTarget(ImageSize),
    #[error("square crop needs a square target, got {0}")]
    NonSquareTarget(ImageSize),
    #[error("fit region {region:?} does not lie inside the {canvas} canvas")]
    RegionOutOfBounds { region: Region, canvas: ImageSize },
    #[error("decode failed: {0}")]
    Decode(#[source] ImageError),
    #[error("png encode failed: {0}")]
    Encode(#[source] ImageError),
}

/// Canvas plus the geometry that produced it.
#[derive(Debug, Clone)]
pub struct Fitted {
    pub canvas: RgbImage,
    pub geometry: FitGeometry,
}

pub fn image_size(image: &DynamicImage) -> ImageSize {
    let (width, height) = image.dimensions();
    ImageSize::new(width, height)
}

/// Decode JPEG or PNG bytes, sniffing the format from the content.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ImageOpError> {
    ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| ImageOpError::Decode(ImageError::IoError(err)))?
        .decode()
        .map_err(ImageOpError::Decode)
}

/// Convert to RGB8, or RGBA8 when the caller composites through alpha.
///
/// Alpha is discarded, not flattened against a background, when dropped.
pub fn normalize(image: &DynamicImage, keep_alpha: bool) -> DynamicImage {
    match (image, keep_alpha) {
        (DynamicImage::ImageRgb8(_), false) | (DynamicImage::ImageRgba8(_), true) => image.clone(),
        (_, false) => DynamicImage::ImageRgb8(image.to_rgb8()),
        (_, true) => DynamicImage::ImageRgba8(image.to_rgba8()),
    }
}

/// Fit `source` into `region` of a fresh white canvas of `canvas_size` under `policy`.
pub fn fit_onto_canvas(
    source: &DynamicImage,
    policy: FitPolicy,
    canvas_size: ImageSize,
    region: Region,
) -> Result<Fitted, ImageOpError> {
    if canvas_size.is_empty() {
        return Err(ImageOpError::EmptyTarget(canvas_size));
    }
    let fits_x = region.x.checked_add(region.width).is_some_and(|end| end <= canvas_size.width);
    let fits_y = region.y.checked_add(region.height).is_some_and(|end| end <= canvas_size.height);
    if !fits_x || !fits_y {
        return Err(ImageOpError::RegionOutOfBounds {
            region,
            canvas: canvas_size,
        });
    }

    let geometry = fit_geometry(image_size(source), region.size(), policy)?;
    let mut canvas = blank_canvas(canvas_size);

    match policy {
        FitPolicy::SquareCropFill => {
            let rgb = normalize(source, false).into_rgb8();
            let side = rgb.width().min(rgb.height());
            let square = imageops::crop_imm(&rgb, geometry.offset_x, geometry.offset_y, side, side);
            let square = square.to_image();
            let resized = resample(square, geometry.resampled_size());
            paste(&mut canvas, &resized, region.x, region.y);
        }
        FitPolicy::FillThenCrop => {
            let rgb = normalize(source, false).into_rgb8();
            let window = cover_source_window(image_size(source), &geometry, region.size());
            let cropped = imageops::crop_imm(&rgb, window.x, window.y, window.width, window.height);
            let resized = resample(cropped.to_image(), region.size());
            paste(&mut canvas, &resized, region.x, region.y);
        }
        FitPolicy::AspectFitNoCrop { .. } if source.color().has_alpha() => {
            let rgba = normalize(source, true).into_rgba8();
            let resized = resample(rgba, geometry.resampled_size());
            let (x, y) = (region.x + geometry.offset_x, region.y + geometry.offset_y);
            composite(&mut canvas, &resized, x, y);
        }
        FitPolicy::AspectFitNoCrop { .. } | FitPolicy::ShrinkToFit => {
            let rgb = normalize(source, false).into_rgb8();
            let resized = resample(rgb, geometry.resampled_size());
            let (x, y) = (region.x + geometry.offset_x, region.y + geometry.offset_y);
            paste(&mut canvas, &resized, x, y);
        }
    }

    Ok(Fitted { canvas, geometry })
}

fn resample<P>(image: ImageBuffer<P, Vec<u8>>, size: ImageSize) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    if image.dimensions() == (size.width, size.height) {
        return image;
    }
    imageops::resize(&image, size.width, size.height, RESAMPLE_FILTER)
}

/// PNG bytes with maximum compression and adaptive filtering.
pub fn encode_png(canvas: &RgbImage) -> Result<Vec<u8>, ImageOpError> {
    let mut out = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut out, CompressionType::Best, PngFilterType::Adaptive);
    let (width, height) = canvas.dimensions();
    encoder
        .write_image(canvas.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(ImageOpError::Encode)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use brandfit_core::CANVAS_BACKGROUND;
    use image::{Rgb, Rgba, RgbaImage};

    use super::*;

    const SPLASH: ImageSize = ImageSize::new(1080, 1920);

    fn solid_rgb(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    fn border_pixels(canvas: &RgbImage) -> Vec<Rgb<u8>> {
        let (w, h) = canvas.dimensions();
        let mut out = Vec::new();
        for x in 0..w {
            out.push(*canvas.get_pixel(x, 0));
            out.push(*canvas.get_pixel(x, h - 1));
        }
        for y in 0..h {
            out.push(*canvas.get_pixel(0, y));
            out.push(*canvas.get_pixel(w - 1, y));
        }
        out
    }

    #[test]
    fn square_crop_fill_outputs_exact_square() {
        for (w, h) in [(800, 600), (600, 800), (1, 3), (1024, 1024), (2000, 50)] {
            let fitted = fit_onto_canvas(
                &solid_rgb(w, h, [10, 120, 30]),
                FitPolicy::SquareCropFill,
                ImageSize::square(64),
                Region::full(ImageSize::square(64)),
            )
            .expect("fit");
            assert_eq!(fitted.canvas.dimensions(), (64, 64));
        }
    }

    #[test]
    fn square_crop_removes_sides_symmetrically() {
        // 800x600: left and right 100px bands are red, the center square is blue.
        let source = DynamicImage::ImageRgb8(ImageBuffer::from_fn(800, 600, |x, _| {
            if !(100..700).contains(&x) {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        }));
        let size = ImageSize::square(1024);
        let fitted = fit_onto_canvas(&source, FitPolicy::SquareCropFill, size, Region::full(size))
            .expect("fit");
        assert_eq!(fitted.canvas.dimensions(), (1024, 1024));
        assert_eq!((fitted.geometry.offset_x, fitted.geometry.offset_y), (100, 0));
        assert!(fitted.canvas.pixels().all(|p| p[0] < 10 && p[2] > 245));
    }

    #[test]
    fn cover_leaves_no_background_visible() {
        for (w, h) in [(1920, 1080), (1000, 4000), (1080, 1920), (7, 5)] {
            let fitted = fit_onto_canvas(
                &solid_rgb(w, h, [40, 80, 160]),
                FitPolicy::FillThenCrop,
                SPLASH,
                Region::full(SPLASH),
            )
            .expect("fit");
            assert_eq!(fitted.canvas.dimensions(), (1080, 1920));
            assert!(border_pixels(&fitted.canvas).iter().all(|p| p.0 != CANVAS_BACKGROUND));
        }
    }

    #[test]
    fn extreme_strip_covers_without_a_huge_intermediate() {
        // resizing the whole strip first would need a 115200000x1920 buffer
        let strip = DynamicImage::ImageRgb8(ImageBuffer::from_fn(60_000, 1, |x, _| {
            if x < 30_000 {
                Rgb([200, 0, 0])
            } else {
                Rgb([0, 0, 200])
            }
        }));
        let fitted = fit_onto_canvas(&strip, FitPolicy::FillThenCrop, SPLASH, Region::full(SPLASH))
            .expect("fit");
        assert_eq!(fitted.canvas.dimensions(), (1080, 1920));
        assert_eq!(fitted.geometry.new_height, 1920);
        assert!(border_pixels(&fitted.canvas).iter().all(|p| p.0 != CANVAS_BACKGROUND));
    }

    #[test]
    fn square_crop_rejects_a_portrait_region() {
        let err = fit_onto_canvas(
            &solid_rgb(800, 600, [0, 0, 0]),
            FitPolicy::SquareCropFill,
            SPLASH,
            Region::full(SPLASH),
        )
        .expect_err("non-square region");
        assert!(matches!(err, ImageOpError::NonSquareTarget(_)));
    }

    #[test]
    fn transparent_splash_is_letterboxed_on_white() {
        // 1200x800 with a half-transparent 100px frame around an opaque black center.
        let source = DynamicImage::ImageRgba8(RgbaImage::from_fn(1200, 800, |x, y| {
            let frame = x < 100 || x >= 1100 || y < 100 || y >= 700;
            if frame {
                Rgba([0, 0, 0, 128])
            } else {
                Rgba([0, 0, 0, 255])
            }
        }));
        let fitted = fit_onto_canvas(
            &source,
            FitPolicy::AspectFitNoCrop { boost: 2.2 },
            SPLASH,
            Region::full(SPLASH),
        )
        .expect("fit");
        assert_eq!((fitted.geometry.new_width, fitted.geometry.new_height), (1080, 720));
        assert_eq!(fitted.geometry.offset_y, 600);
        let canvas = &fitted.canvas;
        assert_eq!(canvas.dimensions(), (1080, 1920));
        assert_eq!(canvas.get_pixel(540, 599), &Rgb(CANVAS_BACKGROUND));
        assert_eq!(canvas.get_pixel(540, 1320), &Rgb(CANVAS_BACKGROUND));
        assert_eq!(canvas.get_pixel(540, 960), &Rgb([0, 0, 0]));
        // the translucent frame blends to mid gray instead of black
        let frame = canvas.get_pixel(540, 605);
        assert!(frame[0] > 100 && frame[0] < 160, "frame pixel {:?}", frame);
    }

    #[test]
    fn region_keeps_the_text_band_untouched() {
        let region = Region {
            x: 0,
            y: 0,
            width: 1080,
            height: 1440,
        };
        let fitted = fit_onto_canvas(
            &solid_rgb(1000, 1000, [0, 0, 0]),
            FitPolicy::AspectFitNoCrop { boost: 1.3 },
            SPLASH,
            region,
        )
        .expect("fit");
        assert_eq!((fitted.geometry.new_width, fitted.geometry.new_height), (1080, 1080));
        for y in 1440..1920 {
            assert_eq!(fitted.canvas.get_pixel(540, y), &Rgb(CANVAS_BACKGROUND));
        }
        assert_eq!(fitted.canvas.get_pixel(540, 200), &Rgb([0, 0, 0]));
    }

    #[test]
    fn region_outside_canvas_is_rejected() {
        let region = Region {
            x: 10,
            y: 0,
            width: 1080,
            height: 10,
        };
        let source = solid_rgb(4, 4, [0, 0, 0]);
        let err = fit_onto_canvas(&source, FitPolicy::ShrinkToFit, SPLASH, region)
            .expect_err("region overflows");
        assert!(matches!(err, ImageOpError::RegionOutOfBounds { .. }));
    }

    #[test]
    fn refitting_output_is_stable() {
        let policies = [
            (FitPolicy::SquareCropFill, ImageSize::square(256)),
            (FitPolicy::FillThenCrop, ImageSize::new(108, 192)),
            (FitPolicy::AspectFitNoCrop { boost: 2.2 }, ImageSize::new(108, 192)),
            (FitPolicy::ShrinkToFit, ImageSize::square(256)),
        ];
        for (policy, size) in policies {
            let source = solid_rgb(300, 200, [90, 60, 30]);
            let first =
                fit_onto_canvas(&source, policy, size, Region::full(size)).expect("first fit");
            let again = fit_onto_canvas(
                &DynamicImage::ImageRgb8(first.canvas.clone()),
                policy,
                size,
                Region::full(size),
            )
            .expect("second fit");
            assert_eq!(again.canvas.dimensions(), first.canvas.dimensions(), "{policy}");
            assert_eq!(again.canvas.get_pixel(0, 0), first.canvas.get_pixel(0, 0), "{policy}");
        }
    }

    #[test]
    fn normalize_drops_alpha_without_flattening() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 0])));
        let rgb = normalize(&rgba, false);
        assert!(matches!(rgb, DynamicImage::ImageRgb8(_)));
        assert_eq!(rgb.to_rgb8().get_pixel(0, 0), &Rgb([10, 20, 30]));

        let luma = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(1, 1, image::Luma([77])));
        assert_eq!(normalize(&luma, false).to_rgb8().get_pixel(0, 0), &Rgb([77, 77, 77]));
        assert!(matches!(normalize(&luma, true), DynamicImage::ImageRgba8(_)));
    }

    #[test]
    fn encoded_png_decodes_back_to_rgb() {
        let canvas = RgbImage::from_pixel(12, 9, Rgb([1, 2, 3]));
        let bytes = encode_png(&canvas).expect("encode");
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = decode(&bytes).expect("decode");
        assert!(!decoded.color().has_alpha());
        assert_eq!(image_size(&decoded), ImageSize::new(12, 9));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(decode(b"definitely not an image"), Err(ImageOpError::Decode(_))));
    }
}
