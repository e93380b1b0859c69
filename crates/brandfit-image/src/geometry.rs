//! Fit geometry: scale factor, resampled size and offsets per policy.

use brandfit_core::{FitGeometry, FitPolicy, ImageSize, Region};

use crate::ImageOpError;

/// Compute the geometry for mapping `source` into `region` under `policy`.
///
/// Offsets follow the convention of [`FitGeometry`]: for
/// [`FitPolicy::SquareCropFill`] they are the square crop origin in source
/// pixels, for [`FitPolicy::FillThenCrop`] the crop origin inside the
/// resampled image, and for the letterbox policies the paste origin inside
/// `region`.
pub fn fit_geometry(
    source: ImageSize,
    region: ImageSize,
    policy: FitPolicy,
) -> Result<FitGeometry, ImageOpError> {
    if source.is_empty() {
        return Err(ImageOpError::EmptySource(source));
    }
    if region.is_empty() {
        return Err(ImageOpError::EmptyTarget(region));
    }
    if policy == FitPolicy::SquareCropFill && region.width != region.height {
        return Err(ImageOpError::NonSquareTarget(region));
    }
    let geometry = match policy {
        FitPolicy::SquareCropFill => square_crop_geometry(source, region),
        FitPolicy::AspectFitNoCrop { boost } => aspect_fit_geometry(source, region, boost),
        FitPolicy::FillThenCrop => cover_geometry(source, region),
        FitPolicy::ShrinkToFit => shrink_geometry(source, region),
    };
    tracing::debug!(
        policy = policy.label(),
        source = %source,
        region = %region,
        scale = geometry.scale,
        new_width = geometry.new_width,
        new_height = geometry.new_height,
        "computed fit geometry"
    );
    Ok(geometry)
}

fn square_crop_geometry(source: ImageSize, region: ImageSize) -> FitGeometry {
    let side = source.width.min(source.height);
    FitGeometry {
        scale: region.width as f64 / side as f64,
        new_width: region.width,
        new_height: region.height,
        offset_x: (source.width - side) / 2,
        offset_y: (source.height - side) / 2,
    }
}

fn aspect_fit_geometry(source: ImageSize, region: ImageSize, boost: f64) -> FitGeometry {
    let (sw, sh) = (source.width as f64, source.height as f64);
    let (tw, th) = (region.width as f64, region.height as f64);

    let mut scale = (tw / sw).min(th / sh) * boost;
    let mut new_width = (sw * scale) as u32;
    let mut new_height = (sh * scale) as u32;

    // Width first, then height; the second clamp wins when both overflow.
    if new_width > region.width {
        scale = tw / sw;
        new_width = region.width;
        new_height = (sh * scale) as u32;
    }
    if new_height > region.height {
        scale = th / sh;
        new_height = region.height;
        new_width = (sw * scale) as u32;
    }

    centered(scale, new_width.max(1), new_height.max(1), region)
}

fn shrink_geometry(source: ImageSize, region: ImageSize) -> FitGeometry {
    let scale = (region.width as f64 / source.width as f64)
        .min(region.height as f64 / source.height as f64)
        .min(1.0);
    let new_width = ((source.width as f64 * scale).round() as u32).clamp(1, region.width);
    let new_height = ((source.height as f64 * scale).round() as u32).clamp(1, region.height);
    centered(scale, new_width, new_height, region)
}

fn centered(scale: f64, new_width: u32, new_height: u32, region: ImageSize) -> FitGeometry {
    FitGeometry {
        scale,
        new_width,
        new_height,
        offset_x: region.width.saturating_sub(new_width) / 2,
        offset_y: region.height.saturating_sub(new_height) / 2,
    }
}

fn cover_geometry(source: ImageSize, region: ImageSize) -> FitGeometry {
    let ratio = source.aspect_ratio();
    if ratio > region.aspect_ratio() {
        let new_width = ((region.height as f64 * ratio) as u32).max(region.width);
        FitGeometry {
            scale: region.height as f64 / source.height as f64,
            new_width,
            new_height: region.height,
            offset_x: (new_width - region.width) / 2,
            offset_y: 0,
        }
    } else {
        let new_height = ((region.width as f64 / ratio) as u32).max(region.height);
        FitGeometry {
            scale: region.width as f64 / source.width as f64,
            new_width: region.width,
            new_height,
            offset_x: 0,
            offset_y: (new_height - region.height) / 2,
        }
    }
}

/// The part of `source` that survives a cover fit, in source pixels.
///
/// Cropping this window and resizing it to `region` matches resizing the
/// whole source to the cover size and cropping afterwards, without ever
/// holding the oversized intermediate.
pub fn cover_source_window(source: ImageSize, geometry: &FitGeometry, region: ImageSize) -> Region {
    let (width, x) = source_span(source.width, region.width, geometry.offset_x, geometry.scale);
    let (height, y) = source_span(source.height, region.height, geometry.offset_y, geometry.scale);
    Region { x, y, width, height }
}

fn source_span(source_len: u32, target_len: u32, offset: u32, scale: f64) -> (u32, u32) {
    let len = ((target_len as f64 / scale).round() as u32).clamp(1, source_len);
    let start = ((offset as f64 / scale).round() as u32).min(source_len - len);
    (len, start)
}
