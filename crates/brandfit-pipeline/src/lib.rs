use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::time::Instant;

use brandfit_core::{
    run_job, AssetBackend, AssetJob, AssetReport, CoreError, ImageSize, JobOutcome, PostProcess,
    TelemetrySink,
};
use brandfit_image::{
    cleanup_background, decode, encode_png, fit_onto_canvas, image_size, Fitted, ImageOpError,
};
use brandfit_text::overlay_text;
use tempfile::Builder;

/// Renders jobs from and to the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalImageBackend;

impl AssetBackend for LocalImageBackend {
    fn render(&self, job: &AssetJob) -> Result<AssetReport, CoreError> {
        let start = Instant::now();
        let bytes = fs::read(&job.input).map_err(|err| match err.kind() {
            ErrorKind::NotFound => CoreError::MissingInput(job.input.clone()),
            _ => CoreError::io(&job.input, err),
        })?;
        let source = decode(&bytes).map_err(|err| image_error(job, err))?;
        let source_size = image_size(&source);
        tracing::info!(
            job = %job.name,
            source = %source_size,
            color = ?source.color(),
            target = %job.target,
            policy = %job.policy,
            "loaded source image"
        );

        let Fitted { mut canvas, geometry } =
            fit_onto_canvas(&source, job.policy, job.target, job.fit_region())
                .map_err(|err| image_error(job, err))?;
        drop(source);

        let mut font_used = None;
        for step in &job.post {
            match step {
                PostProcess::BackgroundCleanup => {
                    let rewritten = cleanup_background(&mut canvas);
                    tracing::debug!(job = %job.name, rewritten, "background cleaned");
                }
                PostProcess::TextOverlay(spec) => {
                    let placement = overlay_text(&mut canvas, spec);
                    font_used = Some(placement.font);
                }
            }
        }

        let png = encode_png(&canvas).map_err(|err| image_error(job, err))?;
        write_atomically(&job.output, &png)?;
        tracing::debug!(
            job = %job.name,
            bytes = png.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "png written"
        );

        Ok(AssetReport {
            job: job.name.clone(),
            input: job.input.clone(),
            output: job.output.clone(),
            policy: job.policy,
            source_size,
            fitted_size: geometry.resampled_size(),
            output_size: ImageSize::new(canvas.width(), canvas.height()),
            font_used,
        })
    }
}

/// Run one job on the local backend; failures come back inside the outcome.
pub fn process(job: &AssetJob, telemetry: Option<&dyn TelemetrySink>) -> JobOutcome {
    run_job(&LocalImageBackend, job, telemetry)
}

/// Replace `path` with `bytes` via a sibling temp file and a rename.
///
/// A failure before the rename leaves any previous file at `path` intact.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), CoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|err| CoreError::io(dir, err))?;
    let mut tmp = Builder::new()
        .prefix(".brandfit-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|err| CoreError::io(dir, err))?;
    tmp.write_all(bytes).map_err(|err| CoreError::io(path, err))?;
    tmp.flush().map_err(|err| CoreError::io(path, err))?;
    tmp.persist(path).map_err(|err| CoreError::io(path, err.error))?;
    Ok(())
}

fn image_error(job: &AssetJob, err: ImageOpError) -> CoreError {
    match err {
        ImageOpError::Decode(source) => CoreError::Decode {
            path: job.input.clone(),
            message: source.to_string(),
        },
        ImageOpError::Encode(source) => CoreError::Encode {
            path: job.output.clone(),
            message: source.to_string(),
        },
        other @ (ImageOpError::EmptySource(_)
        | ImageOpError::EmptyTarget(_)
        | ImageOpError::NonSquareTarget(_)
        | ImageOpError::RegionOutOfBounds { .. }) => CoreError::Transform(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use brandfit_core::{ErrorCode, FitPolicy, CANVAS_BACKGROUND, SPLASH_SIZE};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    use super::*;

    fn write_png(path: &Path, image: DynamicImage) {
        image.save_with_format(path, ImageFormat::Png).expect("write fixture");
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".part"))
            .collect()
    }

    #[test]
    fn renders_square_icon() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("icon.png");
        let output = dir.path().join("out").join("app_icon.png");
        write_png(&input, DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 60, Rgb([20, 40, 60]))));

        let mut job = AssetJob::app_icon(&input, &output);
        job.target = ImageSize::square(32);
        let report = LocalImageBackend.render(&job).expect("render");

        assert_eq!(report.source_size, ImageSize::new(80, 60));
        assert_eq!(report.output_size, ImageSize::square(32));
        let written = image::open(&output).expect("output decodes");
        assert_eq!((written.width(), written.height()), (32, 32));
        assert!(!written.color().has_alpha());
        assert!(leftovers(&output.parent().expect("parent")).is_empty());
    }

    #[test]
    fn splash_fit_scrubs_dark_backdrop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("splash.png");
        let output = dir.path().join("splash_out.png");
        let backdrop = RgbaImage::from_pixel(120, 80, Rgba([0, 0, 0, 255]));
        write_png(&input, DynamicImage::ImageRgba8(backdrop));

        let mut job = AssetJob::splash_fit(&input, &output);
        job.target = ImageSize::new(216, 384);
        let report = LocalImageBackend.render(&job).expect("render");
        assert_eq!(report.fitted_size, ImageSize::new(216, 144));

        let written = image::open(&output).expect("output decodes").to_rgb8();
        assert_eq!(written.dimensions(), (216, 384));
        assert!(written.pixels().all(|p| p.0 == CANVAS_BACKGROUND));
    }

    #[test]
    fn text_splash_reports_font() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("splash.png");
        let output = dir.path().join("splash_with_text.png");
        write_png(&input, DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([0, 90, 0]))));

        let mut job = AssetJob::splash_with_text(&input, &output, "Hello");
        if let Some(PostProcess::TextOverlay(spec)) = job.post.first_mut() {
            spec.fonts = vec![brandfit_core::FontSource::Builtin];
        }
        let report = LocalImageBackend.render(&job).expect("render");
        assert_eq!(report.font_used.as_deref(), Some("builtin"));
        assert_eq!(report.output_size, ImageSize::new(1080, 1920));
        let written = image::open(&output).expect("output decodes").to_rgb8();
        assert_eq!(written.get_pixel(540, 400), &Rgb([0, 90, 0]));
    }

    #[test]
    fn undecodable_input_fails_without_touching_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("broken.jpeg");
        let output = dir.path().join("app_icon.png");
        fs::write(&input, b"\xff\xd8 truncated jpeg").expect("write input");
        fs::write(&output, b"previous").expect("write previous output");

        let outcome = process(&AssetJob::app_icon(&input, &output), None);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.error.expect("error").code, ErrorCode::DecodeError);
        assert_eq!(fs::read(&output).expect("read output"), b"previous");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn existing_output_is_overwritten() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("asset.png");
        fs::write(&output, b"stale").expect("write stale");
        write_atomically(&output, b"fresh").expect("write");
        assert_eq!(fs::read(&output).expect("read"), b"fresh");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn extreme_aspect_cover_renders_at_target_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("wide.png");
        let output = dir.path().join("cover.png");
        let strip = RgbImage::from_pixel(60_000, 1, Rgb([10, 140, 60]));
        write_png(&input, DynamicImage::ImageRgb8(strip));

        let job = AssetJob::new("cover", &input, &output, SPLASH_SIZE, FitPolicy::FillThenCrop);
        let outcome = process(&job, None);
        assert!(outcome.succeeded, "{:?}", outcome.error);
        let written = image::open(&output).expect("output decodes").to_rgb8();
        assert_eq!(written.dimensions(), (1080, 1920));
        assert_eq!(written.get_pixel(540, 960), &Rgb([10, 140, 60]));
    }

    #[test]
    fn missing_input_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let job = AssetJob::new(
            "cover",
            dir.path().join("nope.jpeg"),
            dir.path().join("out.png"),
            ImageSize::new(10, 10),
            FitPolicy::FillThenCrop,
        );
        let outcome = process(&job, None);
        assert!(outcome.skipped());
        assert!(!dir.path().join("out.png").exists());
    }
}
