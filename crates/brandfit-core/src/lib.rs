use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque white; every canvas starts with it and the cleanup pass writes it.
pub const CANVAS_BACKGROUND: [u8; 3] = [255, 255, 255];

pub const ICON_SIZE: ImageSize = ImageSize::square(1024);
pub const SPLASH_SIZE: ImageSize = ImageSize::new(1080, 1920);
pub const SPLASH_FIT_BOOST: f64 = 2.2;
pub const TEXT_SPLASH_BOOST: f64 = 1.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn square(side: u32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl Display for ImageSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How a source image is mapped onto a fixed canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FitPolicy {
    /// Centered square crop, then resize to the (square) target.
    SquareCropFill,
    /// Letterbox with an enlargement factor, clamped so nothing is cropped.
    AspectFitNoCrop { boost: f64 },
    /// Cover the whole canvas, cropping the overflowing dimension.
    FillThenCrop,
    /// Letterbox that only ever shrinks the source.
    ShrinkToFit,
}

impl FitPolicy {
    pub fn crops(&self) -> bool {
        matches!(self, Self::SquareCropFill | Self::FillThenCrop)
    }

    /// Only the boosted letterbox composites the source through its own alpha.
    pub fn needs_alpha(&self) -> bool {
        matches!(self, Self::AspectFitNoCrop { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SquareCropFill => "square-crop-fill",
            Self::AspectFitNoCrop { .. } => "aspect-fit-no-crop",
            Self::FillThenCrop => "fill-then-crop",
            Self::ShrinkToFit => "shrink-to-fit",
        }
    }
}

impl Display for FitPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AspectFitNoCrop { boost } => write!(f, "{} (boost {})", self.label(), boost),
            other => f.write_str(other.label()),
        }
    }
}

/// Derived once per job from the source size, the fit region and the policy.
///
/// For cropping policies `offset_x`/`offset_y` locate the crop window inside
/// the resampled image; otherwise they locate the resampled image inside the
/// fit region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitGeometry {
    pub scale: f64,
    pub new_width: u32,
    pub new_height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl FitGeometry {
    pub fn resampled_size(&self) -> ImageSize {
        ImageSize::new(self.new_width, self.new_height)
    }
}

/// Rectangle of the canvas the fitting step is allowed to draw into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn full(size: ImageSize) -> Self {
        Self {
            x: 0,
            y: 0,
            width: size.width,
            height: size.height,
        }
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }
}

/// One step of the font fallback chain, tried in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum FontSource {
    /// A bare file name looked up in the working directory and the system font directories.
    Named(String),
    /// An explicit path to a TrueType/OpenType file.
    Path(PathBuf),
    /// The bitmap font compiled into the binary; always resolves.
    Builtin,
}

impl Display for FontSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => write!(f, "named:{}", name),
            Self::Path(path) => write!(f, "path:{}", path.display()),
            Self::Builtin => f.write_str("builtin"),
        }
    }
}

pub fn default_font_chain() -> Vec<FontSource> {
    vec![
        FontSource::Named("arial.ttf".to_string()),
        FontSource::Path(PathBuf::from("C:/Windows/Fonts/arial.ttf")),
        FontSource::Builtin,
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOverlaySpec {
    pub label: String,
    pub color: [u8; 3],
    pub shadow_color: [u8; 3],
    pub shadow_offset: u32,
    /// Fraction of the canvas height kept free at the bottom for the label.
    pub band_fraction: f64,
    pub font_size: f32,
    pub fonts: Vec<FontSource>,
}

impl TextOverlaySpec {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            color: [0x1A, 0x1A, 0x1A],
            shadow_color: [200, 200, 200],
            shadow_offset: 2,
            band_fraction: 0.25,
            font_size: 48.0,
            fonts: default_font_chain(),
        }
    }

    /// Height left to the image above the reserved band.
    pub fn content_height(&self, canvas_height: u32) -> u32 {
        (canvas_height as f64 * (1.0 - self.band_fraction)) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PostProcess {
    BackgroundCleanup,
    TextOverlay(TextOverlaySpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetJob {
    pub name: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub target: ImageSize,
    pub policy: FitPolicy,
    pub post: Vec<PostProcess>,
}

impl AssetJob {
    pub fn new(
        name: impl Into<String>,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        target: ImageSize,
        policy: FitPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            output: output.into(),
            target,
            policy,
            post: Vec::new(),
        }
    }

    pub fn with_post(mut self, step: PostProcess) -> Self {
        self.post.push(step);
        self
    }

    /// 1024x1024 icon, center-cropped to a square.
    pub fn app_icon(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self::new("app-icon", input, output, ICON_SIZE, FitPolicy::SquareCropFill)
    }

    /// 1024x1024 icon, letterboxed on white without enlarging.
    pub fn letterboxed_icon(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self::new("app-icon", input, output, ICON_SIZE, FitPolicy::ShrinkToFit)
    }

    /// 1080x1920 splash covering the whole canvas.
    pub fn splash_cover(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self::new("splash", input, output, SPLASH_SIZE, FitPolicy::FillThenCrop)
    }

    /// 1080x1920 splash, fully visible, dark backdrop scrubbed to white.
    pub fn splash_fit(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self::new(
            "splash",
            input,
            output,
            SPLASH_SIZE,
            FitPolicy::AspectFitNoCrop {
                boost: SPLASH_FIT_BOOST,
            },
        )
        .with_post(PostProcess::BackgroundCleanup)
    }

    /// 1080x1920 splash with the image in the upper part and a label below it.
    pub fn splash_with_text(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        label: impl Into<String>,
    ) -> Self {
        Self::new(
            "splash-with-text",
            input,
            output,
            SPLASH_SIZE,
            FitPolicy::AspectFitNoCrop {
                boost: TEXT_SPLASH_BOOST,
            },
        )
        .with_post(PostProcess::TextOverlay(TextOverlaySpec::new(label)))
    }

    pub fn text_overlay(&self) -> Option<&TextOverlaySpec> {
        self.post.iter().find_map(|step| match step {
            PostProcess::TextOverlay(spec) => Some(spec),
            PostProcess::BackgroundCleanup => None,
        })
    }

    /// The canvas area the image is fitted into; shrinks when a text band is reserved.
    pub fn fit_region(&self) -> Region {
        match self.text_overlay() {
            Some(text) => Region {
                x: 0,
                y: 0,
                width: self.target.width,
                height: text.content_height(self.target.height),
            },
            None => Region::full(self.target),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.target.is_empty() {
            return Err(CoreError::Transform(format!(
                "target size {} must be non-empty",
                self.target
            )));
        }
        if let FitPolicy::AspectFitNoCrop { boost } = self.policy {
            if !boost.is_finite() || boost <= 0.0 {
                return Err(CoreError::Transform(format!("boost must be positive, got {}", boost)));
            }
        }
        if self.policy == FitPolicy::SquareCropFill && self.target.width != self.target.height {
            return Err(CoreError::Transform(format!(
                "square crop-fill needs a square target, got {}",
                self.target
            )));
        }
        if let Some(text) = self.text_overlay() {
            if !(0.0..1.0).contains(&text.band_fraction) {
                return Err(CoreError::Transform(format!(
                    "text band fraction must be in [0, 1), got {}",
                    text.band_fraction
                )));
            }
            if self.fit_region().height == 0 {
                return Err(CoreError::Transform(
                    "text band leaves no room for the image".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetReport {
    pub job: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub policy: FitPolicy,
    pub source_size: ImageSize,
    pub fitted_size: ImageSize,
    pub output_size: ImageSize,
    pub font_used: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEventType {
    JobStart,
    JobSuccess,
    JobError,
    JobSkipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event_type: TelemetryEventType,
    pub job: String,
    pub policy: FitPolicy,
    pub duration_ms: Option<u64>,
    pub detail: Option<String>,
}

pub trait TelemetrySink {
    fn emit(&self, event: TelemetryEvent);
}

/// Renders one job end to end: load, fit, post-process, save.
pub trait AssetBackend {
    fn render(&self, job: &AssetJob) -> Result<AssetReport, CoreError>;
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("input not found: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("failed to decode {}: {message}", .path.display())]
    Decode { path: PathBuf, message: String },
    #[error("transform failed: {0}")]
    Transform(String),
    #[error("failed to encode {}: {message}", .path.display())]
    Encode { path: PathBuf, message: String },
    #[error("i/o error on {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

impl CoreError {
    pub fn io(path: &Path, err: impl Display) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingInput(_) => ErrorCode::MissingInput,
            Self::Decode { .. } => ErrorCode::DecodeError,
            Self::Transform(_) => ErrorCode::TransformError,
            Self::Encode { .. } => ErrorCode::EncodeError,
            Self::Io { .. } => ErrorCode::IoError,
        }
    }

    pub fn as_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    MissingInput,
    DecodeError,
    TransformError,
    EncodeError,
    IoError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

/// What a driver sees of a job: a success flag plus either the report or the error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub job: String,
    pub succeeded: bool,
    pub report: Option<AssetReport>,
    pub error: Option<ErrorInfo>,
}

impl JobOutcome {
    pub fn skipped(&self) -> bool {
        matches!(&self.error, Some(info) if info.code == ErrorCode::MissingInput)
    }
}

pub fn run_job_with_telemetry(
    backend: &dyn AssetBackend,
    job: &AssetJob,
    telemetry: Option<&dyn TelemetrySink>,
) -> Result<AssetReport, CoreError> {
    let emit = |event_type: TelemetryEventType, duration_ms: Option<u64>, detail: Option<String>| {
        if let Some(sink) = telemetry {
            sink.emit(TelemetryEvent {
                event_type,
                job: job.name.clone(),
                policy: job.policy,
                duration_ms,
                detail,
            });
        }
    };

    if !job.input.exists() {
        let err = CoreError::MissingInput(job.input.clone());
        emit(TelemetryEventType::JobSkipped, None, Some(err.to_string()));
        return Err(err);
    }
    job.validate()?;

    let start = Instant::now();
    emit(TelemetryEventType::JobStart, None, None);
    match backend.render(job) {
        Ok(report) => {
            emit(
                TelemetryEventType::JobSuccess,
                Some(start.elapsed().as_millis() as u64),
                Some(format!(
                    "source={},fitted={},output={}",
                    report.source_size, report.fitted_size, report.output_size
                )),
            );
            Ok(report)
        }
        Err(err) => {
            emit(
                TelemetryEventType::JobError,
                Some(start.elapsed().as_millis() as u64),
                Some(err.to_string()),
            );
            Err(err)
        }
    }
}

/// Runs a job and contains any failure; nothing escapes but the outcome.
pub fn run_job(
    backend: &dyn AssetBackend,
    job: &AssetJob,
    telemetry: Option<&dyn TelemetrySink>,
) -> JobOutcome {
    match run_job_with_telemetry(backend, job, telemetry) {
        Ok(report) => {
            tracing::info!(job = %job.name, output = %report.output.display(), "asset written");
            JobOutcome {
                job: job.name.clone(),
                succeeded: true,
                report: Some(report),
                error: None,
            }
        }
        Err(err) => {
            match &err {
                CoreError::MissingInput(path) => {
                    tracing::warn!(
                        job = %job.name,
                        input = %path.display(),
                        "input missing, skipping"
                    )
                }
                other => tracing::error!(job = %job.name, error = %other, "asset job failed"),
            }
            JobOutcome {
                job: job.name.clone(),
                succeeded: false,
                report: None,
                error: Some(err.as_error_info()),
            }
        }
    }
}
