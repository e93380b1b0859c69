//! Label rendering for splash screens.
//!
//! Fonts are resolved through an ordered chain of [`FontSource`]s that ends
//! in the built-in bitmap font, so drawing a label never fails for lack of a
//! font file.

pub mod builtin;

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use brandfit_core::{FontSource, TextOverlaySpec};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use walkdir::WalkDir;

/// Directories searched for [`FontSource::Named`] fonts, after the working directory.
const SYSTEM_FONT_DIRS: &[&str] = &[
    "C:/Windows/Fonts",
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/System/Library/Fonts",
    "/Library/Fonts",
];

const FONT_SEARCH_DEPTH: usize = 4;

pub enum LoadedFont {
    Outline { font: FontVec, origin: PathBuf },
    Builtin,
}

impl LoadedFont {
    pub fn describe(&self) -> String {
        match self {
            Self::Outline { origin, .. } => origin.display().to_string(),
            Self::Builtin => "builtin".to_string(),
        }
    }

    /// Bounding box of `text` at `font_size`, in pixels.
    pub fn measure(&self, text: &str, font_size: f32) -> (u32, u32) {
        match self {
            Self::Outline { font, .. } => text_size(PxScale::from(font_size), font, text),
            Self::Builtin => builtin::measure(text, font_size),
        }
    }

    pub fn draw(
        &self,
        canvas: &mut RgbImage,
        color: Rgb<u8>,
        x: i32,
        y: i32,
        font_size: f32,
        text: &str,
    ) {
        match self {
            Self::Outline { font, .. } => {
                draw_text_mut(canvas, color, x, y, PxScale::from(font_size), font, text)
            }
            Self::Builtin => builtin::draw(canvas, color, x, y, font_size, text),
        }
    }
}

/// Walk `chain` in order and return the first font that loads.
///
/// Falls back to the built-in font when the chain is exhausted, even if the
/// chain does not list it.
pub fn resolve_font(chain: &[FontSource]) -> LoadedFont {
    for source in chain {
        match load_source(source) {
            Some(font) => {
                tracing::debug!(source = %source, font = %font.describe(), "font resolved");
                return font;
            }
            None => tracing::debug!(source = %source, "font source unavailable, trying next"),
        }
    }
    tracing::warn!("no font in the chain could be loaded, using the built-in font");
    LoadedFont::Builtin
}

fn load_source(source: &FontSource) -> Option<LoadedFont> {
    match source {
        FontSource::Builtin => Some(LoadedFont::Builtin),
        FontSource::Path(path) => load_outline(path),
        FontSource::Named(name) => find_named_font(name).and_then(|path| load_outline(&path)),
    }
}

fn load_outline(path: &Path) -> Option<LoadedFont> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::trace!(path = %path.display(), error = %err, "font file not readable");
            return None;
        }
    };
    match FontVec::try_from_vec(bytes) {
        Ok(font) => Some(LoadedFont::Outline {
            font,
            origin: path.to_path_buf(),
        }),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "file is not a usable font");
            None
        }
    }
}

/// Look `name` up in the working directory, then the user and system font directories.
pub fn find_named_font(name: &str) -> Option<PathBuf> {
    let direct = PathBuf::from(name);
    if direct.is_file() {
        return Some(direct);
    }
    font_search_dirs()
        .into_iter()
        .filter(|dir| dir.is_dir())
        .find_map(|dir| find_in_dir(&dir, name))
}

fn font_search_dirs() -> Vec<PathBuf> {
    let mut dirs_out = Vec::new();
    if let Some(user_fonts) = dirs::font_dir() {
        dirs_out.push(user_fonts);
    }
    dirs_out.extend(SYSTEM_FONT_DIRS.iter().map(PathBuf::from));
    dirs_out
}

fn find_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(dir)
        .max_depth(FONT_SEARCH_DEPTH)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .find(|entry| {
            entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .map(|file| file.eq_ignore_ascii_case(name))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
}

/// Where the label ended up, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPlacement {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub font: String,
}

/// Draw the label centered in the bottom band with a drop shadow.
pub fn overlay_text(canvas: &mut RgbImage, spec: &TextOverlaySpec) -> TextPlacement {
    let font = resolve_font(&spec.fonts);
    overlay_text_with_font(canvas, spec, &font)
}

pub fn overlay_text_with_font(
    canvas: &mut RgbImage,
    spec: &TextOverlaySpec,
    font: &LoadedFont,
) -> TextPlacement {
    let (canvas_width, canvas_height) = canvas.dimensions();
    let band_top = spec.content_height(canvas_height);
    let band_height = canvas_height.saturating_sub(band_top);
    let (width, height) = font.measure(&spec.label, spec.font_size);

    // floor division keeps oversized labels anchored the same way as small ones
    let x = (canvas_width as i32 - width as i32).div_euclid(2);
    let y = band_top as i32 + (band_height as i32 - height as i32).div_euclid(2);
    let offset = spec.shadow_offset as i32;

    font.draw(canvas, Rgb(spec.shadow_color), x + offset, y + offset, spec.font_size, &spec.label);
    font.draw(canvas, Rgb(spec.color), x, y, spec.font_size, &spec.label);

    tracing::debug!(x, y, width, height, font = %font.describe(), "label drawn");
    TextPlacement {
        x,
        y,
        width,
        height,
        font: font.describe(),
    }
}
