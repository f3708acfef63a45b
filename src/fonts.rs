//! Font Resolution - Ordered Fallback Chain
//!
//! Resolution never fails: when no candidate file can be loaded the built-in
//! fixed-metric face is returned and a warning is logged.

use embedded_graphics::mono_font::iso_8859_1::FONT_10X20;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use image::RgbImage;
use rusttype::{point, Font, Scale};
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::fields::Rgb;

/// One strategy in the resolution chain.
pub trait FontSource: Send + Sync {
    fn name(&self) -> &'static str;
    fn candidates(&self, font_file: &str) -> Vec<PathBuf>;
}

/// Fonts shipped next to the application.
pub struct BundledDir {
    dir: PathBuf,
}

impl BundledDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FontSource for BundledDir {
    fn name(&self) -> &'static str { "bundled" }

    fn candidates(&self, font_file: &str) -> Vec<PathBuf> {
        vec![self.dir.join(font_file)]
    }
}

/// Platform font directory, including one level of family sub-directories.
pub struct SystemDir {
    root: PathBuf,
}

impl SystemDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn platform() -> Self {
        Self::new(system_font_dir())
    }
}

impl FontSource for SystemDir {
    fn name(&self) -> &'static str { "system" }

    fn candidates(&self, font_file: &str) -> Vec<PathBuf> {
        let mut candidates = vec![self.root.join(font_file)];
        candidates.extend(subdirectories(&self.root).into_iter().map(|dir| dir.join(font_file)));
        candidates
    }
}

/// Same file name with the extension case flipped (`arial.ttf` -> `arial.TTF`).
pub struct AlternateCase {
    dirs: Vec<PathBuf>,
}

impl AlternateCase {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }
}

impl FontSource for AlternateCase {
    fn name(&self) -> &'static str { "alternate-case" }

    fn candidates(&self, font_file: &str) -> Vec<PathBuf> {
        let variants = alternate_names(font_file);
        self.dirs
            .iter()
            .flat_map(|dir| variants.iter().map(move |name| dir.join(name)))
            .collect()
    }
}

fn alternate_names(font_file: &str) -> Vec<String> {
    let mut names = Vec::new();
    let (stem, ext) = match font_file.rsplit_once('.') {
        Some(parts) => parts,
        None => return names,
    };
    for candidate in [
        format!("{stem}.{}", ext.to_uppercase()),
        format!("{stem}.{}", ext.to_lowercase()),
        font_file.to_lowercase(),
        font_file.to_uppercase(),
    ] {
        if candidate != font_file && !names.contains(&candidate) {
            names.push(candidate);
        }
    }
    names
}

fn system_font_dir() -> PathBuf {
    if cfg!(windows) {
        let windir = std::env::var("WINDIR").unwrap_or_else(|_| "C:\\Windows".to_string());
        PathBuf::from(windir).join("Fonts")
    } else if cfg!(target_os = "macos") {
        PathBuf::from("/Library/Fonts")
    } else {
        PathBuf::from("/usr/share/fonts/truetype")
    }
}

fn subdirectories(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = match fs::read_dir(root) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect(),
        Err(_) => Vec::new(),
    };
    dirs.sort();
    dirs
}

/// A drawable font at a concrete pixel size.
#[derive(Clone)]
pub enum FontHandle {
    TrueType {
        font: Arc<Font<'static>>,
        size: u32,
        path: PathBuf,
    },
    /// Fixed 10x20 cell face; ignores the requested size.
    Builtin,
}

impl fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontHandle::TrueType { size, path, .. } => f
                .debug_struct("TrueType")
                .field("size", size)
                .field("path", path)
                .finish(),
            FontHandle::Builtin => f.write_str("Builtin"),
        }
    }
}

impl FontHandle {
    pub fn is_fallback(&self) -> bool {
        matches!(self, FontHandle::Builtin)
    }

    /// Requested pixel size, or the cell height of the built-in face.
    pub fn size(&self) -> u32 {
        match self {
            FontHandle::TrueType { size, .. } => *size,
            FontHandle::Builtin => FONT_10X20.character_size.height,
        }
    }

    /// Rendered ink width of `text` in pixels.
    pub fn text_width(&self, text: &str) -> u32 {
        match self {
            FontHandle::TrueType { font, size, .. } => ink_bounds(font, *size, text)
                .map(|(_, _, max_x, _)| max_x.max(0) as u32)
                .unwrap_or(0),
            FontHandle::Builtin => {
                let cell = FONT_10X20.character_size.width + FONT_10X20.character_spacing;
                let count = text.chars().count() as u32;
                (count * cell).saturating_sub(FONT_10X20.character_spacing)
            }
        }
    }

    /// Ink height of one rendered line.
    pub fn line_height(&self, text: &str) -> u32 {
        match self {
            FontHandle::TrueType { font, size, .. } => match ink_bounds(font, *size, text) {
                Some((_, min_y, _, max_y)) => (max_y - min_y).max(0) as u32,
                None => {
                    let v = font.v_metrics(Scale::uniform(*size as f32));
                    (v.ascent - v.descent).ceil().max(0.0) as u32
                }
            },
            FontHandle::Builtin => FONT_10X20.character_size.height,
        }
    }

    /// Draw `text` with the top of the ascender at `(x, y)`.
    pub fn draw(&self, canvas: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb) {
        match self {
            FontHandle::TrueType { font, size, .. } => draw_truetype(canvas, font, *size, x, y, text, color),
            FontHandle::Builtin => {
                let [r, g, b] = color.0;
                let style = MonoTextStyle::new(&FONT_10X20, Rgb888::new(r, g, b));
                let mut target = RasterTarget { canvas };
                let _ = Text::with_baseline(text, Point::new(x, y), style, Baseline::Top).draw(&mut target);
            }
        }
    }
}

/// (min_x, min_y, max_x, max_y) of the glyph pixel boxes laid out from origin 0.
fn ink_bounds(font: &Font<'static>, size: u32, text: &str) -> Option<(i32, i32, i32, i32)> {
    let scale = Scale::uniform(size as f32);
    let ascent = font.v_metrics(scale).ascent;
    font.layout(text, scale, point(0.0, ascent))
        .filter_map(|glyph| glyph.pixel_bounding_box())
        .fold(None, |acc, bb| match acc {
            None => Some((bb.min.x, bb.min.y, bb.max.x, bb.max.y)),
            Some((x0, y0, x1, y1)) => Some((x0.min(bb.min.x), y0.min(bb.min.y), x1.max(bb.max.x), y1.max(bb.max.y))),
        })
}

fn draw_truetype(canvas: &mut RgbImage, font: &Font<'static>, size: u32, x: i32, y: i32, text: &str, color: Rgb) {
    let scale = Scale::uniform(size as f32);
    let baseline = y as f32 + font.v_metrics(scale).ascent;
    for glyph in font.layout(text, scale, point(x as f32, baseline)) {
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, coverage| {
                blend(canvas, bb.min.x + gx as i32, bb.min.y + gy as i32, color, coverage);
            });
        }
    }
}

fn blend(canvas: &mut RgbImage, x: i32, y: i32, color: Rgb, coverage: f32) {
    if x < 0 || y < 0 || coverage <= 0.0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    if x >= canvas.width() || y >= canvas.height() {
        return;
    }
    let alpha = coverage.min(1.0);
    let dst = canvas.get_pixel_mut(x, y);
    for (channel, src) in dst.0.iter_mut().zip(color.0) {
        *channel = (src as f32 * alpha + *channel as f32 * (1.0 - alpha)).round() as u8;
    }
}

/// embedded-graphics target writing straight into an RGB raster.
struct RasterTarget<'a> {
    canvas: &'a mut RgbImage,
}

impl OriginDimensions for RasterTarget<'_> {
    fn size(&self) -> Size {
        Size::new(self.canvas.width(), self.canvas.height())
    }
}

impl DrawTarget for RasterTarget<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < self.canvas.width() && y < self.canvas.height() {
                self.canvas.put_pixel(x, y, image::Rgb([color.r(), color.g(), color.b()]));
            }
        }
        Ok(())
    }
}

/// Resolves `(font file, size)` through an ordered chain of sources.
pub struct FontResolver {
    sources: Vec<Box<dyn FontSource>>,
    cache: Mutex<HashMap<PathBuf, Arc<Font<'static>>>>,
    warned: Mutex<HashSet<String>>,
}

impl FontResolver {
    pub fn new(sources: Vec<Box<dyn FontSource>>) -> Self {
        Self {
            sources,
            cache: Mutex::new(HashMap::new()),
            warned: Mutex::new(HashSet::new()),
        }
    }

    /// Bundled directory, then the platform directory, then alternate-case names in both.
    pub fn standard(font_dir: impl Into<PathBuf>) -> Self {
        let font_dir = font_dir.into();
        let system = system_font_dir();
        let mut alternate_dirs = vec![font_dir.clone(), system.clone()];
        alternate_dirs.extend(subdirectories(&system));
        Self::new(vec![
            Box::new(BundledDir::new(font_dir)),
            Box::new(SystemDir::new(system)),
            Box::new(AlternateCase::new(alternate_dirs)),
        ])
    }

    /// No sources: every request resolves to the built-in face.
    pub fn builtin_only() -> Self {
        Self::new(Vec::new())
    }

    pub fn resolve(&self, font_file: &str, size: u32) -> FontHandle {
        let size = size.max(1);
        for source in &self.sources {
            for path in source.candidates(font_file) {
                if !path.is_file() {
                    continue;
                }
                if let Some(font) = self.load(&path) {
                    debug!(font_file, source = source.name(), path = %path.display(), size, "resolved font");
                    return FontHandle::TrueType { font, size, path };
                }
            }
        }

        let first_miss = self
            .warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(font_file.to_string());
        if first_miss {
            warn!(font_file, "font file not found, using built-in fallback font");
        } else {
            debug!(font_file, "using built-in fallback font");
        }
        FontHandle::Builtin
    }

    fn load(&self, path: &Path) -> Option<Arc<Font<'static>>> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(font) = cache.get(path) {
            return Some(Arc::clone(font));
        }
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read font file");
                return None;
            }
        };
        match Font::try_from_vec(bytes) {
            Some(font) => {
                let font = Arc::new(font);
                cache.insert(path.to_path_buf(), Arc::clone(&font));
                Some(font)
            }
            None => {
                warn!(path = %path.display(), "font file could not be parsed");
                None
            }
        }
    }
}

impl Default for FontResolver {
    fn default() -> Self {
        Self::standard("fonts")
    }
}
