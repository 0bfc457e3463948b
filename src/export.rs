//! Export renderer
//!
//! Builds the same scene as the preview, normalises it for export, rasterizes
//! it at a supersampling factor and writes a PNG or single page PDF. Files are
//! written to a temp file in the target directory and renamed into place.

use std::io::Write;
use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::adjust::AdjustableResult;
use crate::color_space::Rgb;
use crate::config::ExportConfig;
use crate::image_loader::{encode_jpeg, encode_png};
use crate::provider::GeneratedImage;
use crate::render::{flatten, RasterError, Rasterizer};
use crate::scene::{self, Scene, SceneOptions, PAGE_HEIGHT, PAGE_WIDTH};
use crate::text::sanitize_filename;
use crate::tools::menu::MenuDesign;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// PNG bitmap
    Image,
    /// A4 PDF with the bitmap embedded as JPEG
    Document,
}

impl ExportKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportKind::Image => "png",
            ExportKind::Document => "pdf",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "png" | "image" => Some(ExportKind::Image),
            "pdf" | "document" => Some(ExportKind::Document),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Nothing to export yet.
    Disabled,
    Written(PathBuf),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error("failed to encode image: {0}")]
    Encode(String),
    #[error("failed to build PDF: {0}")]
    Pdf(String),
    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Renders adjustable results into files in the export directory.
#[derive(Debug, Clone)]
pub struct ExportRenderer {
    rasterizer: Rasterizer,
    output_dir: PathBuf,
    menu_scale: f32,
    logo_scale: f32,
    photo_scale: f32,
    jpeg_quality: u8,
}

impl ExportRenderer {
    pub fn new(rasterizer: Rasterizer, config: &ExportConfig) -> Self {
        Self {
            rasterizer,
            output_dir: config.output_dir.clone(),
            menu_scale: config.menu_scale.max(1) as f32,
            logo_scale: config.logo_scale.max(1) as f32,
            photo_scale: config.photo_scale.max(1) as f32,
            jpeg_quality: config.jpeg_quality.clamp(1, 100),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn rasterizer(&self) -> &Rasterizer {
        &self.rasterizer
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Rasterize the export form of `scene`.
    ///
    /// A scene with text fails with [`RasterError::NoFont`] when no font is
    /// loaded, rather than writing a file with the text missing.
    pub fn render_scene(&self, scene: &Scene, factor: f32) -> Result<RgbaImage, RasterError> {
        let export = scene.normalize_for_export();
        if export.has_text() && !self.rasterizer.has_font() {
            return Err(RasterError::NoFont);
        }
        self.rasterizer.render(&export, factor)
    }

    pub fn export_menu(
        &self,
        result: &AdjustableResult<MenuDesign>,
        kind: ExportKind,
    ) -> Result<ExportOutcome, ExportError> {
        let Some(design) = result.artifact() else {
            return Ok(ExportOutcome::Disabled);
        };
        let scene = scene::build_menu_scene(design, result.adjustments(), SceneOptions::default());
        let bitmap = self.render_scene(&scene, self.menu_scale)?;
        let bytes = match kind {
            ExportKind::Image => png_bytes(bitmap)?,
            ExportKind::Document => pdf_bytes(&bitmap, self.jpeg_quality)?,
        };
        let name = format!(
            "{}.{}",
            sanitize_filename(&[&design.restaurant_name, "Menu"]),
            kind.extension()
        );
        self.write(&name, &bytes).map(ExportOutcome::Written)
    }

    /// Logo as a transparent PNG.
    pub fn export_logo(
        &self,
        result: &AdjustableResult<GeneratedImage>,
        brand: &str,
    ) -> Result<ExportOutcome, ExportError> {
        let Some(logo) = result.artifact() else {
            return Ok(ExportOutcome::Disabled);
        };
        let scene = scene::build_logo_scene(logo, result.adjustments(), SceneOptions::default());
        let bytes = png_bytes(self.render_scene(&scene, self.logo_scale)?)?;
        let name = format!("{}.png", sanitize_filename(&[brand, "Logo"]));
        self.write(&name, &bytes).map(ExportOutcome::Written)
    }

    pub fn export_photo(
        &self,
        result: &AdjustableResult<GeneratedImage>,
        label: &str,
    ) -> Result<ExportOutcome, ExportError> {
        let Some(photo) = result.artifact() else {
            return Ok(ExportOutcome::Disabled);
        };
        let scene = scene::build_photo_scene(photo, result.adjustments(), SceneOptions::default());
        let bytes = png_bytes(self.render_scene(&scene, self.photo_scale)?)?;
        let name = format!("{}.png", sanitize_filename(&[label, "Photo"]));
        self.write(&name, &bytes).map(ExportOutcome::Written)
    }

    fn write(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
        let path = self.output_dir.join(file_name);
        write_atomic(&path, bytes).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "export written");
        Ok(path)
    }
}

/// Write through a temp file in the same directory, then rename.
///
/// The temp file is removed when anything before the rename fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn png_bytes(bitmap: RgbaImage) -> Result<Vec<u8>, ExportError> {
    encode_png(&DynamicImage::ImageRgba8(bitmap)).map_err(|e| ExportError::Encode(format!("{:#}", e)))
}

/// Single A4 page with `bitmap` fitted and centred, flattened on white.
pub fn pdf_bytes(bitmap: &RgbaImage, quality: u8) -> Result<Vec<u8>, ExportError> {
    let flat = flatten(bitmap, Rgb::WHITE);
    let (px_w, px_h) = flat.dimensions();
    let jpeg = encode_jpeg(&DynamicImage::ImageRgba8(flat), quality)
        .map_err(|e| ExportError::Encode(format!("{:#}", e)))?;

    let k = (PAGE_WIDTH / px_w as f32).min(PAGE_HEIGHT / px_h as f32);
    let (draw_w, draw_h) = ((px_w as f32 * k).round(), (px_h as f32 * k).round());
    let x = ((PAGE_WIDTH - draw_w) / 2.0).round();
    let y = ((PAGE_HEIGHT - draw_h) / 2.0).round();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => px_w as i64,
            "Height" => px_h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                [draw_w, 0.0, 0.0, draw_h, x, y]
                    .iter()
                    .map(|v| Object::Integer(*v as i64))
                    .collect(),
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content.encode().map_err(|e| ExportError::Pdf(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let media_box: Vec<Object> = [0, 0, PAGE_WIDTH as i64, PAGE_HEIGHT as i64]
        .into_iter()
        .map(Object::Integer)
        .collect();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => media_box,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| ExportError::Pdf(e.to_string()))?;
    Ok(out)
}
