//! Artifact Export - Raster Encoders and Single-page PDF
//!
//! PDF pages embed the rendered raster as one JPEG image XObject drawn over
//! the whole MediaBox.

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::print::PrintSpec;
use crate::templates::OutputFormat;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("PDF assembly failed: {0}")]
    Pdf(String),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn encode(canvas: &RgbImage, format: OutputFormat, print: &PrintSpec) -> Result<Vec<u8>, ExportError> {
    match format {
        OutputFormat::Png => encode_png(canvas),
        OutputFormat::Jpg => encode_jpeg(canvas, print.jpeg_quality),
        OutputFormat::Pdf => encode_pdf(canvas, print),
    }
}

pub fn encode_png(canvas: &RgbImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Cursor::new(Vec::new());
    canvas.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

pub fn encode_jpeg(canvas: &RgbImage, quality: u8) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality).encode_image(canvas)?;
    Ok(bytes)
}

pub fn encode_pdf(canvas: &RgbImage, print: &PrintSpec) -> Result<Vec<u8>, ExportError> {
    let (width_px, height_px) = canvas.dimensions();
    let (page_w, page_h) = print.page_size_points(width_px, height_px);
    let jpeg = encode_jpeg(canvas, print.jpeg_quality)?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width_px as i64,
            "Height" => height_px as i64,
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
                vec![page_w.into(), 0.into(), 0.into(), page_h.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content.encode().map_err(|e| ExportError::Pdf(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
        "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|e| ExportError::Pdf(e.to_string()))?;
    Ok(bytes)
}

/// Write `bytes` to a path that must not exist yet.
pub fn write_new(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|source| ExportError::Write { path: path.to_path_buf(), source })?;
    fill_or_remove(path, file, |file| {
        file.write_all(bytes)?;
        file.sync_all()
    })
}

/// Run `write` on a freshly created file; on failure the incomplete file is removed.
fn fill_or_remove<F>(path: &Path, mut file: File, write: F) -> Result<(), ExportError>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let written = write(&mut file);
    drop(file);
    written.map_err(|source| {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove partial artifact");
        }
        ExportError::Write { path: path.to_path_buf(), source }
    })
}
