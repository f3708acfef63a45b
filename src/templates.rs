//! Template System - Raster Backgrounds and Field Layouts

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::fields::FieldSpec;

pub type LayoutId = String;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Failed to read template {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to read layout {path}: {message}")]
    InvalidLayout { path: PathBuf, message: String },
}

/// Immutable background raster. Every artifact renders onto its own copy.
#[derive(Debug, Clone)]
pub struct Template {
    image: RgbImage,
    source: Option<PathBuf>,
}

impl Template {
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let image = image::open(path)
            .map_err(|source| TemplateError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        Ok(Self {
            image,
            source: Some(path.to_path_buf()),
        })
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self { image, source: None }
    }

    /// Plain white raster, handy for previews without artwork.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::from_image(RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255])))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// A named, versioned field set for one certificate design.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub id: LayoutId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub layout_version: String,
    #[serde(default = "default_version")]
    pub engine_min_version: String,
    #[serde(default)]
    pub naming: NamingPolicy,
    #[serde(default)]
    pub output: OutputFormat,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default, with = "field_map")]
    pub fields: Vec<FieldSpec>,
}

fn default_version() -> String {
    crate::MIN_LAYOUT_VERSION.to_string()
}

impl Layout {
    pub fn new(id: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            layout_version: default_version(),
            engine_min_version: default_version(),
            naming: NamingPolicy::default(),
            output: OutputFormat::default(),
            validation: ValidationConfig::default(),
            fields,
        }
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let invalid = |message: String| TemplateError::InvalidLayout {
            path: path.to_path_buf(),
            message,
        };
        let content = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))
    }

    pub fn active_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.is_active())
    }
}

/// Layout JSON stores fields as an ordered `column -> spec` object.
mod field_map {
    use serde::de::Error as _;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::{Map, Value};

    use crate::fields::FieldSpec;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<FieldSpec>, D::Error> {
        let entries = Map::<String, Value>::deserialize(deserializer)?;
        entries
            .into_iter()
            .map(|(column, value)| {
                let mut spec: FieldSpec = serde_json::from_value(value)
                    .map_err(|e| D::Error::custom(format!("field {column}: {e}")))?;
                if spec.source_column.is_empty() {
                    spec.source_column = column;
                }
                Ok(spec)
            })
            .collect()
    }

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S: Serializer>(fields: &Vec<FieldSpec>, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for field in fields {
            map.serialize_entry(&field.source_column, field)?;
        }
        map.end()
    }
}

/// Where the output file name comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NamingPolicy {
    /// Value of the row's first column.
    #[default]
    FirstColumn,
    /// Values of the named columns joined with `_`, e.g. name + certificate number.
    Columns(Vec<String>),
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpg,
    Pdf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Raster,
    Document,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Pdf => "pdf",
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        match self {
            OutputFormat::Png | OutputFormat::Jpg => ArtifactKind::Raster,
            OutputFormat::Pdf => ArtifactKind::Document,
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" | "image" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpg),
            "pdf" => Ok(OutputFormat::Pdf),
            other => Err(format!("unsupported output format: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    #[serde(default)]
    pub failure_mode: FailureMode,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    #[default]
    Block,
    Warn,
    Log,
}

/// Layout registry - loads and caches layouts
pub struct LayoutRegistry {
    layouts: HashMap<LayoutId, Layout>,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self { layouts: HashMap::new() }
    }

    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut registry = Self::new();
        if dir.exists() {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.extension().map_or(false, |e| e == "json") {
                    match Layout::load(&path) {
                        Ok(layout) => registry.register(layout),
                        Err(e) => warn!(error = %e, "skipping layout"),
                    }
                }
            }
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&Layout> {
        self.layouts.get(id)
    }

    /// Layouts sorted by id.
    pub fn list(&self) -> Vec<&Layout> {
        let mut layouts: Vec<_> = self.layouts.values().collect();
        layouts.sort_by(|a, b| a.id.cmp(&b.id));
        layouts
    }

    pub fn register(&mut self, layout: Layout) {
        self.layouts.insert(layout.id.clone(), layout);
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{Alignment, FieldKind};

    const INTERNSHIP: &str = r#"{
        "id": "internship",
        "name": "Internship Certificate",
        "naming": {"columns": ["FullName", "CertNo"]},
        "output": "pdf",
        "fields": {
            "CertNo": {"x": 105, "y": 424, "fontSize": 36},
            "FullName": {"x": 400, "y": 350, "fontFamily": "arialbd.ttf", "fontSize": 55, "fitWidth": 430},
            "Course": {"x": 640, "y": 515, "fontSize": 45, "alignment": "center", "maxWidth": 800, "lineSpacing": 3},
            "Issued": {"sourceColumn": "Date_of_Issue", "x": 240, "y": 755, "kind": "date"},
            "Grade": {"fontSize": 28}
        }
    }"#;

    #[test]
    fn test_layout_field_map_ordered() {
        let layout: Layout = serde_json::from_str(INTERNSHIP).unwrap();
        let columns: Vec<_> = layout.fields.iter().map(|f| f.source_column.as_str()).collect();
        assert_eq!(columns, vec!["CertNo", "FullName", "Course", "Date_of_Issue", "Grade"]);

        assert_eq!(layout.naming, NamingPolicy::Columns(vec!["FullName".into(), "CertNo".into()]));
        assert_eq!(layout.output, OutputFormat::Pdf);
        assert_eq!(layout.fields[2].alignment, Alignment::Center);
        assert_eq!(layout.fields[2].max_width, Some(800));
        assert_eq!(layout.fields[3].kind, FieldKind::Date);
        assert_eq!(layout.active_fields().count(), 4);
    }

    #[test]
    fn test_layout_defaults() {
        let layout: Layout = serde_json::from_str(r#"{"id": "bare"}"#).unwrap();
        assert_eq!(layout.naming, NamingPolicy::FirstColumn);
        assert_eq!(layout.output, OutputFormat::Png);
        assert_eq!(layout.validation.failure_mode, FailureMode::Block);
        assert!(layout.fields.is_empty());
    }

    #[test]
    fn test_layout_round_trips_field_map() {
        let layout: Layout = serde_json::from_str(INTERNSHIP).unwrap();
        let json = serde_json::to_value(&layout).unwrap();
        assert_eq!(json["fields"]["FullName"]["fontSize"], 55);
        assert_eq!(json["naming"]["columns"][1], "CertNo");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("PDF".parse::<OutputFormat>(), Ok(OutputFormat::Pdf));
        assert_eq!("Image".parse::<OutputFormat>(), Ok(OutputFormat::Png));
        assert_eq!(OutputFormat::Jpg.kind(), ArtifactKind::Raster);
        assert!("tiff".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_registry_skips_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("internship.json"), INTERNSHIP).unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = LayoutRegistry::load_from_dir(dir.path()).unwrap();
        assert_eq!(registry.list().len(), 1);
        assert!(registry.get("internship").is_some());
    }

    #[test]
    fn test_missing_template_is_error() {
        let err = Template::load(Path::new("/nonexistent/template.png")).unwrap_err();
        assert!(err.to_string().contains("Failed to read template"));
    }
}
