//! Generator Configuration
//!
//! JSON file with camelCase keys; every key is optional.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::print::{PrintSpec, DEFAULT_DPI, DEFAULT_JPEG_QUALITY};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Config validation failed: {0}")]
    ValidationFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    /// Bundled font directory, first in the resolution chain.
    #[serde(default = "default_font_dir")]
    pub font_dir: PathBuf,
    #[serde(default = "default_layout_dir")]
    pub layout_dir: PathBuf,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Write `manifest.json` next to the artifacts.
    #[serde(default)]
    pub write_manifest: bool,
}

fn default_font_dir() -> PathBuf {
    PathBuf::from("fonts")
}

fn default_layout_dir() -> PathBuf {
    PathBuf::from("layouts")
}

fn default_dpi() -> u32 {
    DEFAULT_DPI
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            font_dir: default_font_dir(),
            layout_dir: default_layout_dir(),
            dpi: DEFAULT_DPI,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            write_manifest: false,
        }
    }
}

impl GeneratorConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.print_spec()?;
        Ok(config)
    }

    pub fn print_spec(&self) -> Result<PrintSpec, ConfigError> {
        if self.dpi == DEFAULT_DPI && self.jpeg_quality == DEFAULT_JPEG_QUALITY {
            return Ok(PrintSpec::default());
        }
        PrintSpec::from_config(self.dpi, self.jpeg_quality)
            .map_err(|message| ConfigError::ValidationFailed(message.to_string()))
    }
}
