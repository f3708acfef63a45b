//! Print Authority System
//!
//! Defines where export geometry comes from: document resolution for PDF
//! pages and encoder quality for JPEG output.

use serde::{Deserialize, Serialize};

pub const DEFAULT_DPI: u32 = 100;
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// PrintAuthority determines where print specifications come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintAuthority {
    /// System defaults (fallback)
    #[default]
    System,
    /// Generator config file
    Config,
    /// Command-line overrides (with validation)
    User,
}

/// Export geometry for rendered artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintSpec {
    pub authority: PrintAuthority,
    pub dpi: u32,
    pub jpeg_quality: u8,
}

impl Default for PrintSpec {
    fn default() -> Self {
        Self {
            authority: PrintAuthority::System,
            dpi: DEFAULT_DPI,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl PrintSpec {
    pub fn from_config(dpi: u32, jpeg_quality: u8) -> Result<Self, &'static str> {
        Self::checked(PrintAuthority::Config, dpi, jpeg_quality)
    }

    /// Create from user with validation
    pub fn from_user(dpi: u32, jpeg_quality: u8) -> Result<Self, &'static str> {
        Self::checked(PrintAuthority::User, dpi, jpeg_quality)
    }

    fn checked(authority: PrintAuthority, dpi: u32, jpeg_quality: u8) -> Result<Self, &'static str> {
        if !(72..=1200).contains(&dpi) {
            return Err("DPI must be between 72 and 1200");
        }
        if !(1..=100).contains(&jpeg_quality) {
            return Err("JPEG quality must be between 1 and 100");
        }
        Ok(Self { authority, dpi, jpeg_quality })
    }

    /// Page size in PDF points for a raster of `width` x `height` pixels.
    pub fn page_size_points(&self, width: u32, height: u32) -> (f32, f32) {
        let dpi = self.dpi as f32;
        (width as f32 * 72.0 / dpi, height as f32 * 72.0 / dpi)
    }
}
