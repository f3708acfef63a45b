//! CertForge Core - Certificate Batch Renderer
//!
//! Fills a raster certificate template with per-recipient text from tabular
//! data, one artifact per row.
//!
//! # Guarantees
//! 1. Anchors Live in Template Space
//! 2. Every Batch Is Validated Before It Starts
//! 3. One Bad Row Never Stops a Batch
//! 4. Artifacts Are Never Overwritten
//! 5. Missing Fonts Degrade, They Do Not Fail

pub mod config;
pub mod data;
pub mod export;
pub mod fields;
pub mod fonts;
pub mod hashing;
pub mod layout;
pub mod logging;
pub mod mapping;
pub mod naming;
pub mod pipeline;
pub mod print;
pub mod render;
pub mod templates;
pub mod validation;

pub use config::{ConfigError, GeneratorConfig};
pub use data::{CellValue, DataRow};
pub use fields::{Alignment, FieldKind, FieldSpec, Placement, Rgb};
pub use fonts::{FontHandle, FontResolver, FontSource};
pub use hashing::{canonical_json, compute_job_hash, compute_manifest_hash};
pub use mapping::{CoordinateMapper, PlacementError, PlacementSession};
pub use pipeline::{
    check_engine_version, BatchGenerator, BatchRequest, GeneratedArtifact, GenerationError, GenerationReport,
    RowError, RowEvent, RowIssue,
};
pub use print::{PrintAuthority, PrintSpec};
pub use render::{FieldOutcome, FieldRenderer, RenderContext, RenderError};
pub use templates::{Layout, LayoutRegistry, NamingPolicy, OutputFormat, Template};
pub use validation::{ValidationResult, ValidationRule, ValidationViolation, ViolationSeverity};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MIN_LAYOUT_VERSION: &str = "1.0.0";
