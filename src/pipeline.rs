//! Batch Generation Pipeline - Single Entry Point
//!
//! CRITICAL: run_with MUST call validate internally. A blocking violation
//! stops the batch before any artifact is written.
//!
//! Rows are processed sequentially. A failing row is recorded in the report
//! and never stops the batch; naming, rendering and persistence of one row
//! complete before the next row starts.

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ConfigError, GeneratorConfig};
use crate::data::{self, DataError, DataRow};
use crate::export::{self, ExportError};
use crate::fonts::FontResolver;
use crate::hashing::{compute_job_hash, compute_manifest_hash, sha256_hex};
use crate::naming::{self, OutputNamer};
use crate::print::PrintSpec;
use crate::render::{FieldRenderer, RenderContext, RenderError};
use crate::templates::{ArtifactKind, FailureMode, Layout, OutputFormat, Template, TemplateError};
use crate::validation::{LayoutInput, ValidationResult, Validator, ViolationSeverity};
use crate::ENGINE_VERSION;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

pub const MANIFEST_FILE: &str = "manifest.json";

/// Configuration-level failures; the batch does not start (or cannot report).
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Layout {0} requires engine >= {1}, current is {2}")]
    EngineVersionMismatch(String, String, String),

    #[error("Invalid version string: {0}")]
    InvalidVersion(String),

    #[error("Data source has no rows")]
    NoRows,

    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Preview failed: {0}")]
    Preview(#[from] RowError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GenerationError {
    /// Layout rejected before rendering; the CLI reports these with exit code 2.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GenerationError::ValidationFailed(_) | GenerationError::EngineVersionMismatch(..)
        )
    }
}

/// Why a single row produced no artifact; `Display` is the recorded reason.
#[derive(Debug, Error)]
pub enum RowError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RowIssue {
    pub row_index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedArtifact {
    pub output_path: PathBuf,
    pub format: OutputFormat,
    pub kind: ArtifactKind,
    pub source_row_index: usize,
    pub sha256: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub batch_id: String,
    pub layout_id: String,
    pub layout_version: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub job_hash: String,
    pub format: OutputFormat,
    pub output_dir: PathBuf,
    pub validation: ValidationResult,
    pub attempted: usize,
    pub succeeded: usize,
    pub errors: Vec<RowIssue>,
    pub skipped: Vec<RowIssue>,
    pub artifacts: Vec<GeneratedArtifact>,
    pub cancelled: bool,
    /// Hash of this report with `manifest_hash` empty.
    pub manifest_hash: String,
}

impl GenerationReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }

    pub fn first_errors(&self, limit: usize) -> &[RowIssue] {
        &self.errors[..self.errors.len().min(limit)]
    }
}

/// Per-row progress passed to the `run_with` observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowEvent {
    Generated { row_index: usize, path: PathBuf },
    Failed { row_index: usize, reason: String },
    Skipped { row_index: usize, reason: String },
}

impl RowEvent {
    pub fn row_index(&self) -> usize {
        match self {
            RowEvent::Generated { row_index, .. }
            | RowEvent::Failed { row_index, .. }
            | RowEvent::Skipped { row_index, .. } => *row_index,
        }
    }
}

/// Everything needed to start a batch from files on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub template_path: PathBuf,
    pub data_path: PathBuf,
    pub layout: Layout,
    pub output_dir: PathBuf,
    /// Overrides the layout's output format.
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

/// The batch generator - single entry point for rendering runs
pub struct BatchGenerator {
    renderer: FieldRenderer,
    validator: Validator,
    print: PrintSpec,
    write_manifest: bool,
}

impl BatchGenerator {
    pub fn new(fonts: FontResolver) -> Self {
        Self {
            renderer: FieldRenderer::new(fonts),
            validator: Validator::new(),
            print: PrintSpec::default(),
            write_manifest: false,
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Result<Self, GenerationError> {
        Ok(Self::new(FontResolver::standard(&config.font_dir))
            .with_print_spec(config.print_spec()?)
            .with_manifest(config.write_manifest))
    }

    pub fn with_print_spec(mut self, print: PrintSpec) -> Self {
        self.print = print;
        self
    }

    pub fn with_manifest(mut self, write_manifest: bool) -> Self {
        self.write_manifest = write_manifest;
        self
    }

    pub fn print_spec(&self) -> &PrintSpec {
        &self.print
    }

    /// Validate a layout against a template and an optional data header.
    ///
    /// This is the ONLY validation entry point.
    pub fn validate(
        &self,
        template: &Template,
        layout: &Layout,
        columns: Option<Vec<String>>,
    ) -> Result<ValidationResult, GenerationError> {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        check_engine_version(layout)?;

        let input = LayoutInput::new(layout, template, columns);
        let failure_mode = layout.validation.failure_mode;
        let result = self.validator.validate(&input, failure_mode);

        for violation in &result.violations {
            match (failure_mode, &violation.severity) {
                (FailureMode::Log, _) | (_, ViolationSeverity::Info) => {
                    info!(rule = %violation.rule, "{}", violation.message)
                }
                _ => warn!(rule = %violation.rule, "{}", violation.message),
            }
        }
        Ok(result)
    }

    pub fn run(
        &self,
        template: &Template,
        layout: &Layout,
        rows: &[DataRow],
        output_dir: &Path,
        format: OutputFormat,
    ) -> Result<GenerationReport, GenerationError> {
        self.run_with(template, layout, rows, output_dir, format, |_| ControlFlow::Continue(()))
    }

    /// Like [`run`](Self::run); `observer` sees every row and may stop the batch between rows.
    pub fn run_with<F>(
        &self,
        template: &Template,
        layout: &Layout,
        rows: &[DataRow],
        output_dir: &Path,
        format: OutputFormat,
        mut observer: F,
    ) -> Result<GenerationReport, GenerationError>
    where
        F: FnMut(&RowEvent) -> ControlFlow<()>,
    {
        let columns = (!rows.is_empty()).then(|| data::header(rows));

        // MANDATORY: Validation is always called.
        let validation = self.validate(template, layout, columns)?;
        if !validation.valid {
            let messages: Vec<_> = validation
                .errors()
                .map(|v| format!("{}: {}", v.rule, v.message))
                .collect();
            return Err(GenerationError::ValidationFailed(messages.join("; ")));
        }

        fs::create_dir_all(output_dir).map_err(|source| GenerationError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let mut report = GenerationReport {
            batch_id: Uuid::new_v4().to_string(),
            layout_id: layout.id.clone(),
            layout_version: layout.layout_version.clone(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            job_hash: compute_job_hash(&layout.id, &layout.layout_version, &layout.fields, &rows, ENGINE_VERSION)?,
            format,
            output_dir: output_dir.to_path_buf(),
            validation,
            attempted: 0,
            succeeded: 0,
            errors: vec![],
            skipped: vec![],
            artifacts: vec![],
            cancelled: false,
            manifest_hash: String::new(),
        };

        info!(
            batch_id = %report.batch_id,
            layout = %layout.id,
            rows = rows.len(),
            format = format.extension(),
            "starting batch"
        );

        let mut namer = OutputNamer::new(output_dir);
        for (row_index, row) in rows.iter().enumerate() {
            let event = match naming::identifier(row, &layout.naming) {
                Err(reason) => {
                    info!(row = row_index, %reason, "skipping row");
                    report.skipped.push(RowIssue { row_index, reason: reason.clone() });
                    RowEvent::Skipped { row_index, reason }
                }
                Ok(identifier) => {
                    report.attempted += 1;
                    match self.produce(template, layout, row, row_index, &identifier, format, &mut namer) {
                        Ok(artifact) => {
                            debug!(row = row_index, path = %artifact.output_path.display(), "artifact written");
                            report.succeeded += 1;
                            let path = artifact.output_path.clone();
                            report.artifacts.push(artifact);
                            RowEvent::Generated { row_index, path }
                        }
                        Err(e) => {
                            let reason = e.to_string();
                            warn!(row = row_index, %identifier, %reason, "row failed");
                            report.errors.push(RowIssue { row_index, reason: reason.clone() });
                            RowEvent::Failed { row_index, reason }
                        }
                    }
                }
            };

            if observer(&event).is_break() {
                report.cancelled = rows.len() > row_index + 1;
                if report.cancelled {
                    info!(after_row = row_index, "batch cancelled");
                }
                break;
            }
        }

        report.manifest_hash = compute_manifest_hash(&report)?;

        info!(
            batch_id = %report.batch_id,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.errors.len(),
            skipped = report.skipped.len(),
            "batch finished"
        );

        if self.write_manifest {
            let path = output_dir.join(MANIFEST_FILE);
            let json = serde_json::to_string_pretty(&report)?;
            fs::write(&path, json).map_err(|source| GenerationError::Manifest { path, source })?;
        }

        Ok(report)
    }

    /// Render, encode and persist one row.
    #[allow(clippy::too_many_arguments)]
    fn produce(
        &self,
        template: &Template,
        layout: &Layout,
        row: &DataRow,
        row_index: usize,
        identifier: &str,
        format: OutputFormat,
        namer: &mut OutputNamer,
    ) -> Result<GeneratedArtifact, RowError> {
        let mut ctx = RenderContext::new(template);
        self.renderer.render_row(&mut ctx, &layout.fields, row)?;
        let bytes = export::encode(ctx.canvas(), format, &self.print)?;

        let path = namer.claim(identifier, format);
        if let Err(e) = export::write_new(&path, &bytes) {
            namer.release(&path);
            return Err(e.into());
        }

        Ok(GeneratedArtifact {
            output_path: path,
            format,
            kind: format.kind(),
            source_row_index: row_index,
            sha256: sha256_hex(&bytes),
            bytes: bytes.len(),
        })
    }

    /// Render the first row without saving anything.
    pub fn preview(&self, template: &Template, layout: &Layout, rows: &[DataRow]) -> Result<RgbImage, GenerationError> {
        let row = rows.first().ok_or(GenerationError::NoRows)?;
        let mut ctx = RenderContext::new(template);
        self.renderer
            .render_row(&mut ctx, &layout.fields, row)
            .map_err(RowError::from)?;
        Ok(ctx.into_image())
    }

    pub fn preview_png(&self, template: &Template, layout: &Layout, rows: &[DataRow]) -> Result<Vec<u8>, GenerationError> {
        let image = self.preview(template, layout, rows)?;
        Ok(export::encode_png(&image).map_err(RowError::from)?)
    }

    /// Load the template and data named by `request` and run the batch.
    pub fn generate(&self, request: &BatchRequest) -> Result<GenerationReport, GenerationError> {
        let template = Template::load(&request.template_path)?;
        let rows = data::load_rows(&request.data_path)?;
        let format = request.format.unwrap_or(request.layout.output);
        self.run(&template, &request.layout, &rows, &request.output_dir, format)
    }
}

impl Default for BatchGenerator {
    fn default() -> Self {
        Self::new(FontResolver::default())
    }
}

pub fn check_engine_version(layout: &Layout) -> Result<(), GenerationError> {
    let engine_ver = semver::Version::parse(ENGINE_VERSION)
        .map_err(|_| GenerationError::InvalidVersion(ENGINE_VERSION.to_string()))?;
    let min_ver = semver::Version::parse(&layout.engine_min_version)
        .map_err(|_| GenerationError::InvalidVersion(layout.engine_min_version.clone()))?;

    if engine_ver < min_ver {
        return Err(GenerationError::EngineVersionMismatch(
            layout.id.clone(),
            layout.engine_min_version.clone(),
            ENGINE_VERSION.to_string(),
        ));
    }
    Ok(())
}
